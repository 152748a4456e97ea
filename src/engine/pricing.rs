// ==========================================
// 管件安装估价系统 - 远程定价查询
// ==========================================
// 收集器实例 #1
// 请求体: { items: [完整条目（含属性）] }
// 响应: [{ id, attributes }]，按条目ID对应
// 缓存: 仅当响应带有 calculated=true 时可缓存
// ==========================================

use crate::domain::attribute::{AttributeName, AttributeSet};
use crate::domain::item::Item;
use crate::engine::collector::{BatchCollector, CollectorError, Identified, LookupKind};
use serde::{Deserialize, Serialize};

/// 定价请求（条目快照）
#[derive(Debug, Clone, PartialEq)]
pub struct PricingRequest {
    pub item: Item,
}

impl PricingRequest {
    pub fn new(item: &Item) -> Self {
        Self { item: item.clone() }
    }
}

impl Identified for PricingRequest {
    fn lookup_id(&self) -> &str {
        self.item.id()
    }
}

/// 一次网络请求的请求体
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PricingBatch {
    pub items: Vec<Item>,
}

/// 定价响应
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PricingResponse {
    pub id: String,
    #[serde(default)]
    pub attributes: AttributeSet,
}

impl PricingResponse {
    pub fn is_calculated(&self) -> bool {
        self.attributes.flag(AttributeName::Calculated)
    }
}

impl Identified for PricingResponse {
    fn lookup_id(&self) -> &str {
        &self.id
    }
}

pub struct PricingLookup;

impl LookupKind for PricingLookup {
    type Request = PricingRequest;
    type Response = PricingResponse;
    type Body = PricingBatch;

    const NAME: &'static str = "pricing";

    fn request_hash(request: &PricingRequest) -> String {
        request.item.calculation_hash()
    }

    fn build_body(requests: Vec<PricingRequest>) -> PricingBatch {
        PricingBatch {
            items: requests.into_iter().map(|r| r.item).collect(),
        }
    }

    fn is_cacheable(response: &PricingResponse) -> bool {
        response.is_calculated()
    }
}

pub type PricingCollector = BatchCollector<PricingLookup>;

impl BatchCollector<PricingLookup> {
    /// 查询条目基础价格
    pub async fn price(&self, item: &Item) -> Result<PricingResponse, CollectorError> {
        self.request(PricingRequest::new(item)).await
    }
}
