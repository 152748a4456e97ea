// ==========================================
// 模拟远程服务
// ==========================================
// 定价: weight = dn1 / 10, effortHours = 2 × 数量, materialPrice = 50 × 数量
// 候选值: material 列返回固定材质表，其余列返回空
// ==========================================

use async_trait::async_trait;
use pipe_estimate::domain::{AttributeName, AttributeSet};
use pipe_estimate::engine::{
    BatchTransport, CollectorError, PricingBatch, PricingLookup, PricingResponse, Suggestion,
    SuggestionLookup, SuggestionRequest, SuggestionResponse,
};
use pipe_estimate::{Column, FieldValue};
use std::sync::Mutex;

/// 模拟定价服务
#[derive(Default)]
pub struct MockPricingTransport {
    batches: Mutex<Vec<Vec<String>>>,
    offline: bool,
}

impl MockPricingTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// 所有请求都失败
    pub fn offline() -> Self {
        Self {
            offline: true,
            ..Self::default()
        }
    }

    pub fn call_count(&self) -> usize {
        self.batches.lock().unwrap().len()
    }

    /// 每次请求携带的条目ID
    pub fn batches(&self) -> Vec<Vec<String>> {
        self.batches.lock().unwrap().clone()
    }
}

#[async_trait]
impl BatchTransport<PricingLookup> for MockPricingTransport {
    async fn send(&self, body: PricingBatch) -> Result<Vec<PricingResponse>, CollectorError> {
        self.batches
            .lock()
            .unwrap()
            .push(body.items.iter().map(|i| i.id().to_string()).collect());
        if self.offline {
            return Err(CollectorError::Transport("pricing service unavailable".into()));
        }

        Ok(body
            .items
            .iter()
            .map(|item| {
                let quantity = item.quantity().unwrap_or(1.0);
                let dn1 = item
                    .field(Column::Dn1)
                    .and_then(|v| v.as_number())
                    .unwrap_or(0.0);
                let mut attributes = AttributeSet::new();
                attributes.set_number(AttributeName::Weight, dn1 / 10.0);
                attributes.set_number(AttributeName::EffortHours, 2.0 * quantity);
                attributes.set_number(AttributeName::MaterialPrice, 50.0 * quantity);
                attributes.set_flag(AttributeName::Calculated, true);
                PricingResponse {
                    id: item.id().to_string(),
                    attributes,
                }
            })
            .collect())
    }
}

/// 模拟候选值服务
#[derive(Default)]
pub struct MockSuggestionTransport {
    calls: Mutex<Vec<Vec<String>>>,
}

impl MockSuggestionTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn calls(&self) -> Vec<Vec<String>> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl BatchTransport<SuggestionLookup> for MockSuggestionTransport {
    async fn send(
        &self,
        body: Vec<SuggestionRequest>,
    ) -> Result<Vec<SuggestionResponse>, CollectorError> {
        self.calls
            .lock()
            .unwrap()
            .push(body.iter().map(|r| r.id.clone()).collect());

        Ok(body
            .into_iter()
            .map(|request| {
                let suggestions = match request.column {
                    Column::Material => vec![
                        Suggestion {
                            value: FieldValue::from("P235"),
                            label: "P235GH".into(),
                            group: Some("carbon".into()),
                        },
                        Suggestion {
                            value: FieldValue::from("1.4571"),
                            label: "X6CrNiMoTi17-12-2".into(),
                            group: Some("stainless".into()),
                        },
                    ],
                    _ => Vec::new(),
                };
                SuggestionResponse {
                    id: request.id,
                    suggestions,
                }
            })
            .collect())
    }
}
