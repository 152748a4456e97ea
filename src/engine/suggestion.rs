// ==========================================
// 管件安装估价系统 - 列候选值查询
// ==========================================
// 收集器实例 #2
// 请求体: [{ id, column, item }]
// 响应: [{ id, suggestions: [{ value, label, group? }] }]
// 哈希: 列名 + 截至该列（不含）的相关列投影
// 缓存: 仅非空结果可缓存
// ==========================================

use crate::domain::item::Item;
use crate::domain::types::{Column, FieldValue};
use crate::engine::collector::{BatchCollector, CollectorError, Identified, LookupKind};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SuggestionRequest {
    pub id: String,
    pub column: Column,
    pub item: Item,
}

impl SuggestionRequest {
    pub fn new(item: &Item, column: Column) -> Self {
        Self {
            id: format!("{}:{}", item.id(), column),
            column,
            item: item.clone(),
        }
    }
}

impl Identified for SuggestionRequest {
    fn lookup_id(&self) -> &str {
        &self.id
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Suggestion {
    pub value: FieldValue,
    pub label: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SuggestionResponse {
    pub id: String,
    #[serde(default)]
    pub suggestions: Vec<Suggestion>,
}

impl Identified for SuggestionResponse {
    fn lookup_id(&self) -> &str {
        &self.id
    }
}

pub struct SuggestionLookup;

impl LookupKind for SuggestionLookup {
    type Request = SuggestionRequest;
    type Response = SuggestionResponse;
    type Body = Vec<SuggestionRequest>;

    const NAME: &'static str = "suggestion";

    fn request_hash(request: &SuggestionRequest) -> String {
        format!(
            "{}|{}",
            request.column,
            request.item.to_relevant_json(Some(request.column), &[])
        )
    }

    fn build_body(requests: Vec<SuggestionRequest>) -> Vec<SuggestionRequest> {
        requests
    }

    fn is_cacheable(response: &SuggestionResponse) -> bool {
        !response.suggestions.is_empty()
    }
}

pub type SuggestionCollector = BatchCollector<SuggestionLookup>;

impl BatchCollector<SuggestionLookup> {
    /// 查询某列候选值（列尚不可用时直接返回空，不发请求）
    pub async fn suggest(&self, item: &Item, column: Column) -> Result<Vec<Suggestion>, CollectorError> {
        if !item.is_column_available(column) {
            return Ok(Vec::new());
        }
        let response = self.request(SuggestionRequest::new(item, column)).await?;
        Ok(response.suggestions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::pipe_fitting::PipeFitting;

    fn pipe(material: Option<&str>, dn1: Option<f64>) -> Item {
        Item::new_pipe_fitting(
            Some("1000"),
            PipeFitting {
                material: material.map(Into::into),
                dn1,
                ..PipeFitting::default()
            },
        )
    }

    #[test]
    fn test_hash_only_covers_columns_before_target() {
        let a = pipe(Some("P235"), Some(100.0));
        let b = pipe(Some("P235"), Some(50.0));
        let c = pipe(Some("S355"), Some(100.0));

        let hash = |item: &Item| SuggestionLookup::request_hash(&SuggestionRequest::new(item, Column::Dn1));
        assert_eq!(hash(&a), hash(&b));
        assert_ne!(hash(&a), hash(&c));

        let material_hash =
            SuggestionLookup::request_hash(&SuggestionRequest::new(&a, Column::Material));
        assert_ne!(material_hash, hash(&a));
    }

    #[test]
    fn test_empty_suggestions_not_cacheable() {
        let mut response = SuggestionResponse {
            id: "x".into(),
            suggestions: Vec::new(),
        };
        assert!(!SuggestionLookup::is_cacheable(&response));
        response.suggestions.push(Suggestion {
            value: FieldValue::Number(100.0),
            label: "DN100".into(),
            group: None,
        });
        assert!(SuggestionLookup::is_cacheable(&response));
    }

    #[test]
    fn test_response_json_shape() {
        let json = serde_json::json!({
            "id": "a:dn1",
            "suggestions": [
                {"value": 100, "label": "DN100", "group": "common"},
                {"value": "P235", "label": "P235"}
            ]
        });
        let response: SuggestionResponse = serde_json::from_value(json).unwrap();
        assert_eq!(response.suggestions.len(), 2);
        assert_eq!(response.suggestions[0].group.as_deref(), Some("common"));
        assert_eq!(response.suggestions[1].value, FieldValue::Text("P235".into()));
    }
}
