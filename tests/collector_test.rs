// ==========================================
// 批量收集器集成测试
// ==========================================
// 测试目标: 定价/候选值两种查询共用同一收集器的合并、去重、缓存行为
// ==========================================

mod helpers;

use futures::future::join_all;
use helpers::mock_transport::{MockPricingTransport, MockSuggestionTransport};
use helpers::test_data_builder::{complete_pipe, PipeFittingBuilder};
use pipe_estimate::engine::{CollectorConfig, PricingCollector, SuggestionCollector};
use pipe_estimate::{AttributeName, Column, FieldValue};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

#[tokio::test(start_paused = true)]
async fn test_identical_content_shares_one_request() {
    let transport = Arc::new(MockPricingTransport::new());
    let collector = PricingCollector::with_default_config(transport.clone());

    // 不同ID、相同相关列 => 相同计算哈希
    let a = complete_pipe(100.0, 2.0);
    let b = a.duplicate();
    assert_ne!(a.id(), b.id());

    let (ra, rb) = tokio::join!(collector.price(&a), collector.price(&b));
    let (ra, rb) = (ra.unwrap(), rb.unwrap());

    assert_eq!(ra, rb);
    assert_eq!(transport.call_count(), 1);
    assert_eq!(transport.batches()[0], vec![a.id().to_string()]);
    assert_eq!(ra.attributes.number(AttributeName::Weight), Some(10.0));
}

#[tokio::test(start_paused = true)]
async fn test_window_fires_after_debounce_and_caches_result() {
    let transport = Arc::new(MockPricingTransport::new());
    let collector = PricingCollector::with_default_config(transport.clone());
    let item = complete_pipe(80.0, 1.0);

    let started = Instant::now();
    let first = collector.price(&item).await.unwrap();
    assert_eq!(started.elapsed(), Duration::from_millis(150));
    assert!(first.is_calculated());

    // 命中缓存: 立即返回，不发请求
    let started = Instant::now();
    let again = collector.price(&item).await.unwrap();
    assert_eq!(started.elapsed(), Duration::ZERO);
    assert_eq!(again, first);
    assert_eq!(transport.call_count(), 1);
    assert_eq!(collector.cache_len(), 1);
    assert_eq!(collector.pending_len(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_batches_respect_configured_size() {
    let transport = Arc::new(MockPricingTransport::new());
    let collector = PricingCollector::new(
        transport.clone(),
        CollectorConfig {
            batch_size: 2,
            ..CollectorConfig::default()
        },
    );
    let items: Vec<_> = (1..=5).map(|n| complete_pipe(10.0 * n as f64, 1.0)).collect();

    let results = join_all(items.iter().map(|item| collector.price(item))).await;

    assert!(results.iter().all(|r| r.is_ok()));
    let sizes: Vec<usize> = transport.batches().iter().map(Vec::len).collect();
    assert_eq!(sizes, vec![2, 2, 1]);
}

#[tokio::test(start_paused = true)]
async fn test_transport_failure_is_not_cached() {
    let transport = Arc::new(MockPricingTransport::offline());
    let collector = PricingCollector::with_default_config(transport.clone());
    let item = complete_pipe(100.0, 1.0);

    assert!(collector.price(&item).await.is_err());
    assert!(collector.price(&item).await.is_err());
    assert_eq!(transport.call_count(), 2);
    assert_eq!(collector.cache_len(), 0);
}

// ==========================================
// 候选值查询
// ==========================================

#[tokio::test(start_paused = true)]
async fn test_suggestions_for_available_column() {
    let transport = Arc::new(MockSuggestionTransport::new());
    let collector = SuggestionCollector::with_default_config(transport.clone());
    let item = PipeFittingBuilder::new("1000").build();

    let suggestions = collector.suggest(&item, Column::Material).await.unwrap();
    assert_eq!(suggestions.len(), 2);
    assert_eq!(suggestions[0].value, FieldValue::from("P235"));
    assert_eq!(suggestions[1].group.as_deref(), Some("stainless"));
    assert_eq!(
        transport.calls(),
        vec![vec![format!("{}:material", item.id())]]
    );

    // 非空结果可缓存
    collector.suggest(&item, Column::Material).await.unwrap();
    assert_eq!(transport.call_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_unavailable_column_skips_network() {
    let transport = Arc::new(MockSuggestionTransport::new());
    let collector = SuggestionCollector::with_default_config(transport.clone());
    let item = PipeFittingBuilder::new("1000").build();

    // material 为空，dn1 不可用
    let suggestions = collector.suggest(&item, Column::Dn1).await.unwrap();
    assert!(suggestions.is_empty());
    assert_eq!(transport.call_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_empty_suggestions_are_requested_again() {
    let transport = Arc::new(MockSuggestionTransport::new());
    let collector = SuggestionCollector::with_default_config(transport.clone());
    let item = complete_pipe(100.0, 1.0);

    assert!(collector.suggest(&item, Column::S1).await.unwrap().is_empty());
    assert!(collector.suggest(&item, Column::S1).await.unwrap().is_empty());
    assert_eq!(transport.call_count(), 2);
    assert_eq!(collector.cache_len(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_suggestion_hash_ignores_columns_after_target() {
    let transport = Arc::new(MockSuggestionTransport::new());
    let collector = SuggestionCollector::with_default_config(transport.clone());
    let thin = PipeFittingBuilder::new("1000").dn1(100.0).build();
    let thick = PipeFittingBuilder::new("1000").dn1(200.0).build();

    // material 之后的列不影响 material 候选值
    collector.suggest(&thin, Column::Material).await.unwrap();
    collector.suggest(&thick, Column::Material).await.unwrap();
    assert_eq!(transport.call_count(), 1);
}
