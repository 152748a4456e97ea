use super::*;
use futures::future::join_all;

// ==========================================
// 测试用查询类别与模拟传输
// ==========================================

#[derive(Debug, Clone, PartialEq)]
struct EchoRequest {
    id: String,
    key: String,
}

#[derive(Debug, Clone, PartialEq)]
struct EchoResponse {
    id: String,
    value: String,
    cacheable: bool,
}

impl Identified for EchoRequest {
    fn lookup_id(&self) -> &str {
        &self.id
    }
}

impl Identified for EchoResponse {
    fn lookup_id(&self) -> &str {
        &self.id
    }
}

struct EchoLookup;

impl LookupKind for EchoLookup {
    type Request = EchoRequest;
    type Response = EchoResponse;
    type Body = Vec<EchoRequest>;

    const NAME: &'static str = "echo";

    fn request_hash(request: &EchoRequest) -> String {
        request.key.clone()
    }

    fn build_body(requests: Vec<EchoRequest>) -> Vec<EchoRequest> {
        requests
    }

    fn is_cacheable(response: &EchoResponse) -> bool {
        response.cacheable
    }
}

#[derive(Default)]
struct MockTransport {
    calls: Mutex<Vec<(Instant, Vec<EchoRequest>)>>,
    fail: bool,
    uncacheable: bool,
    drop_ids: Vec<String>,
    extra_response: bool,
}

impl MockTransport {
    fn calls(&self) -> Vec<(Instant, Vec<EchoRequest>)> {
        self.calls.lock().unwrap().clone()
    }

    fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl BatchTransport<EchoLookup> for MockTransport {
    async fn send(&self, body: Vec<EchoRequest>) -> Result<Vec<EchoResponse>, CollectorError> {
        self.calls.lock().unwrap().push((Instant::now(), body.clone()));
        if self.fail {
            return Err(CollectorError::Transport("connection refused".into()));
        }
        let mut responses: Vec<EchoResponse> = body
            .into_iter()
            .filter(|r| !self.drop_ids.contains(&r.id))
            .map(|r| EchoResponse {
                id: r.id,
                value: format!("value-of-{}", r.key),
                cacheable: !self.uncacheable,
            })
            .collect();
        if self.extra_response {
            responses.push(EchoResponse {
                id: "stranger".into(),
                value: "?".into(),
                cacheable: true,
            });
        }
        Ok(responses)
    }
}

fn req(id: &str, key: &str) -> EchoRequest {
    EchoRequest {
        id: id.into(),
        key: key.into(),
    }
}

fn collector(transport: Arc<MockTransport>) -> BatchCollector<EchoLookup> {
    BatchCollector::<EchoLookup>::with_default_config(transport)
}

// ==========================================
// 合并窗口
// ==========================================

#[tokio::test(start_paused = true)]
async fn test_single_request_sent_after_debounce() {
    let transport = Arc::new(MockTransport::default());
    let collector = collector(transport.clone());
    let start = Instant::now();

    let response = collector.request(req("1", "a")).await.unwrap();
    assert_eq!(response.value, "value-of-a");

    let calls = transport.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].0 - start, Duration::from_millis(150));
}

#[tokio::test(start_paused = true)]
async fn test_concurrent_requests_coalesce_into_one_call() {
    let transport = Arc::new(MockTransport::default());
    let collector = collector(transport.clone());

    let futures = (0..5).map(|i| collector.request(req(&i.to_string(), &format!("k{}", i))));
    let results = join_all(futures).await;

    assert!(results.iter().all(|r| r.is_ok()));
    assert_eq!(transport.call_count(), 1);
    assert_eq!(transport.calls()[0].1.len(), 5);
}

#[tokio::test(start_paused = true)]
async fn test_identical_hash_deduplicated_to_one_entry() {
    let transport = Arc::new(MockTransport::default());
    let collector = collector(transport.clone());

    let (a, b) = tokio::join!(
        collector.request(req("1", "same")),
        collector.request(req("2", "same"))
    );
    assert_eq!(a.unwrap(), b.unwrap());

    let calls = transport.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].1.len(), 1);
    assert_eq!(collector.pending_len(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_queue_split_into_batches_of_twenty() {
    let transport = Arc::new(MockTransport::default());
    let collector = collector(transport.clone());

    let futures = (0..45).map(|i| collector.request(req(&i.to_string(), &format!("k{}", i))));
    let results = join_all(futures).await;
    assert!(results.iter().all(|r| r.is_ok()));

    let sizes: Vec<usize> = transport.calls().iter().map(|(_, body)| body.len()).collect();
    assert_eq!(sizes, vec![20, 20, 5]);
}

#[tokio::test(start_paused = true)]
async fn test_hard_ceiling_fires_despite_steady_arrivals() {
    let transport = Arc::new(MockTransport::default());
    let collector = collector(transport.clone());
    let start = Instant::now();

    let mut handles = Vec::new();
    for i in 0..15 {
        let c = collector.clone();
        handles.push(tokio::spawn(async move {
            c.request(req(&i.to_string(), &format!("k{}", i))).await
        }));
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
    for handle in handles {
        assert!(handle.await.unwrap().is_ok());
    }

    let calls = transport.calls();
    assert!(calls.len() >= 2);
    assert_eq!(calls[0].0 - start, Duration::from_millis(1000));
}

// ==========================================
// 缓存
// ==========================================

#[tokio::test(start_paused = true)]
async fn test_cached_result_served_without_network() {
    let transport = Arc::new(MockTransport::default());
    let collector = collector(transport.clone());

    collector.request(req("1", "a")).await.unwrap();
    let again = collector.request(req("9", "a")).await.unwrap();

    assert_eq!(again.value, "value-of-a");
    assert_eq!(transport.call_count(), 1);
    assert_eq!(collector.cache_len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_uncacheable_result_requested_again() {
    let transport = Arc::new(MockTransport {
        uncacheable: true,
        ..MockTransport::default()
    });
    let collector = collector(transport.clone());

    collector.request(req("1", "a")).await.unwrap();
    collector.request(req("1", "a")).await.unwrap();

    assert_eq!(transport.call_count(), 2);
    assert_eq!(collector.cache_len(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_cache_evicts_oldest_entry() {
    let transport = Arc::new(MockTransport::default());
    let collector = BatchCollector::<EchoLookup>::new(
        transport.clone(),
        CollectorConfig {
            cache_capacity: 2,
            ..CollectorConfig::default()
        },
    );

    for key in ["a", "b", "c"] {
        collector.request(req(key, key)).await.unwrap();
    }
    assert_eq!(transport.call_count(), 3);
    assert_eq!(collector.cache_len(), 2);

    collector.request(req("c", "c")).await.unwrap();
    assert_eq!(transport.call_count(), 3);

    collector.request(req("a", "a")).await.unwrap();
    assert_eq!(transport.call_count(), 4);
}

// ==========================================
// 异常响应
// ==========================================

#[tokio::test(start_paused = true)]
async fn test_missing_and_unmatched_responses() {
    let transport = Arc::new(MockTransport {
        drop_ids: vec!["2".into()],
        extra_response: true,
        ..MockTransport::default()
    });
    let collector = collector(transport.clone());

    let (a, b) = tokio::join!(
        collector.request(req("1", "a")),
        collector.request(req("2", "b"))
    );
    assert!(a.is_ok());
    assert_eq!(
        b,
        Err(CollectorError::MissingResponse {
            request_id: "2".into()
        })
    );
    assert_eq!(collector.pending_len(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_transport_failure_reaches_every_waiter() {
    let transport = Arc::new(MockTransport {
        fail: true,
        ..MockTransport::default()
    });
    let collector = collector(transport.clone());

    let (a, b, c) = tokio::join!(
        collector.request(req("1", "a")),
        collector.request(req("2", "a")),
        collector.request(req("3", "b"))
    );
    for result in [a, b, c] {
        assert!(matches!(result, Err(CollectorError::Transport(_))));
    }
    assert_eq!(collector.cache_len(), 0);
    assert_eq!(collector.pending_len(), 0);
}
