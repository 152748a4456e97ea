// ==========================================
// 管件安装估价系统 - 批量远程请求收集器
// ==========================================
// 职责: 合并大量小查询为少量网络请求
// 算法:
// 1. 计算内容哈希，命中缓存直接返回（无网络）
// 2. 相同哈希已有在途请求时返回同一个 future（真正去重）
// 3. 否则入队并启动合并窗口: 短定时器（每次入队重置）+ 硬上限定时器（到点必发）
// 4. 窗口触发后按批大小取队列，构造一次请求体，响应按注入的相等谓词对应回请求；
//    队列仍有剩余时立即继续，不重新计时
// 5. 可缓存结果写入有界缓存，超出容量淘汰创建时间最早的条目
// 说明: 通过 LookupKind 泛型复用于定价与候选值两类查询
// ==========================================

mod cache;

#[cfg(test)]
mod tests;

pub use cache::BoundedCache;

use async_trait::async_trait;
use futures::future::{BoxFuture, FutureExt, Shared};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::oneshot;
use tokio::time::Instant;

/// 收集器错误类型（可克隆，以便分发给所有去重等待者）
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CollectorError {
    #[error("远程请求失败: {0}")]
    Transport(String),

    #[error("响应中缺少请求: request_id={request_id}")]
    MissingResponse { request_id: String },

    #[error("请求在完成前被丢弃")]
    Dropped,
}

/// 可按ID对应请求与响应
pub trait Identified {
    fn lookup_id(&self) -> &str;
}

/// 查询类别: 定义请求/响应形状、哈希、请求体、对应与缓存策略
pub trait LookupKind: Send + Sync + 'static {
    type Request: Identified + Clone + Send + Sync + 'static;
    type Response: Identified + Clone + Send + Sync + 'static;
    type Body: Send + 'static;

    /// 日志用名称
    const NAME: &'static str;

    /// 内容哈希（缓存与去重键）
    fn request_hash(request: &Self::Request) -> String;

    /// 把一批请求组装成一次请求体
    fn build_body(requests: Vec<Self::Request>) -> Self::Body;

    /// 响应是否对应该请求（默认按ID相等）
    fn matches(request: &Self::Request, response: &Self::Response) -> bool {
        request.lookup_id() == response.lookup_id()
    }

    /// 响应是否可缓存
    fn is_cacheable(_response: &Self::Response) -> bool {
        true
    }
}

/// 远程传输（外部协作方）
#[async_trait]
pub trait BatchTransport<K: LookupKind>: Send + Sync {
    async fn send(&self, body: K::Body) -> Result<Vec<K::Response>, CollectorError>;
}

/// 收集器配置
#[derive(Debug, Clone)]
pub struct CollectorConfig {
    /// 合并窗口（每次入队重置）
    pub debounce: Duration,
    /// 窗口硬上限（从窗口打开起计）
    pub max_wait: Duration,
    /// 单次请求最多条数
    pub batch_size: usize,
    /// 缓存容量
    pub cache_capacity: usize,
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            debounce: Duration::from_millis(150),
            max_wait: Duration::from_millis(1000),
            batch_size: 20,
            cache_capacity: 100,
        }
    }
}

type SharedResponse<R> = Shared<BoxFuture<'static, Result<R, CollectorError>>>;

struct Queued<K: LookupKind> {
    hash: String,
    request: K::Request,
    resolver: oneshot::Sender<Result<K::Response, CollectorError>>,
}

struct Window {
    opened_at: Instant,
    last_enqueue: Instant,
}

struct CollectorState<K: LookupKind> {
    cache: BoundedCache<K::Response>,
    pending: HashMap<String, SharedResponse<K::Response>>,
    queue: VecDeque<Queued<K>>,
    window: Option<Window>,
}

struct Inner<K: LookupKind> {
    transport: Arc<dyn BatchTransport<K>>,
    config: CollectorConfig,
    state: Mutex<CollectorState<K>>,
}

// ==========================================
// BatchCollector - 批量收集器
// ==========================================
pub struct BatchCollector<K: LookupKind> {
    inner: Arc<Inner<K>>,
}

impl<K: LookupKind> Clone for BatchCollector<K> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<K: LookupKind> BatchCollector<K> {
    pub fn new(transport: Arc<dyn BatchTransport<K>>, config: CollectorConfig) -> Self {
        let cache = BoundedCache::new(config.cache_capacity);
        Self {
            inner: Arc::new(Inner {
                transport,
                config,
                state: Mutex::new(CollectorState {
                    cache,
                    pending: HashMap::new(),
                    queue: VecDeque::new(),
                    window: None,
                }),
            }),
        }
    }

    pub fn with_default_config(transport: Arc<dyn BatchTransport<K>>) -> Self {
        Self::new(transport, CollectorConfig::default())
    }

    /// 发起查询
    ///
    /// 需在 tokio 运行时内调用（合并窗口由后台任务驱动）
    pub async fn request(&self, request: K::Request) -> Result<K::Response, CollectorError> {
        let hash = K::request_hash(&request);

        let shared = {
            let mut state = self.inner.lock_state();

            if let Some(hit) = state.cache.get(&hash) {
                tracing::trace!("{} 缓存命中: hash={}", K::NAME, hash);
                return Ok(hit.clone());
            }

            match state.pending.get(&hash) {
                Some(in_flight) => in_flight.clone(),
                None => {
                    let (tx, rx) = oneshot::channel();
                    let fut: SharedResponse<K::Response> = async move {
                        rx.await.unwrap_or(Err(CollectorError::Dropped))
                    }
                    .boxed()
                    .shared();
                    state.pending.insert(hash.clone(), fut.clone());
                    state.queue.push_back(Queued {
                        hash,
                        request,
                        resolver: tx,
                    });
                    self.arm_window(&mut state);
                    fut
                }
            }
        };

        shared.await
    }

    /// 入队后维护合并窗口（首个入队时启动驱动任务）
    fn arm_window(&self, state: &mut CollectorState<K>) {
        let now = Instant::now();
        match state.window.as_mut() {
            Some(window) => window.last_enqueue = now,
            None => {
                state.window = Some(Window {
                    opened_at: now,
                    last_enqueue: now,
                });
                let inner = self.inner.clone();
                tokio::spawn(async move { inner.run_window().await });
            }
        }
    }

    pub fn cache_len(&self) -> usize {
        self.inner.lock_state().cache.len()
    }

    pub fn pending_len(&self) -> usize {
        self.inner.lock_state().pending.len()
    }

    pub fn clear_cache(&self) {
        self.inner.lock_state().cache.clear();
    }
}

impl<K: LookupKind> Inner<K> {
    fn lock_state(&self) -> MutexGuard<'_, CollectorState<K>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// 驱动一个合并窗口: 等待到期，然后连续发送直到队列清空
    async fn run_window(self: Arc<Self>) {
        loop {
            let deadline = {
                let state = self.lock_state();
                match &state.window {
                    Some(w) => (w.last_enqueue + self.config.debounce)
                        .min(w.opened_at + self.config.max_wait),
                    None => return,
                }
            };
            if Instant::now() >= deadline {
                break;
            }
            tokio::time::sleep_until(deadline).await;
        }

        loop {
            let batch: Vec<Queued<K>> = {
                let mut state = self.lock_state();
                if state.queue.is_empty() {
                    state.window = None;
                    return;
                }
                let n = self.config.batch_size.max(1).min(state.queue.len());
                state.queue.drain(..n).collect()
            };
            self.dispatch(batch).await;
        }
    }

    async fn dispatch(&self, batch: Vec<Queued<K>>) {
        let requests: Vec<K::Request> = batch.iter().map(|q| q.request.clone()).collect();
        tracing::debug!("{} 批量请求: size={}", K::NAME, requests.len());

        let outcome = self.transport.send(K::build_body(requests)).await;
        let mut slots: Vec<Option<Queued<K>>> = batch.into_iter().map(Some).collect();

        match outcome {
            Ok(responses) => {
                for response in responses {
                    let slot = slots.iter_mut().find(|slot| {
                        slot.as_ref()
                            .map(|q| K::matches(&q.request, &response))
                            .unwrap_or(false)
                    });
                    match slot.and_then(Option::take) {
                        Some(queued) => self.settle(queued, Ok(response)),
                        None => tracing::warn!(
                            "{} 响应无对应请求，已丢弃: id={}",
                            K::NAME,
                            response.lookup_id()
                        ),
                    }
                }
                for queued in slots.into_iter().flatten() {
                    let request_id = queued.request.lookup_id().to_string();
                    tracing::warn!("{} 请求未获响应: id={}", K::NAME, request_id);
                    self.settle(queued, Err(CollectorError::MissingResponse { request_id }));
                }
            }
            Err(e) => {
                tracing::warn!("{} 批量请求失败: {}", K::NAME, e);
                for queued in slots.into_iter().flatten() {
                    self.settle(queued, Err(e.clone()));
                }
            }
        }
    }

    /// 完成单个请求: 移出在途表，可缓存则写缓存，然后唤醒等待者
    fn settle(&self, queued: Queued<K>, result: Result<K::Response, CollectorError>) {
        {
            let mut state = self.lock_state();
            state.pending.remove(&queued.hash);
            if let Ok(response) = &result {
                if K::is_cacheable(response) {
                    if let Some(evicted) = state.cache.insert(queued.hash.clone(), response.clone())
                    {
                        tracing::trace!("{} 缓存淘汰: hash={}", K::NAME, evicted);
                    }
                }
            }
        }
        let _ = queued.resolver.send(result);
    }
}
