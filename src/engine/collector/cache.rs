// ==========================================
// 有界结果缓存
// ==========================================
// 淘汰策略: 按创建时间（非访问时间），超出容量时移除最早写入的条目
// ==========================================

use std::collections::HashMap;
use tokio::time::Instant;

struct CacheEntry<V> {
    value: V,
    created_at: Instant,
    seq: u64,
}

pub struct BoundedCache<V> {
    capacity: usize,
    entries: HashMap<String, CacheEntry<V>>,
    next_seq: u64,
}

impl<V> BoundedCache<V> {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            entries: HashMap::new(),
            next_seq: 0,
        }
    }

    /// 读取不刷新条目年龄
    pub fn get(&self, key: &str) -> Option<&V> {
        self.entries.get(key).map(|e| &e.value)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// 写入（覆盖视为重新创建），返回被淘汰的键
    pub fn insert(&mut self, key: String, value: V) -> Option<String> {
        if self.capacity == 0 {
            return None;
        }
        let seq = self.next_seq;
        self.next_seq += 1;
        self.entries.insert(
            key,
            CacheEntry {
                value,
                created_at: Instant::now(),
                seq,
            },
        );

        if self.entries.len() <= self.capacity {
            return None;
        }
        let oldest = self
            .entries
            .iter()
            .min_by_key(|(_, e)| (e.created_at, e.seq))
            .map(|(k, _)| k.clone())?;
        self.entries.remove(&oldest);
        Some(oldest)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
