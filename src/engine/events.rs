// ==========================================
// 管件安装估价系统 - 引擎层事件发布
// ==========================================
// 职责: 定义计算状态变更事件与发布 trait
// 说明: Engine 层定义 trait，宿主（界面/存储同步）实现适配器
// ==========================================

use crate::domain::types::{CalcState, Category};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::sync::Arc;
use tokio::sync::mpsc;

// ==========================================
// 计算事件
// ==========================================

/// 条目计算状态变更事件
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalculationEvent {
    pub item_id: String,
    pub category: Category,
    pub from: CalcState,
    pub to: CalcState,
    pub occurred_at: DateTime<Utc>,
}

impl CalculationEvent {
    pub fn transition(item_id: impl Into<String>, category: Category, from: CalcState, to: CalcState) -> Self {
        Self {
            item_id: item_id.into(),
            category,
            from,
            to,
            occurred_at: Utc::now(),
        }
    }
}

// ==========================================
// 事件发布 Trait
// ==========================================

/// 计算事件发布者
///
/// 发布失败只记录日志，不中断计算
pub trait CalculationEventPublisher: Send + Sync {
    fn publish(&self, event: CalculationEvent) -> Result<(), Box<dyn Error + Send + Sync>>;
}

/// 空操作事件发布者（单元测试等不需要事件的场景）
#[derive(Debug, Clone, Default)]
pub struct NoOpEventPublisher;

impl CalculationEventPublisher for NoOpEventPublisher {
    fn publish(&self, event: CalculationEvent) -> Result<(), Box<dyn Error + Send + Sync>> {
        tracing::trace!(
            "NoOpEventPublisher: 跳过事件 - item_id={}, {} -> {}",
            event.item_id,
            event.from,
            event.to
        );
        Ok(())
    }
}

/// 通道事件发布者：把事件转发给宿主的接收端
#[derive(Debug, Clone)]
pub struct ChannelEventPublisher {
    sender: mpsc::UnboundedSender<CalculationEvent>,
}

impl ChannelEventPublisher {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<CalculationEvent>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }
}

impl CalculationEventPublisher for ChannelEventPublisher {
    fn publish(&self, event: CalculationEvent) -> Result<(), Box<dyn Error + Send + Sync>> {
        self.sender
            .send(event)
            .map_err(|e| format!("事件接收端已关闭: item_id={}", e.0.item_id).into())
    }
}

/// 可选的事件发布者包装
pub struct OptionalEventPublisher {
    inner: Option<Arc<dyn CalculationEventPublisher>>,
}

impl OptionalEventPublisher {
    pub fn with_publisher(publisher: Arc<dyn CalculationEventPublisher>) -> Self {
        Self {
            inner: Some(publisher),
        }
    }

    pub fn none() -> Self {
        Self { inner: None }
    }

    /// 发布事件（如果有发布者），失败仅告警
    pub fn publish(&self, event: CalculationEvent) {
        if let Some(publisher) = &self.inner {
            let item_id = event.item_id.clone();
            if let Err(e) = publisher.publish(event) {
                tracing::warn!("计算事件发布失败: item_id={}, error={}", item_id, e);
            }
        }
    }

    pub fn is_configured(&self) -> bool {
        self.inner.is_some()
    }
}

impl Default for OptionalEventPublisher {
    fn default() -> Self {
        Self::none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event() -> CalculationEvent {
        CalculationEvent::transition(
            "item-1",
            Category::PipeFitting,
            CalcState::Idle,
            CalcState::Calculating,
        )
    }

    #[test]
    fn test_noop_publisher() {
        assert!(NoOpEventPublisher.publish(event()).is_ok());
    }

    #[test]
    fn test_optional_publisher_none() {
        let publisher = OptionalEventPublisher::none();
        assert!(!publisher.is_configured());
        publisher.publish(event());
    }

    #[test]
    fn test_channel_publisher_forwards_events() {
        let (publisher, mut receiver) = ChannelEventPublisher::new();
        let optional = OptionalEventPublisher::with_publisher(Arc::new(publisher));
        assert!(optional.is_configured());

        optional.publish(event());
        let received = receiver.try_recv().unwrap();
        assert_eq!(received.item_id, "item-1");
        assert_eq!(received.to, CalcState::Calculating);
    }

    #[test]
    fn test_channel_publisher_closed_receiver() {
        let (publisher, receiver) = ChannelEventPublisher::new();
        drop(receiver);
        assert!(publisher.publish(event()).is_err());
    }
}
