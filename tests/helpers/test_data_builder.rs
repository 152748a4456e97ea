// ==========================================
// 测试数据构建器
// ==========================================

use super::mock_transport::MockPricingTransport;
use pipe_estimate::domain::{CustomItemDefinition, Specification, SpecificationValue};
use pipe_estimate::engine::{ChannelEventPublisher, PricingCollector};
use pipe_estimate::repository::MemoryTreeStore;
use pipe_estimate::{
    CalculationContext, CalculationEngine, CalculationEvent, Category, Column, EstimateDocument,
    FieldValue, Item, PipeFitting, Service,
};
use std::sync::Arc;
use tokio::sync::mpsc::UnboundedReceiver;

/// 管件构建器
pub struct PipeFittingBuilder {
    type_id: Option<String>,
    fitting: PipeFitting,
}

impl PipeFittingBuilder {
    pub fn new(type_id: &str) -> Self {
        Self {
            type_id: Some(type_id.to_string()),
            fitting: PipeFitting::default(),
        }
    }

    pub fn material(mut self, material: &str) -> Self {
        self.fitting.material = Some(material.to_string());
        self
    }

    pub fn dn1(mut self, dn1: f64) -> Self {
        self.fitting.dn1 = Some(dn1);
        self
    }

    pub fn dn2(mut self, dn2: f64) -> Self {
        self.fitting.dn2 = Some(dn2);
        self
    }

    pub fn quantity(mut self, quantity: f64) -> Self {
        self.fitting.quantity = quantity;
        self
    }

    pub fn build(self) -> Item {
        Item::new_pipe_fitting(self.type_id.as_deref(), self.fitting)
    }
}

/// 完整的直管 (typeId 1000)
pub fn complete_pipe(dn1: f64, quantity: f64) -> Item {
    PipeFittingBuilder::new("1000")
        .material("P235")
        .dn1(dn1)
        .quantity(quantity)
        .build()
}

pub fn hourly_service(hours: f64) -> Item {
    Item::new_service(
        Some("5100"),
        Service {
            dn: None,
            quantity: hours,
        },
    )
}

/// root(Group) -> fittings(PipeFitting)
pub fn fittings_document(leaves: Vec<Item>) -> EstimateDocument {
    let mut fittings = Item::new_group(Category::PipeFitting, "fittings");
    for leaf in leaves {
        fittings.add_item(leaf, None).expect("leaf must be a pipe fitting");
    }
    let mut root = Item::new_group(Category::Group, "root");
    root.add_item(fittings, None).expect("group child");
    EstimateDocument::new("estimate-1", root, CalculationContext::default())
}

/// 带 ID 的分组查找（文档内第一个指定品类的分组）
pub fn group_id(doc: &EstimateDocument, contains: Category) -> String {
    doc.root
        .children()
        .iter()
        .find(|c| c.as_group().map(|g| g.contains()) == Some(contains))
        .map(|c| c.id().to_string())
        .expect("group present")
}

/// 自定义支架定义: DN50 单件 12.5，DN100 单件 20
pub fn bracket_definition() -> CustomItemDefinition {
    let spec = |dn1: f64, price: f64| Specification {
        values: vec![SpecificationValue {
            column: Column::Dn1,
            value: FieldValue::Number(dn1),
        }],
        weight: 0.8,
        effort_hours: 0.25,
        material_price: price,
    };
    CustomItemDefinition {
        type_id: "custom:bracket".into(),
        name: "Pipe bracket".into(),
        category: Category::PipeFitting,
        unit: None,
        specifications: vec![spec(50.0, 12.5), spec(100.0, 20.0)],
    }
}

/// 引擎测试夹具
pub struct EngineFixture {
    pub engine: CalculationEngine,
    pub store: Arc<MemoryTreeStore>,
    pub transport: Arc<MockPricingTransport>,
    pub events: UnboundedReceiver<CalculationEvent>,
}

impl EngineFixture {
    pub fn new() -> Self {
        Self::with_transport(MockPricingTransport::new())
    }

    pub fn with_transport(transport: MockPricingTransport) -> Self {
        let transport = Arc::new(transport);
        let store = Arc::new(MemoryTreeStore::new());
        let (publisher, events) = ChannelEventPublisher::new();
        let engine = CalculationEngine::new(
            PricingCollector::with_default_config(transport.clone()),
            store.clone(),
            Some(Arc::new(publisher)),
        );
        Self {
            engine,
            store,
            transport,
            events,
        }
    }

    /// 取出目前收到的全部事件
    pub fn drain_events(&mut self) -> Vec<CalculationEvent> {
        let mut events = Vec::new();
        while let Ok(event) = self.events.try_recv() {
            events.push(event);
        }
        events
    }
}
