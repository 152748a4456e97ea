// ==========================================
// 管件安装估价系统 - 条目 (Item)
// ==========================================
// 职责: 封闭标签联合 (Group | PipeFitting | Service)、实例化工厂、
//       相关列链、完整性判定、计算哈希
// 红线: 品类创建后不可修改；父引用只是ID，不持有所有权
// ==========================================

use crate::domain::attribute::{AttributeName, AttributeSet, AttributeValue};
use crate::domain::error::{DomainError, DomainResult};
use crate::domain::group::Group;
use crate::domain::pipe_fitting::{FittingKind, PipeFitting, PIPE_FITTING_COLUMNS};
use crate::domain::service::{Service, ServiceKind, SERVICE_COLUMNS};
use crate::domain::types::{CalcState, Category, Column, FieldValue, Unit};
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value as JsonValue};
use uuid::Uuid;

/// 自定义条目类型号前缀（本地定义，不走远程目录）
pub const CUSTOM_TYPE_PREFIX: &str = "custom:";

/// 生成新的条目ID
pub fn generate_id() -> String {
    Uuid::new_v4().to_string()
}

// ==========================================
// ItemKind - 品类变体
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "category", rename_all = "camelCase")]
pub enum ItemKind {
    Group(Group),
    PipeFitting(PipeFitting),
    Service(Service),
}

// ==========================================
// Item - 条目
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Item {
    pub(crate) id: String,
    pub(crate) type_id: Option<String>,
    pub(crate) attributes: AttributeSet,
    /// 所属分组ID（非所有权反向引用）
    #[serde(skip)]
    pub(crate) parent: Option<String>,
    #[serde(flatten)]
    pub(crate) kind: ItemKind,
}

impl Item {
    fn from_kind(kind: ItemKind, type_id: Option<String>) -> Self {
        Self {
            id: generate_id(),
            type_id,
            attributes: AttributeSet::new(),
            parent: None,
            kind,
        }
    }

    /// 创建分组
    pub fn new_group(contains: Category, name: impl Into<String>) -> Self {
        Self::from_kind(ItemKind::Group(Group::new(contains, name)), None)
    }

    /// 创建管件
    pub fn new_pipe_fitting(type_id: Option<&str>, fitting: PipeFitting) -> Self {
        Self::from_kind(ItemKind::PipeFitting(fitting), type_id.map(str::to_string))
    }

    /// 创建服务
    pub fn new_service(type_id: Option<&str>, service: Service) -> Self {
        Self::from_kind(ItemKind::Service(service), type_id.map(str::to_string))
    }

    // ===== 基础访问 =====

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn type_id(&self) -> Option<&str> {
        self.type_id.as_deref()
    }

    pub fn parent_id(&self) -> Option<&str> {
        self.parent.as_deref()
    }

    pub fn kind(&self) -> &ItemKind {
        &self.kind
    }

    pub fn category(&self) -> Category {
        match self.kind {
            ItemKind::Group(_) => Category::Group,
            ItemKind::PipeFitting(_) => Category::PipeFitting,
            ItemKind::Service(_) => Category::Service,
        }
    }

    pub fn is_group(&self) -> bool {
        matches!(self.kind, ItemKind::Group(_))
    }

    pub fn as_group(&self) -> Option<&Group> {
        match &self.kind {
            ItemKind::Group(g) => Some(g),
            _ => None,
        }
    }

    pub fn as_group_mut(&mut self) -> Option<&mut Group> {
        match &mut self.kind {
            ItemKind::Group(g) => Some(g),
            _ => None,
        }
    }

    /// 是否为本地自定义条目
    pub fn is_custom(&self) -> bool {
        self.type_id
            .as_deref()
            .map(|t| t.starts_with(CUSTOM_TYPE_PREFIX))
            .unwrap_or(false)
    }

    pub fn quantity(&self) -> Option<f64> {
        match &self.kind {
            ItemKind::PipeFitting(pf) => Some(pf.quantity),
            ItemKind::Service(s) => Some(s.quantity),
            ItemKind::Group(_) => None,
        }
    }

    /// 计量单位（按 typeId 分类；自定义条目的单位见 `CustomItemCatalog::unit_for`）
    pub fn unit(&self) -> Option<Unit> {
        let type_id = self.type_id.as_deref();
        match &self.kind {
            ItemKind::Group(_) => None,
            ItemKind::PipeFitting(_) => Some(
                type_id
                    .and_then(FittingKind::from_type_id)
                    .map(|k| k.unit())
                    .unwrap_or(Unit::Piece),
            ),
            ItemKind::Service(_) => Some(
                type_id
                    .and_then(ServiceKind::from_type_id)
                    .map(|k| k.unit())
                    .unwrap_or(Unit::Piece),
            ),
        }
    }

    // ===== 字段 =====

    /// 本变体可编辑的全部列
    fn editable_columns(&self) -> &'static [Column] {
        match self.kind {
            ItemKind::Group(_) => &[],
            ItemKind::PipeFitting(_) => &PIPE_FITTING_COLUMNS,
            ItemKind::Service(_) => &SERVICE_COLUMNS,
        }
    }

    pub fn field(&self, column: Column) -> Option<FieldValue> {
        if column == Column::TypeId {
            return match self.kind {
                ItemKind::Group(_) => None,
                _ => self.type_id.clone().map(FieldValue::Text),
            };
        }
        match &self.kind {
            ItemKind::Group(_) => None,
            ItemKind::PipeFitting(pf) => pf.field(column),
            ItemKind::Service(s) => s.field(column),
        }
    }

    /// 赋值字段（带类型检查）
    pub fn set_field(&mut self, column: Column, value: Option<FieldValue>) -> DomainResult<()> {
        if !self.editable_columns().contains(&column) {
            return Err(DomainError::ColumnNotApplicable {
                column: column.to_string(),
                category: self.category().to_string(),
            });
        }
        if column == Column::TypeId {
            self.type_id = value.map(|v| v.as_text());
            return Ok(());
        }
        match &mut self.kind {
            ItemKind::PipeFitting(pf) => pf.set_field(column, value),
            ItemKind::Service(s) => s.set_field(column, value),
            ItemKind::Group(_) => Err(DomainError::ColumnNotApplicable {
                column: column.to_string(),
                category: Category::Group.to_string(),
            }),
        }
    }

    /// 相关列链（顺序即依赖顺序）
    pub fn relevant_columns(&self) -> Vec<Column> {
        let type_id = self.type_id.as_deref();
        match &self.kind {
            ItemKind::Group(_) => Vec::new(),
            ItemKind::PipeFitting(_) => {
                PipeFitting::relevant_columns(type_id.and_then(FittingKind::from_type_id))
            }
            ItemKind::Service(_) => {
                Service::relevant_columns(type_id.and_then(ServiceKind::from_type_id))
            }
        }
    }

    /// 第 n 列可用当且仅当前 n-1 列全部非空
    pub fn is_column_available(&self, column: Column) -> bool {
        for c in self.relevant_columns() {
            if c == column {
                return true;
            }
            if self.field(c).is_none() {
                return false;
            }
        }
        false
    }

    /// 是否具备定价所需数据（自定义条目只能通过规格匹配完成）
    pub fn is_complete(&self) -> bool {
        if self.is_group() || self.is_custom() || self.type_id.is_none() {
            return false;
        }
        self.relevant_columns()
            .into_iter()
            .filter(|c| c.is_required())
            .all(|c| self.field(c).is_some())
    }

    // ===== 属性 =====

    pub fn attributes(&self) -> &AttributeSet {
        &self.attributes
    }

    pub fn attributes_mut(&mut self) -> &mut AttributeSet {
        &mut self.attributes
    }

    pub fn get_attribute(&self, name: AttributeName) -> Option<&AttributeValue> {
        self.attributes.get(name)
    }

    pub fn set_attribute(&mut self, name: AttributeName, value: AttributeValue) -> DomainResult<()> {
        self.attributes.set(name, value)
    }

    pub fn delete_attribute(&mut self, name: AttributeName) -> Option<AttributeValue> {
        self.attributes.remove(name)
    }

    pub fn delete_attributes(&mut self, names: &[AttributeName]) {
        self.attributes.remove_all(names)
    }

    /// 当前计算状态（由计算标记推导）
    pub fn calc_state(&self) -> CalcState {
        if self.attributes.flag(AttributeName::Calculating) {
            CalcState::Calculating
        } else if self.attributes.flag(AttributeName::Calculated) {
            CalcState::Calculated
        } else {
            CalcState::Idle
        }
    }

    // ===== 投影与哈希 =====

    /// 完整序列化（含ID、属性、子条目）
    pub fn to_json(&self) -> serde_json::Result<JsonValue> {
        serde_json::to_value(self)
    }

    /// 按相关列顺序投影
    ///
    /// # 参数
    /// - `until`: 截止列（不含），None 表示全部
    /// - `ignore`: 需要跳过的列
    pub fn to_relevant_json(&self, until: Option<Column>, ignore: &[Column]) -> JsonValue {
        let mut map = Map::new();
        map.insert(
            "category".to_string(),
            JsonValue::String(self.category().as_str().to_string()),
        );
        for column in self.relevant_columns() {
            if Some(column) == until {
                break;
            }
            if ignore.contains(&column) {
                continue;
            }
            let value = self.field(column).map(|v| v.to_json()).unwrap_or(JsonValue::Null);
            map.insert(column.as_str().to_string(), value);
        }
        JsonValue::Object(map)
    }

    /// 计算哈希：相关列的规范序列化，用作缓存/去重键
    pub fn calculation_hash(&self) -> String {
        self.to_relevant_json(None, &[]).to_string()
    }

    /// 复制条目：整棵子树重新生成ID，其余快照保持一致
    pub fn duplicate(&self) -> Item {
        let mut copy = self.clone();
        copy.regenerate_ids();
        copy
    }

    fn regenerate_ids(&mut self) {
        self.id = generate_id();
        let parent_id = self.id.clone();
        if let ItemKind::Group(group) = &mut self.kind {
            for child in group.items.iter_mut() {
                child.regenerate_ids();
                child.parent = Some(parent_id.clone());
            }
        }
    }
}

// ==========================================
// 实例化工厂
// ==========================================

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CommonFields {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    type_id: Option<String>,
    #[serde(default)]
    attributes: AttributeSet,
}

#[derive(Deserialize)]
struct GroupFields {
    contains: Category,
    #[serde(default)]
    name: String,
    #[serde(default)]
    expanded: bool,
    #[serde(default)]
    items: Vec<JsonValue>,
}

fn malformed(e: serde_json::Error) -> DomainError {
    DomainError::MalformedItem(e.to_string())
}

/// 按 category 分派构造具体变体
///
/// 分组的子条目逐个经过 `add_item`，因此加载时同样校验品类约束
pub fn instantiate(data: JsonValue) -> DomainResult<Item> {
    let category = data
        .get("category")
        .and_then(JsonValue::as_str)
        .ok_or_else(|| DomainError::UnknownCategory("<missing>".to_string()))?;
    let category = Category::parse(category)
        .ok_or_else(|| DomainError::UnknownCategory(category.to_string()))?;

    let common: CommonFields = serde_json::from_value(data.clone()).map_err(malformed)?;

    let kind = match category {
        Category::Group => {
            let fields: GroupFields = serde_json::from_value(data).map_err(malformed)?;
            let mut group = Group::new(fields.contains, fields.name);
            group.expanded = fields.expanded;
            let mut item = Item {
                id: common.id.unwrap_or_else(generate_id),
                type_id: None,
                attributes: common.attributes,
                parent: None,
                kind: ItemKind::Group(group),
            };
            for child in fields.items {
                item.add_item(instantiate(child)?, None)?;
            }
            return Ok(item);
        }
        Category::PipeFitting => {
            ItemKind::PipeFitting(serde_json::from_value(data).map_err(malformed)?)
        }
        Category::Service => ItemKind::Service(serde_json::from_value(data).map_err(malformed)?),
    };

    Ok(Item {
        id: common.id.unwrap_or_else(generate_id),
        type_id: common.type_id,
        attributes: common.attributes,
        parent: None,
        kind,
    })
}

impl<'de> Deserialize<'de> for Item {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = JsonValue::deserialize(deserializer)?;
        instantiate(value).map_err(D::Error::custom)
    }
}
