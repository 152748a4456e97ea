// ==========================================
// 管件安装估价系统 - 分组 (Group) 与树操作
// ==========================================
// 职责: 分组字段；子条目的插入、移除、查找、移动、复制
// 红线:
// - 分组只接受 category == contains 的直接子条目，违规插入失败且子列表不变
// - 子列表是唯一所有权路径，父引用只记录ID
// - 移动操作禁止挂到自身或其后代下（无环）
// ==========================================

use crate::domain::error::{DomainError, DomainResult};
use crate::domain::item::{Item, ItemKind};
use crate::domain::types::Category;
use serde::Serialize;

// ==========================================
// Group - 分组字段
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Group {
    /// 子条目品类约束（创建后不可修改）
    pub(crate) contains: Category,
    pub name: String,
    /// 界面展开状态，不参与计算
    pub expanded: bool,
    pub(crate) items: Vec<Item>,
}

impl Group {
    pub fn new(contains: Category, name: impl Into<String>) -> Self {
        Self {
            contains,
            name: name.into(),
            expanded: true,
            items: Vec::new(),
        }
    }

    pub fn contains(&self) -> Category {
        self.contains
    }

    /// 直接子条目（保持插入顺序）
    pub fn items(&self) -> &[Item] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// 条目查询过滤
#[derive(Debug, Clone, Default)]
pub struct ItemFilter {
    /// 仅返回该品类
    pub category: Option<Category>,
    /// 仅返回叶子条目
    pub leaves_only: bool,
}

impl ItemFilter {
    pub fn leaves() -> Self {
        Self {
            category: None,
            leaves_only: true,
        }
    }

    pub fn category(category: Category) -> Self {
        Self {
            category: Some(category),
            leaves_only: false,
        }
    }

    fn accepts(&self, item: &Item) -> bool {
        if self.leaves_only && item.is_group() {
            return false;
        }
        self.category.map(|c| c == item.category()).unwrap_or(true)
    }
}

// ==========================================
// 树操作（定义在 Item 上，非分组调用返回 NotAGroup）
// ==========================================
impl Item {
    fn group_mut_or_err(&mut self) -> DomainResult<&mut Group> {
        let id = self.id.clone();
        self.as_group_mut().ok_or(DomainError::NotAGroup(id))
    }

    /// 直接子条目（叶子返回空切片）
    pub fn children(&self) -> &[Item] {
        self.as_group().map(|g| g.items()).unwrap_or(&[])
    }

    /// 插入子条目
    ///
    /// # 参数
    /// - `item`: 待插入条目（所有权转移给本分组）
    /// - `after_id`: 插在该直接子条目之后；None 表示追加到末尾
    ///
    /// # 错误
    /// - 品类不匹配 / after_id 不存在 / ID 冲突 / 子树中包含本分组（成环）
    pub fn add_item(&mut self, mut item: Item, after_id: Option<&str>) -> DomainResult<()> {
        let self_id = self.id.clone();
        if item.contains_id(&self_id) {
            return Err(DomainError::CyclicMove {
                item_id: item.id.clone(),
                target_id: self_id,
            });
        }
        if self.contains_id(&item.id) {
            return Err(DomainError::DuplicateId(item.id.clone()));
        }

        let group = self.group_mut_or_err()?;
        if item.category() != group.contains {
            return Err(DomainError::CategoryMismatch {
                group_id: self_id,
                expected: group.contains.to_string(),
                actual: item.category().to_string(),
            });
        }

        let position = match after_id {
            Some(after) => {
                let pos = group
                    .items
                    .iter()
                    .position(|c| c.id == after)
                    .ok_or_else(|| DomainError::AfterItemNotFound(after.to_string()))?;
                pos + 1
            }
            None => group.items.len(),
        };

        item.parent = Some(self_id);
        group.items.insert(position, item);
        Ok(())
    }

    /// 在整棵树中按ID移除条目（由其所属分组移除）
    pub fn remove_item(&mut self, id: &str) -> DomainResult<Item> {
        if self.id == id {
            return Err(DomainError::RootItem(id.to_string()));
        }
        let group = self.group_mut_or_err()?;
        if let Some(pos) = group.items.iter().position(|c| c.id == id) {
            let mut removed = group.items.remove(pos);
            removed.parent = None;
            return Ok(removed);
        }
        for child in group.items.iter_mut().filter(|c| c.is_group()) {
            match child.remove_item(id) {
                Ok(removed) => return Ok(removed),
                Err(DomainError::ItemNotFound(_)) => continue,
                Err(e) => return Err(e),
            }
        }
        Err(DomainError::ItemNotFound(id.to_string()))
    }

    /// 清空直接子条目
    pub fn clear_items(&mut self) -> DomainResult<()> {
        self.group_mut_or_err()?.items.clear();
        Ok(())
    }

    /// 深度优先查找（包含自身）
    pub fn get_item(&self, id: &str, category: Option<Category>) -> Option<&Item> {
        if self.id == id {
            return match category {
                Some(c) if c != self.category() => None,
                _ => Some(self),
            };
        }
        self.children()
            .iter()
            .find_map(|child| child.get_item(id, category))
    }

    pub fn get_item_mut(&mut self, id: &str) -> Option<&mut Item> {
        if self.id == id {
            return Some(self);
        }
        match &mut self.kind {
            ItemKind::Group(group) => group.items.iter_mut().find_map(|c| c.get_item_mut(id)),
            _ => None,
        }
    }

    /// 深度优先收集（包含自身）
    pub fn get_items(&self, filter: &ItemFilter) -> Vec<&Item> {
        let mut out = Vec::new();
        self.collect_items(filter, &mut out);
        out
    }

    fn collect_items<'a>(&'a self, filter: &ItemFilter, out: &mut Vec<&'a Item>) {
        if filter.accepts(self) {
            out.push(self);
        }
        for child in self.children() {
            child.collect_items(filter, out);
        }
    }

    /// 子树（含自身）中是否存在该ID
    pub fn contains_id(&self, id: &str) -> bool {
        self.get_item(id, None).is_some()
    }

    /// 祖先ID列表（最近的父分组在前，根在最后），条目不存在时返回 None
    pub fn ancestors(&self, id: &str) -> Option<Vec<String>> {
        let mut chain = self.path_to(id)?;
        chain.reverse();
        Some(chain)
    }

    /// 从根到条目的路径（根在前，不含条目自身），一次深度优先遍历
    pub fn path_to(&self, id: &str) -> Option<Vec<String>> {
        let mut path = Vec::new();
        if self.find_path(id, &mut path) {
            Some(path)
        } else {
            None
        }
    }

    fn find_path(&self, id: &str, path: &mut Vec<String>) -> bool {
        if self.id == id {
            return true;
        }
        path.push(self.id.clone());
        if self.children().iter().any(|child| child.find_path(id, path)) {
            return true;
        }
        path.pop();
        false
    }

    /// 先序访问子树（含自身）
    pub fn for_each_mut<F: FnMut(&mut Item)>(&mut self, f: &mut F) {
        f(self);
        if let ItemKind::Group(group) = &mut self.kind {
            for child in group.items.iter_mut() {
                child.for_each_mut(f);
            }
        }
    }

    /// 沿路径逐层访问（path 首元素须为自身ID，按 path_to 的顺序）
    ///
    /// `nearest_first` 为 true 时由路径末端向根访问
    pub fn visit_path_mut<F: FnMut(&mut Item)>(
        &mut self,
        path: &[String],
        nearest_first: bool,
        f: &mut F,
    ) {
        let Some((head, rest)) = path.split_first() else {
            return;
        };
        if self.id != *head {
            return;
        }
        if !nearest_first {
            f(self);
        }
        if let (Some(next), ItemKind::Group(group)) = (rest.first(), &mut self.kind) {
            if let Some(child) = group.items.iter_mut().find(|c| c.id == *next) {
                child.visit_path_mut(rest, nearest_first, f);
            }
        }
        if nearest_first {
            f(self);
        }
    }

    /// 在树中指定分组下插入（全树范围检查ID唯一）
    pub fn insert_into(
        &mut self,
        group_id: &str,
        item: Item,
        after_id: Option<&str>,
    ) -> DomainResult<()> {
        if let Some(dup) = item
            .get_items(&ItemFilter::default())
            .into_iter()
            .find(|i| self.contains_id(&i.id))
        {
            return Err(DomainError::DuplicateId(dup.id.clone()));
        }
        let target = self
            .get_item_mut(group_id)
            .ok_or_else(|| DomainError::ItemNotFound(group_id.to_string()))?;
        target.add_item(item, after_id)
    }

    /// 移动条目到另一个分组（保持其余条目顺序）
    ///
    /// 所有校验在摘除之前完成，失败时树保持不变
    pub fn move_item(
        &mut self,
        id: &str,
        target_group_id: &str,
        after_id: Option<&str>,
    ) -> DomainResult<()> {
        if self.id == id {
            return Err(DomainError::RootItem(id.to_string()));
        }
        let moving = self
            .get_item(id, None)
            .ok_or_else(|| DomainError::ItemNotFound(id.to_string()))?;
        if moving.contains_id(target_group_id) {
            return Err(DomainError::CyclicMove {
                item_id: id.to_string(),
                target_id: target_group_id.to_string(),
            });
        }
        let moving_category = moving.category();

        let target = self
            .get_item(target_group_id, None)
            .ok_or_else(|| DomainError::ItemNotFound(target_group_id.to_string()))?;
        let group = target
            .as_group()
            .ok_or_else(|| DomainError::NotAGroup(target_group_id.to_string()))?;
        if group.contains != moving_category {
            return Err(DomainError::CategoryMismatch {
                group_id: target_group_id.to_string(),
                expected: group.contains.to_string(),
                actual: moving_category.to_string(),
            });
        }
        if let Some(after) = after_id {
            if after == id || !group.items.iter().any(|c| c.id == after) {
                return Err(DomainError::AfterItemNotFound(after.to_string()));
            }
        }

        let item = self.remove_item(id)?;
        let target = self
            .get_item_mut(target_group_id)
            .ok_or_else(|| DomainError::ItemNotFound(target_group_id.to_string()))?;
        target.add_item(item, after_id)
    }

    /// 复制条目并插入到原条目之后，返回新ID
    pub fn duplicate_item(&mut self, id: &str) -> DomainResult<String> {
        if self.id == id {
            return Err(DomainError::RootItem(id.to_string()));
        }
        let original = self
            .get_item(id, None)
            .ok_or_else(|| DomainError::ItemNotFound(id.to_string()))?;
        let parent_id = original
            .parent_id()
            .ok_or_else(|| DomainError::ItemNotFound(id.to_string()))?
            .to_string();
        let copy = original.duplicate();
        let new_id = copy.id.clone();

        let parent = self
            .get_item_mut(&parent_id)
            .ok_or_else(|| DomainError::ItemNotFound(parent_id.clone()))?;
        parent.add_item(copy, Some(id))?;
        Ok(new_id)
    }
}
