// ==========================================
// 管件安装估价系统 - 领域结构错误
// ==========================================
// 职责: 结构性错误（调用方程序错误），同步抛出，不做本地恢复
// 工具: thiserror 派生宏
// ==========================================

use thiserror::Error;

/// 领域结构错误类型
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DomainError {
    // ===== 实例化错误 =====
    #[error("未知品类: {0}")]
    UnknownCategory(String),

    #[error("条目数据格式错误: {0}")]
    MalformedItem(String),

    // ===== 树结构错误 =====
    #[error("品类不匹配: group={group_id} 只接受 {expected}, 实际 {actual}")]
    CategoryMismatch {
        group_id: String,
        expected: String,
        actual: String,
    },

    #[error("条目未找到: id={0}")]
    ItemNotFound(String),

    #[error("插入位置未找到: after_id={0}")]
    AfterItemNotFound(String),

    #[error("条目不是分组: id={0}")]
    NotAGroup(String),

    #[error("重复的条目ID: id={0}")]
    DuplicateId(String),

    #[error("循环挂载: 条目 {item_id} 不能移动到自身或其后代 {target_id} 下")]
    CyclicMove { item_id: String, target_id: String },

    #[error("根分组不可移除或移动: id={0}")]
    RootItem(String),

    // ===== 字段错误 =====
    #[error("字段不适用于该品类: column={column}, category={category}")]
    ColumnNotApplicable { column: String, category: String },

    #[error("字段值错误 (column={column}): {message}")]
    InvalidFieldValue { column: String, message: String },

    #[error("属性值类型错误: name={name}")]
    AttributeType { name: String },
}

/// Result 类型别名
pub type DomainResult<T> = Result<T, DomainError>;
