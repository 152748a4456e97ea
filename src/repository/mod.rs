// ==========================================
// 管件安装估价系统 - 数据仓储层
// ==========================================
// 红线: Repository 不含业务逻辑
// 职责: 条目树文档的保存与加载，屏蔽数据库细节
// 约束: 所有查询使用参数化,防止 SQL 注入
// ==========================================

pub mod error;
pub mod tree_store;

pub use error::{RepositoryError, RepositoryResult};
pub use tree_store::{MemoryTreeStore, SqliteTreeStore, StoredDocumentInfo, TreeStore};
