// ==========================================
// 集成测试辅助模块
// ==========================================
// 职责: 模拟远程服务、测试数据构建、临时数据库
// ==========================================

#![allow(dead_code)]

pub mod mock_transport;
pub mod test_data_builder;
pub mod test_db;
