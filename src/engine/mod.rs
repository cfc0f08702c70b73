// ==========================================
// IP 目录管理系统 - 引擎层
// ==========================================
// 职责: 基于快照的规则检查
// 红线: Engine 不拼 SQL, 不写存储
// ==========================================

pub mod integrity;

pub use integrity::{IntegrityChecker, IntegrityIssue, IntegrityReport};
