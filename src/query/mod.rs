// ==========================================
// IP 目录管理系统 - 查询层
// ==========================================
// 职责: 类型化查询条件 → 参数化 SQL
// 红线: 只生成语句,不执行
// ==========================================

pub mod composer;
pub mod criteria;
pub mod sql_builder;

pub use composer::{compose_search, compose_type_tree};
pub use criteria::SearchCriteria;
pub use sql_builder::{ComposedQuery, SqlQueryBuilder};
