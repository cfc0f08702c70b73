// ==========================================
// IP 目录管理系统 - 数据仓储层
// ==========================================
// 红线: Repository 只维护树结构一致性,不含生命周期业务规则
// ==========================================
// 职责: 提供数据访问接口,屏蔽数据库细节
// 约束: 所有查询使用参数化,防止 SQL 注入
// ==========================================

pub mod error;
pub mod gateway;
pub mod ip_repo;
pub mod process_repo;
pub mod type_repo;

// 重导出核心仓储
pub use error::{RepositoryError, RepositoryResult};
pub use gateway::{in_scope, Row, RowExt, SqliteGateway, StorageGateway};
pub use ip_repo::IpRepository;
pub use process_repo::ProcessRepository;
pub use type_repo::TypeRepository;
