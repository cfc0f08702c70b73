// ==========================================
// IP 目录管理系统 - API 层
// ==========================================
// 职责: 面向调用方 (CLI / 服务) 的生命周期操作、导出与视图
// ==========================================

pub mod error;
pub mod export;
pub mod ip_manager;
pub mod tree_view;

// 重导出核心类型
pub use error::{ApiError, ApiResult};
pub use export::{IpHierarchyNode, PackDocument, PackMetadata, PackedIp};
pub use ip_manager::IpManager;
