// ==========================================
// IP 目录管理系统 - 领域模型层
// ==========================================
// 职责: 定义领域实体、类型、纯函数规则 (路径计算、前缀判断)
// 红线: 不含数据访问逻辑
// ==========================================

pub mod ip;
pub mod process;
pub mod type_node;
pub mod types;

// 重导出核心类型
pub use ip::{Ip, IpUpdate, UPDATABLE_FIELDS};
pub use process::Process;
pub use type_node::{TypeNode, PATH_SEPARATOR};
pub use types::{DanglingParentPolicy, DomainError, IpStatus, UnknownKeyPolicy};
