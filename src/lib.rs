// ==========================================
// IP 目录管理系统 - 核心库
// ==========================================
// 技术栈: Rust + SQLite (rusqlite)
// 数据模型: 物化路径分类树 + 邻接表 IP 层级 + 工艺
// ==========================================

// ==========================================
// 模块声明
// ==========================================

// 领域层 - 实体与类型
pub mod domain;

// 数据仓储层 - 数据访问
pub mod repository;

// 查询层 - 条件组合
pub mod query;

// 引擎层 - 完整性检查
pub mod engine;

// 配置层 - 系统配置
pub mod config;

// 数据库基础设施（连接初始化/PRAGMA 统一/建表）
pub mod db;

// 日志系统
pub mod logging;

// API 层 - 生命周期操作
pub mod api;

// ==========================================
// 重导出核心类型
// ==========================================

// 领域类型
pub use domain::{
    DanglingParentPolicy, DomainError, Ip, IpStatus, IpUpdate, Process, TypeNode,
    UnknownKeyPolicy,
};

// 仓储
pub use repository::{
    IpRepository, ProcessRepository, RepositoryError, RepositoryResult, SqliteGateway,
    StorageGateway, TypeRepository,
};

// 查询
pub use query::{ComposedQuery, SearchCriteria};

// 引擎
pub use engine::{IntegrityChecker, IntegrityReport};

// 配置
pub use config::CatalogSettings;

// API
pub use api::{ApiError, ApiResult, IpManager};

// ==========================================
// 常量定义
// ==========================================

// 系统版本
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// 系统名称
pub const APP_NAME: &str = "IP 目录管理系统";
