// ==========================================
// IP 目录管理系统 - 配置层
// ==========================================
// 职责: 运行设置 (环境变量) + config_kv 表覆写
// ==========================================

pub mod config_manager;
pub mod settings;

// 重导出核心配置类型
pub use config_manager::{config_keys, ConfigManager};
pub use settings::{get_default_db_path, CatalogSettings, DEFAULT_REVISION, DEFAULT_STATUS};
