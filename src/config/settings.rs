// ==========================================
// IP 目录管理系统 - 运行设置
// ==========================================
// 来源优先级: 环境变量 > 默认值; config_kv 表的覆写见 config_manager
// ==========================================

use crate::db::DEFAULT_BUSY_TIMEOUT_MS;
use crate::domain::types::{DanglingParentPolicy, IpStatus, UnknownKeyPolicy};
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// 新建 IP 的默认版本号
pub const DEFAULT_REVISION: &str = "1.0";

/// 新建 IP 的默认状态
pub const DEFAULT_STATUS: IpStatus = IpStatus::Alpha;

/// 环境变量名
pub mod env_keys {
    pub const DB_PATH: &str = "IPLM_DB_PATH";
    pub const BUSY_TIMEOUT_MS: &str = "IPLM_BUSY_TIMEOUT_MS";
    pub const DANGLING_PARENT_POLICY: &str = "IPLM_DANGLING_PARENT_POLICY";
    pub const UNKNOWN_KEY_POLICY: &str = "IPLM_UNKNOWN_KEY_POLICY";
}

// ==========================================
// CatalogSettings - 目录系统设置
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogSettings {
    pub db_path: String,
    pub busy_timeout_ms: u64,
    pub dangling_parent_policy: DanglingParentPolicy,
    pub unknown_key_policy: UnknownKeyPolicy,
}

impl Default for CatalogSettings {
    fn default() -> Self {
        Self {
            db_path: get_default_db_path(),
            busy_timeout_ms: DEFAULT_BUSY_TIMEOUT_MS,
            dangling_parent_policy: DanglingParentPolicy::default(),
            unknown_key_policy: UnknownKeyPolicy::default(),
        }
    }
}

impl CatalogSettings {
    /// 从进程环境变量加载
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// 从任意键值来源加载 (便于测试)
    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut settings = Self::default();
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(path) = non_empty(env_keys::DB_PATH) {
            settings.db_path = path.trim().to_string();
        }

        if let Some(raw) = non_empty(env_keys::BUSY_TIMEOUT_MS) {
            settings.busy_timeout_ms = raw.trim().parse::<u64>().with_context(|| {
                format!("{} 不是合法的毫秒数: {}", env_keys::BUSY_TIMEOUT_MS, raw)
            })?;
        }

        if let Some(raw) = non_empty(env_keys::DANGLING_PARENT_POLICY) {
            settings.dangling_parent_policy = raw
                .parse::<DanglingParentPolicy>()
                .with_context(|| format!("{} 配置无效", env_keys::DANGLING_PARENT_POLICY))?;
        }

        if let Some(raw) = non_empty(env_keys::UNKNOWN_KEY_POLICY) {
            settings.unknown_key_policy = raw
                .parse::<UnknownKeyPolicy>()
                .with_context(|| format!("{} 配置无效", env_keys::UNKNOWN_KEY_POLICY))?;
        }

        Ok(settings)
    }
}

/// 获取默认数据库路径
///
/// # 返回
/// - 用户数据目录/iplm/iplm.db
/// - 拿不到数据目录时回退到 ./iplm.db
pub fn get_default_db_path() -> String {
    let mut path = PathBuf::from("./iplm.db");

    if let Some(data_dir) = dirs::data_dir() {
        let dir = data_dir.join("iplm");
        // 目录创建失败时仍回退到当前目录
        if std::fs::create_dir_all(&dir).is_ok() {
            path = dir.join("iplm.db");
        }
    }

    path.to_string_lossy().to_string()
}
