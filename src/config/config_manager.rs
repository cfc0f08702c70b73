// ==========================================
// IP 目录管理系统 - 配置管理器
// ==========================================
// 职责: config_kv 表的读写、策略覆写、配置快照
// 存储: config_kv 表 (key-value)
// ==========================================

use crate::config::settings::CatalogSettings;
use crate::domain::types::{DanglingParentPolicy, UnknownKeyPolicy};
use crate::repository::error::{RepositoryError, RepositoryResult};
use crate::repository::gateway::{text, RowExt, StorageGateway};
use serde_json::json;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::warn;

// ==========================================
// ConfigManager - 配置管理器
// ==========================================
pub struct ConfigManager {
    gateway: Arc<dyn StorageGateway>,
}

impl ConfigManager {
    pub fn new(gateway: Arc<dyn StorageGateway>) -> Self {
        Self { gateway }
    }

    /// 读取配置值
    ///
    /// # 返回
    /// - Some(String): 配置值
    /// - None: 配置不存在
    pub fn get_config_value(&self, key: &str) -> RepositoryResult<Option<String>> {
        let rows = self
            .gateway
            .execute_query("SELECT value FROM config_kv WHERE key = ?", &[text(key)])?;
        match rows.first() {
            Some(row) => Ok(Some(row.get_string("value")?)),
            None => Ok(None),
        }
    }

    /// 写入配置值 (UPSERT)
    pub fn set_config_value(&self, key: &str, value: &str) -> RepositoryResult<()> {
        self.gateway.execute_statement(
            "INSERT INTO config_kv (key, value) VALUES (?, ?)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = datetime('now')",
            &[text(key), text(value)],
        )?;
        Ok(())
    }

    /// 在基础设置上叠加 config_kv 中的策略覆写
    ///
    /// 说明: 存储中的非法取值不阻断启动,记录告警后沿用基础值
    pub fn apply_overrides(&self, base: CatalogSettings) -> RepositoryResult<CatalogSettings> {
        let mut settings = base;

        if let Some(raw) = self.get_config_value(config_keys::DANGLING_PARENT_POLICY)? {
            match raw.parse::<DanglingParentPolicy>() {
                Ok(policy) => settings.dangling_parent_policy = policy,
                Err(e) => warn!(
                    config_key = config_keys::DANGLING_PARENT_POLICY,
                    raw_value = %raw,
                    error = %e,
                    "悬空父引用策略配置无效，沿用默认值"
                ),
            }
        }

        if let Some(raw) = self.get_config_value(config_keys::UNKNOWN_KEY_POLICY)? {
            match raw.parse::<UnknownKeyPolicy>() {
                Ok(policy) => settings.unknown_key_policy = policy,
                Err(e) => warn!(
                    config_key = config_keys::UNKNOWN_KEY_POLICY,
                    raw_value = %raw,
                    error = %e,
                    "未知字段策略配置无效，沿用默认值"
                ),
            }
        }

        Ok(settings)
    }

    /// 获取所有配置的快照（JSON格式）
    pub fn get_config_snapshot(&self) -> RepositoryResult<String> {
        let rows = self
            .gateway
            .execute_query("SELECT key, value FROM config_kv ORDER BY key", &[])?;

        let mut config_map: BTreeMap<String, String> = BTreeMap::new();
        for row in rows {
            config_map.insert(row.get_string("key")?, row.get_string("value")?);
        }

        serde_json::to_string(&json!(config_map))
            .map_err(|e| RepositoryError::InternalError(format!("配置快照序列化失败: {}", e)))
    }
}

// ==========================================
// 配置键常量
// ==========================================
pub mod config_keys {
    // 分类树
    pub const DANGLING_PARENT_POLICY: &str = "dangling_parent_policy";

    // 查询条件 / 更新字段
    pub const UNKNOWN_KEY_POLICY: &str = "unknown_key_policy";
}
