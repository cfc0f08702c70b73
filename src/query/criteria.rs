// ==========================================
// IP 目录管理系统 - 查询条件
// ==========================================
// 封闭的可选过滤字段集合; 字符串键入口按 UnknownKeyPolicy 处理未知键
// ==========================================

use crate::domain::types::{parse_id_field, DomainError, IpStatus, UnknownKeyPolicy};
use serde::{Deserialize, Serialize};
use tracing::warn;

/// 支持的条件键
pub const CRITERIA_KEYS: [&str; 11] = [
    "type_name",
    "type_id",
    "process_name",
    "process_id",
    "fab",
    "node",
    "name",
    "status",
    "provider",
    "revision",
    "documentation",
];

// ==========================================
// SearchCriteria - IP 查询条件
// ==========================================
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchCriteria {
    // 分类
    #[serde(skip_serializing_if = "Option::is_none")]
    pub type_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub type_id: Option<i64>,

    // 工艺
    #[serde(skip_serializing_if = "Option::is_none")]
    pub process_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub process_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fab: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub node: Option<String>,

    // IP 自身列
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<IpStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub revision: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub documentation: Option<String>,
}

impl SearchCriteria {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn type_name(mut self, v: impl Into<String>) -> Self {
        self.type_name = Some(v.into());
        self
    }

    pub fn type_id(mut self, v: i64) -> Self {
        self.type_id = Some(v);
        self
    }

    pub fn process_name(mut self, v: impl Into<String>) -> Self {
        self.process_name = Some(v.into());
        self
    }

    pub fn process_id(mut self, v: i64) -> Self {
        self.process_id = Some(v);
        self
    }

    pub fn fab(mut self, v: impl Into<String>) -> Self {
        self.fab = Some(v.into());
        self
    }

    pub fn node(mut self, v: impl Into<String>) -> Self {
        self.node = Some(v.into());
        self
    }

    pub fn name(mut self, v: impl Into<String>) -> Self {
        self.name = Some(v.into());
        self
    }

    pub fn status(mut self, v: IpStatus) -> Self {
        self.status = Some(v);
        self
    }

    pub fn provider(mut self, v: impl Into<String>) -> Self {
        self.provider = Some(v.into());
        self
    }

    pub fn revision(mut self, v: impl Into<String>) -> Self {
        self.revision = Some(v.into());
        self
    }

    pub fn documentation(mut self, v: impl Into<String>) -> Self {
        self.documentation = Some(v.into());
        self
    }

    /// 是否需要关联分类表
    pub fn needs_type_join(&self) -> bool {
        self.type_name.is_some() || self.type_id.is_some()
    }

    /// 是否需要关联工艺表
    pub fn needs_process_join(&self) -> bool {
        self.process_name.is_some()
            || self.process_id.is_some()
            || self.fab.is_some()
            || self.node.is_some()
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// 从字符串键值对构造
    ///
    /// # 返回
    /// - Ok((criteria, skipped)): skipped 为 Ignore 策略下被跳过的键
    /// - Err: 非法取值 (状态/整数),或 Reject 策略下出现未知键
    pub fn from_pairs(
        pairs: &[(&str, &str)],
        policy: UnknownKeyPolicy,
    ) -> Result<(Self, Vec<String>), DomainError> {
        let mut criteria = Self::default();
        let mut skipped = Vec::new();

        for (key, value) in pairs {
            match *key {
                "type_name" => criteria.type_name = Some(value.to_string()),
                "type_id" => criteria.type_id = Some(parse_id_field(key, value)?),
                "process_name" => criteria.process_name = Some(value.to_string()),
                "process_id" => criteria.process_id = Some(parse_id_field(key, value)?),
                "fab" => criteria.fab = Some(value.to_string()),
                "node" => criteria.node = Some(value.to_string()),
                "name" => criteria.name = Some(value.to_string()),
                "status" => criteria.status = Some(value.parse::<IpStatus>()?),
                "provider" => criteria.provider = Some(value.to_string()),
                "revision" => criteria.revision = Some(value.to_string()),
                "documentation" => criteria.documentation = Some(value.to_string()),
                other => match policy {
                    UnknownKeyPolicy::Ignore => {
                        warn!(key = other, "未知查询条件,已忽略");
                        skipped.push(other.to_string());
                    }
                    UnknownKeyPolicy::Reject => {
                        return Err(DomainError::UnknownField(other.to_string()));
                    }
                },
            }
        }

        Ok((criteria, skipped))
    }
}
