// ==========================================
// IP 目录管理系统 - IP 领域模型
// ==========================================
// 邻接表层级: 每个 IP 可选地指向一个结构父 IP (SoC → 子系统 → 核)
// 红线: 状态在构造期校验,非法值不得进入存储
// ==========================================

use crate::config::settings::DEFAULT_REVISION;
use crate::domain::types::{parse_id_field, DomainError, IpStatus, UnknownKeyPolicy};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use tracing::warn;

// ==========================================
// Ip - 目录条目
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ip {
    pub id: Option<i64>,
    pub name: String,
    pub type_id: i64,
    pub process_id: i64,
    pub parent_ip_id: Option<i64>, // 结构父节点
    pub revision: String,
    pub status: IpStatus,
    pub provider: String,
    pub description: String,
    pub documentation: String,
    pub created_at: Option<NaiveDateTime>,
    pub updated_at: Option<NaiveDateTime>,
}

impl Ip {
    /// 创建未持久化的 IP (默认 revision = 1.0, status = alpha)
    pub fn new(name: impl Into<String>, type_id: i64, process_id: i64) -> Self {
        Self {
            id: None,
            name: name.into(),
            type_id,
            process_id,
            parent_ip_id: None,
            revision: DEFAULT_REVISION.to_string(),
            status: IpStatus::default(),
            provider: String::new(),
            description: String::new(),
            documentation: String::new(),
            created_at: None,
            updated_at: None,
        }
    }

    pub fn with_status(mut self, status: IpStatus) -> Self {
        self.status = status;
        self
    }

    /// 以字符串指定状态,非法值在此处即失败
    pub fn try_with_status(self, status: &str) -> Result<Self, DomainError> {
        let status = status.parse::<IpStatus>()?;
        Ok(self.with_status(status))
    }

    pub fn with_revision(mut self, revision: impl Into<String>) -> Self {
        self.revision = revision.into();
        self
    }

    pub fn with_provider(mut self, provider: impl Into<String>) -> Self {
        self.provider = provider.into();
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_documentation(mut self, documentation: impl Into<String>) -> Self {
        self.documentation = documentation.into();
        self
    }

    pub fn is_persisted(&self) -> bool {
        self.id.is_some()
    }

    pub fn is_root(&self) -> bool {
        self.parent_ip_id.is_none()
    }

    /// 发布: 无条件切换为 production (不校验前置状态)
    pub fn release(&mut self) {
        self.status = IpStatus::Production;
    }
}

// ==========================================
// IpUpdate - 部分字段更新
// ==========================================
// 白名单即下列字段; parent_ip_id 只能通过 add_child/remove_child 修改
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IpUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub type_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub process_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub revision: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<IpStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub documentation: Option<String>,
}

/// 可更新字段白名单
pub const UPDATABLE_FIELDS: [&str; 8] = [
    "name",
    "type_id",
    "process_id",
    "revision",
    "status",
    "provider",
    "description",
    "documentation",
];

impl IpUpdate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn type_id(mut self, type_id: i64) -> Self {
        self.type_id = Some(type_id);
        self
    }

    pub fn process_id(mut self, process_id: i64) -> Self {
        self.process_id = Some(process_id);
        self
    }

    pub fn revision(mut self, revision: impl Into<String>) -> Self {
        self.revision = Some(revision.into());
        self
    }

    pub fn status(mut self, status: IpStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn provider(mut self, provider: impl Into<String>) -> Self {
        self.provider = Some(provider.into());
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn documentation(mut self, documentation: impl Into<String>) -> Self {
        self.documentation = Some(documentation.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// 从字符串键值对构造 (CLI/外部调用入口)
    ///
    /// # 返回
    /// - Ok((update, skipped)): skipped 为被忽略的字段名
    /// - Err: 非法取值,或 Reject 策略下出现白名单外字段
    pub fn from_fields(
        fields: &[(&str, &str)],
        policy: UnknownKeyPolicy,
    ) -> Result<(Self, Vec<String>), DomainError> {
        let mut update = Self::default();
        let mut skipped = Vec::new();

        for (field, value) in fields {
            match *field {
                "name" => update.name = Some(value.to_string()),
                "type_id" => update.type_id = Some(parse_id_field(field, value)?),
                "process_id" => update.process_id = Some(parse_id_field(field, value)?),
                "revision" => update.revision = Some(value.to_string()),
                "status" => update.status = Some(value.parse::<IpStatus>()?),
                "provider" => update.provider = Some(value.to_string()),
                "description" => update.description = Some(value.to_string()),
                "documentation" => update.documentation = Some(value.to_string()),
                other => match policy {
                    UnknownKeyPolicy::Ignore => {
                        warn!(field = other, "字段不在可更新白名单中,已跳过");
                        skipped.push(other.to_string());
                    }
                    UnknownKeyPolicy::Reject => {
                        return Err(DomainError::UnknownField(other.to_string()));
                    }
                },
            }
        }

        Ok((update, skipped))
    }

    /// 应用到目标 IP,返回实际赋值的字段名
    pub fn apply_to(&self, ip: &mut Ip) -> Vec<&'static str> {
        let mut applied = Vec::new();
        if let Some(v) = &self.name {
            ip.name = v.clone();
            applied.push("name");
        }
        if let Some(v) = self.type_id {
            ip.type_id = v;
            applied.push("type_id");
        }
        if let Some(v) = self.process_id {
            ip.process_id = v;
            applied.push("process_id");
        }
        if let Some(v) = &self.revision {
            ip.revision = v.clone();
            applied.push("revision");
        }
        if let Some(v) = self.status {
            ip.status = v;
            applied.push("status");
        }
        if let Some(v) = &self.provider {
            ip.provider = v.clone();
            applied.push("provider");
        }
        if let Some(v) = &self.description {
            ip.description = v.clone();
            applied.push("description");
        }
        if let Some(v) = &self.documentation {
            ip.documentation = v.clone();
            applied.push("documentation");
        }
        applied
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_ip_defaults() {
        let ip = Ip::new("Test_IP", 1, 2);
        assert_eq!(ip.revision, "1.0");
        assert_eq!(ip.status, IpStatus::Alpha);
        assert!(!ip.is_persisted());
        assert!(ip.is_root());
    }

    #[test]
    fn test_invalid_status_rejected_at_construction() {
        let err = Ip::new("Test_IP", 1, 2).try_with_status("bogus").unwrap_err();
        assert!(matches!(err, DomainError::InvalidEnumValue { .. }));
    }

    #[test]
    fn test_release_from_any_status() {
        for status in IpStatus::ALL {
            let mut ip = Ip::new("X", 1, 1).with_status(status);
            ip.release();
            assert_eq!(ip.status, IpStatus::Production);
        }
    }

    #[test]
    fn test_from_fields_skips_outside_allow_list() {
        let (update, skipped) = IpUpdate::from_fields(
            &[("provider", "ARM"), ("parent_ip_id", "3"), ("colour", "red")],
            UnknownKeyPolicy::Ignore,
        )
        .unwrap();

        assert_eq!(update.provider.as_deref(), Some("ARM"));
        assert_eq!(skipped, vec!["parent_ip_id", "colour"]);
    }

    #[test]
    fn test_from_fields_reject_policy() {
        let err = IpUpdate::from_fields(&[("parent_ip_id", "3")], UnknownKeyPolicy::Reject)
            .unwrap_err();
        assert_eq!(err, DomainError::UnknownField("parent_ip_id".to_string()));
    }

    #[test]
    fn test_from_fields_validates_values() {
        assert!(IpUpdate::from_fields(&[("status", "bogus")], UnknownKeyPolicy::Ignore).is_err());
        assert!(IpUpdate::from_fields(&[("type_id", "one")], UnknownKeyPolicy::Ignore).is_err());
    }

    #[test]
    fn test_apply_to_only_touches_supplied_fields() {
        let mut ip = Ip::new("X", 1, 1).with_provider("Synopsys");
        let update = IpUpdate::new().status(IpStatus::Beta).revision("2.0");

        let applied = update.apply_to(&mut ip);

        assert_eq!(applied, vec!["revision", "status"]);
        assert_eq!(ip.status, IpStatus::Beta);
        assert_eq!(ip.revision, "2.0");
        assert_eq!(ip.provider, "Synopsys");
        assert!(IpUpdate::new().is_empty());
    }
}
