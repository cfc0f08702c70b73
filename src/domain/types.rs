// ==========================================
// IP 目录管理系统 - 领域类型定义
// ==========================================
// 状态枚举、策略枚举、领域校验错误
// 序列化格式: 小写 snake_case (与数据库一致)
// ==========================================

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

// ==========================================
// 领域校验错误
// ==========================================
// 构造期即失败,不允许坏数据进入存储
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DomainError {
    #[error("无效的{kind}取值 '{value}', 可选值: {allowed}")]
    InvalidEnumValue {
        kind: &'static str,
        value: String,
        allowed: &'static str,
    },

    #[error("字段 {field} 的值 '{value}' 不是合法整数")]
    InvalidInteger { field: String, value: String },

    #[error("不支持的字段: {0}")]
    UnknownField(String),

    #[error("无效的分类名称 '{name}': {reason}")]
    InvalidTypeName { name: String, reason: &'static str },
}

// ==========================================
// IP 状态 (IP Status)
// ==========================================
// 四值封闭集合; 大小写敏感
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IpStatus {
    #[default]
    Alpha,
    Beta,
    Production,
    Obsolete,
}

impl IpStatus {
    pub const ALL: [IpStatus; 4] = [
        IpStatus::Alpha,
        IpStatus::Beta,
        IpStatus::Production,
        IpStatus::Obsolete,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            IpStatus::Alpha => "alpha",
            IpStatus::Beta => "beta",
            IpStatus::Production => "production",
            IpStatus::Obsolete => "obsolete",
        }
    }
}

impl fmt::Display for IpStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for IpStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "alpha" => Ok(IpStatus::Alpha),
            "beta" => Ok(IpStatus::Beta),
            "production" => Ok(IpStatus::Production),
            "obsolete" => Ok(IpStatus::Obsolete),
            _ => Err(DomainError::InvalidEnumValue {
                kind: "状态",
                value: s.to_string(),
                allowed: "alpha, beta, production, obsolete",
            }),
        }
    }
}

// ==========================================
// 悬空父引用策略 (Dangling Parent Policy)
// ==========================================
// 分类节点的 parent_id 指向不存在的记录时的处理方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DanglingParentPolicy {
    #[default]
    TreatAsRoot, // 视为根节点 (path = name, level = 0),记录告警
    Reject,      // 拒绝保存
}

impl fmt::Display for DanglingParentPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DanglingParentPolicy::TreatAsRoot => write!(f, "treat_as_root"),
            DanglingParentPolicy::Reject => write!(f, "reject"),
        }
    }
}

impl FromStr for DanglingParentPolicy {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "treat_as_root" => Ok(DanglingParentPolicy::TreatAsRoot),
            "reject" => Ok(DanglingParentPolicy::Reject),
            _ => Err(DomainError::InvalidEnumValue {
                kind: "悬空父引用策略",
                value: s.to_string(),
                allowed: "treat_as_root, reject",
            }),
        }
    }
}

// ==========================================
// 未知字段策略 (Unknown Key Policy)
// ==========================================
// 查询条件键 / 更新字段不在白名单中时的处理方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnknownKeyPolicy {
    #[default]
    Ignore, // 记录告警后跳过
    Reject, // 构造期报错
}

impl fmt::Display for UnknownKeyPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UnknownKeyPolicy::Ignore => write!(f, "ignore"),
            UnknownKeyPolicy::Reject => write!(f, "reject"),
        }
    }
}

impl FromStr for UnknownKeyPolicy {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "ignore" => Ok(UnknownKeyPolicy::Ignore),
            "reject" => Ok(UnknownKeyPolicy::Reject),
            _ => Err(DomainError::InvalidEnumValue {
                kind: "未知字段策略",
                value: s.to_string(),
                allowed: "ignore, reject",
            }),
        }
    }
}

/// 解析整数型字段 (type_id / process_id 等)
pub fn parse_id_field(field: &str, value: &str) -> Result<i64, DomainError> {
    value
        .trim()
        .parse::<i64>()
        .map_err(|_| DomainError::InvalidInteger {
            field: field.to_string(),
            value: value.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_round_trip_through_str() {
        for status in IpStatus::ALL {
            assert_eq!(status.as_str().parse::<IpStatus>().unwrap(), status);
        }
    }

    #[test]
    fn test_status_is_case_sensitive() {
        assert!("Alpha".parse::<IpStatus>().is_err());
        assert!("".parse::<IpStatus>().is_err());
        assert!("bogus".parse::<IpStatus>().is_err());
    }

    #[test]
    fn test_status_serde_lowercase() {
        let json = serde_json::to_string(&IpStatus::Production).unwrap();
        assert_eq!(json, "\"production\"");
    }

    #[test]
    fn test_policy_parsing() {
        assert_eq!(
            " Reject ".parse::<DanglingParentPolicy>().unwrap(),
            DanglingParentPolicy::Reject
        );
        assert_eq!(
            "ignore".parse::<UnknownKeyPolicy>().unwrap(),
            UnknownKeyPolicy::Ignore
        );
        assert!("silently".parse::<UnknownKeyPolicy>().is_err());
    }

    #[test]
    fn test_parse_id_field() {
        assert_eq!(parse_id_field("type_id", " 42 ").unwrap(), 42);
        assert!(matches!(
            parse_id_field("type_id", "abc"),
            Err(DomainError::InvalidInteger { .. })
        ));
    }
}
