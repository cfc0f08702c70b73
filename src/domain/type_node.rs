// ==========================================
// IP 目录管理系统 - 分类节点领域模型
// ==========================================
// 物化路径树: 每个节点携带 path (祖先名 + 自身名, '/' 连接) 与 level
// 不变量: path = parent.path + "/" + name (有父) 否则 = name
//         level = parent.level + 1 (有父) 否则 = 0
// ==========================================

use crate::domain::types::DomainError;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// 路径分隔符
pub const PATH_SEPARATOR: char = '/';

// ==========================================
// TypeNode - 分类节点
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TypeNode {
    pub id: Option<i64>,        // 持久化后分配
    pub name: String,
    pub parent_id: Option<i64>,
    pub path: String,           // 物化路径
    pub level: i64,             // 根为 0
    pub description: String,
    pub created_at: Option<NaiveDateTime>,
    pub updated_at: Option<NaiveDateTime>,
}

impl TypeNode {
    /// 创建未持久化的分类节点 (path/level 在保存时计算)
    pub fn new(name: impl Into<String>, parent_id: Option<i64>) -> Self {
        Self {
            id: None,
            name: name.into(),
            parent_id,
            path: String::new(),
            level: 0,
            description: String::new(),
            created_at: None,
            updated_at: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn is_persisted(&self) -> bool {
        self.id.is_some()
    }

    pub fn is_root(&self) -> bool {
        self.parent_id.is_none()
    }

    /// 后代路径前缀: "path/"
    pub fn descendant_prefix(&self) -> String {
        format!("{}{}", self.path, PATH_SEPARATOR)
    }

    /// 本节点是否为 `other` 的祖先 (纯字符串前缀判断)
    pub fn is_ancestor_of(&self, other: &TypeNode) -> bool {
        if self.path.is_empty() || other.path.is_empty() {
            return false;
        }
        other.path.starts_with(&self.descendant_prefix())
    }

    /// 本节点是否为 `other` 的后代
    pub fn is_descendant_of(&self, other: &TypeNode) -> bool {
        other.is_ancestor_of(self)
    }

    /// 祖先路径列表 (根 → 父),不含自身
    pub fn ancestor_paths(&self) -> Vec<String> {
        if self.path.is_empty() {
            return Vec::new();
        }

        let segments: Vec<&str> = self.path.split(PATH_SEPARATOR).collect();
        let mut paths = Vec::with_capacity(segments.len().saturating_sub(1));
        let mut current = String::new();
        for segment in &segments[..segments.len() - 1] {
            if !current.is_empty() {
                current.push(PATH_SEPARATOR);
            }
            current.push_str(segment);
            paths.push(current.clone());
        }
        paths
    }

    /// 校验节点名称: 非空且不含路径分隔符
    ///
    /// 名称中的 '/' 会让 path 伪造出不存在的祖先
    pub fn validate_name(name: &str) -> Result<(), DomainError> {
        if name.trim().is_empty() {
            return Err(DomainError::InvalidTypeName {
                name: name.to_string(),
                reason: "名称不能为空",
            });
        }
        if name.contains(PATH_SEPARATOR) {
            return Err(DomainError::InvalidTypeName {
                name: name.to_string(),
                reason: "名称不能包含路径分隔符 '/'",
            });
        }
        Ok(())
    }

    /// 按父节点计算 (path, level)
    ///
    /// 父节点 path 为空时退化为根路径,与历史数据兼容
    pub fn placement_under(name: &str, parent: Option<&TypeNode>) -> (String, i64) {
        match parent {
            Some(p) if !p.path.is_empty() => {
                (format!("{}{}{}", p.path, PATH_SEPARATOR, name), p.level + 1)
            }
            Some(p) => (name.to_string(), p.level + 1),
            None => (name.to_string(), 0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(path: &str, level: i64) -> TypeNode {
        let name = path.rsplit('/').next().unwrap_or(path).to_string();
        TypeNode {
            path: path.to_string(),
            level,
            ..TypeNode::new(name, None)
        }
    }

    #[test]
    fn test_ancestor_predicates_are_inverse() {
        let digital = node("Digital", 0);
        let cpu = node("Digital/CPU", 1);
        let arm = node("Digital/CPU/ARM", 2);

        assert!(digital.is_ancestor_of(&arm));
        assert!(arm.is_descendant_of(&digital));
        assert!(cpu.is_ancestor_of(&arm));
        assert!(!arm.is_ancestor_of(&cpu));
        assert!(!cpu.is_descendant_of(&arm));
        assert!(!cpu.is_ancestor_of(&cpu));
    }

    #[test]
    fn test_prefix_requires_separator() {
        let cpu = node("Digital/CPU", 1);
        let cpu_ext = node("Digital/CPUX", 1);
        assert!(!cpu.is_ancestor_of(&cpu_ext));
    }

    #[test]
    fn test_empty_path_is_never_related() {
        let empty = TypeNode::new("Floating", None);
        let digital = node("Digital", 0);
        assert!(!empty.is_ancestor_of(&digital));
        assert!(!digital.is_ancestor_of(&empty));
        assert!(empty.ancestor_paths().is_empty());
    }

    #[test]
    fn test_ancestor_paths_root_to_parent() {
        let arm = node("Digital/CPU/ARM", 2);
        assert_eq!(arm.ancestor_paths(), vec!["Digital", "Digital/CPU"]);
        assert!(node("Digital", 0).ancestor_paths().is_empty());
    }

    #[test]
    fn test_validate_name_rejects_separator_and_blank() {
        assert!(TypeNode::validate_name("ARM").is_ok());
        assert!(TypeNode::validate_name("Cortex-A53 (v8)").is_ok());
        assert!(matches!(
            TypeNode::validate_name("A/C"),
            Err(DomainError::InvalidTypeName { .. })
        ));
        assert!(TypeNode::validate_name("").is_err());
        assert!(TypeNode::validate_name("   ").is_err());
    }

    #[test]
    fn test_placement_under_parent() {
        let cpu = node("Digital/CPU", 1);
        assert_eq!(
            TypeNode::placement_under("ARM", Some(&cpu)),
            ("Digital/CPU/ARM".to_string(), 2)
        );
        assert_eq!(
            TypeNode::placement_under("Digital", None),
            ("Digital".to_string(), 0)
        );
    }
}
