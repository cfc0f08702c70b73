// ==========================================
// IP 目录管理系统 - 工艺领域模型
// ==========================================
// 扁平记录,无层级; 仅作为查询的关联目标
// ==========================================

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Process {
    pub id: Option<i64>,
    pub name: String,
    pub node: String, // 工艺节点, 如 28nm
    pub fab: String,  // 代工厂
    pub description: String,
    pub created_at: Option<NaiveDateTime>,
    pub updated_at: Option<NaiveDateTime>,
}

impl Process {
    pub fn new(name: impl Into<String>, node: impl Into<String>, fab: impl Into<String>) -> Self {
        Self {
            id: None,
            name: name.into(),
            node: node.into(),
            fab: fab.into(),
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
}
