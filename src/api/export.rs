// ==========================================
// IP 目录管理系统 - 导出文档
// ==========================================
// pack: 查询结果 + 关联的分类/工艺/父/子,自包含 JSON 文档
// hierarchy: 以某个 IP 为根的嵌套层级树
// ==========================================

use crate::domain::ip::Ip;
use crate::domain::process::Process;
use crate::domain::type_node::TypeNode;
use crate::domain::types::IpStatus;
use crate::query::criteria::SearchCriteria;
use crate::repository::error::{RepositoryError, RepositoryResult};
use crate::repository::ip_repo::IpRepository;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use uuid::Uuid;

/// 关联记录缺失时的展示名
pub const UNKNOWN_LABEL: &str = "Unknown";

// ==========================================
// PackDocument - 打包文档
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PackDocument {
    pub metadata: PackMetadata,
    pub ips: Vec<PackedIp>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PackMetadata {
    pub pack_id: Uuid,
    pub total_ips: usize,
    pub criteria: SearchCriteria, // 原样回显
    pub packed_at: DateTime<Utc>,
}

/// 单个 IP 及其关联数据
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PackedIp {
    #[serde(flatten)]
    pub ip: Ip,
    #[serde(rename = "type")]
    pub type_node: Option<TypeNode>,
    pub process: Option<Process>,
    pub parent: Option<Ip>,
    pub children: Vec<Ip>,
}

impl PackDocument {
    /// 组装打包文档
    ///
    /// # 参数
    /// - `repo`: 用于解析关联数据
    /// - `criteria`: 回显到 metadata
    /// - `ips`: 查询结果
    pub fn assemble(
        repo: &IpRepository,
        criteria: &SearchCriteria,
        ips: Vec<Ip>,
    ) -> RepositoryResult<Self> {
        let mut packed = Vec::with_capacity(ips.len());
        for ip in ips {
            packed.push(PackedIp {
                type_node: repo.get_type(&ip)?,
                process: repo.get_process(&ip)?,
                parent: repo.get_parent(&ip)?,
                children: repo.get_children(&ip)?,
                ip,
            });
        }

        Ok(Self {
            metadata: PackMetadata {
                pack_id: Uuid::new_v4(),
                total_ips: packed.len(),
                criteria: criteria.clone(),
                packed_at: Utc::now(),
            },
            ips: packed,
        })
    }

    pub fn to_json_pretty(&self) -> RepositoryResult<String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| RepositoryError::InternalError(format!("打包文档序列化失败: {}", e)))
    }
}

// ==========================================
// IpHierarchyNode - 层级树节点
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IpHierarchyNode {
    pub id: Option<i64>,
    pub name: String,
    #[serde(rename = "type")]
    pub type_name: String,
    pub status: IpStatus,
    pub children: Vec<IpHierarchyNode>,
}

impl IpHierarchyNode {
    /// 以 `root` 为根递归构建; 遇到重复节点返回 CycleDetected
    pub fn build(repo: &IpRepository, root: &Ip) -> RepositoryResult<Self> {
        let mut visited = HashSet::new();
        Self::build_inner(repo, root, &mut visited)
    }

    /// 节点总数 (含自身)
    pub fn size(&self) -> usize {
        1 + self.children.iter().map(IpHierarchyNode::size).sum::<usize>()
    }

    fn build_inner(
        repo: &IpRepository,
        ip: &Ip,
        visited: &mut HashSet<i64>,
    ) -> RepositoryResult<Self> {
        if let Some(id) = ip.id {
            if !visited.insert(id) {
                return Err(RepositoryError::CycleDetected {
                    entity: "Ip".to_string(),
                    id,
                });
            }
        }

        let type_name = repo
            .get_type(ip)?
            .map(|t| t.name)
            .unwrap_or_else(|| UNKNOWN_LABEL.to_string());

        let mut children = Vec::new();
        for child in repo.get_children(ip)? {
            children.push(Self::build_inner(repo, &child, visited)?);
        }

        Ok(Self {
            id: ip.id,
            name: ip.name.clone(),
            type_name,
            status: ip.status,
            children,
        })
    }
}
