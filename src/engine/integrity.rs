// ==========================================
// IP 目录管理系统 - 完整性检查引擎
// ==========================================
// 职责: 把存储中的隐性不一致显式化
//   - 分类树: 悬空父引用、path/level 与父节点不符、环路
//   - IP 层级: 悬空父引用、环路、指向不存在的分类/工艺
// 输入: 全量快照 (由调用方经仓储读取)
// 输出: IntegrityReport
// 红线: 只报告,不修复; 引擎不拼 SQL
// ==========================================

use crate::domain::ip::Ip;
use crate::domain::process::Process;
use crate::domain::type_node::TypeNode;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use tracing::{debug, info, warn};

// ==========================================
// IntegrityIssue - 单条问题
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum IntegrityIssue {
    DanglingTypeParent {
        type_id: i64,
        name: String,
        parent_id: i64,
    },
    TypePathMismatch {
        type_id: i64,
        name: String,
        stored_path: String,
        expected_path: String,
        stored_level: i64,
        expected_level: i64,
    },
    TypeCycle {
        type_id: i64,
        name: String,
    },
    DanglingIpParent {
        ip_id: i64,
        name: String,
        parent_ip_id: i64,
    },
    IpCycle {
        ip_id: i64,
        name: String,
    },
    DanglingTypeReference {
        ip_id: i64,
        name: String,
        type_id: i64,
    },
    DanglingProcessReference {
        ip_id: i64,
        name: String,
        process_id: i64,
    },
}

// ==========================================
// IntegrityReport - 检查报告
// ==========================================
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IntegrityReport {
    pub checked_types: usize,
    pub checked_ips: usize,
    pub checked_processes: usize,
    pub issues: Vec<IntegrityIssue>,
}

impl IntegrityReport {
    pub fn is_clean(&self) -> bool {
        self.issues.is_empty()
    }

    pub fn issue_count(&self) -> usize {
        self.issues.len()
    }
}

// ==========================================
// IntegrityChecker - 完整性检查引擎
// ==========================================
// 无状态引擎,所有方法都是纯函数
#[derive(Debug, Default)]
pub struct IntegrityChecker;

impl IntegrityChecker {
    pub fn new() -> Self {
        Self
    }

    /// 检查全量快照
    ///
    /// # 参数
    /// - `types`: 全部分类节点
    /// - `ips`: 全部 IP
    /// - `processes`: 全部工艺
    ///
    /// # 返回
    /// 问题按 分类 → IP 的顺序,各自按 id 升序
    pub fn check(&self, types: &[TypeNode], ips: &[Ip], processes: &[Process]) -> IntegrityReport {
        debug!(
            types = types.len(),
            ips = ips.len(),
            processes = processes.len(),
            "开始完整性检查"
        );

        let mut issues = self.check_types(types);
        issues.extend(self.check_ips(ips, types, processes));

        let report = IntegrityReport {
            checked_types: types.len(),
            checked_ips: ips.len(),
            checked_processes: processes.len(),
            issues,
        };

        if report.is_clean() {
            info!("完整性检查通过");
        } else {
            warn!(issues = report.issue_count(), "完整性检查发现问题");
        }
        report
    }

    // ==========================================
    // 分类树
    // ==========================================

    fn check_types(&self, types: &[TypeNode]) -> Vec<IntegrityIssue> {
        let by_id: HashMap<i64, &TypeNode> = types
            .iter()
            .filter_map(|t| t.id.map(|id| (id, t)))
            .collect();
        let parent_of: HashMap<i64, Option<i64>> =
            by_id.iter().map(|(id, t)| (*id, t.parent_id)).collect();
        let in_cycle = nodes_in_cycles(&parent_of);

        let mut sorted: Vec<(&i64, &&TypeNode)> = by_id.iter().collect();
        sorted.sort_by_key(|(id, _)| **id);

        let mut issues = Vec::new();
        for (&id, node) in sorted {
            if in_cycle.contains(&id) {
                issues.push(IntegrityIssue::TypeCycle {
                    type_id: id,
                    name: node.name.clone(),
                });
                continue;
            }

            let parent = match node.parent_id {
                Some(parent_id) => match by_id.get(&parent_id) {
                    Some(parent) => Some(*parent),
                    None => {
                        issues.push(IntegrityIssue::DanglingTypeParent {
                            type_id: id,
                            name: node.name.clone(),
                            parent_id,
                        });
                        None
                    }
                },
                None => None,
            };

            // 父节点在环中时其 path 本身不可信,不再比对
            if parent.and_then(|p| p.id).is_some_and(|pid| in_cycle.contains(&pid)) {
                continue;
            }

            let (expected_path, expected_level) = TypeNode::placement_under(&node.name, parent);
            if expected_path != node.path || expected_level != node.level {
                issues.push(IntegrityIssue::TypePathMismatch {
                    type_id: id,
                    name: node.name.clone(),
                    stored_path: node.path.clone(),
                    expected_path,
                    stored_level: node.level,
                    expected_level,
                });
            }
        }
        issues
    }

    // ==========================================
    // IP 层级
    // ==========================================

    fn check_ips(
        &self,
        ips: &[Ip],
        types: &[TypeNode],
        processes: &[Process],
    ) -> Vec<IntegrityIssue> {
        let type_ids: HashSet<i64> = types.iter().filter_map(|t| t.id).collect();
        let process_ids: HashSet<i64> = processes.iter().filter_map(|p| p.id).collect();
        let parent_of: HashMap<i64, Option<i64>> = ips
            .iter()
            .filter_map(|ip| ip.id.map(|id| (id, ip.parent_ip_id)))
            .collect();
        let in_cycle = nodes_in_cycles(&parent_of);

        let mut sorted: Vec<&Ip> = ips.iter().filter(|ip| ip.id.is_some()).collect();
        sorted.sort_by_key(|ip| ip.id);

        let mut issues = Vec::new();
        for ip in sorted {
            let Some(id) = ip.id else { continue };

            if in_cycle.contains(&id) {
                issues.push(IntegrityIssue::IpCycle {
                    ip_id: id,
                    name: ip.name.clone(),
                });
            } else if let Some(parent_ip_id) = ip.parent_ip_id {
                if !parent_of.contains_key(&parent_ip_id) {
                    issues.push(IntegrityIssue::DanglingIpParent {
                        ip_id: id,
                        name: ip.name.clone(),
                        parent_ip_id,
                    });
                }
            }

            if !type_ids.contains(&ip.type_id) {
                issues.push(IntegrityIssue::DanglingTypeReference {
                    ip_id: id,
                    name: ip.name.clone(),
                    type_id: ip.type_id,
                });
            }
            if !process_ids.contains(&ip.process_id) {
                issues.push(IntegrityIssue::DanglingProcessReference {
                    ip_id: id,
                    name: ip.name.clone(),
                    process_id: ip.process_id,
                });
            }
        }
        issues
    }
}

/// 找出位于环上的节点 (沿父链能回到自身)
fn nodes_in_cycles(parent_of: &HashMap<i64, Option<i64>>) -> HashSet<i64> {
    let mut in_cycle = HashSet::new();

    for &start in parent_of.keys() {
        let mut visited = HashSet::new();
        let mut current = parent_of.get(&start).copied().flatten();

        while let Some(cursor) = current {
            if cursor == start {
                in_cycle.insert(start);
                break;
            }
            // 进入了不含 start 的环
            if !visited.insert(cursor) {
                break;
            }
            current = parent_of.get(&cursor).copied().flatten();
        }
    }
    in_cycle
}
