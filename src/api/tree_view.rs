// ==========================================
// IP 目录管理系统 - 文本树视图
// ==========================================
// 缩进: 每层两个空格,节点前缀 "├─ "
// 遍历时维护 visited 集合,环路返回 CycleDetected 而不是无限递归
// ==========================================

use crate::api::export::UNKNOWN_LABEL;
use crate::domain::ip::Ip;
use crate::domain::type_node::TypeNode;
use crate::repository::error::{RepositoryError, RepositoryResult};
use crate::repository::ip_repo::IpRepository;
use crate::repository::type_repo::TypeRepository;
use std::collections::HashSet;

const INDENT: &str = "  ";
const BRANCH: &str = "├─ ";

fn indent(level: usize) -> String {
    INDENT.repeat(level)
}

fn cycle(entity: &str, id: i64) -> RepositoryError {
    RepositoryError::CycleDetected {
        entity: entity.to_string(),
        id,
    }
}

/// 分类树 (从全部根节点开始)
pub fn render_type_tree(repo: &TypeRepository) -> RepositoryResult<String> {
    let mut out = String::new();
    let mut visited = HashSet::new();
    for root in repo.find_roots()? {
        write_type_node(repo, &root, 0, &mut visited, &mut out)?;
    }
    Ok(out)
}

fn write_type_node(
    repo: &TypeRepository,
    node: &TypeNode,
    level: usize,
    visited: &mut HashSet<i64>,
    out: &mut String,
) -> RepositoryResult<()> {
    if let Some(id) = node.id {
        if !visited.insert(id) {
            return Err(cycle("Type", id));
        }
    }
    out.push_str(&format!("{}{}{}\n", indent(level), BRANCH, node.name));
    for child in repo.find_children(node)? {
        write_type_node(repo, &child, level + 1, visited, out)?;
    }
    Ok(())
}

/// 单棵 IP 树
///
/// # 参数
/// - `details`: 是否输出分类/状态/供应商/版本/工艺/描述明细
pub fn render_ip_tree(repo: &IpRepository, root: &Ip, details: bool) -> RepositoryResult<String> {
    let mut out = String::new();
    let mut visited = HashSet::new();
    write_ip_node(repo, root, 0, details, &mut visited, &mut out)?;
    Ok(out)
}

/// 多棵 IP 树,树之间以空行分隔
pub fn render_ip_forest(
    repo: &IpRepository,
    roots: &[Ip],
    details: bool,
) -> RepositoryResult<String> {
    let mut trees = Vec::with_capacity(roots.len());
    for root in roots {
        trees.push(render_ip_tree(repo, root, details)?);
    }
    Ok(trees.join("\n"))
}

fn write_ip_node(
    repo: &IpRepository,
    ip: &Ip,
    level: usize,
    details: bool,
    visited: &mut HashSet<i64>,
    out: &mut String,
) -> RepositoryResult<()> {
    if let Some(id) = ip.id {
        if !visited.insert(id) {
            return Err(cycle("Ip", id));
        }
    }

    let pad = indent(level);
    let type_name = repo
        .get_type(ip)?
        .map(|t| t.name)
        .unwrap_or_else(|| UNKNOWN_LABEL.to_string());

    if details {
        let process_name = repo
            .get_process(ip)?
            .map(|p| p.name)
            .unwrap_or_else(|| UNKNOWN_LABEL.to_string());
        out.push_str(&format!("{}{}{}\n", pad, BRANCH, ip.name));
        out.push_str(&format!("{}   Type: {}\n", pad, type_name));
        out.push_str(&format!("{}   Status: {}\n", pad, ip.status));
        out.push_str(&format!("{}   Provider: {}\n", pad, ip.provider));
        out.push_str(&format!("{}   Revision: {}\n", pad, ip.revision));
        out.push_str(&format!("{}   Process: {}\n", pad, process_name));
        if !ip.description.is_empty() {
            out.push_str(&format!("{}   Description: {}\n", pad, ip.description));
        }
    } else {
        out.push_str(&format!(
            "{}{}{} ({}) - {}\n",
            pad, BRANCH, ip.name, type_name, ip.status
        ));
    }

    for child in repo.get_children(ip)? {
        write_ip_node(repo, &child, level + 1, details, visited, out)?;
    }
    Ok(())
}
