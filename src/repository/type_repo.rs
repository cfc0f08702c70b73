// ==========================================
// IP 目录管理系统 - 分类树数据仓储
// ==========================================
// 物化路径维护: 保存时按当前父节点重算 path/level,
// 父节点或路径变化时级联重算全部后代
// 红线: 级联与删除重挂在同一作用域内提交,失败整体回滚
// 不变量: path 全局唯一,即同一父节点下不允许重名;
//         名称非空且不含 '/'
// ==========================================


use crate::domain::type_node::{TypeNode, PATH_SEPARATOR};
use crate::domain::types::DanglingParentPolicy;
use crate::repository::error::{RepositoryError, RepositoryResult};
use crate::repository::gateway::{in_scope, opt_int, text, Row, RowExt, StorageGateway};
use rusqlite::types::Value;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

const SELECT_COLUMNS: &str =
    "id, name, parent_id, path, level, description, created_at, updated_at";

const SCOPE_SAVE: &str = "type_save";
const SCOPE_DELETE: &str = "type_delete";

// ==========================================
// TypeRepository - 分类树仓储
// ==========================================
pub struct TypeRepository {
    gateway: Arc<dyn StorageGateway>,
    dangling_parent_policy: DanglingParentPolicy,
}

impl TypeRepository {
    pub fn new(gateway: Arc<dyn StorageGateway>) -> Self {
        Self {
            gateway,
            dangling_parent_policy: DanglingParentPolicy::default(),
        }
    }

    /// 指定悬空父引用策略
    pub fn with_policy(mut self, policy: DanglingParentPolicy) -> Self {
        self.dangling_parent_policy = policy;
        self
    }

    pub fn policy(&self) -> DanglingParentPolicy {
        self.dangling_parent_policy
    }

    // ==========================================
    // 查询操作
    // ==========================================

    pub fn find_by_id(&self, id: i64) -> RepositoryResult<Option<TypeNode>> {
        self.query_one(
            &format!("SELECT {} FROM types WHERE id = ?", SELECT_COLUMNS),
            &[Value::Integer(id)],
        )
    }

    /// 按名称查询; 重名时返回层级最浅者
    pub fn find_by_name(&self, name: &str) -> RepositoryResult<Option<TypeNode>> {
        self.query_one(
            &format!(
                "SELECT {} FROM types WHERE name = ? ORDER BY level, path LIMIT 1",
                SELECT_COLUMNS
            ),
            &[text(name)],
        )
    }

    pub fn find_by_path(&self, path: &str) -> RepositoryResult<Option<TypeNode>> {
        self.query_one(
            &format!("SELECT {} FROM types WHERE path = ?", SELECT_COLUMNS),
            &[text(path)],
        )
    }

    /// 全部节点,按 path 排序 (先序)
    pub fn find_all(&self) -> RepositoryResult<Vec<TypeNode>> {
        self.query_nodes(
            &format!("SELECT {} FROM types ORDER BY path", SELECT_COLUMNS),
            &[],
        )
    }

    /// 根节点 (parent_id 为空),按名称排序
    pub fn find_roots(&self) -> RepositoryResult<Vec<TypeNode>> {
        self.query_nodes(
            &format!(
                "SELECT {} FROM types WHERE parent_id IS NULL ORDER BY name",
                SELECT_COLUMNS
            ),
            &[],
        )
    }

    /// 直接子节点,按名称排序; 未持久化节点返回空
    pub fn find_children(&self, node: &TypeNode) -> RepositoryResult<Vec<TypeNode>> {
        let Some(id) = node.id else {
            return Ok(Vec::new());
        };
        self.query_nodes(
            &format!(
                "SELECT {} FROM types WHERE parent_id = ? ORDER BY name",
                SELECT_COLUMNS
            ),
            &[Value::Integer(id)],
        )
    }

    /// 全部后代 (path 以 "node.path/" 开头),按 path 排序
    ///
    /// 未持久化或 path 为空的节点返回空
    pub fn find_descendants(&self, node: &TypeNode) -> RepositoryResult<Vec<TypeNode>> {
        if node.id.is_none() || node.path.is_empty() {
            return Ok(Vec::new());
        }
        self.find_by_path_prefix(&node.path)
    }

    /// 祖先链 (根 → 父),一次 IN 查询取回
    pub fn find_ancestors(&self, node: &TypeNode) -> RepositoryResult<Vec<TypeNode>> {
        let paths = node.ancestor_paths();
        if paths.is_empty() {
            return Ok(Vec::new());
        }

        let placeholders = vec!["?"; paths.len()].join(", ");
        let params: Vec<Value> = paths.iter().map(|p| text(p)).collect();
        self.query_nodes(
            &format!(
                "SELECT {} FROM types WHERE path IN ({}) ORDER BY length(path)",
                SELECT_COLUMNS, placeholders
            ),
            &params,
        )
    }

    // ==========================================
    // 写入操作
    // ==========================================

    /// 保存节点 (新建或更新)
    ///
    /// - 按当前父节点重算 path/level 并回写到 `node`
    /// - 已持久化节点的父节点或路径发生变化时,级联重算全部后代
    /// - 整个过程在一个作用域内,失败时存储回到调用前状态
    pub fn save(&self, node: &mut TypeNode) -> RepositoryResult<()> {
        let result = in_scope(self.gateway.as_ref(), SCOPE_SAVE, || self.save_in_scope(node));
        match &result {
            Ok(()) => info!(type_id = ?node.id, path = %node.path, "分类节点已保存"),
            Err(e) => error!(name = %node.name, error = %e, "分类节点保存失败"),
        }
        result
    }

    /// 删除节点: 先将直接子节点重挂到本节点的父节点,再删除本节点
    ///
    /// # 返回
    /// - Ok(true): 已删除
    /// - Ok(false): 节点未持久化或已不存在
    pub fn delete(&self, node: &TypeNode) -> RepositoryResult<bool> {
        let Some(id) = node.id else {
            return Ok(false);
        };

        let result = in_scope(self.gateway.as_ref(), SCOPE_DELETE, || {
            let Some(persisted) = self.find_by_id(id)? else {
                return Ok(false);
            };

            for mut child in self.find_children(&persisted)? {
                child.parent_id = persisted.parent_id;
                self.save_in_scope(&mut child)?;
            }

            let affected = self
                .gateway
                .execute_statement("DELETE FROM types WHERE id = ?", &[Value::Integer(id)])?;
            Ok(affected > 0)
        });

        match &result {
            Ok(true) => info!(type_id = id, name = %node.name, "分类节点已删除"),
            Ok(false) => debug!(type_id = id, "分类节点不存在,跳过删除"),
            Err(e) => error!(type_id = id, error = %e, "分类节点删除失败"),
        }
        result
    }

    // ==========================================
    // 内部实现
    // ==========================================

    fn save_in_scope(&self, node: &mut TypeNode) -> RepositoryResult<()> {
        TypeNode::validate_name(&node.name)?;

        if let (Some(id), Some(parent_id)) = (node.id, node.parent_id) {
            self.ensure_acyclic(id, parent_id)?;
        }

        let (path, level) = self.resolve_placement(node)?;
        self.ensure_path_free(&path, node.id)?;
        node.path = path;
        node.level = level;

        let id = match node.id {
            None => {
                self.gateway.execute_statement(
                    "INSERT INTO types (name, parent_id, path, level, description) VALUES (?, ?, ?, ?, ?)",
                    &[
                        text(&node.name),
                        opt_int(node.parent_id),
                        text(&node.path),
                        Value::Integer(node.level),
                        text(&node.description),
                    ],
                )?;
                let id = self.gateway.last_inserted_id()?;
                node.id = Some(id);
                id
            }
            Some(id) => {
                let previous = self.find_by_id(id)?.ok_or_else(|| RepositoryError::NotFound {
                    entity: "Type".to_string(),
                    id: id.to_string(),
                })?;

                self.gateway.execute_statement(
                    r#"
                    UPDATE types
                    SET name = ?, parent_id = ?, path = ?, level = ?, description = ?,
                        updated_at = datetime('now')
                    WHERE id = ?
                    "#,
                    &[
                        text(&node.name),
                        opt_int(node.parent_id),
                        text(&node.path),
                        Value::Integer(node.level),
                        text(&node.description),
                        Value::Integer(id),
                    ],
                )?;

                if previous.parent_id != node.parent_id || previous.path != node.path {
                    let updated = self.cascade_descendants(&previous.path)?;
                    info!(
                        type_id = id,
                        old_path = %previous.path,
                        new_path = %node.path,
                        descendants = updated,
                        "分类节点位置变化,后代路径已级联更新"
                    );
                }
                id
            }
        };

        if let Some(stored) = self.find_by_id(id)? {
            node.created_at = stored.created_at;
            node.updated_at = stored.updated_at;
        }
        Ok(())
    }

    /// 按父节点计算 (path, level); 父节点缺失时按策略处理
    fn resolve_placement(&self, node: &TypeNode) -> RepositoryResult<(String, i64)> {
        let Some(parent_id) = node.parent_id else {
            return Ok(TypeNode::placement_under(&node.name, None));
        };

        match self.find_by_id(parent_id)? {
            Some(parent) => Ok(TypeNode::placement_under(&node.name, Some(&parent))),
            None => match self.dangling_parent_policy {
                DanglingParentPolicy::TreatAsRoot => {
                    warn!(
                        type_id = ?node.id,
                        name = %node.name,
                        parent_id,
                        "父节点不存在,按根节点处理"
                    );
                    Ok(TypeNode::placement_under(&node.name, None))
                }
                DanglingParentPolicy::Reject => Err(RepositoryError::DanglingParent {
                    entity: "Type".to_string(),
                    id: node
                        .id
                        .map(|id| id.to_string())
                        .unwrap_or_else(|| node.name.clone()),
                    parent_id,
                }),
            },
        }
    }

    /// 沿新父节点向上走,出现自身或重复节点即判定为环
    fn ensure_acyclic(&self, node_id: i64, parent_id: i64) -> RepositoryResult<()> {
        let mut visited = HashSet::new();
        let mut current = Some(parent_id);

        while let Some(cursor) = current {
            if cursor == node_id || !visited.insert(cursor) {
                return Err(RepositoryError::CycleDetected {
                    entity: "Type".to_string(),
                    id: node_id,
                });
            }
            current = self.find_by_id(cursor)?.and_then(|n| n.parent_id);
        }
        Ok(())
    }

    /// 目标路径已被其他节点占用时返回 SiblingNameConflict
    fn ensure_path_free(&self, path: &str, own_id: Option<i64>) -> RepositoryResult<()> {
        match self.find_by_path(path)? {
            Some(existing) if existing.id != own_id => {
                warn!(path, existing_id = ?existing.id, "目标路径已存在同名分类");
                Err(RepositoryError::SiblingNameConflict {
                    path: path.to_string(),
                })
            }
            _ => Ok(()),
        }
    }

    /// 以旧路径为前缀重算全部后代; 按旧 path 排序保证父先于子
    fn cascade_descendants(&self, old_path: &str) -> RepositoryResult<usize> {
        if old_path.is_empty() {
            return Ok(0);
        }

        let mut updated = 0;
        for descendant in self.find_by_path_prefix(old_path)? {
            let (path, level) = self.resolve_placement(&descendant)?;
            if path == descendant.path && level == descendant.level {
                continue;
            }
            self.ensure_path_free(&path, descendant.id)?;
            self.gateway.execute_statement(
                "UPDATE types SET path = ?, level = ?, updated_at = datetime('now') WHERE id = ?",
                &[
                    text(&path),
                    Value::Integer(level),
                    opt_int(descendant.id),
                ],
            )?;
            updated += 1;
        }
        Ok(updated)
    }

    /// path 以 "prefix/" 开头的全部节点
    ///
    /// 用区间 ["prefix/", "prefix0") 表达前缀: '0' 是 '/' 的下一个字节,
    /// 区分大小写且可走索引 (LIKE 在 SQLite 中默认不区分大小写)
    fn find_by_path_prefix(&self, path: &str) -> RepositoryResult<Vec<TypeNode>> {
        let lower = format!("{}{}", path, PATH_SEPARATOR);
        let upper = format!("{}0", path);
        self.query_nodes(
            &format!(
                "SELECT {} FROM types WHERE path >= ? AND path < ? ORDER BY path",
                SELECT_COLUMNS
            ),
            &[text(&lower), text(&upper)],
        )
    }

    fn query_nodes(&self, sql: &str, params: &[Value]) -> RepositoryResult<Vec<TypeNode>> {
        self.gateway
            .execute_query(sql, params)?
            .iter()
            .map(map_type_row)
            .collect()
    }

    fn query_one(&self, sql: &str, params: &[Value]) -> RepositoryResult<Option<TypeNode>> {
        match self.gateway.execute_query(sql, params)?.first() {
            Some(row) => Ok(Some(map_type_row(row)?)),
            None => Ok(None),
        }
    }
}

fn map_type_row(row: &Row) -> RepositoryResult<TypeNode> {
    Ok(TypeNode {
        id: Some(row.get_i64("id")?),
        name: row.get_string("name")?,
        parent_id: row.get_opt_i64("parent_id")?,
        path: row.get_string("path")?,
        level: row.get_i64("level")?,
        description: row.get_string("description")?,
        created_at: row.get_opt_datetime("created_at")?,
        updated_at: row.get_opt_datetime("updated_at")?,
    })
}
