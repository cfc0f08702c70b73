// ==========================================
// IP 目录管理系统 - IP 数据仓储
// ==========================================
// 邻接表层级: parent_ip_id 指向结构父节点
// 遍历时维护 visited 集合,遇到环立即失败
// 红线: 删除不级联,子节点保留悬空链接,由完整性检查报告
// ==========================================


use crate::domain::ip::Ip;
use crate::domain::process::Process;
use crate::domain::type_node::TypeNode;
use crate::domain::types::IpStatus;
use crate::query::sql_builder::ComposedQuery;
use crate::repository::error::{RepositoryError, RepositoryResult};
use crate::repository::gateway::{in_scope, opt_int, text, Row, RowExt, StorageGateway};
use crate::repository::process_repo::ProcessRepository;
use crate::repository::type_repo::TypeRepository;
use rusqlite::types::Value;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

const SELECT_COLUMNS: &str = "id, name, type_id, process_id, parent_ip_id, revision, status, \
     provider, description, documentation, created_at, updated_at";

const SCOPE_ADD_CHILD: &str = "ip_add_child";
const SCOPE_REMOVE_CHILD: &str = "ip_remove_child";

// ==========================================
// IpRepository - IP 仓储
// ==========================================
pub struct IpRepository {
    gateway: Arc<dyn StorageGateway>,
}

impl IpRepository {
    pub fn new(gateway: Arc<dyn StorageGateway>) -> Self {
        Self { gateway }
    }

    // ==========================================
    // 查询操作
    // ==========================================

    pub fn find_by_id(&self, id: i64) -> RepositoryResult<Option<Ip>> {
        self.query_one(
            &format!("SELECT {} FROM ips WHERE id = ?", SELECT_COLUMNS),
            &[Value::Integer(id)],
        )
    }

    pub fn find_by_name(&self, name: &str) -> RepositoryResult<Option<Ip>> {
        self.query_one(
            &format!("SELECT {} FROM ips WHERE name = ?", SELECT_COLUMNS),
            &[text(name)],
        )
    }

    pub fn find_all(&self) -> RepositoryResult<Vec<Ip>> {
        self.query_list(
            &format!("SELECT {} FROM ips ORDER BY name", SELECT_COLUMNS),
            &[],
        )
    }

    /// 顶层 IP (parent_ip_id 为空)
    pub fn find_roots(&self) -> RepositoryResult<Vec<Ip>> {
        self.query_list(
            &format!(
                "SELECT {} FROM ips WHERE parent_ip_id IS NULL ORDER BY name",
                SELECT_COLUMNS
            ),
            &[],
        )
    }

    pub fn find_by_type(&self, type_id: i64) -> RepositoryResult<Vec<Ip>> {
        self.find_by_column("type_id", Value::Integer(type_id))
    }

    pub fn find_by_process(&self, process_id: i64) -> RepositoryResult<Vec<Ip>> {
        self.find_by_column("process_id", Value::Integer(process_id))
    }

    pub fn find_by_status(&self, status: IpStatus) -> RepositoryResult<Vec<Ip>> {
        self.find_by_column("status", text(status.as_str()))
    }

    pub fn find_by_provider(&self, provider: &str) -> RepositoryResult<Vec<Ip>> {
        self.find_by_column("provider", text(provider))
    }

    /// 执行查询组合器生成的语句
    pub fn search(&self, query: &ComposedQuery) -> RepositoryResult<Vec<Ip>> {
        debug!(sql = %query.sql, predicates = ?query.predicates, "执行组合查询");
        self.query_list(&query.sql, &query.params)
    }

    /// IP 所属分类
    pub fn get_type(&self, ip: &Ip) -> RepositoryResult<Option<TypeNode>> {
        TypeRepository::new(Arc::clone(&self.gateway)).find_by_id(ip.type_id)
    }

    /// IP 所用工艺
    pub fn get_process(&self, ip: &Ip) -> RepositoryResult<Option<Process>> {
        ProcessRepository::new(Arc::clone(&self.gateway)).find_by_id(ip.process_id)
    }

    // ==========================================
    // 层级遍历
    // ==========================================

    /// 直接子节点,按名称排序; 未持久化节点返回空
    pub fn get_children(&self, ip: &Ip) -> RepositoryResult<Vec<Ip>> {
        let Some(id) = ip.id else {
            return Ok(Vec::new());
        };
        self.find_by_column("parent_ip_id", Value::Integer(id))
    }

    /// 全部后代 (先序: 每个子节点紧跟其子树,再到下一个兄弟)
    ///
    /// # 返回
    /// - Err(CycleDetected): 同一节点被第二次访问
    pub fn get_all_descendants(&self, ip: &Ip) -> RepositoryResult<Vec<Ip>> {
        let mut visited = HashSet::new();
        if let Some(id) = ip.id {
            visited.insert(id);
        }
        let mut out = Vec::new();
        self.collect_descendants(ip, &mut visited, &mut out)?;
        Ok(out)
    }

    /// 结构父节点; 无父节点或父节点已不存在时返回 None
    pub fn get_parent(&self, ip: &Ip) -> RepositoryResult<Option<Ip>> {
        match ip.parent_ip_id {
            Some(parent_id) => self.find_by_id(parent_id),
            None => Ok(None),
        }
    }

    /// 顶层祖先; 自身无父节点时返回自身
    ///
    /// 父链在悬空引用处终止
    pub fn get_root_ancestor(&self, ip: &Ip) -> RepositoryResult<Ip> {
        let mut visited = HashSet::new();
        if let Some(id) = ip.id {
            visited.insert(id);
        }

        let mut current = ip.clone();
        while let Some(parent_id) = current.parent_ip_id {
            if !visited.insert(parent_id) {
                return Err(cycle(parent_id));
            }
            match self.find_by_id(parent_id)? {
                Some(parent) => current = parent,
                None => {
                    warn!(ip_id = ?current.id, parent_id, "父 IP 不存在,父链在此终止");
                    break;
                }
            }
        }
        Ok(current)
    }

    // ==========================================
    // 写入操作
    // ==========================================

    /// 保存 IP (新建或更新),回写 id 与时间戳
    pub fn save(&self, ip: &mut Ip) -> RepositoryResult<()> {
        let result = self.save_inner(ip);
        match &result {
            Ok(()) => info!(ip_id = ?ip.id, name = %ip.name, status = %ip.status, "IP 已保存"),
            Err(e) => error!(name = %ip.name, error = %e, "IP 保存失败"),
        }
        result
    }

    /// 删除 IP (不级联)
    pub fn delete(&self, ip: &Ip) -> RepositoryResult<bool> {
        let Some(id) = ip.id else {
            return Ok(false);
        };
        let affected = self
            .gateway
            .execute_statement("DELETE FROM ips WHERE id = ?", &[Value::Integer(id)])?;
        if affected > 0 {
            info!(ip_id = id, name = %ip.name, "IP 已删除");
        }
        Ok(affected > 0)
    }

    /// 挂接子节点: child.parent_ip_id = parent.id 并持久化 child
    ///
    /// # 返回
    /// - Ok(false): parent 未持久化,child 不变
    /// - Err(CycleDetected): child 是 parent 自身或其祖先
    pub fn add_child(&self, parent: &Ip, child: &mut Ip) -> RepositoryResult<bool> {
        let Some(parent_id) = parent.id else {
            warn!(parent = %parent.name, child = %child.name, "父 IP 未持久化,无法挂接子节点");
            return Ok(false);
        };

        if let Some(child_id) = child.id {
            self.ensure_not_ancestor(child_id, parent)?;
        }

        let previous = child.parent_ip_id;
        child.parent_ip_id = Some(parent_id);
        match in_scope(self.gateway.as_ref(), SCOPE_ADD_CHILD, || self.save_inner(child)) {
            Ok(()) => {
                info!(parent_id, child_id = ?child.id, "子 IP 已挂接");
                Ok(true)
            }
            Err(e) => {
                child.parent_ip_id = previous;
                error!(parent_id, child = %child.name, error = %e, "子 IP 挂接失败");
                Err(e)
            }
        }
    }

    /// 解除挂接: 仅当 child.parent_ip_id == parent.id 时清空链接并持久化
    ///
    /// # 返回
    /// - Ok(false): 链接不匹配,child 不变
    pub fn remove_child(&self, parent: &Ip, child: &mut Ip) -> RepositoryResult<bool> {
        if parent.id.is_none() || child.parent_ip_id != parent.id {
            debug!(parent = %parent.name, child = %child.name, "父子链接不匹配,跳过解除");
            return Ok(false);
        }

        let previous = child.parent_ip_id;
        child.parent_ip_id = None;
        match in_scope(self.gateway.as_ref(), SCOPE_REMOVE_CHILD, || self.save_inner(child)) {
            Ok(()) => {
                info!(parent_id = ?parent.id, child_id = ?child.id, "子 IP 已解除挂接");
                Ok(true)
            }
            Err(e) => {
                child.parent_ip_id = previous;
                error!(child = %child.name, error = %e, "子 IP 解除挂接失败");
                Err(e)
            }
        }
    }

    // ==========================================
    // 内部实现
    // ==========================================

    fn save_inner(&self, ip: &mut Ip) -> RepositoryResult<()> {
        let id = match ip.id {
            None => {
                self.gateway.execute_statement(
                    r#"
                    INSERT INTO ips (
                        name, type_id, process_id, parent_ip_id, revision, status,
                        provider, description, documentation
                    ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
                    "#,
                    &[
                        text(&ip.name),
                        Value::Integer(ip.type_id),
                        Value::Integer(ip.process_id),
                        opt_int(ip.parent_ip_id),
                        text(&ip.revision),
                        text(ip.status.as_str()),
                        text(&ip.provider),
                        text(&ip.description),
                        text(&ip.documentation),
                    ],
                )?;
                let id = self.gateway.last_inserted_id()?;
                ip.id = Some(id);
                id
            }
            Some(id) => {
                let affected = self.gateway.execute_statement(
                    r#"
                    UPDATE ips
                    SET name = ?, type_id = ?, process_id = ?, parent_ip_id = ?, revision = ?,
                        status = ?, provider = ?, description = ?, documentation = ?,
                        updated_at = datetime('now')
                    WHERE id = ?
                    "#,
                    &[
                        text(&ip.name),
                        Value::Integer(ip.type_id),
                        Value::Integer(ip.process_id),
                        opt_int(ip.parent_ip_id),
                        text(&ip.revision),
                        text(ip.status.as_str()),
                        text(&ip.provider),
                        text(&ip.description),
                        text(&ip.documentation),
                        Value::Integer(id),
                    ],
                )?;
                if affected == 0 {
                    return Err(RepositoryError::NotFound {
                        entity: "Ip".to_string(),
                        id: id.to_string(),
                    });
                }
                id
            }
        };

        if let Some(stored) = self.find_by_id(id)? {
            ip.created_at = stored.created_at;
            ip.updated_at = stored.updated_at;
        }
        Ok(())
    }

    /// child_id 出现在 parent 的父链上 (含 parent 自身) 即为环
    fn ensure_not_ancestor(&self, child_id: i64, parent: &Ip) -> RepositoryResult<()> {
        let mut visited = HashSet::new();
        let mut current = parent.id;

        while let Some(cursor) = current {
            if cursor == child_id {
                return Err(cycle(child_id));
            }
            if !visited.insert(cursor) {
                return Err(cycle(cursor));
            }
            current = self.find_by_id(cursor)?.and_then(|ip| ip.parent_ip_id);
        }
        Ok(())
    }

    fn collect_descendants(
        &self,
        ip: &Ip,
        visited: &mut HashSet<i64>,
        out: &mut Vec<Ip>,
    ) -> RepositoryResult<()> {
        for child in self.get_children(ip)? {
            if let Some(id) = child.id {
                if !visited.insert(id) {
                    return Err(cycle(id));
                }
            }
            out.push(child.clone());
            self.collect_descendants(&child, visited, out)?;
        }
        Ok(())
    }

    fn find_by_column(&self, column: &str, value: Value) -> RepositoryResult<Vec<Ip>> {
        // column 仅来自本模块的常量
        self.query_list(
            &format!(
                "SELECT {} FROM ips WHERE {} = ? ORDER BY name",
                SELECT_COLUMNS, column
            ),
            &[value],
        )
    }

    fn query_list(&self, sql: &str, params: &[Value]) -> RepositoryResult<Vec<Ip>> {
        self.gateway
            .execute_query(sql, params)?
            .iter()
            .map(map_ip_row)
            .collect()
    }

    fn query_one(&self, sql: &str, params: &[Value]) -> RepositoryResult<Option<Ip>> {
        match self.gateway.execute_query(sql, params)?.first() {
            Some(row) => Ok(Some(map_ip_row(row)?)),
            None => Ok(None),
        }
    }
}

fn cycle(id: i64) -> RepositoryError {
    RepositoryError::CycleDetected {
        entity: "Ip".to_string(),
        id,
    }
}

pub(crate) fn map_ip_row(row: &Row) -> RepositoryResult<Ip> {
    let status = row.get_string("status")?.parse::<IpStatus>()?;
    Ok(Ip {
        id: Some(row.get_i64("id")?),
        name: row.get_string("name")?,
        type_id: row.get_i64("type_id")?,
        process_id: row.get_i64("process_id")?,
        parent_ip_id: row.get_opt_i64("parent_ip_id")?,
        revision: row.get_string("revision")?,
        status,
        provider: row.get_string("provider")?,
        description: row.get_string("description")?,
        documentation: row.get_string("documentation")?,
        created_at: row.get_opt_datetime("created_at")?,
        updated_at: row.get_opt_datetime("updated_at")?,
    })
}
