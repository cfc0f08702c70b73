// ==========================================
// IP 目录管理系统 - 工艺数据仓储
// ==========================================
// 扁平表,无层级维护
// ==========================================

use crate::domain::process::Process;
use crate::repository::error::{RepositoryError, RepositoryResult};
use crate::repository::gateway::{text, Row, RowExt, StorageGateway};
use rusqlite::types::Value;
use std::sync::Arc;
use tracing::{error, info};

const SELECT_COLUMNS: &str = "id, name, node, fab, description, created_at, updated_at";

// ==========================================
// ProcessRepository - 工艺仓储
// ==========================================
pub struct ProcessRepository {
    gateway: Arc<dyn StorageGateway>,
}

impl ProcessRepository {
    pub fn new(gateway: Arc<dyn StorageGateway>) -> Self {
        Self { gateway }
    }

    pub fn find_by_id(&self, id: i64) -> RepositoryResult<Option<Process>> {
        self.query_one(
            &format!("SELECT {} FROM processes WHERE id = ?", SELECT_COLUMNS),
            &[Value::Integer(id)],
        )
    }

    pub fn find_by_name(&self, name: &str) -> RepositoryResult<Option<Process>> {
        self.query_one(
            &format!("SELECT {} FROM processes WHERE name = ?", SELECT_COLUMNS),
            &[text(name)],
        )
    }

    pub fn find_all(&self) -> RepositoryResult<Vec<Process>> {
        self.query_list(
            &format!("SELECT {} FROM processes ORDER BY name", SELECT_COLUMNS),
            &[],
        )
    }

    /// 按代工厂查询
    pub fn find_by_fab(&self, fab: &str) -> RepositoryResult<Vec<Process>> {
        self.query_list(
            &format!(
                "SELECT {} FROM processes WHERE fab = ? ORDER BY name",
                SELECT_COLUMNS
            ),
            &[text(fab)],
        )
    }

    /// 保存工艺 (新建或更新),回写 id 与时间戳
    pub fn save(&self, process: &mut Process) -> RepositoryResult<()> {
        let result = self.save_inner(process);
        match &result {
            Ok(()) => info!(process_id = ?process.id, name = %process.name, "工艺已保存"),
            Err(e) => error!(name = %process.name, error = %e, "工艺保存失败"),
        }
        result
    }

    /// 删除工艺
    ///
    /// # 返回
    /// - Ok(false): 未持久化或记录不存在
    /// - Err(ForeignKeyViolation): 仍被 IP 引用
    pub fn delete(&self, process: &Process) -> RepositoryResult<bool> {
        let Some(id) = process.id else {
            return Ok(false);
        };
        let affected = self
            .gateway
            .execute_statement("DELETE FROM processes WHERE id = ?", &[Value::Integer(id)])?;
        if affected > 0 {
            info!(process_id = id, "工艺已删除");
        }
        Ok(affected > 0)
    }

    fn save_inner(&self, process: &mut Process) -> RepositoryResult<()> {
        let id = match process.id {
            None => {
                self.gateway.execute_statement(
                    "INSERT INTO processes (name, node, fab, description) VALUES (?, ?, ?, ?)",
                    &[
                        text(&process.name),
                        text(&process.node),
                        text(&process.fab),
                        text(&process.description),
                    ],
                )?;
                let id = self.gateway.last_inserted_id()?;
                process.id = Some(id);
                id
            }
            Some(id) => {
                let affected = self.gateway.execute_statement(
                    r#"
                    UPDATE processes
                    SET name = ?, node = ?, fab = ?, description = ?, updated_at = datetime('now')
                    WHERE id = ?
                    "#,
                    &[
                        text(&process.name),
                        text(&process.node),
                        text(&process.fab),
                        text(&process.description),
                        Value::Integer(id),
                    ],
                )?;
                if affected == 0 {
                    return Err(RepositoryError::NotFound {
                        entity: "Process".to_string(),
                        id: id.to_string(),
                    });
                }
                id
            }
        };

        if let Some(stored) = self.find_by_id(id)? {
            process.created_at = stored.created_at;
            process.updated_at = stored.updated_at;
        }
        Ok(())
    }

    fn query_list(&self, sql: &str, params: &[Value]) -> RepositoryResult<Vec<Process>> {
        self.gateway
            .execute_query(sql, params)?
            .iter()
            .map(map_process_row)
            .collect()
    }

    fn query_one(&self, sql: &str, params: &[Value]) -> RepositoryResult<Option<Process>> {
        match self.gateway.execute_query(sql, params)?.first() {
            Some(row) => Ok(Some(map_process_row(row)?)),
            None => Ok(None),
        }
    }
}

fn map_process_row(row: &Row) -> RepositoryResult<Process> {
    Ok(Process {
        id: Some(row.get_i64("id")?),
        name: row.get_string("name")?,
        node: row.get_string("node")?,
        fab: row.get_string("fab")?,
        description: row.get_string("description")?,
        created_at: row.get_opt_datetime("created_at")?,
        updated_at: row.get_opt_datetime("updated_at")?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init_schema;
    use crate::repository::gateway::SqliteGateway;

    fn setup_repo() -> ProcessRepository {
        let gateway = SqliteGateway::in_memory().unwrap();
        {
            let conn = gateway.connection();
            let conn = conn.lock().unwrap();
            init_schema(&conn).unwrap();
        }
        ProcessRepository::new(Arc::new(gateway))
    }

    #[test]
    fn test_save_insert_and_update() {
        let repo = setup_repo();
        let mut process = Process::new("SoC_1", "28nm", "TSMC");
        repo.save(&mut process).unwrap();
        assert!(process.is_persisted());
        assert!(process.created_at.is_some());

        process.node = "16nm".to_string();
        repo.save(&mut process).unwrap();

        let stored = repo.find_by_name("SoC_1").unwrap().unwrap();
        assert_eq!(stored.node, "16nm");
        assert_eq!(stored.id, process.id);
    }

    #[test]
    fn test_update_missing_record_is_not_found() {
        let repo = setup_repo();
        let mut process = Process::new("Ghost", "7nm", "TSMC");
        process.id = Some(42);
        assert!(matches!(
            repo.save(&mut process),
            Err(RepositoryError::NotFound { .. })
        ));
    }

    #[test]
    fn test_duplicate_name_is_unique_violation() {
        let repo = setup_repo();
        repo.save(&mut Process::new("SoC_1", "28nm", "TSMC")).unwrap();
        let err = repo
            .save(&mut Process::new("SoC_1", "40nm", "SMIC"))
            .unwrap_err();
        assert!(matches!(err, RepositoryError::UniqueConstraintViolation(_)));
    }

    #[test]
    fn test_find_by_fab_and_all() {
        let repo = setup_repo();
        for (name, node, fab) in [
            ("N28_HPC", "28nm", "TSMC"),
            ("N40_LP", "40nm", "SMIC"),
            ("N16_FF", "16nm", "TSMC"),
        ] {
            repo.save(&mut Process::new(name, node, fab)).unwrap();
        }

        let tsmc: Vec<String> = repo
            .find_by_fab("TSMC")
            .unwrap()
            .into_iter()
            .map(|p| p.name)
            .collect();
        assert_eq!(tsmc, vec!["N16_FF", "N28_HPC"]);
        assert_eq!(repo.find_all().unwrap().len(), 3);
    }

    #[test]
    fn test_delete() {
        let repo = setup_repo();
        let mut process = Process::new("SoC_1", "28nm", "TSMC");
        repo.save(&mut process).unwrap();

        assert!(repo.delete(&process).unwrap());
        assert!(!repo.delete(&process).unwrap());
        assert!(repo.find_by_id(process.id.unwrap()).unwrap().is_none());
        assert!(!repo.delete(&Process::new("X", "1nm", "Y")).unwrap());
    }
}
