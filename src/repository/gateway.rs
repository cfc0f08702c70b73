// ==========================================
// IP 目录管理系统 - 存储网关
// ==========================================
// 职责: 执行参数化查询/写入语句,提供回滚作用域
// 红线: 网关不含业务逻辑
// 约束: 所有语句使用 ? 占位符,禁止拼接外部输入
// ==========================================

use crate::db::{open_in_memory, open_sqlite_connection};
use crate::repository::error::{RepositoryError, RepositoryResult};
use chrono::NaiveDateTime;
use rusqlite::types::Value;
use rusqlite::{params_from_iter, Connection};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, warn};

/// 查询结果行: 列名 → 值
pub type Row = HashMap<String, Value>;

/// 时间戳列的存储格式 (与 SQLite datetime('now') 一致)
pub const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

// ==========================================
// StorageGateway - 存储网关接口
// ==========================================
/// 仓储层唯一依赖的存储能力
///
/// 作用域 (scope) 对应 SQLite 的 SAVEPOINT,可嵌套;
/// 多语句操作(级联路径更新、删除重挂)必须包在同一个作用域中。
pub trait StorageGateway: Send + Sync {
    /// 执行只读查询,返回有序的行列表
    fn execute_query(&self, sql: &str, params: &[Value]) -> RepositoryResult<Vec<Row>>;

    /// 执行写入语句,返回受影响行数
    fn execute_statement(&self, sql: &str, params: &[Value]) -> RepositoryResult<usize>;

    /// 最近一次 INSERT 生成的主键
    fn last_inserted_id(&self) -> RepositoryResult<i64>;

    /// 开启作用域
    fn begin_scope(&self, name: &str) -> RepositoryResult<()>;

    /// 提交作用域
    fn commit_scope(&self, name: &str) -> RepositoryResult<()>;

    /// 回滚作用域
    fn rollback_scope(&self, name: &str) -> RepositoryResult<()>;
}

/// 在一个作用域内执行 `f`: 成功提交,失败整体回滚
pub fn in_scope<T, F>(gateway: &dyn StorageGateway, name: &str, f: F) -> RepositoryResult<T>
where
    F: FnOnce() -> RepositoryResult<T>,
{
    gateway.begin_scope(name)?;
    match f() {
        Ok(value) => {
            gateway.commit_scope(name)?;
            Ok(value)
        }
        Err(err) => {
            if let Err(rollback_err) = gateway.rollback_scope(name) {
                warn!(scope = name, error = %rollback_err, "作用域回滚失败");
            }
            Err(err)
        }
    }
}

fn validate_scope_name(name: &str) -> RepositoryResult<()> {
    let valid = !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_');
    if valid {
        Ok(())
    } else {
        Err(RepositoryError::ValidationError(format!(
            "非法的作用域名称: {}",
            name
        )))
    }
}

// ==========================================
// SqliteGateway - SQLite 实现
// ==========================================
pub struct SqliteGateway {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteGateway {
    /// 打开数据库文件并应用统一 PRAGMA
    pub fn new(db_path: &str) -> RepositoryResult<Self> {
        let conn = open_sqlite_connection(db_path)
            .map_err(|e| RepositoryError::DatabaseConnectionError(e.to_string()))?;
        Ok(Self::from_connection(Arc::new(Mutex::new(conn))))
    }

    /// 内存数据库 (测试/临时目录)
    pub fn in_memory() -> RepositoryResult<Self> {
        let conn = open_in_memory()
            .map_err(|e| RepositoryError::DatabaseConnectionError(e.to_string()))?;
        Ok(Self::from_connection(Arc::new(Mutex::new(conn))))
    }

    /// 从已有连接创建网关
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    /// 共享底层连接 (用于建表等基础设施操作)
    pub fn connection(&self) -> Arc<Mutex<Connection>> {
        Arc::clone(&self.conn)
    }

    fn get_conn(&self) -> RepositoryResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }
}

impl StorageGateway for SqliteGateway {
    fn execute_query(&self, sql: &str, params: &[Value]) -> RepositoryResult<Vec<Row>> {
        debug!(sql = sql, param_count = params.len(), "execute_query");
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(sql)?;
        let columns: Vec<String> = stmt
            .column_names()
            .into_iter()
            .map(String::from)
            .collect();

        let mut rows = stmt.query(params_from_iter(params.iter()))?;
        let mut records = Vec::new();
        while let Some(row) = rows.next()? {
            let mut record = Row::with_capacity(columns.len());
            for (idx, column) in columns.iter().enumerate() {
                record.insert(column.clone(), row.get::<_, Value>(idx)?);
            }
            records.push(record);
        }
        Ok(records)
    }

    fn execute_statement(&self, sql: &str, params: &[Value]) -> RepositoryResult<usize> {
        debug!(sql = sql, param_count = params.len(), "execute_statement");
        let conn = self.get_conn()?;
        let affected = conn.execute(sql, params_from_iter(params.iter()))?;
        Ok(affected)
    }

    fn last_inserted_id(&self) -> RepositoryResult<i64> {
        let conn = self.get_conn()?;
        Ok(conn.last_insert_rowid())
    }

    fn begin_scope(&self, name: &str) -> RepositoryResult<()> {
        validate_scope_name(name)?;
        let conn = self.get_conn()?;
        conn.execute_batch(&format!("SAVEPOINT {}", name))
            .map_err(|e| RepositoryError::DatabaseTransactionError(e.to_string()))
    }

    fn commit_scope(&self, name: &str) -> RepositoryResult<()> {
        validate_scope_name(name)?;
        let conn = self.get_conn()?;
        conn.execute_batch(&format!("RELEASE SAVEPOINT {}", name))
            .map_err(|e| RepositoryError::DatabaseTransactionError(e.to_string()))
    }

    fn rollback_scope(&self, name: &str) -> RepositoryResult<()> {
        validate_scope_name(name)?;
        let conn = self.get_conn()?;
        // ROLLBACK TO 不会移除 savepoint,需要再 RELEASE
        conn.execute_batch(&format!(
            "ROLLBACK TO SAVEPOINT {name}; RELEASE SAVEPOINT {name}"
        ))
        .map_err(|e| RepositoryError::DatabaseTransactionError(e.to_string()))
    }
}

// ==========================================
// 参数/行 辅助
// ==========================================

/// 文本参数
pub fn text(value: &str) -> Value {
    Value::Text(value.to_string())
}

/// 可空整数参数
pub fn opt_int(value: Option<i64>) -> Value {
    value.map(Value::Integer).unwrap_or(Value::Null)
}

/// 行字段读取
pub trait RowExt {
    fn get_i64(&self, column: &str) -> RepositoryResult<i64>;
    fn get_opt_i64(&self, column: &str) -> RepositoryResult<Option<i64>>;
    /// NULL 读作空字符串
    fn get_string(&self, column: &str) -> RepositoryResult<String>;
    /// NULL 读作 None; 非法时间文本报 FieldValueError
    fn get_opt_datetime(&self, column: &str) -> RepositoryResult<Option<NaiveDateTime>>;
}

impl RowExt for Row {
    fn get_i64(&self, column: &str) -> RepositoryResult<i64> {
        match self.get_opt_i64(column)? {
            Some(v) => Ok(v),
            None => Err(RepositoryError::FieldValueError {
                field: column.to_string(),
                message: "不允许为 NULL".to_string(),
            }),
        }
    }

    fn get_opt_i64(&self, column: &str) -> RepositoryResult<Option<i64>> {
        match self.get(column) {
            Some(Value::Integer(v)) => Ok(Some(*v)),
            Some(Value::Null) => Ok(None),
            Some(other) => Err(RepositoryError::FieldValueError {
                field: column.to_string(),
                message: format!("期望整数, 实际为 {:?}", other.data_type()),
            }),
            None => Err(missing_column(column)),
        }
    }

    fn get_string(&self, column: &str) -> RepositoryResult<String> {
        match self.get(column) {
            Some(Value::Text(s)) => Ok(s.clone()),
            Some(Value::Null) => Ok(String::new()),
            Some(Value::Integer(v)) => Ok(v.to_string()),
            Some(Value::Real(v)) => Ok(v.to_string()),
            Some(Value::Blob(_)) => Err(RepositoryError::FieldValueError {
                field: column.to_string(),
                message: "期望文本, 实际为 BLOB".to_string(),
            }),
            None => Err(missing_column(column)),
        }
    }

    fn get_opt_datetime(&self, column: &str) -> RepositoryResult<Option<NaiveDateTime>> {
        match self.get(column) {
            Some(Value::Text(s)) => NaiveDateTime::parse_from_str(s, DATETIME_FORMAT)
                .map(Some)
                .map_err(|e| RepositoryError::FieldValueError {
                    field: column.to_string(),
                    message: format!("时间格式错误 '{}': {}", s, e),
                }),
            Some(Value::Null) => Ok(None),
            Some(other) => Err(RepositoryError::FieldValueError {
                field: column.to_string(),
                message: format!("期望时间文本, 实际为 {:?}", other.data_type()),
            }),
            None => Err(missing_column(column)),
        }
    }
}

fn missing_column(column: &str) -> RepositoryError {
    RepositoryError::FieldValueError {
        field: column.to_string(),
        message: "结果集中缺少该列".to_string(),
    }
}

// ==========================================
// 单元测试
// ==========================================

#[cfg(test)]
mod tests {
    use super::*;

    fn setup_gateway() -> SqliteGateway {
        let gateway = SqliteGateway::in_memory().unwrap();
        gateway
            .execute_statement(
                "CREATE TABLE t (id INTEGER PRIMARY KEY, name TEXT NOT NULL, note TEXT)",
                &[],
            )
            .unwrap();
        gateway
    }

    #[test]
    fn test_query_maps_columns_by_name() {
        let gateway = setup_gateway();
        gateway
            .execute_statement(
                "INSERT INTO t (name, note) VALUES (?, ?)",
                &[text("alpha"), Value::Null],
            )
            .unwrap();
        let id = gateway.last_inserted_id().unwrap();

        let rows = gateway
            .execute_query("SELECT * FROM t WHERE id = ?", &[Value::Integer(id)])
            .unwrap();

        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].get_i64("id").unwrap(), id);
        assert_eq!(rows[0].get_string("name").unwrap(), "alpha");
        assert_eq!(rows[0].get_string("note").unwrap(), "");
        assert!(rows[0].get_string("missing").is_err());
    }

    #[test]
    fn test_statement_returns_affected_rows() {
        let gateway = setup_gateway();
        for name in ["a", "b", "c"] {
            gateway
                .execute_statement("INSERT INTO t (name) VALUES (?)", &[text(name)])
                .unwrap();
        }

        let affected = gateway
            .execute_statement("UPDATE t SET note = ? WHERE name <> ?", &[text("x"), text("a")])
            .unwrap();
        assert_eq!(affected, 2);
    }

    #[test]
    fn test_scope_rollback_discards_all_writes() {
        let gateway = setup_gateway();

        let result: RepositoryResult<()> = in_scope(&gateway, "test_scope", || {
            gateway.execute_statement("INSERT INTO t (name) VALUES (?)", &[text("a")])?;
            gateway.execute_statement("INSERT INTO t (name) VALUES (?)", &[text("b")])?;
            Err(RepositoryError::InternalError("boom".to_string()))
        });
        assert!(result.is_err());

        let rows = gateway.execute_query("SELECT * FROM t", &[]).unwrap();
        assert!(rows.is_empty());
    }

    #[test]
    fn test_nested_scopes_commit() {
        let gateway = setup_gateway();

        in_scope(&gateway, "outer", || {
            gateway.execute_statement("INSERT INTO t (name) VALUES (?)", &[text("a")])?;
            in_scope(&gateway, "inner", || {
                gateway.execute_statement("INSERT INTO t (name) VALUES (?)", &[text("b")])
            })?;
            Ok(())
        })
        .unwrap();

        let rows = gateway.execute_query("SELECT * FROM t", &[]).unwrap();
        assert_eq!(rows.len(), 2);
    }

    #[test]
    fn test_invalid_scope_name_rejected() {
        let gateway = setup_gateway();
        let err = gateway.begin_scope("bad name; DROP TABLE t").unwrap_err();
        assert!(matches!(err, RepositoryError::ValidationError(_)));
    }

    #[test]
    fn test_opt_datetime_reports_malformed_text() {
        let gateway = SqliteGateway::in_memory().unwrap();
        let rows = gateway
            .execute_query(
                "SELECT '2026-03-01 08:30:00' AS ok, NULL AS empty, 'yesterday' AS bad, 42 AS num",
                &[],
            )
            .unwrap();
        let row = &rows[0];

        let ok = row.get_opt_datetime("ok").unwrap().unwrap();
        assert_eq!(ok.format(DATETIME_FORMAT).to_string(), "2026-03-01 08:30:00");
        assert_eq!(row.get_opt_datetime("empty").unwrap(), None);
        assert!(matches!(
            row.get_opt_datetime("bad"),
            Err(RepositoryError::FieldValueError { .. })
        ));
        assert!(row.get_opt_datetime("num").is_err());
        assert!(row.get_opt_datetime("missing").is_err());
    }

    #[test]
    fn test_opt_int_maps_none_to_null() {
        assert_eq!(opt_int(None), Value::Null);
        assert_eq!(opt_int(Some(7)), Value::Integer(7));
    }
}
