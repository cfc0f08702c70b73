// ==========================================
// IP 目录管理系统 - SQL 构建工具模块
// ==========================================
// 职责: 流式拼装 SELECT / JOIN / WHERE / ORDER BY,
//       条件值一律以 ? 占位并按出现顺序收集
// 约束: 列名与 JOIN 子句只来自代码常量,外部输入只进入参数
// ==========================================

use rusqlite::types::Value;
use serde::Serialize;

/// 构建结果: 语句 + 按顺序绑定的参数 + 条件列表
#[derive(Debug, Clone, PartialEq)]
pub struct ComposedQuery {
    pub sql: String,
    pub params: Vec<Value>,
    /// 与 params 一一对应的条件片段 (如 "t.name = ?")
    pub predicates: Vec<String>,
}

impl ComposedQuery {
    /// 条件数量
    pub fn predicate_count(&self) -> usize {
        self.predicates.len()
    }

    /// 是否包含指定 JOIN 片段
    pub fn has_join(&self, join: &str) -> bool {
        self.sql.contains(join)
    }

    /// 参数的可读形式 (日志/导出)
    pub fn param_summary(&self) -> Vec<ParamDisplay> {
        self.params.iter().map(ParamDisplay::from).collect()
    }
}

/// 参数展示形式
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ParamDisplay {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
    Blob(usize),
}

impl From<&Value> for ParamDisplay {
    fn from(value: &Value) -> Self {
        match value {
            Value::Null => ParamDisplay::Null,
            Value::Integer(v) => ParamDisplay::Integer(*v),
            Value::Real(v) => ParamDisplay::Real(*v),
            Value::Text(v) => ParamDisplay::Text(v.clone()),
            Value::Blob(v) => ParamDisplay::Blob(v.len()),
        }
    }
}

/// SQL 查询构建器（流式 API）
///
/// # 示例
/// ```
/// use iplm::query::sql_builder::SqlQueryBuilder;
/// use rusqlite::types::Value;
///
/// let query = SqlQueryBuilder::new("SELECT i.* FROM ips i")
///     .join("JOIN types t ON i.type_id = t.id")
///     .where_eq("t.name", Value::Text("CPU".into()))
///     .where_eq_if("i.provider", None)
///     .order_by("i.name ASC")
///     .build();
///
/// assert_eq!(
///     query.sql,
///     "SELECT i.* FROM ips i JOIN types t ON i.type_id = t.id WHERE t.name = ? ORDER BY i.name ASC"
/// );
/// assert_eq!(query.params, vec![Value::Text("CPU".into())]);
/// ```
#[derive(Debug, Clone)]
pub struct SqlQueryBuilder {
    select_clause: String,
    join_clauses: Vec<String>,
    where_clauses: Vec<String>,
    params: Vec<Value>,
    order_by_clause: Option<String>,
    limit_clause: Option<usize>,
}

impl SqlQueryBuilder {
    /// 创建新的 SQL 查询构建器
    pub fn new(select: &str) -> Self {
        Self {
            select_clause: select.to_string(),
            join_clauses: Vec::new(),
            where_clauses: Vec::new(),
            params: Vec::new(),
            order_by_clause: None,
            limit_clause: None,
        }
    }

    /// 添加 JOIN 子句 (重复添加只保留一次)
    pub fn join(mut self, clause: &str) -> Self {
        if !self.join_clauses.iter().any(|c| c == clause) {
            self.join_clauses.push(clause.to_string());
        }
        self
    }

    /// 条件添加 JOIN 子句
    pub fn join_if(self, needed: bool, clause: &str) -> Self {
        if needed {
            self.join(clause)
        } else {
            self
        }
    }

    /// 添加等值条件 `column = ?`
    pub fn where_eq(mut self, column: &str, value: Value) -> Self {
        self.where_clauses.push(format!("{} = ?", column));
        self.params.push(value);
        self
    }

    /// 值存在时添加等值条件
    pub fn where_eq_if(self, column: &str, value: Option<Value>) -> Self {
        match value {
            Some(v) => self.where_eq(column, v),
            None => self,
        }
    }

    /// 添加 `column IN (?, ...)` 条件; 空集合生成恒假条件
    pub fn where_in(mut self, column: &str, values: Vec<Value>) -> Self {
        if values.is_empty() {
            self.where_clauses.push("1 = 0".to_string());
            return self;
        }
        let placeholders = vec!["?"; values.len()].join(", ");
        self.where_clauses
            .push(format!("{} IN ({})", column, placeholders));
        self.params.extend(values);
        self
    }

    /// 添加 ORDER BY 子句
    pub fn order_by(mut self, order: &str) -> Self {
        self.order_by_clause = Some(order.to_string());
        self
    }

    /// 添加 LIMIT 子句
    pub fn limit(mut self, n: usize) -> Self {
        self.limit_clause = Some(n);
        self
    }

    /// 构建最终的 SQL 语句
    pub fn build(self) -> ComposedQuery {
        let mut sql = self.select_clause;

        for join in &self.join_clauses {
            sql.push(' ');
            sql.push_str(join);
        }

        if !self.where_clauses.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&self.where_clauses.join(" AND "));
        }

        if let Some(order) = &self.order_by_clause {
            sql.push_str(" ORDER BY ");
            sql.push_str(order);
        }

        if let Some(limit) = self.limit_clause {
            sql.push_str(&format!(" LIMIT {}", limit));
        }

        ComposedQuery {
            sql,
            params: self.params,
            predicates: self.where_clauses,
        }
    }
}

// ==========================================
// 单元测试
// ==========================================

#[cfg(test)]
mod tests {
    use super::*;

    fn t(s: &str) -> Value {
        Value::Text(s.to_string())
    }

    #[test]
    fn test_sql_builder_basic() {
        let query = SqlQueryBuilder::new("SELECT * FROM ips")
            .where_eq("name", t("SoC"))
            .build();

        assert_eq!(query.sql, "SELECT * FROM ips WHERE name = ?");
        assert_eq!(query.params, vec![t("SoC")]);
        assert_eq!(query.predicates, vec!["name = ?"]);
    }

    #[test]
    fn test_sql_builder_without_conditions() {
        let query = SqlQueryBuilder::new("SELECT * FROM ips")
            .order_by("name ASC")
            .build();

        assert_eq!(query.sql, "SELECT * FROM ips ORDER BY name ASC");
        assert!(query.params.is_empty());
        assert_eq!(query.predicate_count(), 0);
    }

    #[test]
    fn test_sql_builder_with_limit() {
        let query = SqlQueryBuilder::new("SELECT * FROM ips")
            .where_eq("status", t("alpha"))
            .order_by("name ASC")
            .limit(10)
            .build();

        assert_eq!(
            query.sql,
            "SELECT * FROM ips WHERE status = ? ORDER BY name ASC LIMIT 10"
        );
    }

    #[test]
    fn test_sql_builder_multiple_where_clauses_keep_order() {
        let query = SqlQueryBuilder::new("SELECT * FROM ips")
            .where_eq("name", t("a"))
            .where_eq("provider", t("b"))
            .where_eq("revision", t("c"))
            .build();

        assert_eq!(
            query.sql,
            "SELECT * FROM ips WHERE name = ? AND provider = ? AND revision = ?"
        );
        assert_eq!(query.params, vec![t("a"), t("b"), t("c")]);
    }

    #[test]
    fn test_sql_builder_where_eq_if() {
        let query = SqlQueryBuilder::new("SELECT * FROM ips")
            .where_eq_if("name", None)
            .where_eq_if("provider", Some(t("ARM")))
            .build();

        assert!(!query.sql.contains("name = ?"));
        assert_eq!(query.predicates, vec!["provider = ?"]);
    }

    #[test]
    fn test_sql_builder_join_dedup() {
        let query = SqlQueryBuilder::new("SELECT i.* FROM ips i")
            .join("JOIN types t ON i.type_id = t.id")
            .join_if(true, "JOIN types t ON i.type_id = t.id")
            .join_if(false, "JOIN processes p ON i.process_id = p.id")
            .build();

        assert_eq!(query.sql.matches("JOIN types").count(), 1);
        assert!(!query.has_join("JOIN processes"));
    }

    #[test]
    fn test_sql_builder_where_in() {
        let query = SqlQueryBuilder::new("SELECT * FROM ips")
            .where_in("type_id", vec![Value::Integer(1), Value::Integer(2)])
            .build();

        assert_eq!(query.sql, "SELECT * FROM ips WHERE type_id IN (?, ?)");
        assert_eq!(query.params, vec![Value::Integer(1), Value::Integer(2)]);
    }

    #[test]
    fn test_sql_builder_where_in_empty_matches_nothing() {
        let query = SqlQueryBuilder::new("SELECT * FROM ips")
            .where_in("type_id", Vec::new())
            .build();

        assert_eq!(query.sql, "SELECT * FROM ips WHERE 1 = 0");
        assert!(query.params.is_empty());
    }

    #[test]
    fn test_param_summary_serializes_plain_values() {
        let query = SqlQueryBuilder::new("SELECT * FROM ips")
            .where_eq("name", t("SoC"))
            .where_eq("type_id", Value::Integer(3))
            .build();

        let json = serde_json::to_string(&query.param_summary()).unwrap();
        assert_eq!(json, r#"["SoC",3]"#);
    }
}
