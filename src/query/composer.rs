// ==========================================
// IP 目录管理系统 - 查询组合器
// ==========================================
// 将 SearchCriteria 翻译为一条 ips ⋈ types ⋈ processes 查询
// 条件顺序: 分类 → 工艺 → IP 自身列 (仅影响可读性,AND 可交换)
// ==========================================

use crate::query::criteria::SearchCriteria;
use crate::query::sql_builder::{ComposedQuery, SqlQueryBuilder};
use rusqlite::types::Value;

pub const TYPE_JOIN: &str = "JOIN types t ON i.type_id = t.id";
pub const PROCESS_JOIN: &str = "JOIN processes p ON i.process_id = p.id";

fn text(v: &Option<String>) -> Option<Value> {
    v.as_ref().map(|s| Value::Text(s.clone()))
}

fn int(v: Option<i64>) -> Option<Value> {
    v.map(Value::Integer)
}

/// 组合条件查询
///
/// # 参数
/// - `criteria`: 查询条件,空条件返回全部 IP
///
/// # 返回
/// - 语句、按条件顺序绑定的参数、条件片段列表
pub fn compose_search(criteria: &SearchCriteria) -> ComposedQuery {
    SqlQueryBuilder::new("SELECT i.* FROM ips i")
        .join_if(criteria.needs_type_join(), TYPE_JOIN)
        .join_if(criteria.needs_process_join(), PROCESS_JOIN)
        // 分类
        .where_eq_if("t.name", text(&criteria.type_name))
        .where_eq_if("i.type_id", int(criteria.type_id))
        // 工艺
        .where_eq_if("p.name", text(&criteria.process_name))
        .where_eq_if("i.process_id", int(criteria.process_id))
        .where_eq_if("p.fab", text(&criteria.fab))
        .where_eq_if("p.node", text(&criteria.node))
        // IP 自身列
        .where_eq_if("i.name", text(&criteria.name))
        .where_eq_if(
            "i.status",
            criteria.status.map(|s| Value::Text(s.as_str().to_string())),
        )
        .where_eq_if("i.provider", text(&criteria.provider))
        .where_eq_if("i.revision", text(&criteria.revision))
        .where_eq_if("i.documentation", text(&criteria.documentation))
        .order_by("i.name ASC")
        .build()
}

/// 按分类 id 集合查询 IP
pub fn compose_type_tree(type_ids: &[i64]) -> ComposedQuery {
    SqlQueryBuilder::new("SELECT * FROM ips")
        .where_in(
            "type_id",
            type_ids.iter().copied().map(Value::Integer).collect(),
        )
        .order_by("name ASC")
        .build()
}
