// ==========================================
// IP 目录管理系统 - 仓储层错误类型
// ==========================================
// 工具: thiserror 派生宏
// 约定: "未找到" 不是错误,由 Ok(None) / Ok(vec![]) / Ok(false) 表达
// ==========================================

use crate::domain::types::DomainError;
use thiserror::Error;

/// 仓储层错误类型
#[derive(Error, Debug)]
pub enum RepositoryError {
    // ===== 数据库错误 =====
    #[error("记录未找到: {entity} with id={id}")]
    NotFound { entity: String, id: String },

    #[error("数据库连接失败: {0}")]
    DatabaseConnectionError(String),

    #[error("数据库锁获取失败: {0}")]
    LockError(String),

    #[error("数据库事务失败: {0}")]
    DatabaseTransactionError(String),

    #[error("数据库查询失败: {0}")]
    DatabaseQueryError(String),

    #[error("唯一约束违反: {0}")]
    UniqueConstraintViolation(String),

    #[error("外键约束违反: {0}")]
    ForeignKeyViolation(String),

    // ===== 层级结构错误 =====
    #[error("检测到环路: {entity} id={id} 成为了自身的祖先")]
    CycleDetected { entity: String, id: i64 },

    #[error("父节点不存在: {entity} id={id}, parent_id={parent_id}")]
    DanglingParent {
        entity: String,
        id: String,
        parent_id: i64,
    },

    #[error("同一父节点下已存在同名分类: path={path}")]
    SiblingNameConflict { path: String },

    // ===== 数据质量错误 =====
    #[error("数据验证失败: {0}")]
    ValidationError(String),

    #[error("字段值错误 (field={field}): {message}")]
    FieldValueError { field: String, message: String },

    #[error("数据验证失败: {0}")]
    InvalidInput(#[from] DomainError),

    // ===== 通用错误 =====
    #[error("内部错误: {0}")]
    InternalError(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl From<rusqlite::Error> for RepositoryError {
    fn from(err: rusqlite::Error) -> Self {
        match err {
            rusqlite::Error::SqliteFailure(_, Some(msg)) => {
                if msg.contains("UNIQUE") {
                    RepositoryError::UniqueConstraintViolation(msg)
                } else if msg.contains("FOREIGN KEY") {
                    RepositoryError::ForeignKeyViolation(msg)
                } else {
                    RepositoryError::DatabaseQueryError(msg)
                }
            }
            rusqlite::Error::QueryReturnedNoRows => RepositoryError::NotFound {
                entity: "Unknown".to_string(),
                id: "Unknown".to_string(),
            },
            _ => RepositoryError::DatabaseQueryError(err.to_string()),
        }
    }
}

impl RepositoryError {
    /// 是否为层级环路错误
    pub fn is_cycle(&self) -> bool {
        matches!(self, RepositoryError::CycleDetected { .. })
    }
}

/// Result 类型别名
pub type RepositoryResult<T> = Result<T, RepositoryError>;
