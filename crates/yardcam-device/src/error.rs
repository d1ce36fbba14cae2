use crate::model::CommandStatus;
use sea_orm::DbErr;
use thiserror::Error;

/// 设备与指令队列错误类型
#[derive(Error, Debug)]
pub enum DeviceError {
    /// 验证错误（缺少必填字段等），不应自动重试
    #[error("Validation error: {0}")]
    ValidationError(String),

    /// 记录未找到
    #[error("Not found: {0}")]
    NotFound(String),

    /// 非法的指令状态迁移
    #[error("Invalid command status transition: {from} -> {to}")]
    InvalidTransition {
        from: CommandStatus,
        to: CommandStatus,
    },

    /// 存储暂时不可用（连接失败、连接池耗尽），可以重试
    #[error("Storage unavailable: {0}")]
    StorageUnavailable(String),

    /// 批量清理只完成了前半部分：设备已删除，指令队列清理失败
    #[error("Bulk clear partially applied ({devices_removed} devices removed): {source}")]
    PartialClear {
        devices_removed: u64,
        #[source]
        source: Box<DeviceError>,
    },

    /// 数据库错误
    #[error("Database error: {0}")]
    DatabaseError(DbErr),

    /// 序列化错误
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}

/// 设备管理结果类型
pub type Result<T> = std::result::Result<T, DeviceError>;

impl DeviceError {
    /// 创建验证错误
    pub fn validation(msg: impl Into<String>) -> Self {
        DeviceError::ValidationError(msg.into())
    }

    /// 创建未找到错误
    pub fn not_found(msg: impl Into<String>) -> Self {
        DeviceError::NotFound(msg.into())
    }

    /// 创建存储不可用错误
    pub fn unavailable(msg: impl Into<String>) -> Self {
        DeviceError::StorageUnavailable(msg.into())
    }

    /// 是否为暂时性错误（调用方可以退避重试）
    pub fn is_transient(&self) -> bool {
        match self {
            DeviceError::StorageUnavailable(_) => true,
            DeviceError::PartialClear { source, .. } => source.is_transient(),
            _ => false,
        }
    }

    /// 是否为验证错误（HTTP 层映射为 4xx）
    pub fn is_validation(&self) -> bool {
        matches!(self, DeviceError::ValidationError(_))
    }
}

impl From<DbErr> for DeviceError {
    fn from(err: DbErr) -> Self {
        match err {
            DbErr::ConnectionAcquire(_) | DbErr::Conn(_) => {
                DeviceError::StorageUnavailable(err.to_string())
            }
            other => DeviceError::DatabaseError(other),
        }
    }
}
