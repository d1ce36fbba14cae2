use crate::{DeviceError, Result};
use sea_orm::{ConnectionTrait, DatabaseBackend, DatabaseConnection, Statement};
use tracing::info;

const SQLITE_SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS devices (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        external_id TEXT NOT NULL,
        last_ping_time TEXT NOT NULL,
        group_id TEXT NOT NULL
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_devices_group_id ON devices (group_id)",
    r#"
    CREATE TABLE IF NOT EXISTS commands (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        device_id INTEGER NOT NULL,
        queue_group_id TEXT NOT NULL,
        queued_at TEXT NOT NULL,
        updated_at TEXT NOT NULL,
        status TEXT NOT NULL DEFAULT 'pending',
        command TEXT NOT NULL,
        parameters TEXT,
        binary_payload BLOB
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_commands_queue_group_id ON commands (queue_group_id)",
    "CREATE INDEX IF NOT EXISTS idx_commands_device_id ON commands (device_id)",
    r#"
    CREATE TABLE IF NOT EXISTS incidents (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        log_id TEXT NOT NULL,
        reason TEXT NOT NULL,
        image_name TEXT NOT NULL,
        image_key TEXT NOT NULL,
        uploaded_at TEXT NOT NULL
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_incidents_log_id ON incidents (log_id)",
];

const POSTGRES_SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS devices (
        id BIGSERIAL PRIMARY KEY,
        external_id TEXT NOT NULL,
        last_ping_time TIMESTAMPTZ NOT NULL,
        group_id TEXT NOT NULL
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_devices_group_id ON devices (group_id)",
    r#"
    CREATE TABLE IF NOT EXISTS commands (
        id BIGSERIAL PRIMARY KEY,
        device_id BIGINT NOT NULL,
        queue_group_id TEXT NOT NULL,
        queued_at TIMESTAMPTZ NOT NULL,
        updated_at TIMESTAMPTZ NOT NULL,
        status TEXT NOT NULL DEFAULT 'pending',
        command TEXT NOT NULL,
        parameters JSONB,
        binary_payload BYTEA
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_commands_queue_group_id ON commands (queue_group_id)",
    "CREATE INDEX IF NOT EXISTS idx_commands_device_id ON commands (device_id)",
    r#"
    CREATE TABLE IF NOT EXISTS incidents (
        id BIGSERIAL PRIMARY KEY,
        log_id TEXT NOT NULL,
        reason TEXT NOT NULL,
        image_name TEXT NOT NULL,
        image_key TEXT NOT NULL,
        uploaded_at TIMESTAMPTZ NOT NULL
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_incidents_log_id ON incidents (log_id)",
];

/// 创建数据库表结构
///
/// 支持 SQLite 和 PostgreSQL，可重复执行
pub async fn setup_schema(db: &DatabaseConnection) -> Result<()> {
    let backend = db.get_database_backend();
    let statements = match backend {
        DatabaseBackend::Sqlite => SQLITE_SCHEMA,
        DatabaseBackend::Postgres => POSTGRES_SCHEMA,
        DatabaseBackend::MySql => {
            return Err(DeviceError::validation("MySQL backend is not supported"));
        }
    };

    for sql in statements {
        db.execute(Statement::from_string(backend, sql.to_string()))
            .await?;
    }

    info!(backend = ?backend, "Database schema ready");
    Ok(())
}
