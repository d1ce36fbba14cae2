use crate::model::{Command, CommandId, CommandStatus, Device, DeviceId, Incident};
use crate::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// 设备存储 trait
///
/// 列表操作按 `last_ping_time` 降序，时间相同时按 ID 降序
#[async_trait]
pub trait DeviceStore: Send + Sync {
    /// 插入设备，返回带有存储分配 ID 的记录
    async fn insert_device(&self, device: Device) -> Result<Device>;

    /// 列出分组内的全部设备
    async fn list_devices(&self, group_id: &str) -> Result<Vec<Device>>;

    /// 删除分组内的全部设备，返回删除数量
    async fn delete_devices(&self, group_id: &str) -> Result<u64>;

    async fn get_device(&self, id: DeviceId) -> Result<Option<Device>>;

    /// 仅按键检查是否存在
    async fn device_exists(&self, id: DeviceId) -> Result<bool>;

    /// 更新心跳时间，设备不存在时返回 `None`
    async fn touch_device(&self, id: DeviceId, at: DateTime<Utc>) -> Result<Option<Device>>;
}

/// 指令存储 trait
///
/// 列表操作按 `queued_at` 降序，时间相同时按 ID 降序
#[async_trait]
pub trait CommandStore: Send + Sync {
    async fn insert_command(&self, command: Command) -> Result<Command>;

    /// 列出队列分组内的全部指令
    async fn list_commands(&self, queue_group_id: &str) -> Result<Vec<Command>>;

    /// 按目标设备列出指令（跨所有队列分组）
    async fn list_commands_for_device(&self, device_ref: DeviceId) -> Result<Vec<Command>>;

    /// 删除队列分组内的全部指令，返回删除数量
    async fn delete_commands(&self, queue_group_id: &str) -> Result<u64>;

    async fn get_command(&self, id: CommandId) -> Result<Option<Command>>;

    /// 仅当当前状态等于 `expected` 时写入新状态
    ///
    /// 指令不存在或状态已被其他写入改变时返回 `None`
    async fn update_command_status(
        &self,
        id: CommandId,
        expected: CommandStatus,
        status: CommandStatus,
        at: DateTime<Utc>,
    ) -> Result<Option<Command>>;
}

/// 事件日志存储 trait
#[async_trait]
pub trait IncidentStore: Send + Sync {
    async fn insert_incident(&self, incident: Incident) -> Result<Incident>;

    /// 按上传时间降序列出日志内的事件
    async fn list_incidents(&self, log_id: &str) -> Result<Vec<Incident>>;

    async fn delete_incidents(&self, log_id: &str) -> Result<u64>;
}
