use crate::key::{GroupDefaults, GroupKind};
use crate::model::{Command, CommandId, CommandRequest, CommandStatus, DeviceId};
use crate::store::CommandStore;
use crate::{DeviceError, Result};
use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, info};

/// 指令队列
///
/// 指令按队列分组存放，并可按目标设备跨分组查询
pub struct CommandQueue {
    store: Arc<dyn CommandStore>,
    defaults: GroupDefaults,
}

impl CommandQueue {
    pub fn new(store: Arc<dyn CommandStore>, defaults: GroupDefaults) -> Self {
        Self { store, defaults }
    }

    /// 分配指令到设备
    ///
    /// # 错误
    /// * `ValidationError` - 缺少 `device_ref` 或指令名称为空，此时不写入任何记录
    pub async fn assign(&self, request: CommandRequest) -> Result<Command> {
        let device_ref = request
            .device_ref
            .ok_or_else(|| DeviceError::validation("Command requires a device reference"))?;

        if request.command.trim().is_empty() {
            return Err(DeviceError::validation("Command name cannot be empty"));
        }

        let key = self
            .defaults
            .key(GroupKind::CommandQueue, request.queue_group.as_deref());
        let now = Utc::now();
        let command = Command {
            id: 0,
            device_ref,
            queue_group_id: key.group_id,
            queued_at: now,
            updated_at: now,
            status: request.status.unwrap_or_default(),
            command: request.command,
            parameters: request.parameters,
            binary_payload: request.binary_payload,
        };

        let command = self.store.insert_command(command).await?;

        info!(
            command_id = command.id,
            device_id = command.device_ref,
            queue_group_id = %command.queue_group_id,
            command = %command.command,
            "Command assigned"
        );

        Ok(command)
    }

    /// 列出队列分组内的指令，最新的在前
    pub async fn list_in_queue(&self, queue_group_id: Option<&str>) -> Result<Vec<Command>> {
        let key = self.defaults.key(GroupKind::CommandQueue, queue_group_id);
        self.store.list_commands(key.group_id()).await
    }

    /// 列出某设备的全部指令（跨所有队列分组），最新的在前
    ///
    /// 不按状态过滤
    pub async fn list_for_device(&self, device_ref: DeviceId) -> Result<Vec<Command>> {
        let commands = self.store.list_commands_for_device(device_ref).await?;
        debug!(device_id = device_ref, count = commands.len(), "Device commands listed");
        Ok(commands)
    }

    /// 删除队列分组内的全部指令
    ///
    /// 与并发的 `assign` 之间没有原子性保证
    pub async fn clear_queue(&self, queue_group_id: Option<&str>) -> Result<u64> {
        let key = self.defaults.key(GroupKind::CommandQueue, queue_group_id);
        let removed = self.store.delete_commands(key.group_id()).await?;
        info!(queue_group_id = %key.group_id, removed, "Command queue cleared");
        Ok(removed)
    }

    /// 获取指令
    pub async fn get(&self, command_id: CommandId) -> Result<Option<Command>> {
        self.store.get_command(command_id).await
    }

    /// 迁移指令状态
    ///
    /// # 错误
    /// * `NotFound` - 指令不存在
    /// * `InvalidTransition` - 迁移不合法（包括与并发上报竞争失败后不再合法）
    ///
    /// 写入以读取到的状态为条件；条件不满足时重新读取并校验，
    /// 状态只会单向推进，循环必然结束
    pub async fn mark(&self, command_id: CommandId, status: CommandStatus) -> Result<Command> {
        loop {
            let mut command = self
                .store
                .get_command(command_id)
                .await?
                .ok_or_else(|| DeviceError::not_found(format!("command {}", command_id)))?;

            let previous = command.status;
            command.mark(status)?;
            if previous == status {
                return Ok(command);
            }

            let updated = self
                .store
                .update_command_status(command_id, previous, status, command.updated_at)
                .await?;

            match updated {
                Some(command) => {
                    info!(
                        command_id,
                        from = %previous,
                        to = %status,
                        "Command status changed"
                    );
                    return Ok(command);
                }
                None => {
                    debug!(
                        command_id,
                        expected = %previous,
                        to = %status,
                        "Command status changed concurrently, re-checking"
                    );
                }
            }
        }
    }
}
