use crate::model::{Command, CommandId, CommandRequest, CommandStatus, DeviceId};
use crate::{CommandQueue, DeviceError, DeviceRegistry, Result};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// 批量清理结果
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClearReport {
    pub devices_removed: u64,
    pub commands_removed: u64,
}

/// 指令投递服务
///
/// 串起设备注册表和指令队列：入队、设备轮询、状态上报、批量清理
/// 不做任何自动状态迁移，迁移策略由调用方决定
pub struct CommandDelivery {
    registry: Arc<DeviceRegistry>,
    queue: Arc<CommandQueue>,
}

impl CommandDelivery {
    pub fn new(registry: Arc<DeviceRegistry>, queue: Arc<CommandQueue>) -> Self {
        Self { registry, queue }
    }

    pub fn registry(&self) -> &Arc<DeviceRegistry> {
        &self.registry
    }

    pub fn queue(&self) -> &Arc<CommandQueue> {
        &self.queue
    }

    /// 为已注册设备入队指令
    ///
    /// 请求中的 `device_ref` 会被 `device_id` 覆盖
    ///
    /// # 错误
    /// * `NotFound` - 设备不存在
    pub async fn enqueue(&self, device_id: DeviceId, request: CommandRequest) -> Result<Command> {
        if !self.registry.exists(device_id).await? {
            return Err(DeviceError::not_found(format!("device {}", device_id)));
        }
        self.queue.assign(request.device(device_id)).await
    }

    /// 设备的待处理指令，最新的在前
    pub async fn pending_for_device(&self, device_id: DeviceId) -> Result<Vec<Command>> {
        let mut commands = self.queue.list_for_device(device_id).await?;
        commands.retain(Command::is_pending);
        Ok(commands)
    }

    /// 设备轮询
    ///
    /// 记录一次心跳并返回待处理指令，不改变指令状态
    ///
    /// # 错误
    /// * `NotFound` - 设备不存在
    pub async fn poll(&self, device_id: DeviceId) -> Result<Vec<Command>> {
        self.registry.ping(device_id).await?;
        let pending = self.pending_for_device(device_id).await?;
        debug!(device_id, pending = pending.len(), "Device polled");
        Ok(pending)
    }

    /// 设备上报指令处理结果
    pub async fn report(&self, command_id: CommandId, status: CommandStatus) -> Result<Command> {
        self.queue.mark(command_id, status).await
    }

    /// 清理设备分组和指令队列分组
    ///
    /// 两步之间不是原子操作，删除设备不会级联删除其他队列中的指令
    ///
    /// # 错误
    /// * `PartialClear` - 设备已删除但指令队列清理失败，携带已删除的设备数量
    pub async fn clear(&self, device_group: &str, queue_group: &str) -> Result<ClearReport> {
        let devices_removed = self.registry.clear_group(device_group).await?;
        let commands_removed = match self.queue.clear_queue(Some(queue_group)).await {
            Ok(removed) => removed,
            Err(err) => {
                warn!(
                    device_group = %device_group,
                    queue_group = %queue_group,
                    devices_removed,
                    error = %err,
                    "Command queue clear failed after device group was cleared"
                );
                return Err(DeviceError::PartialClear {
                    devices_removed,
                    source: Box::new(err),
                });
            }
        };

        info!(
            device_group = %device_group,
            queue_group = %queue_group,
            devices_removed,
            commands_removed,
            "Delivery state cleared"
        );

        Ok(ClearReport {
            devices_removed,
            commands_removed,
        })
    }
}
