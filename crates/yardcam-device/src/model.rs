use crate::{DeviceError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// 设备 ID（由存储在插入时分配）
pub type DeviceId = i64;

/// 指令 ID（由存储在插入时分配）
pub type CommandId = i64;

/// 设备信息
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Device {
    /// 设备 ID，创建后不可变
    pub id: DeviceId,

    /// 外部标识（如 MAC 地址），仅供参考，不保证唯一
    pub external_id: String,

    /// 最后一次心跳时间
    pub last_ping_time: DateTime<Utc>,

    /// 所属设备分组，创建后不可变
    pub group_id: String,
}

impl Device {
    /// 创建待插入的设备（ID 由存储分配）
    pub fn new(group_id: impl Into<String>, external_id: impl Into<String>) -> Self {
        Self {
            id: 0,
            external_id: external_id.into(),
            last_ping_time: Utc::now(),
            group_id: group_id.into(),
        }
    }
}

/// 指令状态
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum CommandStatus {
    /// 待投递
    #[default]
    Pending,
    /// 已投递
    Delivered,
    /// 已完成
    Done,
    /// 失败
    Failed,
}

impl CommandStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CommandStatus::Pending => "pending",
            CommandStatus::Delivered => "delivered",
            CommandStatus::Done => "done",
            CommandStatus::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "pending" => Ok(CommandStatus::Pending),
            "delivered" => Ok(CommandStatus::Delivered),
            "done" => Ok(CommandStatus::Done),
            "failed" => Ok(CommandStatus::Failed),
            other => Err(DeviceError::validation(format!(
                "Unknown command status: {}",
                other
            ))),
        }
    }

    /// 是否为终态
    pub fn is_terminal(&self) -> bool {
        matches!(self, CommandStatus::Done | CommandStatus::Failed)
    }

    /// 检查状态迁移是否合法
    ///
    /// 同一状态之间的迁移总是允许（幂等上报）
    pub fn can_transition_to(&self, next: CommandStatus) -> bool {
        use CommandStatus::*;
        match (self, next) {
            (a, b) if *a == b => true,
            (Pending, Delivered | Done | Failed) => true,
            (Delivered, Done | Failed) => true,
            _ => false,
        }
    }
}

impl fmt::Display for CommandStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 指令参数（扁平的键值对，以 JSON 存储）
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct CommandParams {
    #[serde(flatten)]
    pub data: BTreeMap<String, serde_json::Value>,
}

impl CommandParams {
    pub fn new() -> Self {
        Self {
            data: BTreeMap::new(),
        }
    }

    pub fn insert<T: Serialize>(&mut self, key: impl Into<String>, value: T) -> Result<()> {
        self.data.insert(key.into(), serde_json::to_value(value)?);
        Ok(())
    }

    pub fn with<T: Serialize>(mut self, key: impl Into<String>, value: T) -> Result<Self> {
        self.insert(key, value)?;
        Ok(self)
    }

    pub fn get<T: for<'de> Deserialize<'de>>(&self, key: &str) -> Result<Option<T>> {
        match self.data.get(key) {
            Some(value) => Ok(Some(serde_json::from_value(value.clone())?)),
            None => Ok(None),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// 设备指令
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Command {
    /// 指令 ID
    pub id: CommandId,

    /// 目标设备（弱引用，设备不持有自己的指令）
    pub device_ref: DeviceId,

    /// 所属队列分组，创建后不可变
    pub queue_group_id: String,

    /// 入队时间
    pub queued_at: DateTime<Utc>,

    /// 最后一次状态变更时间
    pub updated_at: DateTime<Utc>,

    pub status: CommandStatus,

    /// 指令名称（对本层不透明）
    pub command: String,

    pub parameters: Option<CommandParams>,

    pub binary_payload: Option<Vec<u8>>,
}

impl Command {
    /// 迁移到新状态
    ///
    /// # 错误
    /// * `InvalidTransition` - 迁移不合法，指令保持不变
    pub fn mark(&mut self, next: CommandStatus) -> Result<()> {
        if !self.status.can_transition_to(next) {
            return Err(DeviceError::InvalidTransition {
                from: self.status,
                to: next,
            });
        }
        if self.status != next {
            self.status = next;
            self.updated_at = Utc::now();
        }
        Ok(())
    }

    pub fn is_pending(&self) -> bool {
        self.status == CommandStatus::Pending
    }
}

/// 指令请求
///
/// `assign` 的输入，`device_ref` 必须提供
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct CommandRequest {
    pub queue_group: Option<String>,
    pub device_ref: Option<DeviceId>,
    pub command: String,
    pub parameters: Option<CommandParams>,
    pub binary_payload: Option<Vec<u8>>,
    pub status: Option<CommandStatus>,
}

impl CommandRequest {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            ..Default::default()
        }
    }

    pub fn device(mut self, device_ref: DeviceId) -> Self {
        self.device_ref = Some(device_ref);
        self
    }

    pub fn queue_group(mut self, queue_group: impl Into<String>) -> Self {
        self.queue_group = Some(queue_group.into());
        self
    }

    pub fn parameters(mut self, parameters: CommandParams) -> Self {
        self.parameters = Some(parameters);
        self
    }

    pub fn binary_payload(mut self, payload: impl Into<Vec<u8>>) -> Self {
        self.binary_payload = Some(payload.into());
        self
    }

    pub fn status(mut self, status: CommandStatus) -> Self {
        self.status = Some(status);
        self
    }
}

/// 事件记录（摄像头上传的快照）
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Incident {
    pub id: i64,

    /// 所属事件日志
    pub log_id: String,

    /// 上传原因（如 "motion detected"）
    pub reason: String,

    pub image_name: String,

    /// 对象存储中的图片引用，对本层不透明
    pub image_key: String,

    pub uploaded_at: DateTime<Utc>,
}
