use super::entity::{command, device, incident};
use crate::model::{Command, CommandParams, CommandStatus, Device, Incident};
use crate::DeviceError;
use sea_orm::ActiveValue::{NotSet, Set};
use serde_json::Value as JsonValue;

/// Device 模型与数据库实体的转换
impl From<Device> for device::ActiveModel {
    fn from(device: Device) -> Self {
        Self {
            id: if device.id == 0 { NotSet } else { Set(device.id) },
            external_id: Set(device.external_id),
            last_ping_time: Set(device.last_ping_time),
            group_id: Set(device.group_id),
        }
    }
}

impl From<device::Model> for Device {
    fn from(model: device::Model) -> Self {
        Self {
            id: model.id,
            external_id: model.external_id,
            last_ping_time: model.last_ping_time,
            group_id: model.group_id,
        }
    }
}

/// Command 模型与数据库实体的转换
impl TryFrom<Command> for command::ActiveModel {
    type Error = DeviceError;

    fn try_from(command: Command) -> Result<Self, Self::Error> {
        Ok(Self {
            id: if command.id == 0 { NotSet } else { Set(command.id) },
            device_id: Set(command.device_ref),
            queue_group_id: Set(command.queue_group_id),
            queued_at: Set(command.queued_at),
            updated_at: Set(command.updated_at),
            status: Set(command.status.as_str().to_string()),
            command: Set(command.command),
            parameters: Set(params_to_json(command.parameters.as_ref())?),
            binary_payload: Set(command.binary_payload),
        })
    }
}

impl TryFrom<command::Model> for Command {
    type Error = DeviceError;

    fn try_from(model: command::Model) -> Result<Self, Self::Error> {
        Ok(Self {
            id: model.id,
            device_ref: model.device_id,
            queue_group_id: model.queue_group_id,
            queued_at: model.queued_at,
            updated_at: model.updated_at,
            status: CommandStatus::parse(&model.status)?,
            command: model.command,
            parameters: json_to_params(model.parameters)?,
            binary_payload: model.binary_payload,
        })
    }
}

/// Incident 模型与数据库实体的转换
impl From<Incident> for incident::ActiveModel {
    fn from(incident: Incident) -> Self {
        Self {
            id: if incident.id == 0 { NotSet } else { Set(incident.id) },
            log_id: Set(incident.log_id),
            reason: Set(incident.reason),
            image_name: Set(incident.image_name),
            image_key: Set(incident.image_key),
            uploaded_at: Set(incident.uploaded_at),
        }
    }
}

impl From<incident::Model> for Incident {
    fn from(model: incident::Model) -> Self {
        Self {
            id: model.id,
            log_id: model.log_id,
            reason: model.reason,
            image_name: model.image_name,
            image_key: model.image_key,
            uploaded_at: model.uploaded_at,
        }
    }
}

// ========== 辅助函数 ==========

/// 将参数转换为 JSON
fn params_to_json(params: Option<&CommandParams>) -> Result<Option<JsonValue>, DeviceError> {
    params
        .map(|p| serde_json::to_value(p).map_err(DeviceError::from))
        .transpose()
}

/// 将 JSON 转换为参数
fn json_to_params(json: Option<JsonValue>) -> Result<Option<CommandParams>, DeviceError> {
    json.map(|v| serde_json::from_value(v).map_err(DeviceError::from))
        .transpose()
}
