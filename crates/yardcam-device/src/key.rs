use serde::{Deserialize, Serialize};
use std::fmt;

/// 分组类别
///
/// 设备分组、指令队列分组和事件日志互不相交，各自有独立的默认分组
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum GroupKind {
    /// 设备分组
    DeviceGroup,
    /// 指令队列分组
    CommandQueue,
    /// 事件日志
    IncidentLog,
}

impl GroupKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            GroupKind::DeviceGroup => "device_group",
            GroupKind::CommandQueue => "command_queue",
            GroupKind::IncidentLog => "incident_log",
        }
    }
}

impl fmt::Display for GroupKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 分组键 `(kind, group_id)`
///
/// 所有按分组限定的查询和批量删除都以它为范围
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct GroupKey {
    pub kind: GroupKind,
    pub group_id: String,
}

impl GroupKey {
    pub fn new(kind: GroupKind, group_id: impl Into<String>) -> Self {
        Self {
            kind,
            group_id: group_id.into(),
        }
    }

    pub fn group_id(&self) -> &str {
        &self.group_id
    }
}

impl fmt::Display for GroupKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.kind, self.group_id)
    }
}

/// 默认分组 ID（由配置注入）
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct GroupDefaults {
    /// 默认设备分组
    pub device_group: String,
    /// 默认指令队列分组
    pub command_queue: String,
    /// 默认事件日志
    pub incident_log: String,
}

impl Default for GroupDefaults {
    fn default() -> Self {
        Self {
            device_group: "default_device_group".to_string(),
            command_queue: "Commands".to_string(),
            incident_log: "My Yard Cam".to_string(),
        }
    }
}

impl GroupDefaults {
    /// 某类别的默认分组 ID
    pub fn default_id(&self, kind: GroupKind) -> &str {
        match kind {
            GroupKind::DeviceGroup => &self.device_group,
            GroupKind::CommandQueue => &self.command_queue,
            GroupKind::IncidentLog => &self.incident_log,
        }
    }

    /// 构造分组键
    ///
    /// 未提供（或为空字符串）的 ID 解析为该类别的默认 ID，永不失败
    pub fn key(&self, kind: GroupKind, group_id: Option<&str>) -> GroupKey {
        let id = match group_id {
            Some(id) if !id.is_empty() => id,
            _ => self.default_id(kind),
        };
        GroupKey::new(kind, id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_ids() {
        let defaults = GroupDefaults::default();
        assert_eq!(
            defaults.key(GroupKind::DeviceGroup, None),
            GroupKey::new(GroupKind::DeviceGroup, "default_device_group")
        );
        assert_eq!(
            defaults.key(GroupKind::CommandQueue, None).group_id(),
            "Commands"
        );
        assert_eq!(
            defaults.key(GroupKind::IncidentLog, Some("")).group_id(),
            "My Yard Cam"
        );
    }

    #[test]
    fn test_explicit_id_is_kept() {
        let defaults = GroupDefaults::default();
        let key = defaults.key(GroupKind::CommandQueue, Some("batch-7"));
        assert_eq!(key.kind, GroupKind::CommandQueue);
        assert_eq!(key.group_id, "batch-7");
        assert_eq!(key.to_string(), "command_queue/batch-7");
    }

    #[test]
    fn test_injected_defaults() {
        let defaults = GroupDefaults {
            device_group: "garage".to_string(),
            ..Default::default()
        };
        assert_eq!(defaults.key(GroupKind::DeviceGroup, None).group_id, "garage");
        // 相同输入得到相同的键
        assert_eq!(
            defaults.key(GroupKind::DeviceGroup, Some("porch")),
            defaults.key(GroupKind::DeviceGroup, Some("porch"))
        );
    }
}
