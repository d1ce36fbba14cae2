use crate::model::{Command, CommandId, CommandStatus, Device, DeviceId, Incident};
use crate::store::{CommandStore, DeviceStore, IncidentStore};
use crate::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

struct Table<T> {
    next_id: i64,
    rows: BTreeMap<i64, T>,
}

impl<T> Default for Table<T> {
    fn default() -> Self {
        Self {
            next_id: 0,
            rows: BTreeMap::new(),
        }
    }
}

impl<T> Table<T> {
    fn allocate(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }
}

/// 内存存储
///
/// 不依赖数据库，用于单元测试中注入假存储，也可用于嵌入式场景
#[derive(Clone, Default)]
pub struct MemoryStore {
    devices: Arc<RwLock<Table<Device>>>,
    commands: Arc<RwLock<Table<Command>>>,
    incidents: Arc<RwLock<Table<Incident>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

/// 按时间降序、ID 降序排序
fn sort_desc<T, F>(items: &mut [T], key: F)
where
    F: Fn(&T) -> (DateTime<Utc>, i64),
{
    items.sort_by(|a, b| key(b).cmp(&key(a)));
}

#[async_trait]
impl DeviceStore for MemoryStore {
    async fn insert_device(&self, mut device: Device) -> Result<Device> {
        let mut table = self.devices.write().await;
        device.id = table.allocate();
        table.rows.insert(device.id, device.clone());
        Ok(device)
    }

    async fn list_devices(&self, group_id: &str) -> Result<Vec<Device>> {
        let table = self.devices.read().await;
        let mut devices: Vec<Device> = table
            .rows
            .values()
            .filter(|d| d.group_id == group_id)
            .cloned()
            .collect();
        sort_desc(&mut devices, |d| (d.last_ping_time, d.id));
        Ok(devices)
    }

    async fn delete_devices(&self, group_id: &str) -> Result<u64> {
        let mut table = self.devices.write().await;
        let before = table.rows.len();
        table.rows.retain(|_, d| d.group_id != group_id);
        let removed = (before - table.rows.len()) as u64;
        debug!(group_id = %group_id, removed, "Devices removed from memory store");
        Ok(removed)
    }

    async fn get_device(&self, id: DeviceId) -> Result<Option<Device>> {
        Ok(self.devices.read().await.rows.get(&id).cloned())
    }

    async fn device_exists(&self, id: DeviceId) -> Result<bool> {
        Ok(self.devices.read().await.rows.contains_key(&id))
    }

    async fn touch_device(&self, id: DeviceId, at: DateTime<Utc>) -> Result<Option<Device>> {
        let mut table = self.devices.write().await;
        Ok(table.rows.get_mut(&id).map(|device| {
            device.last_ping_time = at;
            device.clone()
        }))
    }
}

#[async_trait]
impl CommandStore for MemoryStore {
    async fn insert_command(&self, mut command: Command) -> Result<Command> {
        let mut table = self.commands.write().await;
        command.id = table.allocate();
        table.rows.insert(command.id, command.clone());
        Ok(command)
    }

    async fn list_commands(&self, queue_group_id: &str) -> Result<Vec<Command>> {
        let table = self.commands.read().await;
        let mut commands: Vec<Command> = table
            .rows
            .values()
            .filter(|c| c.queue_group_id == queue_group_id)
            .cloned()
            .collect();
        sort_desc(&mut commands, |c| (c.queued_at, c.id));
        Ok(commands)
    }

    async fn list_commands_for_device(&self, device_ref: DeviceId) -> Result<Vec<Command>> {
        let table = self.commands.read().await;
        let mut commands: Vec<Command> = table
            .rows
            .values()
            .filter(|c| c.device_ref == device_ref)
            .cloned()
            .collect();
        sort_desc(&mut commands, |c| (c.queued_at, c.id));
        Ok(commands)
    }

    async fn delete_commands(&self, queue_group_id: &str) -> Result<u64> {
        let mut table = self.commands.write().await;
        let before = table.rows.len();
        table.rows.retain(|_, c| c.queue_group_id != queue_group_id);
        Ok((before - table.rows.len()) as u64)
    }

    async fn get_command(&self, id: CommandId) -> Result<Option<Command>> {
        Ok(self.commands.read().await.rows.get(&id).cloned())
    }

    async fn update_command_status(
        &self,
        id: CommandId,
        expected: CommandStatus,
        status: CommandStatus,
        at: DateTime<Utc>,
    ) -> Result<Option<Command>> {
        let mut table = self.commands.write().await;
        Ok(table
            .rows
            .get_mut(&id)
            .filter(|command| command.status == expected)
            .map(|command| {
                command.status = status;
                command.updated_at = at;
                command.clone()
            }))
    }
}

#[async_trait]
impl IncidentStore for MemoryStore {
    async fn insert_incident(&self, mut incident: Incident) -> Result<Incident> {
        let mut table = self.incidents.write().await;
        incident.id = table.allocate();
        table.rows.insert(incident.id, incident.clone());
        Ok(incident)
    }

    async fn list_incidents(&self, log_id: &str) -> Result<Vec<Incident>> {
        let table = self.incidents.read().await;
        let mut incidents: Vec<Incident> = table
            .rows
            .values()
            .filter(|i| i.log_id == log_id)
            .cloned()
            .collect();
        sort_desc(&mut incidents, |i| (i.uploaded_at, i.id));
        Ok(incidents)
    }

    async fn delete_incidents(&self, log_id: &str) -> Result<u64> {
        let mut table = self.incidents.write().await;
        let before = table.rows.len();
        table.rows.retain(|_, i| i.log_id != log_id);
        Ok((before - table.rows.len()) as u64)
    }
}
