use super::entity::{command, device, incident};
use crate::model::{Command, CommandId, CommandStatus, Device, DeviceId, Incident};
use crate::store::{CommandStore, DeviceStore, IncidentStore};
use crate::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder,
};
use std::sync::Arc;
use tracing::debug;

/// 基于 SeaORM 的存储（SQLite / PostgreSQL）
#[derive(Clone)]
pub struct SeaOrmStore {
    db: Arc<DatabaseConnection>,
}

impl SeaOrmStore {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// 连接数据库并创建表结构
    pub async fn connect(url: &str) -> Result<Self> {
        let store = Self::new(Arc::new(sea_orm::Database::connect(url).await?));
        store.setup_schema().await?;
        Ok(store)
    }

    /// 创建表和索引（幂等）
    pub async fn setup_schema(&self) -> Result<()> {
        super::setup_schema(&self.db).await
    }
}

#[async_trait]
impl DeviceStore for SeaOrmStore {
    async fn insert_device(&self, device: Device) -> Result<Device> {
        let active_model: device::ActiveModel = device.into();
        let model = active_model.insert(&*self.db).await?;
        Ok(Device::from(model))
    }

    async fn list_devices(&self, group_id: &str) -> Result<Vec<Device>> {
        let models = device::Entity::find()
            .filter(device::Column::GroupId.eq(group_id))
            .order_by_desc(device::Column::LastPingTime)
            .order_by_desc(device::Column::Id)
            .all(&*self.db)
            .await?;

        debug!(group_id = %group_id, count = models.len(), "Devices listed from database");
        Ok(models.into_iter().map(Device::from).collect())
    }

    async fn delete_devices(&self, group_id: &str) -> Result<u64> {
        let result = device::Entity::delete_many()
            .filter(device::Column::GroupId.eq(group_id))
            .exec(&*self.db)
            .await?;
        Ok(result.rows_affected)
    }

    async fn get_device(&self, id: DeviceId) -> Result<Option<Device>> {
        let model = device::Entity::find_by_id(id).one(&*self.db).await?;
        Ok(model.map(Device::from))
    }

    async fn device_exists(&self, id: DeviceId) -> Result<bool> {
        let count = device::Entity::find_by_id(id).count(&*self.db).await?;
        Ok(count > 0)
    }

    async fn touch_device(&self, id: DeviceId, at: DateTime<Utc>) -> Result<Option<Device>> {
        let result = device::Entity::update_many()
            .col_expr(device::Column::LastPingTime, Expr::value(at))
            .filter(device::Column::Id.eq(id))
            .exec(&*self.db)
            .await?;

        if result.rows_affected == 0 {
            return Ok(None);
        }
        self.get_device(id).await
    }
}

#[async_trait]
impl CommandStore for SeaOrmStore {
    async fn insert_command(&self, command: Command) -> Result<Command> {
        let active_model = command::ActiveModel::try_from(command)?;
        let model = active_model.insert(&*self.db).await?;
        Command::try_from(model)
    }

    async fn list_commands(&self, queue_group_id: &str) -> Result<Vec<Command>> {
        let models = command::Entity::find()
            .filter(command::Column::QueueGroupId.eq(queue_group_id))
            .order_by_desc(command::Column::QueuedAt)
            .order_by_desc(command::Column::Id)
            .all(&*self.db)
            .await?;

        debug!(
            queue_group_id = %queue_group_id,
            count = models.len(),
            "Commands listed from database"
        );
        models.into_iter().map(Command::try_from).collect()
    }

    async fn list_commands_for_device(&self, device_ref: DeviceId) -> Result<Vec<Command>> {
        // 跨所有队列分组的二级过滤
        let models = command::Entity::find()
            .filter(command::Column::DeviceId.eq(device_ref))
            .order_by_desc(command::Column::QueuedAt)
            .order_by_desc(command::Column::Id)
            .all(&*self.db)
            .await?;

        models.into_iter().map(Command::try_from).collect()
    }

    async fn delete_commands(&self, queue_group_id: &str) -> Result<u64> {
        let result = command::Entity::delete_many()
            .filter(command::Column::QueueGroupId.eq(queue_group_id))
            .exec(&*self.db)
            .await?;
        Ok(result.rows_affected)
    }

    async fn get_command(&self, id: CommandId) -> Result<Option<Command>> {
        command::Entity::find_by_id(id)
            .one(&*self.db)
            .await?
            .map(Command::try_from)
            .transpose()
    }

    async fn update_command_status(
        &self,
        id: CommandId,
        expected: CommandStatus,
        status: CommandStatus,
        at: DateTime<Utc>,
    ) -> Result<Option<Command>> {
        let result = command::Entity::update_many()
            .col_expr(command::Column::Status, Expr::value(status.as_str()))
            .col_expr(command::Column::UpdatedAt, Expr::value(at))
            .filter(command::Column::Id.eq(id))
            .filter(command::Column::Status.eq(expected.as_str()))
            .exec(&*self.db)
            .await?;

        if result.rows_affected == 0 {
            return Ok(None);
        }
        self.get_command(id).await
    }
}

#[async_trait]
impl IncidentStore for SeaOrmStore {
    async fn insert_incident(&self, incident: Incident) -> Result<Incident> {
        let active_model: incident::ActiveModel = incident.into();
        let model = active_model.insert(&*self.db).await?;
        Ok(Incident::from(model))
    }

    async fn list_incidents(&self, log_id: &str) -> Result<Vec<Incident>> {
        let models = incident::Entity::find()
            .filter(incident::Column::LogId.eq(log_id))
            .order_by_desc(incident::Column::UploadedAt)
            .order_by_desc(incident::Column::Id)
            .all(&*self.db)
            .await?;
        Ok(models.into_iter().map(Incident::from).collect())
    }

    async fn delete_incidents(&self, log_id: &str) -> Result<u64> {
        let result = incident::Entity::delete_many()
            .filter(incident::Column::LogId.eq(log_id))
            .exec(&*self.db)
            .await?;
        Ok(result.rows_affected)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::CommandParams;

    async fn create_test_store() -> SeaOrmStore {
        SeaOrmStore::connect("sqlite::memory:").await.unwrap()
    }

    fn new_command(device_ref: DeviceId, queue: &str, name: &str) -> Command {
        let now = Utc::now();
        Command {
            id: 0,
            device_ref,
            queue_group_id: queue.to_string(),
            queued_at: now,
            updated_at: now,
            status: CommandStatus::Pending,
            command: name.to_string(),
            parameters: None,
            binary_payload: None,
        }
    }

    #[tokio::test]
    async fn test_insert_assigns_ids() {
        let store = create_test_store().await;
        let a = store.insert_device(Device::new("g1", "a")).await.unwrap();
        let b = store.insert_device(Device::new("g1", "b")).await.unwrap();
        assert!(a.id > 0);
        assert!(b.id > a.id);
        assert!(store.device_exists(a.id).await.unwrap());
        assert!(!store.device_exists(b.id + 100).await.unwrap());
    }

    #[tokio::test]
    async fn test_list_and_delete_devices_by_group() {
        let store = create_test_store().await;
        store.insert_device(Device::new("g1", "a")).await.unwrap();
        store.insert_device(Device::new("g1", "b")).await.unwrap();
        store.insert_device(Device::new("g2", "c")).await.unwrap();

        assert_eq!(store.list_devices("g1").await.unwrap().len(), 2);
        assert_eq!(store.delete_devices("g1").await.unwrap(), 2);
        assert!(store.list_devices("g1").await.unwrap().is_empty());
        assert_eq!(store.list_devices("g2").await.unwrap().len(), 1);
        assert_eq!(store.delete_devices("g1").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_touch_device() {
        let store = create_test_store().await;
        let device = store.insert_device(Device::new("g1", "a")).await.unwrap();
        let later = device.last_ping_time + chrono::Duration::seconds(30);

        let touched = store.touch_device(device.id, later).await.unwrap().unwrap();
        assert_eq!(touched.last_ping_time, later);
        assert!(store.touch_device(device.id + 1, later).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_command_payload_round_trip() {
        let store = create_test_store().await;
        let mut cmd = new_command(1, "Commands", "configure");
        cmd.parameters = Some(
            CommandParams::new()
                .with("fps", 16)
                .unwrap()
                .with("resolution", vec![640, 480])
                .unwrap(),
        );
        cmd.binary_payload = Some(vec![0x00, 0x7f, 0xff, 0x10]);

        let stored = store.insert_command(cmd.clone()).await.unwrap();
        let fetched = store.get_command(stored.id).await.unwrap().unwrap();
        assert_eq!(fetched.command, "configure");
        assert_eq!(fetched.parameters, cmd.parameters);
        assert_eq!(fetched.binary_payload, cmd.binary_payload);
    }

    #[tokio::test]
    async fn test_update_command_status() {
        let store = create_test_store().await;
        let stored = store
            .insert_command(new_command(1, "Commands", "snap"))
            .await
            .unwrap();

        let updated = store
            .update_command_status(
                stored.id,
                CommandStatus::Pending,
                CommandStatus::Done,
                Utc::now(),
            )
            .await
            .unwrap()
            .unwrap();
        assert_eq!(updated.status, CommandStatus::Done);

        // 状态已变化，条件写入不生效
        assert!(store
            .update_command_status(
                stored.id,
                CommandStatus::Pending,
                CommandStatus::Failed,
                Utc::now(),
            )
            .await
            .unwrap()
            .is_none());
        let fetched = store.get_command(stored.id).await.unwrap().unwrap();
        assert_eq!(fetched.status, CommandStatus::Done);

        assert!(store
            .update_command_status(
                stored.id + 1,
                CommandStatus::Pending,
                CommandStatus::Done,
                Utc::now(),
            )
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_incidents() {
        let store = create_test_store().await;
        let incident = Incident {
            id: 0,
            log_id: "My Yard Cam".to_string(),
            reason: "motion detected".to_string(),
            image_name: "2016-05-01_12-00-00.jpg".to_string(),
            image_key: "/gs/yardcam/2016-05-01_12-00-00.jpg".to_string(),
            uploaded_at: Utc::now(),
        };
        let stored = store.insert_incident(incident).await.unwrap();
        assert!(stored.id > 0);

        let listed = store.list_incidents("My Yard Cam").await.unwrap();
        assert_eq!(listed, vec![stored]);
        assert_eq!(store.delete_incidents("My Yard Cam").await.unwrap(), 1);
    }
}
