use crate::key::{GroupDefaults, GroupKind};
use crate::model::{Device, DeviceId};
use crate::store::DeviceStore;
use crate::{DeviceError, Result};
use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, info};

/// 外部标识的最大长度（字符数）
const MAX_EXTERNAL_ID_LEN: usize = 255;

/// 设备注册表
///
/// 负责设备在分组内的注册、查询和批量清理
/// 不提供单个设备的删除，清理只能按分组进行
pub struct DeviceRegistry {
    store: Arc<dyn DeviceStore>,
    defaults: GroupDefaults,
}

impl DeviceRegistry {
    /// 创建新的设备注册表
    pub fn new(store: Arc<dyn DeviceStore>, defaults: GroupDefaults) -> Self {
        Self { store, defaults }
    }

    /// 注册设备
    ///
    /// # 参数
    /// * `group_id` - 设备分组，`None` 时使用默认分组
    /// * `external_id` - 外部标识（如 MAC 地址）
    ///
    /// # 返回
    /// 带有分配 ID 的设备，`last_ping_time` 为注册时间
    ///
    /// # 错误
    /// * `ValidationError` - 外部标识过长
    /// * `StorageUnavailable` / `DatabaseError` - 存储失败
    pub async fn register(&self, group_id: Option<&str>, external_id: &str) -> Result<Device> {
        if external_id.chars().count() > MAX_EXTERNAL_ID_LEN {
            return Err(DeviceError::validation(format!(
                "External id too long (max {} characters)",
                MAX_EXTERNAL_ID_LEN
            )));
        }

        let key = self.defaults.key(GroupKind::DeviceGroup, group_id);
        let device = self
            .store
            .insert_device(Device::new(key.group_id, external_id))
            .await?;

        info!(
            device_id = device.id,
            external_id = %device.external_id,
            group_id = %device.group_id,
            "Device registered"
        );

        Ok(device)
    }

    /// 列出分组内的设备，最近心跳的在前
    ///
    /// 分组不存在时返回空列表
    pub async fn list_in_group(&self, group_id: Option<&str>) -> Result<Vec<Device>> {
        let key = self.defaults.key(GroupKind::DeviceGroup, group_id);
        let devices = self.store.list_devices(key.group_id()).await?;
        debug!(group_id = %key.group_id, count = devices.len(), "Devices listed");
        Ok(devices)
    }

    /// 删除分组内的全部设备
    ///
    /// 必须显式提供分组 ID，防止误删默认分组
    /// 不级联删除指向这些设备的指令
    ///
    /// # 返回
    /// 实际删除的设备数量
    pub async fn clear_group(&self, group_id: &str) -> Result<u64> {
        if group_id.is_empty() {
            return Err(DeviceError::validation(
                "clear_group requires an explicit group id",
            ));
        }

        let removed = self.store.delete_devices(group_id).await?;
        info!(group_id = %group_id, removed, "Device group cleared");
        Ok(removed)
    }

    /// 获取设备信息
    pub async fn get(&self, device_id: DeviceId) -> Result<Option<Device>> {
        self.store.get_device(device_id).await
    }

    /// 检查设备是否存在（仅按键查询）
    pub async fn exists(&self, device_id: DeviceId) -> Result<bool> {
        self.store.device_exists(device_id).await
    }

    /// 设备心跳，更新 `last_ping_time`
    ///
    /// # 错误
    /// * `NotFound` - 设备不存在
    pub async fn ping(&self, device_id: DeviceId) -> Result<Device> {
        let device = self
            .store
            .touch_device(device_id, Utc::now())
            .await?
            .ok_or_else(|| DeviceError::not_found(format!("device {}", device_id)))?;

        debug!(device_id, "Device heartbeat recorded");
        Ok(device)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MemoryStore;

    fn create_test_registry() -> DeviceRegistry {
        DeviceRegistry::new(Arc::new(MemoryStore::new()), GroupDefaults::default())
    }

    #[tokio::test]
    async fn test_register_into_default_group() {
        let registry = create_test_registry();

        let device = registry.register(None, "b8:27:eb:00:00:01").await.unwrap();
        assert!(device.id > 0);
        assert_eq!(device.group_id, "default_device_group");

        let devices = registry.list_in_group(None).await.unwrap();
        assert_eq!(devices, vec![device]);
    }

    #[tokio::test]
    async fn test_groups_do_not_intersect() {
        let registry = create_test_registry();
        let a = registry.register(Some("g1"), "a").await.unwrap();
        let b = registry.register(Some("g2"), "b").await.unwrap();

        let g1 = registry.list_in_group(Some("g1")).await.unwrap();
        let g2 = registry.list_in_group(Some("g2")).await.unwrap();
        assert_eq!(g1.iter().map(|d| d.id).collect::<Vec<_>>(), vec![a.id]);
        assert_eq!(g2.iter().map(|d| d.id).collect::<Vec<_>>(), vec![b.id]);
        assert!(registry.list_in_group(None).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_list_orders_by_last_ping() {
        let registry = create_test_registry();
        for i in 0..4 {
            registry.register(Some("g1"), &format!("cam-{}", i)).await.unwrap();
        }

        let devices = registry.list_in_group(Some("g1")).await.unwrap();
        assert_eq!(devices.len(), 4);
        for pair in devices.windows(2) {
            assert!(pair[0].last_ping_time >= pair[1].last_ping_time);
        }
    }

    #[tokio::test]
    async fn test_ping_moves_device_first() {
        let registry = create_test_registry();
        let first = registry.register(Some("g1"), "first").await.unwrap();
        registry.register(Some("g1"), "second").await.unwrap();

        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        let pinged = registry.ping(first.id).await.unwrap();
        assert!(pinged.last_ping_time > first.last_ping_time);

        let devices = registry.list_in_group(Some("g1")).await.unwrap();
        assert_eq!(devices[0].id, first.id);
    }

    #[tokio::test]
    async fn test_external_id_length_counts_chars() {
        let registry = create_test_registry();

        // 255 个多字节字符，字节数远超 255
        let wide = "前".repeat(MAX_EXTERNAL_ID_LEN);
        let device = registry.register(None, &wide).await.unwrap();
        assert_eq!(device.external_id, wide);

        let err = registry
            .register(None, &"前".repeat(MAX_EXTERNAL_ID_LEN + 1))
            .await
            .unwrap_err();
        assert!(err.is_validation());
        assert_eq!(registry.list_in_group(None).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_ping_unknown_device() {
        let registry = create_test_registry();
        let err = registry.ping(42).await.unwrap_err();
        assert!(matches!(err, DeviceError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_clear_group() {
        let registry = create_test_registry();
        registry.register(Some("g1"), "a").await.unwrap();
        registry.register(Some("g1"), "b").await.unwrap();
        registry.register(Some("g2"), "c").await.unwrap();

        assert_eq!(registry.clear_group("g1").await.unwrap(), 2);
        assert!(registry.list_in_group(Some("g1")).await.unwrap().is_empty());
        assert_eq!(registry.list_in_group(Some("g2")).await.unwrap().len(), 1);

        // 空分组清理不是错误
        assert_eq!(registry.clear_group("g1").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_clear_group_requires_id() {
        let registry = create_test_registry();
        registry.register(None, "a").await.unwrap();

        let err = registry.clear_group("").await.unwrap_err();
        assert!(err.is_validation());
        assert_eq!(registry.list_in_group(None).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_external_id_too_long() {
        let registry = create_test_registry();
        let long_id = "x".repeat(256);
        assert!(registry.register(None, &long_id).await.unwrap_err().is_validation());
    }
}
