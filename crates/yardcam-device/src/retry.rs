use crate::model::{Command, CommandId, CommandStatus, Device, DeviceId, Incident};
use crate::store::{CommandStore, DeviceStore, IncidentStore};
use crate::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;
use tracing::warn;

/// 重试策略（有上限的指数退避）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// 最大尝试次数（包含第一次）
    pub max_attempts: u32,
    /// 首次重试前的等待时间（毫秒）
    pub initial_delay_ms: u64,
    /// 退避倍数
    pub backoff_multiplier: f64,
    /// 最大等待时间（毫秒）
    pub max_delay_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay_ms: 100,
            backoff_multiplier: 2.0,
            max_delay_ms: 5000,
        }
    }
}

impl RetryPolicy {
    /// 第 `attempt` 次失败后的等待时间（从 1 开始计数）
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let delay = (self.initial_delay_ms as f64
            * self
                .backoff_multiplier
                .powi(attempt.saturating_sub(1) as i32))
        .min(self.max_delay_ms as f64) as u64;
        Duration::from_millis(delay)
    }

    /// 不重试
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            ..Default::default()
        }
    }

    /// 执行操作，仅对暂时性错误重试
    pub async fn run<T, F, Fut>(&self, operation: &str, mut f: F) -> Result<T>
    where
        F: FnMut() -> Fut + Send,
        Fut: Future<Output = Result<T>> + Send,
        T: Send,
    {
        let max_attempts = self.max_attempts.max(1);
        let mut attempt = 1;
        loop {
            match f().await {
                Err(err) if err.is_transient() && attempt < max_attempts => {
                    let delay = self.delay_for_attempt(attempt);
                    warn!(
                        operation,
                        attempt,
                        max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "Transient storage failure, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                result => return result,
            }
        }
    }
}

/// 带重试的存储装饰器
///
/// 包装任意存储实现，数据模型本身不感知重试
///
/// 重试范围：
/// * 读取（list / get / exists）
/// * `touch_device`，重复写入同一时间戳没有副作用
/// * `update_command_status`，条件写入，提交后重试会因状态不匹配返回 `None`
/// * `delete_*`，结果状态幂等，但提交后重试时返回的删除数量可能偏小
///
/// `insert_*` 不重试：写入提交后连接断开时，重试会产生重复记录
pub struct RetryingStore<S> {
    inner: S,
    policy: RetryPolicy,
}

impl<S> RetryingStore<S> {
    pub fn new(inner: S, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }
}

#[async_trait]
impl<S: DeviceStore> DeviceStore for RetryingStore<S> {
    async fn insert_device(&self, device: Device) -> Result<Device> {
        self.inner.insert_device(device).await
    }

    async fn list_devices(&self, group_id: &str) -> Result<Vec<Device>> {
        self.policy
            .run("list_devices", || self.inner.list_devices(group_id))
            .await
    }

    async fn delete_devices(&self, group_id: &str) -> Result<u64> {
        self.policy
            .run("delete_devices", || self.inner.delete_devices(group_id))
            .await
    }

    async fn get_device(&self, id: DeviceId) -> Result<Option<Device>> {
        self.policy
            .run("get_device", || self.inner.get_device(id))
            .await
    }

    async fn device_exists(&self, id: DeviceId) -> Result<bool> {
        self.policy
            .run("device_exists", || self.inner.device_exists(id))
            .await
    }

    async fn touch_device(&self, id: DeviceId, at: DateTime<Utc>) -> Result<Option<Device>> {
        self.policy
            .run("touch_device", || self.inner.touch_device(id, at))
            .await
    }
}

#[async_trait]
impl<S: CommandStore> CommandStore for RetryingStore<S> {
    async fn insert_command(&self, command: Command) -> Result<Command> {
        self.inner.insert_command(command).await
    }

    async fn list_commands(&self, queue_group_id: &str) -> Result<Vec<Command>> {
        self.policy
            .run("list_commands", || self.inner.list_commands(queue_group_id))
            .await
    }

    async fn list_commands_for_device(&self, device_ref: DeviceId) -> Result<Vec<Command>> {
        self.policy
            .run("list_commands_for_device", || {
                self.inner.list_commands_for_device(device_ref)
            })
            .await
    }

    async fn delete_commands(&self, queue_group_id: &str) -> Result<u64> {
        self.policy
            .run("delete_commands", || self.inner.delete_commands(queue_group_id))
            .await
    }

    async fn get_command(&self, id: CommandId) -> Result<Option<Command>> {
        self.policy
            .run("get_command", || self.inner.get_command(id))
            .await
    }

    async fn update_command_status(
        &self,
        id: CommandId,
        expected: CommandStatus,
        status: CommandStatus,
        at: DateTime<Utc>,
    ) -> Result<Option<Command>> {
        self.policy
            .run("update_command_status", || {
                self.inner.update_command_status(id, expected, status, at)
            })
            .await
    }
}

#[async_trait]
impl<S: IncidentStore> IncidentStore for RetryingStore<S> {
    async fn insert_incident(&self, incident: Incident) -> Result<Incident> {
        self.inner.insert_incident(incident).await
    }

    async fn list_incidents(&self, log_id: &str) -> Result<Vec<Incident>> {
        self.policy
            .run("list_incidents", || self.inner.list_incidents(log_id))
            .await
    }

    async fn delete_incidents(&self, log_id: &str) -> Result<u64> {
        self.policy
            .run("delete_incidents", || self.inner.delete_incidents(log_id))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{DeviceError, MemoryStore};
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    fn fast_policy(max_attempts: u32) -> RetryPolicy {
        RetryPolicy {
            max_attempts,
            initial_delay_ms: 1,
            backoff_multiplier: 2.0,
            max_delay_ms: 4,
        }
    }

    /// 前 N 次调用返回暂时性错误的存储
    struct FlakyStore {
        inner: MemoryStore,
        failures_left: AtomicU32,
        calls: Arc<AtomicU32>,
    }

    impl FlakyStore {
        fn new(failures: u32) -> Self {
            Self {
                inner: MemoryStore::new(),
                failures_left: AtomicU32::new(failures),
                calls: Arc::new(AtomicU32::new(0)),
            }
        }

        fn check(&self) -> Result<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let left = self.failures_left.load(Ordering::SeqCst);
            if left > 0 {
                self.failures_left.store(left - 1, Ordering::SeqCst);
                return Err(DeviceError::unavailable("connection reset"));
            }
            Ok(())
        }
    }

    #[async_trait]
    impl DeviceStore for FlakyStore {
        /// 先提交再报错，模拟写入成功但响应丢失
        async fn insert_device(&self, device: Device) -> Result<Device> {
            let device = self.inner.insert_device(device).await?;
            self.check()?;
            Ok(device)
        }

        async fn list_devices(&self, group_id: &str) -> Result<Vec<Device>> {
            self.check()?;
            self.inner.list_devices(group_id).await
        }

        async fn delete_devices(&self, _group_id: &str) -> Result<u64> {
            Err(DeviceError::validation("not retried"))
        }

        async fn get_device(&self, id: DeviceId) -> Result<Option<Device>> {
            self.inner.get_device(id).await
        }

        async fn device_exists(&self, id: DeviceId) -> Result<bool> {
            self.inner.device_exists(id).await
        }

        async fn touch_device(&self, id: DeviceId, at: DateTime<Utc>) -> Result<Option<Device>> {
            self.inner.touch_device(id, at).await
        }
    }

    #[test]
    fn test_retry_policy_delay() {
        let policy = RetryPolicy {
            max_attempts: 5,
            initial_delay_ms: 100,
            backoff_multiplier: 2.0,
            max_delay_ms: 500,
        };

        assert_eq!(policy.delay_for_attempt(1).as_millis(), 100);
        assert_eq!(policy.delay_for_attempt(2).as_millis(), 200);
        assert_eq!(policy.delay_for_attempt(3).as_millis(), 400);
        assert_eq!(policy.delay_for_attempt(4).as_millis(), 500);
        assert_eq!(policy.delay_for_attempt(10).as_millis(), 500);
    }

    #[tokio::test]
    async fn test_transient_errors_are_retried() {
        let flaky = FlakyStore::new(2);
        let calls = flaky.calls.clone();
        let store = RetryingStore::new(flaky, fast_policy(3));

        let devices = store.list_devices("g").await.unwrap();
        assert!(devices.is_empty());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_inserts_are_not_retried() {
        let flaky = FlakyStore::new(1);
        let calls = flaky.calls.clone();
        let store = RetryingStore::new(flaky, fast_policy(3));

        let err = store
            .insert_device(Device::new("g", "cam"))
            .await
            .unwrap_err();
        assert!(err.is_transient());
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        // 写入已提交，不能出现第二条记录
        let devices = store.list_devices("g").await.unwrap();
        assert_eq!(devices.len(), 1);
        assert_eq!(devices[0].external_id, "cam");
    }

    #[tokio::test]
    async fn test_gives_up_after_max_attempts() {
        let flaky = FlakyStore::new(5);
        let calls = flaky.calls.clone();
        let store = RetryingStore::new(flaky, fast_policy(2));

        let err = store.list_devices("g").await.unwrap_err();
        assert!(err.is_transient());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_non_transient_errors_are_not_retried() {
        let store = RetryingStore::new(FlakyStore::new(0), fast_policy(3));
        let err = store.delete_devices("g").await.unwrap_err();
        assert!(err.is_validation());
    }

    #[tokio::test]
    async fn test_no_retry_policy() {
        let flaky = FlakyStore::new(1);
        let calls = flaky.calls.clone();
        let store = RetryingStore::new(flaky, RetryPolicy::none());

        assert!(store.list_devices("g").await.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
