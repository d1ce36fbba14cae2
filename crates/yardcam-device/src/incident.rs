use crate::key::{GroupDefaults, GroupKind};
use crate::model::Incident;
use crate::store::IncidentStore;
use crate::{DeviceError, Result};
use chrono::Utc;
use std::sync::Arc;
use tracing::info;

/// 未提供原因时使用的默认值
pub const DEFAULT_REASON: &str = "manually uploaded image";

/// 事件日志
///
/// 记录摄像头上传的快照，图片本身保存在对象存储中，这里只保存引用
pub struct IncidentLog {
    store: Arc<dyn IncidentStore>,
    defaults: GroupDefaults,
}

impl IncidentLog {
    pub fn new(store: Arc<dyn IncidentStore>, defaults: GroupDefaults) -> Self {
        Self { store, defaults }
    }

    /// 记录一次事件
    ///
    /// # 错误
    /// * `ValidationError` - 图片名称为空
    pub async fn record(
        &self,
        log_id: Option<&str>,
        reason: Option<&str>,
        image_name: &str,
        image_key: &str,
    ) -> Result<Incident> {
        if image_name.is_empty() {
            return Err(DeviceError::validation("Missing image name"));
        }

        let key = self.defaults.key(GroupKind::IncidentLog, log_id);
        let incident = Incident {
            id: 0,
            log_id: key.group_id,
            reason: reason
                .filter(|r| !r.is_empty())
                .unwrap_or(DEFAULT_REASON)
                .to_string(),
            image_name: image_name.to_string(),
            image_key: image_key.to_string(),
            uploaded_at: Utc::now(),
        };

        let incident = self.store.insert_incident(incident).await?;
        info!(
            incident_id = incident.id,
            log_id = %incident.log_id,
            image_name = %incident.image_name,
            reason = %incident.reason,
            "Incident recorded"
        );
        Ok(incident)
    }

    /// 列出日志内的事件，最新的在前
    pub async fn list(&self, log_id: Option<&str>) -> Result<Vec<Incident>> {
        let key = self.defaults.key(GroupKind::IncidentLog, log_id);
        self.store.list_incidents(key.group_id()).await
    }

    /// 清空事件日志，必须显式提供日志 ID
    pub async fn clear(&self, log_id: &str) -> Result<u64> {
        if log_id.is_empty() {
            return Err(DeviceError::validation(
                "Clearing an incident log requires an explicit log id",
            ));
        }
        let removed = self.store.delete_incidents(log_id).await?;
        info!(log_id = %log_id, removed, "Incident log cleared");
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MemoryStore;

    fn create_test_log() -> IncidentLog {
        IncidentLog::new(Arc::new(MemoryStore::new()), GroupDefaults::default())
    }

    #[tokio::test]
    async fn test_record_defaults() {
        let log = create_test_log();
        let incident = log
            .record(None, None, "snap.jpg", "/gs/yardcam/snap.jpg")
            .await
            .unwrap();
        assert_eq!(incident.log_id, "My Yard Cam");
        assert_eq!(incident.reason, DEFAULT_REASON);
    }

    #[tokio::test]
    async fn test_missing_image_name() {
        let log = create_test_log();
        let err = log.record(None, Some("motion"), "", "key").await.unwrap_err();
        assert!(err.is_validation());
        assert!(log.list(None).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_list_newest_first_and_clear() {
        let log = create_test_log();
        let first = log
            .record(None, Some("motion"), "a.jpg", "k/a")
            .await
            .unwrap();
        let second = log
            .record(None, Some("motion"), "b.jpg", "k/b")
            .await
            .unwrap();
        log.record(Some("porch"), None, "c.jpg", "k/c").await.unwrap();

        let ids: Vec<_> = log.list(None).await.unwrap().iter().map(|i| i.id).collect();
        assert_eq!(ids, vec![second.id, first.id]);

        assert_eq!(log.clear("My Yard Cam").await.unwrap(), 2);
        assert!(log.list(None).await.unwrap().is_empty());
        assert_eq!(log.list(Some("porch")).await.unwrap().len(), 1);
        assert!(log.clear("").await.unwrap_err().is_validation());
    }
}
