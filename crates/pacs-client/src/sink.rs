//! 合成记录上传

use crate::client::ArchiveClient;
use async_trait::async_trait;
use pacs_core::{RecordHandle, Result};
use tracing::{debug, info, warn};

/// 接收合成记录的目标
#[async_trait]
pub trait RecordSink: Send + Sync {
    /// 存储一条记录，返回目标端分配的ID
    async fn store(&self, record: &RecordHandle) -> Result<String>;
}

#[async_trait]
impl RecordSink for ArchiveClient {
    async fn store(&self, record: &RecordHandle) -> Result<String> {
        let dicom = tokio::fs::read(&record.path).await?;
        let uploaded = self.upload_with_retry(dicom).await?;
        Ok(uploaded.id)
    }
}

/// 按顺序上传一批记录
///
/// 任何一条失败即放弃整批，已上传的记录不回滚。
pub async fn upload_batch<S>(sink: &S, records: &[RecordHandle]) -> Result<Vec<String>>
where
    S: RecordSink + ?Sized,
{
    let mut ids = Vec::with_capacity(records.len());

    for (index, record) in records.iter().enumerate() {
        match sink.store(record).await {
            Ok(id) => {
                debug!("记录已上传: {} -> {}", record.sop_instance_uid, id);
                ids.push(id);
            }
            Err(e) => {
                warn!(
                    "批量上传中止: 第 {}/{} 条记录失败 ({}): {}",
                    index + 1,
                    records.len(),
                    record.sop_instance_uid,
                    e
                );
                return Err(e);
            }
        }
    }

    info!("批量上传完成: {} 条记录", ids.len());
    Ok(ids)
}

/// 删除本地记录文件，已不存在的文件忽略
pub async fn discard_records(records: &[RecordHandle]) -> Result<usize> {
    let mut removed = 0;

    for record in records {
        match tokio::fs::remove_file(&record.path).await {
            Ok(()) => removed += 1,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
    }

    Ok(removed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::tests::{spawn_mock, MockArchive};
    use crate::retry::RetryPolicy;
    use pacs_core::PacsError;
    use std::path::PathBuf;
    use std::sync::Mutex;
    use std::time::Duration;

    /// 在第 `fail_at` 条记录处失败的内存目标
    struct MemorySink {
        stored: Mutex<Vec<String>>,
        fail_at: Option<usize>,
    }

    #[async_trait]
    impl RecordSink for MemorySink {
        async fn store(&self, record: &RecordHandle) -> Result<String> {
            let mut stored = self.stored.lock().unwrap();
            if Some(stored.len()) == self.fail_at {
                return Err(PacsError::Rejected {
                    status: 400,
                    path: "/instances".to_string(),
                });
            }
            stored.push(record.sop_instance_uid.clone());
            Ok(format!("id-{}", stored.len()))
        }
    }

    fn record(path: PathBuf, n: usize) -> RecordHandle {
        RecordHandle {
            path,
            patient_id: "P".to_string(),
            study_uid: "2.25.1".to_string(),
            series_uid: "2.25.2".to_string(),
            sop_instance_uid: format!("2.25.{}", 100 + n),
        }
    }

    #[tokio::test]
    async fn test_upload_batch_in_order() {
        let sink = MemorySink {
            stored: Mutex::new(Vec::new()),
            fail_at: None,
        };
        let records: Vec<_> = (0..3).map(|n| record(PathBuf::from("unused"), n)).collect();

        let ids = upload_batch(&sink, &records).await.unwrap();
        assert_eq!(ids, vec!["id-1", "id-2", "id-3"]);
        assert_eq!(*sink.stored.lock().unwrap(), vec!["2.25.100", "2.25.101", "2.25.102"]);
    }

    #[tokio::test]
    async fn test_upload_batch_stops_at_first_failure() {
        let sink = MemorySink {
            stored: Mutex::new(Vec::new()),
            fail_at: Some(1),
        };
        let records: Vec<_> = (0..5).map(|n| record(PathBuf::from("unused"), n)).collect();

        let err = upload_batch(&sink, &records).await.unwrap_err();
        assert!(matches!(err, PacsError::Rejected { status: 400, .. }));
        assert_eq!(sink.stored.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_archive_client_as_sink() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("record.dcm");
        std::fs::write(&path, b"DICM").unwrap();

        let mock = MockArchive {
            failures: 1,
            ..Default::default()
        };
        let base_url = spawn_mock(mock).await;
        let client = ArchiveClient::new(base_url, Duration::from_secs(5), RetryPolicy::new(2, Duration::ZERO)).unwrap();

        let ids = upload_batch(&client, &[record(path, 0)]).await.unwrap();
        assert_eq!(ids, vec!["instance-1"]);
    }

    #[tokio::test]
    async fn test_missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let client = ArchiveClient::new("http://127.0.0.1:0", Duration::from_secs(1), RetryPolicy::none()).unwrap();

        let err = client.store(&record(dir.path().join("gone.dcm"), 0)).await.unwrap_err();
        assert!(matches!(err, PacsError::Io(_)));
    }

    #[tokio::test]
    async fn test_discard_records() {
        let dir = tempfile::tempdir().unwrap();
        let kept = dir.path().join("a.dcm");
        std::fs::write(&kept, b"x").unwrap();
        let records = vec![record(kept.clone(), 0), record(dir.path().join("missing.dcm"), 1)];

        assert_eq!(discard_records(&records).await.unwrap(), 1);
        assert!(!kept.exists());
    }
}
