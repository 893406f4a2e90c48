//! 核心数据模型定义

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

/// 每个序列包含的记录数
pub const SERIES_SIZE: usize = 100;
/// 每个检查包含的序列数
pub const SERIES_PER_STUDY: usize = 2;
/// 每个患者包含的检查数
pub const STUDIES_PER_PATIENT: usize = 2;

/// 一条合成记录的句柄
///
/// 文件由调用方负责上传和删除，生成器不保留任何引用。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordHandle {
    pub path: PathBuf,
    pub patient_id: String,
    pub study_uid: String,  // Study Instance UID
    pub series_uid: String, // Series Instance UID
    pub sop_instance_uid: String,
}

/// 批量生成的层级
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BatchLevel {
    Record,
    Series,
    Study,
    Patient,
}

impl BatchLevel {
    /// 该层级一次生成的记录数
    pub fn record_count(&self) -> usize {
        match self {
            BatchLevel::Record => 1,
            BatchLevel::Series => SERIES_SIZE,
            BatchLevel::Study => SERIES_SIZE * SERIES_PER_STUDY,
            BatchLevel::Patient => SERIES_SIZE * SERIES_PER_STUDY * STUDIES_PER_PATIENT,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            BatchLevel::Record => "record",
            BatchLevel::Series => "series",
            BatchLevel::Study => "study",
            BatchLevel::Patient => "patient",
        }
    }
}

impl std::str::FromStr for BatchLevel {
    type Err = crate::PacsError;

    fn from_str(s: &str) -> crate::Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "record" | "instance" => Ok(BatchLevel::Record),
            "series" => Ok(BatchLevel::Series),
            "study" => Ok(BatchLevel::Study),
            "patient" => Ok(BatchLevel::Patient),
            other => Err(crate::PacsError::Validation(format!("未知的生成层级: {}", other))),
        }
    }
}

/// 归档服务的系统信息 (`GET /system`)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct SystemInfo {
    pub name: Option<String>,
    pub version: Option<String>,
    pub api_version: Option<u32>,
    pub dicom_aet: Option<String>,
}

/// 检查资源 (`GET /studies/{id}`)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct StudyResource {
    #[serde(rename = "ID")]
    pub id: String,
    pub parent_patient: Option<String>,
    pub series: Vec<String>,
    pub main_dicom_tags: HashMap<String, String>,
}

/// 序列资源 (`GET /series/{id}`)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct SeriesResource {
    #[serde(rename = "ID")]
    pub id: String,
    pub parent_study: Option<String>,
    pub instances: Vec<String>,
    pub main_dicom_tags: HashMap<String, String>,
}

/// 实例资源 (`GET /instances/{id}`)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct InstanceResource {
    #[serde(rename = "ID")]
    pub id: String,
    pub parent_series: Option<String>,
    pub file_size: Option<u64>,
    pub index_in_series: Option<u32>,
}

/// 上传结果 (`POST /instances`)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct UploadResponse {
    #[serde(rename = "ID")]
    pub id: String,
    pub parent_patient: Option<String>,
    pub parent_study: Option<String>,
    pub parent_series: Option<String>,
    pub path: Option<String>,
    pub status: Option<String>,
}

/// 匿名化结果 (`POST /studies/{id}/anonymize`)
///
/// 同步模式返回新资源ID，异步模式返回作业ID，两者都落在 `id` 上。
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct AnonymizeResponse {
    #[serde(rename = "ID")]
    pub id: String,
    pub path: Option<String>,
    #[serde(rename = "PatientID")]
    pub patient_id: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_batch_level_counts() {
        assert_eq!(BatchLevel::Record.record_count(), 1);
        assert_eq!(BatchLevel::Series.record_count(), 100);
        assert_eq!(BatchLevel::Study.record_count(), 200);
        assert_eq!(BatchLevel::Patient.record_count(), 400);
    }

    #[test]
    fn test_batch_level_from_str() {
        assert_eq!("Series".parse::<BatchLevel>().unwrap(), BatchLevel::Series);
        assert_eq!("instance".parse::<BatchLevel>().unwrap(), BatchLevel::Record);
        assert!("hospital".parse::<BatchLevel>().is_err());
    }

    #[test]
    fn test_study_resource_deserialize() {
        let json = r#"{
            "ID": "27f7126f-4f66eb14-03ab4c8b-1b8aa5a0-b7ae3c8a",
            "ParentPatient": "ef9d77db-eb3b2bef-9b31fd3e-bf42ae46-dbdb0cc3",
            "Series": ["a", "b"],
            "MainDicomTags": {"StudyInstanceUID": "2.25.1"},
            "Type": "Study"
        }"#;
        let study: StudyResource = serde_json::from_str(json).unwrap();
        assert_eq!(study.series.len(), 2);
        assert_eq!(study.main_dicom_tags.get("StudyInstanceUID").map(String::as_str), Some("2.25.1"));
    }

    #[test]
    fn test_upload_response_deserialize() {
        let json = r#"{"ID":"abc","ParentSeries":"s","Path":"/instances/abc","Status":"Success"}"#;
        let resp: UploadResponse = serde_json::from_str(json).unwrap();
        assert_eq!(resp.id, "abc");
        assert_eq!(resp.status.as_deref(), Some("Success"));
        assert!(resp.parent_patient.is_none());
    }
}
