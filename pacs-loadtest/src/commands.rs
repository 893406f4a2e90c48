//! 命令行子命令的实现

use crate::config::LoadTestConfig;
use anyhow::{Context, Result};
use pacs_client::{discard_records, upload_batch, ArchiveClient};
use pacs_core::{BatchLevel, RecordHandle};
use pacs_dicom::{DicomParser, RecordValidator, ScratchDir, SyntheticRecordGenerator, ValidationResult};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// 生成结果摘要
#[derive(Debug, Clone, Serialize)]
pub struct GenerateSummary {
    pub level: BatchLevel,
    pub patient_id: String,
    pub records: usize,
    pub studies: usize,
    pub series: usize,
    pub directory: PathBuf,
}

impl GenerateSummary {
    pub fn from_records(level: BatchLevel, patient_id: &str, directory: &Path, records: &[RecordHandle]) -> Self {
        let mut studies: Vec<&str> = records.iter().map(|r| r.study_uid.as_str()).collect();
        studies.sort_unstable();
        studies.dedup();
        let mut series: Vec<&str> = records.iter().map(|r| r.series_uid.as_str()).collect();
        series.sort_unstable();
        series.dedup();

        Self {
            level,
            patient_id: patient_id.to_string(),
            records: records.len(),
            studies: studies.len(),
            series: series.len(),
            directory: directory.to_path_buf(),
        }
    }
}

/// 在本地生成一批合成记录，文件保留在输出目录
pub fn generate(
    config: &LoadTestConfig,
    level: BatchLevel,
    patient_id: &str,
    out_dir: Option<&Path>,
) -> Result<(Vec<RecordHandle>, GenerateSummary)> {
    let mut generator_config = config.generator.clone();
    if let Some(dir) = out_dir {
        generator_config.scratch_dir = dir.to_path_buf();
    }

    let scratch = ScratchDir::prepare(&generator_config.scratch_dir)
        .with_context(|| format!("无法创建输出目录 {}", generator_config.scratch_dir.display()))?;
    let generator = SyntheticRecordGenerator::new(generator_config);

    let records = generator
        .create_batch(level, patient_id)
        .with_context(|| format!("生成{}失败", level.as_str()))?;

    let summary = GenerateSummary::from_records(level, patient_id, scratch.path(), &records);
    info!(
        "已生成 {} 条记录: {} 个检查, {} 个序列",
        summary.records, summary.studies, summary.series
    );
    Ok((records, summary))
}

/// 生成若干患者并上传到归档服务，上传完成后删除本地文件
///
/// 返回归档服务分配的实例ID。
pub async fn seed(config: &LoadTestConfig, patients: usize) -> Result<Vec<String>> {
    let client = ArchiveClient::new(
        config.archive.base_url.clone(),
        config.archive.timeout(),
        config.retry.clone(),
    )?;
    let scratch = ScratchDir::prepare(&config.generator.scratch_dir)?;
    let generator = SyntheticRecordGenerator::new(config.generator.clone());

    info!("开始预置数据: {} 个患者 -> {}", patients, client.base_url());

    let mut ids = Vec::new();
    for n in 0..patients {
        let patient_id = format!("SEED-{:04}", n + 1);
        let batch_generator = generator.clone();
        let batch_patient = patient_id.clone();

        let records = tokio::task::spawn_blocking(move || batch_generator.create_patient(&batch_patient))
            .await
            .context("生成任务异常退出")??;

        let uploaded = upload_batch(&client, &records).await;
        discard_records(&records).await?;

        let uploaded = uploaded.with_context(|| format!("患者 {} 上传失败", patient_id))?;
        info!("患者 {} 已上传: {} 条记录", patient_id, uploaded.len());
        ids.extend(uploaded);
    }

    let leftover = scratch.purge()?;
    if leftover > 0 {
        warn!("临时目录中残留 {} 个文件，已清理", leftover);
    }
    Ok(ids)
}

/// 清空临时目录
pub fn cleanup(config: &LoadTestConfig) -> Result<usize> {
    let scratch = ScratchDir::prepare(&config.generator.scratch_dir)?;
    let removed = scratch.purge()?;
    info!("已清理 {} 个文件: {}", removed, scratch.path().display());
    Ok(removed)
}

/// 解析并校验一个记录文件
pub fn validate(path: &Path) -> Result<ValidationResult> {
    let parsed = DicomParser::parse_file(path).with_context(|| format!("无法解析 {}", path.display()))?;
    info!("{}", parsed.get_summary());
    Ok(RecordValidator::new().validate(&parsed))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config_in(dir: &Path) -> LoadTestConfig {
        let mut config = LoadTestConfig::default();
        config.generator.scratch_dir = dir.join("scratch");
        config
    }

    #[test]
    fn test_generate_study() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_in(dir.path());
        let out = dir.path().join("out");

        let (records, summary) = generate(&config, BatchLevel::Study, "P-1", Some(&out)).unwrap();

        assert_eq!(records.len(), 200);
        assert_eq!(summary.studies, 1);
        assert_eq!(summary.series, 2);
        assert_eq!(summary.directory, out);
        assert!(records.iter().all(|r| r.path.starts_with(&out)));
        assert!(!config.generator.scratch_dir.exists());
    }

    #[test]
    fn test_generate_then_validate() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_in(dir.path());

        let (records, _) = generate(&config, BatchLevel::Record, "P-2", None).unwrap();
        let result = validate(&records[0].path).unwrap();
        assert!(result.is_valid, "{}", result.get_summary());
    }

    #[test]
    fn test_cleanup_removes_generated_files() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_in(dir.path());

        generate(&config, BatchLevel::Record, "P-3", None).unwrap();
        generate(&config, BatchLevel::Record, "P-3", None).unwrap();

        assert_eq!(cleanup(&config).unwrap(), 2);
        assert_eq!(cleanup(&config).unwrap(), 0);
    }

    #[test]
    fn test_validate_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        assert!(validate(&dir.path().join("missing.dcm")).is_err());
    }

    #[tokio::test]
    async fn test_seed_unreachable_archive_cleans_up() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = config_in(dir.path());
        config.archive.base_url = "http://127.0.0.1:0".to_string();
        config.archive.timeout_secs = 1;
        config.retry = pacs_client::RetryPolicy::none();

        assert!(seed(&config, 1).await.is_err());

        let leftover = std::fs::read_dir(&config.generator.scratch_dir).unwrap().count();
        assert_eq!(leftover, 0);
    }
}
