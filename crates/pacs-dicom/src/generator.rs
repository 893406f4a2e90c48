//! 合成DICOM记录生成器
//!
//! 按 患者 → 检查 → 序列 → 实例 的层级生成测试数据。父层级先生成自己的UID，
//! 再把需要复用的UID显式传给子层级；生成器本身除配置外不持有任何状态。

use chrono::{Local, NaiveDateTime};
use dicom::core::{DataElement, PrimitiveValue, VR};
use dicom::dictionary_std::{tags, uids};
use dicom::object::{FileMetaTableBuilder, InMemDicomObject};
use pacs_core::utils::{dicom_date_time, generate_dicom_uid, unique_file_name};
use pacs_core::{
    BatchLevel, PacsError, RecordHandle, Result, SERIES_PER_STUDY, SERIES_SIZE,
    STUDIES_PER_PATIENT,
};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info};

/// 图像行数
pub const ROWS: u16 = 512;
/// 图像列数
pub const COLUMNS: u16 = 512;
/// 每个像素的分配位数
pub const BITS_ALLOCATED: u16 = 16;
/// 像素数据字节数
pub const PIXEL_DATA_LEN: usize = ROWS as usize * COLUMNS as usize * (BITS_ALLOCATED as usize / 8);

/// 实现类UID
pub const IMPLEMENTATION_CLASS_UID: &str = "2.25.302448623591426516838219455226914402049";
/// 实现版本名称 (最多16个字符)
pub const IMPLEMENTATION_VERSION_NAME: &str = "PACS_LOADTEST_1";

/// 生成记录文件的扩展名
pub const RECORD_EXTENSION: &str = "dcm";
/// 写入中的临时文件扩展名
pub const PARTIAL_EXTENSION: &str = "partial";

/// 生成器配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneratorConfig {
    /// 临时文件目录
    pub scratch_dir: PathBuf,
    /// 模态
    pub modality: String,
    /// 患者姓名
    pub patient_name: String,
    /// 机构名称
    pub institution_name: String,
    /// 检查描述
    pub study_description: String,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            scratch_dir: PathBuf::from("./data/scratch"),
            modality: "CT".to_string(),
            patient_name: "LOADTEST^SYNTHETIC".to_string(),
            institution_name: "PACS LOADTEST".to_string(),
            study_description: "Synthetic load test study".to_string(),
        }
    }
}

/// 合成记录生成器
#[derive(Debug, Clone)]
pub struct SyntheticRecordGenerator {
    config: GeneratorConfig,
}

impl SyntheticRecordGenerator {
    pub fn new(config: GeneratorConfig) -> Self {
        Self { config }
    }

    /// 使用指定临时目录和默认元数据创建生成器
    pub fn with_scratch_dir<P: AsRef<Path>>(scratch_dir: P) -> Self {
        Self::new(GeneratorConfig {
            scratch_dir: scratch_dir.as_ref().to_path_buf(),
            ..GeneratorConfig::default()
        })
    }

    pub fn config(&self) -> &GeneratorConfig {
        &self.config
    }

    pub fn scratch_dir(&self) -> &Path {
        &self.config.scratch_dir
    }

    /// 生成单条记录
    ///
    /// 未提供的检查/序列UID会重新生成，提供的UID原样复用。
    /// 患者ID不做校验，空字符串也会原样写入。
    pub fn create_record(
        &self,
        patient_id: &str,
        study_uid: Option<&str>,
        series_uid: Option<&str>,
    ) -> Result<RecordHandle> {
        let study_uid = study_uid.map(str::to_owned).unwrap_or_else(generate_dicom_uid);
        let series_uid = series_uid.map(str::to_owned).unwrap_or_else(generate_dicom_uid);

        self.write_record(patient_id, study_uid, series_uid, 1, 1)
    }

    /// 生成一个序列（100条记录，共享检查UID和序列UID）
    pub fn create_series(&self, patient_id: &str, study_uid: Option<&str>) -> Result<Vec<RecordHandle>> {
        self.write_series(patient_id, study_uid, 1)
    }

    fn write_series(&self, patient_id: &str, study_uid: Option<&str>, series_number: u32) -> Result<Vec<RecordHandle>> {
        let study_uid = study_uid.map(str::to_owned).unwrap_or_else(generate_dicom_uid);
        let series_uid = generate_dicom_uid();

        debug!(
            "生成序列: 患者={}, 检查={}, 序列={} (#{})",
            patient_id, study_uid, series_uid, series_number
        );

        let mut handles = Vec::with_capacity(SERIES_SIZE);
        for instance_number in 1..=SERIES_SIZE as u32 {
            let handle = self.write_record(
                patient_id,
                study_uid.clone(),
                series_uid.clone(),
                series_number,
                instance_number,
            )?;
            handles.push(handle);
        }

        Ok(handles)
    }

    /// 生成一个检查（2个序列，共200条记录）
    pub fn create_study(&self, patient_id: &str) -> Result<Vec<RecordHandle>> {
        let study_uid = generate_dicom_uid();

        let mut handles = Vec::with_capacity(SERIES_SIZE * SERIES_PER_STUDY);
        for series_number in 1..=SERIES_PER_STUDY as u32 {
            handles.extend(self.write_series(patient_id, Some(&study_uid), series_number)?);
        }

        info!("检查生成完成: 患者={}, 检查={}, 记录数={}", patient_id, study_uid, handles.len());
        Ok(handles)
    }

    /// 生成一个患者（2个检查，共400条记录）
    pub fn create_patient(&self, patient_id: &str) -> Result<Vec<RecordHandle>> {
        let mut handles = Vec::with_capacity(SERIES_SIZE * SERIES_PER_STUDY * STUDIES_PER_PATIENT);
        for _ in 0..STUDIES_PER_PATIENT {
            handles.extend(self.create_study(patient_id)?);
        }

        info!("患者生成完成: 患者={}, 记录数={}", patient_id, handles.len());
        Ok(handles)
    }

    /// 按层级生成一批记录
    pub fn create_batch(&self, level: BatchLevel, patient_id: &str) -> Result<Vec<RecordHandle>> {
        match level {
            BatchLevel::Record => Ok(vec![self.create_record(patient_id, None, None)?]),
            BatchLevel::Series => self.create_series(patient_id, None),
            BatchLevel::Study => self.create_study(patient_id),
            BatchLevel::Patient => self.create_patient(patient_id),
        }
    }

    fn write_record(
        &self,
        patient_id: &str,
        study_uid: String,
        series_uid: String,
        series_number: u32,
        instance_number: u32,
    ) -> Result<RecordHandle> {
        let sop_instance_uid = generate_dicom_uid();
        let now = Local::now().naive_local();

        let dataset = self.build_dataset(
            patient_id,
            &study_uid,
            &series_uid,
            &sop_instance_uid,
            series_number,
            instance_number,
            &now,
        );

        let file_obj = dataset
            .with_meta(
                FileMetaTableBuilder::new()
                    .transfer_syntax(uids::EXPLICIT_VR_LITTLE_ENDIAN)
                    .media_storage_sop_class_uid(uids::CT_IMAGE_STORAGE)
                    .media_storage_sop_instance_uid(sop_instance_uid.as_str())
                    .implementation_class_uid(IMPLEMENTATION_CLASS_UID)
                    .implementation_version_name(IMPLEMENTATION_VERSION_NAME),
            )
            .map_err(|e| PacsError::Dicom(format!("无法构建文件元信息: {}", e)))?;

        // 先写临时文件再改名，其他进程看不到写了一半的 .dcm 文件
        let path = self.config.scratch_dir.join(unique_file_name(RECORD_EXTENSION));
        let partial_path = path.with_extension(format!("{}.{}", RECORD_EXTENSION, PARTIAL_EXTENSION));

        let file = fs::File::create(&partial_path).map_err(|e| {
            error!("无法创建记录文件: {:?}, 错误: {}", partial_path, e);
            PacsError::Io(e)
        })?;
        if let Err(e) = file_obj.write_all(file) {
            error!("写入DICOM文件失败: {:?}, 错误: {}", partial_path, e);
            let _ = fs::remove_file(&partial_path);
            return Err(PacsError::Dicom(format!("写入DICOM文件失败 {:?}: {}", partial_path, e)));
        }
        fs::rename(&partial_path, &path)?;

        debug!("记录已写入: {:?}", path);

        Ok(RecordHandle {
            path,
            patient_id: patient_id.to_string(),
            study_uid,
            series_uid,
            sop_instance_uid,
        })
    }

    fn build_dataset(
        &self,
        patient_id: &str,
        study_uid: &str,
        series_uid: &str,
        sop_instance_uid: &str,
        series_number: u32,
        instance_number: u32,
        now: &NaiveDateTime,
    ) -> InMemDicomObject {
        let (date, time) = dicom_date_time(now);
        let mut obj = InMemDicomObject::new_empty();

        // 实例
        obj.put(DataElement::new(tags::SOP_CLASS_UID, VR::UI, PrimitiveValue::from(uids::CT_IMAGE_STORAGE)));
        obj.put(DataElement::new(tags::SOP_INSTANCE_UID, VR::UI, PrimitiveValue::from(sop_instance_uid)));
        obj.put(DataElement::new(tags::INSTANCE_NUMBER, VR::IS, PrimitiveValue::from(instance_number.to_string())));
        obj.put(DataElement::new(tags::CONTENT_DATE, VR::DA, PrimitiveValue::from(date.as_str())));
        obj.put(DataElement::new(tags::CONTENT_TIME, VR::TM, PrimitiveValue::from(time.as_str())));

        // 患者
        obj.put(DataElement::new(tags::PATIENT_ID, VR::LO, PrimitiveValue::from(patient_id)));
        obj.put(DataElement::new(tags::PATIENT_NAME, VR::PN, PrimitiveValue::from(self.config.patient_name.as_str())));

        // 检查
        obj.put(DataElement::new(tags::STUDY_INSTANCE_UID, VR::UI, PrimitiveValue::from(study_uid)));
        obj.put(DataElement::new(tags::STUDY_DATE, VR::DA, PrimitiveValue::from(date.as_str())));
        obj.put(DataElement::new(tags::STUDY_TIME, VR::TM, PrimitiveValue::from(time.as_str())));
        obj.put(DataElement::new(tags::STUDY_DESCRIPTION, VR::LO, PrimitiveValue::from(self.config.study_description.as_str())));
        obj.put(DataElement::new(tags::INSTITUTION_NAME, VR::LO, PrimitiveValue::from(self.config.institution_name.as_str())));

        // 序列
        obj.put(DataElement::new(tags::SERIES_INSTANCE_UID, VR::UI, PrimitiveValue::from(series_uid)));
        obj.put(DataElement::new(tags::SERIES_NUMBER, VR::IS, PrimitiveValue::from(series_number.to_string())));
        obj.put(DataElement::new(tags::SERIES_DATE, VR::DA, PrimitiveValue::from(date.as_str())));
        obj.put(DataElement::new(tags::SERIES_TIME, VR::TM, PrimitiveValue::from(time.as_str())));
        obj.put(DataElement::new(tags::MODALITY, VR::CS, PrimitiveValue::from(self.config.modality.as_str())));

        // 图像
        obj.put(DataElement::new(tags::SAMPLES_PER_PIXEL, VR::US, PrimitiveValue::from(1_u16)));
        obj.put(DataElement::new(tags::PHOTOMETRIC_INTERPRETATION, VR::CS, PrimitiveValue::from("MONOCHROME2")));
        obj.put(DataElement::new(tags::ROWS, VR::US, PrimitiveValue::from(ROWS)));
        obj.put(DataElement::new(tags::COLUMNS, VR::US, PrimitiveValue::from(COLUMNS)));
        obj.put(DataElement::new(tags::BITS_ALLOCATED, VR::US, PrimitiveValue::from(BITS_ALLOCATED)));
        obj.put(DataElement::new(tags::BITS_STORED, VR::US, PrimitiveValue::from(BITS_ALLOCATED)));
        obj.put(DataElement::new(tags::HIGH_BIT, VR::US, PrimitiveValue::from(BITS_ALLOCATED - 1)));
        obj.put(DataElement::new(tags::PIXEL_REPRESENTATION, VR::US, PrimitiveValue::from(0_u16)));
        obj.put(DataElement::new(tags::PIXEL_DATA, VR::OW, PrimitiveValue::from(vec![0_u8; PIXEL_DATA_LEN])));

        obj
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::DicomParser;
    use std::collections::HashSet;
    use tempfile::TempDir;

    fn generator() -> (TempDir, SyntheticRecordGenerator) {
        let dir = TempDir::new().unwrap();
        let generator = SyntheticRecordGenerator::with_scratch_dir(dir.path());
        (dir, generator)
    }

    #[test]
    fn test_create_record_mints_missing_ids() {
        let (_dir, generator) = generator();

        let handle = generator.create_record("P1", None, None).unwrap();
        assert_eq!(handle.patient_id, "P1");
        assert!(handle.study_uid.starts_with("2.25."));
        assert!(handle.series_uid.starts_with("2.25."));
        assert_ne!(handle.study_uid, handle.series_uid);
        assert!(handle.path.exists());
        assert_eq!(handle.path.extension().and_then(|e| e.to_str()), Some(RECORD_EXTENSION));
    }

    #[test]
    fn test_create_record_reuses_supplied_ids() {
        let (_dir, generator) = generator();

        let handle = generator
            .create_record("P1", Some("1.2.3.4"), Some("1.2.3.5"))
            .unwrap();
        assert_eq!(handle.study_uid, "1.2.3.4");
        assert_eq!(handle.series_uid, "1.2.3.5");
    }

    #[test]
    fn test_record_ids_are_pairwise_distinct() {
        let (_dir, generator) = generator();

        let handles: Vec<_> = (0..50)
            .map(|_| generator.create_record("P1", Some("1.2.3"), Some("1.2.4")).unwrap())
            .collect();

        let sop_uids: HashSet<_> = handles.iter().map(|h| h.sop_instance_uid.clone()).collect();
        let paths: HashSet<_> = handles.iter().map(|h| h.path.clone()).collect();
        assert_eq!(sop_uids.len(), 50);
        assert_eq!(paths.len(), 50);
    }

    #[test]
    fn test_empty_patient_id_is_accepted_verbatim() {
        let (_dir, generator) = generator();

        let handle = generator.create_record("", None, None).unwrap();
        assert_eq!(handle.patient_id, "");

        let parsed = DicomParser::parse_file(&handle.path).unwrap();
        assert_eq!(parsed.patient_id.as_deref(), Some(""));
    }

    #[test]
    fn test_create_series() {
        let (_dir, generator) = generator();

        let handles = generator.create_series("P", None).unwrap();
        assert_eq!(handles.len(), 100);

        let first = &handles[0];
        assert!(handles.iter().all(|h| h.patient_id == "P"
            && h.study_uid == first.study_uid
            && h.series_uid == first.series_uid));

        let sop_uids: HashSet<_> = handles.iter().map(|h| &h.sop_instance_uid).collect();
        assert_eq!(sop_uids.len(), 100);
    }

    #[test]
    fn test_create_series_with_supplied_study() {
        let (_dir, generator) = generator();

        let handles = generator.create_series("P", Some("1.2.826.0.1")).unwrap();
        assert!(handles.iter().all(|h| h.study_uid == "1.2.826.0.1"));
    }

    #[test]
    fn test_create_study() {
        let (_dir, generator) = generator();

        let handles = generator.create_study("P").unwrap();
        assert_eq!(handles.len(), 200);

        let studies: HashSet<_> = handles.iter().map(|h| &h.study_uid).collect();
        let series: HashSet<_> = handles.iter().map(|h| &h.series_uid).collect();
        assert_eq!(studies.len(), 1);
        assert_eq!(series.len(), 2);
    }

    #[test]
    fn test_create_patient() {
        let (_dir, generator) = generator();

        let handles = generator.create_patient("P").unwrap();
        assert_eq!(handles.len(), 400);

        let patients: HashSet<_> = handles.iter().map(|h| &h.patient_id).collect();
        let studies: HashSet<_> = handles.iter().map(|h| &h.study_uid).collect();
        let series: HashSet<_> = handles.iter().map(|h| &h.series_uid).collect();
        let sop_uids: HashSet<_> = handles.iter().map(|h| &h.sop_instance_uid).collect();
        assert_eq!(patients.len(), 1);
        assert!(patients.contains(&"P".to_string()));
        assert_eq!(studies.len(), 2);
        assert_eq!(series.len(), 4);
        assert_eq!(sop_uids.len(), 400);
    }

    #[test]
    fn test_create_batch_matches_level() {
        let (_dir, generator) = generator();

        for level in [BatchLevel::Record, BatchLevel::Series] {
            let handles = generator.create_batch(level, "P").unwrap();
            assert_eq!(handles.len(), level.record_count());
        }
    }

    #[test]
    fn test_round_trip_through_parser() {
        let (_dir, generator) = generator();

        let handle = generator.create_record("PAT-42", None, None).unwrap();
        let parsed = DicomParser::parse_file(&handle.path).unwrap();

        assert_eq!(parsed.patient_id.as_deref(), Some("PAT-42"));
        assert_eq!(parsed.study_instance_uid.as_deref(), Some(handle.study_uid.as_str()));
        assert_eq!(parsed.series_instance_uid.as_deref(), Some(handle.series_uid.as_str()));
        assert_eq!(parsed.sop_instance_uid.as_deref(), Some(handle.sop_instance_uid.as_str()));
        assert_eq!(parsed.get_image_size(), Some((512, 512)));
        assert_eq!(parsed.bits_allocated, Some(16));
        assert_eq!(parsed.pixel_representation, Some(0));
        assert_eq!(parsed.modality.as_deref(), Some("CT"));
        assert_eq!(parsed.transfer_syntax_uid.as_deref(), Some(uids::EXPLICIT_VR_LITTLE_ENDIAN));
        assert_eq!(parsed.pixel_data_length, Some(PIXEL_DATA_LEN));
    }

    #[test]
    fn test_file_starts_with_zero_preamble() {
        let (_dir, generator) = generator();

        let handle = generator.create_record("P1", None, None).unwrap();
        let bytes = fs::read(&handle.path).unwrap();
        assert!(bytes[..128].iter().all(|b| *b == 0));
        assert_eq!(&bytes[128..132], b"DICM");
        assert!(bytes.len() > PIXEL_DATA_LEN);
    }

    #[test]
    fn test_series_numbers_within_study() {
        let (_dir, generator) = generator();

        let handles = generator.create_study("P").unwrap();
        let mut numbers: Vec<(String, i32)> = handles
            .iter()
            .map(|h| {
                let parsed = DicomParser::parse_file(&h.path).unwrap();
                (h.series_uid.clone(), parsed.series_number.unwrap())
            })
            .collect();
        numbers.sort();
        numbers.dedup();

        let mut series_numbers: Vec<i32> = numbers.iter().map(|(_, n)| *n).collect();
        series_numbers.sort_unstable();
        assert_eq!(series_numbers, vec![1, 2]);
    }

    #[test]
    fn test_scratch_path_that_is_a_file_is_io_error() {
        let dir = TempDir::new().unwrap();
        let not_a_dir = dir.path().join("not_a_dir");
        fs::write(&not_a_dir, b"x").unwrap();
        let generator = SyntheticRecordGenerator::with_scratch_dir(&not_a_dir);

        let err = generator.create_record("P1", None, None).unwrap_err();
        assert!(matches!(err, PacsError::Io(_)), "unexpected error: {err}");
    }

    #[test]
    fn test_partial_file_sits_next_to_record() {
        let (dir, generator) = generator();

        let handle = generator.create_record("P1", None, None).unwrap();
        let file_name = handle.path.file_name().and_then(|n| n.to_str()).unwrap();
        assert!(file_name.ends_with(".dcm"));

        let leftovers: Vec<_> = fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().path())
            .filter(|p| p.extension().and_then(|e| e.to_str()) == Some(PARTIAL_EXTENSION))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[test]
    fn test_missing_scratch_dir_is_io_error() {
        let dir = TempDir::new().unwrap();
        let generator = SyntheticRecordGenerator::with_scratch_dir(dir.path().join("missing"));

        let err = generator.create_record("P1", None, None).unwrap_err();
        assert!(matches!(err, PacsError::Io(_)), "unexpected error: {err}");
    }

    #[test]
    fn test_concurrent_writers_do_not_collide() {
        let (dir, generator) = generator();

        let handles: Vec<RecordHandle> = std::thread::scope(|scope| {
            let workers: Vec<_> = (0..8)
                .map(|worker| {
                    let generator = &generator;
                    scope.spawn(move || {
                        (0..10)
                            .map(|_| generator.create_record(&format!("P{worker}"), None, None).unwrap())
                            .collect::<Vec<_>>()
                    })
                })
                .collect();
            workers.into_iter().flat_map(|w| w.join().unwrap()).collect()
        });

        let paths: HashSet<_> = handles.iter().map(|h| h.path.clone()).collect();
        assert_eq!(paths.len(), 80);

        for handle in &handles {
            let parsed = DicomParser::parse_file(&handle.path).unwrap();
            assert_eq!(parsed.sop_instance_uid.as_deref(), Some(handle.sop_instance_uid.as_str()));
            assert_eq!(parsed.pixel_data_length, Some(PIXEL_DATA_LEN));
        }

        let leftovers = fs::read_dir(dir.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.path().extension().and_then(|x| x.to_str()) == Some(PARTIAL_EXTENSION))
            .count();
        assert_eq!(leftovers, 0);
    }
}
