//! 合成记录校验
//!
//! 检查回读的记录是否具备归档服务接收所需的标识符和图像几何信息

use crate::generator::{BITS_ALLOCATED, COLUMNS, PIXEL_DATA_LEN, ROWS};
use crate::parser::ParsedDicomObject;
use pacs_core::utils::is_valid_dicom_uid;
use tracing::{debug, info};

/// 合成记录校验器
#[derive(Debug, Default)]
pub struct RecordValidator;

impl RecordValidator {
    pub fn new() -> Self {
        Self
    }

    /// 校验记录的完整性
    pub fn validate(&self, obj: &ParsedDicomObject) -> ValidationResult {
        let mut result = ValidationResult::new();

        self.validate_required_uids(obj, &mut result);
        self.validate_patient_info(obj, &mut result);
        self.validate_pixel_geometry(obj, &mut result);
        self.validate_datetime_format(obj, &mut result);

        info!(
            "记录校验完成: {}, {} 个错误, {} 个警告",
            obj.get_summary(),
            result.error_count(),
            result.warning_count()
        );

        result
    }

    /// 验证必需的UID
    fn validate_required_uids(&self, obj: &ParsedDicomObject, result: &mut ValidationResult) {
        let required_uids = [
            ("SOP Class UID", obj.sop_class_uid.as_ref()),
            ("SOP Instance UID", obj.sop_instance_uid.as_ref()),
            ("Study Instance UID", obj.study_instance_uid.as_ref()),
            ("Series Instance UID", obj.series_instance_uid.as_ref()),
            ("Transfer Syntax UID", obj.transfer_syntax_uid.as_ref()),
        ];

        for (name, uid) in required_uids {
            match uid {
                Some(uid_value) if !uid_value.trim().is_empty() => {
                    if is_valid_dicom_uid(uid_value) {
                        debug!("{} 验证通过: {}", name, uid_value);
                    } else {
                        result.add_error(format!("{} 格式无效: {}", name, uid_value));
                    }
                }
                Some(_) => result.add_error(format!("{} 不能为空", name)),
                None => result.add_error(format!("{} 缺失", name)),
            }
        }
    }

    /// 验证患者信息
    fn validate_patient_info(&self, obj: &ParsedDicomObject, result: &mut ValidationResult) {
        match &obj.patient_id {
            Some(id) if !id.trim().is_empty() => {
                if id.len() > 64 {
                    result.add_warning("患者ID长度超过64字符".to_string());
                }
            }
            Some(_) => result.add_warning("患者ID为空".to_string()),
            None => result.add_error("患者ID缺失".to_string()),
        }

        if obj.modality.as_deref().map_or(true, str::is_empty) {
            result.add_error("模态缺失".to_string());
        }
    }

    /// 验证像素几何信息与像素数据长度
    fn validate_pixel_geometry(&self, obj: &ParsedDicomObject, result: &mut ValidationResult) {
        let expected = [
            ("行数", obj.rows, ROWS as i32),
            ("列数", obj.columns, COLUMNS as i32),
            ("分配位数", obj.bits_allocated, BITS_ALLOCATED as i32),
            ("存储位数", obj.bits_stored, BITS_ALLOCATED as i32),
            ("最高位", obj.high_bit, BITS_ALLOCATED as i32 - 1),
            ("像素表示", obj.pixel_representation, 0),
        ];

        for (name, actual, wanted) in expected {
            match actual {
                Some(value) if value == wanted => {}
                Some(value) => result.add_error(format!("{}应为 {}，实际为 {}", name, wanted, value)),
                None => result.add_error(format!("{}缺失", name)),
            }
        }

        match obj.pixel_data_length {
            Some(len) if len == PIXEL_DATA_LEN => {}
            Some(len) => result.add_error(format!(
                "像素数据长度应为 {} 字节，实际为 {} 字节",
                PIXEL_DATA_LEN, len
            )),
            None => result.add_error("像素数据缺失".to_string()),
        }
    }

    /// 验证日期时间格式
    fn validate_datetime_format(&self, obj: &ParsedDicomObject, result: &mut ValidationResult) {
        for (name, date) in [("检查日期", &obj.study_date), ("内容日期", &obj.content_date)] {
            if let Some(date) = date {
                if !self.is_valid_dicom_date(date) {
                    result.add_error(format!("{}格式无效: {}", name, date));
                }
            }
        }

        for (name, time) in [("检查时间", &obj.study_time), ("内容时间", &obj.content_time)] {
            if let Some(time) = time {
                if !self.is_valid_dicom_time(time) {
                    result.add_error(format!("{}格式无效: {}", name, time));
                }
            }
        }
    }

    /// 检查是否为有效的DICOM日期 (YYYYMMDD)
    fn is_valid_dicom_date(&self, date: &str) -> bool {
        date.len() == 8
            && date.chars().all(|c| c.is_ascii_digit())
            && chrono::NaiveDate::parse_from_str(date, "%Y%m%d").is_ok()
    }

    /// 检查是否为有效的DICOM时间 (HHMMSS.FFFFFF)
    fn is_valid_dicom_time(&self, time: &str) -> bool {
        let (whole, fraction) = match time.split_once('.') {
            Some((whole, fraction)) => (whole, Some(fraction)),
            None => (time, None),
        };

        if !matches!(whole.len(), 2 | 4 | 6) || !whole.chars().all(|c| c.is_ascii_digit()) {
            return false;
        }
        if let Some(fraction) = fraction {
            if fraction.is_empty() || fraction.len() > 6 || !fraction.chars().all(|c| c.is_ascii_digit()) {
                return false;
            }
        }

        let field = |range: std::ops::Range<usize>| whole.get(range).and_then(|s| s.parse::<u32>().ok());
        let hour_ok = field(0..2).map_or(false, |h| h <= 23);
        let minute_ok = whole.len() < 4 || field(2..4).map_or(false, |m| m <= 59);
        // 允许60秒（闰秒）
        let second_ok = whole.len() < 6 || field(4..6).map_or(false, |s| s <= 60);

        hour_ok && minute_ok && second_ok
    }
}

/// 验证结果
#[derive(Debug, Clone)]
pub struct ValidationResult {
    /// 验证错误列表
    pub errors: Vec<String>,
    /// 验证警告列表
    pub warnings: Vec<String>,
    /// 是否通过验证
    pub is_valid: bool,
}

impl Default for ValidationResult {
    fn default() -> Self {
        Self::new()
    }
}

impl ValidationResult {
    pub fn new() -> Self {
        Self {
            errors: Vec::new(),
            warnings: Vec::new(),
            is_valid: true,
        }
    }

    pub fn add_error(&mut self, error: String) {
        self.is_valid = false;
        self.errors.push(error);
    }

    pub fn add_warning(&mut self, warning: String) {
        self.warnings.push(warning);
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }

    pub fn error_count(&self) -> usize {
        self.errors.len()
    }

    pub fn warning_count(&self) -> usize {
        self.warnings.len()
    }

    /// 获取验证报告摘要
    pub fn get_summary(&self) -> String {
        if self.is_valid {
            if self.has_warnings() {
                format!("验证通过，但有 {} 个警告", self.warning_count())
            } else {
                "验证完全通过".to_string()
            }
        } else {
            format!("验证失败：{} 个错误，{} 个警告", self.error_count(), self.warning_count())
        }
    }
}
