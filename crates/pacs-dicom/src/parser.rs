//! DICOM数据解析器
//!
//! 回读生成的记录文件，提取标识符与图像几何信息

use dicom::core::header::HasLength;
use dicom::dictionary_std::tags;
use dicom::object::{open_file, DefaultDicomObject};
use pacs_core::{PacsError, Result};
use std::path::Path;
use tracing::{debug, error};

/// DICOM数据解析器
pub struct DicomParser;

impl DicomParser {
    /// 解析DICOM文件
    pub fn parse_file<P: AsRef<Path>>(file_path: P) -> Result<ParsedDicomObject> {
        let file_path = file_path.as_ref();
        debug!("开始解析DICOM文件: {:?}", file_path);

        let obj = open_file(file_path).map_err(|e| {
            error!("DICOM文件解析失败: {:?}, 错误: {}", file_path, e);
            PacsError::DicomParseError(format!("无法解析DICOM文件 {:?}: {}", file_path, e))
        })?;

        Ok(Self::extract_metadata(&obj))
    }

    /// 从DICOM对象中提取元数据
    fn extract_metadata(obj: &DefaultDicomObject) -> ParsedDicomObject {
        ParsedDicomObject {
            patient_id: Self::get_string_element(obj, tags::PATIENT_ID),
            patient_name: Self::get_string_element(obj, tags::PATIENT_NAME),

            study_instance_uid: Self::get_string_element(obj, tags::STUDY_INSTANCE_UID),
            study_date: Self::get_string_element(obj, tags::STUDY_DATE),
            study_time: Self::get_string_element(obj, tags::STUDY_TIME),

            series_instance_uid: Self::get_string_element(obj, tags::SERIES_INSTANCE_UID),
            series_number: Self::get_integer_element(obj, tags::SERIES_NUMBER),
            modality: Self::get_string_element(obj, tags::MODALITY),

            sop_instance_uid: Self::get_string_element(obj, tags::SOP_INSTANCE_UID),
            sop_class_uid: Self::get_string_element(obj, tags::SOP_CLASS_UID),
            instance_number: Self::get_integer_element(obj, tags::INSTANCE_NUMBER),
            content_date: Self::get_string_element(obj, tags::CONTENT_DATE),
            content_time: Self::get_string_element(obj, tags::CONTENT_TIME),

            samples_per_pixel: Self::get_integer_element(obj, tags::SAMPLES_PER_PIXEL),
            photometric_interpretation: Self::get_string_element(obj, tags::PHOTOMETRIC_INTERPRETATION),
            rows: Self::get_integer_element(obj, tags::ROWS),
            columns: Self::get_integer_element(obj, tags::COLUMNS),
            bits_allocated: Self::get_integer_element(obj, tags::BITS_ALLOCATED),
            bits_stored: Self::get_integer_element(obj, tags::BITS_STORED),
            high_bit: Self::get_integer_element(obj, tags::HIGH_BIT),
            pixel_representation: Self::get_integer_element(obj, tags::PIXEL_REPRESENTATION),
            pixel_data_length: obj
                .element(tags::PIXEL_DATA)
                .ok()
                .and_then(|element| element.length().get())
                .map(|len| len as usize),

            transfer_syntax_uid: Some(
                obj.meta()
                    .transfer_syntax()
                    .trim_end_matches(|c: char| c == '\0' || c.is_whitespace())
                    .to_string(),
            ),
        }
    }

    /// 获取字符串类型元素的值，去掉DICOM填充字符
    fn get_string_element(obj: &DefaultDicomObject, tag: dicom::core::Tag) -> Option<String> {
        match obj.element(tag) {
            Ok(element) => match element.to_str() {
                Ok(value) => Some(
                    value
                        .trim_end_matches(|c: char| c == '\0' || c == ' ')
                        .to_string(),
                ),
                Err(e) => {
                    debug!("标签 {:?} 不是字符串类型: {}", tag, e);
                    None
                }
            },
            Err(_) => {
                debug!("未找到标签: {:?}", tag);
                None
            }
        }
    }

    /// 获取整数类型元素的值
    fn get_integer_element(obj: &DefaultDicomObject, tag: dicom::core::Tag) -> Option<i32> {
        match obj.element(tag) {
            Ok(element) => match element.to_int::<i32>() {
                Ok(value) => Some(value),
                Err(e) => {
                    debug!("标签 {:?} 不是整数类型: {}", tag, e);
                    None
                }
            },
            Err(_) => {
                debug!("未找到标签: {:?}", tag);
                None
            }
        }
    }
}

/// 解析后的DICOM记录
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedDicomObject {
    // === 患者信息 ===
    pub patient_id: Option<String>,
    pub patient_name: Option<String>,

    // === 检查信息 ===
    pub study_instance_uid: Option<String>,
    pub study_date: Option<String>,
    pub study_time: Option<String>,

    // === 序列信息 ===
    pub series_instance_uid: Option<String>,
    pub series_number: Option<i32>,
    pub modality: Option<String>,

    // === 实例信息 ===
    pub sop_instance_uid: Option<String>,
    pub sop_class_uid: Option<String>,
    pub instance_number: Option<i32>,
    pub content_date: Option<String>,
    pub content_time: Option<String>,

    // === 图像信息 ===
    pub samples_per_pixel: Option<i32>,
    pub photometric_interpretation: Option<String>,
    pub rows: Option<i32>,
    pub columns: Option<i32>,
    pub bits_allocated: Option<i32>,
    pub bits_stored: Option<i32>,
    pub high_bit: Option<i32>,
    pub pixel_representation: Option<i32>,
    /// 像素数据字节数
    pub pixel_data_length: Option<usize>,

    // === 传输语法 ===
    pub transfer_syntax_uid: Option<String>,
}

impl ParsedDicomObject {
    /// 获取图像尺寸 (行数, 列数)
    pub fn get_image_size(&self) -> Option<(i32, i32)> {
        match (self.rows, self.columns) {
            (Some(rows), Some(columns)) => Some((rows, columns)),
            _ => None,
        }
    }

    /// 获取DICOM对象的摘要信息
    pub fn get_summary(&self) -> String {
        format!(
            "DICOM对象: 患者ID={}, 检查UID={}, 序列UID={}, 模态={}",
            self.patient_id.as_deref().unwrap_or("未知"),
            self.study_instance_uid.as_deref().unwrap_or("未知"),
            self.series_instance_uid.as_deref().unwrap_or("未知"),
            self.modality.as_deref().unwrap_or("未知")
        )
    }
}
