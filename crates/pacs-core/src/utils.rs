//! 通用工具函数

use chrono::NaiveDateTime;
use tracing::trace;
use uuid::Uuid;

/// 基于UUID的DICOM UID根 (ISO/IEC 9834-8)
pub const UUID_UID_ROOT: &str = "2.25";

/// 生成唯一的DICOM标识符
///
/// UUID v4 取自操作系统的密码学随机源，多个进程并发生成也无需协调。
pub fn generate_dicom_uid() -> String {
    let uid = format!("{}.{}", UUID_UID_ROOT, Uuid::new_v4().as_u128());
    trace!("生成UID: {}", uid);
    uid
}

/// 验证DICOM UID格式
pub fn is_valid_dicom_uid(uid: &str) -> bool {
    if uid.is_empty() || uid.len() > 64 {
        trace!("UID长度无效: {}", uid.len());
        return false;
    }

    let valid = uid.split('.').all(|component| {
        !component.is_empty()
            && component.chars().all(|c| c.is_ascii_digit())
            && (component == "0" || !component.starts_with('0'))
    });
    if !valid {
        trace!("UID格式无效: {}", uid);
    }
    valid
}

/// 生成不会冲突的文件名主干
pub fn unique_file_stem() -> String {
    Uuid::new_v4().simple().to_string()
}

/// 生成不会冲突的临时文件名
pub fn unique_file_name(extension: &str) -> String {
    format!("{}.{}", unique_file_stem(), extension)
}

/// 格式化为DICOM DA (YYYYMMDD) 与 TM (HHMMSS.ffffff)
pub fn dicom_date_time(at: &NaiveDateTime) -> (String, String) {
    (
        at.format("%Y%m%d").to_string(),
        at.format("%H%M%S%.6f").to_string(),
    )
}
