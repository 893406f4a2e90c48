//! 归档服务接口路径

use serde_json::{json, Value};

pub const SYSTEM: &str = "/system";
pub const PATIENTS: &str = "/patients";
pub const STUDIES: &str = "/studies";
pub const SERIES: &str = "/series";
pub const INSTANCES: &str = "/instances";
pub const FIND: &str = "/tools/find";

/// 上传实例的内容类型
pub const DICOM_CONTENT_TYPE: &str = "application/dicom";

pub fn patient(id: &str) -> String {
    format!("{}/{}", PATIENTS, id)
}

pub fn study(id: &str) -> String {
    format!("{}/{}", STUDIES, id)
}

pub fn series(id: &str) -> String {
    format!("{}/{}", SERIES, id)
}

pub fn instance(id: &str) -> String {
    format!("{}/{}", INSTANCES, id)
}

/// 实例原始DICOM文件
pub fn instance_file(id: &str) -> String {
    format!("{}/{}/file", INSTANCES, id)
}

pub fn study_anonymize(id: &str) -> String {
    format!("{}/{}/anonymize", STUDIES, id)
}

/// 匿名化请求体
///
/// 异步模式下服务端返回作业ID，压测只关心请求本身的耗时。
pub fn anonymize_request(asynchronous: bool) -> Value {
    json!({
        "Force": true,
        "Asynchronous": asynchronous,
    })
}

/// 按患者姓名通配查询检查，展开全部字段（慢接口）
pub fn find_studies_query(patient_name_pattern: &str) -> Value {
    json!({
        "Level": "Study",
        "Expand": true,
        "Query": {
            "PatientName": patient_name_pattern,
        },
    })
}
