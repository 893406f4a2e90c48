//! # DICOM合成数据模块
//!
//! 生成用于压测的合成DICOM记录（患者 → 检查 → 序列 → 实例），
//! 并提供回读解析和校验功能。

pub mod generator;
pub mod parser;
pub mod scratch;
pub mod validator;

pub use generator::{GeneratorConfig, SyntheticRecordGenerator};
pub use parser::{DicomParser, ParsedDicomObject};
pub use scratch::ScratchDir;
pub use validator::{RecordValidator, ValidationResult};
