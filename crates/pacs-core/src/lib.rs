//! # PACS Core
//!
//! 压测工具的核心模块，提供错误定义、标识符生成和归档服务的数据模型。

pub mod error;
pub mod models;
pub mod utils;

pub use error::{PacsError, Result};
pub use models::*;
