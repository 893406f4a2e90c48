//! # 归档服务客户端
//!
//! 封装被测影像归档服务的REST接口：
//! - 接口路径构造，供HTTP客户端和压测场景共用
//! - 基于reqwest的客户端，覆盖上传、查询、下载、匿名化和删除
//! - 有上限的重试策略
//! - 批量上传合成记录

pub mod client;
pub mod endpoints;
pub mod retry;
pub mod sink;

pub use client::ArchiveClient;
pub use retry::{RetryPolicy, RetryStep};
pub use sink::{discard_records, upload_batch, RecordSink};
