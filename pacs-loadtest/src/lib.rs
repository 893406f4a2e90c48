//! # PACS压测
//!
//! 影像归档服务的压测入口：配置加载、日志初始化、goose压测场景，
//! 以及离线生成/预置数据的命令。

pub mod commands;
pub mod config;
pub mod logging;
pub mod scenarios;

pub use config::LoadTestConfig;
