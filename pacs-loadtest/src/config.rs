//! 配置管理
//!
//! 默认值 → 配置文件 → `PACS_LOADTEST_` 环境变量，后者覆盖前者。
//! 嵌套字段用双下划线分隔，例如 `PACS_LOADTEST_ARCHIVE__BASE_URL`。

use anyhow::{Context, Result};
use config::{Config, Environment, File};
use pacs_client::RetryPolicy;
use pacs_core::BatchLevel;
use pacs_dicom::GeneratorConfig;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;
use tracing::{error, info};

/// 配置文件路径的环境变量
pub const CONFIG_PATH_ENV: &str = "PACS_LOADTEST_CONFIG";

/// 场景配置键，与权重字段同名
pub const SCENARIO_KEYS: [&str; 6] = ["api_read", "upload", "random_entity", "anonymize", "delete", "slow_query"];

/// 压测完整配置
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LoadTestConfig {
    /// 被测归档服务
    pub archive: ArchiveConfig,
    /// 合成数据生成
    pub generator: GeneratorConfig,
    /// 上传重试
    pub retry: RetryPolicy,
    /// 压测场景
    pub scenario: ScenarioConfig,
    /// 日志
    pub logging: LoggingConfig,
}

/// 归档服务配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ArchiveConfig {
    /// 服务地址
    pub base_url: String,
    /// 请求超时（秒）
    pub timeout_secs: u64,
    /// 匿名化是否以异步作业方式提交
    pub anonymize_async: bool,
}

/// 压测场景配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScenarioConfig {
    /// 两次任务之间的最短等待（秒）
    pub min_wait_secs: u64,
    /// 两次任务之间的最长等待（秒）
    pub max_wait_secs: u64,
    /// 上传场景每次生成的层级
    pub upload_level: BatchLevel,
    /// 慢查询使用的患者姓名通配
    pub patient_name_pattern: String,
    /// 各场景权重，0 表示禁用
    pub weights: ScenarioWeights,
    /// 单个场景的等待时间，未配置的场景使用全局范围
    pub waits: HashMap<String, WaitRange>,
}

/// 等待时间范围（秒）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WaitRange {
    pub min_secs: u64,
    pub max_secs: u64,
}

/// 场景权重
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScenarioWeights {
    pub api_read: usize,
    pub upload: usize,
    pub random_entity: usize,
    pub anonymize: usize,
    pub delete: usize,
    pub slow_query: usize,
}

/// 日志配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// 日志级别过滤器
    pub level: String,
}

impl Default for ArchiveConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8042".to_string(),
            timeout_secs: 60,
            anonymize_async: true,
        }
    }
}

impl Default for ScenarioConfig {
    fn default() -> Self {
        Self {
            min_wait_secs: 1,
            max_wait_secs: 5,
            upload_level: BatchLevel::Series,
            patient_name_pattern: "*".to_string(),
            weights: ScenarioWeights::default(),
            waits: HashMap::from([(
                "upload".to_string(),
                WaitRange {
                    min_secs: 10,
                    max_secs: 20,
                },
            )]),
        }
    }
}

impl Default for ScenarioWeights {
    fn default() -> Self {
        Self {
            api_read: 10,
            upload: 2,
            random_entity: 10,
            anonymize: 1,
            delete: 1,
            slow_query: 1,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl ScenarioWeights {
    pub fn total(&self) -> usize {
        self.api_read + self.upload + self.random_entity + self.anonymize + self.delete + self.slow_query
    }
}

impl ScenarioConfig {
    /// 指定场景的等待时间范围
    pub fn wait_range(&self, scenario: &str) -> (Duration, Duration) {
        let (min, max) = match self.waits.get(scenario) {
            Some(range) => (range.min_secs, range.max_secs),
            None => (self.min_wait_secs, self.max_wait_secs),
        };
        (Duration::from_secs(min), Duration::from_secs(max))
    }

    fn validate_waits(&self) -> Result<()> {
        for (scenario, range) in &self.waits {
            if !SCENARIO_KEYS.contains(&scenario.as_str()) {
                return Err(anyhow::anyhow!("配置校验失败: 未知场景 scenario.waits.{}", scenario));
            }
            if range.min_secs > range.max_secs {
                return Err(anyhow::anyhow!(
                    "配置校验失败: scenario.waits.{} 的 min_secs 不能大于 max_secs",
                    scenario
                ));
            }
        }
        Ok(())
    }
}

impl ArchiveConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl LoadTestConfig {
    /// 加载配置，未指定文件时只使用默认值和环境变量
    pub fn load(config_path: Option<&str>) -> Result<Self> {
        let mut builder = Config::builder()
            .add_source(Config::try_from(&LoadTestConfig::default()).context("无法序列化默认配置")?);

        if let Some(path) = config_path {
            builder = builder.add_source(File::with_name(path));
        }

        let settings = builder
            .add_source(
                Environment::with_prefix("PACS_LOADTEST")
                    .prefix_separator("_")
                    .separator("__"),
            )
            .build()
            .context("无法读取配置")?;

        let config: LoadTestConfig = settings
            .try_deserialize()
            .context("Failed to deserialize configuration")?;

        config.validate()?;

        match config_path {
            Some(path) => info!("配置加载完成: {}", path),
            None => info!("使用默认配置"),
        }
        Ok(config)
    }

    /// 从 `PACS_LOADTEST_CONFIG` 指定的文件加载
    pub fn load_from_env() -> Result<Self> {
        let path = std::env::var(CONFIG_PATH_ENV).ok();
        Self::load(path.as_deref())
    }

    /// 校验配置
    pub fn validate(&self) -> Result<()> {
        let checks: [(&str, bool); 5] = [
            (
                "archive.base_url 必须以 http:// 或 https:// 开头",
                self.archive.base_url.starts_with("http://") || self.archive.base_url.starts_with("https://"),
            ),
            ("archive.timeout_secs 必须大于0", self.archive.timeout_secs > 0),
            ("retry.max_attempts 必须大于0", self.retry.max_attempts > 0),
            (
                "scenario.min_wait_secs 不能大于 scenario.max_wait_secs",
                self.scenario.min_wait_secs <= self.scenario.max_wait_secs,
            ),
            ("至少需要一个权重大于0的场景", self.scenario.weights.total() > 0),
        ];

        for (message, ok) in checks {
            if !ok {
                error!("配置校验失败: {}", message);
                return Err(anyhow::anyhow!("配置校验失败: {}", message));
            }
        }

        self.scenario.validate_waits().map_err(|e| {
            error!("{}", e);
            e
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config_is_valid() {
        let config = LoadTestConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.scenario.upload_level, BatchLevel::Series);
        assert_eq!(config.retry.max_attempts, 3);
    }

    #[test]
    fn test_load_from_file_overrides_defaults() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            r#"
[archive]
base_url = "http://archive.test:8042"

[retry]
max_attempts = 7

[scenario]
upload_level = "patient"

[scenario.weights]
delete = 0

[scenario.waits.api_read]
min_secs = 1
max_secs = 5
"#
        )
        .unwrap();

        let path = file.path().to_str().unwrap().to_string();
        let config = LoadTestConfig::load(Some(&path)).unwrap();

        assert_eq!(config.archive.base_url, "http://archive.test:8042");
        assert_eq!(config.archive.timeout_secs, 60);
        assert_eq!(config.retry.max_attempts, 7);
        assert_eq!(config.scenario.upload_level, BatchLevel::Patient);
        assert_eq!(config.scenario.weights.delete, 0);
        assert_eq!(config.scenario.weights.api_read, 10);
        assert_eq!(config.scenario.wait_range("api_read"), (Duration::from_secs(1), Duration::from_secs(5)));
        assert_eq!(config.scenario.wait_range("upload"), (Duration::from_secs(10), Duration::from_secs(20)));
    }

    #[test]
    fn test_wait_range_falls_back_to_global() {
        let config = ScenarioConfig::default();
        assert_eq!(config.wait_range("delete"), (Duration::from_secs(1), Duration::from_secs(5)));
        assert_eq!(config.wait_range("upload"), (Duration::from_secs(10), Duration::from_secs(20)));
    }

    #[test]
    fn test_validate_rejects_bad_waits() {
        let mut config = LoadTestConfig::default();
        config.scenario.waits.insert("teleport".to_string(), WaitRange { min_secs: 1, max_secs: 2 });
        assert!(config.validate().is_err());

        let mut config = LoadTestConfig::default();
        config.scenario.waits.insert("delete".to_string(), WaitRange { min_secs: 9, max_secs: 2 });
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = LoadTestConfig::default();
        config.archive.base_url = "localhost:8042".to_string();
        assert!(config.validate().is_err());

        let mut config = LoadTestConfig::default();
        config.scenario.min_wait_secs = 10;
        config.scenario.max_wait_secs = 1;
        assert!(config.validate().is_err());

        let mut config = LoadTestConfig::default();
        config.scenario.weights = ScenarioWeights {
            api_read: 0,
            upload: 0,
            random_entity: 0,
            anonymize: 0,
            delete: 0,
            slow_query: 0,
        };
        assert!(config.validate().is_err());
    }
}
