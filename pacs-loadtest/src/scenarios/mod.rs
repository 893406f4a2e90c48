//! goose压测场景
//!
//! 每个场景对应一类虚拟用户，场景权重决定用户的分配比例。

mod http;
pub mod tasks;

use crate::config::{LoadTestConfig, ScenarioConfig};
use goose::prelude::*;
use pacs_client::RetryPolicy;
use pacs_core::BatchLevel;
use pacs_dicom::SyntheticRecordGenerator;
use std::sync::OnceLock;
use tasks::*;

/// 场景运行时共享的只读上下文
#[derive(Debug, Clone)]
pub struct ScenarioContext {
    pub generator: SyntheticRecordGenerator,
    pub retry: RetryPolicy,
    pub upload_level: BatchLevel,
    pub anonymize_async: bool,
    pub patient_name_pattern: String,
}

impl ScenarioContext {
    pub fn from_config(config: &LoadTestConfig) -> Self {
        Self {
            generator: SyntheticRecordGenerator::new(config.generator.clone()),
            retry: config.retry.clone(),
            upload_level: config.scenario.upload_level,
            anonymize_async: config.archive.anonymize_async,
            patient_name_pattern: config.scenario.patient_name_pattern.clone(),
        }
    }
}

static CONTEXT: OnceLock<ScenarioContext> = OnceLock::new();

/// 安装场景上下文，只能在压测开始前调用一次
pub fn install_context(context: ScenarioContext) -> bool {
    CONTEXT.set(context).is_ok()
}

/// 当前场景上下文，未安装时使用默认配置
pub fn context() -> &'static ScenarioContext {
    CONTEXT.get_or_init(|| ScenarioContext::from_config(&LoadTestConfig::default()))
}

/// 场景类别
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScenarioKind {
    ApiRead,
    Upload,
    RandomEntity,
    Anonymize,
    Delete,
    SlowQuery,
}

impl ScenarioKind {
    pub fn name(&self) -> &'static str {
        match self {
            ScenarioKind::ApiRead => "ApiRead",
            ScenarioKind::Upload => "Upload",
            ScenarioKind::RandomEntity => "RandomEntity",
            ScenarioKind::Anonymize => "Anonymize",
            ScenarioKind::Delete => "Delete",
            ScenarioKind::SlowQuery => "SlowQuery",
        }
    }

    /// 配置中的键名
    pub fn config_key(&self) -> &'static str {
        match self {
            ScenarioKind::ApiRead => "api_read",
            ScenarioKind::Upload => "upload",
            ScenarioKind::RandomEntity => "random_entity",
            ScenarioKind::Anonymize => "anonymize",
            ScenarioKind::Delete => "delete",
            ScenarioKind::SlowQuery => "slow_query",
        }
    }
}

/// 权重大于0的场景及其权重
pub fn enabled_scenarios(config: &ScenarioConfig) -> Vec<(ScenarioKind, usize)> {
    let weights = &config.weights;
    [
        (ScenarioKind::ApiRead, weights.api_read),
        (ScenarioKind::Upload, weights.upload),
        (ScenarioKind::RandomEntity, weights.random_entity),
        (ScenarioKind::Anonymize, weights.anonymize),
        (ScenarioKind::Delete, weights.delete),
        (ScenarioKind::SlowQuery, weights.slow_query),
    ]
    .into_iter()
    .filter(|(_, weight)| *weight > 0)
    .collect()
}

fn scenario_for(kind: ScenarioKind) -> Scenario {
    let scenario = Scenario::new(kind.name());
    match kind {
        ScenarioKind::ApiRead => scenario
            .register_transaction(transaction!(get_system))
            .register_transaction(transaction!(open_studies)),
        ScenarioKind::Upload => scenario.register_transaction(transaction!(upload_generated_batch)),
        ScenarioKind::RandomEntity => scenario
            .register_transaction(transaction!(get_random_study))
            .register_transaction(transaction!(get_random_series))
            .register_transaction(transaction!(get_random_instance))
            .register_transaction(transaction!(download_random_instance)),
        ScenarioKind::Anonymize => scenario.register_transaction(transaction!(anonymize_random_study)),
        ScenarioKind::Delete => scenario.register_transaction(transaction!(delete_random_study)),
        ScenarioKind::SlowQuery => scenario.register_transaction(transaction!(find_studies)),
    }
}

/// 按配置构建所有启用的场景
pub fn build_scenarios(config: &ScenarioConfig) -> Result<Vec<Scenario>, GooseError> {
    enabled_scenarios(config)
        .into_iter()
        .map(|(kind, weight)| {
            let (min_wait, max_wait) = config.wait_range(kind.config_key());
            scenario_for(kind)
                .set_weight(weight)?
                .set_wait_time(min_wait, max_wait)
        })
        .collect()
}
