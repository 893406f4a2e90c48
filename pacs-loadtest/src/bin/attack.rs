//! goose压测入口
//!
//! 命令行参数全部交给goose解析（`--host`、`-u`、`-r`、`-t` 等），
//! 压测配置通过 `PACS_LOADTEST_CONFIG` 和 `PACS_LOADTEST_*` 环境变量提供。

use anyhow::{anyhow, Result};
use goose::prelude::*;
use pacs_dicom::ScratchDir;
use pacs_loadtest::scenarios::{build_scenarios, install_context, ScenarioContext};
use pacs_loadtest::{logging, LoadTestConfig};
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    let config = LoadTestConfig::load_from_env()?;
    logging::init_logging(&config.logging.level);

    let scratch = ScratchDir::prepare(&config.generator.scratch_dir)?;
    let stale = scratch.purge()?;
    if stale > 0 {
        warn!("清理了上次压测残留的 {} 个文件", stale);
    }

    if !install_context(ScenarioContext::from_config(&config)) {
        return Err(anyhow!("场景上下文已初始化"));
    }

    let mut attack = GooseAttack::initialize().map_err(|e| anyhow!("{}", e))?;
    for scenario in build_scenarios(&config.scenario).map_err(|e| anyhow!("{}", e))? {
        attack = attack.register_scenario(scenario);
    }

    info!("开始压测: {}", config.archive.base_url);
    let metrics = attack
        .set_default(GooseDefault::Host, config.archive.base_url.as_str())
        .map_err(|e| anyhow!("{}", e))?
        .execute()
        .await
        .map_err(|e| anyhow!("{}", e));

    let removed = scratch.purge()?;
    info!("压测结束，清理了 {} 个临时文件", removed);

    metrics?;
    Ok(())
}
