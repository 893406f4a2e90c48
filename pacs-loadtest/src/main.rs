//! 压测工具主程序

use anyhow::Result;
use clap::{Parser, Subcommand};
use pacs_core::BatchLevel;
use pacs_loadtest::{commands, logging, LoadTestConfig};
use std::path::PathBuf;
use tracing::{error, info};

/// 压测工具命令行参数
#[derive(Parser, Debug)]
#[command(name = "pacs-loadtest")]
#[command(about = "影像归档服务压测工具：合成DICOM数据的生成、预置和清理")]
struct Args {
    /// 配置文件路径
    #[arg(short, long, global = true)]
    config: Option<String>,

    /// 日志级别，覆盖配置文件
    #[arg(short, long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// 在本地生成一批合成记录
    Generate {
        /// 患者ID
        #[arg(short, long, default_value = "LOADTEST-0001")]
        patient_id: String,

        /// 生成层级: record, series, study, patient
        #[arg(short = 'L', long, default_value = "series")]
        level: BatchLevel,

        /// 输出目录，默认使用配置中的临时目录
        #[arg(short, long)]
        out: Option<PathBuf>,
    },
    /// 生成患者数据并上传到归档服务
    Seed {
        /// 患者数量
        #[arg(short, long, default_value = "1")]
        patients: usize,
    },
    /// 清空临时目录
    Cleanup,
    /// 校验一个记录文件
    Validate {
        file: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let config = LoadTestConfig::load(args.config.as_deref())?;

    let level = args.log_level.as_deref().unwrap_or(&config.logging.level);
    logging::init_logging(level);

    match args.command {
        Command::Generate { patient_id, level, out } => {
            let (_, summary) = commands::generate(&config, level, &patient_id, out.as_deref())?;
            println!("{}", serde_json::to_string_pretty(&summary)?);
        }
        Command::Seed { patients } => {
            let ids = commands::seed(&config, patients).await?;
            info!("预置完成: {} 个实例", ids.len());
        }
        Command::Cleanup => {
            commands::cleanup(&config)?;
        }
        Command::Validate { file } => {
            let result = commands::validate(&file)?;
            println!("{}", result.get_summary());
            for e in &result.errors {
                error!("  {}", e);
            }
            if !result.is_valid {
                anyhow::bail!("记录校验失败: {}", file.display());
            }
        }
    }

    Ok(())
}
