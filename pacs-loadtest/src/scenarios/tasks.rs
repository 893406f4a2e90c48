//! 压测事务

use super::http::{choose, delete, get_bytes, get_json, local_failure, post_json, upload_dicom};
use super::{context, ScenarioContext};
use goose::prelude::*;
use pacs_client::endpoints;
use pacs_core::utils::unique_file_stem;
use pacs_core::{AnonymizeResponse, RecordHandle, SeriesResource, StudyResource, SystemInfo};
use serde_json::Value;
use tracing::{debug, error, info, warn};

/// 新患者ID，每个上传批次一个
pub fn new_patient_id() -> String {
    let stem = unique_file_stem();
    format!("LOADTEST-{}", &stem[..12])
}

/// GET /system
pub async fn get_system(user: &mut GooseUser) -> TransactionResult {
    if let Some(system) = get_json::<SystemInfo>(user, endpoints::SYSTEM, "/system").await? {
        debug!("归档服务: {:?} {:?}", system.name, system.version);
    }
    Ok(())
}

/// 逐层遍历 检查 → 序列 → 实例
pub async fn open_studies(user: &mut GooseUser) -> TransactionResult {
    let Some(study_ids) = get_json::<Vec<String>>(user, endpoints::STUDIES, "/studies").await? else {
        return Ok(());
    };

    for study_id in &study_ids {
        let path = endpoints::study(study_id);
        let Some(study) = get_json::<StudyResource>(user, &path, "/studies/{id}").await? else {
            continue;
        };

        for series_id in &study.series {
            let path = endpoints::series(series_id);
            let Some(series) = get_json::<SeriesResource>(user, &path, "/series/{id}").await? else {
                continue;
            };

            for instance_id in &series.instances {
                let path = endpoints::instance(instance_id);
                get_json::<Value>(user, &path, "/instances/{id}").await?;
            }
        }
    }

    Ok(())
}

async fn generate_batch(ctx: &ScenarioContext) -> Result<Vec<RecordHandle>, String> {
    let generator = ctx.generator.clone();
    let level = ctx.upload_level;
    let patient_id = new_patient_id();

    match tokio::task::spawn_blocking(move || generator.create_batch(level, &patient_id)).await {
        Ok(Ok(records)) => Ok(records),
        Ok(Err(e)) => Err(format!("合成数据生成失败: {}", e)),
        Err(e) => Err(format!("生成任务异常退出: {}", e)),
    }
}

async fn discard(records: &[RecordHandle]) {
    if let Err(e) = pacs_client::discard_records(records).await {
        warn!("清理临时记录失败: {}", e);
    }
}

/// 生成一批合成记录并逐条上传
///
/// 任意一条失败即放弃整批并让事务失败，本地文件无论成败都会删除。
/// 生成或读取记录失败同样算作事务失败。
pub async fn upload_generated_batch(user: &mut GooseUser) -> TransactionResult {
    upload_batch(user, context()).await
}

pub(crate) async fn upload_batch(user: &mut GooseUser, ctx: &ScenarioContext) -> TransactionResult {
    let records = match generate_batch(ctx).await {
        Ok(records) => records,
        Err(tag) => {
            error!("{}，放弃本批次", tag);
            return local_failure(user, endpoints::INSTANCES, &tag);
        }
    };

    for (uploaded, record) in records.iter().enumerate() {
        let dicom = match tokio::fs::read(&record.path).await {
            Ok(dicom) => dicom,
            Err(e) => {
                let tag = format!("读取合成记录失败 {}: {}", record.path.display(), e);
                error!("{}", tag);
                discard(&records).await;
                return local_failure(user, endpoints::INSTANCES, &tag);
            }
        };

        match upload_dicom(user, &dicom, &ctx.retry).await {
            Ok(Some(_)) => {}
            Ok(None) => {
                warn!("上传批次中止: {}/{} 条记录已上传", uploaded, records.len());
                discard(&records).await;
                return local_failure(user, endpoints::INSTANCES, "上传批次中止");
            }
            Err(e) => {
                discard(&records).await;
                return Err(e);
            }
        }
    }

    discard(&records).await;
    info!("上传批次完成: {} 条记录 ({})", records.len(), ctx.upload_level.as_str());
    Ok(())
}

async fn random_id(user: &mut GooseUser, list_path: &str, name: &str) -> Result<Option<String>, Box<TransactionError>> {
    let ids = get_json::<Vec<String>>(user, list_path, name).await?;
    Ok(ids.and_then(|ids| choose(&ids)))
}

/// 随机读取一个检查
pub async fn get_random_study(user: &mut GooseUser) -> TransactionResult {
    if let Some(id) = random_id(user, endpoints::STUDIES, "/studies").await? {
        get_json::<StudyResource>(user, &endpoints::study(&id), "/studies/{id}").await?;
    }
    Ok(())
}

/// 随机读取一个序列
pub async fn get_random_series(user: &mut GooseUser) -> TransactionResult {
    if let Some(id) = random_id(user, endpoints::SERIES, "/series").await? {
        get_json::<SeriesResource>(user, &endpoints::series(&id), "/series/{id}").await?;
    }
    Ok(())
}

/// 随机读取一个实例
pub async fn get_random_instance(user: &mut GooseUser) -> TransactionResult {
    if let Some(id) = random_id(user, endpoints::INSTANCES, "/instances").await? {
        get_json::<Value>(user, &endpoints::instance(&id), "/instances/{id}").await?;
    }
    Ok(())
}

/// 随机下载一个实例的DICOM文件
pub async fn download_random_instance(user: &mut GooseUser) -> TransactionResult {
    if let Some(id) = random_id(user, endpoints::INSTANCES, "/instances").await? {
        let path = endpoints::instance_file(&id);
        if let Some(size) = get_bytes(user, &path, "/instances/{id}/file").await? {
            debug!("实例已下载: {} ({} bytes)", id, size);
        }
    }
    Ok(())
}

/// 随机匿名化一个检查
pub async fn anonymize_random_study(user: &mut GooseUser) -> TransactionResult {
    let Some(id) = random_id(user, endpoints::STUDIES, "/studies").await? else {
        return Ok(());
    };

    let body = endpoints::anonymize_request(context().anonymize_async);
    let path = endpoints::study_anonymize(&id);
    if let Some(job) = post_json::<_, AnonymizeResponse>(user, &path, "/studies/{id}/anonymize", &body).await? {
        debug!("匿名化已提交: {} -> {}", id, job.id);
    }
    Ok(())
}

/// 随机删除一个检查
pub async fn delete_random_study(user: &mut GooseUser) -> TransactionResult {
    if let Some(id) = random_id(user, endpoints::STUDIES, "/studies").await? {
        if delete(user, &endpoints::study(&id), "/studies/{id}").await?.is_some() {
            debug!("检查已删除: {}", id);
        }
    }
    Ok(())
}

/// 通配查询并展开全部检查
pub async fn find_studies(user: &mut GooseUser) -> TransactionResult {
    let query = endpoints::find_studies_query(&context().patient_name_pattern);
    if let Some(found) = post_json::<_, Vec<Value>>(user, endpoints::FIND, "/tools/find", &query).await? {
        debug!("查询返回 {} 个检查", found.len());
    }
    Ok(())
}
