//! goose请求辅助函数
//!
//! 所有请求都带固定的指标名称，资源ID不会把统计拆成成千上万行。

use goose::goose::GooseResponse;
use goose::metrics::{GooseRawRequest, GooseRequestMetric};
use goose::prelude::*;
use pacs_client::endpoints::{self, DICOM_CONTENT_TYPE};
use pacs_client::{RetryPolicy, RetryStep};
use pacs_core::{PacsError, UploadResponse};
use rand::seq::SliceRandom;
use reqwest::{header, Response};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, warn};

pub(super) type Outcome<T> = Result<Option<T>, Box<TransactionError>>;

/// 从列表中随机取一个ID
pub(super) fn choose(ids: &[String]) -> Option<String> {
    ids.choose(&mut rand::thread_rng()).cloned()
}

/// 把一次响应归类为归档服务错误，成功时返回 `None`
pub(super) fn classify(status: Option<u16>, path: &str) -> Option<PacsError> {
    match status {
        Some(code) if (200..300).contains(&code) => None,
        Some(code) => Some(PacsError::Rejected {
            status: code,
            path: path.to_string(),
        }),
        None => Some(PacsError::Network(format!("{}: 无响应", path))),
    }
}

/// 本地失败（生成或读取记录）让当前事务失败
///
/// 没有对应的HTTP请求，所以不计入请求统计，只出现在事务统计和调试日志里。
pub(super) fn local_failure(user: &GooseUser, name: &str, tag: &str) -> TransactionResult {
    let mut request = GooseRequestMetric {
        elapsed: user.started.elapsed().as_millis() as u64,
        scenario_index: 0,
        scenario_name: String::new(),
        transaction_index: String::new(),
        transaction_name: String::new(),
        raw: GooseRawRequest {
            method: GooseMethod::Post,
            url: String::new(),
            headers: Vec::new(),
            body: String::new(),
        },
        name: name.to_string(),
        final_url: String::new(),
        redirected: false,
        response_time: 0,
        status_code: 0,
        success: false,
        update: false,
        user: user.weighted_users_index,
        error: tag.to_string(),
        coordinated_omission_elapsed: 0,
        user_cadence: 0,
    };
    user.set_failure(tag, &mut request, None, None)
}

/// 检查响应状态，失败时记到当前请求上
fn accept(user: &GooseUser, goose: GooseResponse, path: &str) -> Outcome<(Response, GooseRequestMetric)> {
    let GooseResponse { mut request, response } = goose;

    let response = match response {
        Ok(response) => response,
        Err(e) => {
            let tag = format!("{}: {}", path, e);
            return user.set_failure(&tag, &mut request, None, None).map(|_| None);
        }
    };

    if let Some(err) = classify(Some(response.status().as_u16()), path) {
        let headers = response.headers().clone();
        return user
            .set_failure(&err.to_string(), &mut request, Some(&headers), None)
            .map(|_| None);
    }

    Ok(Some((response, request)))
}

async fn read_json<T: DeserializeOwned>(user: &mut GooseUser, goose: GooseResponse, path: &str) -> Outcome<T> {
    let Some((response, mut request)) = accept(user, goose, path)? else {
        return Ok(None);
    };

    let body = match response.bytes().await {
        Ok(body) => body,
        Err(e) => {
            let tag = format!("{}: 读取响应失败: {}", path, e);
            return user.set_failure(&tag, &mut request, None, None).map(|_| None);
        }
    };

    match serde_json::from_slice::<T>(&body) {
        Ok(value) => Ok(Some(value)),
        Err(e) => {
            let tag = format!("{}: 无法解析响应: {}", path, e);
            user.set_failure(&tag, &mut request, None, None).map(|_| None)
        }
    }
}

async fn send(user: &mut GooseUser, method: GooseMethod, path: &str, name: &str) -> Result<GooseResponse, Box<TransactionError>> {
    let request_builder = user
        .get_request_builder(&method, path)?
        .header(header::ACCEPT, "application/json");

    let goose_request = GooseRequest::builder()
        .set_request_builder(request_builder)
        .name(name)
        .build();

    user.request(goose_request).await
}

/// GET 一个JSON资源
pub(super) async fn get_json<T: DeserializeOwned>(user: &mut GooseUser, path: &str, name: &str) -> Outcome<T> {
    let goose = send(user, GooseMethod::Get, path, name).await?;
    read_json(user, goose, path).await
}

/// GET 原始内容，只记录大小
pub(super) async fn get_bytes(user: &mut GooseUser, path: &str, name: &str) -> Outcome<usize> {
    let request_builder = user.get_request_builder(&GooseMethod::Get, path)?;
    let goose_request = GooseRequest::builder()
        .set_request_builder(request_builder)
        .name(name)
        .build();

    let goose = user.request(goose_request).await?;
    let Some((response, mut request)) = accept(user, goose, path)? else {
        return Ok(None);
    };

    match response.bytes().await {
        Ok(body) => Ok(Some(body.len())),
        Err(e) => {
            let tag = format!("{}: 读取响应失败: {}", path, e);
            user.set_failure(&tag, &mut request, None, None).map(|_| None)
        }
    }
}

/// POST JSON请求体
pub(super) async fn post_json<B, T>(user: &mut GooseUser, path: &str, name: &str, body: &B) -> Outcome<T>
where
    B: Serialize,
    T: DeserializeOwned,
{
    let request_builder = user.get_request_builder(&GooseMethod::Post, path)?.json(body);
    let goose_request = GooseRequest::builder()
        .set_request_builder(request_builder)
        .name(name)
        .build();

    let goose = user.request(goose_request).await?;
    read_json(user, goose, path).await
}

/// DELETE 一个资源，成功时返回 `Some(())`
pub(super) async fn delete(user: &mut GooseUser, path: &str, name: &str) -> Outcome<()> {
    let goose = send(user, GooseMethod::Delete, path, name).await?;
    Ok(accept(user, goose, path)?.map(|_| ()))
}

/// 上传一个DICOM文件，按重试策略处理可重试的失败
///
/// 放弃时本次请求标记为失败。
pub(super) async fn upload_dicom(user: &mut GooseUser, dicom: &[u8], retry: &RetryPolicy) -> Outcome<UploadResponse> {
    let path = endpoints::INSTANCES;
    let mut attempt = 1;

    loop {
        let request_builder = user
            .get_request_builder(&GooseMethod::Post, path)?
            .header(header::CONTENT_TYPE, DICOM_CONTENT_TYPE)
            .body(dicom.to_vec());

        let goose_request = GooseRequest::builder()
            .set_request_builder(request_builder)
            .name(path)
            .build();

        let mut goose = user.request(goose_request).await?;
        let status = goose.response.as_ref().ok().map(|r| r.status().as_u16());

        let err = match classify(status, path) {
            None => return read_json(user, goose, path).await,
            Some(err) => err,
        };

        match retry.next_step(attempt, err) {
            RetryStep::Retry(err) => {
                debug!("上传第 {}/{} 次失败: {}，{:?} 后重试", attempt, retry.attempts(), err, retry.delay());
                tokio::time::sleep(retry.delay()).await;
                attempt += 1;
            }
            RetryStep::GiveUp(err) => {
                warn!("上传失败: {}", err);
                return user
                    .set_failure(&err.to_string(), &mut goose.request, None, None)
                    .map(|_| None);
            }
        }
    }
}
