//! 归档服务HTTP客户端

use crate::endpoints;
use crate::retry::RetryPolicy;
use pacs_core::{
    AnonymizeResponse, InstanceResource, PacsError, Result, SeriesResource, StudyResource,
    SystemInfo, UploadResponse,
};
use reqwest::{header, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::{debug, error, info};

/// 归档服务客户端
#[derive(Debug, Clone)]
pub struct ArchiveClient {
    base_url: String,
    client: reqwest::Client,
    retry: RetryPolicy,
}

fn network_error(e: reqwest::Error) -> PacsError {
    PacsError::Network(e.to_string())
}

impl ArchiveClient {
    /// 创建客户端
    pub fn new(base_url: impl Into<String>, timeout: Duration, retry: RetryPolicy) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent("PACS-LoadTest/1.0")
            .build()
            .map_err(network_error)?;

        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client,
            retry,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// 发送请求，非2xx状态转换为 `Rejected`
    async fn send(&self, request: RequestBuilder, path: &str) -> Result<Response> {
        let response = request.send().await.map_err(|e| {
            error!("请求归档服务失败 {}: {}", path, e);
            network_error(e)
        })?;

        let status = response.status();
        if status.is_success() {
            debug!("{} -> {}", path, status);
            Ok(response)
        } else {
            error!("归档服务拒绝请求 {}: {}", path, status);
            Err(PacsError::Rejected {
                status: status.as_u16(),
                path: path.to_string(),
            })
        }
    }

    async fn read_json<T: DeserializeOwned>(response: Response) -> Result<T> {
        let body = response.bytes().await.map_err(network_error)?;
        Ok(serde_json::from_slice(&body)?)
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let response = self.send(self.client.get(self.url(path)), path).await?;
        Self::read_json(response).await
    }

    /// 系统信息
    pub async fn system(&self) -> Result<SystemInfo> {
        self.get_json(endpoints::SYSTEM).await
    }

    /// 所有检查ID
    pub async fn list_studies(&self) -> Result<Vec<String>> {
        self.get_json(endpoints::STUDIES).await
    }

    pub async fn get_study(&self, id: &str) -> Result<StudyResource> {
        self.get_json(&endpoints::study(id)).await
    }

    pub async fn get_series(&self, id: &str) -> Result<SeriesResource> {
        self.get_json(&endpoints::series(id)).await
    }

    pub async fn get_instance(&self, id: &str) -> Result<InstanceResource> {
        self.get_json(&endpoints::instance(id)).await
    }

    /// 下载实例的原始DICOM文件
    pub async fn download_instance(&self, id: &str) -> Result<Vec<u8>> {
        let path = endpoints::instance_file(id);
        let response = self.send(self.client.get(self.url(&path)), &path).await?;
        let body = response.bytes().await.map_err(network_error)?;
        Ok(body.to_vec())
    }

    /// 上传一个DICOM实例（单次尝试）
    pub async fn upload_instance(&self, dicom: Vec<u8>) -> Result<UploadResponse> {
        let request = self
            .client
            .post(self.url(endpoints::INSTANCES))
            .header(header::CONTENT_TYPE, endpoints::DICOM_CONTENT_TYPE)
            .body(dicom);

        let response = self.send(request, endpoints::INSTANCES).await?;
        let uploaded: UploadResponse = Self::read_json(response).await?;
        debug!("实例上传成功: {} ({:?})", uploaded.id, uploaded.status);
        Ok(uploaded)
    }

    /// 按重试策略上传实例
    pub async fn upload_with_retry(&self, dicom: Vec<u8>) -> Result<UploadResponse> {
        let client = self;
        self.retry
            .execute("上传实例", move || client.upload_instance(dicom.clone()))
            .await
    }

    /// 匿名化检查
    pub async fn anonymize_study(&self, id: &str, asynchronous: bool) -> Result<AnonymizeResponse> {
        let path = endpoints::study_anonymize(id);
        let request = self
            .client
            .post(self.url(&path))
            .json(&endpoints::anonymize_request(asynchronous));

        let response = self.send(request, &path).await?;
        let anonymized: AnonymizeResponse = Self::read_json(response).await?;
        info!("检查匿名化已提交: {} -> {}", id, anonymized.id);
        Ok(anonymized)
    }

    /// 按患者姓名通配查询检查
    pub async fn find_studies(&self, patient_name_pattern: &str) -> Result<Vec<serde_json::Value>> {
        let request = self
            .client
            .post(self.url(endpoints::FIND))
            .json(&endpoints::find_studies_query(patient_name_pattern));

        let response = self.send(request, endpoints::FIND).await?;
        Self::read_json(response).await
    }

    pub async fn delete_study(&self, id: &str) -> Result<()> {
        let path = endpoints::study(id);
        self.send(self.client.delete(self.url(&path)), &path).await?;
        info!("检查已删除: {}", id);
        Ok(())
    }

    pub async fn delete_patient(&self, id: &str) -> Result<()> {
        let path = endpoints::patient(id);
        self.send(self.client.delete(self.url(&path)), &path).await?;
        info!("患者已删除: {}", id);
        Ok(())
    }
}
