//! Клиент management API сервера Outline.

use crate::config::ServerConfig;
use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Ошибка запроса к API сервера: {0}")]
    Transport(#[source] reqwest::Error),
    #[error("API сервера вернул {status}: {body}")]
    Status { status: StatusCode, body: String },
    #[error("Ключ {0} не найден на сервере")]
    NotFound(String),
    #[error("Ошибка настройки TLS: {0}")]
    Tls(String),
    #[error("Некорректный отпечаток сертификата: {0}")]
    InvalidFingerprint(String),
}

/// Сколько символов тела ответа попадает в текст ошибки.
const ERROR_BODY_LIMIT: usize = 200;

/// Тело ответа с ошибкой в одну строку: пробелы схлопнуты, длина ограничена.
fn summarize_body(body: &str) -> String {
    let flat = body.split_whitespace().collect::<Vec<_>>().join(" ");
    if flat.chars().count() <= ERROR_BODY_LIMIT {
        return flat;
    }
    let mut short: String = flat.chars().take(ERROR_BODY_LIMIT).collect();
    short.push('…');
    short
}

// URL management API содержит секретный путь, в текст ошибки он не попадает.
impl From<reqwest::Error> for ApiError {
    fn from(error: reqwest::Error) -> Self {
        ApiError::Transport(error.without_url())
    }
}

/// Ключ доступа в том виде, в каком с ним работают обработчики команд.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessKey {
    pub id: String,
    pub name: String,
    pub used_bytes: Option<u64>,
    pub limit_bytes: Option<u64>,
    pub access_url: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerInfo {
    pub name: String,
    pub server_id: String,
    pub version: Option<String>,
    pub created_timestamp_ms: Option<i64>,
    pub hostname_for_access_keys: Option<String>,
    pub port_for_new_access_keys: Option<u16>,
    pub default_limit_bytes: Option<u64>,
}

/// Операции над ключами одного сервера.
#[async_trait]
pub trait KeyApi: Send + Sync {
    async fn list_keys(&self) -> Result<Vec<AccessKey>, ApiError>;
    async fn create_key(&self, name: &str) -> Result<AccessKey, ApiError>;
    async fn delete_key(&self, key_id: &str) -> Result<(), ApiError>;
    async fn set_data_limit(&self, key_id: &str, bytes: u64) -> Result<(), ApiError>;
    async fn remove_data_limit(&self, key_id: &str) -> Result<(), ApiError>;
    async fn aggregate_usage(&self) -> Result<u64, ApiError>;
    async fn server_info(&self) -> Result<ServerInfo, ApiError>;
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawAccessKey {
    id: String,
    #[serde(default)]
    name: String,
    access_url: String,
    #[serde(default)]
    data_limit: Option<DataLimit>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawAccessKeys {
    access_keys: Vec<RawAccessKey>,
}

#[derive(Debug, Deserialize, Serialize)]
struct DataLimit {
    bytes: u64,
}

#[derive(Debug, Serialize)]
struct DataLimitRequest {
    limit: DataLimit,
}

#[derive(Debug, Serialize)]
struct RenameRequest<'a> {
    name: &'a str,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TransferMetrics {
    #[serde(default)]
    bytes_transferred_by_user_id: HashMap<String, u64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawServerInfo {
    #[serde(default)]
    name: String,
    #[serde(default)]
    server_id: String,
    #[serde(default)]
    version: Option<String>,
    #[serde(default)]
    created_timestamp_ms: Option<i64>,
    #[serde(default)]
    hostname_for_access_keys: Option<String>,
    #[serde(default)]
    port_for_new_access_keys: Option<u16>,
    #[serde(default)]
    access_key_data_limit: Option<DataLimit>,
}

impl RawAccessKey {
    fn into_access_key(self, used_bytes: Option<u64>) -> AccessKey {
        AccessKey {
            id: self.id,
            name: self.name,
            used_bytes,
            limit_bytes: self.data_limit.map(|limit| limit.bytes),
            access_url: self.access_url,
        }
    }
}

/// HTTP-клиент, привязанный к одному серверу Outline.
#[derive(Debug, Clone)]
pub struct OutlineClient {
    http: reqwest::Client,
    api_url: String,
}

impl OutlineClient {
    pub fn connect(server: &ServerConfig) -> Result<Self, ApiError> {
        let fingerprint = server
            .fingerprint()
            .map_err(|e| ApiError::InvalidFingerprint(e.to_string()))?;
        let tls = crate::tls::pinned_client_config(fingerprint)
            .map_err(|e| ApiError::Tls(e.to_string()))?;
        let http = reqwest::Client::builder()
            .use_preconfigured_tls(tls)
            .build()?;
        Ok(Self::with_http(http, &server.url))
    }

    fn with_http(http: reqwest::Client, api_url: &str) -> Self {
        Self {
            http,
            api_url: api_url.trim_end_matches('/').to_string(),
        }
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.api_url, path)
    }

    async fn execute(
        &self,
        request: reqwest::RequestBuilder,
        key_id: Option<&str>,
    ) -> Result<reqwest::Response, ApiError> {
        let response = request.send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        if status == StatusCode::NOT_FOUND
            && let Some(key_id) = key_id
        {
            return Err(ApiError::NotFound(key_id.to_string()));
        }
        let body = response.text().await.unwrap_or_default();
        tracing::warn!(
            status = %status,
            body_len = body.len(),
            body = %body,
            "Outline API returned error status"
        );
        Err(ApiError::Status {
            status,
            body: summarize_body(&body),
        })
    }

    async fn transfer_metrics(&self) -> Result<TransferMetrics, ApiError> {
        let request = self.http.get(self.endpoint("metrics/transfer"));
        let metrics = self
            .execute(request, None)
            .await?
            .json::<TransferMetrics>()
            .await?;
        Ok(metrics)
    }
}

#[async_trait]
impl KeyApi for OutlineClient {
    async fn list_keys(&self) -> Result<Vec<AccessKey>, ApiError> {
        let request = self.http.get(self.endpoint("access-keys"));
        let keys = self
            .execute(request, None)
            .await?
            .json::<RawAccessKeys>()
            .await?;
        let metrics = self.transfer_metrics().await?;
        Ok(keys
            .access_keys
            .into_iter()
            .map(|key| {
                let used = metrics.bytes_transferred_by_user_id.get(&key.id).copied();
                key.into_access_key(used)
            })
            .collect())
    }

    async fn create_key(&self, name: &str) -> Result<AccessKey, ApiError> {
        let request = self.http.post(self.endpoint("access-keys"));
        let created = self
            .execute(request, None)
            .await?
            .json::<RawAccessKey>()
            .await?;
        let request = self
            .http
            .put(self.endpoint(&format!("access-keys/{}/name", created.id)))
            .json(&RenameRequest { name });
        self.execute(request, Some(&created.id)).await?;
        tracing::info!(key_id = %created.id, "Access key created");

        let mut key = created.into_access_key(None);
        key.name = name.to_string();
        Ok(key)
    }

    async fn delete_key(&self, key_id: &str) -> Result<(), ApiError> {
        let request = self
            .http
            .delete(self.endpoint(&format!("access-keys/{}", key_id)));
        self.execute(request, Some(key_id)).await?;
        Ok(())
    }

    async fn set_data_limit(&self, key_id: &str, bytes: u64) -> Result<(), ApiError> {
        let request = self
            .http
            .put(self.endpoint(&format!("access-keys/{}/data-limit", key_id)))
            .json(&DataLimitRequest {
                limit: DataLimit { bytes },
            });
        self.execute(request, Some(key_id)).await?;
        tracing::info!(key_id = key_id, bytes = bytes, "Data limit applied");
        Ok(())
    }

    async fn remove_data_limit(&self, key_id: &str) -> Result<(), ApiError> {
        let request = self
            .http
            .delete(self.endpoint(&format!("access-keys/{}/data-limit", key_id)));
        self.execute(request, Some(key_id)).await?;
        tracing::info!(key_id = key_id, "Data limit removed");
        Ok(())
    }

    async fn aggregate_usage(&self) -> Result<u64, ApiError> {
        let metrics = self.transfer_metrics().await?;
        Ok(metrics.bytes_transferred_by_user_id.values().sum())
    }

    async fn server_info(&self) -> Result<ServerInfo, ApiError> {
        let request = self.http.get(self.endpoint("server"));
        let raw = self
            .execute(request, None)
            .await?
            .json::<RawServerInfo>()
            .await?;
        Ok(ServerInfo {
            name: raw.name,
            server_id: raw.server_id,
            version: raw.version,
            created_timestamp_ms: raw.created_timestamp_ms,
            hostname_for_access_keys: raw.hostname_for_access_keys,
            port_for_new_access_keys: raw.port_for_new_access_keys,
            default_limit_bytes: raw.access_key_data_limit.map(|limit| limit.bytes),
        })
    }
}
