use std::net::SocketAddr;

use reqwest::{Client, Url};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::{Value, json};
use tracing::debug;

use crate::{
    constants::DEFAULT_RPC_REQUEST_TIMEOUT,
    nodes::types::{SplitStorageInfo, StatusResponse},
};

const JSONRPC_VERSION: &str = "2.0";
const REQUEST_ID: &str = "dontcare";

const METHOD_STATUS: &str = "status";
const METHOD_SPLIT_STORAGE_INFO: &str = "EXPERIMENTAL_split_storage_info";

#[derive(Debug, thiserror::Error)]
pub enum ApiClientError {
    #[error("invalid RPC url '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },
    #[error(transparent)]
    Request(#[from] reqwest::Error),
    #[error("{method} returned an error: {error}")]
    Rpc { method: String, error: RpcErrorBody },
    #[error("{method} response carried neither result nor error")]
    EmptyResponse { method: String },
}

/// Error object of a JSON-RPC response.
#[derive(Clone, Debug, Deserialize)]
pub struct RpcErrorBody {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub code: Option<i64>,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub data: Option<Value>,
    #[serde(default)]
    pub cause: Option<Value>,
}

impl std::fmt::Display for RpcErrorBody {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match (&self.name, &self.cause) {
            (Some(name), Some(cause)) => write!(f, "{name}: {cause}"),
            (Some(name), None) => write!(f, "{name}: {}", self.message),
            _ => f.write_str(&self.message),
        }
    }
}

#[derive(Serialize)]
struct RpcRequest<'a, P: ?Sized> {
    jsonrpc: &'static str,
    id: &'static str,
    method: &'a str,
    params: &'a P,
}

#[derive(Deserialize)]
struct RpcResponse<R> {
    result: Option<R>,
    error: Option<RpcErrorBody>,
}

/// Thin async JSON-RPC client for one node.
#[derive(Clone)]
pub struct ApiClient {
    base_url: Url,
    client: Client,
}

impl ApiClient {
    /// Construct from the node's RPC socket address.
    pub fn new(addr: SocketAddr) -> Result<Self, ApiClientError> {
        let raw = format!("http://{addr}");
        let base_url = Url::parse(&raw).map_err(|err| ApiClientError::InvalidUrl {
            url: raw,
            reason: err.to_string(),
        })?;
        Self::from_url(base_url)
    }

    /// Construct from a prebuilt URL.
    pub fn from_url(base_url: Url) -> Result<Self, ApiClientError> {
        let client = Client::builder()
            .timeout(DEFAULT_RPC_REQUEST_TIMEOUT)
            .build()?;
        Ok(Self { base_url, client })
    }

    #[must_use]
    pub const fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Issue one JSON-RPC call and decode its `result`.
    pub async fn call<P, R>(&self, method: &str, params: &P) -> Result<R, ApiClientError>
    where
        P: Serialize + Sync + ?Sized,
        R: DeserializeOwned,
    {
        let request = RpcRequest {
            jsonrpc: JSONRPC_VERSION,
            id: REQUEST_ID,
            method,
            params,
        };

        debug!(url = %self.base_url, method, "sending rpc request");

        let response: RpcResponse<R> = self
            .client
            .post(self.base_url.clone())
            .json(&request)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        match response {
            RpcResponse {
                error: Some(error), ..
            } => Err(ApiClientError::Rpc {
                method: method.to_owned(),
                error,
            }),
            RpcResponse {
                result: Some(result),
                ..
            } => Ok(result),
            RpcResponse { .. } => Err(ApiClientError::EmptyResponse {
                method: method.to_owned(),
            }),
        }
    }

    /// Fetch node status, including the latest block height and hash.
    pub async fn status(&self) -> Result<StatusResponse, ApiClientError> {
        self.call(METHOD_STATUS, &json!([])).await
    }

    /// Fetch hot/cold store heads. Only meaningful on archival nodes with a
    /// cold store.
    pub async fn split_storage_info(&self) -> Result<SplitStorageInfo, ApiClientError> {
        self.call(METHOD_SPLIT_STORAGE_INFO, &json!({})).await
    }
}
