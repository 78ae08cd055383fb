//! Typed endpoint methods, one per backend capability.

use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::config::ClientConfig;
use crate::error::{ApiResult, ClientError};
use crate::models::{
    HealthStatus, LandcoverRequest, LandcoverResponse, RegionLevel, VegetationRequest,
    VegetationResponse,
};
use crate::retry::RetryingTransport;
use crate::transport::{ApiRequest, HttpTransport, Transport};

/// Transport stack used in production: reqwest with retries.
pub type DefaultTransport = RetryingTransport<HttpTransport>;

/// Client for the GEE analysis backend.
pub struct GeeClient<T = DefaultTransport> {
    transport: T,
}

impl GeeClient<DefaultTransport> {
    /// Build the production client. Retries apply to every endpoint.
    pub fn from_config(config: &ClientConfig) -> ApiResult<Self> {
        let http = HttpTransport::new(config)?;
        Ok(Self::new(RetryingTransport::new(http, config.retry_policy())))
    }
}

impl<T: Transport> GeeClient<T> {
    pub fn new(transport: T) -> Self {
        Self { transport }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    async fn send_typed<R: DeserializeOwned>(&self, request: ApiRequest) -> ApiResult<R> {
        let value = self.transport.send(request).await?;
        serde_json::from_value(value).map_err(ClientError::from)
    }

    /// GET /health
    pub async fn health(&self) -> ApiResult<HealthStatus> {
        self.send_typed(ApiRequest::get("/health")).await
    }

    /// GET /regions/provinces
    pub async fn provinces(&self) -> ApiResult<Value> {
        self.transport.send(ApiRequest::get("/regions/provinces")).await
    }

    /// GET /regions/cities?province_code=X
    pub async fn cities(&self, province_code: &str) -> ApiResult<Value> {
        let request = ApiRequest::get("/regions/cities").with_query("province_code", province_code);
        self.transport.send(request).await
    }

    /// GET /regions/geometry?endpoint=E&code=C
    pub async fn geometry(&self, level: RegionLevel, code: &str) -> ApiResult<Value> {
        let request = ApiRequest::get("/regions/geometry")
            .with_query("endpoint", level.endpoint())
            .with_query("code", code);
        self.transport.send(request).await
    }

    /// POST /analyze/vegetation
    pub async fn analyze_vegetation(
        &self,
        request: &VegetationRequest,
    ) -> ApiResult<VegetationResponse> {
        let body = serde_json::to_value(request)?;
        self.send_typed(ApiRequest::post("/analyze/vegetation", body))
            .await
    }

    /// POST /analyze/landcover
    pub async fn analyze_landcover(
        &self,
        request: &LandcoverRequest,
    ) -> ApiResult<LandcoverResponse> {
        let body = serde_json::to_value(request)?;
        self.send_typed(ApiRequest::post("/analyze/landcover", body))
            .await
    }

    /// POST /timeseries with caller-supplied parameters
    pub async fn timeseries(&self, params: Value) -> ApiResult<Value> {
        self.transport.send(ApiRequest::post("/timeseries", params)).await
    }

    /// POST /export with caller-supplied parameters. Each call starts a
    /// backend task, so it is never resent after a timeout.
    pub async fn export(&self, params: Value) -> ApiResult<Value> {
        self.transport
            .send(ApiRequest::post("/export", params).non_idempotent())
            .await
    }
}
