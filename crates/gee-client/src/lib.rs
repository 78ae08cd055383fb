//! Client and UI orchestration for the GEE satellite-imagery analysis backend.
//!
//! Layers, leaves first:
//! - [`transport`]: one HTTP request with a uniform timeout, normalized errors
//! - [`retry`]: bounded retries with exponential backoff around any transport
//! - [`client`]: one typed method per backend capability
//! - [`orchestrator`]: loading feedback, sequencing and UI/map updates
//! - [`bootstrap`]: health check, initial data and event wiring
//!
//! Rendering is delegated to implementations of [`Ui`] and [`MapView`].

pub mod bootstrap;
pub mod client;
pub mod config;
pub mod error;
pub mod geometry;
pub mod guard;
pub mod models;
pub mod orchestrator;
pub mod retry;
pub mod session;
pub mod snapshot;
pub mod transport;
pub mod ui;

pub use bootstrap::{App, EventBindings, EventKind, UiEvent};
pub use client::{DefaultTransport, GeeClient};
pub use config::{ClientConfig, ConfigError, RetryConfig};
pub use error::{ApiResult, ClientError, Severity};
pub use geometry::Bounds;
pub use guard::{OperationGuard, OperationKind};
pub use models::{
    AnalysisParams, AnalysisResults, AnalysisType, AoiKind, AreaOfInterest, HealthStatus,
    LandcoverMode, LandcoverResponse, RegionLevel, RegionOption, SelectionList,
    VegetationResponse,
};
pub use orchestrator::Orchestrator;
pub use retry::{RetryPolicy, RetryingTransport};
pub use session::SessionState;
pub use snapshot::StatisticsSnapshot;
pub use transport::{ApiRequest, HttpTransport, Transport};
pub use ui::{MapView, Selector, Ui};
