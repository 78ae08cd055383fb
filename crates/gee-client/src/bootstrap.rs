//! Start-up sequence and UI event wiring.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use futures::future::BoxFuture;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::client::{DefaultTransport, GeeClient};
use crate::error::Severity;
use crate::orchestrator::Orchestrator;
use crate::transport::Transport;

/// Events raised by the page.
#[derive(Debug, Clone, PartialEq)]
pub enum UiEvent {
    RefreshProvinces,
    ProvinceChanged(String),
    CityChanged(String),
    LoadRegionClicked,
    AreaDrawn { geojson: Value, name: Option<String> },
    RunAnalysisClicked,
    VegetationClicked,
    LandcoverClicked,
    TimeSeriesClicked(Value),
    ExportClicked(Value),
    DownloadClicked,
    ClearClicked,
}

/// Key under which a handler is bound.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    RefreshProvinces,
    ProvinceChanged,
    CityChanged,
    LoadRegionClicked,
    AreaDrawn,
    RunAnalysisClicked,
    VegetationClicked,
    LandcoverClicked,
    TimeSeriesClicked,
    ExportClicked,
    DownloadClicked,
    ClearClicked,
}

impl EventKind {
    pub const ALL: [EventKind; 12] = [
        EventKind::RefreshProvinces,
        EventKind::ProvinceChanged,
        EventKind::CityChanged,
        EventKind::LoadRegionClicked,
        EventKind::AreaDrawn,
        EventKind::RunAnalysisClicked,
        EventKind::VegetationClicked,
        EventKind::LandcoverClicked,
        EventKind::TimeSeriesClicked,
        EventKind::ExportClicked,
        EventKind::DownloadClicked,
        EventKind::ClearClicked,
    ];
}

impl UiEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            UiEvent::RefreshProvinces => EventKind::RefreshProvinces,
            UiEvent::ProvinceChanged(_) => EventKind::ProvinceChanged,
            UiEvent::CityChanged(_) => EventKind::CityChanged,
            UiEvent::LoadRegionClicked => EventKind::LoadRegionClicked,
            UiEvent::AreaDrawn { .. } => EventKind::AreaDrawn,
            UiEvent::RunAnalysisClicked => EventKind::RunAnalysisClicked,
            UiEvent::VegetationClicked => EventKind::VegetationClicked,
            UiEvent::LandcoverClicked => EventKind::LandcoverClicked,
            UiEvent::TimeSeriesClicked(_) => EventKind::TimeSeriesClicked,
            UiEvent::ExportClicked(_) => EventKind::ExportClicked,
            UiEvent::DownloadClicked => EventKind::DownloadClicked,
            UiEvent::ClearClicked => EventKind::ClearClicked,
        }
    }
}

pub type Handler = Arc<dyn Fn(UiEvent) -> BoxFuture<'static, ()> + Send + Sync>;

/// At most one handler per event kind.
#[derive(Clone, Default)]
pub struct EventBindings {
    handlers: HashMap<EventKind, Handler>,
}

impl EventBindings {
    /// Bind `handler` to `kind`, detaching any handler bound before.
    ///
    /// Returns `true` when a previous handler was replaced.
    pub fn bind<F>(&mut self, kind: EventKind, handler: F) -> bool
    where
        F: Fn(UiEvent) -> BoxFuture<'static, ()> + Send + Sync + 'static,
    {
        let replaced = self.unbind(kind);
        self.handlers.insert(kind, Arc::new(handler));
        replaced
    }

    pub fn unbind(&mut self, kind: EventKind) -> bool {
        let removed = self.handlers.remove(&kind).is_some();
        if removed {
            debug!(event = ?kind, "Detached previous handler");
        }
        removed
    }

    pub fn is_bound(&self, kind: EventKind) -> bool {
        self.handlers.contains_key(&kind)
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    /// Run the handler bound to the event's kind. Returns `false` if none is bound.
    pub async fn dispatch(&self, event: UiEvent) -> bool {
        let Some(handler) = self.handlers.get(&event.kind()).cloned() else {
            debug!(event = ?event.kind(), "No handler bound");
            return false;
        };
        handler(event).await;
        true
    }
}

/// A bootstrapped session: the orchestrator plus its event bindings.
///
/// This is the surface other front-end code talks to.
pub struct App<T = DefaultTransport> {
    orchestrator: Arc<Orchestrator<T>>,
    bindings: EventBindings,
    backend_ready: bool,
}

impl<T: Transport + 'static> App<T> {
    /// Check backend health, load provinces and bind the default handlers.
    ///
    /// An unhealthy backend is reported but does not stop start-up.
    pub async fn bootstrap(orchestrator: Arc<Orchestrator<T>>) -> Self {
        let backend_ready = match orchestrator.check_health().await {
            Some(status) if status.is_ready() => {
                orchestrator.ui().alert(
                    Severity::Success,
                    "Connected to the analysis backend. Earth Engine is ready.",
                );
                true
            }
            Some(status) => {
                warn!(status = %status.status, "Earth Engine not initialized");
                orchestrator.ui().alert(
                    Severity::Warning,
                    "Backend reachable but Earth Engine is not initialized. Analyses may fail.",
                );
                false
            }
            None => {
                orchestrator.ui().alert(
                    Severity::Warning,
                    "Cannot reach the analysis backend. Running in degraded mode.",
                );
                false
            }
        };

        orchestrator.load_provinces().await;

        let mut app = Self {
            orchestrator,
            bindings: EventBindings::default(),
            backend_ready,
        };
        app.bind_default_handlers();
        info!(backend_ready = backend_ready, handlers = app.bindings.len(), "Application ready");
        app
    }

    pub fn orchestrator(&self) -> &Arc<Orchestrator<T>> {
        &self.orchestrator
    }

    pub fn client(&self) -> &GeeClient<T> {
        self.orchestrator.client()
    }

    pub fn is_backend_ready(&self) -> bool {
        self.backend_ready
    }

    pub fn bindings(&self) -> &EventBindings {
        &self.bindings
    }

    pub fn bindings_mut(&mut self) -> &mut EventBindings {
        &mut self.bindings
    }

    pub async fn dispatch(&self, event: UiEvent) -> bool {
        self.bindings.dispatch(event).await
    }

    fn on<F, Fut>(&mut self, kind: EventKind, f: F)
    where
        F: Fn(Arc<Orchestrator<T>>, UiEvent) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let orchestrator = Arc::clone(&self.orchestrator);
        self.bindings.bind(kind, move |event| {
            let fut: BoxFuture<'static, ()> = Box::pin(f(Arc::clone(&orchestrator), event));
            fut
        });
    }

    /// Bind every event to its orchestration function. Safe to call again.
    pub fn bind_default_handlers(&mut self) {
        self.on(EventKind::RefreshProvinces, |o, _| async move {
            o.load_provinces().await;
        });
        self.on(EventKind::ProvinceChanged, |o, event| async move {
            if let UiEvent::ProvinceChanged(name) = event {
                o.select_province(&name).await;
            }
        });
        self.on(EventKind::CityChanged, |o, event| async move {
            if let UiEvent::CityChanged(name) = event {
                o.select_city(&name).await;
            }
        });
        self.on(EventKind::LoadRegionClicked, |o, _| async move {
            o.load_selected_region().await;
        });
        self.on(EventKind::AreaDrawn, |o, event| async move {
            if let UiEvent::AreaDrawn { geojson, name } = event {
                o.set_drawn_area(geojson, name.as_deref()).await;
            }
        });
        self.on(EventKind::RunAnalysisClicked, |o, _| async move {
            o.run_complete_analysis().await;
        });
        self.on(EventKind::VegetationClicked, |o, _| async move {
            o.run_vegetation().await;
        });
        self.on(EventKind::LandcoverClicked, |o, _| async move {
            o.run_landcover().await;
        });
        self.on(EventKind::TimeSeriesClicked, |o, event| async move {
            if let UiEvent::TimeSeriesClicked(params) = event {
                o.run_timeseries(params).await;
            }
        });
        self.on(EventKind::ExportClicked, |o, event| async move {
            if let UiEvent::ExportClicked(params) = event {
                o.request_export(params).await;
            }
        });
        self.on(EventKind::DownloadClicked, |o, _| async move {
            o.download_statistics().await;
        });
        self.on(EventKind::ClearClicked, |o, _| async move {
            o.clear_map().await;
        });
    }
}
