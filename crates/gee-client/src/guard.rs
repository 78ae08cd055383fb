//! Per-operation re-entrancy guard.
//!
//! At most one invocation of each [`OperationKind`] is outstanding at a
//! time. A second invocation is rejected rather than queued.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard};

/// User-triggerable operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperationKind {
    HealthCheck,
    LoadProvinces,
    LoadCities,
    LoadRegion,
    Vegetation,
    Landcover,
    CompleteAnalysis,
    TimeSeries,
    Export,
    Download,
}

impl OperationKind {
    pub fn label(&self) -> &'static str {
        match self {
            OperationKind::HealthCheck => "Health check",
            OperationKind::LoadProvinces => "Province loading",
            OperationKind::LoadCities => "City loading",
            OperationKind::LoadRegion => "Region loading",
            OperationKind::Vegetation => "Vegetation analysis",
            OperationKind::Landcover => "Land cover analysis",
            OperationKind::CompleteAnalysis => "Complete analysis",
            OperationKind::TimeSeries => "Time series analysis",
            OperationKind::Export => "Export",
            OperationKind::Download => "Download",
        }
    }
}

/// Tracks which operations are in flight.
#[derive(Debug, Clone, Default)]
pub struct OperationGuard {
    active: Arc<Mutex<HashSet<OperationKind>>>,
}

impl OperationGuard {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashSet<OperationKind>> {
        // The set stays consistent even if a holder panicked
        self.active.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Claim `kind`. Returns `None` while another claim on it is alive.
    pub fn try_begin(&self, kind: OperationKind) -> Option<OperationTicket> {
        if self.lock().insert(kind) {
            Some(OperationTicket {
                kind,
                active: Arc::clone(&self.active),
            })
        } else {
            None
        }
    }

    pub fn is_active(&self, kind: OperationKind) -> bool {
        self.lock().contains(&kind)
    }
}

/// Releases its operation kind when dropped.
#[derive(Debug)]
pub struct OperationTicket {
    kind: OperationKind,
    active: Arc<Mutex<HashSet<OperationKind>>>,
}

impl OperationTicket {
    pub fn kind(&self) -> OperationKind {
        self.kind
    }
}

impl Drop for OperationTicket {
    fn drop(&mut self) {
        let mut active = self.active.lock().unwrap_or_else(|e| e.into_inner());
        active.remove(&self.kind);
    }
}
