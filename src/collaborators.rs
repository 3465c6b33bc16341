//! Boundaries to the services the scan page hands results to: the disease
//! encyclopedia and the geotagged report store.
//!
//! Hosts plug in their own backends; the in-memory versions serve tests and
//! offline embedding.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::pipeline::types::{Label, SourceModel};

// ═══════════════════════════════════════════════════════════
// Disease catalog
// ═══════════════════════════════════════════════════════════

/// Encyclopedia entry for one label.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiseaseInfo {
    /// Label id this entry describes (`brown_spot`).
    pub id: String,
    pub name: String,
    pub description: String,
    pub cause: String,
    #[serde(default)]
    pub remediation: Vec<String>,
}

#[async_trait]
pub trait DiseaseCatalog: Send + Sync {
    async fn lookup(&self, label: &Label) -> Option<DiseaseInfo>;
}

#[derive(Debug, Default)]
pub struct InMemoryDiseaseCatalog {
    entries: HashMap<String, DiseaseInfo>,
}

impl InMemoryDiseaseCatalog {
    pub fn from_entries(entries: impl IntoIterator<Item = DiseaseInfo>) -> Self {
        Self {
            entries: entries.into_iter().map(|e| (e.id.clone(), e)).collect(),
        }
    }

    /// Parse a JSON array of entries.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        let entries: Vec<DiseaseInfo> = serde_json::from_str(json)?;
        Ok(Self::from_entries(entries))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[async_trait]
impl DiseaseCatalog for InMemoryDiseaseCatalog {
    async fn lookup(&self, label: &Label) -> Option<DiseaseInfo> {
        self.entries.get(label.as_str()).cloned()
    }
}

// ═══════════════════════════════════════════════════════════
// Reports
// ═══════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lng: f64,
}

impl GeoPoint {
    pub fn is_valid(&self) -> bool {
        (-90.0..=90.0).contains(&self.lat) && (-180.0..=180.0).contains(&self.lng)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ReportId(pub Uuid);

impl std::fmt::Display for ReportId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A diagnosis submitted by a farmer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanReport {
    pub user_id: String,
    pub label: Label,
    pub confidence: f32,
    pub source_model: SourceModel,
    /// Where the still lives (`capture://<uuid>` until the host uploads it).
    pub image_ref: String,
    pub location: Option<GeoPoint>,
    pub created_at: DateTime<Utc>,
}

#[derive(Error, Debug)]
pub enum ReportError {
    #[error("Report rejected: {0}")]
    Rejected(String),

    #[error("Invalid location ({lat}, {lng})")]
    InvalidLocation { lat: f64, lng: f64 },

    #[error("Report storage failed: {0}")]
    Storage(String),
}

#[async_trait]
pub trait ReportSink: Send + Sync {
    async fn save(&self, report: ScanReport) -> Result<ReportId, ReportError>;
}

#[derive(Debug, Default)]
pub struct InMemoryReportStore {
    reports: Mutex<Vec<(ReportId, ScanReport)>>,
}

impl InMemoryReportStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: ReportId) -> Option<ScanReport> {
        self.lock()
            .iter()
            .find(|(rid, _)| *rid == id)
            .map(|(_, r)| r.clone())
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<(ReportId, ScanReport)>> {
        match self.reports.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

#[async_trait]
impl ReportSink for InMemoryReportStore {
    async fn save(&self, report: ScanReport) -> Result<ReportId, ReportError> {
        if report.user_id.trim().is_empty() {
            return Err(ReportError::Rejected("missing user id".into()));
        }
        if let Some(point) = report.location {
            if !point.is_valid() {
                return Err(ReportError::InvalidLocation {
                    lat: point.lat,
                    lng: point.lng,
                });
            }
        }

        let id = ReportId(Uuid::new_v4());
        tracing::info!(
            %id,
            label = %report.label,
            source_model = %report.source_model,
            geotagged = report.location.is_some(),
            "Scan report saved"
        );
        self.lock().push((id, report));
        Ok(id)
    }
}
