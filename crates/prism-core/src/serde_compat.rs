//! JSON wire format for session exports and channel payloads.
//!
//! Producers send either a single object or an array. Constraints inside an
//! export may leave out `channel`, since the export's `sessionName` is the
//! authority; missing `metrics` are recomputed from the constraints.

use serde::{Deserialize, Serialize};

use crate::channel::ChannelData;
use crate::constraint::{SessionDataExport, SessionMetrics, Wavelength};
use crate::correlation::CorrelationResult;
use crate::manifold::ManifoldDataset;

pub const CURRENT_VERSION: &str = "1.0.0";

#[derive(Serialize, Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct WireExport {
    pub session_id: String,
    pub session_name: Wavelength,
    #[serde(default)]
    pub timestamp: u64,
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub constraints: Vec<serde_json::Value>,
    #[serde(default)]
    pub metrics: Option<SessionMetrics>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum OneOrMany<T> {
    Many(Vec<T>),
    One(T),
}

impl<T> OneOrMany<T> {
    fn into_vec(self) -> Vec<T> {
        match self {
            Self::Many(v) => v,
            Self::One(t) => vec![t],
        }
    }
}

impl WireExport {
    pub fn into_export(self) -> Result<SessionDataExport, serde_json::Error> {
        let channel = serde_json::Value::String(self.session_name.as_str().to_string());
        let constraints = self
            .constraints
            .into_iter()
            .map(|mut value| {
                if let Some(obj) = value.as_object_mut() {
                    obj.entry("channel").or_insert_with(|| channel.clone());
                }
                serde_json::from_value(value)
            })
            .collect::<Result<Vec<_>, _>>()?;

        let metrics = self
            .metrics
            .unwrap_or_else(|| SessionMetrics::from_constraints(&constraints));
        let version = if self.version.is_empty() {
            CURRENT_VERSION.to_string()
        } else {
            self.version
        };

        Ok(SessionDataExport {
            session_id: self.session_id,
            session_name: self.session_name,
            timestamp: self.timestamp,
            version,
            constraints,
            metrics,
        })
    }
}

/// Parse one export or an array of exports.
pub fn import_sessions_json(json: &str) -> Result<Vec<SessionDataExport>, serde_json::Error> {
    let batch: OneOrMany<WireExport> = serde_json::from_str(json)?;
    batch
        .into_vec()
        .into_iter()
        .map(WireExport::into_export)
        .collect()
}

pub fn export_sessions_json(exports: &[SessionDataExport]) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(exports)
}

/// Parse one tagged channel payload or an array of them.
pub fn import_channel_json(json: &str) -> Result<Vec<ChannelData>, serde_json::Error> {
    let batch: OneOrMany<ChannelData> = serde_json::from_str(json)?;
    Ok(batch.into_vec())
}

pub fn export_dataset_json(dataset: &ManifoldDataset) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(dataset)
}

pub fn export_correlations_json(results: &[CorrelationResult]) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(results)
}
