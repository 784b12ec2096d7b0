//! Session exports in, decorated 3D points out.
//!
//! `normalize` → `merge` → `project` → `build_dataset`. Every call rebuilds
//! its output from scratch; nothing here holds state between calls.

use std::collections::{BTreeMap, HashMap};

use rand::SeedableRng;
use rand::rngs::SmallRng;
use serde::{Deserialize, Serialize};

use crate::config::{ProjectionConfig, ProjectionMethod};
use crate::constants::{EPSILON, WORLD_SCALE};
use crate::constraint::{ConstraintDataPoint, ConstraintType, SessionDataExport, Wavelength};
use crate::projection::{CancelToken, Projection, pad_rows, run_projection};
use crate::visual::{ConstraintStatus, VisualAttributes};

/// A constraint observation placed in world space.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManifoldPoint {
    pub id: String,
    pub constraint_id: String,
    pub channel: Wavelength,
    #[serde(rename = "type")]
    pub constraint_type: ConstraintType,
    pub position: [f64; 3],
    pub projection_confidence: f64,
    pub visual: VisualAttributes,
    pub status: ConstraintStatus,
    pub severity: f64,
    pub label: String,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DatasetStatistics {
    pub total_unique_constraints: usize,
    pub session_count: usize,
    pub by_type: BTreeMap<ConstraintType, usize>,
    pub by_channel: BTreeMap<Wavelength, usize>,
    pub average_severity: f64,
    pub overall_health: f64,
    pub projection_confidence: f64,
    pub explained_variance: Vec<f64>,
    pub method: ProjectionMethod,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManifoldDataset {
    pub points: Vec<ManifoldPoint>,
    pub statistics: DatasetStatistics,
}

/// Copy an export's constraints, stamping channel and timestamp from the export.
pub fn normalize(export: &SessionDataExport) -> Vec<ConstraintDataPoint> {
    export
        .constraints
        .iter()
        .map(|c| ConstraintDataPoint {
            channel: export.session_name,
            timestamp: export.timestamp,
            ..c.clone()
        })
        .collect()
}

/// Normalize every export and keep one point per `(id, channel)`.
///
/// The last occurrence wins, but the point keeps the position in the output
/// where its key was first seen.
pub fn merge(exports: &[SessionDataExport]) -> Vec<ConstraintDataPoint> {
    let mut merged: Vec<ConstraintDataPoint> = Vec::new();
    let mut index: HashMap<(String, Wavelength), usize> = HashMap::new();

    for export in exports {
        for point in normalize(export) {
            let key = (point.id.clone(), point.channel);
            match index.get(&key) {
                Some(&slot) => merged[slot] = point,
                None => {
                    index.insert(key, merged.len());
                    merged.push(point);
                }
            }
        }
    }

    merged
}

/// Min–max normalize each axis to [-1, 1], then scale to world units.
/// A degenerate axis (no spread) maps to 0.
fn to_world(coords: &[[f64; 3]]) -> Vec<[f64; 3]> {
    let mut lo = [f64::INFINITY; 3];
    let mut hi = [f64::NEG_INFINITY; 3];
    for c in coords {
        for a in 0..3 {
            lo[a] = lo[a].min(c[a]);
            hi[a] = hi[a].max(c[a]);
        }
    }
    coords
        .iter()
        .map(|c| {
            let mut w = [0.0; 3];
            for a in 0..3 {
                let range = hi[a] - lo[a];
                if range > EPSILON && c[a].is_finite() {
                    let unit = (c[a] - lo[a]) / range * 2.0 - 1.0;
                    w[a] = unit.clamp(-1.0, 1.0) * WORLD_SCALE;
                }
            }
            w
        })
        .collect()
}

fn decorate(points: &[ConstraintDataPoint], world: &[[f64; 3]], confidence: f64) -> Vec<ManifoldPoint> {
    points
        .iter()
        .zip(world)
        .map(|(p, pos)| ManifoldPoint {
            id: format!("{}:{}", p.channel, p.id),
            constraint_id: p.id.clone(),
            channel: p.channel,
            constraint_type: p.constraint_type,
            position: *pos,
            projection_confidence: confidence,
            visual: VisualAttributes::derive(p.constraint_type, p.channel, p.severity),
            status: ConstraintStatus::derive(p.severity, p.weight),
            severity: p.severity,
            label: p.label.clone(),
        })
        .collect()
}

fn project_inner(
    points: &[ConstraintDataPoint],
    config: &ProjectionConfig,
    cancel: &CancelToken,
) -> (Vec<ManifoldPoint>, Projection) {
    if points.is_empty() {
        return (Vec::new(), Projection::default());
    }

    let rows: Vec<&[f64]> = points.iter().map(|p| p.dimensions.as_slice()).collect();
    let matrix = pad_rows(&rows);
    let mut rng = SmallRng::seed_from_u64(config.seed);
    let projection = run_projection(&matrix, config, &mut rng, cancel);
    let confidence = projection.confidence.clamp(0.0, 1.0);
    let world = to_world(&projection.coords);

    tracing::debug!(
        points = points.len(),
        width = matrix.first().map_or(0, Vec::len),
        method = %config.method,
        confidence,
        "projected constraint batch"
    );

    (decorate(points, &world, confidence), projection)
}

/// Project points into world space with the configured strategy.
pub fn project(points: &[ConstraintDataPoint], config: &ProjectionConfig) -> Vec<ManifoldPoint> {
    project_with_cancel(points, config, &CancelToken::new())
}

/// [`project`] with a cancellation token for the iterative strategies.
pub fn project_with_cancel(
    points: &[ConstraintDataPoint],
    config: &ProjectionConfig,
    cancel: &CancelToken,
) -> Vec<ManifoldPoint> {
    project_inner(points, config, cancel).0
}

/// Merge, project and summarize a set of session exports.
pub fn build_dataset(exports: &[SessionDataExport], config: &ProjectionConfig) -> ManifoldDataset {
    build_dataset_with_cancel(exports, config, &CancelToken::new())
}

pub fn build_dataset_with_cancel(
    exports: &[SessionDataExport],
    config: &ProjectionConfig,
    cancel: &CancelToken,
) -> ManifoldDataset {
    let merged = merge(exports);
    let (points, projection) = project_inner(&merged, config, cancel);

    let mut by_type: BTreeMap<ConstraintType, usize> = BTreeMap::new();
    let mut by_channel: BTreeMap<Wavelength, usize> = BTreeMap::new();
    for p in &merged {
        *by_type.entry(p.constraint_type).or_default() += 1;
        *by_channel.entry(p.channel).or_default() += 1;
    }

    let average_severity = if merged.is_empty() {
        0.0
    } else {
        merged.iter().map(|p| p.severity).sum::<f64>() / merged.len() as f64
    };

    let statistics = DatasetStatistics {
        total_unique_constraints: merged.len(),
        session_count: exports.len(),
        by_type,
        by_channel,
        average_severity,
        overall_health: (1.0 - average_severity).clamp(0.0, 1.0),
        projection_confidence: projection.confidence.clamp(0.0, 1.0),
        explained_variance: projection.explained_variance,
        method: config.method,
    };

    ManifoldDataset { points, statistics }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn point(id: &str, channel: Wavelength, dims: Vec<f64>) -> ConstraintDataPoint {
        ConstraintDataPoint::new(id, channel, dims)
    }

    fn export(channel: Wavelength, ts: u64, points: Vec<ConstraintDataPoint>) -> SessionDataExport {
        SessionDataExport::new(format!("{channel}-{ts}"), channel, ts, points)
    }

    #[test]
    fn test_normalize_stamps_channel_and_time() {
        // the constraint claims quantum, but the export is the authority
        let e = export(
            Wavelength::Spectral,
            1234,
            vec![point("a", Wavelength::Quantum, vec![1.0])],
        );
        let out = normalize(&e);
        assert_eq!(out[0].channel, Wavelength::Spectral);
        assert_eq!(out[0].timestamp, 1234);
    }

    #[test]
    fn test_merge_empty() {
        assert!(merge(&[]).is_empty());
    }

    #[test]
    fn test_merge_last_wins_keeps_first_position() {
        let first = export(
            Wavelength::Phase,
            1,
            vec![
                point("a", Wavelength::Phase, vec![1.0]).with_severity(0.1),
                point("b", Wavelength::Phase, vec![2.0]),
            ],
        );
        let second = export(
            Wavelength::Phase,
            2,
            vec![point("a", Wavelength::Phase, vec![3.0]).with_severity(0.9)],
        );
        let merged = merge(&[first, second]);
        assert_eq!(merged.len(), 2);
        assert_eq!(merged[0].id, "a");
        assert_eq!(merged[0].severity, 0.9);
        assert_eq!(merged[0].timestamp, 2);
        assert_eq!(merged[1].id, "b");
    }

    #[test]
    fn test_merge_same_id_different_channels() {
        let a = export(Wavelength::Phase, 1, vec![point("x", Wavelength::Phase, vec![1.0])]);
        let b = export(Wavelength::Spectral, 1, vec![point("x", Wavelength::Spectral, vec![1.0])]);
        assert_eq!(merge(&[a, b]).len(), 2);
    }

    #[test]
    fn test_duplicates_within_one_session() {
        let e = export(
            Wavelength::Temporal,
            5,
            vec![
                point("dup", Wavelength::Temporal, vec![1.0]),
                point("dup", Wavelength::Temporal, vec![2.0]),
                point("dup", Wavelength::Temporal, vec![3.0]),
            ],
        );
        let merged = merge(&[e]);
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].dimensions, vec![3.0]);
    }

    #[test]
    fn test_project_empty() {
        assert!(project(&[], &ProjectionConfig::default()).is_empty());
    }

    #[test]
    fn test_project_heterogeneous_lengths() {
        let points = vec![
            point("a", Wavelength::Quantum, vec![1.0, 0.0]),
            point("b", Wavelength::Quantum, vec![0.0, 1.0, 4.0, 2.0]),
            point("c", Wavelength::Quantum, vec![3.0]),
        ];
        let out = project(&points, &ProjectionConfig::default());
        assert_eq!(out.len(), 3);
        for p in &out {
            assert!(p.position.iter().all(|v| (-WORLD_SCALE..=WORLD_SCALE).contains(v)));
        }
    }

    #[test]
    fn test_world_scaling_hits_extremes() {
        let world = to_world(&[[0.0, 5.0, 1.0], [10.0, 5.0, 3.0], [5.0, 5.0, 2.0]]);
        assert_eq!(world[0][0], -WORLD_SCALE);
        assert_eq!(world[1][0], WORLD_SCALE);
        assert_eq!(world[2][0], 0.0);
        // constant axis collapses to the center
        assert!(world.iter().all(|w| w[1] == 0.0));
    }

    #[test]
    fn test_decoration_and_ids() {
        let points = vec![
            point("a", Wavelength::Thermodynamic, vec![1.0, 2.0])
                .with_type(ConstraintType::Fatigue)
                .with_severity(0.9)
                .with_weight(0.5)
                .with_label("late shift"),
            point("b", Wavelength::Thermodynamic, vec![2.0, 1.0]),
        ];
        let out = project(&points, &ProjectionConfig::default());
        assert_eq!(out[0].id, "thermodynamic:a");
        assert_eq!(out[0].constraint_id, "a");
        assert_eq!(out[0].label, "late shift");
        assert!(out[0].status.is_critical);
        assert!((out[0].status.tension - 0.45).abs() < 1e-12);
        assert!(out[1].status.is_satisfied);
    }

    #[test]
    fn test_build_dataset_statistics() {
        let a = export(
            Wavelength::Quantum,
            1,
            vec![
                point("a", Wavelength::Quantum, vec![1.0, 2.0, 3.0])
                    .with_type(ConstraintType::Skill)
                    .with_severity(0.4),
                point("b", Wavelength::Quantum, vec![2.0, 1.0, 0.0]).with_severity(0.2),
            ],
        );
        let b = export(
            Wavelength::Spectral,
            2,
            vec![point("c", Wavelength::Spectral, vec![0.0, 0.0, 1.0]).with_severity(0.6)],
        );
        let ds = build_dataset(&[a, b], &ProjectionConfig::default());
        let s = &ds.statistics;
        assert_eq!(ds.points.len(), 3);
        assert_eq!(s.total_unique_constraints, 3);
        assert_eq!(s.session_count, 2);
        assert_eq!(s.by_channel[&Wavelength::Quantum], 2);
        assert_eq!(s.by_type[&ConstraintType::Skill], 1);
        assert_eq!(s.by_type[&ConstraintType::Custom], 2);
        assert!((s.average_severity - 0.4).abs() < 1e-12);
        assert!((s.overall_health - 0.6).abs() < 1e-12);
        assert_eq!(s.method, ProjectionMethod::Pca);
    }

    #[test]
    fn test_build_dataset_empty() {
        let ds = build_dataset(&[], &ProjectionConfig::default());
        assert!(ds.points.is_empty());
        assert_eq!(ds.statistics.overall_health, 1.0);
    }

    #[test]
    fn test_dataset_json_shape() {
        let e = export(Wavelength::Phase, 1, vec![point("a", Wavelength::Phase, vec![1.0])]);
        let ds = build_dataset(&[e], &ProjectionConfig::default());
        let json = serde_json::to_value(&ds).unwrap();
        assert_eq!(json["statistics"]["byChannel"]["phase"], 1);
        assert_eq!(json["points"][0]["constraintId"], "a");
        assert!(json["points"][0]["visual"].get("glowIntensity").is_some());
    }
}
