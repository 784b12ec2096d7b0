//! Full pairwise analysis of two extracted channel series.

use serde::{Deserialize, Serialize};

use crate::channel::TimeSeries;
use crate::config::{ChannelPair, CorrelationConfig};
use crate::constants::EPSILON;
use crate::metrics::{
    Regression, coherence_spectrum, cross_correlation, linear_regression, min_max,
    mutual_information, pearson, significance, spearman, transfer_entropy,
};
use crate::patterns::{CorrelationPattern, PatternDetector, Signal};

/// Density levels, as fractions of the peak cell count, traced by the contours.
const CONTOUR_LEVELS: [f64; 3] = [0.25, 0.5, 0.75];

#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct TransferEntropy {
    /// primary -> secondary, in bits.
    pub forward: f64,
    /// secondary -> primary, in bits.
    pub reverse: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ScatterPoint {
    pub x: f64,
    pub y: f64,
    pub entity: String,
}

/// Centers of the density-grid cells at or above `level`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DensityContour {
    pub level: f64,
    pub cells: Vec<[f64; 2]>,
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct CoherencePoint {
    pub frequency: f64,
    pub coherence: f64,
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct LagPoint {
    pub lag: isize,
    pub correlation: f64,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VisualizationData {
    /// Samples scaled into [0, 1]².
    pub scatter: Vec<ScatterPoint>,
    pub regression: Regression,
    pub density_contours: Vec<DensityContour>,
    /// `surface[i][j]` is the correlation of primary window `i` with secondary window `j`.
    pub correlation_surface: Vec<Vec<f64>>,
    pub coherence: Vec<CoherencePoint>,
    pub cross_correlation: Vec<LagPoint>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CorrelationResult {
    pub pair: ChannelPair,
    /// Pearson r.
    pub correlation: f64,
    pub rank_correlation: f64,
    /// Two-sided p-value of `correlation`.
    pub significance: f64,
    pub mutual_information: f64,
    pub transfer_entropy: TransferEntropy,
    pub patterns: Vec<CorrelationPattern>,
    pub visualization_data: VisualizationData,
    pub sample_count: usize,
}

fn unit_scale(x: &[f64]) -> Vec<f64> {
    match min_max(x) {
        Some((lo, hi)) if hi - lo > EPSILON => x.iter().map(|v| (v - lo) / (hi - lo)).collect(),
        _ => vec![0.5; x.len()],
    }
}

fn density_contours(scatter: &[ScatterPoint], resolution: usize) -> Vec<DensityContour> {
    if scatter.is_empty() || resolution == 0 {
        return Vec::new();
    }
    let cell = |v: f64| ((v * resolution as f64).floor() as usize).min(resolution - 1);
    let mut grid = vec![vec![0usize; resolution]; resolution];
    for p in scatter {
        grid[cell(p.x)][cell(p.y)] += 1;
    }
    let peak = grid.iter().flatten().copied().max().unwrap_or(0) as f64;
    let center = |i: usize| (i as f64 + 0.5) / resolution as f64;

    CONTOUR_LEVELS
        .iter()
        .map(|&level| {
            let cutoff = level * peak;
            let mut cells = Vec::new();
            for (i, row) in grid.iter().enumerate() {
                for (j, &count) in row.iter().enumerate() {
                    if count > 0 && count as f64 >= cutoff {
                        cells.push([center(i), center(j)]);
                    }
                }
            }
            DensityContour { level, cells }
        })
        .collect()
}

/// Window-by-window correlation grid. Windows shrink in count until each
/// holds at least two samples; fewer than four samples give an empty grid.
fn correlation_surface(x: &[f64], y: &[f64], resolution: usize) -> Vec<Vec<f64>> {
    let n = x.len().min(y.len());
    let windows = resolution.min(n / 2);
    if windows < 2 {
        return Vec::new();
    }
    let width = n / windows;
    let slice = |s: &[f64], k: usize| -> Vec<f64> { s[k * width..(k + 1) * width].to_vec() };
    (0..windows)
        .map(|i| {
            let xi = slice(x, i);
            (0..windows).map(|j| pearson(&xi, &slice(y, j))).collect()
        })
        .collect()
}

/// Every metric, pattern and chart payload for one ordered pair.
///
/// Both series are cut to the shorter length first.
pub fn compute_correlation(
    pair: ChannelPair,
    primary: &TimeSeries,
    secondary: &TimeSeries,
    config: &CorrelationConfig,
) -> CorrelationResult {
    let n = primary.len().min(secondary.len());
    let mut p = primary.clone();
    let mut s = secondary.clone();
    p.truncate(n);
    s.truncate(n);
    let (x, y) = (p.values.as_slice(), s.values.as_slice());

    let correlation = pearson(x, y);
    let lag = config.transfer_entropy_lag;
    let te = TransferEntropy {
        forward: transfer_entropy(x, y, lag, config.bins),
        reverse: transfer_entropy(y, x, lag, config.bins),
    };

    let detector = PatternDetector::new(config.patterns.clone());
    let primary_name = pair.primary.to_string();
    let secondary_name = pair.secondary.to_string();
    let a = Signal {
        name: &primary_name,
        values: x,
    };
    let b = Signal {
        name: &secondary_name,
        values: y,
    };

    let mut patterns = detector.resonance(a, b);
    patterns.extend(detector.coupling(x, y, &p.entities));
    patterns.extend(detector.cascade(pair.primary, x, &p.timestamps, &p.entities));
    if pair.secondary != pair.primary {
        patterns.extend(detector.cascade(pair.secondary, y, &s.timestamps, &s.entities));
    }
    patterns.extend(detector.feedback(
        pair.primary,
        pair.secondary,
        te.forward,
        te.reverse,
        config.bins,
    ));
    patterns.extend(detector.synchronization(&[a, b]));

    let sx = unit_scale(x);
    let sy = unit_scale(y);
    let scatter: Vec<ScatterPoint> = sx
        .iter()
        .zip(&sy)
        .enumerate()
        .map(|(i, (&x, &y))| ScatterPoint {
            x,
            y,
            entity: p.entities.get(i).cloned().unwrap_or_default(),
        })
        .collect();

    let visualization_data = VisualizationData {
        regression: linear_regression(x, y),
        density_contours: density_contours(&scatter, config.grid_resolution),
        correlation_surface: correlation_surface(x, y, config.grid_resolution),
        coherence: coherence_spectrum(x, y, config.coherence_window)
            .into_iter()
            .map(|(frequency, coherence)| CoherencePoint {
                frequency,
                coherence,
            })
            .collect(),
        cross_correlation: cross_correlation(x, y, config.patterns.resonance_max_lag)
            .into_iter()
            .map(|(lag, correlation)| LagPoint { lag, correlation })
            .collect(),
        scatter,
    };

    CorrelationResult {
        pair,
        correlation,
        rank_correlation: spearman(x, y),
        significance: significance(correlation, n),
        mutual_information: mutual_information(x, y, config.bins),
        transfer_entropy: te,
        patterns,
        visualization_data,
        sample_count: n,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::ChannelData;
    use crate::constraint::Wavelength;
    use crate::patterns::PatternType;
    use approx::assert_abs_diff_eq;

    fn series(values: &[f64]) -> TimeSeries {
        ChannelData::temporal_from_values(values).extract_time_series()
    }

    fn pair() -> ChannelPair {
        ChannelPair::new(Wavelength::Temporal, Wavelength::Spectral)
    }

    #[test]
    fn test_truncates_to_shorter() {
        let r = compute_correlation(
            pair(),
            &series(&[1.0, 2.0, 3.0, 4.0, 5.0]),
            &series(&[2.0, 4.0, 6.0]),
            &CorrelationConfig::default(),
        );
        assert_eq!(r.sample_count, 3);
        assert_eq!(r.visualization_data.scatter.len(), 3);
        assert_abs_diff_eq!(r.correlation, 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_empty_series_degrade() {
        let r = compute_correlation(
            pair(),
            &TimeSeries::default(),
            &TimeSeries::default(),
            &CorrelationConfig::default(),
        );
        assert_eq!(r.sample_count, 0);
        assert_eq!(r.correlation, 0.0);
        assert_eq!(r.significance, 1.0);
        assert!(r.patterns.is_empty());
        assert!(r.visualization_data.density_contours.is_empty());
    }

    #[test]
    fn test_scatter_in_unit_square() {
        let x: Vec<f64> = (0..30).map(|i| (i as f64 * 0.7).sin() * 40.0).collect();
        let y: Vec<f64> = (0..30).map(|i| (i as f64 * 0.3).cos() - 8.0).collect();
        let r = compute_correlation(pair(), &series(&x), &series(&y), &CorrelationConfig::default());
        for p in &r.visualization_data.scatter {
            assert!((0.0..=1.0).contains(&p.x) && (0.0..=1.0).contains(&p.y));
        }
        assert_eq!(r.visualization_data.scatter[0].entity, "t0");
    }

    #[test]
    fn test_density_contours_nested() {
        let x: Vec<f64> = (0..40).map(|i| (i % 7) as f64).collect();
        let y: Vec<f64> = (0..40).map(|i| (i % 5) as f64).collect();
        let r = compute_correlation(pair(), &series(&x), &series(&y), &CorrelationConfig::default());
        let c = &r.visualization_data.density_contours;
        assert_eq!(c.len(), 3);
        assert!(c[0].cells.len() >= c[1].cells.len());
        assert!(c[1].cells.len() >= c[2].cells.len());
        assert!(!c[2].cells.is_empty());
    }

    #[test]
    fn test_surface_shape() {
        let x: Vec<f64> = (0..40).map(|i| i as f64).collect();
        let r = compute_correlation(pair(), &series(&x), &series(&x), &CorrelationConfig::default());
        let s = &r.visualization_data.correlation_surface;
        assert_eq!(s.len(), 10);
        assert!(s.iter().all(|row| row.len() == 10));
        assert_abs_diff_eq!(s[3][3], 1.0, epsilon = 1e-12);

        let tiny = correlation_surface(&[1.0, 2.0, 3.0], &[1.0, 2.0, 3.0], 10);
        assert!(tiny.is_empty());
    }

    #[test]
    fn test_linear_pair_synchronizes() {
        let x = [0.0, 1.0, 2.0, 3.0, 4.0, 5.0];
        let y = [0.0, 2.0, 4.0, 6.0, 8.0, 10.0];
        let r = compute_correlation(pair(), &series(&x), &series(&y), &CorrelationConfig::default());
        assert_abs_diff_eq!(r.visualization_data.regression.slope, 2.0, epsilon = 1e-12);
        assert!(r.patterns.iter().all(|p| p.pattern_type != PatternType::Resonance));
        assert!(
            r.patterns
                .iter()
                .any(|p| p.pattern_type == PatternType::Synchronization)
        );
        assert_eq!(r.visualization_data.cross_correlation.len(), 61);
    }

    #[test]
    fn test_result_json_shape() {
        let r = compute_correlation(
            pair(),
            &series(&[1.0, 3.0, 2.0, 5.0]),
            &series(&[2.0, 1.0, 4.0, 3.0]),
            &CorrelationConfig::default(),
        );
        let json = serde_json::to_value(&r).unwrap();
        assert_eq!(json["pair"]["primary"], "temporal");
        assert!(json["transferEntropy"].get("forward").is_some());
        assert!(json["visualizationData"]["regression"].get("rSquared").is_some());
        assert!(json["visualizationData"].get("correlationSurface").is_some());
        assert_eq!(json["sampleCount"], 4);
    }
}
