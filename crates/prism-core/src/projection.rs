//! Dimensionality reduction to 3D.
//!
//! Three interchangeable strategies sit behind [`Projector`]: PCA by power
//! iteration, a UMAP-like force layout and a t-SNE-like gradient descent.
//! They are heuristics for visualization-sized batches (tens to low hundreds
//! of rows) with brute-force neighbor search and no Barnes-Hut acceleration;
//! they are not reference implementations of the published algorithms.
//! Randomized strategies draw from an injected RNG so a fixed seed gives a
//! fixed layout.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use rand::Rng;

use crate::config::{ProjectionConfig, ProjectionMethod};
use crate::constants::{EPSILON, OUTPUT_DIMS};
use crate::pca::Pca;
use crate::tsne::Tsne;
use crate::umap::Umap;

/// Output of one projector run: one 3D row per input row.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Projection {
    pub coords: Vec<[f64; 3]>,
    /// Per-component explained-variance ratios (PCA only).
    pub explained_variance: Vec<f64>,
    /// How faithfully the layout represents the input, in [0, 1].
    pub confidence: f64,
}

/// Cooperative cancellation for the iterative projectors.
///
/// Clones share one flag. UMAP checks it once per epoch and t-SNE once per
/// iteration; a cancelled run returns the embedding reached so far.
#[derive(Clone, Debug, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
    deadline: Option<Instant>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// A token that also trips once `budget` has elapsed from now.
    pub fn with_timeout(budget: Duration) -> Self {
        Self {
            flag: Arc::default(),
            deadline: Some(Instant::now() + budget),
        }
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Relaxed) || self.deadline.is_some_and(|d| Instant::now() >= d)
    }
}

/// A strategy mapping a rectangular matrix (rows = observations) to 3D.
pub trait Projector {
    fn project<R: Rng>(&self, data: &[Vec<f64>], rng: &mut R, cancel: &CancelToken)
    -> Projection;
}

/// Zero-pad every row to the longest row's length.
pub fn pad_rows(rows: &[&[f64]]) -> Vec<Vec<f64>> {
    let width = rows.iter().map(|r| r.len()).max().unwrap_or(0);
    rows.iter()
        .map(|r| {
            let mut padded = r.to_vec();
            padded.resize(width, 0.0);
            padded
        })
        .collect()
}

/// Run the configured strategy over a rectangular matrix.
pub fn run_projection<R: Rng>(
    data: &[Vec<f64>],
    config: &ProjectionConfig,
    rng: &mut R,
    cancel: &CancelToken,
) -> Projection {
    match config.method {
        ProjectionMethod::Pca => Pca::from(&config.pca).project(data, rng, cancel),
        ProjectionMethod::Umap => Umap::from(&config.umap).project(data, rng, cancel),
        ProjectionMethod::Tsne => Tsne::from(&config.tsne).project(data, rng, cancel),
        ProjectionMethod::Unsupported => {
            tracing::warn!(
                rows = data.len(),
                "unsupported projection method, using first {OUTPUT_DIMS} raw dimensions"
            );
            raw_projection(data)
        }
    }
}

/// Fallback: the first three columns, zero-filled when narrower.
/// Confidence is the share of total variance those columns carry.
pub fn raw_projection(data: &[Vec<f64>]) -> Projection {
    let coords = data
        .iter()
        .map(|row| {
            let mut c = [0.0; 3];
            for (slot, v) in c.iter_mut().zip(row) {
                *slot = *v;
            }
            c
        })
        .collect();

    let width = data.first().map_or(0, Vec::len);
    let column_variance: Vec<f64> = (0..width)
        .map(|j| {
            let col: Vec<f64> = data.iter().map(|r| r.get(j).copied().unwrap_or(0.0)).collect();
            crate::metrics::variance(&col)
        })
        .collect();
    let total: f64 = column_variance.iter().sum();
    let kept: f64 = column_variance.iter().take(OUTPUT_DIMS).sum();
    let confidence = if total < EPSILON { 1.0 } else { kept / total };

    Projection {
        coords,
        explained_variance: Vec::new(),
        confidence,
    }
}

pub(crate) fn squared_distance(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum()
}

/// Indices of the `k` nearest rows to row `i`, nearest first (brute force).
pub(crate) fn nearest_neighbors<T: AsRef<[f64]>>(rows: &[T], i: usize, k: usize) -> Vec<usize> {
    let mut others: Vec<(usize, f64)> = rows
        .iter()
        .enumerate()
        .filter(|(j, _)| *j != i)
        .map(|(j, r)| (j, squared_distance(rows[i].as_ref(), r.as_ref())))
        .collect();
    others.sort_by(|a, b| a.1.total_cmp(&b.1).then(a.0.cmp(&b.0)));
    others.into_iter().take(k).map(|(j, _)| j).collect()
}

/// Average fraction of each row's k nearest input neighbors that remain
/// among its k nearest neighbors in the embedding.
pub fn neighborhood_preservation(data: &[Vec<f64>], coords: &[[f64; 3]], k: usize) -> f64 {
    let n = data.len();
    if n < 3 || coords.len() != n {
        return 1.0;
    }
    let k = k.min(n - 1).max(1);
    let total: f64 = (0..n)
        .map(|i| {
            let high = nearest_neighbors(data, i, k);
            let low = nearest_neighbors(coords, i, k);
            high.iter().filter(|j| low.contains(j)).count() as f64 / k as f64
        })
        .sum();
    total / n as f64
}

/// Clamp a coordinate update so one step never moves further than `limit`.
pub(crate) fn clip(v: f64, limit: f64) -> f64 {
    if v.is_finite() { v.clamp(-limit, limit) } else { 0.0 }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::SmallRng;

    #[test]
    fn test_pad_rows_to_batch_max() {
        let a = [1.0, 2.0];
        let b = [3.0, 4.0, 5.0, 6.0];
        let c = [7.0];
        let padded = pad_rows(&[&a, &b, &c]);
        assert!(padded.iter().all(|r| r.len() == 4));
        assert_eq!(padded[0], vec![1.0, 2.0, 0.0, 0.0]);
        assert_eq!(padded[2], vec![7.0, 0.0, 0.0, 0.0]);
    }

    #[test]
    fn test_raw_projection_takes_first_three() {
        let data = vec![vec![1.0, 2.0, 3.0, 4.0], vec![5.0]];
        let p = raw_projection(&data);
        assert_eq!(p.coords, vec![[1.0, 2.0, 3.0], [5.0, 0.0, 0.0]]);
    }

    #[test]
    fn test_unsupported_method_falls_back_to_raw() {
        let data = vec![vec![1.0, 2.0, 3.0, 9.0], vec![4.0, 5.0, 6.0, 9.0]];
        let config = ProjectionConfig::with_method(ProjectionMethod::Unsupported);
        let mut rng = SmallRng::seed_from_u64(1);
        let p = run_projection(&data, &config, &mut rng, &CancelToken::new());
        assert_eq!(p.coords, vec![[1.0, 2.0, 3.0], [4.0, 5.0, 6.0]]);
        // the constant fourth column carries no variance
        assert!((p.confidence - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_cancel_token_shared_between_clones() {
        let token = CancelToken::new();
        let clone = token.clone();
        assert!(!clone.is_cancelled());
        token.cancel();
        assert!(clone.is_cancelled());
    }

    #[test]
    fn test_cancel_token_deadline() {
        let token = CancelToken::with_timeout(Duration::ZERO);
        assert!(token.is_cancelled());
    }

    #[test]
    fn test_nearest_neighbors_order() {
        let rows = vec![vec![0.0], vec![10.0], vec![1.0], vec![3.0]];
        assert_eq!(nearest_neighbors(&rows, 0, 2), vec![2, 3]);
    }

    #[test]
    fn test_identity_embedding_preserves_neighborhoods() {
        let data: Vec<Vec<f64>> = (0..6).map(|i| vec![i as f64, 0.0, 0.0]).collect();
        let coords: Vec<[f64; 3]> = (0..6).map(|i| [i as f64, 0.0, 0.0]).collect();
        assert!((neighborhood_preservation(&data, &coords, 2) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_clip_non_finite() {
        assert_eq!(clip(f64::NAN, 4.0), 0.0);
        assert_eq!(clip(10.0, 4.0), 4.0);
        assert_eq!(clip(-10.0, 4.0), -4.0);
    }
}
