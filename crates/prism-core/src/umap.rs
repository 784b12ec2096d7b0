use rand::Rng;

use crate::config::UmapParams;
use crate::constants::{EPSILON, MAX_STEP, UMAP_NEGATIVE_SAMPLES};
use crate::projection::{
    CancelToken, Projection, Projector, clip, nearest_neighbors, neighborhood_preservation,
};

/// Attraction scale applied to `max(0, d - min_dist)`.
const ATTRACTION: f64 = 0.1;

/// Repulsion scale; the force falls off as 1 / (d² + REPULSION_SOFTENING).
const REPULSION: f64 = 0.02;
const REPULSION_SOFTENING: f64 = 0.01;

/// Ring radius and jitter amplitude of the initial layout.
const RING_RADIUS: f64 = 1.0;
const JITTER: f64 = 0.1;

/// Neighbors compared when scoring the layout's confidence.
const CONFIDENCE_NEIGHBORS: usize = 5;

/// Force-directed layout over a k-nearest-neighbor graph.
///
/// A simplification of UMAP: no fuzzy simplicial set and no spectral
/// initialization, just neighbor attraction and sampled repulsion with a
/// linearly annealed learning rate.
#[derive(Clone, Debug)]
pub struct Umap {
    pub n_neighbors: usize,
    pub min_dist: f64,
    pub n_epochs: usize,
    pub learning_rate: f64,
}

impl From<&UmapParams> for Umap {
    fn from(params: &UmapParams) -> Self {
        Self {
            n_neighbors: params.n_neighbors.max(1),
            min_dist: params.min_dist.max(0.0),
            n_epochs: params.n_epochs,
            learning_rate: params.learning_rate,
        }
    }
}

impl Umap {
    /// Points on a ring in the xy-plane, each nudged by uniform jitter.
    fn ring_init<R: Rng>(n: usize, rng: &mut R) -> Vec<[f64; 3]> {
        (0..n)
            .map(|i| {
                let angle = std::f64::consts::TAU * i as f64 / n as f64;
                [
                    RING_RADIUS * angle.cos() + rng.random_range(-JITTER..JITTER),
                    RING_RADIUS * angle.sin() + rng.random_range(-JITTER..JITTER),
                    rng.random_range(-JITTER..JITTER),
                ]
            })
            .collect()
    }

    fn epoch<R: Rng>(
        &self,
        embedding: &mut [[f64; 3]],
        graph: &[Vec<usize>],
        lr: f64,
        rng: &mut R,
    ) {
        let n = embedding.len();
        for i in 0..n {
            let mut step = [0.0; 3];

            for &j in &graph[i] {
                let diff = sub(embedding[j], embedding[i]);
                let d = norm(diff);
                if d < EPSILON {
                    continue;
                }
                let pull = ATTRACTION * (d - self.min_dist).max(0.0) / d;
                for a in 0..3 {
                    step[a] += pull * diff[a];
                }
            }

            // only sample when there is someone outside the neighbor list
            if graph[i].len() + 1 < n {
                for _ in 0..UMAP_NEGATIVE_SAMPLES {
                    let j = rng.random_range(0..n);
                    if j == i || graph[i].contains(&j) {
                        continue;
                    }
                    let diff = sub(embedding[i], embedding[j]);
                    let d2 = diff.iter().map(|v| v * v).sum::<f64>();
                    let d = d2.sqrt();
                    if d < EPSILON {
                        continue;
                    }
                    let push = REPULSION / (d2 + REPULSION_SOFTENING) / d;
                    for a in 0..3 {
                        step[a] += push * diff[a];
                    }
                }
            }

            for a in 0..3 {
                embedding[i][a] += clip(lr * step[a], MAX_STEP);
            }
        }
    }
}

fn sub(a: [f64; 3], b: [f64; 3]) -> [f64; 3] {
    [a[0] - b[0], a[1] - b[1], a[2] - b[2]]
}

fn norm(v: [f64; 3]) -> f64 {
    (v[0] * v[0] + v[1] * v[1] + v[2] * v[2]).sqrt()
}

impl Projector for Umap {
    fn project<R: Rng>(&self, data: &[Vec<f64>], rng: &mut R, cancel: &CancelToken) -> Projection {
        let n = data.len();
        if n == 0 {
            return Projection::default();
        }
        if n == 1 {
            return Projection {
                coords: vec![[0.0; 3]],
                explained_variance: Vec::new(),
                confidence: 1.0,
            };
        }

        let k = self.n_neighbors.min(n - 1);
        let graph: Vec<Vec<usize>> = (0..n).map(|i| nearest_neighbors(data, i, k)).collect();
        let mut embedding = Self::ring_init(n, rng);

        for epoch in 0..self.n_epochs {
            if cancel.is_cancelled() {
                tracing::warn!(epoch, epochs = self.n_epochs, "umap layout cancelled");
                break;
            }
            let lr = self.learning_rate * (1.0 - epoch as f64 / self.n_epochs as f64);
            self.epoch(&mut embedding, &graph, lr, rng);
        }

        let confidence = neighborhood_preservation(data, &embedding, CONFIDENCE_NEIGHBORS);
        tracing::debug!(rows = n, neighbors = k, confidence, "umap projection");

        Projection {
            coords: embedding,
            explained_variance: Vec::new(),
            confidence,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::SmallRng;

    fn rng() -> SmallRng {
        SmallRng::seed_from_u64(42)
    }

    fn two_clusters() -> Vec<Vec<f64>> {
        let mut rng = SmallRng::seed_from_u64(7);
        let mut data = Vec::new();
        for center in [0.0, 10.0] {
            for _ in 0..10 {
                data.push(
                    (0..5)
                        .map(|_| center + rng.random_range(-0.5..0.5))
                        .collect(),
                );
            }
        }
        data
    }

    fn umap() -> Umap {
        Umap::from(&UmapParams {
            n_neighbors: 5,
            ..UmapParams::default()
        })
    }

    #[test]
    fn test_output_shape_and_finite() {
        let data = two_clusters();
        let p = umap().project(&data, &mut rng(), &CancelToken::new());
        assert_eq!(p.coords.len(), data.len());
        assert!(p.coords.iter().flatten().all(|v| v.is_finite()));
        assert!((0.0..=1.0).contains(&p.confidence));
    }

    #[test]
    fn test_seeded_runs_are_identical() {
        let data = two_clusters();
        let a = umap().project(&data, &mut rng(), &CancelToken::new());
        let b = umap().project(&data, &mut rng(), &CancelToken::new());
        assert_eq!(a.coords, b.coords);
    }

    #[test]
    fn test_clusters_stay_apart() {
        let data = two_clusters();
        let p = umap().project(&data, &mut rng(), &CancelToken::new());
        let centroid = |range: std::ops::Range<usize>| {
            let mut c = [0.0; 3];
            for i in range.clone() {
                for a in 0..3 {
                    c[a] += p.coords[i][a] / range.len() as f64;
                }
            }
            c
        };
        let spread = |range: std::ops::Range<usize>, c: [f64; 3]| {
            range
                .map(|i| norm(sub(p.coords[i], c)))
                .sum::<f64>()
                / 10.0
        };
        let a = centroid(0..10);
        let b = centroid(10..20);
        let between = norm(sub(a, b));
        assert!(
            between > spread(0..10, a) && between > spread(10..20, b),
            "clusters overlap: between={between}"
        );
    }

    #[test]
    fn test_single_and_empty() {
        let p = umap().project(&[], &mut rng(), &CancelToken::new());
        assert!(p.coords.is_empty());
        let p = umap().project(&[vec![1.0, 2.0]], &mut rng(), &CancelToken::new());
        assert_eq!(p.coords, vec![[0.0; 3]]);
    }

    #[test]
    fn test_cancelled_returns_initial_ring() {
        let data = two_clusters();
        let token = CancelToken::new();
        token.cancel();
        let p = umap().project(&data, &mut rng(), &token);
        assert_eq!(p.coords.len(), data.len());
        for c in &p.coords {
            let r = (c[0] * c[0] + c[1] * c[1]).sqrt();
            assert!((r - RING_RADIUS).abs() < 2.0 * JITTER);
        }
    }

    #[test]
    fn test_identical_points_do_not_explode() {
        let data = vec![vec![1.0, 1.0]; 6];
        let p = umap().project(&data, &mut rng(), &CancelToken::new());
        assert!(p.coords.iter().flatten().all(|v| v.is_finite()));
    }
}
