use rand::Rng;

use crate::config::TsneParams;
use crate::constants::{EPSILON, MAX_STEP, TSNE_MOMENTUM_SWITCH};
use crate::projection::{
    CancelToken, Projection, Projector, clip, neighborhood_preservation, squared_distance,
};

const INITIAL_MOMENTUM: f64 = 0.5;
const FINAL_MOMENTUM: f64 = 0.8;

/// Bandwidth search budget and entropy tolerance (nats).
const BANDWIDTH_STEPS: usize = 50;
const ENTROPY_TOLERANCE: f64 = 1e-5;

/// Floor for joint probabilities so log terms and ratios stay finite.
const MIN_PROBABILITY: f64 = 1e-12;

/// Half-width of the uniform initialization around the origin.
const INIT_SPREAD: f64 = 1e-4;

const CONFIDENCE_NEIGHBORS: usize = 5;

/// Student-t embedding minimizing KL(P‖Q) by momentum gradient descent.
///
/// Exact O(n²) gradients, no early exaggeration and no adaptive gains.
#[derive(Clone, Debug)]
pub struct Tsne {
    pub perplexity: f64,
    pub learning_rate: f64,
    pub n_iterations: usize,
}

impl From<&TsneParams> for Tsne {
    fn from(params: &TsneParams) -> Self {
        Self {
            perplexity: params.perplexity,
            learning_rate: params.learning_rate,
            n_iterations: params.n_iterations,
        }
    }
}

/// Conditional probabilities p(j|i) for one row at precision `beta`,
/// together with their Shannon entropy in nats.
///
/// Distances are shifted by the row minimum before exponentiating so the
/// nearest point always carries weight 1 and the sum never underflows.
fn conditional_row(distances: &[f64], i: usize, beta: f64) -> (Vec<f64>, f64) {
    let nearest = distances
        .iter()
        .enumerate()
        .filter(|(j, _)| *j != i)
        .map(|(_, d)| *d)
        .fold(f64::INFINITY, f64::min);
    let mut row: Vec<f64> = distances
        .iter()
        .enumerate()
        .map(|(j, d)| if j == i { 0.0 } else { (-(d - nearest) * beta).exp() })
        .collect();
    let sum: f64 = row.iter().sum();
    let mut entropy = 0.0;
    for p in &mut row {
        *p /= sum;
        if *p > MIN_PROBABILITY {
            entropy -= *p * p.ln();
        }
    }
    (row, entropy)
}

/// Binary search for the precision whose row entropy equals `target` nats.
fn search_bandwidth(distances: &[f64], i: usize, target: f64) -> (Vec<f64>, f64) {
    let mut beta = 1.0;
    let mut lo = 0.0;
    let mut hi = f64::INFINITY;
    let mut best = conditional_row(distances, i, beta);
    for _ in 0..BANDWIDTH_STEPS {
        let diff = best.1 - target;
        if diff.abs() < ENTROPY_TOLERANCE {
            break;
        }
        if diff > 0.0 {
            // too flat: sharpen
            lo = beta;
            beta = if hi.is_finite() { (beta + hi) / 2.0 } else { beta * 2.0 };
        } else {
            hi = beta;
            beta = (beta + lo) / 2.0;
        }
        best = conditional_row(distances, i, beta);
    }
    best
}

/// Per-row bandwidths matched to ln(perplexity), symmetrized into a joint
/// distribution.
pub fn joint_probabilities(data: &[Vec<f64>], perplexity: f64) -> Vec<Vec<f64>> {
    let n = data.len();
    if n < 2 {
        return vec![vec![0.0; n]; n];
    }
    let distances: Vec<Vec<f64>> = data
        .iter()
        .map(|a| data.iter().map(|b| squared_distance(a, b)).collect())
        .collect();

    // a perplexity above n - 1 cannot be reached
    let target = perplexity.clamp(1.0, (n - 1) as f64).ln();
    let conditional: Vec<Vec<f64>> = (0..n)
        .map(|i| search_bandwidth(&distances[i], i, target).0)
        .collect();

    let mut joint = vec![vec![0.0; n]; n];
    for i in 0..n {
        for j in 0..n {
            if i != j {
                joint[i][j] =
                    ((conditional[i][j] + conditional[j][i]) / (2.0 * n as f64)).max(MIN_PROBABILITY);
            }
        }
    }
    joint
}

/// KL(P‖Q) of an embedding, for diagnostics and tests.
pub fn kl_divergence(p: &[Vec<f64>], embedding: &[[f64; 3]]) -> f64 {
    let n = embedding.len();
    let (num, sum) = student_t(embedding);
    let mut kl = 0.0;
    for i in 0..n {
        for j in 0..n {
            if i != j && p[i][j] > MIN_PROBABILITY {
                let q = (num[i][j] / sum).max(MIN_PROBABILITY);
                kl += p[i][j] * (p[i][j] / q).ln();
            }
        }
    }
    kl
}

/// Unnormalized Student-t affinities and their total.
fn student_t(embedding: &[[f64; 3]]) -> (Vec<Vec<f64>>, f64) {
    let n = embedding.len();
    let mut num = vec![vec![0.0; n]; n];
    let mut sum = 0.0;
    for i in 0..n {
        for j in (i + 1)..n {
            let v = 1.0 / (1.0 + squared_distance(&embedding[i], &embedding[j]));
            num[i][j] = v;
            num[j][i] = v;
            sum += 2.0 * v;
        }
    }
    (num, sum.max(EPSILON))
}

impl Tsne {
    fn gradient(&self, p: &[Vec<f64>], embedding: &[[f64; 3]]) -> Vec<[f64; 3]> {
        let n = embedding.len();
        let (num, sum) = student_t(embedding);
        let mut grad = vec![[0.0; 3]; n];
        for i in 0..n {
            for j in 0..n {
                if i == j {
                    continue;
                }
                let q = num[i][j] / sum;
                let mult = 4.0 * (p[i][j] - q) * num[i][j];
                for a in 0..3 {
                    grad[i][a] += mult * (embedding[i][a] - embedding[j][a]);
                }
            }
        }
        grad
    }
}

fn recenter(embedding: &mut [[f64; 3]]) {
    let n = embedding.len() as f64;
    let mut mean = [0.0; 3];
    for y in embedding.iter() {
        for a in 0..3 {
            mean[a] += y[a] / n;
        }
    }
    for y in embedding.iter_mut() {
        for a in 0..3 {
            y[a] -= mean[a];
        }
    }
}

impl Projector for Tsne {
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

        let p = joint_probabilities(data, self.perplexity);
        let mut embedding: Vec<[f64; 3]> = (0..n)
            .map(|_| {
                [
                    rng.random_range(-INIT_SPREAD..INIT_SPREAD),
                    rng.random_range(-INIT_SPREAD..INIT_SPREAD),
                    rng.random_range(-INIT_SPREAD..INIT_SPREAD),
                ]
            })
            .collect();
        let mut velocity = vec![[0.0; 3]; n];

        for iter in 0..self.n_iterations {
            if cancel.is_cancelled() {
                tracing::warn!(iter, iterations = self.n_iterations, "t-sne descent cancelled");
                break;
            }
            let momentum = if iter < TSNE_MOMENTUM_SWITCH {
                INITIAL_MOMENTUM
            } else {
                FINAL_MOMENTUM
            };
            let grad = self.gradient(&p, &embedding);
            for i in 0..n {
                for a in 0..3 {
                    velocity[i][a] =
                        clip(momentum * velocity[i][a] - self.learning_rate * grad[i][a], MAX_STEP);
                    embedding[i][a] += velocity[i][a];
                }
            }
            recenter(&mut embedding);
        }

        let confidence = neighborhood_preservation(data, &embedding, CONFIDENCE_NEIGHBORS);
        tracing::debug!(rows = n, perplexity = self.perplexity, confidence, "t-sne projection");

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

    fn tsne(iterations: usize) -> Tsne {
        Tsne::from(&TsneParams {
            perplexity: 5.0,
            learning_rate: 100.0,
            n_iterations: iterations,
        })
    }

    fn blobs() -> Vec<Vec<f64>> {
        let mut rng = SmallRng::seed_from_u64(3);
        let mut data = Vec::new();
        for center in [-5.0, 5.0] {
            for _ in 0..12 {
                data.push((0..4).map(|_| center + rng.random_range(-1.0..1.0)).collect());
            }
        }
        data
    }

    #[test]
    fn test_joint_probabilities_sum_to_one() {
        let p = joint_probabilities(&blobs(), 5.0);
        let total: f64 = p.iter().flatten().sum();
        assert!((total - 1.0).abs() < 1e-6, "total = {total}");
        for i in 0..p.len() {
            for j in 0..p.len() {
                assert!((p[i][j] - p[j][i]).abs() < 1e-15);
            }
        }
    }

    #[test]
    fn test_bandwidth_matches_perplexity() {
        let data = blobs();
        let distances: Vec<f64> = data.iter().map(|b| squared_distance(&data[0], b)).collect();
        let target = 5.0_f64.ln();
        let (row, entropy) = search_bandwidth(&distances, 0, target);
        assert_eq!(row.len(), data.len());
        assert_eq!(row[0], 0.0);
        assert!((entropy - target).abs() < 1e-3, "entropy {entropy} vs {target}");
    }

    #[test]
    fn test_far_points_do_not_underflow() {
        let distances = [0.0, 1e6, 1e6 + 1.0, 1e6 + 4.0];
        let (row, entropy) = search_bandwidth(&distances, 0, 2.0_f64.ln());
        let total: f64 = row.iter().sum();
        assert!((total - 1.0).abs() < 1e-9);
        assert!(entropy.is_finite());
    }

    #[test]
    fn test_descent_reduces_kl() {
        let data = blobs();
        let p = joint_probabilities(&data, 5.0);
        let short = tsne(1).project(&data, &mut rng(), &CancelToken::new());
        let long = tsne(300).project(&data, &mut rng(), &CancelToken::new());
        let kl_short = kl_divergence(&p, &short.coords);
        let kl_long = kl_divergence(&p, &long.coords);
        assert!(kl_long < kl_short, "{kl_long} >= {kl_short}");
    }

    #[test]
    fn test_blobs_separate() {
        let data = blobs();
        let p = tsne(300).project(&data, &mut rng(), &CancelToken::new());
        assert_eq!(p.coords.len(), data.len());
        assert!(p.coords.iter().flatten().all(|v| v.is_finite()));
        assert!((0.0..=1.0).contains(&p.confidence));
        // every point's nearest embedded neighbor comes from its own blob
        for i in 0..data.len() {
            let nearest = (0..data.len())
                .filter(|&j| j != i)
                .min_by(|&a, &b| {
                    squared_distance(&p.coords[i], &p.coords[a])
                        .total_cmp(&squared_distance(&p.coords[i], &p.coords[b]))
                })
                .unwrap();
            assert_eq!(i / 12, nearest / 12, "point {i} landed next to {nearest}");
        }
    }

    #[test]
    fn test_deterministic_with_seed() {
        let data = blobs();
        let a = tsne(50).project(&data, &mut rng(), &CancelToken::new());
        let b = tsne(50).project(&data, &mut rng(), &CancelToken::new());
        assert_eq!(a.coords, b.coords);
    }

    #[test]
    fn test_two_points_and_duplicates() {
        let p = tsne(20).project(&[vec![0.0], vec![1.0]], &mut rng(), &CancelToken::new());
        assert_eq!(p.coords.len(), 2);
        let dupes = vec![vec![2.0, 2.0]; 5];
        let p = tsne(20).project(&dupes, &mut rng(), &CancelToken::new());
        assert!(p.coords.iter().flatten().all(|v| v.is_finite()));
    }

    #[test]
    fn test_cancelled_stays_near_origin() {
        let token = CancelToken::new();
        token.cancel();
        let p = tsne(500).project(&blobs(), &mut rng(), &token);
        assert!(p.coords.iter().flatten().all(|v| v.abs() <= INIT_SPREAD));
    }
}
