use rand::Rng;

use crate::config::PcaParams;
use crate::constants::{EPSILON, OUTPUT_DIMS, PCA_MAX_ITERATIONS, PCA_MIN_MAGNITUDE};
use crate::projection::{CancelToken, Projection, Projector};

/// Principal component analysis by power iteration with deflation.
#[derive(Clone, Copy, Debug)]
pub struct Pca {
    pub n_components: usize,
}

impl From<&PcaParams> for Pca {
    fn from(params: &PcaParams) -> Self {
        Self {
            n_components: params.n_components.clamp(1, OUTPUT_DIMS),
        }
    }
}

/// One principal axis.
#[derive(Clone, Debug, PartialEq)]
pub struct Component {
    pub vector: Vec<f64>,
    pub eigenvalue: f64,
}

/// Subtract each column's mean.
fn center(data: &[Vec<f64>]) -> Vec<Vec<f64>> {
    let n = data.len();
    let d = data.first().map_or(0, Vec::len);
    let mut means = vec![0.0; d];
    for row in data {
        for (m, v) in means.iter_mut().zip(row) {
            *m += v;
        }
    }
    for m in &mut means {
        *m /= n.max(1) as f64;
    }
    data.iter()
        .map(|row| row.iter().zip(&means).map(|(v, m)| v - m).collect())
        .collect()
}

/// Sample covariance of already-centered rows.
fn covariance(centered: &[Vec<f64>]) -> Vec<Vec<f64>> {
    let n = centered.len();
    let d = centered.first().map_or(0, Vec::len);
    let denom = if n > 1 { (n - 1) as f64 } else { 1.0 };
    let mut cov = vec![vec![0.0; d]; d];
    for row in centered {
        for i in 0..d {
            if row[i] == 0.0 {
                continue;
            }
            for j in i..d {
                cov[i][j] += row[i] * row[j];
            }
        }
    }
    for i in 0..d {
        for j in i..d {
            cov[i][j] /= denom;
            cov[j][i] = cov[i][j];
        }
    }
    cov
}

fn mat_vec(m: &[Vec<f64>], v: &[f64]) -> Vec<f64> {
    m.iter()
        .map(|row| row.iter().zip(v).map(|(a, b)| a * b).sum())
        .collect()
}

fn dot(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

/// Remove the components of `v` along each (unit) vector in `found`.
fn deflate(v: &mut [f64], found: &[Component]) {
    for c in found {
        let proj = dot(v, &c.vector);
        for (x, e) in v.iter_mut().zip(&c.vector) {
            *x -= proj * e;
        }
    }
}

/// Top-`k` eigenvectors of a symmetric matrix, largest eigenvalue first.
///
/// Every eigenpair is extracted from a random start drawn from `rng`, each
/// iterate deflated against the vectors already found, and the result sorted
/// by eigenvalue before truncating to `k`. Power iteration does not always
/// find the pairs in descending order, so extracting only the first `k` could
/// miss the major axis. Iteration stops after `PCA_MAX_ITERATIONS` or when
/// the iterate collapses below `PCA_MIN_MAGNITUDE`, in which case the
/// component is all zeros with a zero eigenvalue.
pub fn top_eigenvectors<R: Rng>(matrix: &[Vec<f64>], k: usize, rng: &mut R) -> Vec<Component> {
    let d = matrix.len();
    let mut found: Vec<Component> = Vec::with_capacity(d);

    for _ in 0..d {
        let mut v: Vec<f64> = (0..d).map(|_| rng.random_range(-1.0..1.0)).collect();
        deflate(&mut v, &found);
        let mut collapsed = dot(&v, &v).sqrt() < PCA_MIN_MAGNITUDE;

        for _ in 0..PCA_MAX_ITERATIONS {
            if collapsed {
                break;
            }
            let mut w = mat_vec(matrix, &v);
            deflate(&mut w, &found);
            let norm = dot(&w, &w).sqrt();
            if norm < PCA_MIN_MAGNITUDE {
                collapsed = true;
                break;
            }
            for x in &mut w {
                *x /= norm;
            }
            let delta: f64 = w.iter().zip(&v).map(|(a, b)| (a - b).abs()).sum();
            v = w;
            if delta < EPSILON {
                break;
            }
        }

        if collapsed {
            found.push(Component {
                vector: vec![0.0; d],
                eigenvalue: 0.0,
            });
            continue;
        }

        let eigenvalue = dot(&v, &mat_vec(matrix, &v)).max(0.0);
        found.push(Component {
            vector: v,
            eigenvalue,
        });
    }

    found.sort_by(|a, b| b.eigenvalue.total_cmp(&a.eigenvalue));
    found.truncate(k);
    found
}

impl Projector for Pca {
    fn project<R: Rng>(
        &self,
        data: &[Vec<f64>],
        rng: &mut R,
        _cancel: &CancelToken,
    ) -> Projection {
        if data.is_empty() {
            return Projection::default();
        }

        let centered = center(data);
        let cov = covariance(&centered);
        let total_variance: f64 = (0..cov.len()).map(|i| cov[i][i]).sum();
        let components = top_eigenvectors(&cov, self.n_components, rng);

        let coords = centered
            .iter()
            .map(|row| {
                let mut c = [0.0; 3];
                for (slot, comp) in c.iter_mut().zip(&components) {
                    *slot = dot(row, &comp.vector);
                }
                c
            })
            .collect();

        let found: f64 = components.iter().map(|c| c.eigenvalue).sum();
        let explained_variance = components
            .iter()
            .map(|c| if found < EPSILON { 0.0 } else { c.eigenvalue / found })
            .collect();
        let confidence = if total_variance < EPSILON {
            0.0
        } else {
            (found / total_variance).clamp(0.0, 1.0)
        };

        tracing::debug!(
            rows = data.len(),
            dims = cov.len(),
            confidence,
            "pca projection"
        );

        Projection {
            coords,
            explained_variance,
            confidence,
        }
    }
}
