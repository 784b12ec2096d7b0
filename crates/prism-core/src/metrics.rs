//! Pure statistical functions over numeric series.
//!
//! Every function degrades instead of failing: empty input, mismatched
//! lengths and zero variance resolve to 0 (or an empty collection), never
//! NaN or a panic.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::constants::EPSILON;

pub fn mean(x: &[f64]) -> f64 {
    if x.is_empty() {
        return 0.0;
    }
    x.iter().sum::<f64>() / x.len() as f64
}

/// Population variance.
pub fn variance(x: &[f64]) -> f64 {
    if x.is_empty() {
        return 0.0;
    }
    let m = mean(x);
    x.iter().map(|v| (v - m) * (v - m)).sum::<f64>() / x.len() as f64
}

/// (min, max), or None for an empty slice.
pub fn min_max(x: &[f64]) -> Option<(f64, f64)> {
    if x.is_empty() {
        return None;
    }
    let min = x.iter().copied().fold(f64::INFINITY, f64::min);
    let max = x.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    Some((min, max))
}

/// Pearson product-moment correlation in [-1, 1].
pub fn pearson(x: &[f64], y: &[f64]) -> f64 {
    if x.is_empty() || x.len() != y.len() {
        return 0.0;
    }
    let mx = mean(x);
    let my = mean(y);
    let mut sxy = 0.0;
    let mut sxx = 0.0;
    let mut syy = 0.0;
    for (a, b) in x.iter().zip(y) {
        let dx = a - mx;
        let dy = b - my;
        sxy += dx * dy;
        sxx += dx * dx;
        syy += dy * dy;
    }
    let den = (sxx * syy).sqrt();
    if den < EPSILON {
        return 0.0;
    }
    (sxy / den).clamp(-1.0, 1.0)
}

/// Ranks 0..n, ties broken by original index order.
fn ranks(x: &[f64]) -> Vec<f64> {
    let mut order: Vec<usize> = (0..x.len()).collect();
    // sort_by is stable, so equal values keep index order
    order.sort_by(|&a, &b| x[a].total_cmp(&x[b]));
    let mut ranks = vec![0.0; x.len()];
    for (rank, &idx) in order.iter().enumerate() {
        ranks[idx] = rank as f64;
    }
    ranks
}

/// Spearman rank correlation.
pub fn spearman(x: &[f64], y: &[f64]) -> f64 {
    if x.is_empty() || x.len() != y.len() {
        return 0.0;
    }
    pearson(&ranks(x), &ranks(y))
}

/// Equal-width bin index of every sample over the series' own range.
fn discretize(x: &[f64], bins: usize) -> Vec<usize> {
    let Some((min, max)) = min_max(x) else {
        return Vec::new();
    };
    let range = max - min;
    if range < EPSILON {
        return vec![0; x.len()];
    }
    x.iter()
        .map(|v| {
            let b = ((v - min) / range * bins as f64).floor() as usize;
            b.min(bins - 1)
        })
        .collect()
}

/// Mutual information in bits between two equal-length series.
pub fn mutual_information(x: &[f64], y: &[f64], bins: usize) -> f64 {
    if x.is_empty() || x.len() != y.len() || bins == 0 {
        return 0.0;
    }
    let bx = discretize(x, bins);
    let by = discretize(y, bins);
    let n = x.len() as f64;

    let mut px = vec![0usize; bins];
    let mut py = vec![0usize; bins];
    let mut pxy: HashMap<(usize, usize), usize> = HashMap::new();
    for (&a, &b) in bx.iter().zip(&by) {
        px[a] += 1;
        py[b] += 1;
        *pxy.entry((a, b)).or_default() += 1;
    }

    let mut mi = 0.0;
    for (&(a, b), &count) in &pxy {
        let p_joint = count as f64 / n;
        let p_a = px[a] as f64 / n;
        let p_b = py[b] as f64 / n;
        mi += p_joint * (p_joint / (p_a * p_b)).log2();
    }
    mi.max(0.0)
}

/// Transfer entropy in bits from `source` into `target`.
///
/// Estimated from the binned joint distribution of
/// `(target[t], target[t - lag], source[t - lag])`. Swap the arguments for
/// the reverse direction.
pub fn transfer_entropy(source: &[f64], target: &[f64], lag: usize, bins: usize) -> f64 {
    let n = source.len().min(target.len());
    if lag == 0 || bins == 0 || n <= lag {
        return 0.0;
    }
    let bs = discretize(&source[..n], bins);
    let bt = discretize(&target[..n], bins);

    let mut joint: HashMap<(usize, usize, usize), usize> = HashMap::new();
    let mut past_pair: HashMap<(usize, usize), usize> = HashMap::new();
    let mut target_pair: HashMap<(usize, usize), usize> = HashMap::new();
    let mut target_past: HashMap<usize, usize> = HashMap::new();

    for t in lag..n {
        let now = bt[t];
        let past = bt[t - lag];
        let src = bs[t - lag];
        *joint.entry((now, past, src)).or_default() += 1;
        *past_pair.entry((past, src)).or_default() += 1;
        *target_pair.entry((now, past)).or_default() += 1;
        *target_past.entry(past).or_default() += 1;
    }

    let total = (n - lag) as f64;
    let mut te = 0.0;
    for (&(now, past, src), &count) in &joint {
        let p_joint = count as f64 / total;
        let p_past = target_past[&past] as f64 / total;
        let p_past_src = past_pair[&(past, src)] as f64 / total;
        let p_now_past = target_pair[&(now, past)] as f64 / total;
        te += p_joint * ((p_joint * p_past) / (p_past_src * p_now_past)).log2();
    }
    te.max(0.0)
}

/// Pearson correlation of `x[i]` against `y[i + lag]` for every lag in
/// `[-max_lag, max_lag]`. Lags with fewer than two overlapping samples score 0.
pub fn cross_correlation(x: &[f64], y: &[f64], max_lag: usize) -> Vec<(isize, f64)> {
    let max_lag = max_lag as isize;
    let nx = x.len() as isize;
    let ny = y.len() as isize;
    (-max_lag..=max_lag)
        .map(|lag| {
            // overlap: i in [max(0, -lag), min(nx, ny - lag))
            let start = 0.max(-lag);
            let end = nx.min(ny - lag);
            if end - start < 2 {
                return (lag, 0.0);
            }
            let xs = &x[start as usize..end as usize];
            let ys = &y[(start + lag) as usize..(end + lag) as usize];
            (lag, pearson(xs, ys))
        })
        .collect()
}

/// Magnitude coherence per frequency over the first `window` samples.
///
/// Direct O(window²) discrete transform; the DC bin is skipped. Frequencies
/// are in cycles per sample, coherence is `2|X||Y| / (|X|² + |Y|²)`.
pub fn coherence_spectrum(x: &[f64], y: &[f64], window: usize) -> Vec<(f64, f64)> {
    let w = window.min(x.len()).min(y.len());
    if w < 2 {
        return Vec::new();
    }
    let magnitude = |s: &[f64], k: usize| -> f64 {
        let mut re = 0.0;
        let mut im = 0.0;
        for (t, v) in s.iter().enumerate() {
            let angle = std::f64::consts::TAU * (k * t) as f64 / w as f64;
            re += v * angle.cos();
            im -= v * angle.sin();
        }
        (re * re + im * im).sqrt()
    };

    (1..=w / 2)
        .map(|k| {
            let mx = magnitude(&x[..w], k);
            let my = magnitude(&y[..w], k);
            let den = mx * mx + my * my;
            let coherence = if den < EPSILON {
                0.0
            } else {
                (2.0 * mx * my / den).clamp(0.0, 1.0)
            };
            (k as f64 / w as f64, coherence)
        })
        .collect()
}

/// Least-squares fit `y = slope * x + intercept`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Regression {
    pub slope: f64,
    pub intercept: f64,
    pub r_squared: f64,
}

pub fn linear_regression(x: &[f64], y: &[f64]) -> Regression {
    if x.is_empty() || x.len() != y.len() {
        return Regression::default();
    }
    let mx = mean(x);
    let my = mean(y);
    let mut sxy = 0.0;
    let mut sxx = 0.0;
    for (a, b) in x.iter().zip(y) {
        sxy += (a - mx) * (b - my);
        sxx += (a - mx) * (a - mx);
    }
    if sxx < EPSILON {
        return Regression {
            slope: 0.0,
            intercept: my,
            r_squared: 0.0,
        };
    }
    let slope = sxy / sxx;
    let r = pearson(x, y);
    Regression {
        slope,
        intercept: my - slope * mx,
        r_squared: r * r,
    }
}

/// Approximate two-sided p-value for a Pearson `r` over `n` samples.
///
/// Uses the t statistic with a standard-normal tail; fewer than three
/// samples carry no evidence and return 1.
pub fn significance(r: f64, n: usize) -> f64 {
    if n < 3 {
        return 1.0;
    }
    let r = r.clamp(-1.0, 1.0);
    let denom = (1.0 - r * r).max(0.0);
    if denom < EPSILON {
        return 0.0;
    }
    let t = r.abs() * ((n - 2) as f64 / denom).sqrt();
    (2.0 * (1.0 - standard_normal_cdf(t))).clamp(0.0, 1.0)
}

fn standard_normal_cdf(z: f64) -> f64 {
    0.5 * (1.0 + erf(z / std::f64::consts::SQRT_2))
}

/// Abramowitz & Stegun 7.1.26, max error 1.5e-7.
fn erf(x: f64) -> f64 {
    let sign = if x < 0.0 { -1.0 } else { 1.0 };
    let x = x.abs();
    let t = 1.0 / (1.0 + 0.327_591_1 * x);
    let poly = t
        * (0.254_829_592
            + t * (-0.284_496_736 + t * (1.421_413_741 + t * (-1.453_152_027 + t * 1.061_405_429))));
    sign * (1.0 - poly * (-x * x).exp())
}
