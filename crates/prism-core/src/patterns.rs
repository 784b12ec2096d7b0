//! Structural patterns mined from extracted channel series.
//!
//! Detectors never fail. Too few samples, flat series or unmet thresholds
//! just produce no pattern.

use std::collections::VecDeque;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::config::PatternThresholds;
use crate::constants::EPSILON;
use crate::constraint::Wavelength;
use crate::metrics::{cross_correlation, min_max, pearson};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PatternType {
    Resonance,
    Coupling,
    Cascade,
    Feedback,
    Synchronization,
}

impl PatternType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Resonance => "resonance",
            Self::Coupling => "coupling",
            Self::Cascade => "cascade",
            Self::Feedback => "feedback",
            Self::Synchronization => "synchronization",
        }
    }
}

impl fmt::Display for PatternType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct TemporalSpan {
    pub start: f64,
    pub end: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CorrelationPattern {
    pub id: String,
    #[serde(rename = "type")]
    pub pattern_type: PatternType,
    /// In [0, 1].
    pub strength: f64,
    pub description: String,
    pub involved_entities: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temporal_span: Option<TemporalSpan>,
}

impl CorrelationPattern {
    pub fn new(
        id: impl Into<String>,
        pattern_type: PatternType,
        strength: f64,
        description: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            pattern_type,
            strength: if strength.is_finite() {
                strength.clamp(0.0, 1.0)
            } else {
                0.0
            },
            description: description.into(),
            involved_entities: Vec::new(),
            temporal_span: None,
        }
    }

    pub fn with_entities(mut self, entities: Vec<String>) -> Self {
        self.involved_entities = entities;
        self
    }

    pub fn with_span(mut self, start: f64, end: f64) -> Self {
        self.temporal_span = Some(TemporalSpan { start, end });
        self
    }
}

/// A named series handed to the multi-signal detectors.
#[derive(Clone, Copy, Debug)]
pub struct Signal<'a> {
    pub name: &'a str,
    pub values: &'a [f64],
}

/// Pearson over the common prefix of two series of possibly different length.
fn prefix_pearson(a: &[f64], b: &[f64]) -> f64 {
    let n = a.len().min(b.len());
    pearson(&a[..n], &b[..n])
}

/// Map a series onto [0, 1]. A flat series maps to 0.5.
fn unit_scale(x: &[f64]) -> Vec<f64> {
    match min_max(x) {
        Some((lo, hi)) if hi - lo > EPSILON => x.iter().map(|v| (v - lo) / (hi - lo)).collect(),
        _ => vec![0.5; x.len()],
    }
}

/// Indices strictly greater than both neighbors.
pub fn find_peaks(x: &[f64]) -> Vec<usize> {
    if x.len() < 3 {
        return Vec::new();
    }
    (1..x.len() - 1)
        .filter(|&i| x[i] > x[i - 1] && x[i] > x[i + 1])
        .collect()
}

/// Runs the generic detectors against one set of thresholds.
#[derive(Clone, Debug, Default)]
pub struct PatternDetector {
    thresholds: PatternThresholds,
}

impl PatternDetector {
    pub fn new(thresholds: PatternThresholds) -> Self {
        Self { thresholds }
    }

    pub fn thresholds(&self) -> &PatternThresholds {
        &self.thresholds
    }

    /// Local peaks of |cross-correlation| above the resonance threshold.
    ///
    /// A lag qualifies only when its magnitude is strictly greater than both
    /// neighboring lags, so the outermost lags and flat plateaus never do.
    pub fn resonance(&self, primary: Signal<'_>, secondary: Signal<'_>) -> Vec<CorrelationPattern> {
        let curve = cross_correlation(
            primary.values,
            secondary.values,
            self.thresholds.resonance_max_lag,
        );
        if curve.len() < 3 {
            return Vec::new();
        }

        let mut out = Vec::new();
        for i in 1..curve.len() - 1 {
            let (lag, r) = curve[i];
            let mag = r.abs();
            if mag > self.thresholds.resonance_threshold
                && mag > curve[i - 1].1.abs()
                && mag > curve[i + 1].1.abs()
            {
                out.push(
                    CorrelationPattern::new(
                        format!("resonance-lag-{lag}"),
                        PatternType::Resonance,
                        mag,
                        format!(
                            "{} and {} resonate at lag {lag} (r = {r:.3})",
                            primary.name, secondary.name
                        ),
                    )
                    .with_entities(vec![primary.name.to_string(), secondary.name.to_string()]),
                );
            }
        }
        out
    }

    /// Flood-fill clusters in the unit-scaled scatter of `(x[i], y[i])`, then
    /// report clusters whose local correlation is strong.
    ///
    /// `entities[i]` names sample `i`; missing names fall back to the index.
    pub fn coupling(&self, x: &[f64], y: &[f64], entities: &[String]) -> Vec<CorrelationPattern> {
        let n = x.len().min(y.len());
        if n < self.thresholds.coupling_min_points {
            return Vec::new();
        }
        let xs = unit_scale(&x[..n]);
        let ys = unit_scale(&y[..n]);
        let eps2 = self.thresholds.coupling_eps * self.thresholds.coupling_eps;
        let near = |a: usize, b: usize| {
            let dx = xs[a] - xs[b];
            let dy = ys[a] - ys[b];
            dx * dx + dy * dy <= eps2
        };

        let mut cluster_of = vec![usize::MAX; n];
        let mut clusters: Vec<Vec<usize>> = Vec::new();
        for seed in 0..n {
            if cluster_of[seed] != usize::MAX {
                continue;
            }
            let id = clusters.len();
            let mut members = vec![seed];
            cluster_of[seed] = id;
            let mut queue = VecDeque::from([seed]);
            while let Some(cur) = queue.pop_front() {
                for other in 0..n {
                    if cluster_of[other] == usize::MAX && near(cur, other) {
                        cluster_of[other] = id;
                        members.push(other);
                        queue.push_back(other);
                    }
                }
            }
            members.sort_unstable();
            clusters.push(members);
        }

        let mut out = Vec::new();
        for (k, members) in clusters.iter().enumerate() {
            if members.len() < self.thresholds.coupling_min_points {
                continue;
            }
            let cx: Vec<f64> = members.iter().map(|&i| x[i]).collect();
            let cy: Vec<f64> = members.iter().map(|&i| y[i]).collect();
            let r = pearson(&cx, &cy);
            if r.abs() <= self.thresholds.coupling_threshold {
                continue;
            }
            let names = members
                .iter()
                .map(|&i| entities.get(i).cloned().unwrap_or_else(|| i.to_string()))
                .collect();
            out.push(
                CorrelationPattern::new(
                    format!("coupling-{k}"),
                    PatternType::Coupling,
                    r.abs(),
                    format!("{} samples locally coupled (r = {r:.3})", members.len()),
                )
                .with_entities(names),
            );
        }
        out
    }

    /// Bursts of peaks in one series.
    ///
    /// Peaks whose index gap is at most `cascade_window` join the same group;
    /// groups of at least `cascade_min_peaks` are cascades.
    pub fn cascade(
        &self,
        channel: Wavelength,
        values: &[f64],
        timestamps: &[f64],
        entities: &[String],
    ) -> Vec<CorrelationPattern> {
        let peaks = find_peaks(values);
        if peaks.is_empty() {
            return Vec::new();
        }

        let mut groups: Vec<Vec<usize>> = vec![vec![peaks[0]]];
        for pair in peaks.windows(2) {
            if pair[1] - pair[0] <= self.thresholds.cascade_window {
                if let Some(group) = groups.last_mut() {
                    group.push(pair[1]);
                }
            } else {
                groups.push(vec![pair[1]]);
            }
        }

        let time = |i: usize| timestamps.get(i).copied().unwrap_or(i as f64);
        let total = peaks.len() as f64;
        groups
            .iter()
            .filter(|g| g.len() >= self.thresholds.cascade_min_peaks)
            .enumerate()
            .map(|(k, g)| {
                let first = g[0];
                let last = g[g.len() - 1];
                CorrelationPattern::new(
                    format!("cascade-{channel}-{k}"),
                    PatternType::Cascade,
                    g.len() as f64 / total,
                    format!("{} consecutive peaks in {channel}", g.len()),
                )
                .with_entities(
                    g.iter()
                        .map(|&i| entities.get(i).cloned().unwrap_or_else(|| i.to_string()))
                        .collect(),
                )
                .with_span(time(first), time(last))
            })
            .collect()
    }

    /// Balanced information flow in both directions.
    ///
    /// `forward` and `reverse` are transfer entropies in bits; strength is
    /// their mean over the `log2(bins)` ceiling.
    pub fn feedback(
        &self,
        primary: Wavelength,
        secondary: Wavelength,
        forward: f64,
        reverse: f64,
        bins: usize,
    ) -> Option<CorrelationPattern> {
        let min = self.thresholds.feedback_min_entropy;
        if forward <= min || reverse <= min {
            return None;
        }
        let ratio = forward.min(reverse) / forward.max(reverse);
        if ratio <= self.thresholds.feedback_balance {
            return None;
        }
        let ceiling = (bins.max(2) as f64).log2();
        Some(
            CorrelationPattern::new(
                format!("feedback-{primary}-{secondary}"),
                PatternType::Feedback,
                (forward + reverse) / 2.0 / ceiling,
                format!(
                    "bidirectional flow {primary} -> {secondary} {forward:.3} bits, \
                     {secondary} -> {primary} {reverse:.3} bits"
                ),
            )
            .with_entities(vec![primary.to_string(), secondary.to_string()]),
        )
    }

    /// Greedy clustering of mutually correlated signals.
    ///
    /// Each unassigned signal seeds a cluster; a later signal joins when its
    /// correlation with every member exceeds the threshold.
    pub fn synchronization(&self, signals: &[Signal<'_>]) -> Vec<CorrelationPattern> {
        let n = signals.len();
        let mut assigned = vec![false; n];
        let mut out = Vec::new();

        for seed in 0..n {
            if assigned[seed] {
                continue;
            }
            assigned[seed] = true;
            let mut members = vec![seed];
            for cand in (seed + 1)..n {
                if assigned[cand] {
                    continue;
                }
                let joins = members.iter().all(|&m| {
                    prefix_pearson(signals[m].values, signals[cand].values)
                        > self.thresholds.synchronization_threshold
                });
                if joins {
                    assigned[cand] = true;
                    members.push(cand);
                }
            }
            if members.len() < 2 {
                continue;
            }
            let names: Vec<String> = members.iter().map(|&i| signals[i].name.to_string()).collect();
            out.push(
                CorrelationPattern::new(
                    format!("synchronization-{}", out.len()),
                    PatternType::Synchronization,
                    members.len() as f64 / n as f64,
                    format!("synchronized: {}", names.join(", ")),
                )
                .with_entities(names),
            );
        }
        out
    }
}
