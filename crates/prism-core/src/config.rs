//! Engine configuration with documented defaults.
//!
//! Every section deserializes with `#[serde(default)]`, so a partial TOML or
//! JSON document only needs the keys it overrides. Values are checked once at
//! the boundary by [`EngineConfig::validate`]; the numeric code downstream
//! assumes a validated config.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::constraint::Wavelength;

#[derive(Debug, Clone, PartialEq)]
pub enum ConfigError {
    OutOfRange {
        field: &'static str,
        value: f64,
        expected: &'static str,
    },
    EmptyPairList,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::OutOfRange {
                field,
                value,
                expected,
            } => write!(f, "invalid {field} = {value}: expected {expected}"),
            ConfigError::EmptyPairList => write!(f, "correlation pair list is empty"),
        }
    }
}

impl std::error::Error for ConfigError {}

fn check(
    ok: bool,
    field: &'static str,
    value: f64,
    expected: &'static str,
) -> Result<(), ConfigError> {
    if ok {
        Ok(())
    } else {
        Err(ConfigError::OutOfRange {
            field,
            value,
            expected,
        })
    }
}

/// The joint histogram is `bins * bins` cells.
const MAX_BINS: usize = 1024;

fn check_unit(field: &'static str, value: f64) -> Result<(), ConfigError> {
    check((0.0..=1.0).contains(&value), field, value, "a value in [0, 1]")
}

/// Which projector maps feature vectors to 3D.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ProjectionMethod {
    #[default]
    Pca,
    Umap,
    Tsne,
    /// Anything else. Projection falls back to the first three raw dimensions.
    #[serde(other)]
    Unsupported,
}

impl ProjectionMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pca => "pca",
            Self::Umap => "umap",
            Self::Tsne => "tsne",
            Self::Unsupported => "unsupported",
        }
    }
}

impl fmt::Display for ProjectionMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProjectionMethod {
    type Err = String;

    /// Never fails: unknown names map to `Unsupported` so the caller gets the
    /// logged raw-dimension fallback instead of an error.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.trim().to_lowercase().as_str() {
            "pca" => Self::Pca,
            "umap" => Self::Umap,
            "tsne" | "t-sne" => Self::Tsne,
            _ => Self::Unsupported,
        })
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PcaParams {
    /// Principal components to extract, 1..=3. Missing axes project to 0.
    pub n_components: usize,
}

impl Default for PcaParams {
    fn default() -> Self {
        Self { n_components: 3 }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UmapParams {
    pub n_neighbors: usize,
    pub min_dist: f64,
    pub n_epochs: usize,
    /// Initial learning rate, annealed linearly to 0.
    pub learning_rate: f64,
}

impl Default for UmapParams {
    fn default() -> Self {
        Self {
            n_neighbors: 15,
            min_dist: 0.1,
            n_epochs: 100,
            learning_rate: 1.0,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TsneParams {
    pub perplexity: f64,
    pub learning_rate: f64,
    pub n_iterations: usize,
}

impl Default for TsneParams {
    fn default() -> Self {
        Self {
            perplexity: 30.0,
            learning_rate: 200.0,
            n_iterations: 1000,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectionConfig {
    pub method: ProjectionMethod,
    /// Seed for the UMAP/t-SNE initialization.
    pub seed: u64,
    pub pca: PcaParams,
    pub umap: UmapParams,
    pub tsne: TsneParams,
}

impl Default for ProjectionConfig {
    fn default() -> Self {
        Self {
            method: ProjectionMethod::default(),
            seed: 42,
            pca: PcaParams::default(),
            umap: UmapParams::default(),
            tsne: TsneParams::default(),
        }
    }
}

impl ProjectionConfig {
    pub fn with_method(method: ProjectionMethod) -> Self {
        Self {
            method,
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let n = self.pca.n_components;
        check((1..=3).contains(&n), "pca.n_components", n as f64, "1..=3")?;
        check(
            self.umap.n_neighbors >= 1,
            "umap.n_neighbors",
            self.umap.n_neighbors as f64,
            "at least 1",
        )?;
        check(
            self.umap.min_dist >= 0.0 && self.umap.min_dist.is_finite(),
            "umap.min_dist",
            self.umap.min_dist,
            "a finite value >= 0",
        )?;
        check(
            self.umap.n_epochs >= 1,
            "umap.n_epochs",
            self.umap.n_epochs as f64,
            "at least 1",
        )?;
        check(
            self.umap.learning_rate > 0.0 && self.umap.learning_rate.is_finite(),
            "umap.learning_rate",
            self.umap.learning_rate,
            "a finite value > 0",
        )?;
        check(
            self.tsne.perplexity > 0.0 && self.tsne.perplexity.is_finite(),
            "tsne.perplexity",
            self.tsne.perplexity,
            "a finite value > 0",
        )?;
        check(
            self.tsne.learning_rate > 0.0 && self.tsne.learning_rate.is_finite(),
            "tsne.learning_rate",
            self.tsne.learning_rate,
            "a finite value > 0",
        )?;
        check(
            self.tsne.n_iterations >= 1,
            "tsne.n_iterations",
            self.tsne.n_iterations as f64,
            "at least 1",
        )
    }
}

/// Thresholds for the generic time-series pattern detectors.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PatternThresholds {
    /// Cross-correlation lags scanned on each side of zero.
    pub resonance_max_lag: usize,
    pub resonance_threshold: f64,
    /// Flood-fill radius in normalized scatter space.
    pub coupling_eps: f64,
    pub coupling_min_points: usize,
    pub coupling_threshold: f64,
    /// Peaks closer than this many steps belong to one cascade.
    pub cascade_window: usize,
    pub cascade_min_peaks: usize,
    pub feedback_min_entropy: f64,
    pub feedback_balance: f64,
    pub synchronization_threshold: f64,
}

impl Default for PatternThresholds {
    fn default() -> Self {
        Self {
            resonance_max_lag: 30,
            resonance_threshold: 0.7,
            coupling_eps: 0.2,
            coupling_min_points: 3,
            coupling_threshold: 0.6,
            cascade_window: 5,
            cascade_min_peaks: 3,
            feedback_min_entropy: 0.1,
            feedback_balance: 0.3,
            synchronization_threshold: 0.8,
        }
    }
}

impl PatternThresholds {
    pub fn validate(&self) -> Result<(), ConfigError> {
        check_unit("resonance_threshold", self.resonance_threshold)?;
        check(
            self.coupling_eps > 0.0 && self.coupling_eps.is_finite(),
            "coupling_eps",
            self.coupling_eps,
            "a finite value > 0",
        )?;
        check(
            self.coupling_min_points >= 2,
            "coupling_min_points",
            self.coupling_min_points as f64,
            "at least 2",
        )?;
        check_unit("coupling_threshold", self.coupling_threshold)?;
        check(
            self.cascade_min_peaks >= 2,
            "cascade_min_peaks",
            self.cascade_min_peaks as f64,
            "at least 2",
        )?;
        check(
            self.feedback_min_entropy >= 0.0 && self.feedback_min_entropy.is_finite(),
            "feedback_min_entropy",
            self.feedback_min_entropy,
            "a finite value >= 0",
        )?;
        check_unit("feedback_balance", self.feedback_balance)?;
        check_unit("synchronization_threshold", self.synchronization_threshold)
    }
}

/// Thresholds for the channel-pair composite detectors.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompositeThresholds {
    /// Relative distance from the 24h/12h frequency still counted as circadian.
    pub circadian_tolerance: f64,
    pub circadian_amplitude: f64,
    pub daily_strength: f64,
    pub coherence_fitness_coupling: f64,
    pub high_coherence: f64,
    pub tunneling_min_states: usize,
    pub tunneling_min_attractors: usize,
    pub high_frequency_share: f64,
    /// Thermal cells hotter than this multiple of the channel mean are hot spots.
    pub hot_spot_factor: f64,
}

impl Default for CompositeThresholds {
    fn default() -> Self {
        Self {
            circadian_tolerance: 0.1,
            circadian_amplitude: 0.5,
            daily_strength: 0.7,
            coherence_fitness_coupling: 0.5,
            high_coherence: 0.8,
            tunneling_min_states: 2,
            tunneling_min_attractors: 2,
            high_frequency_share: 0.3,
            hot_spot_factor: 1.5,
        }
    }
}

impl CompositeThresholds {
    pub fn validate(&self) -> Result<(), ConfigError> {
        check_unit("circadian_tolerance", self.circadian_tolerance)?;
        check_unit("daily_strength", self.daily_strength)?;
        check_unit("coherence_fitness_coupling", self.coherence_fitness_coupling)?;
        check_unit("high_coherence", self.high_coherence)?;
        check_unit("high_frequency_share", self.high_frequency_share)?;
        check(
            self.tunneling_min_states >= 1,
            "tunneling_min_states",
            self.tunneling_min_states as f64,
            "at least 1",
        )?;
        check(
            self.tunneling_min_attractors >= 1,
            "tunneling_min_attractors",
            self.tunneling_min_attractors as f64,
            "at least 1",
        )?;
        check(
            self.hot_spot_factor >= 1.0 && self.hot_spot_factor.is_finite(),
            "hot_spot_factor",
            self.hot_spot_factor,
            "a finite value >= 1",
        )
    }
}

/// An ordered channel pair. The cache key form is `"primary-secondary"`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ChannelPair {
    pub primary: Wavelength,
    pub secondary: Wavelength,
}

impl ChannelPair {
    pub fn new(primary: Wavelength, secondary: Wavelength) -> Self {
        Self { primary, secondary }
    }

    pub fn involves(&self, channel: Wavelength) -> bool {
        self.primary == channel || self.secondary == channel
    }
}

impl fmt::Display for ChannelPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.primary, self.secondary)
    }
}

fn default_pairs() -> Vec<ChannelPair> {
    use Wavelength::*;
    vec![
        ChannelPair::new(Temporal, Spectral),
        ChannelPair::new(Quantum, Evolutionary),
        ChannelPair::new(Spectral, Thermodynamic),
        ChannelPair::new(Topological, Gravitational),
        ChannelPair::new(Phase, Temporal),
    ]
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CorrelationConfig {
    /// Bin count for mutual information and transfer entropy.
    pub bins: usize,
    pub transfer_entropy_lag: usize,
    /// Samples fed to the coherence spectrum.
    pub coherence_window: usize,
    /// Cells per side of the visualization density grid and correlation surface.
    pub grid_resolution: usize,
    pub pairs: Vec<ChannelPair>,
    pub patterns: PatternThresholds,
    pub composite: CompositeThresholds,
}

impl Default for CorrelationConfig {
    fn default() -> Self {
        Self {
            bins: 10,
            transfer_entropy_lag: 1,
            coherence_window: 64,
            grid_resolution: 10,
            pairs: default_pairs(),
            patterns: PatternThresholds::default(),
            composite: CompositeThresholds::default(),
        }
    }
}

impl CorrelationConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        check(
            (2..=MAX_BINS).contains(&self.bins),
            "bins",
            self.bins as f64,
            "between 2 and 1024",
        )?;
        check(
            self.transfer_entropy_lag >= 1,
            "transfer_entropy_lag",
            self.transfer_entropy_lag as f64,
            "at least 1",
        )?;
        check(
            self.coherence_window >= 2,
            "coherence_window",
            self.coherence_window as f64,
            "at least 2",
        )?;
        check(
            self.grid_resolution >= 2,
            "grid_resolution",
            self.grid_resolution as f64,
            "at least 2",
        )?;
        if self.pairs.is_empty() {
            return Err(ConfigError::EmptyPairList);
        }
        self.patterns.validate()?;
        self.composite.validate()
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub projection: ProjectionConfig,
    pub correlation: CorrelationConfig,
}

impl EngineConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.projection.validate()?;
        self.correlation.validate()
    }
}
