//! Multi-channel correlation and manifold projection engine.
//!
//! Takes constraint observations from eight independent wavelength channels,
//! merges them, projects their feature vectors into a bounded 3D world and
//! decorates each point for rendering. Separately, it correlates the
//! channels' native payloads pairwise and mines the results for resonance,
//! coupling, cascade, feedback and synchronization patterns.
//!
//! Zero I/O. Persistence and transport live in other crates.

pub mod channel;
pub mod composite;
pub mod config;
pub mod constants;
pub mod constraint;
pub mod correlation;
pub mod engine;
pub mod manifold;
pub mod metrics;
pub mod patterns;
pub mod pca;
pub mod projection;
pub mod serde_compat;
pub mod time;
pub mod tsne;
pub mod umap;
pub mod visual;

pub use channel::{ChannelData, TimeSeries};
pub use composite::composite_insights;
pub use config::{
    ChannelPair, CompositeThresholds, ConfigError, CorrelationConfig, EngineConfig,
    PatternThresholds, ProjectionConfig, ProjectionMethod,
};
pub use constants::{EPSILON, WORLD_SCALE};
pub use constraint::{
    ConstraintDataPoint, ConstraintType, SessionDataExport, SessionMetrics, Wavelength,
};
pub use correlation::{CorrelationResult, TransferEntropy, VisualizationData, compute_correlation};
pub use engine::{CorrelationEngine, EngineStatistics};
pub use manifold::{
    DatasetStatistics, ManifoldDataset, ManifoldPoint, build_dataset, build_dataset_with_cancel,
    merge, normalize, project, project_with_cancel,
};
pub use patterns::{CorrelationPattern, PatternDetector, PatternType};
pub use projection::{CancelToken, Projection, Projector};
pub use serde_compat::{
    CURRENT_VERSION, export_correlations_json, export_dataset_json, export_sessions_json,
    import_channel_json, import_sessions_json,
};
pub use visual::{ConstraintStatus, Rgb, VisualAttributes};
