/// Numerical epsilon for near-zero comparisons and denominator guards
pub const EPSILON: f64 = 1e-10;

/// Half-extent of the world cube: projected axes land in [-WORLD_SCALE, WORLD_SCALE]
pub const WORLD_SCALE: f64 = 5.0;

/// Number of output axes for every projector
pub const OUTPUT_DIMS: usize = 3;

/// Power iteration budget per principal component
pub const PCA_MAX_ITERATIONS: usize = 100;

/// Power iteration stops when the iterate's magnitude falls below this
pub const PCA_MIN_MAGNITUDE: f64 = 1e-10;

/// Non-neighbors sampled for repulsion per point per UMAP epoch
pub const UMAP_NEGATIVE_SAMPLES: usize = 5;

/// Largest per-axis step applied to an embedding coordinate in one update
pub const MAX_STEP: f64 = 4.0;

/// t-SNE switches from initial to final momentum at this iteration
pub const TSNE_MOMENTUM_SWITCH: usize = 250;

/// Severity above which a constraint is rendered opaque
pub const OPAQUE_SEVERITY: f64 = 0.5;

/// Severity above which a constraint is critical and glows
pub const CRITICAL_SEVERITY: f64 = 0.8;

/// Share of the type base color in the blended point color (the rest is channel tint)
pub const BASE_COLOR_SHARE: f64 = 0.7;
