use serde::{Deserialize, Serialize};

use crate::constants::{BASE_COLOR_SHARE, CRITICAL_SEVERITY, OPAQUE_SEVERITY};
use crate::constraint::{ConstraintType, Wavelength};

/// Linear RGB color, each channel in [0, 1].
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Rgb {
    pub r: f64,
    pub g: f64,
    pub b: f64,
}

impl Rgb {
    pub const fn new(r: f64, g: f64, b: f64) -> Self {
        Self { r, g, b }
    }

    /// `share` of `self` plus `1 - share` of `other`.
    pub fn blend(self, other: Self, share: f64) -> Self {
        let mix = |a: f64, b: f64| a * share + b * (1.0 - share);
        Self {
            r: mix(self.r, other.r),
            g: mix(self.g, other.g),
            b: mix(self.b, other.b),
        }
    }
}

pub fn type_color(t: ConstraintType) -> Rgb {
    match t {
        ConstraintType::Regulatory => Rgb::new(0.90, 0.20, 0.20),
        ConstraintType::Fairness => Rgb::new(0.20, 0.60, 0.90),
        ConstraintType::Fatigue => Rgb::new(0.95, 0.60, 0.10),
        ConstraintType::Temporal => Rgb::new(0.60, 0.30, 0.90),
        ConstraintType::Preference => Rgb::new(0.30, 0.85, 0.40),
        ConstraintType::Coverage => Rgb::new(0.95, 0.85, 0.20),
        ConstraintType::Skill => Rgb::new(0.10, 0.80, 0.80),
        ConstraintType::Custom => Rgb::new(0.70, 0.70, 0.70),
    }
}

pub fn channel_tint(w: Wavelength) -> Rgb {
    match w {
        Wavelength::Quantum => Rgb::new(0.55, 0.35, 1.00),
        Wavelength::Temporal => Rgb::new(0.20, 0.75, 1.00),
        Wavelength::Topological => Rgb::new(0.35, 1.00, 0.55),
        Wavelength::Spectral => Rgb::new(1.00, 0.40, 0.80),
        Wavelength::Evolutionary => Rgb::new(0.60, 0.90, 0.20),
        Wavelength::Gravitational => Rgb::new(0.40, 0.40, 0.60),
        Wavelength::Phase => Rgb::new(1.00, 0.85, 0.35),
        Wavelength::Thermodynamic => Rgb::new(1.00, 0.35, 0.15),
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VisualAttributes {
    pub color: Rgb,
    pub opacity: f64,
    pub size: f64,
    pub glow_intensity: f64,
}

impl VisualAttributes {
    /// Deterministic styling from category, channel and severity.
    pub fn derive(t: ConstraintType, channel: Wavelength, severity: f64) -> Self {
        Self {
            color: type_color(t).blend(channel_tint(channel), BASE_COLOR_SHARE),
            opacity: if severity > OPAQUE_SEVERITY { 1.0 } else { 0.6 },
            size: 0.1 + severity * 0.2,
            glow_intensity: if severity > CRITICAL_SEVERITY { 1.0 } else { 0.3 },
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConstraintStatus {
    pub is_satisfied: bool,
    pub is_violated: bool,
    pub is_critical: bool,
    pub tension: f64,
}

impl ConstraintStatus {
    pub fn derive(severity: f64, weight: f64) -> Self {
        Self {
            is_satisfied: severity == 0.0,
            is_violated: severity > 0.0,
            is_critical: severity > CRITICAL_SEVERITY,
            tension: weight * severity,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_blend_weights() {
        let c = Rgb::new(1.0, 0.0, 0.0).blend(Rgb::new(0.0, 0.0, 1.0), 0.7);
        assert_abs_diff_eq!(c.r, 0.7, epsilon = 1e-12);
        assert_abs_diff_eq!(c.b, 0.3, epsilon = 1e-12);
    }

    #[test]
    fn test_visual_thresholds() {
        let low = VisualAttributes::derive(ConstraintType::Skill, Wavelength::Phase, 0.5);
        assert_eq!(low.opacity, 0.6);
        assert_eq!(low.glow_intensity, 0.3);
        assert_abs_diff_eq!(low.size, 0.2, epsilon = 1e-12);

        let high = VisualAttributes::derive(ConstraintType::Skill, Wavelength::Phase, 0.81);
        assert_eq!(high.opacity, 1.0);
        assert_eq!(high.glow_intensity, 1.0);
    }

    #[test]
    fn test_color_is_type_dominated() {
        let a = VisualAttributes::derive(ConstraintType::Regulatory, Wavelength::Quantum, 0.0);
        let b = VisualAttributes::derive(ConstraintType::Regulatory, Wavelength::Temporal, 0.0);
        let expected_r = 0.9 * 0.7 + 0.55 * 0.3;
        assert_abs_diff_eq!(a.color.r, expected_r, epsilon = 1e-12);
        assert_ne!(a.color, b.color);
    }

    #[test]
    fn test_status_flags() {
        let ok = ConstraintStatus::derive(0.0, 1.0);
        assert!(ok.is_satisfied && !ok.is_violated && !ok.is_critical);
        let bad = ConstraintStatus::derive(0.9, 0.5);
        assert!(!bad.is_satisfied && bad.is_violated && bad.is_critical);
        assert_abs_diff_eq!(bad.tension, 0.45, epsilon = 1e-12);
    }
}
