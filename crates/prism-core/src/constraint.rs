use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// An independent analysis subsystem producing constraint observations.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Wavelength {
    Quantum,
    Temporal,
    Topological,
    Spectral,
    Evolutionary,
    Gravitational,
    Phase,
    Thermodynamic,
}

impl Wavelength {
    pub const ALL: [Wavelength; 8] = [
        Self::Quantum,
        Self::Temporal,
        Self::Topological,
        Self::Spectral,
        Self::Evolutionary,
        Self::Gravitational,
        Self::Phase,
        Self::Thermodynamic,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Quantum => "quantum",
            Self::Temporal => "temporal",
            Self::Topological => "topological",
            Self::Spectral => "spectral",
            Self::Evolutionary => "evolutionary",
            Self::Gravitational => "gravitational",
            Self::Phase => "phase",
            Self::Thermodynamic => "thermodynamic",
        }
    }
}

impl fmt::Display for Wavelength {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Wavelength {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_lowercase();
        Self::ALL
            .iter()
            .copied()
            .find(|w| w.as_str() == lower)
            .ok_or_else(|| format!("unknown wavelength channel '{s}'"))
    }
}

/// Category of a constraint. Unrecognized categories collapse to `Custom`.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "lowercase")]
pub enum ConstraintType {
    Regulatory,
    Fairness,
    Fatigue,
    Temporal,
    Preference,
    Coverage,
    Skill,
    #[default]
    #[serde(other)]
    Custom,
}

impl ConstraintType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Regulatory => "regulatory",
            Self::Fairness => "fairness",
            Self::Fatigue => "fatigue",
            Self::Temporal => "temporal",
            Self::Preference => "preference",
            Self::Coverage => "coverage",
            Self::Skill => "skill",
            Self::Custom => "custom",
        }
    }

    pub fn from_str_lossy(s: &str) -> Self {
        match s {
            "regulatory" => Self::Regulatory,
            "fairness" => Self::Fairness,
            "fatigue" => Self::Fatigue,
            "temporal" => Self::Temporal,
            "preference" => Self::Preference,
            "coverage" => Self::Coverage,
            "skill" => Self::Skill,
            _ => Self::Custom,
        }
    }
}

/// One observation produced by a channel.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConstraintDataPoint {
    pub id: String,
    #[serde(rename = "type", default)]
    pub constraint_type: ConstraintType,
    pub channel: Wavelength,
    pub dimensions: Vec<f64>,
    pub severity: f64,
    #[serde(default = "default_weight")]
    pub weight: f64,
    /// Related external ids, opaque to the engine.
    #[serde(default)]
    pub entities: BTreeMap<String, Vec<String>>,
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub metadata: BTreeMap<String, serde_json::Value>,
    /// Unix milliseconds.
    #[serde(default)]
    pub timestamp: u64,
}

fn default_weight() -> f64 {
    1.0
}

impl ConstraintDataPoint {
    pub fn new(id: impl Into<String>, channel: Wavelength, dimensions: Vec<f64>) -> Self {
        Self {
            id: id.into(),
            constraint_type: ConstraintType::default(),
            channel,
            dimensions,
            severity: 0.0,
            weight: default_weight(),
            entities: BTreeMap::new(),
            label: String::new(),
            metadata: BTreeMap::new(),
            timestamp: 0,
        }
    }

    pub fn with_type(mut self, constraint_type: ConstraintType) -> Self {
        self.constraint_type = constraint_type;
        self
    }

    pub fn with_severity(mut self, severity: f64) -> Self {
        self.severity = severity;
        self
    }

    pub fn with_weight(mut self, weight: f64) -> Self {
        self.weight = weight;
        self
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    /// weight × severity
    pub fn tension(&self) -> f64 {
        self.weight * self.severity
    }
}

/// Summary counters a producing subsystem attaches to its export.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SessionMetrics {
    pub total_constraints: usize,
    pub satisfied_count: usize,
    pub violated_count: usize,
    pub critical_count: usize,
    pub average_severity: f64,
    pub average_tension: f64,
}

impl SessionMetrics {
    /// Recompute the counters from a constraint list.
    pub fn from_constraints(constraints: &[ConstraintDataPoint]) -> Self {
        let total = constraints.len();
        if total == 0 {
            return Self::default();
        }
        let satisfied = constraints.iter().filter(|c| c.severity == 0.0).count();
        let violated = constraints.iter().filter(|c| c.severity > 0.0).count();
        let critical = constraints
            .iter()
            .filter(|c| c.severity > crate::constants::CRITICAL_SEVERITY)
            .count();
        let severity_sum: f64 = constraints.iter().map(|c| c.severity).sum();
        let tension_sum: f64 = constraints.iter().map(|c| c.tension()).sum();
        Self {
            total_constraints: total,
            satisfied_count: satisfied,
            violated_count: violated,
            critical_count: critical,
            average_severity: severity_sum / total as f64,
            average_tension: tension_sum / total as f64,
        }
    }
}

/// One producing subsystem's snapshot. `session_name` is the channel.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionDataExport {
    pub session_id: String,
    pub session_name: Wavelength,
    #[serde(default)]
    pub timestamp: u64,
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub constraints: Vec<ConstraintDataPoint>,
    #[serde(default)]
    pub metrics: SessionMetrics,
}

impl SessionDataExport {
    pub fn new(
        session_id: impl Into<String>,
        channel: Wavelength,
        timestamp: u64,
        constraints: Vec<ConstraintDataPoint>,
    ) -> Self {
        let metrics = SessionMetrics::from_constraints(&constraints);
        Self {
            session_id: session_id.into(),
            session_name: channel,
            timestamp,
            version: crate::serde_compat::CURRENT_VERSION.to_string(),
            constraints,
            metrics,
        }
    }

    pub fn channel(&self) -> Wavelength {
        self.session_name
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wavelength_parse_roundtrip() {
        for w in Wavelength::ALL {
            assert_eq!(w.as_str().parse::<Wavelength>().unwrap(), w);
        }
        assert_eq!(" Spectral ".parse::<Wavelength>().unwrap(), Wavelength::Spectral);
        assert!("infrared".parse::<Wavelength>().is_err());
    }

    #[test]
    fn test_unknown_type_is_custom() {
        let json = r#"{"id":"c1","type":"budget","channel":"phase","dimensions":[1.0],"severity":0.2}"#;
        let point: ConstraintDataPoint = serde_json::from_str(json).unwrap();
        assert_eq!(point.constraint_type, ConstraintType::Custom);
        assert_eq!(point.weight, 1.0);
        assert!(point.entities.is_empty());
    }

    #[test]
    fn test_type_lossy_parse() {
        assert_eq!(ConstraintType::from_str_lossy("fatigue"), ConstraintType::Fatigue);
        assert_eq!(ConstraintType::from_str_lossy("???"), ConstraintType::Custom);
        assert_eq!(ConstraintType::Skill.as_str(), "skill");
    }

    #[test]
    fn test_metrics_from_constraints() {
        let constraints = vec![
            ConstraintDataPoint::new("a", Wavelength::Quantum, vec![1.0]),
            ConstraintDataPoint::new("b", Wavelength::Quantum, vec![1.0])
                .with_severity(0.5)
                .with_weight(0.5),
            ConstraintDataPoint::new("c", Wavelength::Quantum, vec![1.0]).with_severity(0.9),
        ];
        let m = SessionMetrics::from_constraints(&constraints);
        assert_eq!(m.total_constraints, 3);
        assert_eq!(m.satisfied_count, 1);
        assert_eq!(m.violated_count, 2);
        assert_eq!(m.critical_count, 1);
        assert!((m.average_severity - 1.4 / 3.0).abs() < 1e-12);
        assert!((m.average_tension - (0.25 + 0.9) / 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_export_camel_case_wire() {
        let export = SessionDataExport::new("s1", Wavelength::Temporal, 42, Vec::new());
        let json = serde_json::to_value(&export).unwrap();
        assert_eq!(json["sessionName"], "temporal");
        assert_eq!(json["sessionId"], "s1");
        assert!(json["metrics"].get("totalConstraints").is_some());
    }
}
