//! Native payloads of the eight wavelength channels.
//!
//! Each channel ships its own shape. The engine never inspects a payload
//! directly; it asks for [`ChannelData::extract_time_series`] and, for the
//! composite detectors, matches on the variant.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::constraint::Wavelength;

/// A channel's canonical numeric series.
///
/// `timestamps` is parallel to `values` when the payload carries time, and
/// falls back to the sample index otherwise. `entities` names the payload
/// element behind each sample.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TimeSeries {
    pub values: Vec<f64>,
    pub timestamps: Vec<f64>,
    pub entities: Vec<String>,
}

impl TimeSeries {
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    fn indexed(values: Vec<f64>, entities: Vec<String>) -> Self {
        let timestamps = (0..values.len()).map(|i| i as f64).collect();
        Self {
            values,
            timestamps,
            entities,
        }
    }

    /// Keep the first `n` samples.
    pub fn truncate(&mut self, n: usize) {
        self.values.truncate(n);
        self.timestamps.truncate(n);
        self.entities.truncate(n);
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuantumState {
    pub id: String,
    pub coherence: f64,
    #[serde(default)]
    pub amplitude: f64,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuantumData {
    #[serde(default)]
    pub states: Vec<QuantumState>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TemporalPoint {
    #[serde(default)]
    pub id: String,
    pub timestamp: f64,
    pub value: f64,
}

/// A recurring pattern found by the temporal channel, e.g. `"daily"`.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TemporalCluster {
    pub id: String,
    pub pattern: String,
    pub strength: f64,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TemporalData {
    #[serde(default)]
    pub series: Vec<TemporalPoint>,
    #[serde(default)]
    pub clusters: Vec<TemporalCluster>,
}

/// A persistent homology feature alive over `[birth, death)`.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TopologicalFeature {
    pub id: String,
    #[serde(default)]
    pub dimension: usize,
    pub birth: f64,
    pub death: f64,
}

impl TopologicalFeature {
    pub fn persistence(&self) -> f64 {
        (self.death - self.birth).max(0.0)
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TopologicalData {
    #[serde(default)]
    pub features: Vec<TopologicalFeature>,
}

/// Power at one frequency, in cycles per hour.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpectralBin {
    pub frequency: f64,
    pub power: f64,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Harmonic {
    pub frequency: f64,
    pub amplitude: f64,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpectralData {
    #[serde(default)]
    pub spectrum: Vec<SpectralBin>,
    #[serde(default)]
    pub harmonics: Vec<Harmonic>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Generation {
    pub generation: usize,
    pub best_fitness: f64,
    #[serde(default)]
    pub mean_fitness: f64,
}

/// A local optimum of the fitness landscape.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Attractor {
    pub id: String,
    pub fitness: f64,
    #[serde(default)]
    pub basin_size: f64,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvolutionaryData {
    #[serde(default)]
    pub history: Vec<Generation>,
    #[serde(default)]
    pub attractors: Vec<Attractor>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GravityWell {
    pub id: String,
    pub mass: f64,
    #[serde(default)]
    pub position: [f64; 3],
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GravitationalData {
    #[serde(default)]
    pub wells: Vec<GravityWell>,
}

/// Kuramoto-style order parameter sampled over time.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PhaseSample {
    pub timestamp: f64,
    pub order_parameter: f64,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PhaseData {
    #[serde(default)]
    pub samples: Vec<PhaseSample>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ThermalCell {
    pub id: String,
    pub temperature: f64,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ThermodynamicData {
    #[serde(default)]
    pub cells: Vec<ThermalCell>,
}

/// One channel's payload, tagged by wavelength on the wire:
/// `{"channel": "quantum", "data": {...}}`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "channel", content = "data", rename_all = "lowercase")]
pub enum ChannelData {
    Quantum(QuantumData),
    Temporal(TemporalData),
    Topological(TopologicalData),
    Spectral(SpectralData),
    Evolutionary(EvolutionaryData),
    Gravitational(GravitationalData),
    Phase(PhaseData),
    Thermodynamic(ThermodynamicData),
}

impl ChannelData {
    pub fn wavelength(&self) -> Wavelength {
        match self {
            Self::Quantum(_) => Wavelength::Quantum,
            Self::Temporal(_) => Wavelength::Temporal,
            Self::Topological(_) => Wavelength::Topological,
            Self::Spectral(_) => Wavelength::Spectral,
            Self::Evolutionary(_) => Wavelength::Evolutionary,
            Self::Gravitational(_) => Wavelength::Gravitational,
            Self::Phase(_) => Wavelength::Phase,
            Self::Thermodynamic(_) => Wavelength::Thermodynamic,
        }
    }

    /// The channel's canonical series, in payload order.
    pub fn extract_time_series(&self) -> TimeSeries {
        match self {
            Self::Quantum(d) => TimeSeries::indexed(
                d.states.iter().map(|s| s.coherence).collect(),
                d.states.iter().map(|s| s.id.clone()).collect(),
            ),
            Self::Temporal(d) => TimeSeries {
                values: d.series.iter().map(|p| p.value).collect(),
                timestamps: d.series.iter().map(|p| p.timestamp).collect(),
                entities: d
                    .series
                    .iter()
                    .enumerate()
                    .map(|(i, p)| {
                        if p.id.is_empty() {
                            format!("t{i}")
                        } else {
                            p.id.clone()
                        }
                    })
                    .collect(),
            },
            Self::Topological(d) => TimeSeries::indexed(
                d.features.iter().map(TopologicalFeature::persistence).collect(),
                d.features.iter().map(|f| f.id.clone()).collect(),
            ),
            Self::Spectral(d) => TimeSeries {
                values: d.spectrum.iter().map(|b| b.power).collect(),
                timestamps: d.spectrum.iter().map(|b| b.frequency).collect(),
                entities: d
                    .spectrum
                    .iter()
                    .map(|b| format!("f{}", b.frequency))
                    .collect(),
            },
            Self::Evolutionary(d) => TimeSeries {
                values: d.history.iter().map(|g| g.best_fitness).collect(),
                timestamps: d.history.iter().map(|g| g.generation as f64).collect(),
                entities: d
                    .history
                    .iter()
                    .map(|g| format!("gen{}", g.generation))
                    .collect(),
            },
            Self::Gravitational(d) => TimeSeries::indexed(
                d.wells.iter().map(|w| w.mass).collect(),
                d.wells.iter().map(|w| w.id.clone()).collect(),
            ),
            Self::Phase(d) => TimeSeries {
                values: d.samples.iter().map(|s| s.order_parameter).collect(),
                timestamps: d.samples.iter().map(|s| s.timestamp).collect(),
                entities: (0..d.samples.len()).map(|i| format!("s{i}")).collect(),
            },
            Self::Thermodynamic(d) => TimeSeries::indexed(
                d.cells.iter().map(|c| c.temperature).collect(),
                d.cells.iter().map(|c| c.id.clone()).collect(),
            ),
        }
    }

    /// Temporal payload from bare values, timestamps 0..n.
    pub fn temporal_from_values(values: &[f64]) -> Self {
        Self::Temporal(TemporalData {
            series: values
                .iter()
                .enumerate()
                .map(|(i, &value)| TemporalPoint {
                    id: format!("t{i}"),
                    timestamp: i as f64,
                    value,
                })
                .collect(),
            clusters: Vec::new(),
        })
    }

    /// Build a payload of `channel` whose extracted series is `values`.
    ///
    /// Topological persistence cannot be negative: features are born at 0 and
    /// die at `max(v, 0)`, so negative values extract as 0. Every other
    /// channel reproduces `values` exactly.
    pub fn from_values(channel: Wavelength, values: &[f64]) -> Self {
        let ids = |prefix: &str| -> Vec<String> {
            (0..values.len()).map(|i| format!("{prefix}{i}")).collect()
        };
        match channel {
            Wavelength::Temporal => Self::temporal_from_values(values),
            Wavelength::Quantum => Self::Quantum(QuantumData {
                states: ids("q")
                    .into_iter()
                    .zip(values)
                    .map(|(id, &coherence)| QuantumState {
                        id,
                        coherence,
                        amplitude: 0.0,
                    })
                    .collect(),
            }),
            Wavelength::Topological => Self::Topological(TopologicalData {
                features: ids("h")
                    .into_iter()
                    .zip(values)
                    .map(|(id, &v)| TopologicalFeature {
                        id,
                        dimension: 0,
                        birth: 0.0,
                        death: v.max(0.0),
                    })
                    .collect(),
            }),
            Wavelength::Spectral => Self::Spectral(SpectralData {
                spectrum: values
                    .iter()
                    .enumerate()
                    .map(|(i, &power)| SpectralBin {
                        frequency: (i + 1) as f64,
                        power,
                    })
                    .collect(),
                harmonics: Vec::new(),
            }),
            Wavelength::Evolutionary => Self::Evolutionary(EvolutionaryData {
                history: values
                    .iter()
                    .enumerate()
                    .map(|(generation, &best_fitness)| Generation {
                        generation,
                        best_fitness,
                        mean_fitness: best_fitness,
                    })
                    .collect(),
                attractors: Vec::new(),
            }),
            Wavelength::Gravitational => Self::Gravitational(GravitationalData {
                wells: ids("w")
                    .into_iter()
                    .zip(values)
                    .map(|(id, &mass)| GravityWell {
                        id,
                        mass,
                        position: [0.0; 3],
                    })
                    .collect(),
            }),
            Wavelength::Phase => Self::Phase(PhaseData {
                samples: values
                    .iter()
                    .enumerate()
                    .map(|(i, &order_parameter)| PhaseSample {
                        timestamp: i as f64,
                        order_parameter,
                    })
                    .collect(),
            }),
            Wavelength::Thermodynamic => Self::Thermodynamic(ThermodynamicData {
                cells: ids("c")
                    .into_iter()
                    .zip(values)
                    .map(|(id, &temperature)| ThermalCell { id, temperature })
                    .collect(),
            }),
        }
    }

    /// Count of elements per collection, for summaries.
    pub fn summary(&self) -> BTreeMap<&'static str, usize> {
        let mut out = BTreeMap::new();
        match self {
            Self::Quantum(d) => {
                out.insert("states", d.states.len());
            }
            Self::Temporal(d) => {
                out.insert("series", d.series.len());
                out.insert("clusters", d.clusters.len());
            }
            Self::Topological(d) => {
                out.insert("features", d.features.len());
            }
            Self::Spectral(d) => {
                out.insert("spectrum", d.spectrum.len());
                out.insert("harmonics", d.harmonics.len());
            }
            Self::Evolutionary(d) => {
                out.insert("history", d.history.len());
                out.insert("attractors", d.attractors.len());
            }
            Self::Gravitational(d) => {
                out.insert("wells", d.wells.len());
            }
            Self::Phase(d) => {
                out.insert("samples", d.samples.len());
            }
            Self::Thermodynamic(d) => {
                out.insert("cells", d.cells.len());
            }
        }
        out
    }
}
