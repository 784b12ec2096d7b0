//! Channel payloads in, cached pair results out.
//!
//! One engine is one logical session. It is not internally synchronized;
//! callers serialize access.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::channel::ChannelData;
use crate::composite::composite_insights;
use crate::config::{ChannelPair, CorrelationConfig};
use crate::constraint::Wavelength;
use crate::correlation::{CorrelationResult, compute_correlation};

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineStatistics {
    /// Channels holding data, in wavelength order.
    pub channels_loaded: Vec<Wavelength>,
    pub cache_size: usize,
    /// Cached pair with the largest |correlation|.
    pub strongest_pair: Option<ChannelPair>,
    pub strongest_correlation: f64,
    pub total_patterns: usize,
}

#[derive(Debug, Default)]
pub struct CorrelationEngine {
    config: CorrelationConfig,
    channel_data: HashMap<Wavelength, ChannelData>,
    correlation_cache: HashMap<ChannelPair, CorrelationResult>,
}

impl CorrelationEngine {
    pub fn new(config: CorrelationConfig) -> Self {
        Self {
            config,
            channel_data: HashMap::new(),
            correlation_cache: HashMap::new(),
        }
    }

    pub fn config(&self) -> &CorrelationConfig {
        &self.config
    }

    pub fn channel_data(&self, channel: Wavelength) -> Option<&ChannelData> {
        self.channel_data.get(&channel)
    }

    /// Replace a channel's payload and drop every cached pair that mentions it.
    pub fn update_channel_data(&mut self, data: ChannelData) {
        let channel = data.wavelength();
        self.channel_data.insert(channel, data);

        let before = self.correlation_cache.len();
        self.correlation_cache.retain(|pair, _| !pair.involves(channel));
        let dropped = before - self.correlation_cache.len();
        tracing::debug!(%channel, dropped, "channel data updated");
    }

    /// Cached or freshly computed result; `None` while either channel has no data.
    pub fn get_correlation(&mut self, pair: ChannelPair) -> Option<CorrelationResult> {
        if let Some(hit) = self.correlation_cache.get(&pair) {
            tracing::debug!(pair = %pair, "correlation cache hit");
            return Some(hit.clone());
        }

        let primary = self.channel_data.get(&pair.primary)?;
        let secondary = self.channel_data.get(&pair.secondary)?;

        let mut result = compute_correlation(
            pair,
            &primary.extract_time_series(),
            &secondary.extract_time_series(),
            &self.config,
        );
        result
            .patterns
            .extend(composite_insights(primary, secondary, &self.config.composite));

        tracing::debug!(
            pair = %pair,
            samples = result.sample_count,
            correlation = result.correlation,
            patterns = result.patterns.len(),
            "correlation computed"
        );
        self.correlation_cache.insert(pair, result.clone());
        Some(result)
    }

    /// Results for every pair that can be computed, in input order.
    pub fn get_all_correlations(&mut self, pairs: &[ChannelPair]) -> Vec<CorrelationResult> {
        pairs
            .iter()
            .filter_map(|&pair| self.get_correlation(pair))
            .collect()
    }

    /// [`get_all_correlations`](Self::get_all_correlations) over the configured pair list.
    pub fn get_configured_correlations(&mut self) -> Vec<CorrelationResult> {
        let pairs = self.config.pairs.clone();
        self.get_all_correlations(&pairs)
    }

    pub fn get_statistics(&self) -> EngineStatistics {
        let mut channels_loaded: Vec<Wavelength> = self.channel_data.keys().copied().collect();
        channels_loaded.sort();

        // ties resolve to the smallest pair so the answer does not depend on hash order
        let strongest = self.correlation_cache.iter().max_by(|(pa, a), (pb, b)| {
            a.correlation
                .abs()
                .total_cmp(&b.correlation.abs())
                .then_with(|| pb.cmp(pa))
        });

        EngineStatistics {
            channels_loaded,
            cache_size: self.correlation_cache.len(),
            strongest_pair: strongest.map(|(pair, _)| *pair),
            strongest_correlation: strongest.map_or(0.0, |(_, r)| r.correlation),
            total_patterns: self
                .correlation_cache
                .values()
                .map(|r| r.patterns.len())
                .sum(),
        }
    }

    pub fn clear_cache(&mut self) {
        tracing::debug!(entries = self.correlation_cache.len(), "correlation cache cleared");
        self.correlation_cache.clear();
    }

    pub fn cache_len(&self) -> usize {
        self.correlation_cache.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::{Harmonic, SpectralBin, SpectralData};

    fn engine() -> CorrelationEngine {
        CorrelationEngine::new(CorrelationConfig::default())
    }

    fn pair(a: Wavelength, b: Wavelength) -> ChannelPair {
        ChannelPair::new(a, b)
    }

    #[test]
    fn test_missing_channel_is_none() {
        let mut e = engine();
        e.update_channel_data(ChannelData::from_values(Wavelength::Quantum, &[1.0, 2.0]));
        assert!(
            e.get_correlation(pair(Wavelength::Quantum, Wavelength::Phase))
                .is_none()
        );
        assert_eq!(e.cache_len(), 0);
    }

    #[test]
    fn test_result_is_cached() {
        let mut e = engine();
        e.update_channel_data(ChannelData::from_values(Wavelength::Quantum, &[1.0, 2.0, 4.0]));
        e.update_channel_data(ChannelData::from_values(Wavelength::Phase, &[3.0, 1.0, 2.0]));
        let p = pair(Wavelength::Quantum, Wavelength::Phase);
        let first = e.get_correlation(p).unwrap();
        assert_eq!(e.cache_len(), 1);
        assert_eq!(e.get_correlation(p).unwrap(), first);
    }

    #[test]
    fn test_update_invalidates_only_mentioned_pairs() {
        let mut e = engine();
        for (w, v) in [
            (Wavelength::Quantum, [1.0, 2.0, 3.0, 4.0]),
            (Wavelength::Phase, [4.0, 3.0, 2.0, 1.0]),
            (Wavelength::Thermodynamic, [1.0, 3.0, 2.0, 4.0]),
        ] {
            e.update_channel_data(ChannelData::from_values(w, &v));
        }
        let qp = pair(Wavelength::Quantum, Wavelength::Phase);
        let pt = pair(Wavelength::Phase, Wavelength::Thermodynamic);
        let qt = pair(Wavelength::Quantum, Wavelength::Thermodynamic);
        e.get_all_correlations(&[qp, pt, qt]);
        assert_eq!(e.cache_len(), 3);

        e.update_channel_data(ChannelData::from_values(Wavelength::Quantum, &[4.0, 3.0, 2.0, 1.0]));
        assert_eq!(e.cache_len(), 1);
        let fresh = e.get_correlation(qp).unwrap();
        assert!((fresh.correlation - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_get_all_skips_missing() {
        let mut e = engine();
        e.update_channel_data(ChannelData::from_values(Wavelength::Temporal, &[1.0, 2.0, 3.0]));
        e.update_channel_data(ChannelData::from_values(Wavelength::Spectral, &[1.0, 2.0, 3.0]));
        let out = e.get_all_correlations(&[
            pair(Wavelength::Temporal, Wavelength::Quantum),
            pair(Wavelength::Temporal, Wavelength::Spectral),
        ]);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].pair.secondary, Wavelength::Spectral);
    }

    #[test]
    fn test_configured_pairs() {
        let mut e = engine();
        assert!(e.get_configured_correlations().is_empty());
        e.update_channel_data(ChannelData::from_values(Wavelength::Temporal, &[1.0, 2.0, 3.0]));
        e.update_channel_data(ChannelData::from_values(Wavelength::Phase, &[1.0, 2.0, 3.0]));
        // the default list holds phase-temporal
        let out = e.get_configured_correlations();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].pair, pair(Wavelength::Phase, Wavelength::Temporal));
    }

    #[test]
    fn test_composite_patterns_appended() {
        let mut e = engine();
        e.update_channel_data(ChannelData::temporal_from_values(&[1.0, 2.0, 3.0]));
        e.update_channel_data(ChannelData::Spectral(SpectralData {
            spectrum: vec![
                SpectralBin {
                    frequency: 1.0,
                    power: 1.0,
                },
                SpectralBin {
                    frequency: 2.0,
                    power: 2.0,
                },
                SpectralBin {
                    frequency: 3.0,
                    power: 3.0,
                },
            ],
            harmonics: vec![Harmonic {
                frequency: 1.0 / 24.0,
                amplitude: 0.9,
            }],
        }));
        let r = e
            .get_correlation(pair(Wavelength::Spectral, Wavelength::Temporal))
            .unwrap();
        assert!(r.patterns.iter().any(|p| p.id == "circadian-resonance-24h"));
    }

    #[test]
    fn test_statistics() {
        let mut e = engine();
        let empty = e.get_statistics();
        assert_eq!(empty.cache_size, 0);
        assert!(empty.strongest_pair.is_none());

        e.update_channel_data(ChannelData::from_values(Wavelength::Quantum, &[1.0, 2.0, 3.0, 4.0]));
        e.update_channel_data(ChannelData::from_values(Wavelength::Phase, &[1.0, 3.0, 2.0, 4.0]));
        e.update_channel_data(ChannelData::from_values(Wavelength::Temporal, &[-1.0, -2.0, -3.0, -4.0]));
        let qp = pair(Wavelength::Quantum, Wavelength::Phase);
        let qt = pair(Wavelength::Quantum, Wavelength::Temporal);
        e.get_all_correlations(&[qp, qt]);

        let s = e.get_statistics();
        assert_eq!(
            s.channels_loaded,
            vec![Wavelength::Quantum, Wavelength::Temporal, Wavelength::Phase]
        );
        assert_eq!(s.cache_size, 2);
        assert_eq!(s.strongest_pair, Some(qt));
        assert!((s.strongest_correlation + 1.0).abs() < 1e-12);
        let expected: usize = e
            .get_all_correlations(&[qp, qt])
            .iter()
            .map(|r| r.patterns.len())
            .sum();
        assert_eq!(s.total_patterns, expected);
    }

    #[test]
    fn test_clear_cache_keeps_data() {
        let mut e = engine();
        e.update_channel_data(ChannelData::from_values(Wavelength::Quantum, &[1.0, 2.0]));
        e.update_channel_data(ChannelData::from_values(Wavelength::Phase, &[2.0, 1.0]));
        let p = pair(Wavelength::Quantum, Wavelength::Phase);
        e.get_correlation(p);
        e.clear_cache();
        assert_eq!(e.cache_len(), 0);
        assert!(e.get_correlation(p).is_some());
    }

    #[test]
    fn test_engines_are_independent() {
        let mut a = engine();
        let b = engine();
        a.update_channel_data(ChannelData::from_values(Wavelength::Quantum, &[1.0]));
        assert!(a.channel_data(Wavelength::Quantum).is_some());
        assert!(b.channel_data(Wavelength::Quantum).is_none());
    }
}
