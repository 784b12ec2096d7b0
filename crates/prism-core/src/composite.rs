//! Insights that need a channel's native structure, not just its series.
//!
//! Dispatch is on the unordered channel pair; asking for
//! `spectral × temporal` gives the same insights as `temporal × spectral`.

use crate::channel::{ChannelData, EvolutionaryData, QuantumData, SpectralData, TemporalData, ThermodynamicData};
use crate::config::CompositeThresholds;
use crate::constants::EPSILON;
use crate::metrics::{mean, pearson};
use crate::patterns::{CorrelationPattern, PatternType};

/// 24h and 12h cycles, in cycles per hour.
const CIRCADIAN_FREQUENCIES: [(f64, &str); 2] = [(1.0 / 24.0, "24h"), (1.0 / 12.0, "12h")];

/// Composite patterns for a pair of payloads. Unknown pairs yield nothing.
pub fn composite_insights(
    a: &ChannelData,
    b: &ChannelData,
    thresholds: &CompositeThresholds,
) -> Vec<CorrelationPattern> {
    use ChannelData::*;
    match (a, b) {
        (Temporal(t), Spectral(s)) | (Spectral(s), Temporal(t)) => temporal_spectral(t, s, thresholds),
        (Quantum(q), Evolutionary(e)) | (Evolutionary(e), Quantum(q)) => {
            quantum_evolutionary(q, e, thresholds)
        }
        (Spectral(s), Thermodynamic(th)) | (Thermodynamic(th), Spectral(s)) => {
            spectral_thermodynamic(s, th, thresholds)
        }
        _ => Vec::new(),
    }
}

fn temporal_spectral(
    temporal: &TemporalData,
    spectral: &SpectralData,
    t: &CompositeThresholds,
) -> Vec<CorrelationPattern> {
    let mut out = Vec::new();

    for (target, name) in CIRCADIAN_FREQUENCIES {
        let best = spectral
            .harmonics
            .iter()
            .filter(|h| (h.frequency - target).abs() <= t.circadian_tolerance * target)
            .filter(|h| h.amplitude > t.circadian_amplitude)
            .max_by(|x, y| x.amplitude.total_cmp(&y.amplitude));
        if let Some(h) = best {
            out.push(
                CorrelationPattern::new(
                    format!("circadian-resonance-{name}"),
                    PatternType::Resonance,
                    h.amplitude,
                    format!(
                        "{name} harmonic at {:.4} cycles/h with amplitude {:.3}",
                        h.frequency, h.amplitude
                    ),
                )
                .with_entities(vec![format!("harmonic@{}", h.frequency)]),
            );
        }
    }

    let daily: Vec<_> = temporal
        .clusters
        .iter()
        .filter(|c| c.pattern.eq_ignore_ascii_case("daily"))
        .collect();
    if !daily.is_empty() {
        let strengths: Vec<f64> = daily.iter().map(|c| c.strength).collect();
        let avg = mean(&strengths);
        if avg > t.daily_strength {
            out.push(
                CorrelationPattern::new(
                    "daily-synchronization",
                    PatternType::Synchronization,
                    avg,
                    format!("{} daily clusters, mean strength {avg:.3}", daily.len()),
                )
                .with_entities(daily.iter().map(|c| c.id.clone()).collect()),
            );
        }
    }

    out
}

fn quantum_evolutionary(
    quantum: &QuantumData,
    evolutionary: &EvolutionaryData,
    t: &CompositeThresholds,
) -> Vec<CorrelationPattern> {
    let mut out = Vec::new();

    let coherence: Vec<f64> = quantum.states.iter().map(|s| s.coherence).collect();
    let fitness: Vec<f64> = evolutionary.history.iter().map(|g| g.best_fitness).collect();
    let n = coherence.len().min(fitness.len());
    let r = pearson(&coherence[..n], &fitness[..n]);
    if r.abs() > t.coherence_fitness_coupling {
        out.push(CorrelationPattern::new(
            "coherence-fitness-coupling",
            PatternType::Coupling,
            r.abs(),
            format!("state coherence tracks best fitness over {n} samples (r = {r:.3})"),
        ));
    }

    let coherent: Vec<&str> = quantum
        .states
        .iter()
        .filter(|s| s.coherence > t.high_coherence)
        .map(|s| s.id.as_str())
        .collect();
    if coherent.len() >= t.tunneling_min_states
        && evolutionary.attractors.len() >= t.tunneling_min_attractors
    {
        let share = coherent.len() as f64 / quantum.states.len() as f64;
        let entities = coherent
            .iter()
            .map(|s| s.to_string())
            .chain(evolutionary.attractors.iter().map(|a| a.id.clone()))
            .collect();
        out.push(
            CorrelationPattern::new(
                "tunneling-potential",
                PatternType::Coupling,
                share,
                format!(
                    "{} coherent states across {} fitness attractors",
                    coherent.len(),
                    evolutionary.attractors.len()
                ),
            )
            .with_entities(entities),
        );
    }

    out
}

/// Share of total power sitting strictly above the median frequency.
fn high_frequency_share(spectral: &SpectralData) -> f64 {
    let total: f64 = spectral.spectrum.iter().map(|b| b.power.max(0.0)).sum();
    if spectral.spectrum.is_empty() || total < EPSILON {
        return 0.0;
    }
    let mut freqs: Vec<f64> = spectral.spectrum.iter().map(|b| b.frequency).collect();
    freqs.sort_by(f64::total_cmp);
    let mid = freqs.len() / 2;
    let median = if freqs.len() % 2 == 0 {
        (freqs[mid - 1] + freqs[mid]) / 2.0
    } else {
        freqs[mid]
    };
    let high: f64 = spectral
        .spectrum
        .iter()
        .filter(|b| b.frequency > median)
        .map(|b| b.power.max(0.0))
        .sum();
    high / total
}

fn spectral_thermodynamic(
    spectral: &SpectralData,
    thermo: &ThermodynamicData,
    t: &CompositeThresholds,
) -> Vec<CorrelationPattern> {
    let share = high_frequency_share(spectral);
    if share <= t.high_frequency_share {
        return Vec::new();
    }

    let temps: Vec<f64> = thermo.cells.iter().map(|c| c.temperature).collect();
    let avg = mean(&temps);
    if avg <= EPSILON {
        return Vec::new();
    }
    let hot: Vec<String> = thermo
        .cells
        .iter()
        .filter(|c| c.temperature > t.hot_spot_factor * avg)
        .map(|c| c.id.clone())
        .collect();
    if hot.is_empty() {
        return Vec::new();
    }

    vec![
        CorrelationPattern::new(
            "harmonic-stress",
            PatternType::Coupling,
            share,
            format!(
                "{:.0}% of spectral power above the median frequency with {} thermal hot spots",
                share * 100.0,
                hot.len()
            ),
        )
        .with_entities(hot),
    ]
}
