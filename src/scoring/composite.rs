//! 🧮 Composite calculation
//!
//! Weighted sum of active pillar scores, reduced by the multi-pillar breach
//! interaction penalty, scaled by the era calibration factor and clamped to
//! [0,1]. Emits the full per-pillar breakdown so every published number can
//! be reconstructed from its inputs.

use chrono::NaiveDate;
use tracing::debug;

use crate::config::EngineConfig;
use crate::errors::EngineError;
use crate::scoring::multiplier;
use crate::scoring::weights::WeightProfile;
use crate::types::{CompositeResult, Era, PillarBreakdown, PillarScore};

/// Penalty for n simultaneous pillar breaches. Calibrated from excess
/// co-breach frequency; the table itself is the contract.
const BREACH_PENALTY: [f64; 5] = [0.0, 0.0, 0.03, 0.08, 0.12];
const BREACH_PENALTY_CAP: f64 = 0.15;

/// Interaction penalty for a breach count. Non-decreasing, capped.
pub fn breach_penalty(breach_count: usize) -> f64 {
    if breach_count < BREACH_PENALTY.len() {
        BREACH_PENALTY[breach_count]
    } else {
        BREACH_PENALTY_CAP
    }
}

/// Compute one evaluation's composite result.
///
/// `pillar_scores` carries every pillar (absent ones included) so the
/// breakdown is complete; only active pillars contribute to the score.
/// An empty active set is a hard configuration error, never a default.
pub fn compute(
    date: NaiveDate,
    era: Era,
    pillar_scores: &[PillarScore],
    profile: &WeightProfile,
    cfg: &EngineConfig,
) -> Result<CompositeResult, EngineError> {
    let active: Vec<&PillarScore> = pillar_scores.iter().filter(|p| p.is_active()).collect();
    if active.is_empty() {
        return Err(EngineError::EmptyPillarSet { date });
    }

    // 1. Weighted sum over active pillars
    let mut raw = 0.0;
    for p in &active {
        if let Some(v) = p.value {
            raw += profile.weight(p.pillar) * v;
        }
    }

    // 2. Breach count and interaction penalty
    let breach_count = active
        .iter()
        .filter(|p| p.value.map_or(false, |v| v < cfg.composite.breach_threshold))
        .count();
    let penalty = breach_penalty(breach_count);

    // 3. Penalty first, then era calibration, then clamp
    let final_score = (raw - penalty).max(0.0);
    let calibrated = (final_score * cfg.eras.calibration(era)).clamp(0.0, 1.0);

    let transmission = multiplier::convert(calibrated, &cfg.multiplier);
    let status = multiplier::status(calibrated, &cfg.multiplier);

    let breakdown = pillar_scores
        .iter()
        .map(|p| PillarBreakdown {
            pillar: p.pillar,
            score: p.value,
            weight: profile.weight(p.pillar),
            contributing: p.contributing,
        })
        .collect();

    let result = CompositeResult {
        date,
        era,
        raw_score: raw,
        breach_count,
        penalty,
        calibrated_score: calibrated,
        transmission,
        status,
        weight_source: profile.source,
        breakdown,
    };

    debug!("🧮 {}", result.summary());
    Ok(result)
}
