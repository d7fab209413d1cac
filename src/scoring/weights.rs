//! ⚖️ Weight selection
//!
//! Picks the pillar weight profile for an evaluation, most to least
//! specific:
//! 1. Modern era under stress co-occurrence → interaction-adjusted table
//! 2. Modern era otherwise → base ML-derived table
//! 3. Pre-modern era with a configured table → era-specific table
//! 4. Otherwise → equal weights over the active pillars
//!
//! Every profile is renormalized over the active pillars only, so absent
//! pillars never soak up weight. The binding-constraint resolution for the
//! Policy pillar also lives here: it replaces that pillar's aggregate before
//! the outer selection runs and is a pillar-internal policy, not a
//! cross-pillar weight.

use std::collections::BTreeMap;

use tracing::{debug, warn};

use crate::config::{BindingConstraintConfig, StressRuleConfig, WeightsConfig};
use crate::types::{Era, IndicatorScore, Pillar, PillarScore, WeightSource};

/// Normalized weights over active pillars, plus which table produced them.
#[derive(Debug, Clone)]
pub struct WeightProfile {
    pub weights: BTreeMap<Pillar, f64>,
    pub source: WeightSource,
}

impl WeightProfile {
    pub fn weight(&self, pillar: Pillar) -> f64 {
        self.weights.get(&pillar).copied().unwrap_or(0.0)
    }
}

/// Resolve the binding-constraint value for a pillar from its sub-constraint
/// scores.
///
/// Sharply diverging sub-constraints (spread above the configured gap)
/// collapse to the minimum: capacity is limited by the weakest constraint
/// and cannot be averaged away. Otherwise the fixed configuration weights
/// apply, renormalized over the present sub-constraints. All sub-constraints
/// absent → `None` (the pillar stays absent).
pub fn resolve_binding_constraint(
    cfg: &BindingConstraintConfig,
    sub_scores: &[IndicatorScore],
) -> Option<f64> {
    let present: Vec<(&str, f64)> = sub_scores
        .iter()
        .filter_map(|s| s.value.map(|v| (s.indicator_id.as_str(), v)))
        .collect();

    if present.is_empty() {
        return None;
    }

    let min = present.iter().map(|(_, v)| *v).fold(f64::INFINITY, f64::min);
    let max = present
        .iter()
        .map(|(_, v)| *v)
        .fold(f64::NEG_INFINITY, f64::max);

    if max - min > cfg.divergence_gap {
        debug!(
            "⚖️ {} binding constraint: spread {:.3} > {:.2}, min {:.3} replaces the average",
            cfg.pillar,
            max - min,
            cfg.divergence_gap,
            min
        );
        return Some(min);
    }

    // Fixed-weight average over the present sub-constraints.
    let mut mass = 0.0;
    let mut acc = 0.0;
    for (id, v) in &present {
        let w = cfg.sub_weights.get(*id).copied().unwrap_or(0.0);
        mass += w;
        acc += w * v;
    }

    if mass <= f64::EPSILON {
        // None of the present subs carries configured weight; plain mean.
        warn!(
            "⚠️ {} binding constraint: present sub-constraints carry no configured weight, using plain mean",
            cfg.pillar
        );
        let mean = present.iter().map(|(_, v)| *v).sum::<f64>() / present.len() as f64;
        return Some(mean);
    }

    Some(acc / mass)
}

/// True when the primary pillar and at least one secondary pillar are both
/// below their stress thresholds.
fn stress_cooccurrence(rule: &StressRuleConfig, pillar_scores: &[PillarScore]) -> bool {
    let value_of = |pillar: Pillar| -> Option<f64> {
        pillar_scores
            .iter()
            .find(|p| p.pillar == pillar)
            .and_then(|p| p.value)
    };

    let primary_stressed = match value_of(rule.primary) {
        Some(v) => v < rule.primary_threshold,
        None => false,
    };
    if !primary_stressed {
        return false;
    }

    rule.secondary.iter().any(|p| match value_of(*p) {
        Some(v) => v < rule.secondary_threshold,
        None => false,
    })
}

/// Select and renormalize the weight profile for one evaluation.
///
/// An empty active set returns an empty profile; the composite stage is the
/// one that turns that into a hard error.
pub fn select_weights(
    era: Era,
    pillar_scores: &[PillarScore],
    cfg: &WeightsConfig,
) -> WeightProfile {
    let active: Vec<Pillar> = pillar_scores
        .iter()
        .filter(|p| p.is_active())
        .map(|p| p.pillar)
        .collect();

    if active.is_empty() {
        return WeightProfile {
            weights: BTreeMap::new(),
            source: WeightSource::Equal,
        };
    }

    let (table, source) = match era {
        Era::Modern => {
            if stress_cooccurrence(&cfg.stress, pillar_scores) {
                debug!("⚖️ stress co-occurrence active, using interaction-adjusted weights");
                (Some(&cfg.interaction), WeightSource::Interaction)
            } else {
                (Some(&cfg.base), WeightSource::Base)
            }
        }
        Era::Intermediate => (
            cfg.intermediate.as_ref(),
            WeightSource::Era(Era::Intermediate),
        ),
        Era::Early => (cfg.early.as_ref(), WeightSource::Era(Era::Early)),
    };

    match table {
        Some(table) => {
            let mass: f64 = active.iter().map(|p| table.get(*p)).sum();
            if mass <= f64::EPSILON {
                // The configured table puts no weight on any active pillar.
                warn!(
                    "⚠️ {} weight table has no mass over active pillars {:?}, falling back to equal weights",
                    source,
                    active
                );
                equal_weights(&active)
            } else {
                let weights = active
                    .iter()
                    .map(|p| (*p, table.get(*p) / mass))
                    .collect();
                WeightProfile { weights, source }
            }
        }
        None => equal_weights(&active),
    }
}

fn equal_weights(active: &[Pillar]) -> WeightProfile {
    let w = 1.0 / active.len() as f64;
    WeightProfile {
        weights: active.iter().map(|p| (*p, w)).collect(),
        source: WeightSource::Equal,
    }
}
