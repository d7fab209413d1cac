//! 🧠 Evaluation pipeline
//!
//! Orchestrates one (date, entity) evaluation end to end:
//! 1. Resolve each indicator's threshold policy for the date
//! 2. Score observations (absent propagates, never defaulted)
//! 3. Aggregate scores per pillar with the pillar's special policy
//! 4. Resolve the binding constraint on its pillar
//! 5. Select and renormalize the weight profile for the date's era
//! 6. Compute the composite, penalty, calibration, status and multiplier
//!
//! The evaluator is pure: it holds an immutable, shared configuration and
//! keeps no per-call state. Momentum history belongs to the caller's
//! tracker, one writer per entity.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::NaiveDate;
use tracing::warn;

use crate::config::EngineConfig;
use crate::errors::EngineError;
use crate::scoring::{composite, indicator, pillar, weights};
use crate::types::{CompositeResult, IndicatorObservation, IndicatorScore, Pillar, PillarScore};

#[derive(Clone)]
pub struct Evaluator {
    config: Arc<EngineConfig>,
}

impl Evaluator {
    pub fn new(config: Arc<EngineConfig>) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Evaluate one date from raw observations.
    pub fn evaluate(
        &self,
        date: NaiveDate,
        observations: &[IndicatorObservation],
    ) -> Result<CompositeResult, EngineError> {
        let era = self.config.eras.era_for(date);

        // 1. Score observations, grouped by the catalogue's pillar
        // assignment. Every catalogue pillar appears, observed or not, so
        // the breakdown is complete.
        let mut by_pillar: BTreeMap<Pillar, Vec<IndicatorScore>> = BTreeMap::new();
        for ind in &self.config.indicators {
            by_pillar.entry(ind.pillar).or_default();
        }

        for obs in observations {
            let ind = match self.config.indicator(&obs.indicator_id) {
                Some(ind) => ind,
                None => {
                    // The data layer may ship more series than this bundle
                    // is calibrated for.
                    warn!(
                        "⚠️ no threshold config for indicator '{}', skipping",
                        obs.indicator_id
                    );
                    continue;
                }
            };
            if ind.pillar != obs.pillar {
                warn!(
                    "⚠️ observation for '{}' labelled {}, catalogue assigns {}",
                    obs.indicator_id, obs.pillar, ind.pillar
                );
            }

            let policy = ind.thresholds.resolve(date);
            let score = indicator::score_observation(obs.value, policy);
            by_pillar
                .entry(ind.pillar)
                .or_default()
                .push(IndicatorScore {
                    indicator_id: obs.indicator_id.clone(),
                    value: score,
                });
        }

        // 2. Aggregate each pillar under its policy
        let mut pillar_scores: Vec<PillarScore> = by_pillar
            .iter()
            .map(|(p, scores)| pillar::aggregate(*p, scores, self.config.critical_breach_for(*p)))
            .collect();

        // 3. Binding constraint replaces its pillar's aggregate
        if let Some(bc) = &self.config.binding_constraint {
            if let Some(subs) = by_pillar.get(&bc.pillar) {
                if let Some(value) = weights::resolve_binding_constraint(bc, subs) {
                    for ps in pillar_scores.iter_mut() {
                        if ps.pillar == bc.pillar {
                            ps.value = Some(value);
                        }
                    }
                }
            }
        }

        // 4. Weights for the era, renormalized over active pillars
        let profile = weights::select_weights(era, &pillar_scores, &self.config.weights);

        // 5. Composite, penalty, calibration, status, multiplier
        composite::compute(date, era, &pillar_scores, &profile, &self.config)
    }
}
