//! 🏛️ Pillar aggregation
//!
//! Averages the available indicator sub-scores into one score per pillar.
//! Absent indicators are excluded from the mean, never defaulted; a pillar
//! is absent only when every constituent indicator is absent. A configured
//! critical-breach override lets a single extreme reading dominate the
//! pillar (one deeply breached sub-score caps the aggregate).

use tracing::debug;

use crate::config::CriticalBreachConfig;
use crate::types::{IndicatorScore, Pillar, PillarScore};

/// Aggregate one pillar's indicator scores.
pub fn aggregate(
    pillar: Pillar,
    scores: &[IndicatorScore],
    critical_breach: Option<&CriticalBreachConfig>,
) -> PillarScore {
    let present: Vec<f64> = scores.iter().filter_map(|s| s.value).collect();

    if present.is_empty() {
        debug!("🏛️ {}: no data, pillar absent", pillar);
        return PillarScore {
            pillar,
            value: None,
            contributing: 0,
        };
    }

    let mean = present.iter().sum::<f64>() / present.len() as f64;
    let mut value = mean;

    if let Some(cb) = critical_breach {
        let worst = present.iter().cloned().fold(f64::INFINITY, f64::min);
        if worst < cb.trigger_below {
            value = mean.min(cb.cap_at);
            debug!(
                "🛡️ {}: critical breach override, worst sub-score {:.3} < {:.2}, capped {:.3} -> {:.3}",
                pillar, worst, cb.trigger_below, mean, value
            );
        }
    }

    PillarScore {
        pillar,
        value: Some(value),
        contributing: present.len(),
    }
}
