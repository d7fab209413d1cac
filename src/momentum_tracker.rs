//! 📉 Momentum tracking
//!
//! Keeps a short rolling history of calibrated composite scores per
//! monitored entity and layers a rate-of-change status on top of the
//! level-based one. Histories are append-only in strict date order; an
//! out-of-order append is refused because the 4-period delta assumes
//! monotonic time. One tracker serves many entities, but each entity's
//! stream must have a single writer.

use std::collections::{HashMap, VecDeque};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::errors::EngineError;

// Level bands for the momentum status machine.
const COMFORTABLE_FLOOR: f64 = 0.65;
const CAUTIOUS_FLOOR: f64 = 0.50;
const STRETCHED_FLOOR: f64 = 0.20;
/// 4-period drop that escalates Cautious to Deteriorating.
const DETERIORATION_DELTA: f64 = -0.05;

// Trend descriptor bands on the 4-period delta.
const RAPID_DECLINE_DELTA: f64 = -0.10;
const DECLINE_DELTA: f64 = -0.03;
const IMPROVE_DELTA: f64 = 0.05;

/// Minimum retained points: the 4-period delta needs five.
const MIN_HISTORY: usize = 5;

/// Five-level momentum status. Deteriorating is a level+momentum
/// conjunction, not a separate level band.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MomentumStatus {
    Comfortable,
    Cautious,
    Deteriorating,
    Stretched,
    Critical,
}

impl MomentumStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            MomentumStatus::Comfortable => "comfortable",
            MomentumStatus::Cautious => "cautious",
            MomentumStatus::Deteriorating => "deteriorating",
            MomentumStatus::Stretched => "stretched",
            MomentumStatus::Critical => "critical",
        }
    }
}

impl std::fmt::Display for MomentumStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Direction of travel over the 4-period horizon, independent of status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrendDescriptor {
    RapidlyDeclining,
    Declining,
    Stable,
    Improving,
}

impl TrendDescriptor {
    pub fn as_str(&self) -> &'static str {
        match self {
            TrendDescriptor::RapidlyDeclining => "rapidly_declining",
            TrendDescriptor::Declining => "declining",
            TrendDescriptor::Stable => "stable",
            TrendDescriptor::Improving => "improving",
        }
    }
}

impl std::fmt::Display for TrendDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Read-only view of an entity's latest momentum state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MomentumSnapshot {
    pub entity: String,
    pub date: NaiveDate,
    /// Latest calibrated composite score.
    pub score: f64,
    pub delta_1: Option<f64>,
    pub delta_2: Option<f64>,
    pub delta_4: Option<f64>,
    pub trend: TrendDescriptor,
    pub status: MomentumStatus,
}

/// Rolling history for one entity.
struct SeriesHistory {
    points: VecDeque<(NaiveDate, f64)>,
}

impl SeriesHistory {
    fn new() -> Self {
        Self {
            points: VecDeque::new(),
        }
    }

    fn delta(&self, periods: usize) -> Option<f64> {
        let n = self.points.len();
        if n > periods {
            let latest = self.points[n - 1].1;
            let past = self.points[n - 1 - periods].1;
            Some(latest - past)
        } else {
            None
        }
    }
}

/// Per-entity momentum state machine.
pub struct MomentumTracker {
    series: HashMap<String, SeriesHistory>,
    /// Retained points per entity (at least MIN_HISTORY).
    max_horizon: usize,
}

impl MomentumTracker {
    pub fn new(max_horizon: usize) -> Self {
        Self {
            series: HashMap::new(),
            max_horizon: max_horizon.max(MIN_HISTORY),
        }
    }

    /// Append one calibrated score and return the updated snapshot.
    ///
    /// Dates must be strictly increasing per entity; a date at or before
    /// the last recorded one is rejected and the history left untouched.
    pub fn record(
        &mut self,
        entity: &str,
        date: NaiveDate,
        score: f64,
    ) -> Result<MomentumSnapshot, EngineError> {
        let history = self
            .series
            .entry(entity.to_string())
            .or_insert_with(SeriesHistory::new);

        if let Some(&(last, _)) = history.points.back() {
            if date <= last {
                warn!(
                    "⚠️ {}: rejected out-of-order score for {} (last recorded {})",
                    entity, date, last
                );
                return Err(EngineError::OrderingViolation {
                    entity: entity.to_string(),
                    last,
                    attempted: date,
                });
            }
        }

        history.points.push_back((date, score));
        while history.points.len() > self.max_horizon {
            history.points.pop_front();
        }

        let snapshot = build_snapshot(entity, history);
        debug!(
            "📉 {}: score {:.3} Δ4 {} status {} trend {}",
            entity,
            score,
            snapshot
                .delta_4
                .map(|d| format!("{:+.3}", d))
                .unwrap_or_else(|| "n/a".to_string()),
            snapshot.status,
            snapshot.trend
        );
        Ok(snapshot)
    }

    /// Latest snapshot without mutating anything.
    pub fn snapshot(&self, entity: &str) -> Option<MomentumSnapshot> {
        let history = self.series.get(entity)?;
        if history.points.is_empty() {
            return None;
        }
        Some(build_snapshot(entity, history))
    }

    pub fn history_len(&self, entity: &str) -> usize {
        self.series.get(entity).map_or(0, |h| h.points.len())
    }

    pub fn entity_count(&self) -> usize {
        self.series.len()
    }

    /// Drop entities whose latest point predates `cutoff`.
    pub fn cleanup_stale(&mut self, cutoff: NaiveDate) {
        self.series.retain(|_entity, history| {
            history
                .points
                .back()
                .map(|(date, _)| *date >= cutoff)
                .unwrap_or(false)
        });
    }
}

fn build_snapshot(entity: &str, history: &SeriesHistory) -> MomentumSnapshot {
    let (date, score) = *history.points.back().expect("non-empty history");
    let delta_4 = history.delta(4);

    MomentumSnapshot {
        entity: entity.to_string(),
        date,
        score,
        delta_1: history.delta(1),
        delta_2: history.delta(2),
        delta_4,
        trend: classify_trend(delta_4),
        status: classify_status(score, delta_4),
    }
}

/// Joint level + 4-period-delta classification.
pub fn classify_status(level: f64, delta_4: Option<f64>) -> MomentumStatus {
    if level >= COMFORTABLE_FLOOR {
        MomentumStatus::Comfortable
    } else if level >= CAUTIOUS_FLOOR {
        match delta_4 {
            Some(d) if d < DETERIORATION_DELTA => MomentumStatus::Deteriorating,
            _ => MomentumStatus::Cautious,
        }
    } else if level >= STRETCHED_FLOOR {
        MomentumStatus::Stretched
    } else {
        MomentumStatus::Critical
    }
}

/// Trend over the 4-period horizon. Unknown delta reads as stable.
pub fn classify_trend(delta_4: Option<f64>) -> TrendDescriptor {
    match delta_4 {
        Some(d) if d < RAPID_DECLINE_DELTA => TrendDescriptor::RapidlyDeclining,
        Some(d) if d < DECLINE_DELTA => TrendDescriptor::Declining,
        Some(d) if d > IMPROVE_DELTA => TrendDescriptor::Improving,
        _ => TrendDescriptor::Stable,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn week(n: i64) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, 5).unwrap() + chrono::Duration::days(7 * n)
    }

    fn record_series(tracker: &mut MomentumTracker, entity: &str, scores: &[f64]) -> MomentumSnapshot {
        let mut last = None;
        for (i, s) in scores.iter().enumerate() {
            last = Some(tracker.record(entity, week(i as i64), *s).unwrap());
        }
        last.unwrap()
    }

    #[test]
    fn test_deteriorating_needs_cautious_level_and_falling_delta() {
        let mut tracker = MomentumTracker::new(8);

        // Level 0.55 with Δ4 = -0.15: the escalation conjunction holds
        let snap = record_series(&mut tracker, "US", &[0.70, 0.68, 0.62, 0.58, 0.55]);
        assert!((snap.delta_4.unwrap() + 0.15).abs() < 1e-12);
        assert_eq!(snap.status, MomentumStatus::Deteriorating);
        assert_eq!(snap.trend, TrendDescriptor::RapidlyDeclining);
    }

    #[test]
    fn test_cautious_without_sharp_fall() {
        let mut tracker = MomentumTracker::new(8);

        // Same level band but Δ4 = -0.02: no escalation
        let snap = record_series(&mut tracker, "US", &[0.57, 0.56, 0.58, 0.56, 0.55]);
        assert!((snap.delta_4.unwrap() + 0.02).abs() < 1e-12);
        assert_eq!(snap.status, MomentumStatus::Cautious);
        assert_eq!(snap.trend, TrendDescriptor::Stable);
    }

    #[test]
    fn test_level_bands() {
        // High level is comfortable regardless of the fall
        assert_eq!(classify_status(0.70, Some(-0.20)), MomentumStatus::Comfortable);
        assert_eq!(classify_status(0.65, Some(-0.20)), MomentumStatus::Comfortable);
        // Deteriorating exists only inside the cautious band
        assert_eq!(classify_status(0.55, Some(-0.06)), MomentumStatus::Deteriorating);
        assert_eq!(classify_status(0.55, Some(-0.05)), MomentumStatus::Cautious);
        assert_eq!(classify_status(0.55, None), MomentumStatus::Cautious);
        assert_eq!(classify_status(0.49, Some(-0.20)), MomentumStatus::Stretched);
        assert_eq!(classify_status(0.20, Some(-0.20)), MomentumStatus::Stretched);
        assert_eq!(classify_status(0.19, Some(0.10)), MomentumStatus::Critical);
    }

    #[test]
    fn test_trend_bands() {
        assert_eq!(classify_trend(Some(-0.15)), TrendDescriptor::RapidlyDeclining);
        assert_eq!(classify_trend(Some(-0.06)), TrendDescriptor::Declining);
        assert_eq!(classify_trend(Some(-0.02)), TrendDescriptor::Stable);
        assert_eq!(classify_trend(Some(0.04)), TrendDescriptor::Stable);
        assert_eq!(classify_trend(Some(0.08)), TrendDescriptor::Improving);
        assert_eq!(classify_trend(None), TrendDescriptor::Stable);
    }

    #[test]
    fn test_improving_series() {
        let mut tracker = MomentumTracker::new(8);
        let snap = record_series(&mut tracker, "EU", &[0.50, 0.55, 0.60, 0.62, 0.66]);
        assert!((snap.delta_4.unwrap() - 0.16).abs() < 1e-12);
        assert_eq!(snap.status, MomentumStatus::Comfortable);
        assert_eq!(snap.trend, TrendDescriptor::Improving);
    }

    #[test]
    fn test_deltas_absent_until_history_fills() {
        let mut tracker = MomentumTracker::new(8);

        let snap = tracker.record("JP", week(0), 0.60).unwrap();
        assert_eq!(snap.delta_1, None);
        assert_eq!(snap.delta_2, None);
        assert_eq!(snap.delta_4, None);
        assert_eq!(snap.trend, TrendDescriptor::Stable);

        let snap = tracker.record("JP", week(1), 0.58).unwrap();
        assert!((snap.delta_1.unwrap() + 0.02).abs() < 1e-12);
        assert_eq!(snap.delta_2, None);
        assert_eq!(snap.delta_4, None);

        let snap = tracker.record("JP", week(2), 0.57).unwrap();
        assert!(snap.delta_2.is_some());
        assert_eq!(snap.delta_4, None);
    }

    #[test]
    fn test_out_of_order_append_rejected() {
        let mut tracker = MomentumTracker::new(8);
        tracker.record("US", week(0), 0.60).unwrap();
        tracker.record("US", week(1), 0.58).unwrap();
        let before = tracker.snapshot("US").unwrap();

        // Older date
        match tracker.record("US", week(0), 0.99) {
            Err(EngineError::OrderingViolation { entity, last, attempted }) => {
                assert_eq!(entity, "US");
                assert_eq!(last, week(1));
                assert_eq!(attempted, week(0));
            }
            other => panic!("expected OrderingViolation, got {:?}", other),
        }

        // Duplicate date counts as out of order too
        assert!(tracker.record("US", week(1), 0.99).is_err());

        // History untouched by the rejected appends
        assert_eq!(tracker.history_len("US"), 2);
        assert_eq!(tracker.snapshot("US").unwrap(), before);
    }

    #[test]
    fn test_history_trims_to_horizon_but_keeps_delta4() {
        let mut tracker = MomentumTracker::new(5);

        for i in 0..12 {
            tracker.record("US", week(i), 0.80 - 0.01 * i as f64).unwrap();
        }

        assert_eq!(tracker.history_len("US"), 5);
        let snap = tracker.snapshot("US").unwrap();
        // Δ4 spans the retained window: 0.69 - 0.73
        assert!((snap.delta_4.unwrap() + 0.04).abs() < 1e-12);
    }

    #[test]
    fn test_horizon_floor_covers_delta4() {
        // Asking for horizon 2 still retains the five points Δ4 needs
        let mut tracker = MomentumTracker::new(2);
        for i in 0..6 {
            tracker.record("US", week(i), 0.5).unwrap();
        }
        assert_eq!(tracker.history_len("US"), 5);
        assert!(tracker.snapshot("US").unwrap().delta_4.is_some());
    }

    #[test]
    fn test_entities_are_independent() {
        let mut tracker = MomentumTracker::new(8);
        record_series(&mut tracker, "US", &[0.70, 0.68, 0.62, 0.58, 0.55]);
        record_series(&mut tracker, "EU", &[0.80, 0.81, 0.82, 0.83, 0.84]);

        assert_eq!(tracker.entity_count(), 2);
        assert_eq!(
            tracker.snapshot("US").unwrap().status,
            MomentumStatus::Deteriorating
        );
        assert_eq!(
            tracker.snapshot("EU").unwrap().status,
            MomentumStatus::Comfortable
        );
        assert_eq!(tracker.snapshot("JP"), None);
    }

    #[test]
    fn test_cleanup_drops_stale_entities() {
        let mut tracker = MomentumTracker::new(8);
        tracker.record("US", week(0), 0.6).unwrap();
        tracker.record("EU", week(10), 0.6).unwrap();

        tracker.cleanup_stale(week(5));
        assert_eq!(tracker.entity_count(), 1);
        assert!(tracker.snapshot("US").is_none());
        assert!(tracker.snapshot("EU").is_some());
    }
}
