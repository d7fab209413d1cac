//! Core domain types shared across the scoring pipeline.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Named risk dimension aggregating several indicators.
///
/// Ordering is the canonical display/breakdown order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Pillar {
    Liquidity,
    Volatility,
    Positioning,
    Contagion,
    Policy,
}

impl Pillar {
    pub const ALL: [Pillar; 5] = [
        Pillar::Liquidity,
        Pillar::Volatility,
        Pillar::Positioning,
        Pillar::Contagion,
        Pillar::Policy,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Pillar::Liquidity => "liquidity",
            Pillar::Volatility => "volatility",
            Pillar::Positioning => "positioning",
            Pillar::Contagion => "contagion",
            Pillar::Policy => "policy",
        }
    }
}

impl std::fmt::Display for Pillar {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Historical era. Weight tables and the calibration factor are held
/// constant within an era; the boundaries live in configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Era {
    /// Sparse-data period before reliable positioning/contagion series.
    Early,
    /// Partial coverage period.
    Intermediate,
    /// Data-complete period the ML weight table was trained on.
    Modern,
}

impl Era {
    pub fn as_str(&self) -> &'static str {
        match self {
            Era::Early => "early",
            Era::Intermediate => "intermediate",
            Era::Modern => "modern",
        }
    }
}

impl std::fmt::Display for Era {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One raw indicator reading supplied by the data layer.
///
/// `value: None` means "no data for this date" and is a first-class state,
/// distinct from zero. Immutable once produced.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndicatorObservation {
    pub indicator_id: String,
    pub as_of: NaiveDate,
    pub value: Option<f64>,
    pub pillar: Pillar,
}

/// Normalized [0,1] sub-score for one indicator. Absent propagates from an
/// absent observation, never substituted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndicatorScore {
    pub indicator_id: String,
    pub value: Option<f64>,
}

/// Aggregated pillar score.
///
/// Absent only when every constituent indicator was absent. When present,
/// the value is the mean of the contributing sub-scores (possibly capped by
/// a critical-breach override).
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PillarScore {
    pub pillar: Pillar,
    pub value: Option<f64>,
    pub contributing: usize,
}

impl PillarScore {
    pub fn is_active(&self) -> bool {
        self.value.is_some()
    }
}

/// Which table produced a weight profile. Carried through to the result so
/// a reviewer can see why a date was weighted the way it was.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WeightSource {
    /// Equal weights over the active pillars (no table configured).
    Equal,
    /// Era-specific table for a pre-modern period.
    Era(Era),
    /// Base ML-derived table (modern era, no stress co-occurrence).
    Base,
    /// Interaction-adjusted table (modern era under stress co-occurrence).
    Interaction,
}

impl WeightSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            WeightSource::Equal => "equal",
            WeightSource::Era(Era::Early) => "era_early",
            WeightSource::Era(Era::Intermediate) => "era_intermediate",
            WeightSource::Era(Era::Modern) => "era_modern",
            WeightSource::Base => "base",
            WeightSource::Interaction => "interaction",
        }
    }
}

impl std::fmt::Display for WeightSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Capacity status band derived from the calibrated composite level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CapacityStatus {
    Ample,
    Comfortable,
    Thin,
    Stretched,
    RegimeBreak,
}

impl CapacityStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CapacityStatus::Ample => "ample",
            CapacityStatus::Comfortable => "comfortable",
            CapacityStatus::Thin => "thin",
            CapacityStatus::Stretched => "stretched",
            CapacityStatus::RegimeBreak => "regime_break",
        }
    }
}

impl std::fmt::Display for CapacityStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Shock-transmission output: either a numeric multiplier or the explicit
/// regime-break sentinel. The convex curve is never extrapolated below the
/// cutoff, so a broken regime cannot masquerade as a large-but-finite
/// multiplier.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Transmission {
    Multiplier(f64),
    RegimeBreak,
}

impl Transmission {
    pub fn as_multiplier(&self) -> Option<f64> {
        match self {
            Transmission::Multiplier(m) => Some(*m),
            Transmission::RegimeBreak => None,
        }
    }

    pub fn is_regime_break(&self) -> bool {
        matches!(self, Transmission::RegimeBreak)
    }
}

impl std::fmt::Display for Transmission {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Transmission::Multiplier(m) => write!(f, "{:.4}", m),
            Transmission::RegimeBreak => write!(f, "regime_break"),
        }
    }
}

/// Per-pillar line of the audit breakdown: the score and weight that went
/// into the composite. Absent pillars appear with weight 0.0.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PillarBreakdown {
    pub pillar: Pillar,
    pub score: Option<f64>,
    pub weight: f64,
    pub contributing: usize,
}

/// One evaluation output. Immutable once produced; consumed by reporting
/// and backtest layers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompositeResult {
    pub date: NaiveDate,
    pub era: Era,
    /// Weighted sum of active pillar scores before penalty/calibration.
    pub raw_score: f64,
    /// Active pillars scoring below the breach threshold.
    pub breach_count: usize,
    /// Interaction penalty subtracted from the raw score.
    pub penalty: f64,
    /// Final era-calibrated score in [0,1].
    pub calibrated_score: f64,
    pub transmission: Transmission,
    pub status: CapacityStatus,
    pub weight_source: WeightSource,
    pub breakdown: Vec<PillarBreakdown>,
}

impl CompositeResult {
    /// Compact one-line summary for logs.
    pub fn summary(&self) -> String {
        format!(
            "{} | raw={:.3} breaches={} penalty={:.2} calibrated={:.3} status={} mult={} weights={}",
            self.date,
            self.raw_score,
            self.breach_count,
            self.penalty,
            self.calibrated_score,
            self.status,
            self.transmission,
            self.weight_source
        )
    }
}
