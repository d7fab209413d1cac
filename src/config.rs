//! ⚙️ Engine configuration bundle
//!
//! Everything calibration-dependent lives here: the indicator catalogue with
//! threshold policies, per-pillar special policies, era boundaries and
//! calibration factors, weight tables, the stress co-occurrence rule, the
//! binding-constraint policy and multiplier/momentum constants.
//!
//! The bundle is loaded once (TOML file or built-in defaults), validated,
//! then injected read-only into every evaluation. It is never a module-level
//! singleton, so parallel backtests with different calibration sets cannot
//! interfere.

use std::collections::{BTreeMap, HashSet};
use std::fs;

use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::types::{Era, Pillar};

/// Versioned configuration bundle. Read-only during scoring.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EngineConfig {
    /// Calibration bundle identifier, carried into logs.
    pub version: String,
    pub indicators: Vec<IndicatorConfig>,
    pub pillar_policies: Vec<PillarPolicyConfig>,
    pub eras: EraConfig,
    pub weights: WeightsConfig,
    pub composite: CompositeConfig,
    pub multiplier: MultiplierConfig,
    pub momentum: MomentumConfig,
    pub binding_constraint: Option<BindingConstraintConfig>,
}

/// One catalogue entry: which pillar an indicator feeds and how its raw
/// values map to a [0,1] score.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct IndicatorConfig {
    pub id: String,
    pub name: String,
    pub pillar: Pillar,
    pub thresholds: ThresholdConfig,
}

/// Threshold policy plus optional date-scoped replacements.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ThresholdConfig {
    pub policy: ScorePolicy,
    #[serde(default)]
    pub era_overrides: Vec<EraOverride>,
}

impl ThresholdConfig {
    /// Resolve which policy applies on `date`. First matching override wins;
    /// override ranges are half-open `[from, to)` with either end optional.
    pub fn resolve(&self, date: NaiveDate) -> &ScorePolicy {
        for ov in &self.era_overrides {
            let after_from = ov.from.map_or(true, |from| date >= from);
            let before_to = ov.to.map_or(true, |to| date < to);
            if after_from && before_to {
                return &ov.policy;
            }
        }
        &self.policy
    }
}

/// Date-scoped threshold replacement (e.g., wider volatility bands before
/// the modern data regime).
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EraOverride {
    #[serde(default)]
    pub from: Option<NaiveDate>,
    #[serde(default)]
    pub to: Option<NaiveDate>,
    pub policy: ScorePolicy,
}

/// Interpolation policy for one indicator.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ScorePolicy {
    /// Monotone three-band ladder. `higher_is_better` picks the direction;
    /// boundaries must be strictly ordered in that direction.
    OneSided {
        ample: f64,
        thin: f64,
        breach: f64,
        higher_is_better: bool,
    },
    /// Three nested `[low, high]` ranges around a healthy middle:
    /// ample inside thin inside breach.
    TwoSided {
        ample: [f64; 2],
        thin: [f64; 2],
        breach: [f64; 2],
    },
}

impl ScorePolicy {
    /// Boundary sanity checks. Malformed ranges are fatal at load time,
    /// never silently reordered.
    pub fn validate(&self, ctx: &str) -> Result<()> {
        match self {
            ScorePolicy::OneSided {
                ample,
                thin,
                breach,
                higher_is_better,
            } => {
                let ordered = if *higher_is_better {
                    ample > thin && thin > breach
                } else {
                    ample < thin && thin < breach
                };
                if !ordered {
                    bail!(
                        "{}: one-sided boundaries must be strictly ordered \
                         (ample={}, thin={}, breach={}, higher_is_better={})",
                        ctx,
                        ample,
                        thin,
                        breach,
                        higher_is_better
                    );
                }
            }
            ScorePolicy::TwoSided {
                ample,
                thin,
                breach,
            } => {
                if ample[0] > ample[1] {
                    bail!("{}: two-sided ample range is inverted", ctx);
                }
                let nested_low = breach[0] < thin[0] && thin[0] < ample[0];
                let nested_high = ample[1] < thin[1] && thin[1] < breach[1];
                if !nested_low || !nested_high {
                    bail!(
                        "{}: two-sided ranges must nest strictly \
                         (ample {:?} inside thin {:?} inside breach {:?})",
                        ctx,
                        ample,
                        thin,
                        breach
                    );
                }
            }
        }
        Ok(())
    }
}

/// Per-pillar post-aggregation policy. Only the critical-breach override is
/// defined today; Positioning carries it in the default bundle.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PillarPolicyConfig {
    pub pillar: Pillar,
    pub critical_breach: Option<CriticalBreachConfig>,
}

/// A single contributing score below `trigger_below` caps the pillar at
/// `cap_at` regardless of the mean.
#[derive(Debug, Clone, Copy, Deserialize, Serialize)]
pub struct CriticalBreachConfig {
    pub trigger_below: f64,
    pub cap_at: f64,
}

/// Era boundaries (half-open, by evaluation date) and per-era calibration
/// factors.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EraConfig {
    /// First date of the intermediate era.
    pub intermediate_start: NaiveDate,
    /// First date of the modern, data-complete era.
    pub modern_start: NaiveDate,
    pub calibration_early: f64,
    pub calibration_intermediate: f64,
    pub calibration_modern: f64,
}

impl EraConfig {
    /// Era is selected solely by evaluation date, not by data availability.
    pub fn era_for(&self, date: NaiveDate) -> Era {
        if date >= self.modern_start {
            Era::Modern
        } else if date >= self.intermediate_start {
            Era::Intermediate
        } else {
            Era::Early
        }
    }

    pub fn calibration(&self, era: Era) -> f64 {
        match era {
            Era::Early => self.calibration_early,
            Era::Intermediate => self.calibration_intermediate,
            Era::Modern => self.calibration_modern,
        }
    }
}

/// Fixed per-pillar weight row. Kept as named fields so a table in the TOML
/// file reads exactly like the calibration documents.
#[derive(Debug, Clone, Copy, Deserialize, Serialize)]
pub struct PillarWeights {
    pub liquidity: f64,
    pub volatility: f64,
    pub positioning: f64,
    pub contagion: f64,
    pub policy: f64,
}

impl PillarWeights {
    pub fn get(&self, pillar: Pillar) -> f64 {
        match pillar {
            Pillar::Liquidity => self.liquidity,
            Pillar::Volatility => self.volatility,
            Pillar::Positioning => self.positioning,
            Pillar::Contagion => self.contagion,
            Pillar::Policy => self.policy,
        }
    }

    fn values(&self) -> [f64; 5] {
        [
            self.liquidity,
            self.volatility,
            self.positioning,
            self.contagion,
            self.policy,
        ]
    }

    fn validate(&self, ctx: &str) -> Result<()> {
        if self.values().iter().any(|w| *w < 0.0 || !w.is_finite()) {
            bail!("{}: weights must be finite and non-negative", ctx);
        }
        if self.values().iter().sum::<f64>() <= 0.0 {
            bail!("{}: weight table has no mass", ctx);
        }
        Ok(())
    }
}

/// Weight tables plus the rule that switches the modern era onto the
/// interaction-adjusted table.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct WeightsConfig {
    /// Base ML-derived table (modern era).
    pub base: PillarWeights,
    /// Interaction-adjusted table (modern era under stress co-occurrence).
    pub interaction: PillarWeights,
    /// Era-specific tables for pre-modern periods. A missing table means
    /// equal weights for that era.
    #[serde(default)]
    pub early: Option<PillarWeights>,
    #[serde(default)]
    pub intermediate: Option<PillarWeights>,
    pub stress: StressRuleConfig,
}

/// Stress co-occurrence: the primary pillar below its threshold AND at least
/// one secondary pillar below its threshold.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StressRuleConfig {
    pub primary: Pillar,
    pub primary_threshold: f64,
    pub secondary: Vec<Pillar>,
    pub secondary_threshold: f64,
}

/// Composite-stage constants.
#[derive(Debug, Clone, Copy, Deserialize, Serialize)]
pub struct CompositeConfig {
    /// Pillar score below this counts as a breach.
    pub breach_threshold: f64,
}

/// Convex transmission curve constants.
#[derive(Debug, Clone, Copy, Deserialize, Serialize)]
pub struct MultiplierConfig {
    pub alpha: f64,
    pub beta: f64,
    /// Below this calibrated score the curve is undefined: RegimeBreak.
    pub regime_break_floor: f64,
}

/// Momentum tracker constants.
#[derive(Debug, Clone, Copy, Deserialize, Serialize)]
pub struct MomentumConfig {
    /// Retained history points per entity. Must cover the 4-period delta.
    pub max_horizon: usize,
}

/// Binding-constraint policy for one pillar: sharply diverging
/// sub-constraints collapse the pillar to its weakest member.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BindingConstraintConfig {
    pub pillar: Pillar,
    /// Sub-score spread beyond which the minimum replaces the average.
    pub divergence_gap: f64,
    /// Fixed fallback-average weights, keyed by indicator id.
    pub sub_weights: BTreeMap<String, f64>,
}

impl EngineConfig {
    pub fn load(path: &str) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path))?;

        let config: EngineConfig = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path))?;

        Ok(config)
    }

    /// Try config.toml, then config.example.toml, then the built-in bundle.
    pub fn load_or_default() -> Self {
        EngineConfig::load("config.toml")
            .or_else(|_| EngineConfig::load("config.example.toml"))
            .unwrap_or_else(|_| {
                warn!("⚠️ No config file found, using built-in calibration defaults");
                EngineConfig::default()
            })
    }

    pub fn indicator(&self, id: &str) -> Option<&IndicatorConfig> {
        self.indicators.iter().find(|i| i.id == id)
    }

    pub fn critical_breach_for(&self, pillar: Pillar) -> Option<&CriticalBreachConfig> {
        self.pillar_policies
            .iter()
            .find(|p| p.pillar == pillar)
            .and_then(|p| p.critical_breach.as_ref())
    }

    /// Full bundle sanity check. Run once after load, before any evaluation.
    pub fn validate(&self) -> Result<()> {
        // 1. Bundle identity
        if self.version.trim().is_empty() {
            bail!("config version must not be empty");
        }

        // 2. Indicator catalogue
        if self.indicators.is_empty() {
            bail!("indicator catalogue must not be empty");
        }
        let mut seen = HashSet::new();
        for ind in &self.indicators {
            if !seen.insert(ind.id.as_str()) {
                bail!("duplicate indicator id '{}'", ind.id);
            }
            let ctx = format!("indicator '{}'", ind.id);
            ind.thresholds.policy.validate(&ctx)?;
            for (n, ov) in ind.thresholds.era_overrides.iter().enumerate() {
                ov.policy.validate(&format!("{} era override {}", ctx, n))?;
                if let (Some(from), Some(to)) = (ov.from, ov.to) {
                    if from >= to {
                        bail!("{} era override {}: from {} must precede to {}", ctx, n, from, to);
                    }
                }
            }
        }

        // 3. Pillar policies
        let mut seen_pillars = HashSet::new();
        for policy in &self.pillar_policies {
            if !seen_pillars.insert(policy.pillar) {
                bail!("duplicate pillar policy for {}", policy.pillar);
            }
            if let Some(cb) = &policy.critical_breach {
                if !(0.0..1.0).contains(&cb.trigger_below) || !(0.0..1.0).contains(&cb.cap_at) {
                    bail!("critical breach bounds for {} must be in (0,1)", policy.pillar);
                }
                if cb.trigger_below > cb.cap_at {
                    bail!(
                        "critical breach trigger {} above cap {} for {}",
                        cb.trigger_below,
                        cb.cap_at,
                        policy.pillar
                    );
                }
            }
        }

        // 4. Eras
        if self.eras.intermediate_start >= self.eras.modern_start {
            bail!("intermediate_start must precede modern_start");
        }
        for (label, a) in [
            ("early", self.eras.calibration_early),
            ("intermediate", self.eras.calibration_intermediate),
            ("modern", self.eras.calibration_modern),
        ] {
            if !(a > 0.0 && a <= 1.0) {
                bail!("calibration factor for {} era must be in (0,1], got {}", label, a);
            }
        }

        // 5. Weight tables
        self.weights.base.validate("base weight table")?;
        self.weights.interaction.validate("interaction weight table")?;
        if let Some(t) = &self.weights.early {
            t.validate("early era weight table")?;
        }
        if let Some(t) = &self.weights.intermediate {
            t.validate("intermediate era weight table")?;
        }
        let stress = &self.weights.stress;
        if !(0.0..1.0).contains(&stress.primary_threshold)
            || !(0.0..1.0).contains(&stress.secondary_threshold)
        {
            bail!("stress thresholds must be in (0,1)");
        }
        if stress.secondary.is_empty() {
            bail!("stress rule needs at least one secondary pillar");
        }
        if stress.secondary.contains(&stress.primary) {
            bail!("stress rule: primary pillar cannot also be secondary");
        }

        // 6. Composite / multiplier / momentum constants
        if !(0.0..1.0).contains(&self.composite.breach_threshold) {
            bail!("breach_threshold must be in (0,1)");
        }
        if self.multiplier.alpha <= 0.0 || self.multiplier.beta <= 0.0 {
            bail!("multiplier alpha/beta must be positive");
        }
        if !(0.0..1.0).contains(&self.multiplier.regime_break_floor) {
            bail!("regime_break_floor must be in (0,1)");
        }
        if self.momentum.max_horizon < 5 {
            bail!("momentum max_horizon must be at least 5 (4-period delta needs 5 points)");
        }

        // 7. Binding constraint
        if let Some(bc) = &self.binding_constraint {
            if !(0.0..1.0).contains(&bc.divergence_gap) {
                bail!("binding constraint divergence_gap must be in (0,1)");
            }
            if bc.sub_weights.is_empty() {
                bail!("binding constraint needs sub-constraint weights");
            }
            let mut mass = 0.0;
            for (id, w) in &bc.sub_weights {
                let ind = match self.indicator(id) {
                    Some(ind) => ind,
                    None => bail!("binding constraint references unknown indicator '{}'", id),
                };
                if ind.pillar != bc.pillar {
                    bail!(
                        "binding constraint sub '{}' belongs to {}, not {}",
                        id,
                        ind.pillar,
                        bc.pillar
                    );
                }
                if *w < 0.0 {
                    bail!("binding constraint weight for '{}' is negative", id);
                }
                mass += w;
            }
            if mass <= 0.0 {
                bail!("binding constraint sub-weights have no mass");
            }
        }

        Ok(())
    }
}

fn ymd(year: i32, month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, day).expect("valid calendar date")
}

fn one_sided(ample: f64, thin: f64, breach: f64, higher_is_better: bool) -> ScorePolicy {
    ScorePolicy::OneSided {
        ample,
        thin,
        breach,
        higher_is_better,
    }
}

fn two_sided(ample: [f64; 2], thin: [f64; 2], breach: [f64; 2]) -> ScorePolicy {
    ScorePolicy::TwoSided {
        ample,
        thin,
        breach,
    }
}

fn indicator(id: &str, name: &str, pillar: Pillar, policy: ScorePolicy) -> IndicatorConfig {
    IndicatorConfig {
        id: id.to_string(),
        name: name.to_string(),
        pillar,
        thresholds: ThresholdConfig {
            policy,
            era_overrides: Vec::new(),
        },
    }
}

impl Default for EngineConfig {
    /// Built-in calibration bundle. Mirrored by config.example.toml.
    fn default() -> Self {
        let mut indicators = vec![
            // Liquidity
            indicator(
                "bid_ask_spread_bps",
                "Bid/ask spread (bps)",
                Pillar::Liquidity,
                one_sided(5.0, 15.0, 40.0, false),
            ),
            indicator(
                "market_depth_musd",
                "Top-of-book depth ($m)",
                Pillar::Liquidity,
                one_sided(500.0, 150.0, 30.0, true),
            ),
            indicator(
                "funding_spread_bps",
                "Term funding spread (bps)",
                Pillar::Liquidity,
                one_sided(10.0, 35.0, 80.0, false),
            ),
            indicator(
                "turnover_ratio",
                "Volume / outstanding turnover",
                Pillar::Liquidity,
                one_sided(1.2, 0.6, 0.2, true),
            ),
            // Volatility
            indicator(
                "implied_vol",
                "1m implied volatility",
                Pillar::Volatility,
                one_sided(12.0, 22.0, 38.0, false),
            ),
            indicator(
                "realized_vol",
                "1m realized volatility",
                Pillar::Volatility,
                one_sided(10.0, 20.0, 35.0, false),
            ),
            indicator(
                "vol_of_vol",
                "Volatility of implied volatility",
                Pillar::Volatility,
                one_sided(60.0, 95.0, 140.0, false),
            ),
            indicator(
                "term_slope_pts",
                "Vol term-structure slope (pts)",
                Pillar::Volatility,
                two_sided([-0.5, 2.0], [-1.5, 3.5], [-3.0, 5.0]),
            ),
            // Positioning
            indicator(
                "dealer_net_long_pct",
                "Dealer net long (% of OI)",
                Pillar::Positioning,
                two_sided([-15.0, 15.0], [-30.0, 30.0], [-50.0, 50.0]),
            ),
            indicator(
                "leverage_ratio",
                "Aggregate leverage ratio",
                Pillar::Positioning,
                one_sided(1.5, 2.5, 4.0, false),
            ),
            indicator(
                "short_interest_pct",
                "Short interest (% of float)",
                Pillar::Positioning,
                two_sided([1.0, 4.0], [0.5, 7.0], [0.1, 12.0]),
            ),
            indicator(
                "fund_flow_zscore",
                "Fund flow z-score",
                Pillar::Positioning,
                two_sided([-1.0, 1.0], [-2.0, 2.0], [-3.5, 3.5]),
            ),
            // Contagion
            indicator(
                "cross_asset_corr",
                "Cross-asset correlation",
                Pillar::Contagion,
                one_sided(0.30, 0.55, 0.80, false),
            ),
            indicator(
                "cds_index_bps",
                "IG CDS index (bps)",
                Pillar::Contagion,
                one_sided(60.0, 120.0, 250.0, false),
            ),
            indicator(
                "fx_basis_bps",
                "FX cross-currency basis (bps)",
                Pillar::Contagion,
                two_sided([-10.0, 10.0], [-25.0, 25.0], [-60.0, 60.0]),
            ),
            // Policy (binding-constraint sub-constraints)
            indicator(
                "rate_room_bps",
                "Policy rate distance to floor (bps)",
                Pillar::Policy,
                one_sided(300.0, 150.0, 50.0, true),
            ),
            indicator(
                "inflation_gap_pct",
                "Inflation gap vs target (pct pts)",
                Pillar::Policy,
                two_sided([-0.5, 1.0], [-1.5, 2.5], [-3.0, 5.0]),
            ),
            indicator(
                "balance_sheet_headroom_pct",
                "Central bank balance-sheet headroom (% GDP)",
                Pillar::Policy,
                one_sided(25.0, 12.0, 4.0, true),
            ),
            indicator(
                "fiscal_space_pct",
                "Fiscal space (% GDP)",
                Pillar::Policy,
                one_sided(30.0, 15.0, 5.0, true),
            ),
        ];

        // Pre-2007 vol surfaces were thinner; wider bands before the modern era.
        if let Some(iv) = indicators.iter_mut().find(|i| i.id == "implied_vol") {
            iv.thresholds.era_overrides.push(EraOverride {
                from: None,
                to: Some(ymd(2007, 1, 1)),
                policy: one_sided(14.0, 26.0, 45.0, false),
            });
        }

        let sub_weights = BTreeMap::from([
            ("rate_room_bps".to_string(), 0.25),
            ("inflation_gap_pct".to_string(), 0.25),
            ("balance_sheet_headroom_pct".to_string(), 0.25),
            ("fiscal_space_pct".to_string(), 0.25),
        ]);

        Self {
            version: "2025.1".to_string(),
            indicators,
            pillar_policies: vec![PillarPolicyConfig {
                pillar: Pillar::Positioning,
                critical_breach: Some(CriticalBreachConfig {
                    trigger_below: 0.15,
                    cap_at: 0.18,
                }),
            }],
            eras: EraConfig {
                intermediate_start: ymd(1990, 1, 1),
                modern_start: ymd(2007, 1, 1),
                calibration_early: 1.00,
                calibration_intermediate: 0.90,
                calibration_modern: 0.78,
            },
            weights: WeightsConfig {
                base: PillarWeights {
                    liquidity: 0.22,
                    volatility: 0.20,
                    positioning: 0.26,
                    contagion: 0.18,
                    policy: 0.14,
                },
                interaction: PillarWeights {
                    liquidity: 0.24,
                    volatility: 0.22,
                    positioning: 0.32,
                    contagion: 0.14,
                    policy: 0.08,
                },
                early: Some(PillarWeights {
                    liquidity: 0.40,
                    volatility: 0.35,
                    positioning: 0.0,
                    contagion: 0.0,
                    policy: 0.25,
                }),
                intermediate: Some(PillarWeights {
                    liquidity: 0.30,
                    volatility: 0.30,
                    positioning: 0.10,
                    contagion: 0.15,
                    policy: 0.15,
                }),
                stress: StressRuleConfig {
                    primary: Pillar::Positioning,
                    primary_threshold: 0.30,
                    secondary: vec![Pillar::Volatility, Pillar::Liquidity, Pillar::Contagion],
                    secondary_threshold: 0.30,
                },
            },
            composite: CompositeConfig {
                breach_threshold: 0.30,
            },
            multiplier: MultiplierConfig {
                alpha: 2.0,
                beta: 1.5,
                regime_break_floor: 0.20,
            },
            momentum: MomentumConfig { max_horizon: 8 },
            binding_constraint: Some(BindingConstraintConfig {
                pillar: Pillar::Policy,
                divergence_gap: 0.25,
                sub_weights,
            }),
        }
    }
}
