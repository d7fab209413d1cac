//! 📈 Shock-transmission multiplier
//!
//! Converts the calibrated composite into a convex transmission multiplier:
//! `1 + alpha * (1 - score)^beta`. Full capacity transmits shocks one-for-one;
//! depleted capacity amplifies them. Below the regime-break floor the curve
//! is intentionally undefined and the explicit sentinel is returned instead
//! of an extrapolated number.

use crate::config::MultiplierConfig;
use crate::types::{CapacityStatus, Transmission};

// Status bands above the regime-break floor (calibrated score).
const AMPLE_FLOOR: f64 = 0.80;
const COMFORTABLE_FLOOR: f64 = 0.60;
const THIN_FLOOR: f64 = 0.40;

/// Convert a calibrated score into a multiplier or the RegimeBreak sentinel.
pub fn convert(calibrated: f64, cfg: &MultiplierConfig) -> Transmission {
    if calibrated < cfg.regime_break_floor {
        return Transmission::RegimeBreak;
    }
    Transmission::Multiplier(1.0 + cfg.alpha * (1.0 - calibrated).powf(cfg.beta))
}

/// Status band for a calibrated score.
pub fn status(calibrated: f64, cfg: &MultiplierConfig) -> CapacityStatus {
    if calibrated >= AMPLE_FLOOR {
        CapacityStatus::Ample
    } else if calibrated >= COMFORTABLE_FLOOR {
        CapacityStatus::Comfortable
    } else if calibrated >= THIN_FLOOR {
        CapacityStatus::Thin
    } else if calibrated >= cfg.regime_break_floor {
        CapacityStatus::Stretched
    } else {
        CapacityStatus::RegimeBreak
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cfg() -> MultiplierConfig {
        MultiplierConfig {
            alpha: 2.0,
            beta: 1.5,
            regime_break_floor: 0.20,
        }
    }

    #[test]
    fn test_full_capacity_transmits_one_for_one() {
        match convert(1.0, &cfg()) {
            Transmission::Multiplier(m) => assert!((m - 1.0).abs() < 1e-12),
            Transmission::RegimeBreak => panic!("full capacity is not a regime break"),
        }
    }

    #[test]
    fn test_curve_values() {
        // 0.5 → 1 + 2*(0.5)^1.5 = 1.7071...
        let m = convert(0.5, &cfg()).as_multiplier().unwrap();
        assert!((m - (1.0 + 2.0 * 0.5f64.powf(1.5))).abs() < 1e-12);
        assert!((m - 1.7071).abs() < 1e-4);

        // Exactly at the floor the curve still applies:
        // 1 + 2*(0.8)^1.5 = 2.4310...
        let m = convert(0.20, &cfg()).as_multiplier().unwrap();
        assert!((m - 2.4311).abs() < 1e-4);
    }

    #[test]
    fn test_regime_break_below_floor() {
        assert!(convert(0.19, &cfg()).is_regime_break());
        assert!(convert(0.0, &cfg()).is_regime_break());
        assert!(!convert(0.20, &cfg()).is_regime_break());
    }

    #[test]
    fn test_multiplier_strictly_increases_as_capacity_falls() {
        let c = cfg();
        let grid = [1.0, 0.9, 0.8, 0.7, 0.6, 0.5, 0.4, 0.3, 0.25, 0.21, 0.20];
        let mut last = 0.0;
        for score in grid {
            let m = convert(score, &c).as_multiplier().unwrap();
            assert!(m > last, "multiplier must grow as score falls past {:.2}", score);
            last = m;
        }
    }

    #[test]
    fn test_status_bands() {
        let c = cfg();
        assert_eq!(status(0.95, &c), CapacityStatus::Ample);
        assert_eq!(status(0.80, &c), CapacityStatus::Ample);
        assert_eq!(status(0.79, &c), CapacityStatus::Comfortable);
        assert_eq!(status(0.60, &c), CapacityStatus::Comfortable);
        assert_eq!(status(0.59, &c), CapacityStatus::Thin);
        assert_eq!(status(0.40, &c), CapacityStatus::Thin);
        assert_eq!(status(0.39, &c), CapacityStatus::Stretched);
        assert_eq!(status(0.322, &c), CapacityStatus::Stretched);
        assert_eq!(status(0.20, &c), CapacityStatus::Stretched);
        assert_eq!(status(0.19, &c), CapacityStatus::RegimeBreak);
        assert_eq!(status(0.0, &c), CapacityStatus::RegimeBreak);
    }
}
