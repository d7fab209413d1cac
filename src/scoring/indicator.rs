//! 📐 Indicator threshold interpolation
//!
//! Maps one raw indicator value to a [0,1] capacity sub-score:
//! - at or beyond the ample boundary → 1.0
//! - thin-to-ample band → [0.5, 1.0)
//! - breach-to-thin band → [0.0, 0.5)
//! - beyond the breach boundary → 0.0
//!
//! One-sided policies reflect the axis when lower is better; two-sided
//! policies run the same ladder independently on each arm of the nested
//! ranges. Scoring is date-agnostic: era-scoped boundary overrides are
//! resolved by the caller before invoking these functions.

use crate::config::ScorePolicy;

/// Score a single raw value against a validated policy.
///
/// Boundaries are assumed strictly ordered/nested (enforced at config
/// validation), so the interpolation denominators are never zero.
pub fn score(value: f64, policy: &ScorePolicy) -> f64 {
    match policy {
        ScorePolicy::OneSided {
            ample,
            thin,
            breach,
            higher_is_better,
        } => one_sided(value, *ample, *thin, *breach, *higher_is_better),
        ScorePolicy::TwoSided {
            ample,
            thin,
            breach,
        } => two_sided(value, *ample, *thin, *breach),
    }
}

/// Absent observations yield absent scores, never a substituted number.
pub fn score_observation(value: Option<f64>, policy: &ScorePolicy) -> Option<f64> {
    value.map(|v| score(v, policy))
}

fn one_sided(value: f64, ample: f64, thin: f64, breach: f64, higher_is_better: bool) -> f64 {
    // Reflect the axis so the ladder always reads higher-is-better.
    let (v, a, t, b) = if higher_is_better {
        (value, ample, thin, breach)
    } else {
        (-value, -ample, -thin, -breach)
    };

    if v >= a {
        1.0
    } else if v >= t {
        0.5 + 0.5 * (v - t) / (a - t)
    } else if v >= b {
        0.5 * (v - b) / (t - b)
    } else {
        0.0
    }
}

fn two_sided(value: f64, ample: [f64; 2], thin: [f64; 2], breach: [f64; 2]) -> f64 {
    if value < ample[0] {
        // Low arm: climbing toward the ample edge is better.
        one_sided(value, ample[0], thin[0], breach[0], true)
    } else if value > ample[1] {
        // High arm: the mirror image.
        one_sided(value, ample[1], thin[1], breach[1], false)
    } else {
        1.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn higher(ample: f64, thin: f64, breach: f64) -> ScorePolicy {
        ScorePolicy::OneSided {
            ample,
            thin,
            breach,
            higher_is_better: true,
        }
    }

    fn lower(ample: f64, thin: f64, breach: f64) -> ScorePolicy {
        ScorePolicy::OneSided {
            ample,
            thin,
            breach,
            higher_is_better: false,
        }
    }

    #[test]
    fn test_one_sided_higher_is_better_bands() {
        // ample=1.0, thin=0.5, breach=0.0 makes score(v) == v on [0,1]
        let p = higher(1.0, 0.5, 0.0);

        assert_eq!(score(1.0, &p), 1.0);
        assert_eq!(score(2.0, &p), 1.0); // saturates above ample
        assert!((score(0.75, &p) - 0.75).abs() < 1e-12); // 0.5 + 0.5*(0.25/0.5)
        assert!((score(0.5, &p) - 0.5).abs() < 1e-12); // thin boundary
        assert!((score(0.25, &p) - 0.25).abs() < 1e-12); // 0.5*(0.25/0.5)
        assert_eq!(score(0.0, &p), 0.0); // breach boundary
        assert_eq!(score(-1.0, &p), 0.0); // saturates below breach
    }

    #[test]
    fn test_one_sided_lower_is_better_reflects() {
        // spread-style indicator: 5 bps is ample, 40 bps is breached
        let p = lower(5.0, 15.0, 40.0);

        assert_eq!(score(3.0, &p), 1.0);
        assert_eq!(score(5.0, &p), 1.0);
        // 10 is halfway between ample and thin: 0.5 + 0.5*(15-10)/(15-5)
        assert!((score(10.0, &p) - 0.75).abs() < 1e-12);
        assert!((score(15.0, &p) - 0.5).abs() < 1e-12);
        // 27.5 is halfway between thin and breach: 0.5*(40-27.5)/(40-15)
        assert!((score(27.5, &p) - 0.25).abs() < 1e-12);
        assert_eq!(score(40.0, &p), 0.0);
        assert_eq!(score(60.0, &p), 0.0);
    }

    #[test]
    fn test_two_sided_arms_mirror() {
        let p = ScorePolicy::TwoSided {
            ample: [-1.0, 1.0],
            thin: [-2.0, 2.0],
            breach: [-3.0, 3.0],
        };

        // Inside ample
        assert_eq!(score(0.0, &p), 1.0);
        assert_eq!(score(-1.0, &p), 1.0);
        assert_eq!(score(1.0, &p), 1.0);

        // Low arm
        assert!((score(-1.5, &p) - 0.75).abs() < 1e-12);
        assert!((score(-2.0, &p) - 0.5).abs() < 1e-12);
        assert!((score(-2.5, &p) - 0.25).abs() < 1e-12);
        assert_eq!(score(-3.0, &p), 0.0);
        assert_eq!(score(-4.0, &p), 0.0);

        // High arm mirrors exactly
        assert!((score(1.5, &p) - 0.75).abs() < 1e-12);
        assert!((score(2.0, &p) - 0.5).abs() < 1e-12);
        assert!((score(2.5, &p) - 0.25).abs() < 1e-12);
        assert_eq!(score(3.0, &p), 0.0);
        assert_eq!(score(5.0, &p), 0.0);

        // Asymmetric bands interpolate per arm
        let skewed = ScorePolicy::TwoSided {
            ample: [0.0, 1.0],
            thin: [-4.0, 2.0],
            breach: [-8.0, 6.0],
        };
        assert!((score(-2.0, &skewed) - 0.75).abs() < 1e-12); // 0.5 + 0.5*(-2 - -4)/(0 - -4)
        assert!((score(4.0, &skewed) - 0.25).abs() < 1e-12); // 0.5*(6-4)/(6-2)
    }

    #[test]
    fn test_monotone_within_bands() {
        let p = lower(5.0, 15.0, 40.0);
        let mut last = f64::INFINITY;
        let mut v = 0.0;
        while v <= 50.0 {
            let s = score(v, &p);
            assert!(s <= last + 1e-12, "score must not rise as {} worsens", v);
            assert!((0.0..=1.0).contains(&s));
            last = s;
            v += 0.5;
        }
    }

    #[test]
    fn test_absent_propagates() {
        let p = higher(1.0, 0.5, 0.0);
        assert_eq!(score_observation(None, &p), None);
        assert_eq!(score_observation(Some(0.25), &p), Some(0.25));
    }
}
