//! 📝 Evaluation logging
//!
//! Append-only CSV audit trail of every composite evaluation, plus a JSON
//! per-entity run summary. One CSV row carries everything needed to replay
//! why a date scored the way it did: pillar scores, weight table used,
//! penalty, calibration, status, multiplier and the momentum readout.

use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::Path;
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::momentum_tracker::{MomentumSnapshot, MomentumStatus, TrendDescriptor};
use crate::types::{CapacityStatus, CompositeResult, Era, Pillar, WeightSource};

/// One audit row. Absent pillar scores and pre-history momentum fields
/// serialize as empty CSV cells.
#[derive(Debug, Clone)]
pub struct EvaluationLogEntry {
    pub evaluation_id: u64,
    pub entity: String,
    pub date: NaiveDate,
    pub era: Era,
    pub weight_source: WeightSource,

    // Composite stage
    pub raw_score: f64,
    pub breach_count: usize,
    pub penalty: f64,
    pub calibrated_score: f64,
    pub status: CapacityStatus,
    pub multiplier: Option<f64>,

    // Pillar breakdown
    pub liquidity: Option<f64>,
    pub volatility: Option<f64>,
    pub positioning: Option<f64>,
    pub contagion: Option<f64>,
    pub policy: Option<f64>,

    // Momentum readout (absent until the entity has history)
    pub delta_4: Option<f64>,
    pub trend: Option<TrendDescriptor>,
    pub momentum_status: Option<MomentumStatus>,
}

impl EvaluationLogEntry {
    /// Assemble a row from one evaluation and the entity's momentum state.
    pub fn from_result(
        entity: &str,
        result: &CompositeResult,
        momentum: Option<&MomentumSnapshot>,
    ) -> Self {
        let score_for = |pillar: Pillar| {
            result
                .breakdown
                .iter()
                .find(|b| b.pillar == pillar)
                .and_then(|b| b.score)
        };

        Self {
            evaluation_id: 0, // Assigned by the logger
            entity: entity.to_string(),
            date: result.date,
            era: result.era,
            weight_source: result.weight_source,
            raw_score: result.raw_score,
            breach_count: result.breach_count,
            penalty: result.penalty,
            calibrated_score: result.calibrated_score,
            status: result.status,
            multiplier: result.transmission.as_multiplier(),
            liquidity: score_for(Pillar::Liquidity),
            volatility: score_for(Pillar::Volatility),
            positioning: score_for(Pillar::Positioning),
            contagion: score_for(Pillar::Contagion),
            policy: score_for(Pillar::Policy),
            delta_4: momentum.and_then(|m| m.delta_4),
            trend: momentum.map(|m| m.trend),
            momentum_status: momentum.map(|m| m.status),
        }
    }

    /// Convert to CSV row
    pub fn to_csv_row(&self) -> String {
        format!(
            "{},{},{},{},{},{:.6},{},{:.2},{:.6},{},{},{},{},{},{},{},{},{},{}",
            self.evaluation_id,
            self.entity,
            self.date,
            self.era,
            self.weight_source,
            self.raw_score,
            self.breach_count,
            self.penalty,
            self.calibrated_score,
            self.status,
            self.multiplier
                .map(|m| format!("{:.4}", m))
                .unwrap_or_default(),
            self.liquidity
                .map(|v| format!("{:.4}", v))
                .unwrap_or_default(),
            self.volatility
                .map(|v| format!("{:.4}", v))
                .unwrap_or_default(),
            self.positioning
                .map(|v| format!("{:.4}", v))
                .unwrap_or_default(),
            self.contagion
                .map(|v| format!("{:.4}", v))
                .unwrap_or_default(),
            self.policy
                .map(|v| format!("{:.4}", v))
                .unwrap_or_default(),
            self.delta_4
                .map(|d| format!("{:+.4}", d))
                .unwrap_or_default(),
            self.trend.map(|t| t.as_str()).unwrap_or(""),
            self.momentum_status.map(|s| s.as_str()).unwrap_or("")
        )
    }

    /// CSV header
    pub fn csv_header() -> &'static str {
        "evaluation_id,entity,date,era,weight_source,raw_score,breach_count,penalty,calibrated_score,status,multiplier,liquidity,volatility,positioning,contagion,policy,delta_4,trend,momentum_status"
    }
}

/// Evaluation logger that appends CSV rows to a shared file.
pub struct EvaluationLogger {
    log_file: Arc<Mutex<File>>,
    evaluation_counter: Arc<Mutex<u64>>,
    entries_logged: Arc<Mutex<u64>>,
}

impl EvaluationLogger {
    /// Open the audit log. A new file gets the CSV header; an existing one
    /// is appended to.
    pub fn new<P: AsRef<Path>>(log_path: P) -> Result<Self> {
        let path = log_path.as_ref();
        let file_exists = path.exists();

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .context(format!("Failed to open evaluation log: {:?}", path))?;

        if !file_exists {
            writeln!(file, "{}", EvaluationLogEntry::csv_header())
                .context("Failed to write CSV header")?;
            file.flush()?;
            info!("📝 Created new evaluation log: {:?}", path);
        } else {
            info!("📝 Opened existing evaluation log: {:?}", path);
        }

        Ok(Self {
            log_file: Arc::new(Mutex::new(file)),
            evaluation_counter: Arc::new(Mutex::new(1)),
            entries_logged: Arc::new(Mutex::new(0)),
        })
    }

    /// Append one evaluation row and return its assigned id.
    pub fn log_evaluation(&self, mut entry: EvaluationLogEntry) -> Result<u64> {
        let evaluation_id = {
            let mut counter = self.evaluation_counter.lock().unwrap();
            let id = *counter;
            *counter += 1;
            id
        };

        entry.evaluation_id = evaluation_id;

        {
            let mut file = self.log_file.lock().unwrap();
            writeln!(file, "{}", entry.to_csv_row()).context("Failed to write log entry")?;
            file.flush()?;
        }

        {
            let mut count = self.entries_logged.lock().unwrap();
            *count += 1;
        }

        Ok(evaluation_id)
    }

    /// Get total number of logged entries
    pub fn entries_logged(&self) -> u64 {
        *self.entries_logged.lock().unwrap()
    }

    /// Get next evaluation ID
    pub fn next_evaluation_id(&self) -> u64 {
        *self.evaluation_counter.lock().unwrap()
    }
}

/// End-of-run rollup for one entity, written as JSON next to the CSV.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntitySummary {
    pub entity: String,
    pub periods: usize,
    pub first_date: NaiveDate,
    pub last_date: NaiveDate,
    pub last_calibrated: f64,
    pub last_status: CapacityStatus,
    pub min_calibrated: f64,
    pub min_date: NaiveDate,
    pub regime_breaks: usize,
    pub momentum_status: Option<MomentumStatus>,
    pub trend: Option<TrendDescriptor>,
}

impl EntitySummary {
    /// Roll up one entity's evaluation run. None for an empty run.
    pub fn from_results(
        entity: &str,
        results: &[CompositeResult],
        momentum: Option<&MomentumSnapshot>,
    ) -> Option<Self> {
        let first = results.first()?;
        let last = results.last()?;

        let mut min_calibrated = first.calibrated_score;
        let mut min_date = first.date;
        let mut regime_breaks = 0;
        for r in results {
            if r.calibrated_score < min_calibrated {
                min_calibrated = r.calibrated_score;
                min_date = r.date;
            }
            if r.transmission.is_regime_break() {
                regime_breaks += 1;
            }
        }

        Some(Self {
            entity: entity.to_string(),
            periods: results.len(),
            first_date: first.date,
            last_date: last.date,
            last_calibrated: last.calibrated_score,
            last_status: last.status,
            min_calibrated,
            min_date,
            regime_breaks,
            momentum_status: momentum.map(|m| m.status),
            trend: momentum.map(|m| m.trend),
        })
    }
}

/// Save run summaries to a JSON file (temp file + rename).
pub fn write_json_summary<P: AsRef<Path>>(path: P, summaries: &[EntitySummary]) -> Result<()> {
    if let Some(parent) = path.as_ref().parent() {
        fs::create_dir_all(parent).context("Failed to create summary directory")?;
    }

    let contents =
        serde_json::to_string_pretty(summaries).context("Failed to serialize run summary")?;

    let temp_path = path.as_ref().with_extension("tmp");
    fs::write(&temp_path, contents).context("Failed to write temp summary file")?;
    fs::rename(&temp_path, &path).context("Failed to rename summary file")?;

    info!("💾 Run summary saved: {:?}", path.as_ref());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{PillarBreakdown, Transmission};
    use std::fs;

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn sample_result(
        date: NaiveDate,
        calibrated: f64,
        status: CapacityStatus,
        transmission: Transmission,
    ) -> CompositeResult {
        CompositeResult {
            date,
            era: Era::Modern,
            raw_score: 0.443333,
            breach_count: 2,
            penalty: 0.03,
            calibrated_score: calibrated,
            transmission,
            status,
            weight_source: WeightSource::Base,
            breakdown: vec![
                PillarBreakdown {
                    pillar: Pillar::Liquidity,
                    score: Some(0.25),
                    weight: 0.5,
                    contributing: 2,
                },
                PillarBreakdown {
                    pillar: Pillar::Volatility,
                    score: Some(0.28),
                    weight: 0.5,
                    contributing: 1,
                },
                PillarBreakdown {
                    pillar: Pillar::Policy,
                    score: None,
                    weight: 0.0,
                    contributing: 0,
                },
            ],
        }
    }

    #[test]
    fn test_csv_header_matches_row_columns() {
        let header = EvaluationLogEntry::csv_header();
        assert!(header.contains("evaluation_id"));
        assert!(header.contains("calibrated_score"));
        assert!(header.contains("momentum_status"));

        let entry = EvaluationLogEntry::from_result(
            "US",
            &sample_result(
                ymd(2024, 3, 8),
                0.3224,
                CapacityStatus::Stretched,
                Transmission::Multiplier(2.1155),
            ),
            None,
        );
        assert_eq!(
            header.split(',').count(),
            entry.to_csv_row().split(',').count()
        );
    }

    #[test]
    fn test_csv_row_format() {
        let entry = EvaluationLogEntry::from_result(
            "US",
            &sample_result(
                ymd(2024, 3, 8),
                0.3224,
                CapacityStatus::Stretched,
                Transmission::Multiplier(2.1155),
            ),
            None,
        );

        let row = entry.to_csv_row();
        assert!(row.contains("US"));
        assert!(row.contains("2024-03-08"));
        assert!(row.contains("stretched"));
        assert!(row.contains("base"));
        assert!(row.contains("2.1155"));
        assert!(row.contains("0.2500")); // liquidity pillar
    }

    #[test]
    fn test_absent_fields_serialize_as_empty_cells() {
        let entry = EvaluationLogEntry::from_result(
            "US",
            &sample_result(
                ymd(2024, 3, 8),
                0.12,
                CapacityStatus::RegimeBreak,
                Transmission::RegimeBreak,
            ),
            None,
        );

        let row = entry.to_csv_row();
        let cells: Vec<&str> = row.split(',').collect();
        assert_eq!(cells[10], ""); // multiplier
        assert_eq!(cells[13], ""); // positioning never observed
        assert_eq!(cells[15], ""); // policy pillar absent
        assert_eq!(cells[17], ""); // trend without momentum history
    }

    #[test]
    fn test_logger_creation() {
        let temp_path = "/tmp/test_absorption_log.csv";
        let _ = fs::remove_file(temp_path);

        let logger = EvaluationLogger::new(temp_path);
        assert!(logger.is_ok());

        let content = fs::read_to_string(temp_path).unwrap();
        assert!(content.contains("evaluation_id,entity,date"));

        let _ = fs::remove_file(temp_path);
    }

    #[test]
    fn test_logging_assigns_sequential_ids() {
        let temp_path = "/tmp/test_absorption_log_2.csv";
        let _ = fs::remove_file(temp_path);

        let logger = EvaluationLogger::new(temp_path).unwrap();
        let result = sample_result(
            ymd(2024, 3, 8),
            0.3224,
            CapacityStatus::Stretched,
            Transmission::Multiplier(2.1155),
        );

        let id1 = logger
            .log_evaluation(EvaluationLogEntry::from_result("US", &result, None))
            .unwrap();
        let id2 = logger
            .log_evaluation(EvaluationLogEntry::from_result("EU", &result, None))
            .unwrap();
        assert_eq!(id1, 1);
        assert_eq!(id2, 2);
        assert_eq!(logger.entries_logged(), 2);
        assert_eq!(logger.next_evaluation_id(), 3);

        let content = fs::read_to_string(temp_path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 3); // header + 2 entries
        assert!(lines[1].starts_with("1,US,"));
        assert!(lines[2].starts_with("2,EU,"));

        let _ = fs::remove_file(temp_path);
    }

    #[test]
    fn test_summary_rollup_and_json_round_trip() {
        let temp_path = "/tmp/test_absorption_summary.json";
        let _ = fs::remove_file(temp_path);

        let results = vec![
            sample_result(
                ymd(2024, 3, 8),
                0.55,
                CapacityStatus::Thin,
                Transmission::Multiplier(1.60),
            ),
            sample_result(
                ymd(2024, 3, 15),
                0.18,
                CapacityStatus::RegimeBreak,
                Transmission::RegimeBreak,
            ),
            sample_result(
                ymd(2024, 3, 22),
                0.41,
                CapacityStatus::Stretched,
                Transmission::Multiplier(2.09),
            ),
        ];

        let summary = EntitySummary::from_results("US", &results, None).unwrap();
        assert_eq!(summary.periods, 3);
        assert_eq!(summary.first_date, ymd(2024, 3, 8));
        assert_eq!(summary.last_date, ymd(2024, 3, 22));
        assert!((summary.last_calibrated - 0.41).abs() < 1e-12);
        assert!((summary.min_calibrated - 0.18).abs() < 1e-12);
        assert_eq!(summary.min_date, ymd(2024, 3, 15));
        assert_eq!(summary.regime_breaks, 1);

        write_json_summary(temp_path, &[summary]).unwrap();
        let loaded: Vec<EntitySummary> =
            serde_json::from_str(&fs::read_to_string(temp_path).unwrap()).unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].entity, "US");
        assert_eq!(loaded[0].regime_breaks, 1);

        let _ = fs::remove_file(temp_path);
    }

    #[test]
    fn test_summary_of_empty_run_is_none() {
        assert!(EntitySummary::from_results("US", &[], None).is_none());
    }
}
