//! Export fit results.
//!
//! - CSV: one row per galaxy, easy to consume in spreadsheets or the
//!   downstream alpha analysis (`Galaxy` and `alpha` columns)
//! - JSON: the full run record (`FitReportFile`), readable back with
//!   `read_report_json`

use std::fs::File;
use std::path::Path;

use chrono::Utc;

use crate::domain::{FailedGalaxy, FitReportFile, GalaxyFitRecord, ModelConfig};
use crate::error::{NerosError, Result};

/// Write per-galaxy results to a CSV file.
pub fn write_results_csv(path: &Path, records: &[GalaxyFitRecord]) -> Result<()> {
    let file = File::create(path).map_err(|e| {
        NerosError::Io(format!("failed to create export CSV '{}': {e}", path.display()))
    })?;
    let mut writer = csv::Writer::from_writer(file);
    for record in records {
        writer
            .serialize(record)
            .map_err(|e| NerosError::Io(format!("failed to write export CSV row: {e}")))?;
    }
    writer
        .flush()
        .map_err(|e| NerosError::Io(format!("failed to flush export CSV: {e}")))?;
    Ok(())
}

/// Read a results CSV written by `write_results_csv`.
pub fn read_results_csv(path: &Path) -> Result<Vec<GalaxyFitRecord>> {
    let mut reader = csv::Reader::from_path(path).map_err(|e| {
        NerosError::Io(format!("failed to open results CSV '{}': {e}", path.display()))
    })?;
    reader
        .deserialize()
        .map(|row| row.map_err(|e| NerosError::Parse(format!("invalid results CSV row: {e}"))))
        .collect()
}

/// Assemble the JSON run record, stamped with the current time.
pub fn build_report_file(
    reference: &str,
    model: ModelConfig,
    fits: Vec<GalaxyFitRecord>,
    failures: Vec<FailedGalaxy>,
) -> FitReportFile {
    FitReportFile {
        tool: "neros".to_string(),
        generated_at: Utc::now(),
        reference: reference.to_string(),
        model,
        fits,
        failures,
    }
}

pub fn write_report_json(path: &Path, report: &FitReportFile) -> Result<()> {
    let file = File::create(path).map_err(|e| {
        NerosError::Io(format!("failed to create report JSON '{}': {e}", path.display()))
    })?;
    serde_json::to_writer_pretty(file, report)
        .map_err(|e| NerosError::Io(format!("failed to write report JSON: {e}")))?;
    Ok(())
}

pub fn read_report_json(path: &Path) -> Result<FitReportFile> {
    let file = File::open(path).map_err(|e| {
        NerosError::Io(format!("failed to open report JSON '{}': {e}", path.display()))
    })?;
    serde_json::from_reader(file).map_err(|e| NerosError::Parse(format!("invalid report JSON: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{FitReport, KernelKind};

    fn record(name: &str, alpha: f64) -> GalaxyFitRecord {
        let report = FitReport {
            alpha,
            disk_scale: 0.7,
            bulge_scale: 1.2,
            chi_squared: 0.9,
            phi_zero: 4.2e-6,
        };
        GalaxyFitRecord::new(name, &report, 18)
    }

    fn temp_path(file: &str) -> std::path::PathBuf {
        std::env::temp_dir().join(format!("neros-export-{}-{file}", std::process::id()))
    }

    #[test]
    fn csv_has_galaxy_and_alpha_columns() {
        let path = temp_path("results.csv");
        let records = vec![record("NGC0024", 1.5), record("UGC00128", 0.4)];
        write_results_csv(&path, &records).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        let header = text.lines().next().unwrap();
        assert_eq!(
            header,
            "Galaxy,alpha,disk_scale,bulge_scale,chi_squared,phi_zero,points_used"
        );
        assert_eq!(read_results_csv(&path).unwrap(), records);
        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn report_json_reads_back() {
        let path = temp_path("report.json");
        let model = ModelConfig {
            kernel: KernelKind::Naive,
            ..ModelConfig::default()
        };
        let failures = vec![FailedGalaxy {
            galaxy: "BAD".to_string(),
            error: "nothing to fit".to_string(),
            exit_code: 3,
        }];
        let report = build_report_file("MW.dat", model, vec![record("NGC0024", 1.5)], failures);
        write_report_json(&path, &report).unwrap();

        let back = read_report_json(&path).unwrap();
        assert_eq!(back.tool, "neros");
        assert_eq!(back.generated_at, report.generated_at);
        assert_eq!(back.model.kernel, KernelKind::Naive);
        assert_eq!(back.fits.len(), 1);
        assert_eq!(back.fits[0].galaxy, "NGC0024");
        assert!((back.fits[0].alpha - 1.5).abs() < 1e-12);
        assert_eq!(back.failures, report.failures);
        std::fs::remove_file(&path).unwrap();
    }
}
