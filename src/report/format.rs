//! Formatted terminal output.
//!
//! We keep formatting code in one place so:
//! - the math/fitting code stays clean and testable
//! - output changes are localized

use crate::domain::{FailedGalaxy, FitReport, FitResult, GalaxyFitRecord, ModelConfig};
use crate::report::PointResidual;

/// Summary of a single-galaxy fit.
pub fn format_fit_summary(
    galaxy: &str,
    model: &ModelConfig,
    report: &FitReport,
    result: &FitResult,
    points_used: usize,
    points_total: usize,
) -> String {
    let mut out = String::new();

    out.push_str("=== neros - LCM rotation curve fit ===\n");
    out.push_str(&format!("Galaxy: {galaxy}\n"));
    out.push_str(&format!(
        "Kernel: {} | c = {:.3e} km/s\n",
        model.kernel.display_name(),
        model.speed_of_light
    ));
    out.push_str(&format!("Points: {points_used} used of {points_total}\n"));
    out.push_str(&format!(
        "Optimizer: start #{} | {} iterations | {} evaluations\n",
        result.start_index, result.iterations, result.evaluations
    ));

    let sigma = |i: usize| result.covariance[(i, i)].sqrt();
    out.push_str("\nParameters (physical):\n");
    out.push_str(&format!("- alpha      : {:.6}\n", report.alpha));
    out.push_str(&format!("- disk_scale : {:.6}\n", report.disk_scale));
    out.push_str(&format!("- bulge_scale: {:.6}\n", report.bulge_scale));
    out.push_str(&format!(
        "- internal   : {} +/- {}\n",
        fmt_vec(&result.params.to_array()),
        fmt_vec(&[sigma(0), sigma(1), sigma(2)])
    ));
    out.push_str(&format!("\nchi^2 (mean): {:.4}\n", report.chi_squared));
    out.push_str(&format!("phi_zero    : {:.6e}\n", report.phi_zero));

    out
}

/// Table of the worst-fitting points.
pub fn format_residual_table(rows: &[PointResidual]) -> String {
    let mut out = String::new();
    out.push_str(
        format!(
            "{:>8} {:>10} {:>10} {:>10} {:>10} {:>8}\n",
            "radius", "v_obs", "v_fit", "v_lum", "residual", "pull"
        )
        .trim_end(),
    );
    out.push('\n');
    out.push_str(
        format!(
            "{:-<8} {:-<10} {:-<10} {:-<10} {:-<10} {:-<8}\n",
            "", "", "", "", "", ""
        )
        .trim_end(),
    );
    out.push('\n');

    for r in rows {
        out.push_str(
            format!(
                "{:>8.3} {:>10.2} {:>10.2} {:>10.2} {:>10.2} {:>8.2}\n",
                r.radius, r.v_obs, r.v_fit, r.v_lum, r.residual, r.pull
            )
            .trim_end(),
        );
        out.push('\n');
    }
    out
}

/// One line per galaxy plus the failures.
pub fn format_batch_summary(records: &[GalaxyFitRecord], failures: &[FailedGalaxy]) -> String {
    let mut out = String::new();
    out.push_str(&format!(
        "=== neros - batch fit: {} fitted, {} failed ===\n",
        records.len(),
        failures.len()
    ));
    out.push_str(
        format!(
            "{:<20} {:>10} {:>10} {:>10} {:>10} {:>6}\n",
            "galaxy", "alpha", "disk", "bulge", "chi^2", "n"
        )
        .trim_end(),
    );
    out.push('\n');
    for r in records {
        out.push_str(
            format!(
                "{:<20} {:>10.4} {:>10.4} {:>10.4} {:>10.3} {:>6}\n",
                truncate(&r.galaxy, 20),
                r.alpha,
                r.disk_scale,
                r.bulge_scale,
                r.chi_squared,
                r.points_used
            )
            .trim_end(),
        );
        out.push('\n');
    }

    if !failures.is_empty() {
        out.push_str("\nFailed:\n");
        for f in failures {
            out.push_str(&format!("- {}: {}\n", f.galaxy, f.error));
        }
    }
    out
}

fn fmt_vec(v: &[f64]) -> String {
    let parts: Vec<String> = v.iter().map(|x| format!("{x:.6}")).collect();
    format!("[{}]", parts.join(", "))
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    let mut out: String = s.chars().take(max.saturating_sub(1)).collect();
    out.push('.');
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncate_marks_cut_names() {
        assert_eq!(truncate("NGC0024", 20), "NGC0024");
        assert_eq!(truncate("ABCDEFGHIJ", 5), "ABCD.");
    }

    #[test]
    fn batch_summary_lists_failures() {
        let report = FitReport {
            alpha: 1.44,
            disk_scale: 0.8,
            bulge_scale: 1.1,
            chi_squared: 0.97,
            phi_zero: 1e-6,
        };
        let records = vec![GalaxyFitRecord::new("NGC0024", &report, 20)];
        let failures = vec![FailedGalaxy {
            galaxy: "UGC00001".to_string(),
            error: "nothing to fit".to_string(),
            exit_code: 3,
        }];
        let text = format_batch_summary(&records, &failures);
        assert!(text.contains("1 fitted, 1 failed"));
        assert!(text.contains("NGC0024"));
        assert!(text.contains("- UGC00001: nothing to fit"));
    }

    #[test]
    fn residual_table_has_one_line_per_row() {
        let rows = vec![PointResidual {
            radius: 2.0,
            v_obs: 100.0,
            v_fit: 98.0,
            v_lum: 80.0,
            residual: 2.0,
            pull: 0.4,
        }];
        let text = format_residual_table(&rows);
        assert_eq!(text.lines().count(), 3);
        assert!(text.lines().all(|l| l == l.trim_end()));
    }
}
