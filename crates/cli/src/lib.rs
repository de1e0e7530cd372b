//! Library surface for the recall CLI: the evaluation harness, report
//! document, parameter sweep, and usage log. The binary in `main.rs` is a
//! thin clap shell over these.

pub mod harness;
pub mod report;
pub mod sweep;
pub mod usage;

use anyhow::Result;
use harness::{GroundTruthFile, Harness, Mode};
use report::{GroundTruthMeta, Report, SuiteConfig};
use std::path::Path;
use sweep::SweepGrid;

/// Run a single suite (or a sweep) against a ground-truth file, writing an
/// atomically-checkpointed report after every completed suite. `resume`
/// re-reads an existing report and skips suites already present, which is
/// what makes long sweeps restartable.
#[allow(clippy::too_many_arguments)]
pub async fn run_eval(
    workspace: &Path,
    ground_truth_path: &Path,
    out_path: &Path,
    modes: &[Mode],
    sweep_enabled: bool,
    max_configs: Option<usize>,
    resume: Option<&Path>,
) -> Result<Report> {
    let ground_truth = GroundTruthFile::load(ground_truth_path)?;
    let harness = Harness::new(workspace);

    let mut report = match resume {
        Some(path) if path.exists() => {
            let existing = Report::load(path)?;
            log::info!(
                "resuming from {} ({} completed suites)",
                path.display(),
                existing.suites.len()
            );
            existing
        }
        _ => Report::new(GroundTruthMeta {
            description: ground_truth.description.clone(),
            version: ground_truth.version.clone(),
        }),
    };

    let configs: Vec<SuiteConfig> = if sweep_enabled {
        SweepGrid::default().enumerate(max_configs)
    } else {
        vec![SuiteConfig::default()]
    };

    for config in configs {
        let label = config.label();
        if report.has_suite(&label) {
            log::info!("skipping completed suite {label}");
            continue;
        }
        let suite = harness
            .run_suite(&ground_truth, modes, config, label)
            .await;
        report.suites.push(suite);
        report.checkpoint(out_path)?;
    }

    if sweep_enabled {
        report.sweep = Some(report::SweepReport {
            grid: SweepGrid::default().enumerate(max_configs),
            objective: sweep::OBJECTIVE.to_string(),
            best: sweep::select_best(&report.suites),
        });
    }
    report.checkpoint(out_path)?;
    Ok(report)
}
