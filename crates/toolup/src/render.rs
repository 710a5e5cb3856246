//! Plain-text reports printed at the end of each command.

use std::fmt::Write as _;

use toolup_backend::ToolchainVersion;
use toolup_core::{
    BackendReport, BackendStatus, Inventory, RunSummary, SweepReport, ToolReport, UpgradeOutcome,
    UpgradeResult,
};

use crate::backend_kind::BackendKind;

const NAME_WIDTH: usize = 8;

fn version_or_none(version: Option<&ToolchainVersion>) -> String {
    version.map_or_else(|| "none".to_string(), ToString::to_string)
}

fn describe_result(result: &UpgradeResult) -> String {
    let mut line = match &result.outcome {
        UpgradeOutcome::AlreadyCurrent => format!(
            "already current ({})",
            version_or_none(result.to.as_ref().or(result.from.as_ref()))
        ),
        UpgradeOutcome::Upgraded => {
            let mut text = format!(
                "upgraded {} -> {}",
                version_or_none(result.from.as_ref()),
                version_or_none(result.to.as_ref())
            );
            if let Some(path) = &result.install_path {
                let _ = write!(text, " via {path}");
            }
            text
        }
        UpgradeOutcome::SkippedProtected => format!(
            "skipped: {} is a protected system installation",
            version_or_none(result.from.as_ref())
        ),
        UpgradeOutcome::SkippedIncompatible { packages } => {
            let listed: Vec<String> = packages
                .iter()
                .map(|package| format!("{} ({})", package.package, package.constraint))
                .collect();
            format!(
                "skipped: {} would break {} package(s): {}",
                version_or_none(result.to.as_ref()),
                packages.len(),
                listed.join(", ")
            )
        }
        UpgradeOutcome::Unavailable => "not installed".to_string(),
        UpgradeOutcome::Failed => format!(
            "failed: {}",
            result
                .error
                .as_ref()
                .map_or_else(|| "unknown error".to_string(), ToString::to_string)
        ),
    };
    if result.used_cached_latest {
        line.push_str(" [cached latest]");
    }
    line
}

fn describe_sweep(sweep: &SweepReport) -> Vec<String> {
    match sweep {
        SweepReport::Disabled => vec!["cleanup disabled".to_string()],
        SweepReport::SkippedProtected => vec!["cleanup skipped (protected)".to_string()],
        SweepReport::Failed(error) => vec![format!("cleanup failed: {error}")],
        SweepReport::Swept {
            removed,
            failed,
            protected,
            ..
        } => {
            let mut lines = Vec::new();
            if !removed.is_empty() {
                lines.push(format!("removed {}", removed.join(", ")));
            }
            for (name, error) in failed {
                lines.push(format!("could not remove {name}: {error}"));
            }
            if !protected.is_empty() {
                lines.push(format!("left protected {}", protected.join(", ")));
            }
            lines
        }
    }
}

fn describe_tools(tools: &ToolReport) -> Vec<String> {
    let mut lines = Vec::new();
    if let Some(error) = &tools.inventory_error {
        lines.push(format!("tool inventory failed: {error}"));
    }
    if !tools.reinstalled.is_empty() {
        lines.push(format!(
            "reinstalled {} tool(s): {}",
            tools.reinstalled.len(),
            tools.reinstalled.join(", ")
        ));
    }
    if !tools.skipped.is_empty() {
        lines.push(format!(
            "skipped tool(s) with unknown source: {}",
            tools.skipped.join(", ")
        ));
    }
    for (name, error) in &tools.failed {
        lines.push(format!("could not reinstall {name}: {error}"));
    }
    lines
}

fn write_report(out: &mut String, report: &BackendReport) {
    let _ = writeln!(
        out,
        "{:<NAME_WIDTH$} {}",
        report.result.backend,
        describe_result(&report.result)
    );
    let details = report
        .sweep
        .iter()
        .flat_map(describe_sweep)
        .chain(report.tools.iter().flat_map(describe_tools));
    for detail in details {
        let _ = writeln!(out, "{:<NAME_WIDTH$} {detail}", "");
    }
}

/// Run summary with every backend that needs attention grouped at the end.
pub fn summary(summary: &RunSummary) -> String {
    let mut out = String::new();
    let (problems, fine): (Vec<&BackendReport>, Vec<&BackendReport>) = summary
        .reports
        .iter()
        .partition(|report| report.has_problems());

    for report in fine {
        write_report(&mut out, report);
    }

    if !problems.is_empty() {
        let _ = writeln!(out, "\nNeeds attention:");
        for report in problems {
            write_report(&mut out, report);
        }
    }

    if !summary.untouched.is_empty() {
        let _ = writeln!(
            out,
            "\nCancelled before processing: {}",
            summary.untouched.join(", ")
        );
    }

    let elapsed = summary.finished_at - summary.started_at;
    let _ = writeln!(out, "\nFinished in {}s", elapsed.num_seconds().max(0));
    out
}

pub fn verify(statuses: &[(BackendKind, BackendStatus)]) -> String {
    let mut out = String::new();
    let mut absent = Vec::new();

    for (kind, status) in statuses {
        let line = match status {
            BackendStatus::Absent => {
                absent.push(kind.as_str());
                continue;
            }
            BackendStatus::NothingActive { installed_count } => {
                format!("nothing active ({installed_count} installed)")
            }
            BackendStatus::Failed(error) => format!("check failed: {error}"),
            BackendStatus::Active(report) => {
                let mut line = format!(
                    "{} ({}) at {}",
                    report.active.version,
                    report.active.name,
                    report.active.path.display()
                );
                if report.protected {
                    line.push_str(" [protected]");
                }
                match &report.newest_installed {
                    Some(newest) if !report.is_newest_installed() => {
                        let _ = write!(line, "; newer {newest} installed but not active");
                    }
                    _ => line.push_str("; newest installed"),
                }
                match &report.cached_latest {
                    Some(latest) if report.update_available() => {
                        let _ = write!(line, "; {latest} available");
                    }
                    Some(_) => line.push_str("; up to date"),
                    None => line.push_str("; latest unknown"),
                }
                line
            }
        };
        let _ = writeln!(out, "{:<NAME_WIDTH$} {line}", kind.as_str());
    }

    if !absent.is_empty() {
        let _ = writeln!(out, "\nNot installed: {}", absent.join(", "));
    }
    out
}

pub fn versions(inventories: &[Inventory]) -> String {
    let mut out = String::new();
    for inventory in inventories {
        if inventory.absent {
            let _ = writeln!(out, "{:<NAME_WIDTH$} not installed", inventory.backend);
            continue;
        }

        let mut counts = Vec::new();
        if let Some(installed) = inventory.installed {
            counts.push(format!("{installed} installed"));
        }
        if let Some(packages) = inventory.packages {
            counts.push(format!("{packages} packages"));
        }
        if let Some(tools) = inventory.tools {
            counts.push(format!("{tools} tools"));
        }

        let mut line = format!(
            "{:<NAME_WIDTH$} {}",
            inventory.backend,
            version_or_none(inventory.version.as_ref())
        );
        if !counts.is_empty() {
            let _ = write!(line, "  ({})", counts.join(", "));
        }
        let _ = writeln!(out, "{line}");
    }
    out
}
