//! `soso install`: Install all dependencies.

use super::Session;
use crate::output::StyledOutput;
use soso_pm::commands::{install, InstallReport, VersionSource};
use std::path::Path;
use std::process::ExitCode;

pub fn execute(
    session: &Session,
    project: &Path,
    package: Option<&str>,
    out: &mut StyledOutput,
) -> anyhow::Result<ExitCode> {
    let report = install(
        project,
        package,
        &session.install_context(),
        &session.install_options(),
    )?;
    print_report(&report, out);
    Ok(ExitCode::SUCCESS)
}

/// Render an install report; shared with `soso update`
pub fn print_report(report: &InstallReport, out: &mut StyledOutput) {
    if report.manifest_updated {
        out.info("Updated package.json");
    }

    if report.packages.is_empty() && report.fallback.is_empty() {
        out.info("No dependencies to install");
        return;
    }

    match report.source {
        Some(VersionSource::Lockfile) => out.info("Using versions from soso-lock.json"),
        Some(VersionSource::Resolver) => out.info("Resolved dependency versions"),
        None => {}
    }

    for (name, version) in &report.packages {
        out.plain("  ");
        out.bold(name);
        out.dim(&format!("@{}", version));
        out.newline();
    }
    for name in &report.fallback {
        out.plain("  ");
        out.bold(name);
        out.dim(" (npm)");
        out.newline();
    }

    out.success(&format!(
        "Installed {} packages ({} from cache, {} fetched, {} via npm)",
        report.packages.len() + report.fallback.len(),
        report.from_cache,
        report.fetched,
        report.fallback.len()
    ));
}
