//! `soso update`: Raise dependency ranges to the latest versions.

use super::install::print_report;
use super::Session;
use crate::output::StyledOutput;
use soso_pm::commands::update;
use std::path::Path;
use std::process::ExitCode;

pub fn execute(
    session: &Session,
    project: &Path,
    package: Option<&str>,
    out: &mut StyledOutput,
) -> anyhow::Result<ExitCode> {
    let report = update(
        project,
        package,
        &session.install_context(),
        &session.install_options(),
    )?;

    for name in &report.skipped {
        out.warning(&format!("{} is not in the registry, skipping", name));
    }

    if report.changes.is_empty() {
        out.success("All dependencies are up to date");
        return Ok(ExitCode::SUCCESS);
    }

    for change in &report.changes {
        out.info(&format!("{}: {} -> {}", change.name, change.from, change.to));
    }
    if let Some(installed) = &report.install {
        print_report(installed, out);
    }
    Ok(ExitCode::SUCCESS)
}
