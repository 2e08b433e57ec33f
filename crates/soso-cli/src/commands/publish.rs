//! `soso publish`: Tag the current version and record it in the registry.

use super::Session;
use crate::output::StyledOutput;
use soso_pm::commands::publish;
use std::path::Path;
use std::process::ExitCode;

pub fn execute(
    session: &Session,
    project: &Path,
    out: &mut StyledOutput,
) -> anyhow::Result<ExitCode> {
    let report = publish(project, &session.registry, &session.git)?;

    if report.new_package {
        out.info(&format!("Registered new package {}", report.name));
    }
    out.success(&format!("Published {}@{}", report.name, report.version));
    out.plain("  ");
    out.dim(&report.locator.to_string());
    out.newline();
    Ok(ExitCode::SUCCESS)
}
