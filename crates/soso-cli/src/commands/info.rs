//! `soso info`: Show published versions of a package.

use super::Session;
use crate::output::StyledOutput;
use soso_pm::commands::{package_info, InfoError};
use soso_pm::RegistryProvider;
use std::process::ExitCode;

pub fn execute(
    session: &Session,
    name: &str,
    out: &mut StyledOutput,
) -> anyhow::Result<ExitCode> {
    let view = session.registry.load()?;

    let summary = match package_info(&view, name) {
        Ok(summary) => summary,
        Err(InfoError::NotFound { name, available }) => {
            out.error(&format!("Package not found: {}", name));
            out.plain("Available packages:");
            out.newline();
            if available.is_empty() {
                out.dim("  (none)");
                out.newline();
            }
            for known in &available {
                out.plain(&format!("  {}", known));
                out.newline();
            }
            return Ok(ExitCode::FAILURE);
        }
        Err(e) => return Err(e.into()),
    };

    out.bold(&summary.name);
    out.newline();
    for version in &summary.versions {
        out.plain("  ");
        out.bold(&version.version);
        if version.latest {
            out.plain(" (latest)");
        }
        out.newline();

        out.dim(&format!("    {}", version.locator));
        out.newline();
        if let Some(at) = version.published_at {
            out.dim(&format!("    published {}", at.format("%Y-%m-%d %H:%M UTC")));
            out.newline();
        }
        for (dep, range) in &version.dependencies {
            out.plain(&format!("    {} {}", dep, range));
            out.newline();
        }
    }
    Ok(ExitCode::SUCCESS)
}
