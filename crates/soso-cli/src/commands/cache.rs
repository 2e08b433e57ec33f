//! `soso cache`: Manage the package cache.

use super::Session;
use crate::output::StyledOutput;
use soso_pm::commands::clean_cache;
use std::process::ExitCode;

pub fn clean(session: &Session, out: &mut StyledOutput) -> anyhow::Result<ExitCode> {
    let stats = clean_cache(&session.cache)?;
    out.success(&format!(
        "Cleared cache ({} packages, {:.1} MB)",
        stats.entry_count,
        stats.total_bytes as f64 / (1024.0 * 1024.0)
    ));
    Ok(ExitCode::SUCCESS)
}
