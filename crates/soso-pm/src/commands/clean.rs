//! Cache clean command

use crate::cache::{CacheError, CacheStats, PackageCache};
use tracing::info;

/// Clear the package cache, returning what it held
pub fn clean_cache(cache: &PackageCache) -> Result<CacheStats, CacheError> {
    info!("Clearing package cache...");
    let stats = cache.stats()?;
    cache.clear()?;
    Ok(stats)
}
