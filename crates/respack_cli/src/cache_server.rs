//! `respack cache-server`: shares a local build cache over TCP.

use std::error::Error;

use respack_cache::{CacheServer, LocalStore};
use tracing::info;

use crate::CacheServerArgs;

const BYTES_PER_MB: u64 = 1024 * 1024;

/// Runs the `respack cache-server` command. Blocks until the process is
/// stopped.
pub fn run(args: &CacheServerArgs) -> Result<i32, Box<dyn Error>> {
    let limit = storage_limit(args);
    let store = LocalStore::open(&args.dir)?.with_limit(limit);
    info!(
        dir = %args.dir.display(),
        entries = store.entry_count(),
        bytes = store.total_size(),
        limit = ?limit,
        "opened cache storage"
    );
    let server = CacheServer::bind(("0.0.0.0", args.port), store)?;
    server.serve()?;
    Ok(0)
}

fn storage_limit(args: &CacheServerArgs) -> Option<u64> {
    args.max_size_mb.map(|mb| mb.saturating_mul(BYTES_PER_MB))
}
