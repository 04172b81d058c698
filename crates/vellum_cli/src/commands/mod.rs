//! CLI command implementations.

pub mod demo;
pub mod history;
pub mod inspect;
pub mod verify;

use std::path::Path;
use vellum_core::{Repository, StoreDump};

/// Loads a dump and rebuilds a repository over it.
pub fn open(path: &Path) -> Result<(StoreDump, Repository), Box<dyn std::error::Error>> {
    if !path.exists() {
        return Err(format!("No store dump found at {:?}", path).into());
    }
    let dump = StoreDump::load(path)?;
    let repo = Repository::from_dump(dump.clone(), Repository::builder())?;
    Ok((dump, repo))
}

/// Formats the first bytes of a digest as hex.
pub fn short_digest(digest: &[u8; 32]) -> String {
    digest[..6].iter().map(|b| format!("{:02x}", b)).collect()
}
