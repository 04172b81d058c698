//! Immutable historical snapshots.

use super::ContentSnapshot;
use crate::error::CoreResult;
use crate::types::{Timestamp, UserId};
use crate::version_number::VersionNumber;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// An immutable snapshot in an object's ledger.
///
/// The content is shared read-only between every reader once appended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Version {
    /// 1-based position in the ledger.
    pub sequence: u64,
    /// Dotted version number.
    pub number: VersionNumber,
    /// When the version was appended. Strictly increasing per ledger.
    pub timestamp: Timestamp,
    /// Who authored the content.
    pub editor: UserId,
    /// Whether this is the published version.
    ///
    /// Derived from the publish pointer when read through the ledger; at
    /// most one version per object reports `true`.
    #[serde(default)]
    pub published: bool,
    /// The captured content.
    pub content: Arc<ContentSnapshot>,
    /// SHA-256 of the content at append time.
    pub digest: [u8; 32],
}

impl Version {
    /// Returns true if the stored digest still matches the content.
    pub fn verify_digest(&self) -> CoreResult<bool> {
        Ok(self.content.digest()? == self.digest)
    }
}
