//! # Vellum Core
//!
//! Versioned content-object store for a CMS back office.
//!
//! This crate provides:
//! - An append-only version ledger per content object with optimistic
//!   concurrency on the head
//! - Dotted `major.minor` version numbering
//! - Long-lived edit locks with lazy timeout-based takeover
//! - Whole-object and single-field-group restore that preserves identities
//! - Language variants grouped in content sets, created at most once per
//!   `(content set, language)` slot
//! - A publish pointer separating published content from the working copy
//!
//! Components talk to storage only through the traits in [`store`]; the
//! [`Repository`] facade wires them together.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod clock;
mod config;
mod error;
mod identity;
mod ledger;
mod lock;
mod model;
mod publish;
mod registry;
mod repository;
mod restore;
pub mod store;
mod translation;
mod types;
mod verify;
mod version_number;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::Config;
pub use error::{CoreError, CoreResult};
pub use identity::{GlobalId, IdentityAllocator, SequentialAllocator};
pub use ledger::VersionLedger;
pub use lock::{
    AcquireOutcome, CancelOutcome, KeyedRegions, Lock, LockInfo, LockManager, SaveOptions,
    SaveOutcome,
};
pub use model::{
    ContentDraft, ContentObject, ContentSnapshot, FieldContent, FieldGroup, FieldGroupDraft,
    FieldValue, ObjectKind, SyncPointer, Version, Versionable,
};
pub use publish::{PublishSnapshots, PublishStatus, Rendition};
pub use registry::{DefinitionRegistry, InMemoryDefinitions};
pub use repository::{NewObject, Repository, RepositoryBuilder};
pub use restore::{IdentityPolicy, RestoreEngine, RestoreScope};
pub use store::{InMemoryStore, StoreDump, Stores};
pub use translation::{TranslateRequest, TranslationCoordinator};
pub use types::{ContainerRef, ContentSetId, DefinitionId, Language, ObjectId, Timestamp, UserId};
pub use verify::{verify_dump, Issue, VerifyReport};
pub use version_number::{next_version, VersionNumber};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
