//! Test fixtures and repository helpers.
//!
//! Provides a repository on a manual clock with a small set of field-group
//! definitions, plus content builders for common test scenarios.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use vellum_core::{
    Clock, Config, ContainerRef, ContentDraft, ContentObject, DefinitionId, DefinitionRegistry,
    FieldContent, InMemoryDefinitions, ManualClock, NewObject, Repository, SaveOptions, StoreDump,
    Timestamp, UserId,
};

/// Definition of the `body` text block.
pub const TEXT: DefinitionId = DefinitionId::new(1);
/// Definition of the `gallery` block.
pub const GALLERY: DefinitionId = DefinitionId::new(2);

/// First test editor.
pub const ALICE: UserId = UserId::new(1);
/// Second test editor.
pub const BOB: UserId = UserId::new(2);

/// Default container new objects are created in.
pub const HOME: ContainerRef = ContainerRef::new(1);

/// Time the manual clock starts at.
pub const EPOCH: Timestamp = Timestamp::from_millis(1_700_000_000_000);

/// A repository on a manual clock.
pub struct TestRepository {
    /// The repository instance.
    pub repo: Repository,
    /// The clock, advanced explicitly by tests.
    pub clock: Arc<ManualClock>,
    /// The definition registry, so tests can delete definitions.
    pub definitions: Arc<InMemoryDefinitions>,
}

impl TestRepository {
    /// Creates a repository with default configuration.
    pub fn new() -> Self {
        Self::with_config(Config::default())
    }

    /// Creates a repository whose locks expire after `timeout`.
    pub fn with_lock_timeout(timeout: Duration) -> Self {
        Self::with_config(Config::new().lock_timeout(timeout))
    }

    /// Creates a repository with the given configuration.
    pub fn with_config(config: Config) -> Self {
        let clock = Arc::new(ManualClock::new(EPOCH));
        let definitions = Arc::new(InMemoryDefinitions::with_definitions([TEXT, GALLERY]));
        let repo = Repository::builder()
            .config(config)
            .clock(Arc::clone(&clock) as Arc<dyn Clock>)
            .definitions(Arc::clone(&definitions) as Arc<dyn DefinitionRegistry>)
            .build();
        Self {
            repo,
            clock,
            definitions,
        }
    }

    /// Creates a German page with a `body` group.
    pub fn page(&self, text: &str) -> ContentObject {
        self.create(body(text))
    }

    /// Creates a German page with the given content.
    pub fn create(&self, content: ContentDraft) -> ContentObject {
        self.repo
            .create(NewObject::page(HOME, content, ALICE).in_language("de"))
            .expect("Failed to create page")
    }

    /// Locks, saves a version and unlocks in one step.
    pub fn edit(&self, object: &ContentObject, content: &ContentDraft, major: bool) {
        self.repo.acquire(object.id, ALICE).expect("Failed to lock");
        let options = if major {
            SaveOptions::major()
        } else {
            SaveOptions::minor()
        };
        self.repo
            .save(object.id, ALICE, content, options)
            .expect("Failed to save");
        self.repo
            .release(object.id, ALICE, SaveOptions::draft_only())
            .expect("Failed to unlock");
    }

    /// Moves the clock forward.
    pub fn advance(&self, by: Duration) {
        self.clock.advance(by);
    }

    /// Writes the repository to a dump file and opens it again.
    ///
    /// The returned directory must outlive the path.
    pub fn reopen(&self) -> (Repository, TempDir, PathBuf) {
        let dir = TempDir::new().expect("Failed to create temp directory");
        let path = dir.path().join("store.json");
        self.repo
            .export()
            .expect("Failed to export")
            .save(&path)
            .expect("Failed to save dump");

        let dump = StoreDump::load(&path).expect("Failed to load dump");
        let builder = Repository::builder()
            .clock(Arc::clone(&self.clock) as Arc<dyn Clock>)
            .definitions(Arc::clone(&self.definitions) as Arc<dyn DefinitionRegistry>);
        let repo = Repository::from_dump(dump, builder).expect("Failed to reopen");
        (repo, dir, path)
    }
}

impl Default for TestRepository {
    fn default() -> Self {
        Self::new()
    }
}

impl std::ops::Deref for TestRepository {
    type Target = Repository;

    fn deref(&self) -> &Self::Target {
        &self.repo
    }
}

/// Content with a single `body` text group.
pub fn body(text: &str) -> ContentDraft {
    ContentDraft::new("page").with_group("body", TEXT, [("text", FieldContent::text(text))])
}

/// Content with a `body` and a `gallery` group.
pub fn with_gallery(text: &str, caption: &str) -> ContentDraft {
    body(text).with_group("gallery", GALLERY, [("caption", FieldContent::text(caption))])
}

/// Runs a test with a fresh repository.
///
/// # Example
///
/// ```rust,ignore
/// use vellum_testkit::with_test_repo;
///
/// #[test]
/// fn my_test() {
///     with_test_repo(|t| {
///         let page = t.page("hello");
///         // ... test operations
///     });
/// }
/// ```
pub fn with_test_repo<F, R>(f: F) -> R
where
    F: FnOnce(&TestRepository) -> R,
{
    let test_repo = TestRepository::new();
    f(&test_repo)
}

#[cfg(test)]
mod tests {
    use super::*;
    use vellum_core::VersionNumber;

    #[test]
    fn test_page_fixture() {
        with_test_repo(|t| {
            let page = t.page("hello");
            assert_eq!(page.current_version, Some(VersionNumber::FIRST));
            assert_eq!(page.container, HOME);
        });
    }

    #[test]
    fn test_edit_helper() {
        let t = TestRepository::new();
        let page = t.page("one");
        t.edit(&page, &body("two"), true);
        assert_eq!(
            t.latest(page.id).unwrap().unwrap().number,
            VersionNumber::new(2, 0)
        );
    }

    #[test]
    fn test_reopen_keeps_history() {
        let t = TestRepository::new();
        let page = t.page("one");
        t.advance(Duration::from_secs(1));
        t.edit(&page, &body("two"), false);

        let (reopened, _dir, path) = t.reopen();
        assert!(path.exists());
        assert_eq!(reopened.versions(page.id).unwrap().len(), 2);
        assert!(reopened.verify().unwrap().is_clean());
    }
}
