//! Demo command implementation.
//!
//! Builds a small store that touches every component and writes it as a
//! dump, so the other commands have something to look at.

use std::path::Path;
use std::sync::Arc;
use tracing::info;
use vellum_core::{
    ContainerRef, ContentDraft, DefinitionId, DefinitionRegistry, FieldContent,
    InMemoryDefinitions, NewObject, Repository, SaveOptions, TranslateRequest, UserId,
};

const TEXT: DefinitionId = DefinitionId::new(1);
const GALLERY: DefinitionId = DefinitionId::new(2);
const AUTHOR: UserId = UserId::new(1);
const TRANSLATOR: UserId = UserId::new(2);
const ROOT: ContainerRef = ContainerRef::new(1);

/// Runs the demo command.
pub fn run(path: &Path, force: bool) -> Result<(), Box<dyn std::error::Error>> {
    if path.exists() && !force {
        return Err(format!("{:?} already exists (use --force to overwrite)", path).into());
    }

    let repo = build()?;
    let dump = repo.export()?;
    dump.save(path)?;

    println!("Wrote {} objects to {}", dump.objects.len(), path.display());
    Ok(())
}

fn page(title: &str, text: &str, caption: &str) -> ContentDraft {
    ContentDraft::new(title)
        .with_group("body", TEXT, [("text", FieldContent::text(text))])
        .with_group(
            "gallery",
            GALLERY,
            [
                ("caption", FieldContent::text(caption)),
                ("columns", FieldContent::Integer(3)),
            ],
        )
}

/// Builds the sample repository.
///
/// The German home page is published at 2.0, edited on to 2.2 (the last
/// step restores its body from 1.0) and left locked by the translator. Its
/// English variant sits at 1.0.
pub fn build() -> Result<Repository, Box<dyn std::error::Error>> {
    let definitions = Arc::new(InMemoryDefinitions::with_definitions([TEXT, GALLERY]));
    let repo = Repository::builder()
        .definitions(definitions as Arc<dyn DefinitionRegistry>)
        .build();

    let home = repo.create(
        NewObject::page(ROOT, page("Startseite", "Willkommen", "Sommer"), AUTHOR)
            .in_language("de"),
    )?;
    let first = repo
        .latest(home.id)?
        .ok_or("new page has no version")?;
    info!(object = %home.id, "created home page");

    repo.acquire(home.id, AUTHOR)?;
    repo.save(
        home.id,
        AUTHOR,
        &page("Startseite", "Herzlich willkommen", "Sommer"),
        SaveOptions::major(),
    )?;
    repo.release(home.id, AUTHOR, SaveOptions::draft_only())?;
    repo.publish(home.id)?;

    repo.acquire(home.id, AUTHOR)?;
    repo.save(
        home.id,
        AUTHOR,
        &page("Startseite", "Herzlich willkommen", "Herbst"),
        SaveOptions::minor(),
    )?;
    repo.release(home.id, AUTHOR, SaveOptions::draft_only())?;

    let english = repo.translate(&TranslateRequest::new(home.id, "en", TRANSLATOR))?;
    info!(object = %english.id, "created english variant");

    repo.restore_field_group(home.id, "body", first.timestamp, TRANSLATOR)?;
    repo.acquire(home.id, TRANSLATOR)?;

    Ok(repo)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;
    use vellum_core::{PublishStatus, VersionNumber};

    #[test]
    fn test_demo_store_is_consistent() {
        let repo = build().unwrap();
        assert!(repo.verify().unwrap().is_clean());

        let dump = repo.export().unwrap();
        let home = &dump.objects[0];
        assert_eq!(home.current_version, Some(VersionNumber::new(2, 2)));
        assert_eq!(repo.status(home.id).unwrap(), PublishStatus::Modified);
        assert_eq!(
            repo.render_for_publish(home.id).unwrap().version,
            Some(VersionNumber::new(2, 0))
        );
    }

    #[test]
    fn test_demo_refuses_to_overwrite() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("store.json");
        run(&path, false).unwrap();
        assert!(run(&path, false).is_err());
        run(&path, true).unwrap();
    }
}
