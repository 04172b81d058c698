//! Inspect command implementation.

use serde::Serialize;
use std::collections::BTreeSet;
use std::path::Path;
use vellum_core::{ObjectKind, Repository, StoreDump};

/// Store inspection result.
#[derive(Debug, Serialize)]
pub struct InspectResult {
    /// Dump path.
    pub path: String,
    /// Dump format version.
    pub format_version: u32,
    /// Number of live objects.
    pub object_count: usize,
    /// Number of objects in the wastebin.
    pub deleted_count: usize,
    /// Number of versions across all ledgers.
    pub version_count: usize,
    /// Number of held edit locks.
    pub lock_count: usize,
    /// Number of held locks past their timeout.
    pub expired_lock_count: usize,
    /// Number of objects with a published version.
    pub published_count: usize,
    /// Number of distinct content sets.
    pub content_set_count: usize,
    /// Per-object details (if requested).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub objects: Option<Vec<ObjectSummary>>,
}

/// Summary of a single object.
#[derive(Debug, Serialize)]
pub struct ObjectSummary {
    /// Object ID.
    pub id: u64,
    /// Object name from the working copy.
    pub name: String,
    /// Concrete kind.
    pub kind: ObjectKind,
    /// Language code.
    pub language: Option<String>,
    /// Content set ID.
    pub content_set: Option<u64>,
    /// Current version number.
    pub version: Option<String>,
    /// Number of versions in the ledger.
    pub versions: usize,
    /// Publication state, or `deleted`.
    pub status: String,
    /// Lock owner, if locked.
    pub locked_by: Option<u32>,
}

/// Runs the inspect command.
pub fn run(path: &Path, show_objects: bool, format: &str) -> Result<(), Box<dyn std::error::Error>> {
    let (dump, repo) = super::open(path)?;
    let result = collect(path, &dump, &repo, show_objects)?;

    match format {
        "json" => {
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        _ => {
            print_text_output(&result);
        }
    }

    Ok(())
}

/// Gathers statistics from a dump and the repository rebuilt over it.
pub fn collect(
    path: &Path,
    dump: &StoreDump,
    repo: &Repository,
    show_objects: bool,
) -> Result<InspectResult, Box<dyn std::error::Error>> {
    let mut result = InspectResult {
        path: path.display().to_string(),
        format_version: dump.format_version,
        object_count: 0,
        deleted_count: 0,
        version_count: dump.ledgers.iter().map(|l| l.versions.len()).sum(),
        lock_count: dump.locks.len(),
        expired_lock_count: 0,
        published_count: dump.published.len(),
        content_set_count: 0,
        objects: None,
    };

    let mut content_sets = BTreeSet::new();
    let mut summaries = Vec::new();
    for object in &dump.objects {
        if object.is_deleted() {
            result.deleted_count += 1;
        } else {
            result.object_count += 1;
        }
        if let Some(set) = object.content_set {
            content_sets.insert(set);
        }

        let lock = repo.lock_info(object.id)?;
        if lock.as_ref().is_some_and(|l| l.expired) {
            result.expired_lock_count += 1;
        }

        if show_objects {
            let status = if object.is_deleted() {
                "deleted".to_string()
            } else {
                repo.status(object.id)?.to_string()
            };
            summaries.push(ObjectSummary {
                id: object.id.as_u64(),
                name: object.draft.name.clone(),
                kind: object.kind,
                language: object.language.as_ref().map(|l| l.as_str().to_string()),
                content_set: object.content_set.map(|s| s.as_u64()),
                version: object.current_version.map(|v| v.to_string()),
                versions: dump.ledger(object.id).len(),
                status,
                locked_by: lock.map(|l| l.lock.owner.as_u32()),
            });
        }
    }
    result.content_set_count = content_sets.len();
    if show_objects {
        result.objects = Some(summaries);
    }

    Ok(result)
}

fn print_text_output(result: &InspectResult) {
    println!("Vellum Store Inspection");
    println!("=======================");
    println!();
    println!("Path: {}", result.path);
    println!("Format version: {}", result.format_version);
    println!();
    println!("Objects:");
    println!("  Live objects:  {}", result.object_count);
    println!("  In wastebin:   {}", result.deleted_count);
    println!("  Content sets:  {}", result.content_set_count);
    println!();
    println!("Versions:");
    println!("  Total versions: {}", result.version_count);
    println!("  Published:      {}", result.published_count);
    println!();
    println!("Locks:");
    println!("  Held:    {}", result.lock_count);
    println!("  Expired: {}", result.expired_lock_count);

    if let Some(objects) = &result.objects {
        println!();
        println!("Objects:");
        for object in objects {
            println!(
                "  [{}] {:?} {:?} lang={} v{} ({} versions) {}{}",
                object.id,
                object.kind,
                object.name,
                object.language.as_deref().unwrap_or("-"),
                object.version.as_deref().unwrap_or("-"),
                object.versions,
                object.status,
                object
                    .locked_by
                    .map(|u| format!(" locked by user:{}", u))
                    .unwrap_or_default(),
            );
        }
    }
}
