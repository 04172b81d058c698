//! History command implementation.

use serde::Serialize;
use std::path::Path;
use vellum_core::{ContentSnapshot, ObjectId, StoreDump};

/// One ledger entry as shown to the user.
#[derive(Debug, Serialize)]
pub struct HistoryEntry {
    /// 1-based append position.
    pub sequence: u64,
    /// Dotted version number.
    pub number: String,
    /// Append time in milliseconds since the epoch.
    pub timestamp: u64,
    /// Authoring user.
    pub editor: u32,
    /// Whether this is the published version.
    pub published: bool,
    /// Leading bytes of the content digest, hex encoded.
    pub digest: String,
    /// Field-group names captured in this version.
    pub groups: Vec<String>,
    /// Full content (if requested).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<ContentSnapshot>,
}

/// Runs the history command.
pub fn run(
    path: &Path,
    object: u64,
    show_content: bool,
    format: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let (dump, _repo) = super::open(path)?;
    let object = ObjectId::new(object);
    let entries = collect(&dump, object, show_content)?;

    match format {
        "json" => {
            println!("{}", serde_json::to_string_pretty(&entries)?);
        }
        _ => {
            println!("History of {}", object);
            println!();
            for entry in &entries {
                println!(
                    "  #{:<3} v{:<6} {}ms  user:{}  {}  [{}]{}",
                    entry.sequence,
                    entry.number,
                    entry.timestamp,
                    entry.editor,
                    entry.digest,
                    entry.groups.join(", "),
                    if entry.published { "  (published)" } else { "" },
                );
                if let Some(content) = &entry.content {
                    println!("{}", serde_json::to_string_pretty(content)?);
                }
            }
        }
    }

    Ok(())
}

/// Lists the ledger of `object`, marking the published version.
pub fn collect(
    dump: &StoreDump,
    object: ObjectId,
    show_content: bool,
) -> Result<Vec<HistoryEntry>, Box<dyn std::error::Error>> {
    if !dump.objects.iter().any(|o| o.id == object) {
        return Err(format!("{} not found", object).into());
    }
    let published = dump
        .published
        .iter()
        .find(|p| p.object == object)
        .map(|p| p.number);

    Ok(dump
        .ledger(object)
        .iter()
        .map(|v| HistoryEntry {
            sequence: v.sequence,
            number: v.number.to_string(),
            timestamp: v.timestamp.as_millis(),
            editor: v.editor.as_u32(),
            published: published == Some(v.number),
            digest: super::short_digest(&v.digest),
            groups: v.content.groups.keys().cloned().collect(),
            content: show_content.then(|| (*v.content).clone()),
        })
        .collect())
}
