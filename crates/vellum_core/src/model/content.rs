//! Field-groups, field values and content snapshots.

use crate::error::CoreResult;
use crate::identity::{GlobalId, IdentityAllocator};
use crate::types::DefinitionId;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;

/// The content of a single field value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum FieldContent {
    /// No content.
    Empty,
    /// Text content.
    Text(String),
    /// Integer content.
    Integer(i64),
    /// Boolean content.
    Boolean(bool),
    /// Reference to another entity by global ID.
    Reference(GlobalId),
}

impl FieldContent {
    /// Creates a text value.
    #[must_use]
    pub fn text(value: impl Into<String>) -> Self {
        Self::Text(value.into())
    }
}

/// A leaf value inside a field-group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldValue {
    /// Identity of this value.
    pub global_id: GlobalId,
    /// The value itself.
    pub content: FieldContent,
}

/// A named sub-structure of a content object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldGroup {
    /// Identity of this field-group, stable across restores.
    pub global_id: GlobalId,
    /// Name of the field-group within its object.
    pub name: String,
    /// The definition this field-group instantiates.
    pub definition: DefinitionId,
    /// Values keyed by field name.
    pub values: BTreeMap<String, FieldValue>,
}

impl FieldGroup {
    /// Returns the content of the named field.
    #[must_use]
    pub fn value(&self, field: &str) -> Option<&FieldContent> {
        self.values.get(field).map(|v| &v.content)
    }

    /// Compares definitions and values, ignoring identities.
    #[must_use]
    pub fn same_content(&self, other: &FieldGroup) -> bool {
        self.definition == other.definition
            && self.values.len() == other.values.len()
            && self
                .values
                .iter()
                .zip(other.values.iter())
                .all(|((ka, va), (kb, vb))| ka == kb && va.content == vb.content)
    }
}

/// Structural capture of an object's versioned content.
///
/// The name and every field-group are versioned. Location attributes are
/// not; they live on [`crate::ContentObject`] and are always resolved live.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ContentSnapshot {
    /// Display name of the object.
    pub name: String,
    /// Field-groups keyed by name.
    pub groups: BTreeMap<String, FieldGroup>,
}

impl ContentSnapshot {
    /// Creates an empty snapshot with the given name.
    #[must_use]
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            groups: BTreeMap::new(),
        }
    }

    /// Returns the named field-group.
    #[must_use]
    pub fn group(&self, name: &str) -> Option<&FieldGroup> {
        self.groups.get(name)
    }

    /// Structural equality of content: names, definitions and values.
    ///
    /// Global IDs are identity, not content, and are ignored.
    #[must_use]
    pub fn same_content(&self, other: &ContentSnapshot) -> bool {
        self.name == other.name
            && self.groups.len() == other.groups.len()
            && self
                .groups
                .iter()
                .zip(other.groups.iter())
                .all(|((ka, ga), (kb, gb))| ka == kb && ga.same_content(gb))
    }

    /// Returns every global ID in this snapshot (field-groups and values).
    #[must_use]
    pub fn global_ids(&self) -> Vec<GlobalId> {
        let mut ids = Vec::new();
        for group in self.groups.values() {
            ids.push(group.global_id);
            ids.extend(group.values.values().map(|v| v.global_id));
        }
        ids
    }

    /// SHA-256 over the canonical JSON encoding of this snapshot.
    pub fn digest(&self) -> CoreResult<[u8; 32]> {
        let bytes = serde_json::to_vec(self)?;
        Ok(Sha256::digest(&bytes).into())
    }

    /// Produces the working copy that results from applying an editor's draft.
    ///
    /// Field-groups and values are matched by name: matches keep their
    /// existing global ID, everything new receives one from `ids`.
    #[must_use]
    pub fn apply_draft(&self, draft: &ContentDraft, ids: &dyn IdentityAllocator) -> ContentSnapshot {
        let groups = draft
            .groups
            .iter()
            .map(|(name, proposed)| {
                let existing = self.groups.get(name);
                let global_id = existing.map_or_else(|| ids.global_id(), |g| g.global_id);
                let values = proposed
                    .values
                    .iter()
                    .map(|(field, content)| {
                        let global_id = existing
                            .and_then(|g| g.values.get(field))
                            .map_or_else(|| ids.global_id(), |v| v.global_id);
                        let value = FieldValue {
                            global_id,
                            content: content.clone(),
                        };
                        (field.clone(), value)
                    })
                    .collect();
                let group = FieldGroup {
                    global_id,
                    name: name.clone(),
                    definition: proposed.definition,
                    values,
                };
                (name.clone(), group)
            })
            .collect();

        ContentSnapshot {
            name: draft.name.clone(),
            groups,
        }
    }

    /// Strips identities, producing a draft with the same content.
    #[must_use]
    pub fn to_draft(&self) -> ContentDraft {
        ContentDraft {
            name: self.name.clone(),
            groups: self
                .groups
                .iter()
                .map(|(name, group)| {
                    let values = group
                        .values
                        .iter()
                        .map(|(field, value)| (field.clone(), value.content.clone()))
                        .collect();
                    let draft = FieldGroupDraft {
                        definition: group.definition,
                        values,
                    };
                    (name.clone(), draft)
                })
                .collect(),
        }
    }
}

/// Content proposed by an editor. Carries no identities.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ContentDraft {
    /// Proposed name.
    pub name: String,
    /// Proposed field-groups keyed by name.
    pub groups: BTreeMap<String, FieldGroupDraft>,
}

/// A field-group as proposed by an editor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldGroupDraft {
    /// Definition of the field-group.
    pub definition: DefinitionId,
    /// Field contents keyed by field name.
    pub values: BTreeMap<String, FieldContent>,
}

impl ContentDraft {
    /// Creates a draft with a name and no field-groups.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            groups: BTreeMap::new(),
        }
    }

    /// Adds or replaces a field-group.
    #[must_use]
    pub fn with_group<K, I>(mut self, name: &str, definition: DefinitionId, values: I) -> Self
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, FieldContent)>,
    {
        let values = values.into_iter().map(|(k, v)| (k.into(), v)).collect();
        self.groups
            .insert(name.to_string(), FieldGroupDraft { definition, values });
        self
    }

    /// Removes a field-group.
    #[must_use]
    pub fn without_group(mut self, name: &str) -> Self {
        self.groups.remove(name);
        self
    }

    /// Sets a single field, creating the field-group entry if needed.
    #[must_use]
    pub fn with_value(
        mut self,
        group: &str,
        definition: DefinitionId,
        field: &str,
        content: FieldContent,
    ) -> Self {
        self.groups
            .entry(group.to_string())
            .or_insert_with(|| FieldGroupDraft {
                definition,
                values: BTreeMap::new(),
            })
            .values
            .insert(field.to_string(), content);
        self
    }

    /// Renames the draft.
    #[must_use]
    pub fn renamed(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::SequentialAllocator;

    fn draft() -> ContentDraft {
        ContentDraft::new("Home")
            .with_group("intro", DefinitionId::new(1), [("text", FieldContent::text("hi"))])
            .with_group(
                "teaser",
                DefinitionId::new(2),
                [("title", FieldContent::text("t")), ("count", FieldContent::Integer(3))],
            )
    }

    #[test]
    fn apply_draft_allocates_new_identities() {
        let ids = SequentialAllocator::new();
        let snap = ContentSnapshot::named("Home").apply_draft(&draft(), &ids);
        assert_eq!(snap.groups.len(), 2);
        let all = snap.global_ids();
        assert_eq!(all.len(), 5);
        let unique: std::collections::HashSet<_> = all.iter().collect();
        assert_eq!(unique.len(), 5);
    }

    #[test]
    fn apply_draft_keeps_identities_by_name() {
        let ids = SequentialAllocator::new();
        let first = ContentSnapshot::named("Home").apply_draft(&draft(), &ids);
        let edited = draft().with_value("intro", DefinitionId::new(1), "text", FieldContent::text("bye"));
        let second = first.apply_draft(&edited, &ids);

        let a = first.group("intro").unwrap();
        let b = second.group("intro").unwrap();
        assert_eq!(a.global_id, b.global_id);
        assert_eq!(a.values["text"].global_id, b.values["text"].global_id);
        assert_eq!(b.value("text"), Some(&FieldContent::text("bye")));
    }

    #[test]
    fn same_content_ignores_identity() {
        let ids = SequentialAllocator::new();
        let a = ContentSnapshot::named("Home").apply_draft(&draft(), &ids);
        let b = ContentSnapshot::named("Home").apply_draft(&draft(), &ids);
        assert_ne!(a, b);
        assert!(a.same_content(&b));
    }

    #[test]
    fn same_content_detects_changes() {
        let ids = SequentialAllocator::new();
        let a = ContentSnapshot::named("Home").apply_draft(&draft(), &ids);
        let renamed = a.apply_draft(&draft().renamed("Start"), &ids);
        let removed = a.apply_draft(&draft().without_group("teaser"), &ids);
        assert!(!a.same_content(&renamed));
        assert!(!a.same_content(&removed));
    }

    #[test]
    fn to_draft_round_trips_content() {
        let ids = SequentialAllocator::new();
        let snap = ContentSnapshot::named("Home").apply_draft(&draft(), &ids);
        assert_eq!(snap.to_draft(), draft());
    }

    #[test]
    fn digest_changes_with_content() {
        let ids = SequentialAllocator::new();
        let a = ContentSnapshot::named("Home").apply_draft(&draft(), &ids);
        let b = a.apply_draft(&draft().renamed("Other"), &ids);
        assert_eq!(a.digest().unwrap(), a.clone().digest().unwrap());
        assert_ne!(a.digest().unwrap(), b.digest().unwrap());
    }
}
