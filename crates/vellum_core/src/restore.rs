//! Restore engine.
//!
//! Restoring never rewrites history: the content of a historical version is
//! copied onto the live object and a brand-new version is appended. Global
//! IDs already present on the live object always survive; only content
//! moves.

use crate::clock::Clock;
use crate::config::Config;
use crate::error::{CoreError, CoreResult};
use crate::identity::{GlobalId, IdentityAllocator};
use crate::ledger::VersionLedger;
use crate::lock::{ensure_editable, live_object, KeyedRegions};
use crate::model::{ContentSnapshot, FieldGroup, FieldValue, Version, Versionable};
use crate::registry::DefinitionRegistry;
use crate::store::{LockStore, ObjectStore};
use crate::types::{ObjectId, Timestamp, UserId};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::info;

/// Which part of a historical snapshot is copied onto the live object.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestoreScope<'a> {
    /// The name and every field-group.
    Object,
    /// Exactly one field-group; siblings keep their current content.
    FieldGroup(&'a str),
}

/// Where identities come from for field-groups and values the live object
/// does not have yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdentityPolicy {
    /// Reuse the IDs recorded in the snapshot. Only valid when the snapshot
    /// comes from the same object's own ledger.
    Historical,
    /// Allocate fresh IDs. Used when copying another object's content.
    Fresh,
}

/// Copies historical content onto live objects.
pub struct RestoreEngine {
    objects: Arc<dyn ObjectStore>,
    locks: Arc<dyn LockStore>,
    ledger: Arc<VersionLedger>,
    regions: Arc<KeyedRegions<ObjectId>>,
    definitions: Arc<dyn DefinitionRegistry>,
    allocator: Arc<dyn IdentityAllocator>,
    clock: Arc<dyn Clock>,
    major: bool,
}

impl RestoreEngine {
    /// Creates a restore engine.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        objects: Arc<dyn ObjectStore>,
        locks: Arc<dyn LockStore>,
        ledger: Arc<VersionLedger>,
        regions: Arc<KeyedRegions<ObjectId>>,
        definitions: Arc<dyn DefinitionRegistry>,
        allocator: Arc<dyn IdentityAllocator>,
        clock: Arc<dyn Clock>,
        config: &Config,
    ) -> Self {
        Self {
            objects,
            locks,
            ledger,
            regions,
            definitions,
            allocator,
            clock,
            major: config.restore_major,
        }
    }

    /// Restores the whole object to the latest version at or before `target`.
    ///
    /// Always appends exactly one version, even if the content already
    /// matches.
    ///
    /// # Errors
    ///
    /// Returns `VersionNotFound` if the history starts after `target`, and
    /// `LockConflict` if another user is editing the object.
    pub fn restore_object(
        &self,
        object: ObjectId,
        target: Timestamp,
        editor: UserId,
    ) -> CoreResult<Version> {
        self.restore(object, target, editor, RestoreScope::Object)
    }

    /// Restores one named field-group, leaving its siblings untouched.
    ///
    /// If the group did not exist at `target` it is removed from the live
    /// object.
    ///
    /// # Errors
    ///
    /// Returns `FieldGroupNotFound` if the group exists neither now nor at
    /// `target`, plus the errors of [`RestoreEngine::restore_object`].
    pub fn restore_field_group(
        &self,
        object: ObjectId,
        name: &str,
        target: Timestamp,
        editor: UserId,
    ) -> CoreResult<Version> {
        self.restore(object, target, editor, RestoreScope::FieldGroup(name))
    }

    fn restore(
        &self,
        object: ObjectId,
        target: Timestamp,
        editor: UserId,
        scope: RestoreScope<'_>,
    ) -> CoreResult<Version> {
        self.regions.run(&object, || {
            let mut record = live_object(self.objects.as_ref(), object)?;
            ensure_editable(self.locks.as_ref(), object, editor, self.clock.now())?;

            let source = self.ledger.version_at(object, target)?;
            self.apply(&mut record, &source.content, scope, IdentityPolicy::Historical)?;

            let version = self.ledger.append(
                object,
                record.current_version,
                &record.draft,
                editor,
                false,
                self.major,
            )?;
            record.current_version = Some(version.number);
            self.objects.update_object(&record)?;

            info!(
                %object,
                from = %source.number,
                to = %version.number,
                scope = ?scope,
                "restored"
            );
            Ok(version)
        })
    }

    /// Overlays `source` onto any versioned entity.
    ///
    /// Field-groups whose definition no longer exists are dropped. The
    /// entity's own global ID is never touched.
    ///
    /// # Errors
    ///
    /// Returns `FieldGroupNotFound` for a scoped restore of a group that is
    /// in neither snapshot.
    pub fn apply<V: Versionable>(
        &self,
        entity: &mut V,
        source: &ContentSnapshot,
        scope: RestoreScope<'_>,
        identities: IdentityPolicy,
    ) -> CoreResult<()> {
        let current = entity.field_groups();
        let merged = match scope {
            RestoreScope::Object => {
                let groups = source
                    .groups
                    .values()
                    .filter(|group| self.definition_survives(entity.id(), group))
                    .map(|group| {
                        let restored = self.adopt(current.group(&group.name), group, identities);
                        (group.name.clone(), restored)
                    })
                    .collect();
                ContentSnapshot {
                    name: source.name.clone(),
                    groups,
                }
            }
            RestoreScope::FieldGroup(name) => {
                let live = current.group(name);
                let historical = source.group(name);
                if live.is_none() && historical.is_none() {
                    return Err(CoreError::FieldGroupNotFound {
                        object: entity.id(),
                        name: name.to_string(),
                    });
                }

                let mut merged = current.clone();
                match historical {
                    Some(group) if self.definition_survives(entity.id(), group) => {
                        let restored = self.adopt(live, group, identities);
                        merged.groups.insert(name.to_string(), restored);
                    }
                    _ => {
                        merged.groups.remove(name);
                    }
                }
                merged
            }
        };

        entity.apply_snapshot(merged);
        Ok(())
    }

    fn definition_survives(&self, object: ObjectId, group: &FieldGroup) -> bool {
        let exists = self.definitions.exists(group.definition);
        if !exists {
            info!(
                %object,
                group = %group.name,
                definition = %group.definition,
                "dropping field group with deleted definition"
            );
        }
        exists
    }

    /// Builds the restored group: content from `historical`, identities from
    /// `live` where it has them.
    fn adopt(
        &self,
        live: Option<&FieldGroup>,
        historical: &FieldGroup,
        identities: IdentityPolicy,
    ) -> FieldGroup {
        let resolve = |existing: Option<GlobalId>, recorded: GlobalId| match (existing, identities) {
            (Some(id), _) => id,
            (None, IdentityPolicy::Historical) => recorded,
            (None, IdentityPolicy::Fresh) => self.allocator.global_id(),
        };

        let values: BTreeMap<String, FieldValue> = historical
            .values
            .iter()
            .map(|(field, value)| {
                let existing = live.and_then(|g| g.values.get(field)).map(|v| v.global_id);
                let restored = FieldValue {
                    global_id: resolve(existing, value.global_id),
                    content: value.content.clone(),
                };
                (field.clone(), restored)
            })
            .collect();

        FieldGroup {
            global_id: resolve(live.map(|g| g.global_id), historical.global_id),
            name: historical.name.clone(),
            definition: historical.definition,
            values,
        }
    }
}

impl std::fmt::Debug for RestoreEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RestoreEngine")
            .field("major", &self.major)
            .finish_non_exhaustive()
    }
}
