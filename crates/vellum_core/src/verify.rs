//! Integrity verification of store state.
//!
//! Checks a [`StoreDump`] against the model invariants: ledger numbering
//! follows the generator, timestamps strictly increase, digests match the
//! stored content, publish pointers resolve, every
//! `(content set, language)` slot has at most one occupant, and variants
//! sync only with objects of their own content set.

use crate::model::Version;
use crate::store::StoreDump;
use crate::types::{ContentSetId, Language, ObjectId};
use crate::version_number::{next_version, VersionNumber};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// A single invariant violation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Issue {
    /// Stored content does not hash to the stored digest.
    DigestMismatch {
        /// Affected object.
        object: ObjectId,
        /// Affected version.
        number: VersionNumber,
    },
    /// A version number is not a valid successor of its predecessor.
    BadSuccessor {
        /// Affected object.
        object: ObjectId,
        /// Predecessor, `None` for the first version.
        previous: Option<VersionNumber>,
        /// Offending number.
        number: VersionNumber,
    },
    /// A timestamp does not exceed its predecessor's.
    TimestampNotIncreasing {
        /// Affected object.
        object: ObjectId,
        /// Offending version.
        number: VersionNumber,
    },
    /// More than one stored version carries the published flag.
    MultiplePublished {
        /// Affected object.
        object: ObjectId,
        /// Number of flagged versions.
        count: usize,
    },
    /// The publish pointer names a version that is not in the ledger.
    DanglingPublishPointer {
        /// Affected object.
        object: ObjectId,
        /// The missing version.
        number: VersionNumber,
    },
    /// The object's current version is not its ledger head.
    HeadMismatch {
        /// Affected object.
        object: ObjectId,
        /// What the object record says.
        recorded: Option<VersionNumber>,
        /// What the ledger says.
        head: Option<VersionNumber>,
    },
    /// A ledger exists for an object that does not.
    OrphanLedger {
        /// The missing object.
        object: ObjectId,
    },
    /// Several objects occupy one variant slot.
    DuplicateVariant {
        /// The content set.
        content_set: ContentSetId,
        /// The contended language.
        language: Language,
        /// All occupants.
        objects: Vec<ObjectId>,
    },
    /// A variant is synced with an object outside its content set.
    SyncOutsideContentSet {
        /// The variant.
        object: ObjectId,
        /// Its sync source.
        source: ObjectId,
    },
}

impl fmt::Display for Issue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DigestMismatch { object, number } => {
                write!(f, "{object} v{number}: digest mismatch")
            }
            Self::BadSuccessor {
                object,
                previous: Some(previous),
                number,
            } => write!(f, "{object}: v{number} does not follow v{previous}"),
            Self::BadSuccessor {
                object,
                previous: None,
                number,
            } => write!(f, "{object}: history starts at v{number}"),
            Self::TimestampNotIncreasing { object, number } => {
                write!(f, "{object} v{number}: timestamp not after predecessor")
            }
            Self::MultiplePublished { object, count } => {
                write!(f, "{object}: {count} versions flagged published")
            }
            Self::DanglingPublishPointer { object, number } => {
                write!(f, "{object}: published v{number} is not in the ledger")
            }
            Self::HeadMismatch {
                object,
                recorded,
                head,
            } => write!(f, "{object}: current version {recorded:?} but ledger head {head:?}"),
            Self::OrphanLedger { object } => write!(f, "{object}: ledger without object"),
            Self::DuplicateVariant {
                content_set,
                language,
                objects,
            } => write!(f, "{content_set}/{language}: occupied by {objects:?}"),
            Self::SyncOutsideContentSet { object, source } => {
                write!(f, "{object}: synced with {source} from another content set")
            }
        }
    }
}

/// Outcome of a verification run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VerifyReport {
    /// Objects checked.
    pub objects: usize,
    /// Versions checked.
    pub versions: usize,
    /// Violations found.
    pub issues: Vec<Issue>,
}

impl VerifyReport {
    /// Returns true if no violation was found.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.issues.is_empty()
    }
}

/// Verifies every invariant over a dump.
#[must_use]
pub fn verify_dump(dump: &StoreDump) -> VerifyReport {
    let mut report = VerifyReport {
        objects: dump.objects.len(),
        ..VerifyReport::default()
    };

    let known: BTreeSet<ObjectId> = dump.objects.iter().map(|o| o.id).collect();
    for ledger in &dump.ledgers {
        if !known.contains(&ledger.object) {
            report.issues.push(Issue::OrphanLedger {
                object: ledger.object,
            });
        }
        report.versions += ledger.versions.len();
        check_ledger(ledger.object, &ledger.versions, &mut report.issues);
    }

    for object in &dump.objects {
        let head = dump.ledger(object.id).last().map(|v| v.number);
        if head != object.current_version {
            report.issues.push(Issue::HeadMismatch {
                object: object.id,
                recorded: object.current_version,
                head,
            });
        }
    }

    for pointer in &dump.published {
        let exists = dump
            .ledger(pointer.object)
            .iter()
            .any(|v| v.number == pointer.number);
        if !exists {
            report.issues.push(Issue::DanglingPublishPointer {
                object: pointer.object,
                number: pointer.number,
            });
        }
    }

    let mut slots: BTreeMap<(ContentSetId, Language), Vec<ObjectId>> = BTreeMap::new();
    for object in &dump.objects {
        if let Some(key) = object.variant_key() {
            slots.entry(key).or_default().push(object.id);
        }
    }
    for ((content_set, language), objects) in slots {
        if objects.len() > 1 {
            report.issues.push(Issue::DuplicateVariant {
                content_set,
                language,
                objects,
            });
        }
    }

    let sets: BTreeMap<ObjectId, Option<ContentSetId>> =
        dump.objects.iter().map(|o| (o.id, o.content_set)).collect();
    for object in &dump.objects {
        let Some(sync) = &object.synced_with else {
            continue;
        };
        match sets.get(&sync.source) {
            Some(source_set) if *source_set != object.content_set => {
                report.issues.push(Issue::SyncOutsideContentSet {
                    object: object.id,
                    source: sync.source,
                });
            }
            _ => {}
        }
    }

    report
}

fn check_ledger(object: ObjectId, versions: &[Version], issues: &mut Vec<Issue>) {
    let mut previous: Option<&Version> = None;
    for version in versions {
        let head = previous.map(|p| p.number);
        let successors = [false, true].map(|major| next_version(head, major).ok());
        if !successors.contains(&Some(version.number)) {
            issues.push(Issue::BadSuccessor {
                object,
                previous: previous.map(|p| p.number),
                number: version.number,
            });
        }
        if let Some(p) = previous {
            if version.timestamp <= p.timestamp {
                issues.push(Issue::TimestampNotIncreasing {
                    object,
                    number: version.number,
                });
            }
        }
        if !matches!(version.verify_digest(), Ok(true)) {
            issues.push(Issue::DigestMismatch {
                object,
                number: version.number,
            });
        }
        previous = Some(version);
    }

    let flagged = versions.iter().filter(|v| v.published).count();
    if flagged > 1 {
        issues.push(Issue::MultiplePublished {
            object,
            count: flagged,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::{GlobalId, SequentialAllocator};
    use crate::model::{
        ContentDraft, ContentObject, ContentSnapshot, FieldContent, ObjectKind, SyncPointer,
    };
    use crate::store::{LedgerDump, PublishedDump, DUMP_FORMAT_VERSION};
    use crate::types::{ContainerRef, DefinitionId, Timestamp, UserId};
    use std::sync::Arc;

    fn version(number: VersionNumber, at: u64, text: &str) -> Version {
        let draft = ContentDraft::new("p").with_group(
            "body",
            DefinitionId::new(1),
            [("text", FieldContent::text(text))],
        );
        let content = ContentSnapshot::default().apply_draft(&draft, &SequentialAllocator::new());
        Version {
            sequence: u64::from(number.minor) + 1,
            number,
            timestamp: Timestamp::from_millis(at),
            editor: UserId::new(1),
            published: false,
            digest: content.digest().unwrap(),
            content: Arc::new(content),
        }
    }

    fn object(id: u64, current: Option<VersionNumber>) -> ContentObject {
        let mut object = ContentObject::new(
            ObjectId::new(id),
            GlobalId::random(),
            ObjectKind::Page,
            ContainerRef::new(1),
            None,
            ContentSnapshot::default(),
        );
        object.current_version = current;
        object
    }

    fn dump(objects: Vec<ContentObject>, ledgers: Vec<LedgerDump>) -> StoreDump {
        StoreDump {
            format_version: DUMP_FORMAT_VERSION,
            objects,
            ledgers,
            locks: Vec::new(),
            published: Vec::new(),
        }
    }

    #[test]
    fn clean_dump_passes() {
        let versions = vec![
            version(VersionNumber::FIRST, 10, "a"),
            version(VersionNumber::new(1, 1), 20, "b"),
            version(VersionNumber::new(2, 0), 30, "c"),
        ];
        let d = dump(
            vec![object(1, Some(VersionNumber::new(2, 0)))],
            vec![LedgerDump {
                object: ObjectId::new(1),
                versions,
            }],
        );
        let report = verify_dump(&d);
        assert!(report.is_clean(), "{:?}", report.issues);
        assert_eq!(report.versions, 3);
    }

    #[test]
    fn detects_tampering_and_ordering() {
        let mut tampered = version(VersionNumber::new(1, 1), 5, "b");
        tampered.digest = [0; 32];
        let versions = vec![
            version(VersionNumber::FIRST, 10, "a"),
            tampered,
            version(VersionNumber::new(1, 3), 30, "c"),
        ];
        let mut d = dump(
            vec![object(1, Some(VersionNumber::FIRST))],
            vec![LedgerDump {
                object: ObjectId::new(1),
                versions,
            }],
        );
        d.published.push(PublishedDump {
            object: ObjectId::new(1),
            number: VersionNumber::new(9, 0),
        });

        let issues = verify_dump(&d).issues;
        assert!(issues.iter().any(|i| matches!(i, Issue::DigestMismatch { .. })));
        assert!(issues
            .iter()
            .any(|i| matches!(i, Issue::TimestampNotIncreasing { .. })));
        assert!(issues.iter().any(|i| matches!(i, Issue::BadSuccessor { .. })));
        assert!(issues.iter().any(|i| matches!(i, Issue::HeadMismatch { .. })));
        assert!(issues
            .iter()
            .any(|i| matches!(i, Issue::DanglingPublishPointer { .. })));
    }

    #[test]
    fn detects_duplicate_variants_and_orphans() {
        let mut a = object(1, None);
        let mut b = object(2, None);
        for o in [&mut a, &mut b] {
            o.content_set = Some(ContentSetId::new(7));
            o.language = Some(Language::new("en"));
        }
        let d = dump(
            vec![a, b],
            vec![LedgerDump {
                object: ObjectId::new(99),
                versions: Vec::new(),
            }],
        );
        let issues = verify_dump(&d).issues;
        assert!(issues.contains(&Issue::OrphanLedger {
            object: ObjectId::new(99)
        }));
        assert!(issues.iter().any(|i| matches!(
            i,
            Issue::DuplicateVariant { objects, .. } if objects.len() == 2
        )));
    }

    #[test]
    fn detects_variant_synced_across_content_sets() {
        let mut source = object(1, None);
        source.content_set = Some(ContentSetId::new(3));
        let mut variant = object(2, None);
        variant.content_set = Some(ContentSetId::new(4));
        variant.language = Some(Language::new("en"));
        variant.synced_with = Some(SyncPointer {
            source: ObjectId::new(1),
            version_timestamp: Timestamp::from_millis(1),
        });
        let mut sibling = variant.clone();
        sibling.id = ObjectId::new(3);
        sibling.content_set = Some(ContentSetId::new(3));
        sibling.language = Some(Language::new("fr"));

        let issues = verify_dump(&dump(vec![source, variant, sibling], Vec::new())).issues;
        assert_eq!(
            issues,
            vec![Issue::SyncOutsideContentSet {
                object: ObjectId::new(2),
                source: ObjectId::new(1),
            }]
        );
    }
}
