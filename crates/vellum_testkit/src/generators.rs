//! Property-based test generators using proptest.
//!
//! Provides strategies for version numbers, field contents, drafts and edit
//! scripts. Drafts only reference the fixture definitions, so they are
//! always accepted by a [`crate::TestRepository`].

use crate::fixtures::{GALLERY, TEXT};
use proptest::prelude::*;
use vellum_core::{ContentDraft, FieldContent, VersionNumber};

/// Strategy for generating version numbers.
pub fn version_number_strategy() -> impl Strategy<Value = VersionNumber> {
    (1u32..1_000, 0u32..1_000).prop_map(|(major, minor)| VersionNumber::new(major, minor))
}

/// Strategy for generating field contents.
pub fn field_content_strategy() -> impl Strategy<Value = FieldContent> {
    prop_oneof![
        Just(FieldContent::Empty),
        "[a-z ]{0,24}".prop_map(FieldContent::Text),
        any::<i64>().prop_map(FieldContent::Integer),
        any::<bool>().prop_map(FieldContent::Boolean),
    ]
}

/// Strategy for generating drafts with a `body` and an optional `gallery`.
pub fn draft_strategy() -> impl Strategy<Value = ContentDraft> {
    (
        "[a-z]{1,12}",
        prop::collection::btree_map("[a-c]", field_content_strategy(), 1..4),
        prop::option::of(prop::collection::btree_map(
            "[x-z]",
            field_content_strategy(),
            1..3,
        )),
    )
        .prop_map(|(name, body, gallery)| {
            let draft = ContentDraft::new(name).with_group("body", TEXT, body);
            match gallery {
                Some(values) => draft.with_group("gallery", GALLERY, values),
                None => draft,
            }
        })
}

/// A single step of an editing session.
#[derive(Debug, Clone)]
pub enum Edit {
    /// Save new content.
    Save {
        /// The proposed content.
        draft: ContentDraft,
        /// Whether a changed save produces a major version.
        major: bool,
    },
    /// Save the content currently at the ledger head again.
    SaveUnchanged,
    /// Let time pass.
    Wait {
        /// Milliseconds to advance the clock by.
        millis: u64,
    },
}

/// Strategy for generating a single edit.
pub fn edit_strategy() -> impl Strategy<Value = Edit> {
    prop_oneof![
        3 => (draft_strategy(), any::<bool>()).prop_map(|(draft, major)| Edit::Save { draft, major }),
        1 => Just(Edit::SaveUnchanged),
        1 => (1u64..10_000).prop_map(|millis| Edit::Wait { millis }),
    ]
}

/// Strategy for generating an edit script.
pub fn edit_script_strategy(max_len: usize) -> impl Strategy<Value = Vec<Edit>> {
    prop::collection::vec(edit_strategy(), 1..max_len)
}

#[cfg(test)]
mod tests {
    use super::*;

    proptest! {
        #[test]
        fn test_version_numbers_are_nonzero(v in version_number_strategy()) {
            prop_assert!(v >= VersionNumber::FIRST);
        }

        #[test]
        fn test_drafts_use_fixture_definitions(draft in draft_strategy()) {
            prop_assert!(draft.groups.contains_key("body"));
            for group in draft.groups.values() {
                prop_assert!(group.definition == TEXT || group.definition == GALLERY);
                prop_assert!(!group.values.is_empty());
            }
        }

        #[test]
        fn test_edit_scripts_are_bounded(script in edit_script_strategy(8)) {
            prop_assert!(!script.is_empty());
            prop_assert!(script.len() < 8);
        }
    }
}
