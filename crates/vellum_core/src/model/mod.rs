//! Data model: content objects, field-groups and versions.

mod content;
mod object;
mod version;

pub use content::{
    ContentDraft, ContentSnapshot, FieldContent, FieldGroup, FieldGroupDraft, FieldValue,
};
pub use object::{ContentObject, ObjectKind, SyncPointer, Versionable};
pub use version::Version;
