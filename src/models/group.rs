use super::{ImageRecord, SeparatorToken};
use std::fmt;

/// Label used for photos seen before any separator.
pub const UNKNOWN_SUBJECT: &str = "unknown";

/// Who a group belongs to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Subject {
    /// No separator preceded these photos.
    Unknown,
    /// Resolved from the anchor's separator token.
    Tagged(SeparatorToken),
}

impl Subject {
    /// The group's subject identifier as shown to operators: name, id or raw
    /// payload; `unknown` otherwise.
    pub fn label(&self) -> &str {
        match self {
            Subject::Unknown => UNKNOWN_SUBJECT,
            Subject::Tagged(token) => token.label(),
        }
    }

    /// Attendee key used as the storage folder: id before name, unlike
    /// [`Subject::label`]. `None` for unassigned photos.
    pub fn attendee_id(&self) -> Option<&str> {
        match self {
            Subject::Unknown => None,
            Subject::Tagged(token) => Some(token.attendee_id()),
        }
    }

    /// Whether no separator identified this subject.
    pub fn is_unknown(&self) -> bool {
        matches!(self, Subject::Unknown)
    }
}

impl fmt::Display for Subject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// An ordered run of photos sharing one subject.
///
/// Never empty: it has an anchor, at least one member, or both.
#[derive(Debug, Clone, PartialEq)]
pub struct Group {
    pub(crate) subject: Subject,
    pub(crate) anchor: Option<ImageRecord>,
    pub(crate) members: Vec<ImageRecord>,
}

impl Group {
    /// Subject of this group.
    pub fn subject(&self) -> &Subject {
        &self.subject
    }

    /// Separator image that opened the group. Absent for the leading unknown bucket.
    pub fn anchor(&self) -> Option<&ImageRecord> {
        self.anchor.as_ref()
    }

    /// Plain photographs in timestamp order.
    pub fn members(&self) -> &[ImageRecord] {
        &self.members
    }

    /// Anchor (if any) followed by members.
    pub fn records(&self) -> impl Iterator<Item = &ImageRecord> {
        self.anchor.iter().chain(self.members.iter())
    }

    /// Number of records including the anchor.
    pub fn len(&self) -> usize {
        self.members.len() + usize::from(self.anchor.is_some())
    }

    /// Always false for groups produced by the grouping engine.
    pub fn is_empty(&self) -> bool {
        self.anchor.is_none() && self.members.is_empty()
    }

    /// Split into owned parts.
    pub fn into_parts(self) -> (Subject, Option<ImageRecord>, Vec<ImageRecord>) {
        (self.subject, self.anchor, self.members)
    }
}
