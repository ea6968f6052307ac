//! Grouping Engine
//!
//! Splits a capture-ordered record stream on separator images. Each
//! separator opens a new group anchored on itself; plain photos join the
//! open group; photos before the first separator form a leading unknown
//! group. Empty groups are never emitted.

use crate::models::{Group, ImageRecord, Subject};

struct Accumulator {
    subject: Subject,
    anchor: Option<ImageRecord>,
    members: Vec<ImageRecord>,
}

impl Accumulator {
    fn unknown() -> Self {
        Self {
            subject: Subject::Unknown,
            anchor: None,
            members: Vec::new(),
        }
    }

    fn anchored(record: ImageRecord, subject: Subject) -> Self {
        Self {
            subject,
            anchor: Some(record),
            members: Vec::new(),
        }
    }

    fn seal(self) -> Option<Group> {
        if self.anchor.is_none() && self.members.is_empty() {
            return None;
        }
        Some(Group {
            subject: self.subject,
            anchor: self.anchor,
            members: self.members,
        })
    }
}

/// Partition capture-ordered records into groups, in one pass.
///
/// Pure: the same input always yields the same partition. Adjacent
/// separators each become their own anchor-only group.
pub fn group_records<I>(records: I) -> Vec<Group>
where
    I: IntoIterator<Item = ImageRecord>,
{
    let mut groups = Vec::new();
    let mut current = Accumulator::unknown();

    for record in records {
        match record.separator().cloned() {
            Some(token) => {
                let sealed = std::mem::replace(
                    &mut current,
                    Accumulator::anchored(record, Subject::Tagged(token)),
                );
                groups.extend(sealed.seal());
            }
            None => current.members.push(record),
        }
    }
    groups.extend(current.seal());

    log::debug!("grouped records into {} groups", groups.len());
    groups
}
