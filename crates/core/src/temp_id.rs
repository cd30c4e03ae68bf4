//! Submission-scoped correlation identifiers.
//!
//! Resources in a transaction bundle need to reference each other before
//! the server has assigned permanent ids. Every convertible entity owns a
//! [`TempId`] slot; the first read allocates a random UUID and later reads
//! return the same value, so a reference taken before the target resource
//! is finalized stays consistent with it.

use std::cell::OnceCell;

use uuid::Uuid;

use crate::resource::Reference;

/// A lazily allocated, submission-unique identifier.
///
/// The slot is per-entity, not global, so conversions of separate records
/// never share state. Conversion of a single record is single-threaded by
/// design, which is why a plain `OnceCell` suffices.
#[derive(Debug, Default)]
pub struct TempId(OnceCell<String>);

impl TempId {
    /// Allocate-or-fetch: the first call generates the identifier, all
    /// subsequent calls return the identical cached value.
    pub fn get(&self) -> &str {
        self.0.get_or_init(|| Uuid::new_v4().to_string())
    }

    /// A same-submission reference (`urn:uuid:<id>`) to this entity.
    pub fn reference(&self) -> Reference {
        Reference {
            reference: format!("urn:uuid:{}", self.get()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn is_idempotent() {
        let id = TempId::default();
        let first = id.get().to_string();
        assert_eq!(first, id.get());
        assert_eq!(format!("urn:uuid:{first}"), id.reference().reference);
    }

    #[test]
    fn distinct_entities_get_distinct_ids() {
        let a = TempId::default();
        let b = TempId::default();
        assert_ne!(a.get(), b.get());
    }
}
