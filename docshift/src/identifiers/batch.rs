use std::collections::VecDeque;

/// Identifiers fetched in one round-trip, handed out front to back, each exactly once.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct IdentifierBatch {
    identifiers: VecDeque<String>,
}

impl IdentifierBatch {
    /// Creates a batch holding `identifiers` in order.
    pub fn new(identifiers: Vec<String>) -> Self {
        Self {
            identifiers: identifiers.into(),
        }
    }

    /// Removes and returns the next identifier.
    pub fn pop(&mut self) -> Option<String> {
        self.identifiers.pop_front()
    }

    /// Puts back an identifier that was taken but never handed out.
    pub(crate) fn unpop(&mut self, identifier: String) {
        self.identifiers.push_front(identifier);
    }

    /// Appends the identifiers of `other` after the remaining ones.
    pub fn extend(&mut self, other: IdentifierBatch) {
        self.identifiers.extend(other.identifiers);
    }

    /// Returns the number of identifiers left.
    pub fn len(&self) -> usize {
        self.identifiers.len()
    }

    /// Returns `true` once every identifier has been handed out.
    pub fn is_empty(&self) -> bool {
        self.identifiers.is_empty()
    }
}
