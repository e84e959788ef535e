//! Source element identifiers.
//!
//! Every node in the model records the id of the document element it was built
//! from. Ids are assigned by the decoder and never reused within a document.

/// A source element identifier.
pub type Id = i64;

/// The "no source position" id.
pub const NIL_ID: Id = 0;

/// Sequential id allocator handing out ids in document order, starting at 1.
#[derive(Debug, Clone)]
pub struct IdGen {
    next: Id,
}

impl IdGen {
    /// Creates an allocator whose first id is 1.
    pub fn new() -> Self {
        Self { next: 1 }
    }

    /// Returns the next unused id.
    pub fn next_id(&mut self) -> Id {
        let id = self.next;
        self.next += 1;
        id
    }

    /// Returns how many ids have been handed out.
    pub fn issued(&self) -> usize {
        (self.next - 1) as usize
    }
}

impl Default for IdGen {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_are_sequential_and_non_nil() {
        let mut ids = IdGen::new();
        assert_eq!(ids.next_id(), 1);
        assert_eq!(ids.next_id(), 2);
        assert_eq!(ids.next_id(), 3);
        assert_eq!(ids.issued(), 3);
        assert_ne!(IdGen::default().next_id(), NIL_ID);
    }
}
