//! Source positions for decoded documents.

use rustc_hash::FxHashMap;

use crate::model::Id;

/// A 1-based line and column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Location {
    pub line: usize,
    pub column: usize,
}

/// Maps element ids back to where they came from in the source text.
///
/// Each id may carry a byte offset (resolved to a line and column through the
/// recorded line starts) and a dotted path such as `selector.matchLabels.app`.
///
/// The YAML decoder in [`crate::codec`] records paths only: its parser does
/// not report node positions. Offsets are filled in by drivers that track
/// positions themselves, through [`SourceInfo::set_offset`]. Without one,
/// [`SourceInfo::location_by_id`] returns `None`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SourceInfo {
    description: String,
    line_offsets: Vec<usize>,
    offsets: FxHashMap<Id, usize>,
    paths: FxHashMap<Id, String>,
}

impl SourceInfo {
    /// Creates source info for `text`, recording where each line starts.
    pub fn new(description: impl Into<String>, text: &str) -> Self {
        let mut line_offsets = vec![0];
        line_offsets.extend(text.match_indices('\n').map(|(pos, _)| pos + 1));
        Self {
            description: description.into(),
            line_offsets,
            offsets: FxHashMap::default(),
            paths: FxHashMap::default(),
        }
    }

    /// Names the source, e.g. a file path.
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Byte offset at which each line starts; the first entry is always 0.
    pub fn line_offsets(&self) -> &[usize] {
        &self.line_offsets
    }

    /// Records the byte offset of an element, for position-aware drivers.
    pub fn set_offset(&mut self, id: Id, offset: usize) {
        self.offsets.insert(id, offset);
    }

    pub fn offset_by_id(&self, id: Id) -> Option<usize> {
        self.offsets.get(&id).copied()
    }

    /// Resolves an id to its line and column.
    pub fn location_by_id(&self, id: Id) -> Option<Location> {
        let offset = self.offset_by_id(id)?;
        let line = self.line_offsets.partition_point(|&start| start <= offset);
        let line_start = self.line_offsets.get(line.checked_sub(1)?)?;
        Some(Location {
            line,
            column: offset - line_start + 1,
        })
    }

    pub fn set_path(&mut self, id: Id, path: impl Into<String>) {
        self.paths.insert(id, path.into());
    }

    /// Returns the dotted document path of an element.
    pub fn path_by_id(&self, id: Id) -> Option<&str> {
        self.paths.get(&id).map(String::as_str)
    }

    /// Number of elements with a recorded path.
    pub fn element_count(&self) -> usize {
        self.paths.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_location_by_id() {
        let text = "kind: Policy\nmetadata:\n  name: x\n";
        let mut info = SourceInfo::new("policy.yaml", text);
        assert_eq!(info.line_offsets(), &[0, 13, 23, 33]);

        info.set_offset(1, 0);
        info.set_offset(2, 25); // "name" on line 3
        assert_eq!(info.location_by_id(1), Some(Location { line: 1, column: 1 }));
        assert_eq!(info.location_by_id(2), Some(Location { line: 3, column: 3 }));
        assert_eq!(info.location_by_id(3), None);
    }

    #[test]
    fn test_paths() {
        let mut info = SourceInfo::new("inline", "");
        info.set_path(4, "selector.matchLabels.app");
        assert_eq!(info.path_by_id(4), Some("selector.matchLabels.app"));
        assert_eq!(info.path_by_id(5), None);
        assert_eq!(info.element_count(), 1);
        assert_eq!(info.description(), "inline");
    }
}
