//! Source locations for AST nodes and diagnostics.
//!
//! A `FileLoc` names a half-open range in one source file, tracking
//! `(row, col, byte-offset)` at both ends. Rows and columns are 1-based;
//! byte offsets are 0-based. Locations are small and cheap to copy.

use crate::interner::Atom;
use serde::{Deserialize, Serialize};

/// A position inside a source buffer.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FilePos {
    /// 1-based line number
    pub row: u32,
    /// 1-based column number
    pub col: u32,
    /// 0-based byte offset from buffer start
    pub offset: u32,
}

impl FilePos {
    #[inline]
    pub const fn new(row: u32, col: u32, offset: u32) -> Self {
        FilePos { row, col, offset }
    }

    /// The position of the first byte in a buffer.
    #[inline]
    pub const fn start() -> Self {
        FilePos {
            row: 1,
            col: 1,
            offset: 0,
        }
    }
}

/// A range of source code in one file: `[begin, end)` by byte offset.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FileLoc {
    /// Interned file name
    pub file: Atom,
    pub begin: FilePos,
    pub end: FilePos,
}

impl FileLoc {
    #[inline]
    pub const fn new(file: Atom, begin: FilePos, end: FilePos) -> Self {
        FileLoc { file, begin, end }
    }

    /// An empty location at a single position.
    #[inline]
    pub const fn at(file: Atom, pos: FilePos) -> Self {
        FileLoc {
            file,
            begin: pos,
            end: pos,
        }
    }

    /// A location for synthetic nodes that have no source counterpart.
    #[inline]
    pub fn synthetic() -> Self {
        FileLoc {
            file: Atom::DUMMY,
            begin: FilePos::default(),
            end: FilePos::default(),
        }
    }

    #[inline]
    pub fn is_synthetic(&self) -> bool {
        self.file.is_dummy()
    }

    /// Length of the range in bytes.
    #[inline]
    pub const fn len(&self) -> u32 {
        self.end.offset.saturating_sub(self.begin.offset)
    }

    #[inline]
    pub const fn is_empty(&self) -> bool {
        self.begin.offset == self.end.offset
    }

    /// Merge two locations into one covering both.
    ///
    /// Both must point into the same file; synthetic locations are absorbed.
    pub fn merge(&self, other: &FileLoc) -> FileLoc {
        if self.is_synthetic() {
            return *other;
        }
        if other.is_synthetic() {
            return *self;
        }
        let begin = if self.begin.offset <= other.begin.offset {
            self.begin
        } else {
            other.begin
        };
        let end = if self.end.offset >= other.end.offset {
            self.end
        } else {
            other.end
        };
        FileLoc {
            file: self.file,
            begin,
            end,
        }
    }

    /// Collapse to an empty location at the start of this one.
    #[inline]
    pub const fn first(&self) -> FileLoc {
        FileLoc {
            file: self.file,
            begin: self.begin,
            end: self.begin,
        }
    }

    /// Collapse to an empty location at the end of this one.
    #[inline]
    pub const fn last(&self) -> FileLoc {
        FileLoc {
            file: self.file,
            begin: self.end,
            end: self.end,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merge_spans_both_ranges() {
        let file = Atom(0);
        let a = FileLoc::new(file, FilePos::new(1, 1, 0), FilePos::new(1, 5, 4));
        let b = FileLoc::new(file, FilePos::new(2, 1, 10), FilePos::new(2, 4, 13));
        let m = a.merge(&b);
        assert_eq!(m.begin.offset, 0);
        assert_eq!(m.end.offset, 13);
        assert!(m.begin.offset <= m.end.offset);
    }

    #[test]
    fn synthetic_locations_are_absorbed_by_merge() {
        let file = Atom(0);
        let a = FileLoc::new(file, FilePos::new(3, 1, 20), FilePos::new(3, 3, 22));
        let s = FileLoc::synthetic();
        assert_eq!(a.merge(&s), a);
        assert_eq!(s.merge(&a), a);
    }
}
