use std::rc::Rc;

/// A source text range, qualified by the internal path of the file it
/// belongs to.
///
/// Offsets are byte positions into the file's text. The file path travels
/// with the range so diagnostics and file-scoped lookups can be performed
/// from any node without a back-pointer to its source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Range {
    /// Internal path of the containing file.
    pub file: Rc<str>,
    /// Start byte offset.
    pub start: u32,
    /// End byte offset (exclusive).
    pub end: u32,
}

impl Range {
    pub fn new(file: Rc<str>, start: u32, end: u32) -> Self {
        Range { file, start, end }
    }

    /// Get start position in source
    pub fn pos(&self) -> usize {
        self.start as usize
    }

    /// Get end position in source
    pub fn end(&self) -> usize {
        self.end as usize
    }

    /// Joins this range with another, spanning from the start of the first
    /// to the end of the second. Both ranges must belong to the same file.
    pub fn join(&self, other: &Range) -> Range {
        Range {
            file: self.file.clone(),
            start: self.start.min(other.start),
            end: self.end.max(other.end),
        }
    }

    /// An empty range anchored at the end of this one.
    pub fn at_end(&self) -> Range {
        Range {
            file: self.file.clone(),
            start: self.end,
            end: self.end,
        }
    }
}
