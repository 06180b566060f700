use std::fmt;

/// An inclusive, 1-based page range.
///
/// Nothing is validated here: an inverted range (`from > till`) selects no
/// pages, and bounds outside the document simply match nothing extra.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRange {
    pub from: i64,
    pub till: i64,
}

impl PageRange {
    pub fn new(from: i64, till: i64) -> Self {
        PageRange { from, till }
    }

    /// Whether the 1-based page number falls inside the range
    pub fn contains(&self, page_nr: i64) -> bool {
        self.from <= page_nr && page_nr <= self.till
    }

    pub fn is_inverted(&self) -> bool {
        self.from > self.till
    }

    /// Zero-based indices of the selected pages, ascending
    pub fn selected_indices(&self, page_count: u32) -> impl Iterator<Item = usize> + '_ {
        (0..page_count as usize).filter(move |&i| self.contains(i as i64 + 1))
    }

    /// Number of pages this range selects from a document of `page_count` pages
    pub fn expected_count(&self, page_count: u32) -> u32 {
        if self.is_inverted() {
            return 0;
        }
        let first = self.from.max(1);
        let last = self.till.min(page_count as i64);
        (last - first + 1).max(0) as u32
    }
}

impl fmt::Display for PageRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.from, self.till)
    }
}
