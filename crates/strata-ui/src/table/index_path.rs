use std::fmt;

/// Address of a table row. Ordered section-major, then by row.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct IndexPath {
    pub section: usize,
    pub row: usize,
}

impl IndexPath {
    pub const fn new(section: usize, row: usize) -> Self {
        Self { section, row }
    }
}

impl fmt::Display for IndexPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.section, self.row)
    }
}

impl From<(usize, usize)> for IndexPath {
    fn from((section, row): (usize, usize)) -> Self {
        Self { section, row }
    }
}
