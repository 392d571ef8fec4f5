//! Row geometry cached on reload: per-section header heights and prefix
//! sums of row heights, so row lookups are binary searches.

use super::IndexPath;

#[derive(Clone, Debug, Default, PartialEq)]
pub struct SectionInfo {
    /// Content y of the section's top edge (its header, if any).
    pub y: f32,
    pub header_height: f32,
    /// `row_offsets[i]` is the y of row `i` relative to the first row;
    /// one extra entry holds the total row height.
    row_offsets: Vec<f32>,
}

impl SectionInfo {
    pub fn new(y: f32, header_height: f32, heights: impl IntoIterator<Item = f32>) -> Self {
        let mut row_offsets = vec![0.0];
        let mut acc = 0.0;
        for h in heights {
            acc += h.max(0.0);
            row_offsets.push(acc);
        }
        Self {
            y,
            header_height: header_height.max(0.0),
            row_offsets,
        }
    }

    pub fn number_of_rows(&self) -> usize {
        self.row_offsets.len() - 1
    }

    pub fn rows_y(&self) -> f32 {
        self.y + self.header_height
    }

    pub fn height(&self) -> f32 {
        self.header_height + self.row_offsets.last().copied().unwrap_or(0.0)
    }

    pub fn max_y(&self) -> f32 {
        self.y + self.height()
    }

    /// (y, height) of `row` in content coordinates.
    pub fn row_span(&self, row: usize) -> Option<(f32, f32)> {
        let top = *self.row_offsets.get(row)?;
        let bottom = *self.row_offsets.get(row + 1)?;
        Some((self.rows_y() + top, bottom - top))
    }

    /// Rows whose span intersects `[y0, y1)`.
    pub fn rows_in(&self, y0: f32, y1: f32) -> std::ops::Range<usize> {
        let (a, b) = (y0 - self.rows_y(), y1 - self.rows_y());
        let n = self.number_of_rows();
        // first row whose bottom is below a
        let start = self.row_offsets[1..].partition_point(|&bottom| bottom <= a);
        // rows whose top is above b
        let end = self.row_offsets[..n].partition_point(|&top| top < b);
        start..end.max(start)
    }

    pub fn row_at(&self, y: f32) -> Option<usize> {
        let rel = y - self.rows_y();
        let total = self.row_offsets.last().copied().unwrap_or(0.0);
        if rel < 0.0 || rel >= total {
            return None;
        }
        Some(self.row_offsets[1..].partition_point(|&bottom| bottom <= rel))
    }
}

/// Geometry for the whole table.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SectionTable {
    sections: Vec<SectionInfo>,
}

impl SectionTable {
    /// Builds the table from per-section header heights and row heights.
    pub fn build(
        sections: usize,
        mut header_height: impl FnMut(usize) -> f32,
        mut rows: impl FnMut(usize) -> usize,
        mut row_height: impl FnMut(IndexPath) -> f32,
    ) -> Self {
        let mut y = 0.0;
        let mut out = Vec::with_capacity(sections);
        for s in 0..sections {
            let n = rows(s);
            let info = SectionInfo::new(y, header_height(s), (0..n).map(|r| row_height(IndexPath::new(s, r))));
            y = info.max_y();
            out.push(info);
        }
        Self { sections: out }
    }

    pub fn sections(&self) -> &[SectionInfo] {
        &self.sections
    }

    pub fn number_of_sections(&self) -> usize {
        self.sections.len()
    }

    pub fn number_of_rows(&self, section: usize) -> usize {
        self.sections.get(section).map_or(0, SectionInfo::number_of_rows)
    }

    pub fn content_height(&self) -> f32 {
        self.sections.last().map_or(0.0, SectionInfo::max_y)
    }

    pub fn contains(&self, path: IndexPath) -> bool {
        path.row < self.number_of_rows(path.section)
    }

    pub fn row_span(&self, path: IndexPath) -> Option<(f32, f32)> {
        self.sections.get(path.section)?.row_span(path.row)
    }

    pub fn section_span(&self, section: usize) -> Option<(f32, f32)> {
        self.sections.get(section).map(|s| (s.y, s.height()))
    }

    /// Index paths of rows intersecting `[y0, y1)`, in order.
    pub fn paths_in(&self, y0: f32, y1: f32) -> Vec<IndexPath> {
        if y1 <= y0 {
            return Vec::new();
        }
        let first = self.sections.partition_point(|s| s.max_y() <= y0);
        self.sections[first..]
            .iter()
            .enumerate()
            .take_while(|(_, s)| s.y < y1)
            .flat_map(|(i, s)| s.rows_in(y0, y1).map(move |r| IndexPath::new(first + i, r)))
            .collect()
    }

    /// The row under content y, skipping headers.
    pub fn path_at(&self, y: f32) -> Option<IndexPath> {
        let i = self.sections.partition_point(|s| s.max_y() <= y);
        let s = self.sections.get(i)?;
        if y < s.rows_y() {
            return None;
        }
        s.row_at(y).map(|r| IndexPath::new(i, r))
    }

    /// Section whose span contains content y.
    pub fn section_at(&self, y: f32) -> Option<usize> {
        let i = self.sections.partition_point(|s| s.max_y() <= y);
        (i < self.sections.len()).then_some(i)
    }

    pub fn first_path(&self) -> Option<IndexPath> {
        self.sections
            .iter()
            .position(|s| s.number_of_rows() > 0)
            .map(|s| IndexPath::new(s, 0))
    }

    pub fn last_path(&self) -> Option<IndexPath> {
        self.sections
            .iter()
            .rposition(|s| s.number_of_rows() > 0)
            .map(|s| IndexPath::new(s, self.sections[s].number_of_rows() - 1))
    }

    /// The row after `path`, crossing into later sections.
    pub fn next_path(&self, path: IndexPath) -> Option<IndexPath> {
        if path.row + 1 < self.number_of_rows(path.section) {
            return Some(IndexPath::new(path.section, path.row + 1));
        }
        (path.section + 1..self.sections.len())
            .find(|&s| self.number_of_rows(s) > 0)
            .map(|s| IndexPath::new(s, 0))
    }

    pub fn previous_path(&self, path: IndexPath) -> Option<IndexPath> {
        if path.row > 0 && self.contains(path) {
            return Some(IndexPath::new(path.section, path.row - 1));
        }
        (0..path.section.min(self.sections.len()))
            .rev()
            .find(|&s| self.number_of_rows(s) > 0)
            .map(|s| IndexPath::new(s, self.number_of_rows(s) - 1))
    }
}
