use std::ops::Range;

use strata_core::{Rect, Size, Vec2};

/// A shaped cluster (one or more glyphs covering `range`).
#[derive(Clone, Debug, PartialEq)]
pub struct Cluster {
    pub range: Range<usize>,
    /// Offset from the start of the line.
    pub x: f32,
    pub advance: f32,
}

#[derive(Clone, Debug, PartialEq)]
pub struct LayoutLine {
    /// Bytes covered by the line, including trailing whitespace and newline.
    pub range: Range<usize>,
    /// Horizontal offset applied by alignment.
    pub x: f32,
    pub top: f32,
    pub height: f32,
    /// Baseline, measured from the top of the layout.
    pub baseline: f32,
    /// Extent of the visible glyphs (trailing whitespace excluded).
    pub width: f32,
    pub clusters: Vec<Cluster>,
    /// Ended by a newline or the end of the text, not by wrapping.
    pub hard_break: bool,
}

impl LayoutLine {
    pub fn bottom(&self) -> f32 {
        self.top + self.height
    }

    /// Where the caret goes when placed at the end of this line.
    pub fn caret_end(&self, text: &str) -> usize {
        match self.clusters.last() {
            Some(c) if text.get(c.range.clone()).is_some_and(|s| s.ends_with('\n')) => c.range.start,
            Some(c) => c.range.end,
            None => self.range.start,
        }
    }

    fn x_for_offset(&self, index: usize) -> f32 {
        for c in &self.clusters {
            if index <= c.range.start {
                return c.x;
            }
            if index < c.range.end {
                // inside a cluster: interpolate
                let t = (index - c.range.start) as f32 / c.range.len().max(1) as f32;
                return c.x + c.advance * t;
            }
        }
        self.clusters.last().map(|c| c.x + c.advance).unwrap_or(0.0)
    }
}

/// Output of a `TextShaper`: lines in top-to-bottom order, coordinates
/// relative to the layout's top-left.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TextLayout {
    pub lines: Vec<LayoutLine>,
    pub size: Size,
}

impl TextLayout {
    pub fn height(&self) -> f32 {
        self.size.height
    }

    pub fn width(&self) -> f32 {
        self.size.width
    }

    /// Recomputes `size` from the lines.
    pub fn measure(&mut self) {
        let w = self
            .lines
            .iter()
            .map(|l| l.x + l.width)
            .fold(0.0f32, f32::max);
        let h = self.lines.last().map(|l| l.bottom()).unwrap_or(0.0);
        self.size = Size::new(w, h);
    }

    pub fn line_index_for_offset(&self, index: usize) -> Option<usize> {
        if self.lines.is_empty() {
            return None;
        }
        let i = self
            .lines
            .iter()
            .position(|l| index < l.range.end)
            .unwrap_or(self.lines.len() - 1);
        Some(i)
    }

    /// Zero-width rect at the caret position for `index`.
    pub fn caret_rect(&self, index: usize) -> Rect {
        match self.line_index_for_offset(index) {
            Some(i) => {
                let l = &self.lines[i];
                Rect::new(l.x + l.x_for_offset(index), l.top, 0.0, l.height)
            }
            None => Rect::ZERO,
        }
    }

    /// One rect per line touched by `range`; an empty range yields the caret rect.
    pub fn rects_for_range(&self, range: Range<usize>) -> Vec<Rect> {
        if range.is_empty() {
            return vec![self.caret_rect(range.start)];
        }
        let mut out = Vec::new();
        for l in &self.lines {
            let mut x0 = f32::INFINITY;
            let mut x1 = f32::NEG_INFINITY;
            for c in &l.clusters {
                if c.range.start < range.end && c.range.end > range.start {
                    x0 = x0.min(c.x);
                    x1 = x1.max(c.x + c.advance);
                }
            }
            if x0 <= x1 {
                out.push(Rect::new(l.x + x0, l.top, x1 - x0, l.height));
            }
        }
        out
    }

    /// Nearest caret index for `p` (layout coordinates).
    pub fn index_for_point(&self, p: Vec2, text: &str) -> usize {
        let Some(first) = self.lines.first() else {
            return 0;
        };
        let line = if p.y < first.top {
            first
        } else {
            self.lines
                .iter()
                .find(|l| p.y < l.bottom())
                .unwrap_or_else(|| &self.lines[self.lines.len() - 1])
        };
        let x = p.x - line.x;
        for c in &line.clusters {
            if text.get(c.range.clone()).is_some_and(|s| s.ends_with('\n')) {
                return c.range.start;
            }
            if x < c.x + c.advance / 2.0 {
                return c.range.start;
            }
        }
        line.caret_end(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(range: Range<usize>, top: f32, xs: &[(Range<usize>, f32)]) -> LayoutLine {
        let clusters: Vec<Cluster> = xs
            .iter()
            .map(|(r, x)| Cluster {
                range: r.clone(),
                x: *x,
                advance: 10.0,
            })
            .collect();
        LayoutLine {
            range,
            x: 0.0,
            top,
            height: 20.0,
            baseline: top + 16.0,
            width: clusters.last().map(|c| c.x + c.advance).unwrap_or(0.0),
            clusters,
            hard_break: true,
        }
    }

    fn two_lines() -> TextLayout {
        // "ab\ncd"
        let mut l = TextLayout {
            lines: vec![
                line(0..3, 0.0, &[(0..1, 0.0), (1..2, 10.0), (2..3, 20.0)]),
                line(3..5, 20.0, &[(3..4, 0.0), (4..5, 10.0)]),
            ],
            size: Size::ZERO,
        };
        l.lines[0].clusters[2].advance = 0.0;
        l.measure();
        l
    }

    #[test]
    fn test_index_for_point() {
        let l = two_lines();
        let text = "ab\ncd";
        assert_eq!(l.index_for_point(Vec2::new(3.0, 5.0), text), 0);
        assert_eq!(l.index_for_point(Vec2::new(8.0, 5.0), text), 1);
        assert_eq!(l.index_for_point(Vec2::new(90.0, 5.0), text), 2);
        assert_eq!(l.index_for_point(Vec2::new(16.0, 25.0), text), 5);
        assert_eq!(l.index_for_point(Vec2::new(0.0, 500.0), text), 3);
        assert_eq!(l.index_for_point(Vec2::new(0.0, -10.0), text), 0);
    }

    #[test]
    fn test_rects_for_range_spanning_lines() {
        let l = two_lines();
        let rects = l.rects_for_range(1..4);
        assert_eq!(rects.len(), 2);
        assert_eq!(rects[0], Rect::new(10.0, 0.0, 10.0, 20.0));
        assert_eq!(rects[1], Rect::new(0.0, 20.0, 10.0, 20.0));
    }

    #[test]
    fn test_caret_rect_at_line_end() {
        let l = two_lines();
        assert_eq!(l.caret_rect(5), Rect::new(20.0, 20.0, 0.0, 20.0));
        assert_eq!(l.caret_rect(3), Rect::new(0.0, 20.0, 0.0, 20.0));
    }
}
