//! The shaping provider seam.
//!
//! A `TextShaper` turns an attributed string into lines of positioned
//! clusters. Lines come back left-aligned at x = 0; alignment, truncation and
//! vertical placement are applied by the renderer.

use unicode_segmentation::UnicodeSegmentation;

use crate::attributed::{AttributedString, LineBreakMode};
use crate::layout::{Cluster, LayoutLine, TextLayout};

pub trait TextShaper {
    /// Lays out `text`, wrapping at `width` when given and `mode` wraps.
    fn layout(&self, text: &AttributedString, width: Option<f32>, mode: LineBreakMode) -> TextLayout;
}

/// Deterministic shaper: every grapheme advances by `font.size * ratio`
/// (plus kerning); newlines have no advance. Useful for tests and headless
/// hosts without fonts.
#[derive(Clone, Debug)]
pub struct FixedAdvanceShaper {
    pub ratio: f32,
}

impl Default for FixedAdvanceShaper {
    fn default() -> Self {
        Self { ratio: 0.5 }
    }
}

impl FixedAdvanceShaper {
    pub fn new(ratio: f32) -> Self {
        Self { ratio }
    }
}

fn is_newline(g: &str) -> bool {
    g == "\n" || g == "\r\n" || g == "\r"
}

fn is_blank(g: &str) -> bool {
    g.chars().all(char::is_whitespace)
}

struct LineBuilder<'a> {
    text: &'a AttributedString,
    lines: Vec<LayoutLine>,
    top: f32,
}

impl LineBuilder<'_> {
    fn finish(&mut self, clusters: Vec<Cluster>, start: usize, hard_break: bool) {
        let end = clusters.last().map(|c| c.range.end).unwrap_or(start);
        let src = self.text.text();
        let width = clusters
            .iter()
            .rev()
            .find(|c| !is_blank(&src[c.range.clone()]))
            .map(|c| c.x + c.advance)
            .unwrap_or(0.0);

        let mut height: f32 = 0.0;
        let mut size: f32 = 0.0;
        for c in &clusters {
            if let Some(a) = self.text.attributes_at(c.range.start) {
                height = height.max(a.resolved_line_height());
                size = size.max(a.resolved_font().size);
            }
        }
        if height == 0.0 {
            let a = self.text.attributes_at(start.saturating_sub(1)).cloned().unwrap_or_default();
            height = a.resolved_line_height();
            size = a.resolved_font().size;
        }
        // ascent ~ 0.8 em, centred in the line box
        let baseline = self.top + (height - size) / 2.0 + size * 0.8;
        self.lines.push(LayoutLine {
            range: start..end,
            x: 0.0,
            top: self.top,
            height,
            baseline,
            width,
            clusters,
            hard_break,
        });
        self.top += height;
    }
}

impl TextShaper for FixedAdvanceShaper {
    fn layout(&self, text: &AttributedString, width: Option<f32>, mode: LineBreakMode) -> TextLayout {
        let limit = width.filter(|_| mode.wraps());
        let mut b = LineBuilder {
            text,
            lines: Vec::new(),
            top: 0.0,
        };

        let mut cur: Vec<Cluster> = Vec::new();
        let mut line_start = 0usize;
        let mut x = 0.0f32;
        // index in `cur` just after the last whitespace
        let mut last_break: Option<usize> = None;

        for (start, g) in text.text().grapheme_indices(true) {
            let range = start..start + g.len();
            if is_newline(g) {
                cur.push(Cluster {
                    range: range.clone(),
                    x,
                    advance: 0.0,
                });
                b.finish(std::mem::take(&mut cur), line_start, true);
                line_start = range.end;
                x = 0.0;
                last_break = None;
                continue;
            }

            let attrs = text.attributes_at(start).cloned().unwrap_or_default();
            let advance = attrs.resolved_font().size * self.ratio + attrs.kerning.unwrap_or(0.0);

            if let Some(w) = limit
                && x + advance > w
                && !cur.is_empty()
                && !is_blank(g)
            {
                let split = match mode {
                    LineBreakMode::WordWrap => last_break.filter(|i| *i > 0).unwrap_or(cur.len()),
                    _ => cur.len(),
                };
                let rest = cur.split_off(split);
                b.finish(std::mem::take(&mut cur), line_start, false);
                line_start = rest.first().map(|c| c.range.start).unwrap_or(start);
                x = 0.0;
                for mut c in rest {
                    c.x = x;
                    x += c.advance;
                    cur.push(c);
                }
                last_break = None;
            }

            cur.push(Cluster {
                range,
                x,
                advance,
            });
            x += advance;
            if is_blank(g) {
                last_break = Some(cur.len());
            }
        }
        b.finish(cur, line_start, true);

        let mut layout = TextLayout {
            lines: b.lines,
            ..Default::default()
        };
        layout.measure();
        layout
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attributed::{Attributes, Font};

    fn s(text: &str) -> AttributedString {
        // 10pt font, ratio 0.5 => 5pt per grapheme, 12pt lines
        AttributedString::with_attributes(text, Attributes::new().font(Font::system(10.0)))
    }

    #[test]
    fn test_single_line_metrics() {
        let l = FixedAdvanceShaper::default().layout(&s("hello"), None, LineBreakMode::WordWrap);
        assert_eq!(l.lines.len(), 1);
        assert_eq!(l.size.width, 25.0);
        assert!((l.size.height - 12.0).abs() < 1e-4);
    }

    #[test]
    fn test_word_wrap_breaks_after_space() {
        let l = FixedAdvanceShaper::default().layout(&s("aaa bbb"), Some(20.0), LineBreakMode::WordWrap);
        assert_eq!(l.lines.len(), 2);
        assert_eq!(l.lines[0].range, 0..4);
        assert_eq!(l.lines[0].width, 15.0);
        assert_eq!(l.lines[1].range, 4..7);
        assert_eq!(l.lines[1].clusters[0].x, 0.0);
    }

    #[test]
    fn test_character_wrap_and_clip() {
        let sh = FixedAdvanceShaper::default();
        let l = sh.layout(&s("abcdef"), Some(12.0), LineBreakMode::CharacterWrap);
        assert_eq!(l.lines.len(), 3);
        let l = sh.layout(&s("abcdef"), Some(12.0), LineBreakMode::Clip);
        assert_eq!(l.lines.len(), 1);
    }

    #[test]
    fn test_trailing_newline_yields_empty_line() {
        let l = FixedAdvanceShaper::default().layout(&s("ab\n"), None, LineBreakMode::WordWrap);
        assert_eq!(l.lines.len(), 2);
        assert_eq!(l.lines[1].range, 3..3);
        assert_eq!(l.caret_rect(3).y, l.lines[1].top);
    }
}
