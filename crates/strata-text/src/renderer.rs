//! Read-only text rendering: lazy layout, drawing, selection and hit testing.
//!
//! The renderer is positioned by `frame` inside its view's bounds. Every
//! geometry query takes and returns coordinates in that same space.

use std::ops::Range;
use std::rc::Rc;

use once_cell::unsync::OnceCell;
use unicode_segmentation::UnicodeSegmentation;

use strata_core::{DrawContext, GlyphStyle, Rect, Shadow, Size, Vec2, theme};

use crate::attributed::{AttributedString, BackgroundFill, LineBreakMode, TextAlignment, floor_boundary};
use crate::layout::TextLayout;
use crate::shaping::TextShaper;

const ELLIPSIS: &str = "\u{2026}";

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum VerticalAlignment {
    #[default]
    Top,
    Middle,
    Bottom,
}

/// Granularity used when extending a selection.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SelectionAffinity {
    #[default]
    Character,
    Word,
    Line,
    Paragraph,
}

struct Laid {
    layout: TextLayout,
    /// Set when truncation replaced the text that is drawn.
    display: Option<AttributedString>,
}

pub struct TextRenderer {
    string: AttributedString,
    frame: Rect,
    shaper: Rc<dyn TextShaper>,
    vertical_alignment: VerticalAlignment,
    selection: Range<usize>,
    shadow: Option<Shadow>,
    laid: OnceCell<Laid>,
}

impl TextRenderer {
    pub fn new(shaper: Rc<dyn TextShaper>) -> Self {
        Self {
            string: AttributedString::default(),
            frame: Rect::ZERO,
            shaper,
            vertical_alignment: VerticalAlignment::Top,
            selection: 0..0,
            shadow: None,
            laid: OnceCell::new(),
        }
    }

    pub fn attributed_string(&self) -> &AttributedString {
        &self.string
    }

    pub fn set_attributed_string(&mut self, s: AttributedString) {
        self.string = s;
        self.selection = self.string.clamp_range(self.selection.clone());
        self.reset();
    }

    /// Mutates the string in place; the cached layout is dropped.
    pub fn edit(&mut self, f: impl FnOnce(&mut AttributedString)) {
        f(&mut self.string);
        self.selection = self.string.clamp_range(self.selection.clone());
        self.reset();
    }

    pub fn frame(&self) -> Rect {
        self.frame
    }

    pub fn set_frame(&mut self, frame: Rect) {
        if frame.w != self.frame.w {
            self.reset();
        }
        self.frame = frame;
    }

    pub fn vertical_alignment(&self) -> VerticalAlignment {
        self.vertical_alignment
    }

    pub fn set_vertical_alignment(&mut self, a: VerticalAlignment) {
        self.vertical_alignment = a;
    }

    pub fn shadow(&self) -> Option<Shadow> {
        self.shadow
    }

    /// Shadow for runs that do not set their own.
    pub fn set_shadow(&mut self, shadow: Option<Shadow>) {
        self.shadow = shadow;
    }

    pub fn set_shaper(&mut self, shaper: Rc<dyn TextShaper>) {
        self.shaper = shaper;
        self.reset();
    }

    /// Drops the cached layout; it is rebuilt by the next query.
    pub fn reset(&mut self) {
        self.laid = OnceCell::new();
    }

    pub fn has_layout(&self) -> bool {
        self.laid.get().is_some()
    }

    fn line_break_mode(&self) -> LineBreakMode {
        self.string
            .runs()
            .first()
            .and_then(|r| r.attributes.line_break)
            .unwrap_or_default()
    }

    fn laid(&self) -> &Laid {
        self.laid.get_or_init(|| {
            let width = (self.frame.w > 0.0).then_some(self.frame.w);
            self.build(width)
        })
    }

    pub fn layout(&self) -> &TextLayout {
        &self.laid().layout
    }

    fn build(&self, width: Option<f32>) -> Laid {
        let mode = self.line_break_mode();
        let mut layout = self.shaper.layout(&self.string, width, mode);
        let mut display = None;
        if let Some(w) = width
            && matches!(
                mode,
                LineBreakMode::HeadTruncation | LineBreakMode::TailTruncation | LineBreakMode::MiddleTruncation
            )
            && layout.width() > w
        {
            let (s, l) = self.truncate(w, mode);
            display = Some(s);
            layout = l;
        }
        let source = display.as_ref().unwrap_or(&self.string);
        align_lines(&mut layout, source, width);
        Laid { layout, display }
    }

    /// Longest prefix/suffix (in graphemes) that fits `width` with an ellipsis.
    fn truncate(&self, width: f32, mode: LineBreakMode) -> (AttributedString, TextLayout) {
        let text = self.string.text();
        let bounds: Vec<usize> = text
            .grapheme_indices(true)
            .map(|(i, _)| i)
            .chain(std::iter::once(text.len()))
            .collect();
        let n = bounds.len() - 1;

        let candidate = |keep: usize| -> AttributedString {
            let attrs = |at: usize| self.string.attributes_at(at).cloned();
            match mode {
                LineBreakMode::HeadTruncation => {
                    let mut s = self.string.substring(bounds[n - keep]..text.len());
                    s.insert(0, ELLIPSIS, attrs(bounds[n - keep]));
                    s
                }
                LineBreakMode::MiddleTruncation => {
                    let head = keep.div_ceil(2);
                    let tail = keep - head;
                    let mut s = self.string.substring(0..bounds[head]);
                    s.insert(s.len(), ELLIPSIS, attrs(bounds[head].saturating_sub(1)));
                    s.append(&self.string.substring(bounds[n - tail]..text.len()));
                    s
                }
                _ => {
                    let mut s = self.string.substring(0..bounds[keep]);
                    s.insert(s.len(), ELLIPSIS, attrs(bounds[keep].saturating_sub(1)));
                    s
                }
            }
        };

        let (mut lo, mut hi) = (0usize, n);
        let mut best = {
            let s = candidate(0);
            let l = self.shaper.layout(&s, None, LineBreakMode::Clip);
            (s, l)
        };
        while lo < hi {
            let mid = (lo + hi).div_ceil(2);
            let s = candidate(mid);
            let l = self.shaper.layout(&s, None, LineBreakMode::Clip);
            if l.width() <= width {
                lo = mid;
                best = (s, l);
            } else {
                hi = mid - 1;
            }
        }
        best
    }

    /// Text that is actually drawn (differs from the source when truncated).
    pub fn displayed_string(&self) -> &AttributedString {
        self.laid().display.as_ref().unwrap_or(&self.string)
    }

    pub fn is_truncated(&self) -> bool {
        self.laid().display.is_some()
    }

    /// Size of the laid-out text at the current frame width.
    pub fn size(&self) -> Size {
        self.layout().size
    }

    /// Measures without touching the cached layout.
    pub fn size_constrained_to_width(&self, width: f32) -> Size {
        let width = (width > 0.0 && width.is_finite()).then_some(width);
        self.build(width).layout.size
    }

    /// Top-left of the text in view coordinates.
    ///
    /// Middle and bottom alignment need the measured height first, so they
    /// cost a full layout before anything can be positioned.
    pub fn layout_origin(&self) -> Vec2 {
        let h = match self.vertical_alignment {
            VerticalAlignment::Top => return self.frame.origin(),
            _ => self.layout().height(),
        };
        let dy = match self.vertical_alignment {
            VerticalAlignment::Middle => ((self.frame.h - h) / 2.0).round(),
            _ => (self.frame.h - h).round(),
        };
        Vec2::new(self.frame.x, self.frame.y + dy)
    }

    // ----- selection -----

    pub fn selected_range(&self) -> Range<usize> {
        self.selection.clone()
    }

    pub fn set_selection(&mut self, range: Range<usize>) {
        let (a, b) = (range.start.min(range.end), range.start.max(range.end));
        self.selection = self.string.clamp_range(a..b);
    }

    pub fn selected_string(&self) -> &str {
        self.string.text().get(self.selection.clone()).unwrap_or("")
    }

    /// The unit of `affinity` that contains `index`.
    pub fn range_for_affinity(&self, index: usize, affinity: SelectionAffinity) -> Range<usize> {
        let text = self.string.text();
        let index = floor_boundary(text, index);
        match affinity {
            SelectionAffinity::Character => text
                .grapheme_indices(true)
                .map(|(i, g)| i..i + g.len())
                .find(|r| r.contains(&index))
                .unwrap_or(index..index),
            SelectionAffinity::Word => text
                .split_word_bound_indices()
                .map(|(i, w)| i..i + w.len())
                .find(|r| r.contains(&index))
                .unwrap_or(index..index),
            SelectionAffinity::Line => {
                let layout = self.layout();
                match layout.line_index_for_offset(index) {
                    Some(i) => {
                        let l = &layout.lines[i];
                        l.range.start..l.caret_end(text)
                    }
                    None => index..index,
                }
            }
            SelectionAffinity::Paragraph => {
                let start = text[..index].rfind('\n').map(|i| i + 1).unwrap_or(0);
                let end = text[index..].find('\n').map(|i| index + i).unwrap_or(text.len());
                start..end
            }
        }
    }

    /// Selects from `anchor` to `focus`, both expanded to whole `affinity` units.
    pub fn select_with_affinity(&mut self, anchor: usize, focus: usize, affinity: SelectionAffinity) {
        let a = self.range_for_affinity(anchor, affinity);
        let f = self.range_for_affinity(focus, affinity);
        if affinity == SelectionAffinity::Character {
            self.set_selection(anchor.min(focus)..anchor.max(focus));
        } else {
            self.set_selection(a.start.min(f.start)..a.end.max(f.end));
        }
    }

    // ----- geometry -----

    pub fn rects_for_range(&self, range: Range<usize>) -> Vec<Rect> {
        let o = self.layout_origin();
        self.layout()
            .rects_for_range(range)
            .into_iter()
            .map(|r| r.offset(o))
            .collect()
    }

    pub fn first_rect_for_range(&self, range: Range<usize>) -> Rect {
        self.rects_for_range(range).first().copied().unwrap_or(Rect::ZERO)
    }

    pub fn caret_rect(&self, index: usize) -> Rect {
        self.layout().caret_rect(index).offset(self.layout_origin())
    }

    /// Caret index nearest to `p` (view coordinates).
    pub fn index_for_point(&self, p: Vec2) -> usize {
        let o = self.layout_origin();
        self.layout()
            .index_for_point(p - o, self.displayed_string().text())
    }

    // ----- drawing -----

    pub fn draw(&self, ctx: &mut DrawContext) {
        let clip = self.line_break_mode() == LineBreakMode::Clip;
        if clip {
            let frame = self.frame;
            ctx.with_clip(frame, |ctx| self.draw_contents(ctx));
        } else {
            self.draw_contents(ctx);
        }
    }

    fn draw_contents(&self, ctx: &mut DrawContext) {
        let layout = self.layout();
        let text = self.displayed_string();
        let o = self.layout_origin();

        if !self.selection.is_empty() && !self.is_truncated() {
            let color = theme().selection;
            for r in self.rects_for_range(self.selection.clone()) {
                ctx.fill_rect(r, color);
            }
        }

        // (run index, byte range, rect, baseline y)
        let mut pieces: Vec<(usize, Range<usize>, Rect, f32)> = Vec::new();
        for line in &layout.lines {
            for (ri, run) in text.runs().iter().enumerate() {
                let s = run.range.start.max(line.range.start);
                let e = run.range.end.min(line.range.end);
                if s >= e {
                    continue;
                }
                let mut x0 = f32::INFINITY;
                let mut x1 = f32::NEG_INFINITY;
                let mut end = s;
                for c in &line.clusters {
                    if c.range.start >= s && c.range.end <= e && !text.text()[c.range.clone()].ends_with('\n') {
                        x0 = x0.min(c.x);
                        x1 = x1.max(c.x + c.advance);
                        end = end.max(c.range.end);
                    }
                }
                if x0 > x1 {
                    continue;
                }
                let rect = Rect::new(o.x + line.x + x0, o.y + line.top, x1 - x0, line.height);
                pieces.push((ri, s..end, rect, o.y + line.baseline));
            }
        }

        for (ri, run) in text.runs().iter().enumerate() {
            if let Some(hook) = &run.attributes.pre_draw {
                let rects: Vec<Rect> = pieces.iter().filter(|p| p.0 == ri).map(|p| p.2).collect();
                if !rects.is_empty() {
                    hook(ctx, run.range.clone(), &rects);
                }
            }
        }

        for (ri, _, rect, _) in &pieces {
            let a = &text.runs()[*ri].attributes;
            if let Some(bg) = a.background {
                let r = match a.background_fill.unwrap_or_default() {
                    BackgroundFill::Inline => *rect,
                    BackgroundFill::Block => Rect::new(self.frame.x, rect.y, self.frame.w.max(layout.width()), rect.h),
                };
                ctx.fill_rect(r, bg);
            }
        }

        for (ri, range, rect, baseline) in pieces {
            let a = &text.runs()[ri].attributes;
            let font = a.resolved_font();
            let style = GlyphStyle {
                family: font.family,
                size: font.size,
                weight: font.weight,
                color: a.resolved_color(),
                kerning: a.kerning.unwrap_or(0.0),
                shadow: a.shadow.or(self.shadow),
            };
            ctx.draw_glyph_run(Vec2::new(rect.x, baseline), &text.text()[range], style);
        }
    }
}

/// Applies per-line alignment taken from the attributes at the start of each line.
fn align_lines(layout: &mut TextLayout, text: &AttributedString, width: Option<f32>) {
    let container = width.unwrap_or_else(|| layout.width());
    let src = text.text();
    for line in layout.lines.iter_mut() {
        let alignment = text
            .attributes_at(line.range.start)
            .and_then(|a| a.alignment)
            .unwrap_or_default();
        let extra = (container - line.width).max(0.0);
        line.x = match alignment {
            TextAlignment::Left => 0.0,
            TextAlignment::Center => (extra / 2.0).round(),
            TextAlignment::Right => extra,
            TextAlignment::Justified => {
                if !line.hard_break {
                    justify(line, src, extra);
                }
                0.0
            }
        };
    }
    layout.measure();
}

/// Spreads `extra` over the interior spaces of a soft-wrapped line.
fn justify(line: &mut crate::layout::LayoutLine, src: &str, extra: f32) {
    let blank = |r: &Range<usize>| src.get(r.clone()).is_some_and(|s| s.chars().all(char::is_whitespace));
    let last_visible = line.clusters.iter().rposition(|c| !blank(&c.range));
    let Some(last_visible) = last_visible else {
        return;
    };
    let gaps = line.clusters[..last_visible].iter().filter(|c| blank(&c.range)).count();
    if gaps == 0 {
        return;
    }
    let per = extra / gaps as f32;
    let mut shift = 0.0;
    for c in line.clusters.iter_mut().take(last_visible + 1) {
        c.x += shift;
        if blank(&c.range) {
            c.advance += per;
            shift += per;
        }
    }
    line.width += extra;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attributed::{Attributes, Font};
    use crate::shaping::FixedAdvanceShaper;
    use strata_core::{Color, DrawCommand};

    fn renderer(text: &str, frame: Rect) -> TextRenderer {
        let mut r = TextRenderer::new(Rc::new(FixedAdvanceShaper::default()));
        r.set_attributed_string(AttributedString::with_attributes(
            text,
            Attributes::new().font(Font::system(10.0)),
        ));
        r.set_frame(frame);
        r
    }

    #[test]
    fn test_layout_is_lazy_and_reset_on_edit() {
        let mut r = renderer("hello", Rect::new(0.0, 0.0, 100.0, 40.0));
        assert!(!r.has_layout());
        assert_eq!(r.size().width, 25.0);
        assert!(r.has_layout());
        r.edit(|s| s.insert(5, "!!", None));
        assert!(!r.has_layout());
        assert_eq!(r.size().width, 35.0);
    }

    #[test]
    fn test_vertical_alignment_offsets_origin() {
        let mut r = renderer("hi", Rect::new(0.0, 0.0, 100.0, 40.0));
        assert_eq!(r.layout_origin().y, 0.0);
        r.set_vertical_alignment(VerticalAlignment::Middle);
        assert_eq!(r.layout_origin().y, 14.0);
        r.set_vertical_alignment(VerticalAlignment::Bottom);
        assert!((r.layout_origin().y - 28.0).abs() < 1e-4);

        // both offsets land on whole points
        r.set_frame(Rect::new(0.0, 0.0, 100.0, 40.5));
        assert_eq!(r.layout_origin().y, 29.0);
        r.set_vertical_alignment(VerticalAlignment::Middle);
        assert_eq!(r.layout_origin().y, 14.0);
    }

    #[test]
    fn test_index_for_point_respects_frame() {
        let r = renderer("abcd", Rect::new(10.0, 10.0, 100.0, 20.0));
        assert_eq!(r.index_for_point(Vec2::new(10.0, 15.0)), 0);
        assert_eq!(r.index_for_point(Vec2::new(21.0, 15.0)), 2);
        assert_eq!(r.index_for_point(Vec2::new(300.0, 15.0)), 4);
    }

    #[test]
    fn test_alignment_center_and_right() {
        let mut r = renderer("ab", Rect::new(0.0, 0.0, 50.0, 20.0));
        r.edit(|s| s.set_alignment(0..2, TextAlignment::Right));
        assert_eq!(r.caret_rect(0).x, 40.0);
        r.edit(|s| s.set_alignment(0..2, TextAlignment::Center));
        assert_eq!(r.caret_rect(0).x, 20.0);
    }

    #[test]
    fn test_tail_truncation() {
        let mut r = renderer("abcdefghij", Rect::new(0.0, 0.0, 30.0, 20.0));
        r.edit(|s| s.set_line_break_mode(0..10, LineBreakMode::TailTruncation));
        assert!(r.is_truncated());
        assert_eq!(r.displayed_string().text(), "abcde\u{2026}");
        assert!(r.size().width <= 30.0);
    }

    #[test]
    fn test_middle_truncation_keeps_both_ends() {
        let mut r = renderer("abcdefghij", Rect::new(0.0, 0.0, 30.0, 20.0));
        r.edit(|s| s.set_line_break_mode(0..10, LineBreakMode::MiddleTruncation));
        let shown = r.displayed_string().text().to_string();
        assert!(shown.starts_with("abc"));
        assert!(shown.ends_with("ij"));
    }

    #[test]
    fn test_affinity_word_and_paragraph() {
        let mut r = renderer("one two\nthree", Rect::new(0.0, 0.0, 500.0, 40.0));
        assert_eq!(r.range_for_affinity(5, SelectionAffinity::Word), 4..7);
        assert_eq!(r.range_for_affinity(9, SelectionAffinity::Paragraph), 8..13);
        r.select_with_affinity(1, 5, SelectionAffinity::Word);
        assert_eq!(r.selected_string(), "one two");
    }

    #[test]
    fn test_affinity_index_inside_a_multibyte_char() {
        let r = renderer("héllo\nwörld", Rect::new(0.0, 0.0, 500.0, 40.0));
        // byte 2 is inside 'é', byte 9 inside 'ö'
        assert_eq!(r.range_for_affinity(2, SelectionAffinity::Paragraph), 0..6);
        assert_eq!(r.range_for_affinity(9, SelectionAffinity::Paragraph), 7..13);
        assert_eq!(r.range_for_affinity(2, SelectionAffinity::Character), 1..3);
        assert_eq!(r.range_for_affinity(2, SelectionAffinity::Word), 0..6);
        assert_eq!(r.range_for_affinity(99, SelectionAffinity::Paragraph), 7..13);
    }

    #[test]
    fn test_draw_emits_background_then_glyphs_and_calls_hook() {
        let mut r = renderer("ab cd", Rect::new(0.0, 0.0, 200.0, 20.0));
        let seen = Rc::new(std::cell::RefCell::new(Vec::new()));
        let s2 = seen.clone();
        r.edit(|s| {
            s.set_background(3..5, Color::WHITE, BackgroundFill::Inline);
            s.add_attributes(3..5, &Attributes::new().pre_draw(move |_, range, rects| {
                s2.borrow_mut().push((range, rects.len()));
            }));
        });
        let mut ctx = DrawContext::new(Rect::new(0.0, 0.0, 200.0, 20.0), Rect::new(0.0, 0.0, 200.0, 20.0));
        r.draw(&mut ctx);
        let cmds = ctx.finish();
        assert_eq!(*seen.borrow(), vec![(3..5, 1)]);
        assert!(matches!(cmds[0], DrawCommand::FillRect { rect, .. } if rect == Rect::new(15.0, 0.0, 10.0, 12.0)));
        let runs: Vec<_> = cmds
            .iter()
            .filter_map(|c| match c {
                DrawCommand::GlyphRun { text, .. } => Some(text.clone()),
                _ => None,
            })
            .collect();
        assert_eq!(runs, vec!["ab ".to_string(), "cd".to_string()]);
    }
}
