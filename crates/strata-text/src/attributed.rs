//! Attributed strings.
//!
//! Runs are byte ranges over the text. After every mutation they are
//! coalesced: no empty runs, no two adjacent runs with equal attributes, and
//! together they cover `0..text.len()` exactly.

use std::fmt;
use std::ops::Range;
use std::rc::Rc;

use strata_core::{Color, DrawContext, Rect, Shadow};

#[derive(Clone, Debug, PartialEq)]
pub struct Font {
    pub family: String,
    pub size: f32,
    pub weight: u16,
}

impl Default for Font {
    fn default() -> Self {
        Self {
            family: "sans-serif".into(),
            size: 13.0,
            weight: 400,
        }
    }
}

impl Font {
    pub fn new(family: impl Into<String>, size: f32) -> Self {
        Self {
            family: family.into(),
            size,
            weight: 400,
        }
    }

    pub fn system(size: f32) -> Self {
        Self {
            size,
            ..Self::default()
        }
    }

    pub fn bold(mut self) -> Self {
        self.weight = 700;
        self
    }

    pub fn with_weight(mut self, weight: u16) -> Self {
        self.weight = weight;
        self
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum TextAlignment {
    #[default]
    Left,
    Center,
    Right,
    Justified,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum LineBreakMode {
    #[default]
    WordWrap,
    CharacterWrap,
    Clip,
    HeadTruncation,
    TailTruncation,
    MiddleTruncation,
}

impl LineBreakMode {
    pub fn wraps(self) -> bool {
        matches!(self, LineBreakMode::WordWrap | LineBreakMode::CharacterWrap)
    }
}

/// How a run's background color is filled.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum BackgroundFill {
    /// Only behind the glyphs of the run.
    #[default]
    Inline,
    /// The full line width of every line the run touches.
    Block,
}

/// Called with the run's byte range and its rects, before background and glyphs are drawn.
pub type PreDrawHook = Rc<dyn Fn(&mut DrawContext, Range<usize>, &[Rect])>;

/// Style of a run. `None` fields fall back to the defaults when rendering,
/// and are left untouched by `AttributedString::add_attributes`.
#[derive(Clone, Default)]
pub struct Attributes {
    pub font: Option<Font>,
    pub color: Option<Color>,
    pub background: Option<Color>,
    pub background_fill: Option<BackgroundFill>,
    pub shadow: Option<Shadow>,
    pub kerning: Option<f32>,
    pub line_height: Option<f32>,
    pub alignment: Option<TextAlignment>,
    pub line_break: Option<LineBreakMode>,
    pub pre_draw: Option<PreDrawHook>,
}

impl PartialEq for Attributes {
    fn eq(&self, o: &Self) -> bool {
        let hooks_eq = match (&self.pre_draw, &o.pre_draw) {
            (None, None) => true,
            (Some(a), Some(b)) => Rc::ptr_eq(a, b),
            _ => false,
        };
        hooks_eq
            && self.font == o.font
            && self.color == o.color
            && self.background == o.background
            && self.background_fill == o.background_fill
            && self.shadow == o.shadow
            && self.kerning == o.kerning
            && self.line_height == o.line_height
            && self.alignment == o.alignment
            && self.line_break == o.line_break
    }
}

impl fmt::Debug for Attributes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Attributes")
            .field("font", &self.font)
            .field("color", &self.color)
            .field("background", &self.background)
            .field("alignment", &self.alignment)
            .field("line_break", &self.line_break)
            .field("pre_draw", &self.pre_draw.is_some())
            .finish_non_exhaustive()
    }
}

impl Attributes {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn font(mut self, font: Font) -> Self {
        self.font = Some(font);
        self
    }

    pub fn color(mut self, color: Color) -> Self {
        self.color = Some(color);
        self
    }

    pub fn background(mut self, color: Color, fill: BackgroundFill) -> Self {
        self.background = Some(color);
        self.background_fill = Some(fill);
        self
    }

    pub fn shadow(mut self, shadow: Shadow) -> Self {
        self.shadow = Some(shadow);
        self
    }

    pub fn kerning(mut self, k: f32) -> Self {
        self.kerning = Some(k);
        self
    }

    pub fn line_height(mut self, h: f32) -> Self {
        self.line_height = Some(h);
        self
    }

    pub fn alignment(mut self, a: TextAlignment) -> Self {
        self.alignment = Some(a);
        self
    }

    pub fn line_break(mut self, m: LineBreakMode) -> Self {
        self.line_break = Some(m);
        self
    }

    pub fn pre_draw(mut self, hook: impl Fn(&mut DrawContext, Range<usize>, &[Rect]) + 'static) -> Self {
        self.pre_draw = Some(Rc::new(hook));
        self
    }

    /// Fields set in `over` win.
    pub fn merged(&self, over: &Attributes) -> Attributes {
        Attributes {
            font: over.font.clone().or_else(|| self.font.clone()),
            color: over.color.or(self.color),
            background: over.background.or(self.background),
            background_fill: over.background_fill.or(self.background_fill),
            shadow: over.shadow.or(self.shadow),
            kerning: over.kerning.or(self.kerning),
            line_height: over.line_height.or(self.line_height),
            alignment: over.alignment.or(self.alignment),
            line_break: over.line_break.or(self.line_break),
            pre_draw: over.pre_draw.clone().or_else(|| self.pre_draw.clone()),
        }
    }

    pub fn resolved_font(&self) -> Font {
        self.font.clone().unwrap_or_default()
    }

    pub fn resolved_color(&self) -> Color {
        self.color.unwrap_or(Color::BLACK)
    }

    /// Line height for this run: explicit, else 1.2× the font size.
    pub fn resolved_line_height(&self) -> f32 {
        self.line_height
            .unwrap_or_else(|| self.resolved_font().size * 1.2)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Run {
    pub range: Range<usize>,
    pub attributes: Attributes,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct AttributedString {
    text: String,
    runs: Vec<Run>,
}

pub(crate) fn floor_boundary(s: &str, i: usize) -> usize {
    let mut i = i.min(s.len());
    while i > 0 && !s.is_char_boundary(i) {
        i -= 1;
    }
    i
}

impl AttributedString {
    pub fn new(text: impl Into<String>) -> Self {
        Self::with_attributes(text, Attributes::default())
    }

    pub fn with_attributes(text: impl Into<String>, attributes: Attributes) -> Self {
        let text = text.into();
        let runs = if text.is_empty() {
            Vec::new()
        } else {
            vec![Run {
                range: 0..text.len(),
                attributes,
            }]
        };
        Self { text, runs }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn len(&self) -> usize {
        self.text.len()
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    pub fn runs(&self) -> &[Run] {
        &self.runs
    }

    /// Clamps `range` to the text and to char boundaries.
    pub fn clamp_range(&self, range: Range<usize>) -> Range<usize> {
        let s = floor_boundary(&self.text, range.start);
        let e = floor_boundary(&self.text, range.end.max(range.start));
        s..e
    }

    fn run_index_at(&self, index: usize) -> Option<usize> {
        if self.runs.is_empty() {
            return None;
        }
        let i = self.runs.partition_point(|r| r.range.end <= index);
        Some(i.min(self.runs.len() - 1))
    }

    /// Attributes of the run containing `index` (the last run at the end of the text).
    pub fn attributes_at(&self, index: usize) -> Option<&Attributes> {
        self.run_index_at(index).map(|i| &self.runs[i].attributes)
    }

    /// Attributes and the full extent of the run containing `index`.
    pub fn run_at(&self, index: usize) -> Option<&Run> {
        self.run_index_at(index).map(|i| &self.runs[i])
    }

    /// Splits the run containing `at` so a run boundary falls on `at`.
    fn split_at(&mut self, at: usize) {
        if at == 0 || at >= self.text.len() {
            return;
        }
        let Some(i) = self.run_index_at(at) else {
            return;
        };
        let r = &self.runs[i];
        if r.range.start == at {
            return;
        }
        let tail = Run {
            range: at..r.range.end,
            attributes: r.attributes.clone(),
        };
        self.runs[i].range.end = at;
        self.runs.insert(i + 1, tail);
    }

    fn for_runs_in(&mut self, range: Range<usize>, mut f: impl FnMut(&mut Attributes)) {
        let range = self.clamp_range(range);
        if range.is_empty() {
            return;
        }
        self.split_at(range.start);
        self.split_at(range.end);
        for r in self.runs.iter_mut() {
            if r.range.start >= range.start && r.range.end <= range.end {
                f(&mut r.attributes);
            }
        }
        self.coalesce();
    }

    /// Replaces the attributes over `range`.
    pub fn set_attributes(&mut self, range: Range<usize>, attributes: Attributes) {
        self.for_runs_in(range, |a| *a = attributes.clone());
    }

    /// Merges `attributes` over `range`; unset fields keep their current value.
    pub fn add_attributes(&mut self, range: Range<usize>, attributes: &Attributes) {
        self.for_runs_in(range, |a| *a = a.merged(attributes));
    }

    pub fn set_font(&mut self, range: Range<usize>, font: Font) {
        self.add_attributes(range, &Attributes::new().font(font));
    }

    pub fn set_color(&mut self, range: Range<usize>, color: Color) {
        self.add_attributes(range, &Attributes::new().color(color));
    }

    pub fn set_background(&mut self, range: Range<usize>, color: Color, fill: BackgroundFill) {
        self.add_attributes(range, &Attributes::new().background(color, fill));
    }

    pub fn set_shadow(&mut self, range: Range<usize>, shadow: Shadow) {
        self.add_attributes(range, &Attributes::new().shadow(shadow));
    }

    pub fn set_kerning(&mut self, range: Range<usize>, kerning: f32) {
        self.add_attributes(range, &Attributes::new().kerning(kerning));
    }

    pub fn set_line_height(&mut self, range: Range<usize>, h: f32) {
        self.add_attributes(range, &Attributes::new().line_height(h));
    }

    pub fn set_alignment(&mut self, range: Range<usize>, a: TextAlignment) {
        self.add_attributes(range, &Attributes::new().alignment(a));
    }

    pub fn set_line_break_mode(&mut self, range: Range<usize>, m: LineBreakMode) {
        self.add_attributes(range, &Attributes::new().line_break(m));
    }

    pub fn set_pre_draw(&mut self, range: Range<usize>, hook: PreDrawHook) {
        self.for_runs_in(range, |a| a.pre_draw = Some(hook.clone()));
    }

    /// Replaces `range` with `text`. Inserted text takes `attributes`, or
    /// those of the character before the edit when `None`.
    pub fn replace_range(&mut self, range: Range<usize>, text: &str, attributes: Option<Attributes>) {
        let range = self.clamp_range(range);
        let inherited = attributes.unwrap_or_else(|| {
            let prev = range.start.saturating_sub(1);
            self.attributes_at(prev).cloned().unwrap_or_default()
        });

        self.split_at(range.start);
        self.split_at(range.end);
        let removed = range.len();
        let added = text.len();

        let mut runs = Vec::with_capacity(self.runs.len() + 1);
        let mut inserted = false;
        for r in self.runs.drain(..) {
            if r.range.end <= range.start {
                runs.push(r);
                continue;
            }
            if !inserted {
                if added > 0 {
                    runs.push(Run {
                        range: range.start..range.start + added,
                        attributes: inherited.clone(),
                    });
                }
                inserted = true;
            }
            if r.range.start >= range.end {
                runs.push(Run {
                    range: r.range.start - removed + added..r.range.end - removed + added,
                    attributes: r.attributes,
                });
            }
        }
        if !inserted && added > 0 {
            runs.push(Run {
                range: range.start..range.start + added,
                attributes: inherited,
            });
        }
        self.runs = runs;
        self.text.replace_range(range, text);
        self.coalesce();
    }

    pub fn insert(&mut self, at: usize, text: &str, attributes: Option<Attributes>) {
        self.replace_range(at..at, text, attributes);
    }

    pub fn delete(&mut self, range: Range<usize>) {
        self.replace_range(range, "", None);
    }

    pub fn append(&mut self, other: &AttributedString) {
        let base = self.text.len();
        self.text.push_str(&other.text);
        self.runs.extend(other.runs.iter().map(|r| Run {
            range: r.range.start + base..r.range.end + base,
            attributes: r.attributes.clone(),
        }));
        self.coalesce();
    }

    pub fn substring(&self, range: Range<usize>) -> AttributedString {
        let range = self.clamp_range(range);
        let runs = self
            .runs
            .iter()
            .filter_map(|r| {
                let s = r.range.start.max(range.start);
                let e = r.range.end.min(range.end);
                (s < e).then(|| Run {
                    range: s - range.start..e - range.start,
                    attributes: r.attributes.clone(),
                })
            })
            .collect();
        AttributedString {
            text: self.text[range].to_string(),
            runs,
        }
    }

    fn coalesce(&mut self) {
        let mut out: Vec<Run> = Vec::with_capacity(self.runs.len());
        for r in self.runs.drain(..) {
            if r.range.is_empty() {
                continue;
            }
            match out.last_mut() {
                Some(last) if last.attributes == r.attributes && last.range.end == r.range.start => {
                    last.range.end = r.range.end;
                }
                _ => out.push(r),
            }
        }
        self.runs = out;
        debug_assert!(self.runs_cover_text());
    }

    /// True when the runs are non-overlapping, ordered and cover the whole text.
    pub fn runs_cover_text(&self) -> bool {
        let mut at = 0;
        for r in &self.runs {
            if r.range.start != at || r.range.is_empty() {
                return false;
            }
            at = r.range.end;
        }
        at == self.text.len()
    }
}

impl From<&str> for AttributedString {
    fn from(s: &str) -> Self {
        AttributedString::new(s)
    }
}

impl From<String> for AttributedString {
    fn from(s: String) -> Self {
        AttributedString::new(s)
    }
}
