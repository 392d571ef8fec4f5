//! cosmic-text backed shaper.
//!
//! One `FontSystem` is shared by every renderer in the process; buffers are
//! built per layout. The font and line metrics of the first run apply to the
//! whole paragraph set.

use std::hash::{Hash, Hasher};

use ahash::{AHashMap, AHasher};
use cosmic_text::{Attrs, Buffer, Family, FontSystem, Metrics, Shaping, Weight, Wrap};
use once_cell::sync::OnceCell;
use parking_lot::Mutex;

use crate::attributed::{AttributedString, LineBreakMode};
use crate::layout::{Cluster, LayoutLine, TextLayout};
use crate::shaping::TextShaper;

const CACHE_LIMIT: usize = 256;

struct Engine {
    fs: FontSystem,
    layouts: AHashMap<u64, TextLayout>,
}

static ENGINE: OnceCell<Mutex<Engine>> = OnceCell::new();

fn engine() -> &'static Mutex<Engine> {
    ENGINE.get_or_init(|| {
        log::debug!("loading system fonts");
        Mutex::new(Engine {
            fs: FontSystem::new(),
            layouts: AHashMap::new(),
        })
    })
}

fn family(name: &str) -> Family<'_> {
    match name {
        "sans-serif" => Family::SansSerif,
        "serif" => Family::Serif,
        "monospace" => Family::Monospace,
        other => Family::Name(other),
    }
}

fn cache_key(text: &str, family: &str, size: f32, weight: u16, line_height: f32, width: Option<f32>, mode: LineBreakMode) -> u64 {
    let mut h = AHasher::default();
    text.hash(&mut h);
    family.hash(&mut h);
    size.to_bits().hash(&mut h);
    weight.hash(&mut h);
    line_height.to_bits().hash(&mut h);
    width.map(f32::to_bits).hash(&mut h);
    (mode as u8).hash(&mut h);
    h.finish()
}

/// Byte offset at which each paragraph (newline-separated) starts.
fn paragraph_starts(text: &str) -> Vec<usize> {
    let mut starts = vec![0];
    starts.extend(text.match_indices('\n').map(|(i, _)| i + 1));
    starts
}

#[derive(Clone, Copy, Debug, Default)]
pub struct CosmicShaper;

impl TextShaper for CosmicShaper {
    fn layout(&self, text: &AttributedString, width: Option<f32>, mode: LineBreakMode) -> TextLayout {
        let attrs = text
            .runs()
            .first()
            .map(|r| r.attributes.clone())
            .unwrap_or_default();
        let font = attrs.resolved_font();
        let line_height = attrs.resolved_line_height();

        let key = cache_key(text.text(), &font.family, font.size, font.weight, line_height, width.filter(|_| mode.wraps()), mode);
        let mut eng = engine().lock();
        if let Some(hit) = eng.layouts.get(&key) {
            return hit.clone();
        }
        let mut buf = Buffer::new(&mut eng.fs, Metrics::new(font.size, line_height));
        {
            let mut b = buf.borrow_with(&mut eng.fs);
            b.set_wrap(match mode {
                LineBreakMode::WordWrap => Wrap::Word,
                LineBreakMode::CharacterWrap => Wrap::Glyph,
                _ => Wrap::None,
            });
            b.set_size(width.filter(|_| mode.wraps()), None);
            let a = Attrs::new()
                .family(family(&font.family))
                .weight(Weight(font.weight));
            b.set_text(text.text(), &a, Shaping::Advanced, None);
            b.shape_until_scroll(true);
        }

        let src = text.text();
        let paragraphs = paragraph_starts(src);
        let runs: Vec<_> = buf.layout_runs().collect();
        let mut lines = Vec::with_capacity(runs.len());
        for (i, run) in runs.iter().enumerate() {
            let base = paragraphs.get(run.line_i).copied().unwrap_or(src.len());
            let mut clusters: Vec<Cluster> = Vec::with_capacity(run.glyphs.len());
            for g in run.glyphs.iter() {
                let range = base + g.start..base + g.end;
                match clusters.last_mut() {
                    // ligatures and combining marks share a cluster
                    Some(last) if last.range == range => last.advance += g.w,
                    _ => clusters.push(Cluster {
                        range,
                        x: g.x,
                        advance: g.w,
                    }),
                }
            }
            let last_of_paragraph = runs.get(i + 1).is_none_or(|n| n.line_i != run.line_i);
            let start = clusters.first().map(|c| c.range.start).unwrap_or(base);
            let mut end = clusters.last().map(|c| c.range.end).unwrap_or(base);
            if last_of_paragraph
                && let Some(next) = paragraphs.get(run.line_i + 1)
            {
                // the newline belongs to this line; give it a zero-width cluster
                let nl = next - 1;
                let x = clusters.last().map(|c| c.x + c.advance).unwrap_or(0.0);
                clusters.push(Cluster {
                    range: nl..*next,
                    x,
                    advance: 0.0,
                });
                end = *next;
            }
            lines.push(LayoutLine {
                range: start..end,
                x: 0.0,
                top: run.line_top,
                height: line_height,
                baseline: run.line_y,
                width: run.line_w,
                clusters,
                hard_break: last_of_paragraph,
            });
        }

        let mut layout = TextLayout {
            lines,
            ..Default::default()
        };
        layout.measure();
        if eng.layouts.len() >= CACHE_LIMIT {
            eng.layouts.clear();
        }
        eng.layouts.insert(key, layout.clone());
        layout
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_paragraph_starts() {
        assert_eq!(paragraph_starts("ab\ncd\n"), vec![0, 3, 6]);
        assert_eq!(paragraph_starts(""), vec![0]);
    }

    #[test]
    fn test_cache_key_depends_on_width_only_when_wrapping() {
        let a = cache_key("x", "serif", 12.0, 400, 14.0, Some(10.0), LineBreakMode::WordWrap);
        let b = cache_key("x", "serif", 12.0, 400, 14.0, Some(20.0), LineBreakMode::WordWrap);
        assert_ne!(a, b);
        assert_eq!(a, cache_key("x", "serif", 12.0, 400, 14.0, Some(10.0), LineBreakMode::WordWrap));
    }

    #[test]
    fn test_family_mapping() {
        assert_eq!(family("serif"), Family::Serif);
        assert_eq!(family("Inter"), Family::Name("Inter"));
    }
}
