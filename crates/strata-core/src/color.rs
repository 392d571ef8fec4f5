use crate::Vec2;

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Color(pub u8, pub u8, pub u8, pub u8);

impl Color {
    pub const TRANSPARENT: Color = Color(0, 0, 0, 0);
    pub const BLACK: Color = Color(0, 0, 0, 255);
    pub const WHITE: Color = Color(255, 255, 255, 255);

    pub fn from_rgb(r: u8, g: u8, b: u8) -> Self {
        Color(r, g, b, 255)
    }

    pub fn from_rgba(r: u8, g: u8, b: u8, a: u8) -> Self {
        Color(r, g, b, a)
    }

    /// `#RRGGBB` or `#RRGGBBAA`; anything else parses as opaque black.
    pub fn from_hex(hex: &str) -> Self {
        let s = hex.trim_start_matches('#');
        let channel = |i: usize, default: u8| {
            s.get(i..i + 2)
                .and_then(|c| u8::from_str_radix(c, 16).ok())
                .unwrap_or(default)
        };
        match s.len() {
            6 => Color(channel(0, 0), channel(2, 0), channel(4, 0), 255),
            8 => Color(channel(0, 0), channel(2, 0), channel(4, 0), channel(6, 255)),
            _ => Color::BLACK,
        }
    }

    pub fn with_alpha(self, a: u8) -> Self {
        Color(self.0, self.1, self.2, a)
    }

    /// Scales alpha by `f` (clamped to 0..=1).
    pub fn mul_alpha(self, f: f32) -> Self {
        let a = (self.3 as f32 * f.clamp(0.0, 1.0)).round() as u8;
        self.with_alpha(a)
    }

    pub fn is_opaque(self) -> bool {
        self.3 == 255
    }
}

/// Fill for background and gradient primitives.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Brush {
    Solid(Color),

    /// `start`/`end` are normalized to the filled rect (0,0 top-left, 1,1 bottom-right).
    Linear {
        start: Vec2,
        end: Vec2,
        start_color: Color,
        end_color: Color,
    },
}

impl From<Color> for Brush {
    fn from(c: Color) -> Self {
        Brush::Solid(c)
    }
}

impl Brush {
    pub fn vertical(top: Color, bottom: Color) -> Brush {
        Brush::Linear {
            start: Vec2::new(0.0, 0.0),
            end: Vec2::new(0.0, 1.0),
            start_color: top,
            end_color: bottom,
        }
    }

    pub fn horizontal(left: Color, right: Color) -> Brush {
        Brush::Linear {
            start: Vec2::new(0.0, 0.0),
            end: Vec2::new(1.0, 0.0),
            start_color: left,
            end_color: right,
        }
    }

    pub fn is_opaque(&self) -> bool {
        match self {
            Brush::Solid(c) => c.is_opaque(),
            Brush::Linear {
                start_color,
                end_color,
                ..
            } => start_color.is_opaque() && end_color.is_opaque(),
        }
    }
}
