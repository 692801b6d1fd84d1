//! Spacing reserved around each sprite.

use std::fmt;

use serde::{Deserialize, Serialize};

/// How many pixels of gutter surround every sprite on a sheet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MarginPolicy {
    /// The given number of pixels to the right of and below each sprite.
    OneSide(u32),
    /// One pixel on every side; the atlas writer extrudes edge pixels into it.
    TwoSide,
}

/// Per-side gutter in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Padding {
    /// Gutter left of the sprite.
    pub left: u32,
    /// Gutter above the sprite.
    pub top: u32,
    /// Gutter right of the sprite.
    pub right: u32,
    /// Gutter below the sprite.
    pub bottom: u32,
}

impl Padding {
    /// Total horizontal gutter.
    pub fn horizontal(&self) -> u32 {
        self.left + self.right
    }

    /// Total vertical gutter.
    pub fn vertical(&self) -> u32 {
        self.top + self.bottom
    }
}

impl MarginPolicy {
    /// The default one-pixel spacing.
    pub const DEFAULT: MarginPolicy = MarginPolicy::OneSide(1);

    /// Gutter implied by this policy.
    pub fn padding(self) -> Padding {
        match self {
            MarginPolicy::OneSide(px) => Padding {
                left: 0,
                top: 0,
                right: px,
                bottom: px,
            },
            MarginPolicy::TwoSide => Padding {
                left: 1,
                top: 1,
                right: 1,
                bottom: 1,
            },
        }
    }

    /// Returns `true` when edge pixels must be extruded into the gutter.
    pub fn is_two_side(self) -> bool {
        matches!(self, MarginPolicy::TwoSide)
    }

    /// Sprite size grown by the gutter.
    pub fn padded_size(self, width: u32, height: u32) -> (u32, u32) {
        let pad = self.padding();
        (width + pad.horizontal(), height + pad.vertical())
    }
}

impl Default for MarginPolicy {
    fn default() -> Self {
        MarginPolicy::DEFAULT
    }
}

impl fmt::Display for MarginPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MarginPolicy::OneSide(px) => write!(f, "{px}"),
            MarginPolicy::TwoSide => f.write_str("two-side"),
        }
    }
}
