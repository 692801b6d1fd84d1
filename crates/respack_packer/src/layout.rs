//! A candidate sheet: a bin plus the margin policy applied to every sprite.

use crate::algorithm::PackAlgorithm;
use crate::geometry::Rect;
use crate::guillotine::GuillotineBin;
use crate::margin::MarginPolicy;
use crate::maxrects::{Heuristic, MaxRectsBin};

#[derive(Debug, Clone)]
enum Bin {
    MaxRects(MaxRectsBin),
    Guillotine(GuillotineBin),
}

/// Where one sprite ended up on a sheet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SheetPlacement {
    /// Caller-supplied identifier.
    pub id: usize,
    /// Sprite pixels, excluding the gutter.
    pub rect: Rect,
    /// Sprite pixels plus gutter, as reserved in the bin.
    pub padded: Rect,
}

/// One sheet being filled by a single heuristic.
#[derive(Debug, Clone)]
pub struct SheetLayout {
    width: u32,
    height: u32,
    margin: MarginPolicy,
    algorithm: PackAlgorithm,
    bin: Bin,
    placements: Vec<SheetPlacement>,
}

impl SheetLayout {
    /// Creates an empty `width` x `height` sheet.
    pub fn new(width: u32, height: u32, margin: MarginPolicy, algorithm: PackAlgorithm) -> Self {
        let bin = match algorithm {
            PackAlgorithm::Basic => Bin::Guillotine(GuillotineBin::new(width, height)),
            PackAlgorithm::MaxRectsBestAreaFit => {
                Bin::MaxRects(MaxRectsBin::new(width, height, Heuristic::BestAreaFit))
            }
            PackAlgorithm::MaxRectsBestShortSideFit => {
                Bin::MaxRects(MaxRectsBin::new(width, height, Heuristic::BestShortSideFit))
            }
            PackAlgorithm::MaxRectsBestLongSideFit => {
                Bin::MaxRects(MaxRectsBin::new(width, height, Heuristic::BestLongSideFit))
            }
            PackAlgorithm::MaxRectsBottomLeft => {
                Bin::MaxRects(MaxRectsBin::new(width, height, Heuristic::BottomLeft))
            }
            PackAlgorithm::MaxRectsContactPoint => {
                Bin::MaxRects(MaxRectsBin::new(width, height, Heuristic::ContactPoint))
            }
        };
        Self {
            width,
            height,
            margin,
            algorithm,
            bin,
            placements: Vec::new(),
        }
    }

    /// Tries to place a sprite; returns `false` if the padded sprite does not fit.
    pub fn add_sprite(&mut self, id: usize, width: u32, height: u32) -> bool {
        let pad = self.margin.padding();
        let (pw, ph) = self.margin.padded_size(width, height);
        if pw > self.width || ph > self.height {
            return false;
        }
        let placed = match &mut self.bin {
            Bin::MaxRects(bin) => bin.insert(pw, ph),
            Bin::Guillotine(bin) => bin.insert(pw, ph),
        };
        match placed {
            Some(padded) => {
                self.placements.push(SheetPlacement {
                    id,
                    rect: Rect::new(padded.x + pad.left, padded.y + pad.top, width, height),
                    padded,
                });
                true
            }
            None => false,
        }
    }

    /// Sheet width.
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Sheet height.
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Sheet area in pixels.
    pub fn area(&self) -> u64 {
        u64::from(self.width) * u64::from(self.height)
    }

    /// Heuristic filling this sheet.
    pub fn algorithm(&self) -> PackAlgorithm {
        self.algorithm
    }

    /// Sprites placed so far, in insertion order.
    pub fn placements(&self) -> &[SheetPlacement] {
        &self.placements
    }

    /// Bounding box of all reserved rects, or `None` for an empty sheet.
    pub fn used_bounds(&self) -> Option<Rect> {
        self.placements
            .iter()
            .map(|p| p.padded)
            .reduce(|acc, r| acc.union(&r))
    }

    pub(crate) fn into_placements(self) -> Vec<SheetPlacement> {
        self.placements
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn one_side_margin_offsets_nothing() {
        let mut sheet = SheetLayout::new(
            32,
            32,
            MarginPolicy::OneSide(2),
            PackAlgorithm::MaxRectsBottomLeft,
        );
        assert!(sheet.add_sprite(7, 10, 10));
        let p = sheet.placements()[0];
        assert_eq!(p.id, 7);
        assert_eq!(p.rect, Rect::new(0, 0, 10, 10));
        assert_eq!(p.padded, Rect::new(0, 0, 12, 12));
    }

    #[test]
    fn two_side_margin_insets_sprite() {
        let mut sheet = SheetLayout::new(16, 16, MarginPolicy::TwoSide, PackAlgorithm::Basic);
        assert!(sheet.add_sprite(0, 14, 14));
        assert_eq!(sheet.placements()[0].rect, Rect::new(1, 1, 14, 14));
        assert!(!sheet.add_sprite(1, 1, 1));
    }

    #[test]
    fn padded_sprite_must_fit_sheet() {
        let mut sheet = SheetLayout::new(
            16,
            16,
            MarginPolicy::OneSide(1),
            PackAlgorithm::MaxRectsBestAreaFit,
        );
        assert!(!sheet.add_sprite(0, 16, 16));
        assert!(sheet.used_bounds().is_none());
    }

    #[test]
    fn used_bounds_covers_placements() {
        let mut sheet = SheetLayout::new(
            64,
            64,
            MarginPolicy::OneSide(0),
            PackAlgorithm::MaxRectsBottomLeft,
        );
        sheet.add_sprite(0, 10, 20);
        sheet.add_sprite(1, 10, 5);
        assert_eq!(sheet.used_bounds(), Some(Rect::new(0, 0, 20, 20)));
    }
}
