//! MaxRects bin packing without rotation.
//!
//! The bin keeps a list of maximal free rectangles. Placing a rect splits
//! every free rect it overlaps into up to four remainders, after which free
//! rects contained in others are pruned.

use crate::geometry::Rect;

/// Placement heuristic for [`MaxRectsBin`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Heuristic {
    /// Smallest leftover area, ties broken by short side.
    BestAreaFit,
    /// Smallest shorter leftover side.
    BestShortSideFit,
    /// Smallest longer leftover side.
    BestLongSideFit,
    /// Lowest top edge, then leftmost.
    BottomLeft,
    /// Longest shared perimeter with placed rects and bin walls.
    ContactPoint,
}

/// A single MaxRects sheet.
#[derive(Debug, Clone)]
pub struct MaxRectsBin {
    width: u32,
    height: u32,
    heuristic: Heuristic,
    used: Vec<Rect>,
    free: Vec<Rect>,
}

#[derive(Debug, Clone, Copy)]
struct Candidate {
    rect: Rect,
    primary: i64,
    secondary: i64,
}

impl MaxRectsBin {
    /// Creates an empty bin.
    pub fn new(width: u32, height: u32, heuristic: Heuristic) -> Self {
        Self {
            width,
            height,
            heuristic,
            used: Vec::new(),
            free: vec![Rect::new(0, 0, width, height)],
        }
    }

    /// Places a `width` x `height` rect, returning its position.
    pub fn insert(&mut self, width: u32, height: u32) -> Option<Rect> {
        if width == 0 || height == 0 {
            return None;
        }
        let best = self.find_position(width, height)?;
        self.place(best.rect);
        Some(best.rect)
    }

    /// Rects placed so far.
    pub fn used(&self) -> &[Rect] {
        &self.used
    }

    /// Fraction of the bin covered by placed rects.
    pub fn occupancy(&self) -> f64 {
        let used: u64 = self.used.iter().map(Rect::area).sum();
        used as f64 / (u64::from(self.width) * u64::from(self.height)) as f64
    }

    fn find_position(&self, width: u32, height: u32) -> Option<Candidate> {
        let mut best: Option<Candidate> = None;
        for free in &self.free {
            if free.width < width || free.height < height {
                continue;
            }
            let rect = Rect::new(free.x, free.y, width, height);
            let leftover_h = i64::from(free.width - width);
            let leftover_v = i64::from(free.height - height);
            let short = leftover_h.min(leftover_v);
            let long = leftover_h.max(leftover_v);
            // Lower scores win.
            let (primary, secondary) = match self.heuristic {
                Heuristic::BestAreaFit => (
                    free.area() as i64 - i64::from(width) * i64::from(height),
                    short,
                ),
                Heuristic::BestShortSideFit => (short, long),
                Heuristic::BestLongSideFit => (long, short),
                Heuristic::BottomLeft => (i64::from(free.y + height), i64::from(free.x)),
                Heuristic::ContactPoint => (-self.contact_score(&rect), 0),
            };
            let better = match best {
                None => true,
                Some(b) => (primary, secondary) < (b.primary, b.secondary),
            };
            if better {
                best = Some(Candidate {
                    rect,
                    primary,
                    secondary,
                });
            }
        }
        best
    }

    fn contact_score(&self, rect: &Rect) -> i64 {
        let mut score = 0i64;
        if rect.x == 0 || rect.right() == self.width {
            score += i64::from(rect.height);
        }
        if rect.y == 0 || rect.bottom() == self.height {
            score += i64::from(rect.width);
        }
        for used in &self.used {
            if used.x == rect.right() || used.right() == rect.x {
                score += common_interval(used.y, used.bottom(), rect.y, rect.bottom());
            }
            if used.y == rect.bottom() || used.bottom() == rect.y {
                score += common_interval(used.x, used.right(), rect.x, rect.right());
            }
        }
        score
    }

    fn place(&mut self, node: Rect) {
        let mut split = Vec::new();
        self.free.retain(|free| {
            if !free.intersects(&node) {
                return true;
            }
            split_free_rect(free, &node, &mut split);
            false
        });
        self.free.extend(split);
        self.prune();
        self.used.push(node);
    }

    fn prune(&mut self) {
        let mut i = 0;
        while i < self.free.len() {
            let mut removed_i = false;
            let mut j = i + 1;
            while j < self.free.len() {
                if self.free[j].contains(&self.free[i]) {
                    self.free.swap_remove(i);
                    removed_i = true;
                    break;
                }
                if self.free[i].contains(&self.free[j]) {
                    self.free.swap_remove(j);
                } else {
                    j += 1;
                }
            }
            if !removed_i {
                i += 1;
            }
        }
    }
}

fn split_free_rect(free: &Rect, used: &Rect, out: &mut Vec<Rect>) {
    if used.x < free.right() && used.right() > free.x {
        if used.y > free.y && used.y < free.bottom() {
            out.push(Rect::new(free.x, free.y, free.width, used.y - free.y));
        }
        if used.bottom() < free.bottom() {
            out.push(Rect::new(
                free.x,
                used.bottom(),
                free.width,
                free.bottom() - used.bottom(),
            ));
        }
    }
    if used.y < free.bottom() && used.bottom() > free.y {
        if used.x > free.x && used.x < free.right() {
            out.push(Rect::new(free.x, free.y, used.x - free.x, free.height));
        }
        if used.right() < free.right() {
            out.push(Rect::new(
                used.right(),
                free.y,
                free.right() - used.right(),
                free.height,
            ));
        }
    }
}

fn common_interval(a_start: u32, a_end: u32, b_start: u32, b_end: u32) -> i64 {
    if a_end < b_start || b_end < a_start {
        return 0;
    }
    i64::from(a_end.min(b_end)) - i64::from(a_start.max(b_start))
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: [Heuristic; 5] = [
        Heuristic::BestAreaFit,
        Heuristic::BestShortSideFit,
        Heuristic::BestLongSideFit,
        Heuristic::BottomLeft,
        Heuristic::ContactPoint,
    ];

    fn assert_disjoint(rects: &[Rect]) {
        for (i, a) in rects.iter().enumerate() {
            for b in &rects[i + 1..] {
                assert!(!a.intersects(b), "{a:?} overlaps {b:?}");
            }
        }
    }

    #[test]
    fn four_quarters_fill_the_bin() {
        for heuristic in ALL {
            let mut bin = MaxRectsBin::new(64, 64, heuristic);
            for _ in 0..4 {
                assert!(bin.insert(32, 32).is_some(), "{heuristic:?}");
            }
            assert!(bin.insert(1, 1).is_none());
            assert_disjoint(bin.used());
            assert!((bin.occupancy() - 1.0).abs() < f64::EPSILON);
        }
    }

    #[test]
    fn placements_stay_inside_and_disjoint() {
        let sizes = [(30, 10), (12, 40), (7, 7), (50, 3), (20, 20), (9, 31), (16, 16)];
        for heuristic in ALL {
            let mut bin = MaxRectsBin::new(128, 64, heuristic);
            for (w, h) in sizes {
                let r = bin.insert(w, h).expect("fits");
                assert!(r.right() <= 128 && r.bottom() <= 64);
                assert_eq!((r.width, r.height), (w, h));
            }
            assert_disjoint(bin.used());
        }
    }

    #[test]
    fn oversized_rect_is_rejected() {
        let mut bin = MaxRectsBin::new(16, 16, Heuristic::BestShortSideFit);
        assert!(bin.insert(17, 1).is_none());
        assert!(bin.insert(0, 4).is_none());
        assert!(bin.used().is_empty());
    }

    #[test]
    fn bottom_left_fills_top_row_first() {
        let mut bin = MaxRectsBin::new(32, 32, Heuristic::BottomLeft);
        let a = bin.insert(16, 8).unwrap();
        let b = bin.insert(16, 8).unwrap();
        assert_eq!((a.x, a.y), (0, 0));
        assert_eq!((b.x, b.y), (16, 0));
    }

    #[test]
    fn common_interval_overlap() {
        assert_eq!(common_interval(0, 10, 5, 20), 5);
        assert_eq!(common_interval(0, 4, 8, 9), 0);
    }
}
