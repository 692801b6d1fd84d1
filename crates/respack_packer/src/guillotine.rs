//! Guillotine packer backed by a binary split tree.
//!
//! Each node is either a leaf (free or occupied) or an internal node whose
//! two children partition its area. A placement descends into the first leaf
//! large enough and splits it along the axis with the larger leftover.

use crate::geometry::Rect;

#[derive(Debug, Clone)]
struct Node {
    rect: Rect,
    children: Option<(usize, usize)>,
    occupied: bool,
}

/// A single guillotine sheet.
#[derive(Debug, Clone)]
pub struct GuillotineBin {
    nodes: Vec<Node>,
}

impl GuillotineBin {
    /// Creates an empty bin.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            nodes: vec![Node {
                rect: Rect::new(0, 0, width, height),
                children: None,
                occupied: false,
            }],
        }
    }

    /// Places a `width` x `height` rect, returning its position.
    pub fn insert(&mut self, width: u32, height: u32) -> Option<Rect> {
        if width == 0 || height == 0 {
            return None;
        }
        self.insert_at(0, width, height)
    }

    fn insert_at(&mut self, index: usize, width: u32, height: u32) -> Option<Rect> {
        if let Some((first, second)) = self.nodes[index].children {
            return self
                .insert_at(first, width, height)
                .or_else(|| self.insert_at(second, width, height));
        }

        let node = &self.nodes[index];
        if node.occupied || width > node.rect.width || height > node.rect.height {
            return None;
        }
        let rect = node.rect;
        if width == rect.width && height == rect.height {
            self.nodes[index].occupied = true;
            return Some(rect);
        }

        let dw = rect.width - width;
        let dh = rect.height - height;
        let (a, b) = if dw > dh {
            (
                Rect::new(rect.x, rect.y, width, rect.height),
                Rect::new(rect.x + width, rect.y, dw, rect.height),
            )
        } else {
            (
                Rect::new(rect.x, rect.y, rect.width, height),
                Rect::new(rect.x, rect.y + height, rect.width, dh),
            )
        };
        let first = self.push_leaf(a);
        let second = self.push_leaf(b);
        self.nodes[index].children = Some((first, second));
        self.insert_at(first, width, height)
    }

    fn push_leaf(&mut self, rect: Rect) -> usize {
        self.nodes.push(Node {
            rect,
            children: None,
            occupied: false,
        });
        self.nodes.len() - 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_fit_occupies_root() {
        let mut bin = GuillotineBin::new(16, 16);
        assert_eq!(bin.insert(16, 16), Some(Rect::new(0, 0, 16, 16)));
        assert_eq!(bin.insert(1, 1), None);
    }

    #[test]
    fn splits_along_larger_leftover() {
        let mut bin = GuillotineBin::new(64, 16);
        let a = bin.insert(16, 16).unwrap();
        let b = bin.insert(16, 16).unwrap();
        assert_eq!((a.x, a.y), (0, 0));
        assert_eq!((b.x, b.y), (16, 0));
    }

    #[test]
    fn placements_do_not_overlap() {
        let mut bin = GuillotineBin::new(64, 64);
        let mut placed = Vec::new();
        for (w, h) in [(20, 30), (10, 10), (40, 12), (8, 50), (16, 16), (5, 5)] {
            if let Some(r) = bin.insert(w, h) {
                placed.push(r);
            }
        }
        assert!(placed.len() >= 5);
        for (i, a) in placed.iter().enumerate() {
            assert!(a.right() <= 64 && a.bottom() <= 64);
            for b in &placed[i + 1..] {
                assert!(!a.intersects(b));
            }
        }
    }
}
