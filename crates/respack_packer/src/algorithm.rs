//! Packing heuristics.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::PackError;

/// A single placement heuristic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum PackAlgorithm {
    /// MaxRects, minimize wasted area of the chosen free rect.
    MaxRectsBestAreaFit,
    /// MaxRects, minimize the shorter leftover side.
    MaxRectsBestShortSideFit,
    /// MaxRects, minimize the longer leftover side.
    MaxRectsBestLongSideFit,
    /// MaxRects, Tetris-style bottom-left placement.
    MaxRectsBottomLeft,
    /// MaxRects, maximize perimeter contact with placed rects and sheet edges.
    MaxRectsContactPoint,
    /// Guillotine binary-tree splitter.
    Basic,
}

impl PackAlgorithm {
    /// All MaxRects heuristics, in the order they are tried.
    pub const MAX_RECTS: [PackAlgorithm; 5] = [
        PackAlgorithm::MaxRectsBestAreaFit,
        PackAlgorithm::MaxRectsBestShortSideFit,
        PackAlgorithm::MaxRectsBestLongSideFit,
        PackAlgorithm::MaxRectsBottomLeft,
        PackAlgorithm::MaxRectsContactPoint,
    ];

    /// Stable name used in logs and build parameters.
    pub fn name(self) -> &'static str {
        match self {
            PackAlgorithm::MaxRectsBestAreaFit => "maxrects-best-area",
            PackAlgorithm::MaxRectsBestShortSideFit => "maxrects-best-short-side",
            PackAlgorithm::MaxRectsBestLongSideFit => "maxrects-best-long-side",
            PackAlgorithm::MaxRectsBottomLeft => "maxrects-bottom-left",
            PackAlgorithm::MaxRectsContactPoint => "maxrects-contact-point",
            PackAlgorithm::Basic => "basic",
        }
    }

    /// Returns `true` for the MaxRects family.
    pub fn is_max_rects(self) -> bool {
        !matches!(self, PackAlgorithm::Basic)
    }
}

impl fmt::Display for PackAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for PackAlgorithm {
    type Err = PackError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_ascii_lowercase();
        [PackAlgorithm::Basic]
            .into_iter()
            .chain(PackAlgorithm::MAX_RECTS)
            .find(|alg| alg.name() == lower)
            .ok_or_else(|| PackError::UnknownAlgorithm(s.to_string()))
    }
}
