//! Multi-sheet packing driver.

use rayon::prelude::*;
use tracing::debug;

use crate::algorithm::PackAlgorithm;
use crate::error::PackError;
use crate::geometry::Rect;
use crate::layout::SheetLayout;
use crate::margin::MarginPolicy;

/// Default upper bound for sheet width and height.
pub const DEFAULT_MAX_SIZE: u32 = 2048;

/// Largest accepted sheet edge.
pub const MAX_SHEET_SIZE: u32 = 1 << 16;

/// Smallest sheet edge tried.
const MIN_SHEET_SIZE: u32 = 8;

/// A rect to be packed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PackInput {
    /// Caller-supplied identifier, echoed back in the output.
    pub id: usize,
    /// Width in pixels, excluding margins.
    pub width: u32,
    /// Height in pixels, excluding margins.
    pub height: u32,
}

impl PackInput {
    /// Creates an input rect.
    pub fn new(id: usize, width: u32, height: u32) -> Self {
        Self { id, width, height }
    }

    fn area(&self) -> u64 {
        u64::from(self.width) * u64::from(self.height)
    }
}

/// One output sheet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Atlas {
    /// Sheet width, a power of two.
    pub width: u32,
    /// Sheet height, a power of two.
    pub height: u32,
}

impl Atlas {
    /// Sheet area in pixels.
    pub fn area(&self) -> u64 {
        u64::from(self.width) * u64::from(self.height)
    }
}

/// Final position of one input rect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PackedRect {
    /// Identifier from the matching [`PackInput`].
    pub id: usize,
    /// Index into [`PackOutput::atlases`].
    pub atlas: usize,
    /// Sprite pixels on the sheet.
    pub rect: Rect,
    /// Sprite pixels plus gutter.
    pub padded: Rect,
    /// Always `false`; sprites are never rotated.
    pub rotated: bool,
}

/// Result of [`RectanglePacker::pack`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PackOutput {
    /// Heuristic that produced this layout, `None` when nothing was packed.
    pub algorithm: Option<PackAlgorithm>,
    /// Sheets in output order.
    pub atlases: Vec<Atlas>,
    /// Positions of every packed rect, grouped by sheet.
    pub placements: Vec<PackedRect>,
    /// Identifiers of rects that could not be placed, in input order.
    pub unplaced: Vec<usize>,
}

impl PackOutput {
    /// Sum of all sheet areas.
    pub fn total_area(&self) -> u64 {
        self.atlases.iter().map(Atlas::area).sum()
    }

    /// Looks up the placement of the rect with `id`.
    pub fn placement(&self, id: usize) -> Option<&PackedRect> {
        self.placements.iter().find(|p| p.id == id)
    }

    /// Placements on sheet `atlas`.
    pub fn placements_on(&self, atlas: usize) -> impl Iterator<Item = &PackedRect> {
        self.placements.iter().filter(move |p| p.atlas == atlas)
    }
}

/// Packs rects into as few, as small, power-of-two sheets as the configured
/// heuristics can find.
#[derive(Debug, Clone)]
pub struct RectanglePacker {
    algorithms: Vec<PackAlgorithm>,
    max_size: u32,
    margin: MarginPolicy,
    square_only: bool,
}

struct Attempt {
    algorithm: PackAlgorithm,
    sheets: Vec<SheetLayout>,
    leftover: Vec<usize>,
}

impl Attempt {
    fn score(&self) -> (u64, usize, u64) {
        let area = self.sheets.iter().map(SheetLayout::area).sum();
        let used = self
            .sheets
            .iter()
            .filter_map(SheetLayout::used_bounds)
            .map(|r| r.area())
            .sum();
        (area, self.sheets.len(), used)
    }
}

impl RectanglePacker {
    /// Creates a packer trying each of `algorithms`.
    pub fn new(algorithms: Vec<PackAlgorithm>) -> Result<Self, PackError> {
        if algorithms.is_empty() {
            return Err(PackError::NoAlgorithms);
        }
        Ok(Self {
            algorithms,
            max_size: DEFAULT_MAX_SIZE,
            margin: MarginPolicy::DEFAULT,
            square_only: false,
        })
    }

    /// Sets the maximum sheet edge, which must be a power of two no larger
    /// than [`MAX_SHEET_SIZE`].
    pub fn with_max_size(mut self, max_size: u32) -> Result<Self, PackError> {
        if !max_size.is_power_of_two() || max_size > MAX_SHEET_SIZE {
            return Err(PackError::InvalidMaxSize(max_size));
        }
        self.max_size = max_size;
        Ok(self)
    }

    /// Sets the gutter policy.
    pub fn with_margin(mut self, margin: MarginPolicy) -> Self {
        self.margin = margin;
        self
    }

    /// Restricts output to square sheets.
    pub fn square_only(mut self, square_only: bool) -> Self {
        self.square_only = square_only;
        self
    }

    /// Maximum sheet edge.
    pub fn max_size(&self) -> u32 {
        self.max_size
    }

    /// Gutter policy.
    pub fn margin(&self) -> MarginPolicy {
        self.margin
    }

    /// Heuristics tried, in order.
    pub fn algorithms(&self) -> &[PackAlgorithm] {
        &self.algorithms
    }

    /// Packs `rects`.
    ///
    /// Rects whose padded size exceeds the maximum sheet are reported in
    /// [`PackOutput::unplaced`]; the rest are packed. Each heuristic is run
    /// independently and the layout with the smallest total area wins, ties
    /// going to fewer sheets, then tighter content, then the earlier
    /// heuristic.
    pub fn pack(&self, rects: &[PackInput]) -> Result<PackOutput, PackError> {
        if let Some(bad) = rects.iter().find(|r| r.width == 0 || r.height == 0) {
            return Err(PackError::ZeroArea {
                id: bad.id,
                width: bad.width,
                height: bad.height,
            });
        }

        let (mut fitting, oversized): (Vec<PackInput>, Vec<PackInput>) =
            rects.iter().copied().partition(|r| {
                let (w, h) = self.margin.padded_size(r.width, r.height);
                w <= self.max_size && h <= self.max_size
            });
        for r in &oversized {
            debug!(id = r.id, width = r.width, height = r.height, "rect exceeds max sheet size");
        }
        fitting.sort_by(|a, b| b.area().cmp(&a.area()));

        let mut output = PackOutput {
            unplaced: oversized.iter().map(|r| r.id).collect(),
            ..PackOutput::default()
        };
        if fitting.is_empty() {
            return Ok(output);
        }

        let attempts: Vec<Attempt> = self
            .algorithms
            .par_iter()
            .map(|&alg| self.pack_with(alg, &fitting))
            .collect();

        let Some(best) = attempts
            .into_iter()
            .enumerate()
            .min_by_key(|(i, a)| (a.score(), *i))
            .map(|(_, a)| a)
        else {
            return Ok(output);
        };
        debug!(
            algorithm = %best.algorithm,
            sheets = best.sheets.len(),
            area = best.score().0,
            "selected packing"
        );

        output.algorithm = Some(best.algorithm);
        output.unplaced.extend(best.leftover);
        for (index, sheet) in best.sheets.into_iter().enumerate() {
            output.atlases.push(Atlas {
                width: sheet.width(),
                height: sheet.height(),
            });
            output
                .placements
                .extend(sheet.into_placements().into_iter().map(|p| PackedRect {
                    id: p.id,
                    atlas: index,
                    rect: p.rect,
                    padded: p.padded,
                    rotated: false,
                }));
        }
        let order: Vec<usize> = rects.iter().map(|r| r.id).collect();
        output
            .unplaced
            .sort_by_key(|id| order.iter().position(|o| o == id));
        Ok(output)
    }

    fn pack_with(&self, algorithm: PackAlgorithm, sorted: &[PackInput]) -> Attempt {
        let mut remaining = sorted.to_vec();
        let mut sheets = Vec::new();
        while !remaining.is_empty() {
            match self.best_sheet(algorithm, &remaining) {
                Some((sheet, left)) => {
                    sheets.push(sheet);
                    remaining = left;
                }
                None => break,
            }
        }
        Attempt {
            algorithm,
            sheets,
            leftover: remaining.iter().map(|r| r.id).collect(),
        }
    }

    /// Picks the sheet size that packs the most of `remaining`, preferring a
    /// sheet that takes everything and then the smallest such sheet.
    fn best_sheet(
        &self,
        algorithm: PackAlgorithm,
        remaining: &[PackInput],
    ) -> Option<(SheetLayout, Vec<PackInput>)> {
        let sizes = sheet_sizes(self.max_size);
        let mut best: Option<(SheetLayout, Vec<PackInput>, u64)> = None;
        let mut full = false;

        for &height in &sizes {
            for &width in &sizes {
                if self.square_only && width != height {
                    continue;
                }
                let area = u64::from(width) * u64::from(height);
                if full && best.as_ref().is_some_and(|(s, _, _)| area >= s.area()) {
                    continue;
                }

                let mut sheet = SheetLayout::new(width, height, self.margin, algorithm);
                let (left, weight) = fill_sheet(&mut sheet, remaining, full);
                let now_full = left.is_empty();
                if full && !now_full {
                    continue;
                }
                let better = match &best {
                    None => weight > 0,
                    Some((s, _, best_weight)) => {
                        now_full
                            || weight > *best_weight
                            || (weight == *best_weight && area < s.area())
                    }
                };
                if better {
                    full |= now_full;
                    best = Some((sheet, left, weight));
                }
            }
        }
        best.map(|(sheet, left, _)| (sheet, left))
    }
}

fn fill_sheet(
    sheet: &mut SheetLayout,
    items: &[PackInput],
    stop_on_failure: bool,
) -> (Vec<PackInput>, u64) {
    let mut left = Vec::new();
    let mut weight = 0;
    for item in items {
        if sheet.add_sprite(item.id, item.width, item.height) {
            weight += item.area();
        } else {
            left.push(*item);
            if stop_on_failure {
                break;
            }
        }
    }
    (left, weight)
}

fn sheet_sizes(max_size: u32) -> Vec<u32> {
    let mut sizes = Vec::new();
    let mut size = MIN_SHEET_SIZE.min(max_size);
    while size <= max_size {
        sizes.push(size);
        match size.checked_mul(2) {
            Some(next) => size = next,
            None => break,
        }
    }
    sizes
}
