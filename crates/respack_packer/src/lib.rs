//! Rectangle bin packing for texture atlases.
//!
//! Sprites are packed into power-of-two sheets using one or more heuristics
//! from the MaxRects family, or a simple guillotine splitter. Every requested
//! heuristic is run over the same input and the cheapest result (smallest
//! total atlas area) wins, so asking for more heuristics never produces a
//! worse atlas set.

#![warn(missing_docs)]

pub mod algorithm;
pub mod error;
pub mod geometry;
pub mod guillotine;
pub mod layout;
pub mod margin;
pub mod maxrects;
pub mod packer;

pub use algorithm::PackAlgorithm;
pub use error::PackError;
pub use geometry::Rect;
pub use layout::{SheetLayout, SheetPlacement};
pub use margin::{MarginPolicy, Padding};
pub use packer::{Atlas, PackInput, PackOutput, PackedRect, RectanglePacker};
