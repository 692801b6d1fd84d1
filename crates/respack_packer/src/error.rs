//! Error types for rectangle packing.

/// Errors returned by [`RectanglePacker`](crate::RectanglePacker).
///
/// Rects that are merely too large for the atlas are not errors; they are
/// reported in [`PackOutput::unplaced`](crate::PackOutput::unplaced).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PackError {
    /// A rect with zero width or height was submitted.
    #[error("rect {id} has zero area ({width}x{height})")]
    ZeroArea {
        /// Caller-supplied identifier of the rect.
        id: usize,
        /// Requested width.
        width: u32,
        /// Requested height.
        height: u32,
    },

    /// The maximum atlas size is not a power of two, or is too large.
    #[error("max atlas size {0} is not a power of two up to 65536")]
    InvalidMaxSize(u32),

    /// No packing heuristic was requested.
    #[error("no packing algorithm specified")]
    NoAlgorithms,

    /// A heuristic name could not be recognized.
    #[error("unknown packing algorithm '{0}'")]
    UnknownAlgorithm(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_area_display() {
        let err = PackError::ZeroArea {
            id: 3,
            width: 0,
            height: 12,
        };
        assert_eq!(err.to_string(), "rect 3 has zero area (0x12)");
    }

    #[test]
    fn invalid_max_size_display() {
        assert!(PackError::InvalidMaxSize(300).to_string().contains("300"));
    }
}
