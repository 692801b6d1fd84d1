//! In-memory sprite definitions.

use std::path::{Path, PathBuf};

use image::RgbaImage;

/// One packable image of a sprite.
#[derive(Debug, Clone)]
pub struct Frame {
    /// Name written to the descriptor; empty for unnamed frames.
    pub name: String,
    /// Position of the frame inside the sprite, after cropping.
    pub offset_x: u32,
    /// See [`Frame::offset_x`].
    pub offset_y: u32,
    /// Frame pixels.
    pub pixels: RgbaImage,
}

impl Frame {
    /// Creates a frame.
    pub fn new(name: impl Into<String>, offset_x: u32, offset_y: u32, pixels: RgbaImage) -> Self {
        Self {
            name: name.into(),
            offset_x,
            offset_y,
            pixels,
        }
    }

    /// Frame width in pixels.
    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    /// Frame height in pixels.
    pub fn height(&self) -> u32 {
        self.pixels.height()
    }
}

/// A sprite loaded from one source file.
///
/// Owned by the directory build that loaded it and dropped once that
/// directory's atlases and descriptors are written.
#[derive(Debug, Clone)]
pub struct Definition {
    /// Base name of the source file; the descriptor is `<name>.txt`.
    pub name: String,
    /// Source file.
    pub source: PathBuf,
    /// Full sprite width.
    pub sprite_width: u32,
    /// Full sprite height.
    pub sprite_height: u32,
    /// Frames in source order.
    pub frames: Vec<Frame>,
}

impl Definition {
    /// Creates a definition named after the stem of `source`.
    pub fn new(source: &Path, sprite_width: u32, sprite_height: u32, frames: Vec<Frame>) -> Self {
        Self {
            name: stem_of(source),
            source: source.to_path_buf(),
            sprite_width,
            sprite_height,
            frames,
        }
    }

    /// Number of frames.
    pub fn frame_count(&self) -> usize {
        self.frames.len()
    }

    /// File name of the descriptor written next to the atlases.
    pub fn descriptor_name(&self) -> String {
        format!("{}.txt", self.name)
    }
}

pub(crate) fn stem_of(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_follow_the_source_stem() {
        let frame = Frame::new("", 0, 0, RgbaImage::new(4, 3));
        let def = Definition::new(Path::new("gfx/ui/icon.psd"), 4, 3, vec![frame]);
        assert_eq!(def.name, "icon");
        assert_eq!(def.descriptor_name(), "icon.txt");
        assert_eq!(def.frame_count(), 1);
        assert_eq!((def.frames[0].width(), def.frames[0].height()), (4, 3));
    }
}
