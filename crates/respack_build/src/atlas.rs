//! Atlas composition and descriptor output.

use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};

use image::RgbaImage;
use respack_config::PackSettings;
use respack_packer::{PackAlgorithm, PackInput, PackOutput, Rect, RectanglePacker};
use tracing::{debug, warn};

use crate::definition::Definition;
use crate::texture::{TextureConverter, TextureRequest, DESCRIPTOR_EXTENSION};

/// Basename of the shared atlas set.
pub const SHARED_BASENAME: &str = "texture";

/// Everything needed to turn a directory's definitions into atlases.
pub struct AtlasJob<'a> {
    /// Settings of the directory.
    pub settings: &'a PackSettings,
    /// Heuristics to try.
    pub algorithms: &'a [PackAlgorithm],
    /// Appended to every texture name.
    pub texture_postfix: &'a str,
    /// Export targets.
    pub request: TextureRequest<'a>,
    /// Texture writer.
    pub converter: &'a dyn TextureConverter,
}

/// Files written by an [`AtlasJob`] and the problems met on the way.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct AtlasOutcome {
    /// Texture names, without extension.
    pub textures: Vec<String>,
    /// Descriptor files written.
    pub descriptors: Vec<PathBuf>,
    /// Recoverable errors; the rest of the output is still valid.
    pub errors: Vec<String>,
}

impl AtlasJob<'_> {
    /// Packs `definitions` into `output`: one shared `texture<N>` set, or one
    /// set per definition in split mode.
    pub fn run(&self, output: &Path, definitions: &[Definition]) -> AtlasOutcome {
        let mut outcome = AtlasOutcome::default();
        if self.settings.split {
            debug!("packing to separate textures");
            for definition in definitions {
                self.pack_set(output, &definition.name, std::slice::from_ref(definition), &mut outcome);
            }
        } else {
            self.pack_set(output, SHARED_BASENAME, definitions, &mut outcome);
        }
        outcome
    }

    /// `<basename><index><postfix>`.
    pub fn texture_name(&self, basename: &str, index: usize) -> String {
        format!("{basename}{index}{}", self.texture_postfix)
    }

    fn pack_set(&self, output: &Path, basename: &str, definitions: &[Definition], outcome: &mut AtlasOutcome) {
        let mut frame_ids = Vec::new();
        let mut inputs = Vec::new();
        for (d, definition) in definitions.iter().enumerate() {
            for (f, frame) in definition.frames.iter().enumerate() {
                inputs.push(PackInput::new(frame_ids.len(), frame.width(), frame.height()));
                frame_ids.push((d, f));
            }
        }

        let packed = RectanglePacker::new(self.algorithms.to_vec())
            .and_then(|p| p.with_max_size(self.settings.max_texture_size))
            .map(|p| p.with_margin(self.settings.margin).square_only(self.settings.square_only))
            .and_then(|p| p.pack(&inputs));
        let packed = match packed {
            Ok(packed) => packed,
            Err(e) => {
                outcome.errors.push(format!("{basename}: {e}"));
                return;
            }
        };

        for id in &packed.unplaced {
            let (d, f) = frame_ids[*id];
            let frame = &definitions[d].frames[f];
            outcome.errors.push(format!(
                "Frame {f} of {} ({}x{}) does not fit into {}x{}",
                definitions[d].name,
                frame.width(),
                frame.height(),
                self.settings.max_texture_size,
                self.settings.max_texture_size
            ));
        }

        debug!(basename, textures = packed.atlases.len(), algorithm = ?packed.algorithm, "writing textures");
        for (index, sheet) in compose(&packed, definitions, &frame_ids, self.settings.margin.is_two_side())
            .iter()
            .enumerate()
        {
            let name = self.texture_name(basename, index);
            match self.converter.convert(sheet, &self.request, &output.join(&name)) {
                Ok(_) => outcome.textures.push(name),
                Err(e) => outcome.errors.push(format!("Can't export texture {name}: {e}")),
            }
        }

        for (d, definition) in definitions.iter().enumerate() {
            let path = output.join(definition.descriptor_name());
            match self.descriptor(basename, &packed, d, definition, &frame_ids) {
                Ok(text) => match fs::write(&path, text) {
                    Ok(()) => outcome.descriptors.push(path),
                    Err(e) => outcome
                        .errors
                        .push(format!("Unable to open file for writing: {} ({e})", path.display())),
                },
                Err(message) => {
                    let _ = fs::remove_file(&path);
                    outcome.errors.push(message);
                }
            }
        }
    }

    /// Renders the `<definition>.txt` descriptor.
    fn descriptor(
        &self,
        basename: &str,
        packed: &PackOutput,
        def_index: usize,
        definition: &Definition,
        frame_ids: &[(usize, usize)],
    ) -> Result<String, String> {
        let mut placements = Vec::with_capacity(definition.frames.len());
        for f in 0..definition.frames.len() {
            let placed = frame_ids
                .iter()
                .position(|ids| *ids == (def_index, f))
                .and_then(|id| packed.placement(id));
            match placed {
                Some(p) => placements.push(p),
                None => {
                    return Err(format!(
                        "Can't find rect in all of packers for frame - {f}. Definition file - {}.",
                        definition.descriptor_name()
                    ))
                }
            }
        }

        // Sheets used by this definition, numbered in sheet order.
        let mut local: BTreeMap<usize, usize> = placements.iter().map(|p| (p.atlas, 0)).collect();
        for (i, slot) in local.values_mut().enumerate() {
            *slot = i;
        }

        let mut text = String::new();
        let _ = writeln!(text, "{}", local.len());
        for sheet in local.keys() {
            let _ = writeln!(text, "{}.{DESCRIPTOR_EXTENSION}", self.texture_name(basename, *sheet));
        }
        let _ = writeln!(text, "{} {}", definition.sprite_width, definition.sprite_height);
        let _ = writeln!(text, "{}", definition.frames.len());
        for (frame, placement) in definition.frames.iter().zip(&placements) {
            let r = placement.rect;
            let (ox, oy) = if self.settings.crop_alpha {
                (frame.offset_x, frame.offset_y)
            } else {
                (0, 0)
            };
            if r.width > definition.sprite_width || r.height > definition.sprite_height {
                warn!(
                    definition = %definition.name,
                    "frame is bigger than the sprite and will be cropped"
                );
            }
            let _ = write!(text, "{} {} {} {} {ox} {oy} {}", r.x, r.y, r.width, r.height, local[&placement.atlas]);
            if !frame.name.is_empty() {
                let _ = write!(text, " {}", frame.name);
            }
            text.push('\n');
        }
        Ok(text)
    }
}

/// Draws every placed frame onto its sheet.
fn compose(packed: &PackOutput, definitions: &[Definition], frame_ids: &[(usize, usize)], extrude: bool) -> Vec<RgbaImage> {
    let mut sheets: Vec<RgbaImage> = packed
        .atlases
        .iter()
        .map(|a| RgbaImage::new(a.width, a.height))
        .collect();
    for placement in &packed.placements {
        let (d, f) = frame_ids[placement.id];
        let pixels = &definitions[d].frames[f].pixels;
        let Some(sheet) = sheets.get_mut(placement.atlas) else {
            continue;
        };
        image::imageops::replace(sheet, pixels, i64::from(placement.rect.x), i64::from(placement.rect.y));
        if extrude {
            extrude_edges(sheet, placement.rect, placement.padded);
        }
    }
    sheets
}

/// Fills the gutter between `rect` and `padded` with the nearest edge pixel.
fn extrude_edges(sheet: &mut RgbaImage, rect: Rect, padded: Rect) {
    if rect.width == 0 || rect.height == 0 {
        return;
    }
    let right = padded.right().min(sheet.width());
    let bottom = padded.bottom().min(sheet.height());
    for y in padded.y..bottom {
        for x in padded.x..right {
            let inside = x >= rect.x && x < rect.right() && y >= rect.y && y < rect.bottom();
            if inside {
                continue;
            }
            let sx = x.clamp(rect.x, rect.right() - 1);
            let sy = y.clamp(rect.y, rect.bottom() - 1);
            let pixel = *sheet.get_pixel(sx, sy);
            sheet.put_pixel(x, y, pixel);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::definition::Frame;
    use crate::texture::PngTextureConverter;
    use image::Rgba;
    use respack_packer::MarginPolicy;
    use std::path::Path;

    fn solid(w: u32, h: u32, value: u8) -> RgbaImage {
        RgbaImage::from_pixel(w, h, Rgba([value, value, value, 255]))
    }

    fn def(name: &str, frames: Vec<Frame>, w: u32, h: u32) -> Definition {
        Definition::new(Path::new(&format!("{name}.png")), w, h, frames)
    }

    fn job<'a>(settings: &'a PackSettings, params: &'a BTreeMap<respack_config::GpuFamily, Vec<String>>) -> AtlasJob<'a> {
        AtlasJob {
            settings,
            algorithms: &[PackAlgorithm::MaxRectsBestAreaFit],
            texture_postfix: "",
            request: TextureRequest {
                gpus: &[respack_config::GpuFamily::Origin],
                quality: 4,
                gpu_params: params,
            },
            converter: &PngTextureConverter,
        }
    }

    #[test]
    fn shared_atlas_and_descriptors() {
        let dir = tempfile::tempdir().unwrap();
        let settings = PackSettings::default();
        let params = BTreeMap::new();
        let defs = vec![
            def("icon", vec![Frame::new("", 0, 0, solid(32, 32, 10))], 32, 32),
            def("icon2", vec![Frame::new("", 0, 0, solid(64, 64, 20))], 64, 64),
        ];
        let outcome = job(&settings, &params).run(dir.path(), &defs);
        assert!(outcome.errors.is_empty(), "{:?}", outcome.errors);
        assert_eq!(outcome.textures, ["texture0"]);
        assert!(dir.path().join("texture0.png").exists());
        assert!(dir.path().join("texture0.tex").exists());

        let text = fs::read_to_string(dir.path().join("icon.txt")).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "1");
        assert_eq!(lines[1], "texture0.tex");
        assert_eq!(lines[2], "32 32");
        assert_eq!(lines[3], "1");
        let fields: Vec<u32> = lines[4].split(' ').map(|f| f.parse().unwrap()).collect();
        assert_eq!(&fields[2..], &[32, 32, 0, 0, 0]);

        let sheet = image::open(dir.path().join("texture0.png")).unwrap().to_rgba8();
        assert_eq!(sheet.get_pixel(fields[0], fields[1])[0], 10);
    }

    #[test]
    fn split_mode_names_textures_after_definitions() {
        let dir = tempfile::tempdir().unwrap();
        let settings = PackSettings {
            split: true,
            ..PackSettings::default()
        };
        let params = BTreeMap::new();
        let mut job = job(&settings, &params);
        job.texture_postfix = "_hd";
        let defs = vec![
            def("a", vec![Frame::new("", 0, 0, solid(8, 8, 1))], 8, 8),
            def("b", vec![Frame::new("", 0, 0, solid(8, 8, 2))], 8, 8),
        ];
        let outcome = job.run(dir.path(), &defs);
        assert_eq!(outcome.textures, ["a0_hd", "b0_hd"]);
        let text = fs::read_to_string(dir.path().join("b.txt")).unwrap();
        assert_eq!(text.lines().nth(1), Some("b0_hd.tex"));
    }

    #[test]
    fn offsets_and_names_in_descriptor() {
        let dir = tempfile::tempdir().unwrap();
        let params = BTreeMap::new();
        let frames = vec![
            Frame::new("walk", 3, 4, solid(5, 6, 1)),
            Frame::new("", 1, 2, solid(5, 6, 1)),
        ];
        let defs = vec![def("hero", frames, 16, 16)];

        let settings = PackSettings::default();
        job(&settings, &params).run(dir.path(), &defs);
        let text = fs::read_to_string(dir.path().join("hero.txt")).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[3], "2");
        assert!(lines[4].ends_with(" 3 4 0 walk"), "{}", lines[4]);
        assert!(lines[5].ends_with(" 1 2 0"), "{}", lines[5]);

        let uncropped = PackSettings {
            crop_alpha: false,
            ..PackSettings::default()
        };
        job(&uncropped, &params).run(dir.path(), &defs);
        let text = fs::read_to_string(dir.path().join("hero.txt")).unwrap();
        assert!(text.lines().nth(4).unwrap().ends_with(" 0 0 0 walk"));
    }

    #[test]
    fn oversized_frame_is_reported_and_descriptor_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let settings = PackSettings {
            max_texture_size: 32,
            ..PackSettings::default()
        };
        let params = BTreeMap::new();
        let defs = vec![
            def("big", vec![Frame::new("", 0, 0, solid(64, 8, 1))], 64, 8),
            def("small", vec![Frame::new("", 0, 0, solid(8, 8, 1))], 8, 8),
        ];
        let outcome = job(&settings, &params).run(dir.path(), &defs);
        assert_eq!(outcome.errors.len(), 2, "{:?}", outcome.errors);
        assert!(outcome.errors[0].contains("does not fit"));
        assert!(!dir.path().join("big.txt").exists());
        assert!(dir.path().join("small.txt").exists());
    }

    #[test]
    fn two_side_margin_extrudes_edges() {
        let dir = tempfile::tempdir().unwrap();
        let settings = PackSettings {
            margin: MarginPolicy::TwoSide,
            ..PackSettings::default()
        };
        let params = BTreeMap::new();
        let defs = vec![def("a", vec![Frame::new("", 0, 0, solid(4, 4, 77))], 4, 4)];
        job(&settings, &params).run(dir.path(), &defs);

        let text = fs::read_to_string(dir.path().join("a.txt")).unwrap();
        let fields: Vec<u32> = text.lines().nth(4).unwrap().split(' ').map(|f| f.parse().unwrap()).collect();
        let (x, y) = (fields[0], fields[1]);
        assert_eq!((x, y), (1, 1));
        let sheet = image::open(dir.path().join("texture0.png")).unwrap().to_rgba8();
        for (px, py) in [(0, 0), (0, 2), (5, 5), (2, 5), (5, 1)] {
            assert_eq!(sheet.get_pixel(px, py)[0], 77, "({px}, {py})");
        }
    }
}
