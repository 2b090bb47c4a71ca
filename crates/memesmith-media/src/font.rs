use std::path::Path;

use ab_glyph::{Font, FontVec, PxScale, ScaleFont};
use font8x8::{BASIC_FONTS, GREEK_FONTS, LATIN_FONTS, UnicodeFonts};
use image::{Rgb, RgbImage};
use tracing::{info, warn};

use crate::error::RenderError;
use crate::wrap::TextMeasure;

/// Caption font: a TrueType face when one is configured, else a bitmap font.
pub enum MemeFont {
    TrueType(FontVec),
    /// Built-in 8x8 glyphs scaled to an integer cell size.
    Bitmap,
}

impl MemeFont {
    /// Load the font at `path`, falling back to the bitmap font on any problem.
    pub fn load_or_builtin(path: Option<&Path>) -> Self {
        let Some(path) = path else {
            info!("no caption font configured, using built-in bitmap font");
            return Self::Bitmap;
        };

        match std::fs::read(path)
            .map_err(|e| RenderError::Font(format!("{}: {e}", path.display())))
            .and_then(Self::from_bytes)
        {
            Ok(font) => {
                info!("loaded caption font from {}", path.display());
                font
            }
            Err(e) => {
                warn!("falling back to built-in bitmap font: {e}");
                Self::Bitmap
            }
        }
    }

    pub fn from_bytes(data: Vec<u8>) -> Result<Self, RenderError> {
        FontVec::try_from_vec(data)
            .map(Self::TrueType)
            .map_err(|e| RenderError::Font(e.to_string()))
    }

    pub fn at_size(&self, px: f32) -> ScaledFont<'_> {
        ScaledFont { font: self, px }
    }
}

/// A [`MemeFont`] at a fixed pixel size.
pub struct ScaledFont<'a> {
    font: &'a MemeFont,
    px: f32,
}

impl ScaledFont<'_> {
    pub fn px(&self) -> f32 {
        self.px
    }

    /// Vertical space one line of text occupies.
    pub fn line_height(&self) -> f32 {
        match self.font {
            MemeFont::TrueType(font) => font.as_scaled(PxScale::from(self.px)).height(),
            MemeFont::Bitmap => (8 * self.bitmap_cell()) as f32,
        }
    }

    /// Draw `text` with its top-left corner at `(x, y)`.
    pub fn draw(&self, canvas: &mut RgbImage, color: Rgb<u8>, x: i32, y: i32, text: &str) {
        match self.font {
            MemeFont::TrueType(font) => {
                imageproc::drawing::draw_text_mut(
                    canvas,
                    color,
                    x,
                    y,
                    PxScale::from(self.px),
                    font,
                    text,
                );
            }
            MemeFont::Bitmap => draw_bitmap_text(canvas, color, x, y, self.bitmap_cell(), text),
        }
    }

    fn bitmap_cell(&self) -> u32 {
        (self.px / 8.0).round().max(1.0) as u32
    }
}

impl TextMeasure for ScaledFont<'_> {
    fn text_width(&self, text: &str) -> f32 {
        match self.font {
            MemeFont::TrueType(font) => {
                let scaled = font.as_scaled(PxScale::from(self.px));
                let mut width = 0.0f32;
                let mut prev = None;
                for c in text.chars() {
                    let glyph_id = scaled.glyph_id(c);
                    if let Some(prev_id) = prev {
                        width += scaled.kern(prev_id, glyph_id);
                    }
                    width += scaled.h_advance(glyph_id);
                    prev = Some(glyph_id);
                }
                width
            }
            MemeFont::Bitmap => (text.chars().count() as u32 * 8 * self.bitmap_cell()) as f32,
        }
    }
}

fn bitmap_glyph(c: char) -> [u8; 8] {
    BASIC_FONTS
        .get(c)
        .or_else(|| LATIN_FONTS.get(c))
        .or_else(|| GREEK_FONTS.get(c))
        .or_else(|| BASIC_FONTS.get('?'))
        .unwrap_or([0; 8])
}

fn draw_bitmap_text(canvas: &mut RgbImage, color: Rgb<u8>, x: i32, y: i32, cell: u32, text: &str) {
    let cell = cell as i32;
    let (width, height) = (canvas.width() as i32, canvas.height() as i32);
    let mut cursor_x = x;

    for c in text.chars() {
        let glyph = bitmap_glyph(c);
        for (row_idx, row) in glyph.iter().enumerate() {
            for col_idx in 0..8 {
                if (row >> col_idx) & 1 == 0 {
                    continue;
                }
                let px = cursor_x + col_idx * cell;
                let py = y + row_idx as i32 * cell;
                for sy in 0..cell {
                    for sx in 0..cell {
                        let (tx, ty) = (px + sx, py + sy);
                        if tx >= 0 && ty >= 0 && tx < width && ty < height {
                            canvas.put_pixel(tx as u32, ty as u32, color);
                        }
                    }
                }
            }
        }
        cursor_x += 8 * cell;
    }
}
