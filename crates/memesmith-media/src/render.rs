use std::num::NonZeroU32;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use image::{Rgb, RgbImage};
use tracing::{debug, info};

use crate::download::ImageSource;
use crate::error::RenderError;
use crate::face_swap::FaceSwapper;
use crate::font::{MemeFont, ScaledFont};
use crate::wrap::{TextMeasure, wrap_text};

/// Templates narrower or shorter than this are rejected.
pub const MIN_DIMENSION: u32 = 10;

const MIN_FONT_PX: u32 = 20;
const LINE_SPACING: f32 = 1.1;
const FILL: Rgb<u8> = Rgb([255, 255, 255]);
const OUTLINE: Rgb<u8> = Rgb([0, 0, 0]);

/// Everything needed to produce one captioned image.
#[derive(Debug, Clone)]
pub struct RenderRequest {
    pub template_url: String,
    pub top_text: String,
    pub bottom_text: String,
    pub output_path: PathBuf,
}

/// Downloads templates and draws classic top/bottom captions on them.
pub struct OverlayRenderer {
    font: Arc<MemeFont>,
    source: Arc<dyn ImageSource>,
    face_swap: Option<Arc<dyn FaceSwapper>>,
}

impl OverlayRenderer {
    pub fn new(font: Arc<MemeFont>, source: Arc<dyn ImageSource>) -> Self {
        Self {
            font,
            source,
            face_swap: None,
        }
    }

    pub fn with_face_swap(mut self, face_swap: Arc<dyn FaceSwapper>) -> Self {
        self.face_swap = Some(face_swap);
        self
    }

    /// Fetch the template, apply the face swap if one is set, then caption it.
    pub async fn create_meme(&self, request: &RenderRequest) -> Result<PathBuf, RenderError> {
        let mut bytes = self.source.fetch(&request.template_url).await?;
        debug!(
            "downloaded template ({} bytes) from {}",
            bytes.len(),
            request.template_url
        );

        if let Some(face_swap) = &self.face_swap {
            bytes = face_swap.swap(bytes);
        }

        self.render(
            &bytes,
            &request.top_text,
            &request.bottom_text,
            &request.output_path,
        )
    }

    /// Caption already-downloaded template bytes and write the result to `output`.
    pub fn render(
        &self,
        template: &[u8],
        top_text: &str,
        bottom_text: &str,
        output: &Path,
    ) -> Result<PathBuf, RenderError> {
        let mut canvas = image::load_from_memory(template)
            .map_err(|e| RenderError::Decode(e.to_string()))?
            .to_rgb8();

        let (width, height) = canvas.dimensions();
        if width < MIN_DIMENSION || height < MIN_DIMENSION {
            return Err(RenderError::TooSmall { width, height });
        }

        let font_px = (width / 20).max(MIN_FONT_PX);
        let font = self.font.at_size(font_px as f32);
        let budget = NonZeroU32::new(width).unwrap_or(NonZeroU32::MIN);

        let top_lines = wrap_text(&top_text.to_uppercase(), budget, &font);
        let bottom_lines = wrap_text(&bottom_text.to_uppercase(), budget, &font);

        let step = font.line_height() * LINE_SPACING;

        let mut y = 0.0f32;
        for line in &top_lines {
            draw_outlined(&mut canvas, &font, line, y);
            y += step;
        }

        let mut y = height as f32 - step * bottom_lines.len() as f32;
        for line in &bottom_lines {
            draw_outlined(&mut canvas, &font, line, y);
            y += step;
        }

        canvas
            .save(output)
            .map_err(|e| RenderError::Encode(e.to_string()))?;

        info!(
            "rendered {}x{} meme with {} top / {} bottom lines to {}",
            width,
            height,
            top_lines.len(),
            bottom_lines.len(),
            output.display()
        );
        Ok(output.to_path_buf())
    }
}

fn draw_outlined(canvas: &mut RgbImage, font: &ScaledFont<'_>, line: &str, y: f32) {
    let line_width = font.text_width(line);
    let x = ((canvas.width() as f32 - line_width) / 2.0).round() as i32;
    let y = y.round() as i32;
    let t = (font.px() / 18.0).round().max(1.0) as i32;

    for (dx, dy) in [(-t, -t), (0, -t), (t, -t), (-t, 0), (t, 0), (-t, t), (0, t), (t, t)] {
        font.draw(canvas, OUTLINE, x + dx, y + dy, line);
    }
    font.draw(canvas, FILL, x, y, line);
}
