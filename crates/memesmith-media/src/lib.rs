pub mod cache;
pub mod download;
pub mod error;
pub mod face_swap;
pub mod fetcher;
pub mod font;
pub mod render;
pub mod search;
pub mod wrap;

pub use cache::TemplateCache;
pub use download::{HttpImageSource, ImageSource};
pub use error::{DownloadError, RenderError};
pub use face_swap::{FaceSwapper, PassthroughFaceSwap};
pub use fetcher::TemplateFetcher;
pub use font::{MemeFont, ScaledFont};
pub use render::{MIN_DIMENSION, OverlayRenderer, RenderRequest};
pub use search::{FixedTemplateSearch, PLACEHOLDER_TEMPLATE_URL, TavilySearch, TemplateSearch};
pub use wrap::{TextMeasure, wrap_text};
