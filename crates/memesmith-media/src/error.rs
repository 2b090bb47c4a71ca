/// Failures while fetching template bytes.
#[derive(Debug, thiserror::Error)]
pub enum DownloadError {
    #[error("invalid template url: {0}")]
    InvalidUrl(String),

    #[error("download failed: {0}")]
    Transport(String),

    #[error("template host answered with status {0}")]
    Status(u16),

    #[error("template exceeds {limit} bytes")]
    TooLarge { limit: u64 },
}

/// Failures while turning a template into a captioned image.
#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error(transparent)]
    Download(#[from] DownloadError),

    #[error("image too small to caption: {width}x{height}")]
    TooSmall { width: u32, height: u32 },

    #[error("cannot decode template image: {0}")]
    Decode(String),

    #[error("cannot write rendered image: {0}")]
    Encode(String),

    #[error("invalid font: {0}")]
    Font(String),
}
