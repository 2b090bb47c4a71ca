use tracing::debug;

/// Rewrites faces in a template before captions are drawn.
pub trait FaceSwapper: Send + Sync {
    fn swap(&self, template: Vec<u8>) -> Vec<u8>;
}

/// Returns the template untouched. No face-swap backend ships with memesmith.
#[derive(Debug, Default, Clone, Copy)]
pub struct PassthroughFaceSwap;

impl FaceSwapper for PassthroughFaceSwap {
    fn swap(&self, template: Vec<u8>) -> Vec<u8> {
        debug!("face swap enabled but no backend is available, keeping template");
        template
    }
}
