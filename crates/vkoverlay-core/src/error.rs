use ash::vk;

#[derive(Debug, thiserror::Error)]
pub enum LayerError {
    /// The loader's chain structures are missing or malformed.
    #[error("loader protocol error: {0}")]
    LoaderProtocol(&'static str),

    /// A forwarded call returned a non-success result.
    #[error("driver returned {0:?}")]
    Driver(vk::Result),

    /// One of the layer's own objects could not be created.
    #[error("overlay resource allocation failed at {stage}: {result:?}")]
    OverlayResource {
        stage: &'static str,
        result: vk::Result,
    },

    #[error("handle not found: {kind} {raw:#x}")]
    HandleNotFound { kind: &'static str, raw: u64 },

    #[error("configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl LayerError {
    /// The result code surfaced to the application at the ABI boundary.
    pub fn to_vk_result(&self) -> vk::Result {
        match self {
            LayerError::LoaderProtocol(_) => vk::Result::ERROR_INITIALIZATION_FAILED,
            LayerError::Driver(result) => *result,
            LayerError::OverlayResource { result, .. } => *result,
            LayerError::HandleNotFound { .. } => vk::Result::ERROR_DEVICE_LOST,
            LayerError::Config(_) | LayerError::Io(_) => vk::Result::ERROR_INITIALIZATION_FAILED,
        }
    }

    /// Tags a failed layer-owned allocation with the step that failed.
    pub fn overlay(stage: &'static str) -> impl FnOnce(vk::Result) -> LayerError {
        move |result| LayerError::OverlayResource { stage, result }
    }
}

impl From<vk::Result> for LayerError {
    fn from(result: vk::Result) -> Self {
        LayerError::Driver(result)
    }
}
