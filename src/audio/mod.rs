// Audio module - microphone capture into pooled analysis windows

pub mod buffer_pool;
pub mod capture;

// Re-export commonly used types for convenience
pub use buffer_pool::{
    AnalysisChannels, AudioWindow, BufferPool, BufferPoolChannels, CaptureChannels,
    DEFAULT_BUFFER_COUNT, DEFAULT_WINDOW_SIZE,
};
pub use capture::{CaptureStream, WindowAssembler};
