pub mod recording_api;

pub use recording_api::{Call, RecordingUploadApi};

/// Initialize tracing for tests with proper test output handling
pub fn tracing_init() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}
