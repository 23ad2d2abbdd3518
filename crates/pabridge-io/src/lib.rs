//! Output adapter between an audio engine and a native audio library.
//!
//! This crate provides:
//!
//! - **Device management**: [`DeviceManager`] enumerates the native device
//!   table, reports each device as an [`AcquisitionAgent`], and hands out one
//!   shared [`Device`] per index
//! - **Format translation**: [`translate_stream_format`] maps a
//!   [`pabridge_core::StreamFormat`] onto native stream parameters
//! - **Output streams**: [`OutputStream`] runs a host
//!   [`pabridge_core::OutputCallback`] on the native audio thread through a
//!   panic-safe [`CallbackBridge`]
//! - **Diagnostics**: optional per-device reports with default roles,
//!   latencies and supported standard sample rates
//!
//! Everything is generic over [`NativeHost`]. The PortAudio binding is behind
//! the `portaudio` feature; [`mock::MockHost`] serves a fixed device table
//! in-process.
//!
//! ## Quick Start
//!
//! ```rust
//! use pabridge_core::{Continuation, OutputBuffers, SampleFormat, StreamFormat, fill_fn};
//! use pabridge_io::DeviceManager;
//! use pabridge_io::mock::{MockDevice, MockHost};
//!
//! # fn main() -> pabridge_io::Result<()> {
//! let host = MockHost::new()
//!     .with_device(MockDevice::output("Speakers", 2))
//!     .with_default_output(0);
//! let mut manager = DeviceManager::new(host);
//! manager.enumerate()?;
//!
//! let agent = manager.default_output_device()?;
//! let device = manager.acquire(&agent)?;
//!
//! let format = StreamFormat::new(48000.0, 2, SampleFormat::Float32);
//! let mut stream = device.create_output_stream(
//!     &format,
//!     fill_fn(|buffers: &mut OutputBuffers<'_, '_>, _frames| {
//!         buffers.fill_silence();
//!         Continuation::Continue
//!     }),
//! )?;
//! stream.start()?;
//! stream.native_mut().pump(256);
//! stream.stop()?;
//! # Ok(())
//! # }
//! ```

mod device;
pub mod diagnostics;
mod format;
mod manager;
pub mod mock;
pub mod native;
#[cfg(feature = "portaudio")]
pub mod portaudio;
mod stream;

pub use device::Device;
pub use diagnostics::{DiagnosticSink, NullSink, TracingSink};
pub use format::{MAX_NON_INTERLEAVED_CHANNELS, translate_sample_format, translate_stream_format};
pub use manager::{
    AcquisitionAgent, DeviceManager, DeviceProperties, DirectionProperties, ManagerOptions,
};
pub use native::{DeviceIndex, NativeHost, NativeStream};
pub use stream::{
    CallbackBridge, OutputStream, RenderTarget, StatusSnapshot, StreamState, StreamStatus,
};

use pabridge_core::FormatError;

/// Error types for the output adapter.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The stream format cannot be expressed natively.
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    /// A device index past the end of the native device table.
    #[error("Device index {index} out of range ({count} devices)")]
    DeviceIndexOutOfRange {
        /// Requested index.
        index: DeviceIndex,
        /// Devices in the table at the time of the call.
        count: usize,
    },

    /// The native library reports no default output device.
    #[error("No default output device")]
    NoDefaultDevice,

    /// No device matched a name or index query.
    #[error("Device not found: {0}")]
    DeviceNotFound(String),

    /// The native library refused to open a stream.
    #[error("Failed to open stream ({code}): {message}")]
    StreamOpen {
        /// Native error code.
        code: i32,
        /// Native error text.
        message: String,
    },

    /// Starting, stopping or aborting a stream failed.
    #[error("Stream error ({code}): {message}")]
    Stream {
        /// Native error code.
        code: i32,
        /// Native error text.
        message: String,
    },

    /// Any other native library failure.
    #[error("Native audio error ({code}): {message}")]
    Native {
        /// Native error code.
        code: i32,
        /// Native error text.
        message: String,
    },

    /// The output callback panicked and the stream was aborted.
    #[error("Output callback fault: {0}")]
    CallbackFault(String),
}

impl From<FormatError> for Error {
    fn from(e: FormatError) -> Self {
        Error::UnsupportedFormat(e.to_string())
    }
}

/// Convenience result type for adapter operations.
pub type Result<T> = std::result::Result<T, Error>;
