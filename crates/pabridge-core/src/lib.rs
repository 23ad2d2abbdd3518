//! pabridge Core - the vocabulary shared between an audio engine and its output backend.
//!
//! This crate holds the types that cross the boundary between the host runtime and
//! the native audio adapter in `pabridge-io`. None of them know anything about
//! PortAudio.
//!
//! # Stream Description
//!
//! - [`SampleFormat`] - PCM sample encodings an engine may ask for
//! - [`StreamFormat`] - sample rate, channel count, encoding, interleaving
//!
//! # Real-Time Callback Contract
//!
//! - [`OutputBuffers`] - zero-copy view over the buffer the native library hands out
//! - [`OutputCallback`] - the "fill buffers given a frame count" capability
//! - [`fill_fn`] - adapter turning a closure into an [`OutputCallback`]
//! - [`Continuation`] - keep streaming, drain and stop, or abort
//! - [`CallbackFlags`] - status flags reported by the native layer per buffer
//!
//! # Example
//!
//! ```rust
//! use pabridge_core::{Continuation, OutputBuffers, SampleFormat, StreamFormat, fill_fn};
//!
//! let format = StreamFormat::new(48000.0, 2, SampleFormat::Float32).with_interleaved(false);
//! assert_eq!(format.bytes_per_frame(), 8);
//!
//! let mut silence = fill_fn(|buffers: &mut OutputBuffers<'_, '_>, _frames| {
//!     buffers.fill_silence();
//!     Continuation::Continue
//! });
//! # let _ = &mut silence;
//! ```

mod buffer;
mod callback;
mod format;

pub use buffer::OutputBuffers;
pub use callback::{CallbackFlags, Continuation, FillFn, OutputCallback, fill_fn};
pub use format::{FormatError, SampleFormat, StreamFormat};
