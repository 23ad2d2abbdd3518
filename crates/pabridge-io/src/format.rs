//! Stream format translation.
//!
//! Maps the engine's [`StreamFormat`] onto the native direction parameters.
//! Pure functions; the device and latency are filled in by
//! [`crate::Device`].

use crate::native::{DirectionParameters, NativeSampleFormat};
use crate::{Error, Result};
use pabridge_core::{SampleFormat, StreamFormat};

/// Most channels a non-interleaved stream may carry.
///
/// The native trampoline builds its per-channel views in a fixed-size table
/// on the stack, so the real-time path never allocates.
pub const MAX_NON_INTERLEAVED_CHANNELS: usize = 32;

/// Native encoding for an engine sample format.
///
/// [`SampleFormat::Float64`] has no native counterpart and fails with
/// [`Error::UnsupportedFormat`].
pub fn translate_sample_format(format: SampleFormat) -> Result<NativeSampleFormat> {
    match format {
        SampleFormat::Float32 => Ok(NativeSampleFormat::FLOAT32),
        SampleFormat::Int8 => Ok(NativeSampleFormat::INT8),
        SampleFormat::Int16 => Ok(NativeSampleFormat::INT16),
        SampleFormat::Int24 => Ok(NativeSampleFormat::INT24),
        SampleFormat::Int32 => Ok(NativeSampleFormat::INT32),
        SampleFormat::UInt8 => Ok(NativeSampleFormat::UINT8),
        SampleFormat::Float64 => Err(Error::UnsupportedFormat(format!(
            "sample format {format} has no native output encoding"
        ))),
    }
}

/// Direction parameters for a stream format, not yet bound to a device.
///
/// Fails with [`Error::UnsupportedFormat`] for an invalid format, an encoding
/// without a native counterpart, or a non-interleaved layout with more than
/// [`MAX_NON_INTERLEAVED_CHANNELS`] channels.
pub fn translate_stream_format(format: &StreamFormat) -> Result<DirectionParameters> {
    format.validate()?;
    if !format.interleaved && usize::from(format.num_channels) > MAX_NON_INTERLEAVED_CHANNELS {
        return Err(Error::UnsupportedFormat(format!(
            "{} non-interleaved channels (at most {MAX_NON_INTERLEAVED_CHANNELS})",
            format.num_channels
        )));
    }

    let sample_format =
        translate_sample_format(format.sample_format)?.with_interleaved(format.interleaved);

    Ok(DirectionParameters {
        device: None,
        channel_count: format.num_channels,
        sample_format,
        suggested_latency: 0.0,
    })
}
