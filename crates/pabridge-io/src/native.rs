//! Boundary between the adapter and the native audio library.
//!
//! This module defines [`NativeHost`], the narrow call-level interface the
//! device manager, devices and output streams are written against. The
//! PortAudio implementation lives in [`crate::portaudio`] (feature
//! `"portaudio"`); [`crate::mock::MockHost`] implements the same trait over a
//! fixed device table for tests and offline rendering.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────┐
//! │          Host runtime            │
//! │  StreamFormat + OutputCallback   │
//! └──────────────┬───────────────────┘
//!                │ DeviceManager / Device / OutputStream
//!                ▼
//! ┌──────────────────────────────────┐
//! │        NativeHost trait          │
//! │ device table / format check /    │
//! │ open_output_stream(bridge)       │
//! └──────────────┬───────────────────┘
//!                │ implemented by
//!        ┌───────┴────────┐
//!        ▼                ▼
//! ┌─────────────┐  ┌─────────────┐
//! │PortAudioHost│  │  MockHost   │
//! │  (FFI)      │  │ (in-process)│
//! └─────────────┘  └─────────────┘
//! ```
//!
//! The parameter structures mirror PortAudio's: a stream has optional input and
//! output direction parameters, a sample rate, a frames-per-buffer hint and
//! stream flags. Host-API-specific stream info is never set, so it is not
//! modelled.
//!
//! `open_output_stream` is generic over the callback type so the native
//! trampoline can be monomorphised: the real-time path calls the host's
//! [`OutputCallback`] without virtual dispatch.

use crate::Result;
use crate::stream::CallbackBridge;
use pabridge_core::{OutputCallback, SampleFormat};

/// Position of a device in the native device table.
pub type DeviceIndex = usize;

/// Native sample format bits, including the non-interleaved flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NativeSampleFormat(u64);

impl NativeSampleFormat {
    /// 32-bit float.
    pub const FLOAT32: Self = Self(0x0000_0001);
    /// Signed 32-bit.
    pub const INT32: Self = Self(0x0000_0002);
    /// Packed signed 24-bit.
    pub const INT24: Self = Self(0x0000_0004);
    /// Signed 16-bit.
    pub const INT16: Self = Self(0x0000_0008);
    /// Signed 8-bit.
    pub const INT8: Self = Self(0x0000_0010);
    /// Unsigned 8-bit.
    pub const UINT8: Self = Self(0x0000_0020);
    /// One buffer per channel instead of one shared buffer.
    pub const NON_INTERLEAVED: Self = Self(0x8000_0000);

    /// Wrap raw native bits.
    pub const fn from_bits(bits: u64) -> Self {
        Self(bits)
    }

    /// Raw native bits.
    pub const fn bits(self) -> u64 {
        self.0
    }

    /// Whether every bit of `other` is set.
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    /// The same encoding with the non-interleaved flag set or cleared.
    pub const fn with_interleaved(self, interleaved: bool) -> Self {
        if interleaved {
            Self(self.0 & !Self::NON_INTERLEAVED.0)
        } else {
            Self(self.0 | Self::NON_INTERLEAVED.0)
        }
    }

    /// Whether the non-interleaved flag is clear.
    pub const fn is_interleaved(self) -> bool {
        !self.contains(Self::NON_INTERLEAVED)
    }

    /// The engine-side encoding these bits describe, ignoring interleaving.
    pub fn sample_format(self) -> Option<SampleFormat> {
        match self.with_interleaved(true) {
            Self::FLOAT32 => Some(SampleFormat::Float32),
            Self::INT32 => Some(SampleFormat::Int32),
            Self::INT24 => Some(SampleFormat::Int24),
            Self::INT16 => Some(SampleFormat::Int16),
            Self::INT8 => Some(SampleFormat::Int8),
            Self::UINT8 => Some(SampleFormat::UInt8),
            _ => None,
        }
    }
}

/// Stream flags passed to the native open call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct StreamFlags(u64);

impl StreamFlags {
    /// No flags.
    pub const NONE: Self = Self(0);
    /// Do not clip out-of-range float samples.
    pub const CLIP_OFF: Self = Self(0x0000_0001);

    /// Raw native bits.
    pub const fn bits(self) -> u64 {
        self.0
    }
}

/// Parameters for one direction (input or output) of a stream.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DirectionParameters {
    /// Device the direction is bound to; `None` until a device is chosen.
    pub device: Option<DeviceIndex>,
    /// Number of channels.
    pub channel_count: u16,
    /// Encoding plus the non-interleaved flag.
    pub sample_format: NativeSampleFormat,
    /// Latency hint in seconds.
    pub suggested_latency: f64,
}

impl DirectionParameters {
    /// Whether all channels share one buffer.
    pub fn is_interleaved(&self) -> bool {
        self.sample_format.is_interleaved()
    }

    /// The engine-side encoding, if the native bits name one.
    pub fn sample_format(&self) -> Option<SampleFormat> {
        self.sample_format.sample_format()
    }

    /// Bind to a device with a latency hint.
    pub fn with_device(mut self, device: DeviceIndex, suggested_latency: f64) -> Self {
        self.device = Some(device);
        self.suggested_latency = suggested_latency;
        self
    }
}

/// Full parameter set for opening (or testing) a stream.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StreamParameters {
    /// Input direction, `None` for output-only streams.
    pub input: Option<DirectionParameters>,
    /// Output direction, `None` for input-only streams.
    pub output: Option<DirectionParameters>,
    /// Frames per second.
    pub sample_rate: f64,
    /// Fixed buffer size, or `None` to let the native library choose.
    pub frames_per_buffer: Option<u32>,
    /// Native stream flags.
    pub flags: StreamFlags,
}

/// One entry of the native device table.
#[derive(Debug, Clone, PartialEq)]
pub struct NativeDeviceInfo {
    /// Device name as reported by the driver.
    pub name: String,
    /// Index of the host API the device belongs to.
    pub host_api: usize,
    /// Name of that host API (ALSA, CoreAudio, WASAPI, ...).
    pub host_api_name: String,
    /// Maximum input channels, 0 for output-only devices.
    pub max_input_channels: u16,
    /// Maximum output channels, 0 for input-only devices.
    pub max_output_channels: u16,
    /// Default latency for interactive input, in seconds.
    pub default_low_input_latency: f64,
    /// Default latency for interactive output, in seconds.
    pub default_low_output_latency: f64,
    /// Default latency for robust input, in seconds.
    pub default_high_input_latency: f64,
    /// Default latency for robust output, in seconds.
    pub default_high_output_latency: f64,
    /// Default sample rate in Hz.
    pub default_sample_rate: f64,
    /// Whether this is its host API's default input device.
    pub is_host_api_default_input: bool,
    /// Whether this is its host API's default output device.
    pub is_host_api_default_output: bool,
}

/// Call-level interface to a native audio library.
///
/// A value of this type stands for an initialised native audio subsystem:
/// construction initialises it and dropping the value tears it down. The
/// device manager shares it through an `Arc`, so devices and streams keep the
/// subsystem alive for as long as they exist.
pub trait NativeHost: Send + Sync + 'static {
    /// Handle of an open native stream.
    type Stream: NativeStream;

    /// Short backend name ("portaudio", "mock").
    fn name(&self) -> &str;

    /// Native library version number.
    fn version(&self) -> i32;

    /// Human-readable native library version.
    fn version_text(&self) -> String;

    /// Number of devices in the native device table right now.
    fn device_count(&self) -> Result<usize>;

    /// Describe the device at `index`.
    fn device_info(&self, index: DeviceIndex) -> Result<NativeDeviceInfo>;

    /// System default input device, if any.
    fn default_input_device(&self) -> Option<DeviceIndex>;

    /// System default output device, if any.
    fn default_output_device(&self) -> Option<DeviceIndex>;

    /// Whether the native library could open a stream with these parameters.
    ///
    /// Advisory only: the answer can be stale by the time a stream is opened.
    fn is_format_supported(&self, parameters: &StreamParameters) -> bool;

    /// Open a stopped, callback-driven output stream.
    ///
    /// The native layer owns `bridge` for the lifetime of the stream and calls
    /// [`CallbackBridge::process`] once per buffer on its audio thread. A
    /// rejected configuration is reported as [`crate::Error::StreamOpen`].
    fn open_output_stream<C: OutputCallback>(
        &self,
        parameters: &StreamParameters,
        bridge: CallbackBridge<C>,
    ) -> Result<Self::Stream>;
}

/// An open native stream.
///
/// Dropping the handle closes the stream; after drop returns the callback is
/// no longer running.
pub trait NativeStream: Send {
    /// Begin calling back. Blocks until the native library acknowledges.
    fn start(&mut self) -> Result<()>;

    /// Stop after queued buffers have played. Blocks until drained.
    fn stop(&mut self) -> Result<()>;

    /// Stop immediately, discarding queued buffers.
    fn abort(&mut self) -> Result<()>;

    /// Whether the stream is currently producing audio.
    ///
    /// Turns false on its own once the callback returns
    /// [`pabridge_core::Continuation::Complete`] or
    /// [`pabridge_core::Continuation::Abort`].
    fn is_active(&self) -> bool;
}
