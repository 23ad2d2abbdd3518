//! One addressable audio device.

use crate::format::translate_stream_format;
use crate::native::{DeviceIndex, NativeDeviceInfo, NativeHost, StreamFlags, StreamParameters};
use crate::stream::OutputStream;
use crate::Result;
use pabridge_core::{OutputCallback, StreamFormat};
use std::sync::Arc;

/// A device from the native device table, bound to its index.
///
/// Obtained from [`crate::DeviceManager::acquire_device`], which hands out one
/// shared instance per index. The device holds a reference to the native
/// subsystem; it has no teardown of its own.
pub struct Device<H: NativeHost> {
    host: Arc<H>,
    index: DeviceIndex,
    info: NativeDeviceInfo,
}

impl<H: NativeHost> Device<H> {
    pub(crate) fn new(host: Arc<H>, index: DeviceIndex) -> Result<Self> {
        let info = host.device_info(index)?;
        Ok(Self { host, index, info })
    }

    /// Position in the native device table.
    pub fn index(&self) -> DeviceIndex {
        self.index
    }

    /// Device name.
    pub fn name(&self) -> &str {
        &self.info.name
    }

    /// Native description captured when the device was acquired.
    pub fn info(&self) -> &NativeDeviceInfo {
        &self.info
    }

    /// Output-only parameters for `format` on this device.
    ///
    /// Uses the device's default low output latency, lets the native library
    /// pick the buffer size, and turns clipping off.
    pub fn output_parameters(&self, format: &StreamFormat) -> Result<StreamParameters> {
        let output = translate_stream_format(format)?
            .with_device(self.index, self.info.default_low_output_latency);

        Ok(StreamParameters {
            input: None,
            output: Some(output),
            sample_rate: format.sample_rate,
            frames_per_buffer: None,
            flags: StreamFlags::CLIP_OFF,
        })
    }

    /// Whether the native library reports `format` as playable on this device.
    ///
    /// Advisory: the device set can change between this query and
    /// [`create_output_stream`](Self::create_output_stream), so a `true` here
    /// does not guarantee the open succeeds. Formats that cannot be translated
    /// report `false`.
    pub fn supports_output_format(&self, format: &StreamFormat) -> bool {
        match self.output_parameters(format) {
            Ok(parameters) => self.host.is_format_supported(&parameters),
            Err(e) => {
                tracing::debug!(device = self.index, error = %e, "format not translatable");
                false
            }
        }
    }

    /// Open a stopped output stream that pulls audio from `callback`.
    ///
    /// `callback` runs on the native audio thread; see
    /// [`pabridge_core::OutputCallback`] for the rules it must follow.
    pub fn create_output_stream<C: OutputCallback>(
        &self,
        format: &StreamFormat,
        callback: C,
    ) -> Result<OutputStream<H>> {
        let parameters = self.output_parameters(format)?;
        OutputStream::open(
            Arc::clone(&self.host),
            self.index,
            &parameters,
            *format,
            callback,
        )
    }
}

impl<H: NativeHost> std::fmt::Debug for Device<H> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Device")
            .field("index", &self.index)
            .field("name", &self.info.name)
            .finish_non_exhaustive()
    }
}
