//! In-process native host over a fixed device table.
//!
//! [`MockHost`] implements [`NativeHost`] without touching any audio hardware.
//! Its streams never call back on their own: [`MockStream::pump`] drives one
//! callback synchronously on the calling thread, which makes the callback
//! bridge deterministic to test and lets the CLI render offline.
//!
//! The device table sits behind a lock so tests can plug and unplug devices
//! through a shared host while a [`crate::DeviceManager`] holds it.

use crate::native::{
    DeviceIndex, DirectionParameters, NativeDeviceInfo, NativeHost, NativeStream,
    StreamParameters,
};
use crate::stream::{CallbackBridge, RenderTarget};
use crate::{Error, Result};
use pabridge_core::{CallbackFlags, Continuation, OutputBuffers, OutputCallback};
use std::sync::{PoisonError, RwLock};

/// Rates a mock device accepts unless told otherwise.
pub const DEFAULT_MOCK_SAMPLE_RATES: [f64; 4] = [44100.0, 48000.0, 88200.0, 96000.0];

// Native error codes reported for rejected parameters.
const INVALID_CHANNEL_COUNT: i32 = -9998;
const INVALID_SAMPLE_RATE: i32 = -9997;
const INVALID_DEVICE: i32 = -9996;
const SAMPLE_FORMAT_NOT_SUPPORTED: i32 = -9994;
const BAD_IO_DEVICE_COMBINATION: i32 = -9993;

type Rejection = (i32, String);

/// One entry of the mock device table.
#[derive(Debug, Clone, PartialEq)]
pub struct MockDevice {
    /// Native description returned by [`NativeHost::device_info`].
    pub info: NativeDeviceInfo,
    /// Sample rates [`NativeHost::is_format_supported`] accepts.
    pub sample_rates: Vec<f64>,
}

impl MockDevice {
    /// Device with the given channel limits and default latencies.
    pub fn duplex(name: &str, max_input_channels: u16, max_output_channels: u16) -> Self {
        Self {
            info: NativeDeviceInfo {
                name: name.to_string(),
                host_api: 0,
                host_api_name: "Mock".to_string(),
                max_input_channels,
                max_output_channels,
                default_low_input_latency: 0.005,
                default_low_output_latency: 0.005,
                default_high_input_latency: 0.04,
                default_high_output_latency: 0.04,
                default_sample_rate: 48000.0,
                is_host_api_default_input: false,
                is_host_api_default_output: false,
            },
            sample_rates: DEFAULT_MOCK_SAMPLE_RATES.to_vec(),
        }
    }

    /// Output-only device.
    pub fn output(name: &str, channels: u16) -> Self {
        Self::duplex(name, 0, channels)
    }

    /// Input-only device.
    pub fn input(name: &str, channels: u16) -> Self {
        Self::duplex(name, channels, 0)
    }

    /// Replace the accepted sample rates.
    pub fn with_sample_rates(mut self, rates: &[f64]) -> Self {
        self.sample_rates = rates.to_vec();
        self
    }

    /// Replace the host API name.
    pub fn with_host_api(mut self, name: &str) -> Self {
        self.info.host_api_name = name.to_string();
        self
    }
}

#[derive(Debug, Default)]
struct Table {
    devices: Vec<MockDevice>,
    default_input: Option<DeviceIndex>,
    default_output: Option<DeviceIndex>,
    open_failure: Option<(i32, String)>,
    unreadable: Option<DeviceIndex>,
}

/// [`NativeHost`] over an in-memory device table.
#[derive(Debug, Default)]
pub struct MockHost {
    table: RwLock<Table>,
}

impl MockHost {
    /// Host with no devices and no defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// A small table resembling a laptop with a USB interface attached.
    pub fn virtual_devices() -> Self {
        Self::new()
            .with_device(MockDevice::input("Built-in Microphone", 2).with_host_api("Virtual"))
            .with_device(MockDevice::output("Built-in Speakers", 2).with_host_api("Virtual"))
            .with_device(
                MockDevice::duplex("USB Audio Interface", 2, 8)
                    .with_host_api("Virtual")
                    .with_sample_rates(&[44100.0, 48000.0, 96000.0]),
            )
            .with_default_input(0)
            .with_default_output(1)
    }

    /// Append a device to the table.
    pub fn with_device(self, device: MockDevice) -> Self {
        self.add_device(device);
        self
    }

    /// Set the system default output device.
    pub fn with_default_output(self, index: DeviceIndex) -> Self {
        self.write().default_output = Some(index);
        self
    }

    /// Set the system default input device.
    pub fn with_default_input(self, index: DeviceIndex) -> Self {
        self.write().default_input = Some(index);
        self
    }

    /// Make every stream open fail with the given native error.
    pub fn failing_open(self, code: i32, message: &str) -> Self {
        self.write().open_failure = Some((code, message.to_string()));
        self
    }

    /// Make `device_info` fail for the device at `index`, as a driver that
    /// vanishes mid-enumeration does.
    pub fn failing_device_info(self, index: DeviceIndex) -> Self {
        self.write().unreadable = Some(index);
        self
    }

    /// Plug a device in at the end of the table.
    pub fn add_device(&self, device: MockDevice) {
        self.write().devices.push(device);
    }

    /// Unplug the device at `index`, shifting later devices down.
    pub fn remove_device(&self, index: DeviceIndex) -> Option<MockDevice> {
        let mut guard = self.write();
        let table = &mut *guard;
        if index >= table.devices.len() {
            return None;
        }
        let removed = table.devices.remove(index);
        for default in [&mut table.default_input, &mut table.default_output] {
            *default = match *default {
                Some(d) if d == index => None,
                Some(d) if d > index => Some(d - 1),
                other => other,
            };
        }
        Some(removed)
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, Table> {
        self.table.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, Table> {
        self.table.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn check_parameters(
        &self,
        parameters: &StreamParameters,
    ) -> std::result::Result<(), Rejection> {
        if parameters.input.is_none() && parameters.output.is_none() {
            return Err((BAD_IO_DEVICE_COMBINATION, "no stream direction".to_string()));
        }
        let table = self.read();
        if let Some(input) = &parameters.input {
            check_direction(&table, input, true, parameters.sample_rate)?;
        }
        if let Some(output) = &parameters.output {
            check_direction(&table, output, false, parameters.sample_rate)?;
        }
        Ok(())
    }
}

fn check_direction(
    table: &Table,
    direction: &DirectionParameters,
    input: bool,
    sample_rate: f64,
) -> std::result::Result<(), Rejection> {
    let device = direction
        .device
        .and_then(|index| table.devices.get(index))
        .ok_or_else(|| (INVALID_DEVICE, "invalid device".to_string()))?;
    let max = if input {
        device.info.max_input_channels
    } else {
        device.info.max_output_channels
    };
    if direction.channel_count == 0 || direction.channel_count > max {
        return Err((
            INVALID_CHANNEL_COUNT,
            format!("{} channels (device has {max})", direction.channel_count),
        ));
    }
    if direction.sample_format().is_none() {
        return Err((
            SAMPLE_FORMAT_NOT_SUPPORTED,
            "sample format not supported".to_string(),
        ));
    }
    if !device.sample_rates.contains(&sample_rate) {
        return Err((
            INVALID_SAMPLE_RATE,
            format!("{sample_rate} Hz not supported"),
        ));
    }
    Ok(())
}

impl NativeHost for MockHost {
    type Stream = MockStream;

    fn name(&self) -> &str {
        "mock"
    }

    fn version(&self) -> i32 {
        1
    }

    fn version_text(&self) -> String {
        "mock audio host 1".to_string()
    }

    fn device_count(&self) -> Result<usize> {
        Ok(self.read().devices.len())
    }

    fn device_info(&self, index: DeviceIndex) -> Result<NativeDeviceInfo> {
        let table = self.read();
        if table.unreadable == Some(index) {
            return Err(Error::Native {
                code: INVALID_DEVICE,
                message: "device info unavailable".to_string(),
            });
        }
        table
            .devices
            .get(index)
            .map(|device| device.info.clone())
            .ok_or(Error::DeviceIndexOutOfRange {
                index,
                count: table.devices.len(),
            })
    }

    fn default_input_device(&self) -> Option<DeviceIndex> {
        self.read().default_input
    }

    fn default_output_device(&self) -> Option<DeviceIndex> {
        self.read().default_output
    }

    fn is_format_supported(&self, parameters: &StreamParameters) -> bool {
        self.check_parameters(parameters).is_ok()
    }

    fn open_output_stream<C: OutputCallback>(
        &self,
        parameters: &StreamParameters,
        bridge: CallbackBridge<C>,
    ) -> Result<MockStream> {
        if let Some((code, message)) = self.read().open_failure.clone() {
            return Err(Error::StreamOpen { code, message });
        }
        if parameters.output.is_none() {
            return Err(Error::StreamOpen {
                code: BAD_IO_DEVICE_COMBINATION,
                message: "output stream without output parameters".to_string(),
            });
        }
        self.check_parameters(parameters)
            .map_err(|(code, message)| Error::StreamOpen { code, message })?;

        Ok(MockStream {
            target: Box::new(bridge),
            active: false,
            continuations: Vec::new(),
            output: Vec::new(),
        })
    }
}

/// Stream opened by [`MockHost`], driven by [`pump`](Self::pump).
pub struct MockStream {
    target: Box<dyn RenderTarget>,
    active: bool,
    continuations: Vec<Continuation>,
    output: Vec<Vec<u8>>,
}

impl MockStream {
    /// Run one callback for `frames` frames with no status flags.
    ///
    /// Returns `None` without calling back when the stream is not active.
    pub fn pump(&mut self, frames: usize) -> Option<Continuation> {
        self.pump_with_flags(frames, CallbackFlags::empty())
    }

    /// Run one callback for `frames` frames with the given status flags.
    ///
    /// Buffers start out filled with a non-silent pattern so tests can see
    /// whether the callback wrote them. A continuation other than
    /// [`Continuation::Continue`] deactivates the stream.
    pub fn pump_with_flags(
        &mut self,
        frames: usize,
        flags: CallbackFlags,
    ) -> Option<Continuation> {
        if !self.active {
            return None;
        }

        let channels = self.target.channel_count();
        let format = self.target.sample_format();
        let channel_bytes = frames * format.bytes_per_sample();

        // u64 backing keeps typed sample views aligned.
        let continuation = if self.target.is_interleaved() {
            let len = channel_bytes * channels;
            let mut backing = aligned(len);
            let data = &mut bytemuck::cast_slice_mut::<u64, u8>(&mut backing)[..len];
            let mut buffers = OutputBuffers::interleaved(data, channels, frames, format);
            let continuation = self.target.render(&mut buffers, flags);
            self.output = vec![data.to_vec()];
            continuation
        } else {
            let mut backing: Vec<Vec<u64>> =
                (0..channels).map(|_| aligned(channel_bytes)).collect();
            let mut views: Vec<&mut [u8]> = backing
                .iter_mut()
                .map(|b| &mut bytemuck::cast_slice_mut::<u64, u8>(b)[..channel_bytes])
                .collect();
            let mut buffers = OutputBuffers::non_interleaved(&mut views, frames, format);
            let continuation = self.target.render(&mut buffers, flags);
            self.output = views.iter().map(|v| v.to_vec()).collect();
            continuation
        };

        self.continuations.push(continuation);
        if continuation != Continuation::Continue {
            self.active = false;
        }
        Some(continuation)
    }

    /// Continuations returned so far, in order.
    pub fn continuations(&self) -> &[Continuation] {
        &self.continuations
    }

    /// Bytes written by the last callback: one entry for interleaved streams,
    /// one per channel otherwise.
    pub fn last_output(&self) -> &[Vec<u8>] {
        &self.output
    }
}

fn aligned(bytes: usize) -> Vec<u64> {
    vec![0xA5A5_A5A5_A5A5_A5A5; bytes.div_ceil(8)]
}

impl NativeStream for MockStream {
    fn start(&mut self) -> Result<()> {
        self.active = true;
        Ok(())
    }

    fn stop(&mut self) -> Result<()> {
        self.active = false;
        Ok(())
    }

    fn abort(&mut self) -> Result<()> {
        self.active = false;
        Ok(())
    }

    fn is_active(&self) -> bool {
        self.active
    }
}

impl std::fmt::Debug for MockStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockStream")
            .field("active", &self.active)
            .field("callbacks", &self.continuations.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::native::{NativeSampleFormat, StreamFlags};

    fn output_parameters(device: DeviceIndex, channels: u16, rate: f64) -> StreamParameters {
        StreamParameters {
            input: None,
            output: Some(DirectionParameters {
                device: Some(device),
                channel_count: channels,
                sample_format: NativeSampleFormat::FLOAT32,
                suggested_latency: 0.005,
            }),
            sample_rate: rate,
            frames_per_buffer: None,
            flags: StreamFlags::CLIP_OFF,
        }
    }

    #[test]
    fn format_support_follows_table() {
        let host = MockHost::new()
            .with_device(MockDevice::output("Speakers", 2).with_sample_rates(&[48000.0]));
        assert!(host.is_format_supported(&output_parameters(0, 2, 48000.0)));
        assert!(!host.is_format_supported(&output_parameters(0, 3, 48000.0)));
        assert!(!host.is_format_supported(&output_parameters(0, 2, 44100.0)));
        assert!(!host.is_format_supported(&output_parameters(1, 2, 48000.0)));
    }

    #[test]
    fn unplugging_shifts_defaults() {
        let host = MockHost::virtual_devices();
        assert_eq!(host.default_output_device(), Some(1));
        host.remove_device(0);
        assert_eq!(host.default_input_device(), None);
        assert_eq!(host.default_output_device(), Some(0));
        assert_eq!(host.device_count().unwrap(), 2);
        assert!(host.remove_device(5).is_none());
    }

    #[test]
    fn device_info_out_of_range() {
        let host = MockHost::new();
        assert!(matches!(
            host.device_info(0),
            Err(Error::DeviceIndexOutOfRange { index: 0, count: 0 })
        ));
    }
}
