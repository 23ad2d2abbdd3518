//! PortAudio implementation of [`NativeHost`].
//!
//! Links against the system `libportaudio`. [`PortAudioHost::new`] initialises
//! the library and dropping the host terminates it; the device manager shares
//! the host through an `Arc`, so termination waits for the last device and
//! stream to go away.
//!
//! ## Callback path
//!
//! ```text
//! PortAudio audio thread
//!   └─ output_trampoline::<C>(output, frame_count, flags, user_data)
//!        ├─ user_data → &mut CallbackBridge<C>   (boxed, owned by the stream)
//!        ├─ output    → OutputBuffers            (no copy, no allocation)
//!        └─ CallbackBridge::process → Continuation code
//! ```
//!
//! The trampoline is monomorphised per callback type. Non-interleaved buffers
//! are viewed through a fixed table of [`MAX_NON_INTERLEAVED_CHANNELS`] slices
//! on the stack.
//!
//! PortAudio's non-callback API is not thread-safe, so host and stream calls
//! are serialised through one lock shared by the host and its streams. The
//! audio callback never takes it. On unix the library's internal debug output is
//! forwarded to `tracing` at debug level.

#![allow(unsafe_code)]

mod ffi;

use crate::format::MAX_NON_INTERLEAVED_CHANNELS;
use crate::native::{
    DeviceIndex, DirectionParameters, NativeDeviceInfo, NativeHost, NativeStream,
    StreamParameters,
};
use crate::stream::CallbackBridge;
use crate::{Error, Result};
use pabridge_core::{CallbackFlags, Continuation, OutputBuffers, OutputCallback};
use std::ffi::CStr;
use std::os::raw::{c_char, c_int, c_ulong, c_void};
use std::ptr;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Lock serialising every non-callback PortAudio call.
type ApiLock = Arc<Mutex<()>>;

/// Initialised PortAudio library.
#[derive(Debug)]
pub struct PortAudioHost {
    lock: ApiLock,
}

impl PortAudioHost {
    /// Initialise PortAudio.
    pub fn new() -> Result<Self> {
        install_debug_hook();

        // SAFETY: no preconditions; balanced by Pa_Terminate in Drop.
        let code = unsafe { ffi::Pa_Initialize() };
        if code != ffi::PA_NO_ERROR {
            return Err(native_error(code));
        }

        let host = Self {
            lock: ApiLock::default(),
        };
        tracing::info!(version = %host.version_text(), "PortAudio initialised");
        Ok(host)
    }

    fn guard(&self) -> MutexGuard<'_, ()> {
        lock_api(&self.lock)
    }
}

impl Drop for PortAudioHost {
    fn drop(&mut self) {
        // SAFETY: paired with the successful Pa_Initialize in `new`.
        let code = unsafe { ffi::Pa_Terminate() };
        if code == ffi::PA_NO_ERROR {
            tracing::info!("PortAudio terminated");
        } else {
            tracing::warn!(code, error = %error_text(code), "Pa_Terminate failed");
        }
    }
}

impl NativeHost for PortAudioHost {
    type Stream = PortAudioStream;

    fn name(&self) -> &str {
        "portaudio"
    }

    fn version(&self) -> i32 {
        // SAFETY: no preconditions.
        unsafe { ffi::Pa_GetVersion() }
    }

    fn version_text(&self) -> String {
        // SAFETY: returns a static string or null.
        unsafe { c_string(ffi::Pa_GetVersionText()) }
    }

    fn device_count(&self) -> Result<usize> {
        let _guard = self.guard();
        // SAFETY: library is initialised for the lifetime of `self`.
        let count = unsafe { ffi::Pa_GetDeviceCount() };
        usize::try_from(count).map_err(|_| native_error(count))
    }

    fn device_info(&self, index: DeviceIndex) -> Result<NativeDeviceInfo> {
        let _guard = self.guard();
        let out_of_range = || {
            // SAFETY: library is initialised.
            let count = unsafe { ffi::Pa_GetDeviceCount() };
            Error::DeviceIndexOutOfRange {
                index,
                count: usize::try_from(count).unwrap_or(0),
            }
        };

        let native_index = c_int::try_from(index).map_err(|_| out_of_range())?;
        // SAFETY: returns null for an invalid index, otherwise a pointer owned
        // by PortAudio that stays valid until Pa_Terminate.
        let info =
            unsafe { ffi::Pa_GetDeviceInfo(native_index).as_ref() }.ok_or_else(out_of_range)?;
        // SAFETY: as above, for the host API table.
        let api = unsafe { ffi::Pa_GetHostApiInfo(info.host_api).as_ref() };

        Ok(NativeDeviceInfo {
            // SAFETY: `info.name` is a NUL-terminated string owned by PortAudio.
            name: unsafe { c_string(info.name) },
            host_api: usize::try_from(info.host_api).unwrap_or(0),
            host_api_name: api
                // SAFETY: `api.name` is a NUL-terminated string owned by PortAudio.
                .map(|api| unsafe { c_string(api.name) })
                .unwrap_or_default(),
            max_input_channels: channel_limit(info.max_input_channels),
            max_output_channels: channel_limit(info.max_output_channels),
            default_low_input_latency: info.default_low_input_latency,
            default_low_output_latency: info.default_low_output_latency,
            default_high_input_latency: info.default_high_input_latency,
            default_high_output_latency: info.default_high_output_latency,
            default_sample_rate: info.default_sample_rate,
            is_host_api_default_input: api
                .is_some_and(|a| a.default_input_device == native_index),
            is_host_api_default_output: api
                .is_some_and(|a| a.default_output_device == native_index),
        })
    }

    fn default_input_device(&self) -> Option<DeviceIndex> {
        let _guard = self.guard();
        // SAFETY: library is initialised.
        usize::try_from(unsafe { ffi::Pa_GetDefaultInputDevice() }).ok()
    }

    fn default_output_device(&self) -> Option<DeviceIndex> {
        let _guard = self.guard();
        // SAFETY: library is initialised.
        usize::try_from(unsafe { ffi::Pa_GetDefaultOutputDevice() }).ok()
    }

    fn is_format_supported(&self, parameters: &StreamParameters) -> bool {
        let input = parameters.input.as_ref().map(native_parameters);
        let output = parameters.output.as_ref().map(native_parameters);

        let _guard = self.guard();
        // SAFETY: both pointers are null or point at locals that outlive the call.
        let code = unsafe {
            ffi::Pa_IsFormatSupported(
                optional_ptr(input.as_ref()),
                optional_ptr(output.as_ref()),
                parameters.sample_rate,
            )
        };
        if code != ffi::PA_FORMAT_IS_SUPPORTED {
            tracing::debug!(code, error = %error_text(code), "format not supported");
        }
        code == ffi::PA_FORMAT_IS_SUPPORTED
    }

    fn open_output_stream<C: OutputCallback>(
        &self,
        parameters: &StreamParameters,
        bridge: CallbackBridge<C>,
    ) -> Result<PortAudioStream> {
        let output = parameters
            .output
            .as_ref()
            .map(native_parameters)
            .ok_or_else(|| Error::StreamOpen {
                code: ffi::PA_BAD_IO_DEVICE_COMBINATION,
                message: error_text(ffi::PA_BAD_IO_DEVICE_COMBINATION),
            })?;
        let frames_per_buffer = parameters
            .frames_per_buffer
            .map_or(ffi::PA_FRAMES_PER_BUFFER_UNSPECIFIED, c_ulong::from);

        let user_data = Box::into_raw(Box::new(bridge));
        let mut stream: *mut ffi::PaStream = ptr::null_mut();

        let _guard = self.guard();
        // SAFETY: `output` outlives the call; `user_data` stays valid until the
        // stream is closed and is only dereferenced by `output_trampoline::<C>`.
        let code = unsafe {
            ffi::Pa_OpenStream(
                &raw mut stream,
                ptr::null(),
                &raw const output,
                parameters.sample_rate,
                frames_per_buffer,
                parameters.flags.bits() as ffi::PaStreamFlags,
                Some(output_trampoline::<C>),
                user_data.cast(),
            )
        };

        if code != ffi::PA_NO_ERROR {
            // SAFETY: the stream was not created, so nothing else holds `user_data`.
            drop(unsafe { Box::from_raw(user_data) });
            return Err(Error::StreamOpen {
                code,
                message: error_text(code),
            });
        }

        Ok(PortAudioStream {
            lock: Arc::clone(&self.lock),
            raw: stream,
            user_data: user_data.cast(),
            release: release_bridge::<C>,
        })
    }
}

/// Open PortAudio stream.
///
/// Owns the boxed [`CallbackBridge`] handed to PortAudio as user data and
/// frees it after the stream is closed.
pub struct PortAudioStream {
    lock: ApiLock,
    raw: *mut ffi::PaStream,
    user_data: *mut c_void,
    release: unsafe fn(*mut c_void),
}

// SAFETY: PortAudio stream handles may be used from any one thread at a time,
// and the bridge behind `user_data` is Send.
unsafe impl Send for PortAudioStream {}

impl PortAudioStream {
    fn call(
        &mut self,
        operation: unsafe extern "C" fn(*mut ffi::PaStream) -> ffi::PaError,
    ) -> Result<()> {
        let _guard = lock_api(&self.lock);
        // SAFETY: `raw` is an open stream until Drop closes it.
        let code = unsafe { operation(self.raw) };
        if code == ffi::PA_NO_ERROR {
            Ok(())
        } else {
            Err(Error::Stream {
                code,
                message: error_text(code),
            })
        }
    }
}

impl NativeStream for PortAudioStream {
    fn start(&mut self) -> Result<()> {
        self.call(ffi::Pa_StartStream)
    }

    fn stop(&mut self) -> Result<()> {
        self.call(ffi::Pa_StopStream)
    }

    fn abort(&mut self) -> Result<()> {
        self.call(ffi::Pa_AbortStream)
    }

    fn is_active(&self) -> bool {
        let _guard = lock_api(&self.lock);
        // SAFETY: `raw` is an open stream until Drop closes it.
        unsafe { ffi::Pa_IsStreamActive(self.raw) == 1 }
    }
}

impl Drop for PortAudioStream {
    fn drop(&mut self) {
        let code = {
            let _guard = lock_api(&self.lock);
            // SAFETY: `raw` is open; closing an active stream aborts it first.
            unsafe { ffi::Pa_CloseStream(self.raw) }
        };
        if code == ffi::PA_NO_ERROR {
            // SAFETY: the stream is closed, so the callback can no longer run.
            unsafe { (self.release)(self.user_data) };
        } else {
            // The callback may still hold the bridge; leak it.
            tracing::warn!(code, error = %error_text(code), "Pa_CloseStream failed");
        }
    }
}

impl std::fmt::Debug for PortAudioStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PortAudioStream")
            .field("raw", &self.raw)
            .finish_non_exhaustive()
    }
}

unsafe extern "C" fn output_trampoline<C: OutputCallback>(
    _input: *const c_void,
    output: *mut c_void,
    frame_count: c_ulong,
    _time_info: *const ffi::PaStreamCallbackTimeInfo,
    status_flags: ffi::PaStreamCallbackFlags,
    user_data: *mut c_void,
) -> c_int {
    if output.is_null() || user_data.is_null() {
        return Continuation::Abort.code();
    }

    // SAFETY: `user_data` is the Box<CallbackBridge<C>> created by
    // open_output_stream; PortAudio never runs two callbacks of one stream at
    // once, and the box is freed only after the stream is closed.
    let bridge = unsafe { &mut *user_data.cast::<CallbackBridge<C>>() };
    let frames = frame_count as usize;
    let format = bridge.sample_format();
    let channels = bridge.channel_count();
    let flags = CallbackFlags::from_bits(status_flags as u64);

    let continuation = if bridge.is_interleaved() {
        let len = frames * channels * format.bytes_per_sample();
        // SAFETY: PortAudio hands out `frame_count` frames of `channels`
        // interleaved samples in the negotiated format.
        let data = unsafe { std::slice::from_raw_parts_mut(output.cast::<u8>(), len) };
        let mut buffers = OutputBuffers::interleaved(data, channels, frames, format);
        bridge.process(&mut buffers, flags)
    } else {
        let channels = channels.min(MAX_NON_INTERLEAVED_CHANNELS);
        let len = frames * format.bytes_per_sample();
        let planes = output.cast::<*mut c_void>();
        let mut table: [&mut [u8]; MAX_NON_INTERLEAVED_CHANNELS] =
            std::array::from_fn(|_| Default::default());
        for (i, slot) in table.iter_mut().take(channels).enumerate() {
            // SAFETY: for non-interleaved streams `output` is an array of one
            // buffer pointer per channel, each holding `frame_count` samples.
            *slot = unsafe {
                std::slice::from_raw_parts_mut((*planes.add(i)).cast::<u8>(), len)
            };
        }
        let mut buffers =
            OutputBuffers::non_interleaved(&mut table[..channels], frames, format);
        bridge.process(&mut buffers, flags)
    };

    continuation.code()
}

/// # Safety
///
/// `ptr` must come from `Box::<CallbackBridge<C>>::into_raw` and not be used
/// afterwards.
unsafe fn release_bridge<C: OutputCallback>(ptr: *mut c_void) {
    // SAFETY: guaranteed by the caller.
    drop(unsafe { Box::from_raw(ptr.cast::<CallbackBridge<C>>()) });
}

#[cfg(unix)]
fn install_debug_hook() {
    // SAFETY: installs a function pointer with the expected signature; the
    // hook only reads the NUL-terminated string it is given.
    unsafe { ffi::PaUtil_SetDebugPrintFunction(Some(debug_print)) };
}

#[cfg(not(unix))]
fn install_debug_hook() {}

#[cfg(unix)]
unsafe extern "C" fn debug_print(log: *const c_char) {
    if log.is_null() {
        return;
    }
    // SAFETY: PortAudio passes a NUL-terminated string valid for this call.
    let message = unsafe { CStr::from_ptr(log) }.to_string_lossy();
    tracing::debug!(target: "portaudio", "{}", message.trim_end_matches('\n'));
}

fn lock_api(lock: &ApiLock) -> MutexGuard<'_, ()> {
    lock.lock().unwrap_or_else(PoisonError::into_inner)
}

fn native_parameters(direction: &DirectionParameters) -> ffi::PaStreamParameters {
    ffi::PaStreamParameters {
        device: direction
            .device
            .and_then(|d| c_int::try_from(d).ok())
            .unwrap_or(ffi::PA_NO_DEVICE),
        channel_count: c_int::from(direction.channel_count),
        sample_format: direction.sample_format.bits() as ffi::PaSampleFormat,
        suggested_latency: direction.suggested_latency,
        host_api_specific_stream_info: ptr::null_mut(),
    }
}

fn optional_ptr<T>(value: Option<&T>) -> *const T {
    value.map_or(ptr::null(), ptr::from_ref)
}

fn channel_limit(channels: c_int) -> u16 {
    u16::try_from(channels.max(0)).unwrap_or(u16::MAX)
}

fn native_error(code: c_int) -> Error {
    Error::Native {
        code,
        message: error_text(code),
    }
}

fn error_text(code: c_int) -> String {
    // SAFETY: Pa_GetErrorText returns a static string for any code.
    unsafe { c_string(ffi::Pa_GetErrorText(code)) }
}

/// # Safety
///
/// `ptr` must be null or point at a NUL-terminated string.
unsafe fn c_string(ptr: *const c_char) -> String {
    if ptr.is_null() {
        return String::new();
    }
    // SAFETY: guaranteed by the caller.
    unsafe { CStr::from_ptr(ptr) }.to_string_lossy().into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn api_lock_is_shared_and_survives_poisoning() {
        let host_lock = ApiLock::default();
        let stream_lock = Arc::clone(&host_lock);

        let poisoner = Arc::clone(&host_lock);
        let _ = std::thread::spawn(move || {
            let _guard = lock_api(&poisoner);
            panic!("poison the lock");
        })
        .join();

        let guard = lock_api(&stream_lock);
        assert!(host_lock.try_lock().is_err());
        drop(guard);
        assert!(host_lock.is_poisoned());
        drop(lock_api(&host_lock));
    }

    #[test]
    fn channel_limit_clamps() {
        assert_eq!(channel_limit(-1), 0);
        assert_eq!(channel_limit(8), 8);
        assert_eq!(channel_limit(c_int::MAX), u16::MAX);
    }

    #[test]
    fn missing_direction_is_null() {
        assert!(optional_ptr::<u8>(None).is_null());
        let value = 3u8;
        assert_eq!(optional_ptr(Some(&value)), ptr::from_ref(&value));
    }
}
