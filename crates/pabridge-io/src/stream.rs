//! Output streams and the real-time callback bridge.
//!
//! An [`OutputStream`] owns one open native stream. The native library calls
//! the stream's [`CallbackBridge`] on its own audio thread once per buffer; the
//! bridge forwards the buffer view and frame count to the host's
//! [`OutputCallback`] and hands the returned [`Continuation`] back unchanged.
//!
//! The bridge never lets a panic escape into the native caller. A panicking
//! callback turns into [`Continuation::Abort`], the buffer is silenced, and the
//! fault is recorded in the stream's [`StreamStatus`], where the caller finds
//! it through [`OutputStream::check`].

use crate::native::{DeviceIndex, NativeHost, NativeStream, StreamParameters};
use crate::{Error, Result};
use pabridge_core::{
    CallbackFlags, Continuation, OutputBuffers, OutputCallback, SampleFormat, StreamFormat,
};
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};

/// Counters shared between the audio thread and the stream owner.
///
/// Written from the callback with relaxed atomics only; the fault message is
/// set once, on the abort path.
#[derive(Debug, Default)]
pub struct StreamStatus {
    callbacks: AtomicU64,
    frames: AtomicU64,
    output_underflows: AtomicU64,
    faults: AtomicU32,
    fault_message: OnceLock<String>,
}

impl StreamStatus {
    fn record_callback(&self, frames: usize, flags: CallbackFlags) {
        self.callbacks.fetch_add(1, Ordering::Relaxed);
        self.frames.fetch_add(frames as u64, Ordering::Relaxed);
        if flags.contains(CallbackFlags::OUTPUT_UNDERFLOW) {
            self.output_underflows.fetch_add(1, Ordering::Relaxed);
        }
    }

    fn record_fault(&self, message: String) {
        // message first: a reader that sees the count also sees the text
        let _ = self.fault_message.set(message);
        self.faults.fetch_add(1, Ordering::Release);
    }

    /// Number of callback faults recorded.
    pub fn faults(&self) -> u32 {
        self.faults.load(Ordering::Acquire)
    }

    /// Message of the first fault, if one was recorded.
    pub fn fault_message(&self) -> Option<&str> {
        self.fault_message.get().map(String::as_str)
    }

    /// Copy the counters.
    pub fn snapshot(&self) -> StatusSnapshot {
        StatusSnapshot {
            callbacks: self.callbacks.load(Ordering::Relaxed),
            frames_rendered: self.frames.load(Ordering::Relaxed),
            output_underflows: self.output_underflows.load(Ordering::Relaxed),
            faults: self.faults(),
        }
    }
}

/// Point-in-time copy of a stream's counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StatusSnapshot {
    /// Callback invocations so far.
    pub callbacks: u64,
    /// Frames requested by the native library so far.
    pub frames_rendered: u64,
    /// Invocations flagged with an output underflow.
    pub output_underflows: u64,
    /// Callback faults recorded (0 or 1).
    pub faults: u32,
}

/// Adapter between a native output callback and the host's [`OutputCallback`].
///
/// Owned by the native stream for its whole life. [`process`](Self::process)
/// is the only thing the audio thread calls; it does not allocate, lock or
/// block unless the host callback panics.
pub struct CallbackBridge<C> {
    callback: C,
    channels: usize,
    sample_format: SampleFormat,
    interleaved: bool,
    status: Arc<StreamStatus>,
    faulted: bool,
}

impl<C: OutputCallback> CallbackBridge<C> {
    /// Bridge `callback` for streams of `format`, reporting into `status`.
    pub fn new(callback: C, format: &StreamFormat, status: Arc<StreamStatus>) -> Self {
        Self {
            callback,
            channels: usize::from(format.num_channels),
            sample_format: format.sample_format,
            interleaved: format.interleaved,
            status,
            faulted: false,
        }
    }

    /// Channels per frame.
    pub fn channel_count(&self) -> usize {
        self.channels
    }

    /// Sample encoding of the stream.
    pub fn sample_format(&self) -> SampleFormat {
        self.sample_format
    }

    /// Whether the native buffer is a single interleaved block.
    pub fn is_interleaved(&self) -> bool {
        self.interleaved
    }

    /// Status shared with the stream owner.
    pub fn status(&self) -> &Arc<StreamStatus> {
        &self.status
    }

    /// Handle one native callback.
    ///
    /// Calls the host callback with the buffer view and its frame count and
    /// returns its continuation. After a fault the host callback is not called
    /// again: every later invocation outputs silence and returns
    /// [`Continuation::Abort`].
    pub fn process(
        &mut self,
        buffers: &mut OutputBuffers<'_, '_>,
        flags: CallbackFlags,
    ) -> Continuation {
        let frames = buffers.frames();
        self.status.record_callback(frames, flags);

        if self.faulted {
            buffers.fill_silence();
            return Continuation::Abort;
        }

        let callback = &mut self.callback;
        match panic::catch_unwind(AssertUnwindSafe(|| callback.fill(buffers, frames))) {
            Ok(continuation) => continuation,
            Err(payload) => {
                self.faulted = true;
                buffers.fill_silence();
                self.status.record_fault(panic_message(payload.as_ref()));
                Continuation::Abort
            }
        }
    }
}

impl<C> std::fmt::Debug for CallbackBridge<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CallbackBridge")
            .field("channels", &self.channels)
            .field("sample_format", &self.sample_format)
            .field("interleaved", &self.interleaved)
            .field("faulted", &self.faulted)
            .finish_non_exhaustive()
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "output callback panicked".to_string()
    }
}

/// Type-erased view of a [`CallbackBridge`].
///
/// For native layers that store the bridge behind a trait object instead of
/// monomorphising a trampoline per callback type.
pub trait RenderTarget: Send {
    /// See [`CallbackBridge::process`].
    fn render(&mut self, buffers: &mut OutputBuffers<'_, '_>, flags: CallbackFlags)
    -> Continuation;

    /// Channels per frame.
    fn channel_count(&self) -> usize;

    /// Sample encoding of the stream.
    fn sample_format(&self) -> SampleFormat;

    /// Whether the native buffer is a single interleaved block.
    fn is_interleaved(&self) -> bool;
}

impl<C: OutputCallback> RenderTarget for CallbackBridge<C> {
    fn render(
        &mut self,
        buffers: &mut OutputBuffers<'_, '_>,
        flags: CallbackFlags,
    ) -> Continuation {
        self.process(buffers, flags)
    }

    fn channel_count(&self) -> usize {
        self.channels
    }

    fn sample_format(&self) -> SampleFormat {
        self.sample_format
    }

    fn is_interleaved(&self) -> bool {
        self.interleaved
    }
}

/// Lifecycle of an [`OutputStream`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamState {
    /// Opened, never started.
    Created,
    /// Started by the caller.
    Started,
    /// Stopped by the caller.
    Stopped,
}

/// A callback-driven output stream on one device.
///
/// Created stopped. [`start`](Self::start) and [`stop`](Self::stop) block until
/// the native library acknowledges them. Dropping a started stream stops it and
/// closes the native stream; once drop returns no callback is in flight.
///
/// The stream keeps the native subsystem alive through a shared handle.
pub struct OutputStream<H: NativeHost> {
    // Declared before `_host` so the native stream closes before the
    // subsystem reference is released.
    native: H::Stream,
    format: StreamFormat,
    device_index: DeviceIndex,
    state: StreamState,
    status: Arc<StreamStatus>,
    _host: Arc<H>,
}

impl<H: NativeHost> OutputStream<H> {
    pub(crate) fn open<C: OutputCallback>(
        host: Arc<H>,
        device_index: DeviceIndex,
        parameters: &StreamParameters,
        format: StreamFormat,
        callback: C,
    ) -> Result<Self> {
        let status = Arc::new(StreamStatus::default());
        let bridge = CallbackBridge::new(callback, &format, Arc::clone(&status));
        let native = host.open_output_stream(parameters, bridge)?;

        tracing::info!(
            backend = host.name(),
            device = device_index,
            format = %format,
            "output stream opened"
        );

        Ok(Self {
            native,
            format,
            device_index,
            state: StreamState::Created,
            status,
            _host: host,
        })
    }

    /// Start calling back. Starting a started stream does nothing.
    pub fn start(&mut self) -> Result<()> {
        if self.state == StreamState::Started {
            return Ok(());
        }
        self.native.start()?;
        self.state = StreamState::Started;
        tracing::info!(device = self.device_index, "output stream started");
        Ok(())
    }

    /// Stop after queued buffers have played. Stopping a stream that is not
    /// started does nothing.
    pub fn stop(&mut self) -> Result<()> {
        if self.state != StreamState::Started {
            return Ok(());
        }
        self.native.stop()?;
        self.state = StreamState::Stopped;
        tracing::info!(device = self.device_index, "output stream stopped");
        Ok(())
    }

    /// Stop immediately, discarding queued buffers.
    pub fn abort(&mut self) -> Result<()> {
        if self.state != StreamState::Started {
            return Ok(());
        }
        self.native.abort()?;
        self.state = StreamState::Stopped;
        tracing::info!(device = self.device_index, "output stream aborted");
        Ok(())
    }

    /// Caller-visible lifecycle state.
    pub fn state(&self) -> StreamState {
        self.state
    }

    /// Whether the native stream is producing audio.
    ///
    /// False after the callback has completed or aborted, even while
    /// [`state`](Self::state) still reads `Started`.
    pub fn is_active(&self) -> bool {
        self.native.is_active()
    }

    /// Format the stream was opened with.
    pub fn format(&self) -> &StreamFormat {
        &self.format
    }

    /// Device the stream plays on.
    pub fn device_index(&self) -> DeviceIndex {
        self.device_index
    }

    /// Current counters.
    pub fn status(&self) -> StatusSnapshot {
        self.status.snapshot()
    }

    /// Current counters, or the recorded callback fault.
    pub fn check(&self) -> Result<StatusSnapshot> {
        if self.status.faults() > 0 {
            let message = self
                .status
                .fault_message()
                .unwrap_or("output callback panicked");
            return Err(Error::CallbackFault(message.to_string()));
        }
        Ok(self.status.snapshot())
    }

    /// The native stream handle.
    pub fn native(&self) -> &H::Stream {
        &self.native
    }

    /// The native stream handle, mutably.
    pub fn native_mut(&mut self) -> &mut H::Stream {
        &mut self.native
    }
}

impl<H: NativeHost> Drop for OutputStream<H> {
    fn drop(&mut self) {
        if self.state == StreamState::Started
            && let Err(e) = self.native.stop()
        {
            tracing::warn!(device = self.device_index, error = %e, "failed to stop output stream");
        }
    }
}

impl<H: NativeHost> std::fmt::Debug for OutputStream<H> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OutputStream")
            .field("device_index", &self.device_index)
            .field("format", &self.format)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pabridge_core::fill_fn;

    fn planar_format() -> StreamFormat {
        StreamFormat::new(48000.0, 2, SampleFormat::Float32).with_interleaved(false)
    }

    #[test]
    fn bridge_forwards_continuation_unchanged() {
        let status = Arc::new(StreamStatus::default());
        let mut next = [
            Continuation::Continue,
            Continuation::Complete,
            Continuation::Abort,
        ]
        .into_iter();
        let callback = fill_fn(move |_: &mut OutputBuffers<'_, '_>, _| {
            next.next().unwrap_or(Continuation::Continue)
        });
        let mut bridge = CallbackBridge::new(callback, &planar_format(), Arc::clone(&status));

        let mut a = [0u8; 32];
        let mut b = [0u8; 32];
        let mut channels: [&mut [u8]; 2] = [&mut a, &mut b];
        let mut buffers = OutputBuffers::non_interleaved(&mut channels, 8, SampleFormat::Float32);

        let flags = CallbackFlags::empty();
        assert_eq!(bridge.process(&mut buffers, flags), Continuation::Continue);
        assert_eq!(bridge.process(&mut buffers, flags), Continuation::Complete);
        assert_eq!(bridge.process(&mut buffers, flags), Continuation::Abort);
        assert_eq!(status.snapshot().callbacks, 3);
        assert_eq!(status.snapshot().frames_rendered, 24);
        assert_eq!(status.faults(), 0);
    }

    #[test]
    fn bridge_contains_panics() {
        let status = Arc::new(StreamStatus::default());
        let mut calls = 0u32;
        let callback = fill_fn(move |buffers: &mut OutputBuffers<'_, '_>, _| {
            calls += 1;
            buffers.channel_mut(0).unwrap().fill(0xFF);
            if calls == 2 {
                panic!("decoder ran dry");
            }
            Continuation::Continue
        });
        let mut bridge = CallbackBridge::new(callback, &planar_format(), Arc::clone(&status));

        let mut a = [0u8; 16];
        let mut b = [0u8; 16];
        let mut channels: [&mut [u8]; 2] = [&mut a, &mut b];
        let mut buffers = OutputBuffers::non_interleaved(&mut channels, 4, SampleFormat::Float32);

        let flags = CallbackFlags::empty();
        assert_eq!(bridge.process(&mut buffers, flags), Continuation::Continue);
        assert_eq!(bridge.process(&mut buffers, flags), Continuation::Abort);
        assert_eq!(bridge.process(&mut buffers, flags), Continuation::Abort);

        assert_eq!(status.faults(), 1);
        assert_eq!(status.fault_message(), Some("decoder ran dry"));
        drop(buffers);
        assert!(a.iter().all(|&x| x == 0), "faulted buffer must be silenced");
    }

    #[test]
    fn fault_count_is_published_after_message() {
        let status = Arc::new(StreamStatus::default());
        let reader = {
            let status = Arc::clone(&status);
            std::thread::spawn(move || {
                while status.faults() == 0 {
                    std::hint::spin_loop();
                }
                status.fault_message().map(str::to_string)
            })
        };

        status.record_fault("device unplugged".to_string());
        assert_eq!(reader.join().unwrap().as_deref(), Some("device unplugged"));
    }

    #[test]
    fn bridge_counts_output_underflows() {
        let status = Arc::new(StreamStatus::default());
        let callback = fill_fn(|_: &mut OutputBuffers<'_, '_>, _| Continuation::Continue);
        let format = StreamFormat::new(48000.0, 1, SampleFormat::Int16);
        let mut bridge = CallbackBridge::new(callback, &format, Arc::clone(&status));

        let mut data = [0u8; 8];
        let mut buffers = OutputBuffers::interleaved(&mut data, 1, 4, SampleFormat::Int16);
        bridge.process(&mut buffers, CallbackFlags::OUTPUT_UNDERFLOW);
        bridge.process(&mut buffers, CallbackFlags::PRIMING_OUTPUT);
        bridge.process(
            &mut buffers,
            CallbackFlags::OUTPUT_UNDERFLOW | CallbackFlags::OUTPUT_OVERFLOW,
        );
        assert_eq!(status.snapshot().output_underflows, 2);
    }

    #[test]
    fn panic_message_extracts_strings() {
        let owned: Box<dyn Any + Send> = Box::new(String::from("owned"));
        assert_eq!(panic_message(owned.as_ref()), "owned");
        let borrowed: Box<dyn Any + Send> = Box::new("borrowed");
        assert_eq!(panic_message(borrowed.as_ref()), "borrowed");
        let other: Box<dyn Any + Send> = Box::new(42u8);
        assert_eq!(panic_message(other.as_ref()), "output callback panicked");
    }
}
