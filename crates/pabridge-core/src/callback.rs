//! The output callback contract.
//!
//! ## Real-Time Safety
//!
//! [`OutputCallback::fill`] runs on the native library's audio thread, not on
//! the thread that created the stream, under a hard deadline. Implementations
//! must not allocate, lock mutexes, or perform I/O: a missed deadline is an
//! underrun, and nothing reports it except the audible glitch. State shared
//! with other threads must be lock-free (atomics, ring buffers) or owned
//! outright by the callback.

use crate::OutputBuffers;

/// What the native library should do after a callback returns.
///
/// The discriminants are the native continuation codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum Continuation {
    /// Keep calling back.
    Continue = 0,
    /// Play out the buffers already queued, then stop.
    Complete = 1,
    /// Stop as soon as possible, discarding queued buffers.
    Abort = 2,
}

impl Continuation {
    /// Native continuation code.
    pub const fn code(self) -> i32 {
        self as i32
    }

    /// Parse a native continuation code.
    pub const fn from_code(code: i32) -> Option<Self> {
        match code {
            0 => Some(Continuation::Continue),
            1 => Some(Continuation::Complete),
            2 => Some(Continuation::Abort),
            _ => None,
        }
    }
}

/// Status flags the native library attaches to a callback invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct CallbackFlags(u64);

impl CallbackFlags {
    /// Input data was discarded before the callback ran.
    pub const INPUT_UNDERFLOW: Self = Self(0x01);
    /// Input data was dropped because the callback was late.
    pub const INPUT_OVERFLOW: Self = Self(0x02);
    /// Output ran dry: the previous callback missed its deadline.
    pub const OUTPUT_UNDERFLOW: Self = Self(0x04);
    /// Output data will be discarded because no room is available.
    pub const OUTPUT_OVERFLOW: Self = Self(0x08);
    /// Buffers are being generated to prime the output before playback.
    pub const PRIMING_OUTPUT: Self = Self(0x10);

    /// No flags set.
    pub const fn empty() -> Self {
        Self(0)
    }

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
}

impl std::ops::BitOr for CallbackFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

/// Fills output buffers given a frame count.
///
/// This is the one capability the host runtime supplies to an output stream.
/// It is called from the native audio thread (see the module docs for the
/// real-time rules) and must either own its state or synchronise it without
/// blocking. The returned [`Continuation`] is handed to the native library
/// unchanged.
///
/// A panic inside `fill` does not cross into the native library: the stream
/// bridge catches it, aborts the stream and records the fault for the caller
/// to pick up later.
pub trait OutputCallback: Send + 'static {
    /// Write `frames` frames into `buffers`.
    fn fill(&mut self, buffers: &mut OutputBuffers<'_, '_>, frames: usize) -> Continuation;
}

/// [`OutputCallback`] backed by a closure. Built with [`fill_fn`].
pub struct FillFn<F>(F);

impl<F> std::fmt::Debug for FillFn<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FillFn").finish_non_exhaustive()
    }
}

impl<F> OutputCallback for FillFn<F>
where
    F: FnMut(&mut OutputBuffers<'_, '_>, usize) -> Continuation + Send + 'static,
{
    fn fill(&mut self, buffers: &mut OutputBuffers<'_, '_>, frames: usize) -> Continuation {
        (self.0)(buffers, frames)
    }
}

/// Turn a closure into an [`OutputCallback`].
///
/// ```rust
/// use pabridge_core::{Continuation, OutputCallback, fill_fn};
///
/// let mut remaining = 48_000usize;
/// let _callback = fill_fn(move |buffers, frames| {
///     buffers.fill_silence();
///     remaining = remaining.saturating_sub(frames);
///     if remaining == 0 { Continuation::Complete } else { Continuation::Continue }
/// });
/// ```
pub fn fill_fn<F>(f: F) -> FillFn<F>
where
    F: FnMut(&mut OutputBuffers<'_, '_>, usize) -> Continuation + Send + 'static,
{
    FillFn(f)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::SampleFormat;

    #[test]
    fn continuation_codes_match_native_values() {
        assert_eq!(Continuation::Continue.code(), 0);
        assert_eq!(Continuation::Complete.code(), 1);
        assert_eq!(Continuation::Abort.code(), 2);
        for c in [
            Continuation::Continue,
            Continuation::Complete,
            Continuation::Abort,
        ] {
            assert_eq!(Continuation::from_code(c.code()), Some(c));
        }
        assert_eq!(Continuation::from_code(3), None);
        assert_eq!(Continuation::from_code(-1), None);
    }

    #[test]
    fn flags_contain() {
        let flags = CallbackFlags::OUTPUT_UNDERFLOW | CallbackFlags::PRIMING_OUTPUT;
        assert!(flags.contains(CallbackFlags::OUTPUT_UNDERFLOW));
        assert!(flags.contains(CallbackFlags::PRIMING_OUTPUT));
        assert!(!flags.contains(CallbackFlags::INPUT_OVERFLOW));
        assert_eq!(flags.bits(), 0x14);
        assert!(CallbackFlags::empty().contains(CallbackFlags::empty()));
    }

    #[test]
    fn fill_fn_forwards_arguments_and_result() {
        let mut seen = 0;
        let mut callback = fill_fn(move |buffers: &mut OutputBuffers<'_, '_>, frames| {
            seen += frames;
            buffers.fill_silence();
            if seen >= 8 {
                Continuation::Complete
            } else {
                Continuation::Continue
            }
        });

        let mut data = [1u8; 8];
        let mut buffers = OutputBuffers::interleaved(&mut data, 1, 4, SampleFormat::Int16);
        assert_eq!(callback.fill(&mut buffers, 4), Continuation::Continue);
        assert_eq!(callback.fill(&mut buffers, 4), Continuation::Complete);
        drop(buffers);
        assert_eq!(data, [0; 8]);
    }
}
