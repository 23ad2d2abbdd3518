//! Zero-copy view over a native output buffer.

use crate::SampleFormat;

/// The output buffer of one callback invocation, seen as raw bytes.
///
/// Built by the native layer around memory it does not own: a single
/// interleaved buffer, or one buffer per channel for non-interleaved streams.
/// No samples are copied; the view borrows the native memory for the duration
/// of one callback.
///
/// Per-channel access ([`channel_mut`](Self::channel_mut)) is only available
/// for non-interleaved buffers; interleaved data is reached through
/// [`interleaved_mut`](Self::interleaved_mut).
#[derive(Debug)]
pub struct OutputBuffers<'a, 'b> {
    layout: Layout<'a, 'b>,
    frames: usize,
    sample_format: SampleFormat,
}

#[derive(Debug)]
enum Layout<'a, 'b> {
    Interleaved { data: &'a mut [u8], channels: usize },
    NonInterleaved(&'a mut [&'b mut [u8]]),
}

impl<'a, 'b> OutputBuffers<'a, 'b> {
    /// Wrap one interleaved buffer of `frames * channels` samples.
    pub fn interleaved(
        data: &'a mut [u8],
        channels: usize,
        frames: usize,
        sample_format: SampleFormat,
    ) -> Self {
        debug_assert_eq!(
            data.len(),
            frames * channels * sample_format.bytes_per_sample()
        );
        Self {
            layout: Layout::Interleaved { data, channels },
            frames,
            sample_format,
        }
    }

    /// Wrap one buffer per channel, each holding `frames` samples.
    pub fn non_interleaved(
        channels: &'a mut [&'b mut [u8]],
        frames: usize,
        sample_format: SampleFormat,
    ) -> Self {
        debug_assert!(
            channels
                .iter()
                .all(|c| c.len() == frames * sample_format.bytes_per_sample())
        );
        Self {
            layout: Layout::NonInterleaved(channels),
            frames,
            sample_format,
        }
    }

    /// Frames in this buffer.
    pub fn frames(&self) -> usize {
        self.frames
    }

    /// Number of channels.
    pub fn channel_count(&self) -> usize {
        match &self.layout {
            Layout::Interleaved { channels, .. } => *channels,
            Layout::NonInterleaved(channels) => channels.len(),
        }
    }

    /// Sample encoding of the bytes.
    pub fn sample_format(&self) -> SampleFormat {
        self.sample_format
    }

    /// Whether all channels share one buffer.
    pub fn is_interleaved(&self) -> bool {
        matches!(self.layout, Layout::Interleaved { .. })
    }

    /// Bytes of one channel (non-interleaved only).
    pub fn channel_mut(&mut self, index: usize) -> Option<&mut [u8]> {
        match &mut self.layout {
            Layout::NonInterleaved(channels) => channels.get_mut(index).map(|c| &mut **c),
            Layout::Interleaved { .. } => None,
        }
    }

    /// Iterate over the per-channel buffers (empty for interleaved buffers).
    pub fn channels_mut(&mut self) -> impl Iterator<Item = &mut [u8]> {
        let channels: &mut [&'b mut [u8]] = match &mut self.layout {
            Layout::NonInterleaved(channels) => channels,
            Layout::Interleaved { .. } => &mut [],
        };
        channels.iter_mut().map(|c| &mut **c)
    }

    /// The shared buffer (interleaved only).
    pub fn interleaved_mut(&mut self) -> Option<&mut [u8]> {
        match &mut self.layout {
            Layout::Interleaved { data, .. } => Some(&mut **data),
            Layout::NonInterleaved(_) => None,
        }
    }

    /// Typed view of one channel.
    ///
    /// Returns `None` when the buffer is interleaved, the index is out of range,
    /// `T` does not match the sample size, or the memory is misaligned for `T`.
    pub fn channel_samples_mut<T: bytemuck::Pod>(&mut self, index: usize) -> Option<&mut [T]> {
        if std::mem::size_of::<T>() != self.sample_format.bytes_per_sample() {
            return None;
        }
        let bytes = self.channel_mut(index)?;
        bytemuck::try_cast_slice_mut(bytes).ok()
    }

    /// Typed view of the interleaved buffer, under the same rules as
    /// [`channel_samples_mut`](Self::channel_samples_mut).
    pub fn interleaved_samples_mut<T: bytemuck::Pod>(&mut self) -> Option<&mut [T]> {
        if std::mem::size_of::<T>() != self.sample_format.bytes_per_sample() {
            return None;
        }
        let bytes = self.interleaved_mut()?;
        bytemuck::try_cast_slice_mut(bytes).ok()
    }

    /// Write silence into every channel.
    pub fn fill_silence(&mut self) {
        let silence = self.sample_format.silence_byte();
        match &mut self.layout {
            Layout::Interleaved { data, .. } => data.fill(silence),
            Layout::NonInterleaved(channels) => {
                for channel in channels.iter_mut() {
                    channel.fill(silence);
                }
            }
        }
    }
}
