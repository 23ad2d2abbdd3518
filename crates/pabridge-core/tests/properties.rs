//! Property-based tests for the pabridge-core buffer and format helpers.

use pabridge_core::{OutputBuffers, SampleFormat, StreamFormat};
use proptest::prelude::*;

fn any_sample_format() -> impl Strategy<Value = SampleFormat> {
    prop::sample::select(SampleFormat::ALL.to_vec())
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    /// Encoding a sample touches exactly `bytes_per_sample` bytes, whatever the value.
    #[test]
    fn write_sample_stays_in_bounds(
        format in any_sample_format(),
        value in prop::num::f32::ANY,
    ) {
        let mut out = [0xA5u8; 16];
        let written = format.write_sample(value, &mut out);
        prop_assert_eq!(written, format.bytes_per_sample());
        prop_assert!(out[written..].iter().all(|&b| b == 0xA5));
    }

    /// A non-interleaved view reports one channel per buffer and the frame
    /// count it was built with.
    #[test]
    fn non_interleaved_view_shape(
        format in any_sample_format(),
        channels in 1usize..16,
        frames in 0usize..512,
    ) {
        let len = frames * format.bytes_per_sample();
        let mut storage: Vec<Vec<u8>> = (0..channels).map(|_| vec![0u8; len]).collect();
        let mut views: Vec<&mut [u8]> = storage.iter_mut().map(Vec::as_mut_slice).collect();
        let mut buffers = OutputBuffers::non_interleaved(&mut views, frames, format);

        prop_assert_eq!(buffers.channel_count(), channels);
        prop_assert_eq!(buffers.frames(), frames);
        for index in 0..channels {
            prop_assert_eq!(buffers.channel_mut(index).map(|c| c.len()), Some(len));
        }
        prop_assert!(buffers.channel_mut(channels).is_none());
    }

    /// Silence fills every byte with the format's silence pattern.
    #[test]
    fn silence_fills_interleaved(
        format in any_sample_format(),
        channels in 1u16..8,
        frames in 1usize..256,
    ) {
        let stream = StreamFormat::new(48000.0, channels, format);
        let mut data = vec![0x5Au8; frames * stream.bytes_per_frame()];
        OutputBuffers::interleaved(&mut data, usize::from(channels), frames, format).fill_silence();
        prop_assert!(data.iter().all(|&b| b == format.silence_byte()));
    }
}
