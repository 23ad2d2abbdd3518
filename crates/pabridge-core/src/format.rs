//! PCM stream description.

use std::fmt;
use std::str::FromStr;

/// Errors describing a malformed or unrecognised stream format.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum FormatError {
    /// A stream needs at least one channel.
    #[error("invalid channel count: {0} (must be at least 1)")]
    InvalidChannelCount(u16),

    /// Sample rate is zero, negative or not a finite number.
    #[error("invalid sample rate: {0}")]
    InvalidSampleRate(f64),

    /// Sample format name did not match any known encoding.
    #[error("unknown sample format '{0}' (expected one of i8, u8, i16, i24, i32, f32, f64)")]
    UnknownSampleFormat(String),
}

/// PCM sample encoding requested by the engine.
///
/// Integer formats are signed unless noted. [`SampleFormat::Int24`] is packed
/// (three bytes per sample, native byte order). [`SampleFormat::Float64`] is an
/// engine-side format with no native output counterpart; the translator in
/// `pabridge-io` rejects it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(rename_all = "lowercase")
)]
pub enum SampleFormat {
    /// Signed 8-bit.
    #[cfg_attr(feature = "serde", serde(alias = "i8"))]
    Int8,
    /// Unsigned 8-bit, silence at 0x80.
    #[cfg_attr(feature = "serde", serde(alias = "u8"))]
    UInt8,
    /// Signed 16-bit.
    #[cfg_attr(feature = "serde", serde(alias = "i16"))]
    Int16,
    /// Signed 24-bit, packed.
    #[cfg_attr(feature = "serde", serde(alias = "i24"))]
    Int24,
    /// Signed 32-bit.
    #[cfg_attr(feature = "serde", serde(alias = "i32"))]
    Int32,
    /// 32-bit IEEE float.
    #[cfg_attr(feature = "serde", serde(alias = "f32"))]
    Float32,
    /// 64-bit IEEE float.
    #[cfg_attr(feature = "serde", serde(alias = "f64"))]
    Float64,
}

impl SampleFormat {
    /// Every encoding, in declaration order.
    pub const ALL: [SampleFormat; 7] = [
        SampleFormat::Int8,
        SampleFormat::UInt8,
        SampleFormat::Int16,
        SampleFormat::Int24,
        SampleFormat::Int32,
        SampleFormat::Float32,
        SampleFormat::Float64,
    ];

    /// Size of one sample in bytes.
    pub const fn bytes_per_sample(self) -> usize {
        match self {
            SampleFormat::Int8 | SampleFormat::UInt8 => 1,
            SampleFormat::Int16 => 2,
            SampleFormat::Int24 => 3,
            SampleFormat::Int32 | SampleFormat::Float32 => 4,
            SampleFormat::Float64 => 8,
        }
    }

    /// Short name used in CLI arguments and config files.
    pub const fn name(self) -> &'static str {
        match self {
            SampleFormat::Int8 => "i8",
            SampleFormat::UInt8 => "u8",
            SampleFormat::Int16 => "i16",
            SampleFormat::Int24 => "i24",
            SampleFormat::Int32 => "i32",
            SampleFormat::Float32 => "f32",
            SampleFormat::Float64 => "f64",
        }
    }

    /// Byte pattern that encodes silence.
    pub const fn silence_byte(self) -> u8 {
        match self {
            SampleFormat::UInt8 => 0x80,
            _ => 0,
        }
    }

    /// Encode one normalised sample (`-1.0..=1.0`, clamped) into `out`.
    ///
    /// Writes [`bytes_per_sample`](Self::bytes_per_sample) bytes in native byte
    /// order and returns how many were written, or 0 when `out` is too short.
    /// Does not allocate, so it is safe to call from an output callback.
    pub fn write_sample(self, value: f32, out: &mut [u8]) -> usize {
        let size = self.bytes_per_sample();
        let Some(out) = out.get_mut(..size) else {
            return 0;
        };
        let v = if value.is_nan() { 0.0 } else { value.clamp(-1.0, 1.0) };

        match self {
            SampleFormat::Int8 => out.copy_from_slice(&((v * 127.0) as i8).to_ne_bytes()),
            SampleFormat::UInt8 => out.copy_from_slice(&((v * 127.0 + 128.0) as u8).to_ne_bytes()),
            SampleFormat::Int16 => out.copy_from_slice(&((v * 32767.0) as i16).to_ne_bytes()),
            SampleFormat::Int24 => {
                let bytes = ((f64::from(v) * 8_388_607.0) as i32).to_ne_bytes();
                if cfg!(target_endian = "little") {
                    out.copy_from_slice(&bytes[..3]);
                } else {
                    out.copy_from_slice(&bytes[1..]);
                }
            }
            SampleFormat::Int32 => {
                out.copy_from_slice(&((f64::from(v) * f64::from(i32::MAX)) as i32).to_ne_bytes());
            }
            SampleFormat::Float32 => out.copy_from_slice(&v.to_ne_bytes()),
            SampleFormat::Float64 => out.copy_from_slice(&f64::from(v).to_ne_bytes()),
        }
        size
    }
}

impl fmt::Display for SampleFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for SampleFormat {
    type Err = FormatError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "i8" | "int8" => Ok(SampleFormat::Int8),
            "u8" | "uint8" => Ok(SampleFormat::UInt8),
            "i16" | "int16" => Ok(SampleFormat::Int16),
            "i24" | "int24" => Ok(SampleFormat::Int24),
            "i32" | "int32" => Ok(SampleFormat::Int32),
            "f32" | "float32" => Ok(SampleFormat::Float32),
            "f64" | "float64" => Ok(SampleFormat::Float64),
            _ => Err(FormatError::UnknownSampleFormat(s.to_string())),
        }
    }
}

/// Desired PCM layout of an output stream.
///
/// Immutable once handed to a device. Non-interleaved streams deliver one buffer
/// per channel to the output callback; interleaved streams deliver a single
/// buffer of `frames * num_channels` samples.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct StreamFormat {
    /// Frames per second.
    pub sample_rate: f64,
    /// Number of channels, at least 1.
    pub num_channels: u16,
    /// Sample encoding.
    pub sample_format: SampleFormat,
    /// Whether channels share one buffer.
    pub interleaved: bool,
}

impl StreamFormat {
    /// Interleaved format with the given rate, channel count and encoding.
    pub fn new(sample_rate: f64, num_channels: u16, sample_format: SampleFormat) -> Self {
        Self {
            sample_rate,
            num_channels,
            sample_format,
            interleaved: true,
        }
    }

    /// Set whether channels share one buffer.
    pub fn with_interleaved(mut self, interleaved: bool) -> Self {
        self.interleaved = interleaved;
        self
    }

    /// Bytes in one frame across all channels.
    pub fn bytes_per_frame(&self) -> usize {
        self.sample_format.bytes_per_sample() * usize::from(self.num_channels)
    }

    /// Check the channel count and sample rate.
    pub fn validate(&self) -> Result<(), FormatError> {
        if self.num_channels == 0 {
            return Err(FormatError::InvalidChannelCount(self.num_channels));
        }
        if !self.sample_rate.is_finite() || self.sample_rate <= 0.0 {
            return Err(FormatError::InvalidSampleRate(self.sample_rate));
        }
        Ok(())
    }
}

impl Default for StreamFormat {
    fn default() -> Self {
        Self::new(48000.0, 2, SampleFormat::Float32)
    }
}

impl fmt::Display for StreamFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} Hz, {} ch, {}, {}",
            self.sample_rate,
            self.num_channels,
            self.sample_format,
            if self.interleaved {
                "interleaved"
            } else {
                "non-interleaved"
            }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_accepts_short_and_long_names() {
        assert_eq!("i16".parse::<SampleFormat>().unwrap(), SampleFormat::Int16);
        assert_eq!("Float32".parse::<SampleFormat>().unwrap(), SampleFormat::Float32);
        assert_eq!(" uint8 ".parse::<SampleFormat>().unwrap(), SampleFormat::UInt8);
        assert!(matches!(
            "pcm12".parse::<SampleFormat>(),
            Err(FormatError::UnknownSampleFormat(_))
        ));
    }

    #[test]
    fn display_roundtrips_through_parse() {
        for format in SampleFormat::ALL {
            assert_eq!(format.to_string().parse::<SampleFormat>().unwrap(), format);
        }
    }

    #[test]
    fn sample_sizes() {
        assert_eq!(SampleFormat::Int8.bytes_per_sample(), 1);
        assert_eq!(SampleFormat::Int24.bytes_per_sample(), 3);
        assert_eq!(SampleFormat::Float64.bytes_per_sample(), 8);
        let format = StreamFormat::new(44100.0, 6, SampleFormat::Int24);
        assert_eq!(format.bytes_per_frame(), 18);
    }

    #[test]
    fn write_sample_encodes_extremes() {
        let mut out = [0u8; 8];

        assert_eq!(SampleFormat::Int16.write_sample(1.0, &mut out), 2);
        assert_eq!(i16::from_ne_bytes([out[0], out[1]]), 32767);

        assert_eq!(SampleFormat::UInt8.write_sample(0.0, &mut out), 1);
        assert_eq!(out[0], 0x80);

        SampleFormat::Float32.write_sample(2.5, &mut out);
        assert_eq!(f32::from_ne_bytes([out[0], out[1], out[2], out[3]]), 1.0);

        SampleFormat::Int32.write_sample(-1.0, &mut out);
        assert_eq!(
            i32::from_ne_bytes([out[0], out[1], out[2], out[3]]),
            -i32::MAX
        );
    }

    #[test]
    fn write_sample_packs_int24() {
        let mut out = [0u8; 3];
        assert_eq!(SampleFormat::Int24.write_sample(1.0, &mut out), 3);
        let mut wide = [0u8; 4];
        if cfg!(target_endian = "little") {
            wide[..3].copy_from_slice(&out);
            assert_eq!(i32::from_le_bytes(wide), 8_388_607);
        } else {
            wide[1..].copy_from_slice(&out);
            assert_eq!(i32::from_be_bytes(wide), 8_388_607);
        }
    }

    #[test]
    fn write_sample_short_buffer_writes_nothing() {
        let mut out = [0xAAu8; 1];
        assert_eq!(SampleFormat::Int16.write_sample(0.5, &mut out), 0);
        assert_eq!(out[0], 0xAA);
    }

    #[test]
    fn nan_encodes_as_silence() {
        let mut out = [0xFFu8; 2];
        SampleFormat::Int16.write_sample(f32::NAN, &mut out);
        assert_eq!(i16::from_ne_bytes(out), 0);
    }

    #[test]
    fn validate_rejects_bad_formats() {
        assert!(StreamFormat::default().validate().is_ok());
        assert_eq!(
            StreamFormat::new(48000.0, 0, SampleFormat::Int16).validate(),
            Err(FormatError::InvalidChannelCount(0))
        );
        assert!(matches!(
            StreamFormat::new(0.0, 2, SampleFormat::Int16).validate(),
            Err(FormatError::InvalidSampleRate(_))
        ));
        assert!(matches!(
            StreamFormat::new(f64::NAN, 2, SampleFormat::Int16).validate(),
            Err(FormatError::InvalidSampleRate(_))
        ));
    }

    #[test]
    fn display_mentions_layout() {
        let format = StreamFormat::new(44100.0, 2, SampleFormat::Int16).with_interleaved(false);
        assert_eq!(format.to_string(), "44100 Hz, 2 ch, i16, non-interleaved");
    }
}
