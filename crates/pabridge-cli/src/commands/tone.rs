//! Sine test tone playback.

use super::common::{FormatArgs, Playback, ctrlc_flag, manager_options, select_output_device};
use clap::Args;
use pabridge_config::BridgeConfig;
use pabridge_core::{Continuation, OutputBuffers, OutputCallback};
use pabridge_io::DeviceManager;
use std::f64::consts::TAU;

#[derive(Args, Debug)]
pub struct ToneArgs {
    /// Output device index or (partial) name
    #[arg(short, long)]
    device: Option<String>,

    /// Tone frequency in Hz
    #[arg(long, default_value = "440")]
    frequency: f64,

    /// Duration in seconds
    #[arg(long, default_value = "2.0")]
    duration: f64,

    /// Output level in dB (0 dB is full scale)
    #[arg(long, default_value = "-12", allow_hyphen_values = true)]
    level_db: f64,

    /// Frames per callback when rendering offline
    #[arg(long, default_value = "512")]
    block: usize,

    #[command(flatten)]
    format: FormatArgs,
}

pub fn run<H: Playback>(host: H, args: ToneArgs, config: &BridgeConfig) -> anyhow::Result<()> {
    if args.block == 0 {
        anyhow::bail!("--block must be at least 1");
    }
    if !(args.duration.is_finite() && args.duration > 0.0) {
        anyhow::bail!("--duration must be a positive number of seconds");
    }

    let format = args.format.resolve(&config.output);
    let mut manager = DeviceManager::with_options(host, manager_options(config, false));
    let agent = select_output_device(&mut manager, args.device.as_deref(), config)?;
    let device = manager.acquire(&agent)?;

    let frames = (args.duration * format.sample_rate).round() as u64;
    let generator = ToneGenerator::new(
        args.frequency,
        db_to_linear(args.level_db),
        format.sample_rate,
        frames,
    );

    println!("Playing {} Hz on [{}] {}", args.frequency, device.index(), device.name());
    println!("  Format:   {format}");
    println!("  Duration: {:.2} s at {:.1} dB", args.duration, args.level_db);

    let mut stream = device.create_output_stream(&format, generator)?;
    let running = ctrlc_flag()?;

    stream.start()?;
    H::play(&mut stream, &running, args.block);
    stream.stop()?;

    let status = stream.check()?;
    println!(
        "Rendered {} frames in {} callbacks ({} underflows)",
        status.frames_rendered, status.callbacks, status.output_underflows
    );
    Ok(())
}

fn db_to_linear(db: f64) -> f32 {
    10f64.powf(db / 20.0) as f32
}

/// Sine oscillator writing the same signal to every channel.
///
/// Completes after a fixed number of frames, padding the final buffer with
/// silence.
#[derive(Debug)]
struct ToneGenerator {
    phase: f64,
    increment: f64,
    amplitude: f32,
    remaining: u64,
}

impl ToneGenerator {
    fn new(frequency: f64, amplitude: f32, sample_rate: f64, frames: u64) -> Self {
        Self {
            phase: 0.0,
            increment: TAU * frequency / sample_rate,
            amplitude,
            remaining: frames,
        }
    }

    fn next_sample(&mut self) -> f32 {
        let value = self.phase.sin() as f32 * self.amplitude;
        self.phase = (self.phase + self.increment) % TAU;
        value
    }
}

impl OutputCallback for ToneGenerator {
    fn fill(&mut self, buffers: &mut OutputBuffers<'_, '_>, frames: usize) -> Continuation {
        let format = buffers.sample_format();
        let size = format.bytes_per_sample();
        let channels = buffers.channel_count();
        let audible = usize::try_from(self.remaining).map_or(frames, |r| r.min(frames));

        buffers.fill_silence();

        if let Some(data) = buffers.interleaved_mut() {
            for frame in data.chunks_exact_mut(size * channels).take(audible) {
                let value = self.next_sample();
                for sample in frame.chunks_exact_mut(size) {
                    format.write_sample(value, sample);
                }
            }
        } else {
            let start_phase = self.phase;
            let mut end_phase = start_phase;
            for channel in buffers.channels_mut() {
                self.phase = start_phase;
                for sample in channel.chunks_exact_mut(size).take(audible) {
                    let value = self.next_sample();
                    format.write_sample(value, sample);
                }
                end_phase = self.phase;
            }
            self.phase = end_phase;
        }

        self.remaining -= audible as u64;
        if self.remaining == 0 {
            Continuation::Complete
        } else {
            Continuation::Continue
        }
    }
}
