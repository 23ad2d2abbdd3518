//! Format support check.

use super::common::{FormatArgs, manager_options, select_output_device};
use clap::Args;
use pabridge_config::BridgeConfig;
use pabridge_io::{DeviceManager, NativeHost, translate_stream_format};

#[derive(Args, Debug)]
pub struct CheckArgs {
    /// Output device index or (partial) name
    #[arg(short, long)]
    device: Option<String>,

    #[command(flatten)]
    format: FormatArgs,
}

pub fn run<H: NativeHost>(host: H, args: CheckArgs, config: &BridgeConfig) -> anyhow::Result<()> {
    let format = args.format.resolve(&config.output);
    let mut manager = DeviceManager::with_options(host, manager_options(config, false));
    let agent = select_output_device(&mut manager, args.device.as_deref(), config)?;
    let device = manager.acquire(&agent)?;

    println!("Device:  [{}] {}", device.index(), device.name());
    println!("Format:  {format}");

    match translate_stream_format(&format) {
        Ok(native) => println!(
            "Native:  {} channel(s), sample format {:#010x}",
            native.channel_count,
            native.sample_format.bits()
        ),
        Err(e) => println!("Native:  not translatable ({e})"),
    }

    if device.supports_output_format(&format) {
        println!("Result:  supported");
        Ok(())
    } else {
        println!("Result:  not supported");
        anyhow::bail!("{} cannot play {format}", device.name())
    }
}
