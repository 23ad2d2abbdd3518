//! Audio device listing and inspection.

use super::common::{manager_options, select_output_device};
use clap::{Args, Subcommand};
use pabridge_config::BridgeConfig;
use pabridge_io::diagnostics::{self, DeviceReport, DiagnosticSink, SystemSummary};
use pabridge_io::{AcquisitionAgent, DeviceManager, NativeHost};

#[derive(Args)]
pub struct DevicesArgs {
    #[command(subcommand)]
    command: Option<DevicesCommand>,
}

#[derive(Subcommand)]
enum DevicesCommand {
    /// List all devices in the native device table
    List {
        /// Print the device list as JSON
        #[arg(long)]
        json: bool,

        /// Print the full enumeration report, including supported sample rates
        #[arg(long, conflicts_with = "json")]
        verbose: bool,
    },

    /// Show details of one output device (default: the configured or system default)
    Info {
        /// Device index or (partial) name
        device: Option<String>,
    },
}

pub fn run<H: NativeHost>(host: H, args: DevicesArgs, config: &BridgeConfig) -> anyhow::Result<()> {
    match args.command.unwrap_or(DevicesCommand::List {
        json: false,
        verbose: false,
    }) {
        DevicesCommand::List { json, verbose } => {
            let mut manager =
                DeviceManager::with_options(host, manager_options(config, verbose));
            if verbose {
                manager = manager.with_sink(PrintSink);
            }
            let agents = manager.enumerate()?;

            if json {
                println!("{}", serde_json::to_string_pretty(agents)?);
                return Ok(());
            }
            if verbose {
                return Ok(());
            }

            if agents.is_empty() {
                println!("No audio devices found.");
                return Ok(());
            }

            println!("Audio Devices");
            println!("=============\n");
            for agent in agents {
                println!("  {}", device_line(agent));
            }

            let outputs = agents.iter().filter(|a| a.properties.is_output()).count();
            println!();
            println!("Total: {} device(s), {} output(s)", agents.len(), outputs);
            println!();
            println!("Tip: Use device index or partial name with --device:");
            println!("  pabridge tone --device 1");
            println!("  pabridge check --device \"USB\" --channels 8");
        }

        DevicesCommand::Info { device } => {
            let mut manager = DeviceManager::with_options(host, manager_options(config, false));
            let agent = select_output_device(&mut manager, device.as_deref(), config)?;
            let device = manager.acquire(&agent)?;
            let info = device.info();

            println!("Device [{}]: {}", device.index(), device.name());
            println!("  Host API:           {}", info.host_api_name);
            println!("  Default rate:       {} Hz", info.default_sample_rate);
            println!(
                "  Channels:           {} in, {} out",
                info.max_input_channels, info.max_output_channels
            );
            println!(
                "  Low latency:        {:.1} ms in, {:.1} ms out",
                info.default_low_input_latency * 1000.0,
                info.default_low_output_latency * 1000.0
            );
            println!(
                "  High latency:       {:.1} ms in, {:.1} ms out",
                info.default_high_input_latency * 1000.0,
                info.default_high_output_latency * 1000.0
            );

            let probes =
                diagnostics::probe_sample_rates(manager.host().as_ref(), device.index(), info);
            if !probes.is_empty() {
                println!();
                println!("Standard sample rates:");
                for probe in &probes {
                    println!("  {probe}: {}", rate_list(&probe.supported));
                }
            }
        }
    }

    Ok(())
}

fn device_line(agent: &AcquisitionAgent) -> String {
    let p = &agent.properties;
    let mut line = format!(
        "[{}] {} ({}) in: {} out: {} {} Hz",
        agent.device_index,
        p.name,
        p.api_name,
        p.input.max_channels,
        p.output.max_channels,
        p.default_sample_rate
    );

    let defaults: Vec<&str> = [
        (p.input.is_default, "default input"),
        (p.output.is_default, "default output"),
    ]
    .into_iter()
    .filter_map(|(set, label)| set.then_some(label))
    .collect();
    if !defaults.is_empty() {
        line.push_str(&format!(" [{}]", defaults.join(", ")));
    }
    line
}

fn rate_list(rates: &[f64]) -> String {
    if rates.is_empty() {
        return "none".to_string();
    }
    rates
        .iter()
        .map(|r| format!("{r}"))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Writes the enumeration report to stdout.
struct PrintSink;

impl DiagnosticSink for PrintSink {
    fn begin(&mut self, summary: &SystemSummary) {
        println!("{} {} ({})", summary.backend, summary.version_text, summary.version);
        println!("Number of devices = {}", summary.device_count);
    }

    fn device(&mut self, report: &DeviceReport) {
        let info = &report.info;
        println!("--------------------------------------- device #{}", report.index);
        if let Some(label) = report.role_label() {
            println!("[ {label} ]");
        }
        println!("Name                        = {}", info.name);
        println!("Host API                    = {}", info.host_api_name);
        println!("Max inputs = {}, Max outputs = {}", info.max_input_channels, info.max_output_channels);
        println!("Default low input latency   = {:8.4}", info.default_low_input_latency);
        println!("Default low output latency  = {:8.4}", info.default_low_output_latency);
        println!("Default high input latency  = {:8.4}", info.default_high_input_latency);
        println!("Default high output latency = {:8.4}", info.default_high_output_latency);
        println!("Default sample rate         = {:8.2}", info.default_sample_rate);
        for probe in &report.probes {
            println!("Supported standard sample rates");
            println!(" for {probe} = {}", rate_list(&probe.supported));
        }
    }

    fn end(&mut self) {
        println!("----------------------------------------------");
    }
}
