//! Device enumeration and acquisition.

use crate::device::Device;
use crate::diagnostics::{
    DeviceReport, DiagnosticSink, SystemSummary, TracingSink, default_roles, probe_sample_rates,
};
use crate::native::{DeviceIndex, NativeDeviceInfo, NativeHost};
use crate::{Error, Result};
use std::collections::HashMap;
use std::sync::Arc;

/// Per-direction part of [`DeviceProperties`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DirectionProperties {
    /// Maximum channels in this direction, 0 if the device has none.
    pub max_channels: u16,
    /// Whether the device is the system default for this direction.
    pub is_default: bool,
}

/// Snapshot of a device taken at enumeration time.
///
/// Goes stale when the hardware set changes; enumerate again to refresh.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DeviceProperties {
    /// Device name.
    pub name: String,
    /// Host API name (ALSA, CoreAudio, WASAPI, ...).
    pub api_name: String,
    /// Default sample rate in Hz.
    pub default_sample_rate: f64,
    /// Input capabilities.
    pub input: DirectionProperties,
    /// Output capabilities.
    pub output: DirectionProperties,
}

impl DeviceProperties {
    fn from_native(
        index: DeviceIndex,
        info: &NativeDeviceInfo,
        default_input: Option<DeviceIndex>,
        default_output: Option<DeviceIndex>,
    ) -> Self {
        Self {
            name: info.name.clone(),
            api_name: info.host_api_name.clone(),
            default_sample_rate: info.default_sample_rate,
            input: DirectionProperties {
                max_channels: info.max_input_channels,
                is_default: default_input == Some(index),
            },
            output: DirectionProperties {
                max_channels: info.max_output_channels,
                is_default: default_output == Some(index),
            },
        }
    }

    /// Whether the device can play audio.
    pub fn is_output(&self) -> bool {
        self.output.max_channels > 0
    }

    /// Whether the device can record audio.
    pub fn is_input(&self) -> bool {
        self.input.max_channels > 0
    }
}

/// A device index paired with its last-known properties.
///
/// Plain data: pass it back to [`DeviceManager::acquire`] to get a live
/// [`Device`]. Holding an agent keeps nothing open.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct AcquisitionAgent {
    /// Position in the native device table.
    pub device_index: DeviceIndex,
    /// Properties captured when the agent was created.
    pub properties: DeviceProperties,
}

/// Enumeration behaviour.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ManagerOptions {
    /// Send a report for every device to the diagnostic sink while enumerating.
    pub diagnostics: bool,
    /// Include standard sample-rate probes in diagnostic reports.
    pub probe_sample_rates: bool,
}

impl Default for ManagerOptions {
    fn default() -> Self {
        Self {
            diagnostics: false,
            probe_sample_rates: true,
        }
    }
}

impl ManagerOptions {
    /// Options with diagnostics switched on.
    pub fn verbose() -> Self {
        Self {
            diagnostics: true,
            ..Self::default()
        }
    }
}

/// Owner of the native audio subsystem and entry point for device access.
///
/// The subsystem is held behind an `Arc`: devices and streams created through
/// the manager share it, so it is torn down only after the last of them is
/// dropped. Acquired devices are cached per index and shared between callers;
/// [`enumerate`](Self::enumerate) clears the cache.
pub struct DeviceManager<H: NativeHost> {
    host: Arc<H>,
    options: ManagerOptions,
    sink: Box<dyn DiagnosticSink>,
    agents: Vec<AcquisitionAgent>,
    devices: HashMap<DeviceIndex, Arc<Device<H>>>,
}

impl<H: NativeHost> DeviceManager<H> {
    /// Manager over an initialised native subsystem, diagnostics off.
    pub fn new(host: H) -> Self {
        Self::with_options(host, ManagerOptions::default())
    }

    /// Manager with explicit options, reporting to a [`TracingSink`].
    pub fn with_options(host: H, options: ManagerOptions) -> Self {
        tracing::info!(
            backend = host.name(),
            version = %host.version_text(),
            "audio subsystem ready"
        );
        Self {
            host: Arc::new(host),
            options,
            sink: Box::new(TracingSink),
            agents: Vec::new(),
            devices: HashMap::new(),
        }
    }

    /// Replace the diagnostic sink.
    pub fn with_sink(mut self, sink: impl DiagnosticSink + 'static) -> Self {
        self.sink = Box::new(sink);
        self
    }

    /// The shared native subsystem.
    pub fn host(&self) -> &Arc<H> {
        &self.host
    }

    /// Enumeration options.
    pub fn options(&self) -> ManagerOptions {
        self.options
    }

    /// Snapshot every device in native enumeration order.
    ///
    /// Entry `i` describes device index `i`. Drops cached devices, so later
    /// acquisitions see the refreshed table. With diagnostics enabled, one
    /// report per device goes to the sink.
    pub fn enumerate(&mut self) -> Result<&[AcquisitionAgent]> {
        let count = self.host.device_count()?;
        let default_input = self.host.default_input_device();
        let default_output = self.host.default_output_device();

        // Read the whole table before reporting, so a failure leaves the sink
        // untouched.
        let infos = (0..count)
            .map(|index| self.host.device_info(index))
            .collect::<Result<Vec<_>>>()?;

        if self.options.diagnostics {
            self.sink.begin(&SystemSummary {
                backend: self.host.name().to_string(),
                version: self.host.version(),
                version_text: self.host.version_text(),
                device_count: count,
            });
        }

        let mut agents = Vec::with_capacity(count);
        for (index, info) in infos.into_iter().enumerate() {
            tracing::debug!(
                index,
                name = %info.name,
                host_api = %info.host_api_name,
                "enumerated device"
            );

            let properties =
                DeviceProperties::from_native(index, &info, default_input, default_output);

            if self.options.diagnostics {
                let probes = if self.options.probe_sample_rates {
                    probe_sample_rates(self.host.as_ref(), index, &info)
                } else {
                    Vec::new()
                };
                self.sink.device(&DeviceReport {
                    index,
                    roles: default_roles(index, &info, default_input, default_output),
                    probes,
                    info,
                });
            }

            agents.push(AcquisitionAgent {
                device_index: index,
                properties,
            });
        }

        if self.options.diagnostics {
            self.sink.end();
        }

        self.devices.clear();
        self.agents = agents;
        Ok(&self.agents)
    }

    /// Agents from the last [`enumerate`](Self::enumerate), empty before the
    /// first call.
    pub fn devices(&self) -> &[AcquisitionAgent] {
        &self.agents
    }

    /// Agent for the device the native library reports as default output now.
    pub fn default_output_device(&self) -> Result<AcquisitionAgent> {
        let index = self
            .host
            .default_output_device()
            .ok_or(Error::NoDefaultDevice)?;
        self.agent_for(index)
    }

    /// Shared device for `index`.
    ///
    /// The index is checked against the native device table at call time.
    /// Repeated calls return the same instance until the next enumeration.
    pub fn acquire_device(&mut self, index: DeviceIndex) -> Result<Arc<Device<H>>> {
        let count = self.host.device_count()?;
        if index >= count {
            return Err(Error::DeviceIndexOutOfRange { index, count });
        }

        if let Some(device) = self.devices.get(&index) {
            return Ok(Arc::clone(device));
        }

        let device = Arc::new(Device::new(Arc::clone(&self.host), index)?);
        tracing::debug!(index, name = device.name(), "acquired device");
        self.devices.insert(index, Arc::clone(&device));
        Ok(device)
    }

    /// Shared device for an agent from this manager.
    pub fn acquire(&mut self, agent: &AcquisitionAgent) -> Result<Arc<Device<H>>> {
        self.acquire_device(agent.device_index)
    }

    /// Find an output-capable device by index, exact name, or case-insensitive
    /// partial name.
    ///
    /// Searches the last enumeration, enumerating first if there is none. A
    /// partial name matching several devices picks the first and logs the rest.
    pub fn find_output_device(&mut self, query: &str) -> Result<AcquisitionAgent> {
        if self.agents.is_empty() {
            self.enumerate()?;
        }

        if let Ok(index) = query.parse::<DeviceIndex>() {
            return match self.agents.get(index) {
                Some(agent) if agent.properties.is_output() => Ok(agent.clone()),
                Some(agent) => Err(Error::DeviceNotFound(format!(
                    "device {index} ({}) has no output channels",
                    agent.properties.name
                ))),
                None => Err(Error::DeviceIndexOutOfRange {
                    index,
                    count: self.agents.len(),
                }),
            };
        }

        let outputs = self.agents.iter().filter(|a| a.properties.is_output());

        if let Some(agent) = outputs.clone().find(|a| a.properties.name == query) {
            return Ok(agent.clone());
        }

        let search = query.to_lowercase();
        let matches: Vec<&AcquisitionAgent> = outputs
            .filter(|a| a.properties.name.to_lowercase().contains(&search))
            .collect();

        match matches.as_slice() {
            [] => Err(Error::DeviceNotFound(format!(
                "no output device matching '{query}'"
            ))),
            [only] => Ok((*only).clone()),
            [first, ..] => {
                let names: Vec<&str> = matches.iter().map(|a| a.properties.name.as_str()).collect();
                tracing::warn!(
                    query,
                    matches = ?names,
                    using = %first.properties.name,
                    "device query is ambiguous"
                );
                Ok((*first).clone())
            }
        }
    }

    fn agent_for(&self, index: DeviceIndex) -> Result<AcquisitionAgent> {
        let info = self.host.device_info(index)?;
        Ok(AcquisitionAgent {
            device_index: index,
            properties: DeviceProperties::from_native(
                index,
                &info,
                self.host.default_input_device(),
                self.host.default_output_device(),
            ),
        })
    }
}

impl<H: NativeHost> std::fmt::Debug for DeviceManager<H> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeviceManager")
            .field("backend", &self.host.name())
            .field("options", &self.options)
            .field("devices", &self.agents.len())
            .field("cached", &self.devices.len())
            .finish_non_exhaustive()
    }
}
