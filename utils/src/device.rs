use anyhow::Context;
use cpal::Device;
use cpal::traits::{DeviceTrait, HostTrait};

fn get_host() -> cpal::Host {
    cpal::default_host()
}

/// Finds the input device called `device_name`, or the host default when none is given.
pub fn get_or_default_input(device_name: Option<&str>) -> anyhow::Result<Device> {
    let host = get_host();
    tracing::debug!("Host: {:?}", host.id());
    match device_name {
        None => host.default_input_device().context("No default input device"),
        Some(target) => host
            .input_devices()?
            .find(|device| device.name().is_ok_and(|name| name == target))
            .with_context(|| format!("No input device named {target:?}")),
    }
}

/// Finds the output device called `device_name`, or the host default when none is given.
pub fn get_or_default_output(device_name: Option<&str>) -> anyhow::Result<Device> {
    let host = get_host();
    tracing::debug!("Host: {:?}", host.id());
    match device_name {
        None => host.default_output_device().context("No default output device"),
        Some(target) => host
            .output_devices()?
            .find(|device| device.name().is_ok_and(|name| name == target))
            .with_context(|| format!("No output device named {target:?}")),
    }
}

pub fn get_available_inputs() -> anyhow::Result<String> {
    for host in cpal::available_hosts() {
        tracing::debug!("Available host: {:?}", host);
    }

    let host = get_host();
    let default_device = host.default_input_device().and_then(|d| d.name().ok());
    let mut device_names: Vec<String> = Vec::new();
    for in_device in host.input_devices()? {
        let Ok(d_name) = in_device.name() else { continue };
        let d = match in_device.default_input_config() {
            Ok(d_cfg) => format!(" * {}({}ch, {}hz)", d_name, d_cfg.channels(), d_cfg.sample_rate().0),
            Err(_) => format!(" * {}(no default config)", d_name),
        };
        device_names.push(mark_default(d, &d_name, default_device.as_deref()));
    }
    Ok(device_names.join("\n"))
}

pub fn get_available_outputs() -> anyhow::Result<String> {
    let host = get_host();
    let default_device = host.default_output_device().and_then(|d| d.name().ok());
    let mut device_names: Vec<String> = Vec::new();
    for out_device in host.output_devices()? {
        let Ok(d_name) = out_device.name() else { continue };
        let d = match out_device.default_output_config() {
            Ok(d_cfg) => format!(" * {}({}ch, {}hz)", d_name, d_cfg.channels(), d_cfg.sample_rate().0),
            Err(_) => format!(" * {}(no default config)", d_name),
        };
        device_names.push(mark_default(d, &d_name, default_device.as_deref()));
    }
    Ok(device_names.join("\n"))
}

fn mark_default(mut line: String, name: &str, default_device: Option<&str>) -> String {
    if default_device == Some(name) {
        line.push_str(" [default]");
    }
    line
}
