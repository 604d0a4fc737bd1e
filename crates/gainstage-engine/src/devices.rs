use anyhow::Result;
use cpal::traits::{DeviceTrait, HostTrait};

#[derive(Debug, Clone)]
pub struct DeviceInfo {
    pub name: String,
    /// (channels, sample rate) of the default input config, if the device records.
    pub input: Option<(u16, u32)>,
    /// (channels, sample rate) of the default output config, if the device plays.
    pub output: Option<(u16, u32)>,
    pub is_default_input: bool,
    pub is_default_output: bool,
}

pub fn list_devices() -> Result<Vec<DeviceInfo>> {
    let host = cpal::default_host();

    let default_in = host.default_input_device().and_then(|d| d.name().ok());
    let default_out = host.default_output_device().and_then(|d| d.name().ok());

    let mut out = Vec::new();
    for dev in host.devices()? {
        let name = dev.name().unwrap_or_else(|_| "<unknown>".to_string());
        let input = dev
            .default_input_config()
            .ok()
            .map(|c| (c.channels(), c.sample_rate().0));
        let output = dev
            .default_output_config()
            .ok()
            .map(|c| (c.channels(), c.sample_rate().0));
        out.push(DeviceInfo {
            is_default_input: default_in.as_deref() == Some(name.as_str()),
            is_default_output: default_out.as_deref() == Some(name.as_str()),
            name,
            input,
            output,
        });
    }
    Ok(out)
}

/// One line per device: index, default markers, name and default configs.
pub fn format_devices(list: &[DeviceInfo]) -> String {
    if list.is_empty() {
        return "(no devices found)\n".to_string();
    }

    let mut text = String::new();
    for (i, d) in list.iter().enumerate() {
        let marks = match (d.is_default_input, d.is_default_output) {
            (true, true) => "[*I *O] ",
            (true, false) => "[*I] ",
            (false, true) => "[*O] ",
            (false, false) => "",
        };
        let io = [("in", d.input), ("out", d.output)]
            .into_iter()
            .filter_map(|(label, cfg)| cfg.map(|(ch, sr)| format!("{label} {ch}ch@{sr}")))
            .collect::<Vec<_>>()
            .join(", ");
        text.push_str(&format!("{i:>2}  {marks}{}  ({io})\n", d.name));
    }
    text
}

pub fn print_devices() -> Result<()> {
    print!("{}", format_devices(&list_devices()?));
    Ok(())
}

/// Pick a device by index (counting only devices with the wanted direction),
/// then by case-insensitive name substring, then fall back to the host default.
pub(crate) fn pick_device(
    host: &cpal::Host,
    want_input: bool,
    name_substr: Option<&str>,
    index: Option<usize>,
) -> Result<Option<cpal::Device>> {
    let capable = |dev: &cpal::Device| {
        if want_input {
            dev.default_input_config().is_ok()
        } else {
            dev.default_output_config().is_ok()
        }
    };

    if let Some(idx) = index {
        if let Some(dev) = host.devices()?.filter(|d| capable(d)).nth(idx) {
            return Ok(Some(dev));
        }
        log::warn!("no device at index {idx}, trying name/default");
    }

    if let Some(q) = name_substr {
        let q = q.to_lowercase();
        let found = host.devices()?.find(|d| {
            capable(d) && d.name().map(|n| n.to_lowercase().contains(&q)).unwrap_or(false)
        });
        if found.is_some() {
            return Ok(found);
        }
        log::warn!("no device matching `{q}`, using default");
    }

    Ok(if want_input { host.default_input_device() } else { host.default_output_device() })
}
