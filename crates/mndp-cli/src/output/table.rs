//! Table-formatted output for CLI.

use colored::*;
use comfy_table::{Cell, ContentArrangement, Table};

use mndp_core::Device;

use super::{format_uptime, OutputFormatter};

pub struct TableOutput;

impl TableOutput {
    pub fn new() -> Self {
        Self
    }
}

impl Default for TableOutput {
    fn default() -> Self {
        Self::new()
    }
}

impl OutputFormatter for TableOutput {
    fn format_devices(&self, devices: &[Device]) -> String {
        if devices.is_empty() {
            return "No devices found.".to_string();
        }

        let mut table = Table::new();
        table.set_content_arrangement(ContentArrangement::Dynamic);
        table.set_header(vec![
            "IP", "Identity", "MAC", "Platform", "Version", "Board", "Uptime",
        ]);

        for device in devices {
            let mac = device
                .mac
                .as_ref()
                .map(|m| m.to_string())
                .unwrap_or_default();

            table.add_row(vec![
                Cell::new(&device.ip),
                Cell::new(&device.identity),
                Cell::new(mac),
                Cell::new(&device.platform),
                Cell::new(&device.version),
                Cell::new(&device.board),
                Cell::new(format_uptime(device.uptime)),
            ]);
        }

        format!("{}\n\nFound {} device(s)", table, devices.len())
    }

    fn format_device(&self, device: &Device) -> String {
        let ts = chrono::Local::now().format("%H:%M:%S");
        let mac = device
            .mac
            .as_ref()
            .map(|m| m.to_string())
            .unwrap_or_else(|| "-".to_string());

        format!(
            "[{}] {:<16} {:<20} {:<18} {:<12} up {}",
            ts,
            device.ip.cyan(),
            device.identity.bold(),
            mac.dimmed(),
            device.board,
            format_uptime(device.uptime)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mndp_core::MacAddr;
    use std::time::Duration;

    fn sample_device() -> Device {
        let mut device = Device::new("192.168.88.1".to_string());
        device.identity = "office-gw".to_string();
        device.mac = Some(MacAddr::new(vec![0, 0x0C, 0x42, 1, 2, 3]));
        device.platform = "MikroTik".to_string();
        device.version = "7.14.2".to_string();
        device.board = "RB4011iGS+".to_string();
        device.uptime = Duration::from_secs(60);
        device
    }

    #[test]
    fn empty_list_has_message() {
        let out = TableOutput::new().format_devices(&[]);
        assert_eq!(out, "No devices found.");
    }

    #[test]
    fn table_contains_device_fields() {
        let out = TableOutput::new().format_devices(&[sample_device()]);
        assert!(out.contains("192.168.88.1"));
        assert!(out.contains("office-gw"));
        assert!(out.contains("00:0C:42:01:02:03"));
        assert!(out.contains("1m 0s"));
        assert!(out.contains("Found 1 device(s)"));
    }
}
