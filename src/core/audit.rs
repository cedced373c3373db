//! Audits compare the OpenDCIM database as a whole against a policy or an
//! outside source of truth and produce an [`AuditReport`].

use crate::core::dhcp::DhcpConfig;
use crate::core::label::{is_valid_label, normalize, policy_label};
use crate::domain::model::{AuditReport, Device};
use crate::domain::ports::Inventory;
use crate::utils::error::Result;
use std::collections::{BTreeMap, HashMap};
use std::net::IpAddr;

/// Every device label must follow the label policy (`a-z`, `0-9`, single
/// inner `-`) and be unique.
pub struct LabelAudit<'a, I: Inventory> {
    inventory: &'a I,
}

impl<'a, I: Inventory> LabelAudit<'a, I> {
    pub fn new(inventory: &'a I) -> Self {
        Self { inventory }
    }

    /// With `repair`, invalid labels are rewritten in OpenDCIM when possible.
    pub async fn perform(&self, repair: bool) -> Result<AuditReport> {
        let devices = self.inventory.all_devices().await?;
        tracing::debug!("Auditing labels of {} devices", devices.len());

        let mut errors = Vec::new();
        let mut repairs = Vec::new();
        let mut found: BTreeMap<String, Vec<u64>> = BTreeMap::new();

        for device in &devices {
            let label = &device.label;

            if is_valid_label(label) {
                found.entry(label.clone()).or_default().push(device.id);
                continue;
            }

            if !repair {
                found.entry(label.clone()).or_default().push(device.id);
                errors.push(format!("Invalid label \"{}\" for device {}", label, device.id));
                continue;
            }

            match policy_label(label) {
                Ok(new_label) => {
                    self.inventory
                        .update_device(device.id, serde_json::json!({ "Label": new_label }))
                        .await?;
                    tracing::info!("🔧 Relabelled device {}: {} -> {}", device.id, label, new_label);
                    repairs.push(format!(
                        "Modified device label for {}, \"{}\" --> \"{}\"",
                        device.id, label, new_label
                    ));
                    found.entry(new_label).or_default().push(device.id);
                }
                Err(_) => {
                    found.entry(label.clone()).or_default().push(device.id);
                    errors.push(format!(
                        "Invalid and uncorrectable label \"{}\" for device {}",
                        label, device.id
                    ));
                }
            }
        }

        for (label, ids) in &found {
            if ids.len() > 1 {
                errors.push(format!(
                    "Duplicate label \"{}\" for device IDs: {:?}",
                    label, ids
                ));
            }
        }

        Ok(AuditReport::new(errors, repairs, Vec::new()))
    }
}

/// Cross-check the host declarations of a DHCP config against inventory.
pub struct DhcpAudit<'a, I: Inventory> {
    inventory: &'a I,
}

impl<'a, I: Inventory> DhcpAudit<'a, I> {
    pub fn new(inventory: &'a I) -> Self {
        Self { inventory }
    }

    pub async fn perform(&self, config: &DhcpConfig) -> Result<AuditReport> {
        let devices = self.inventory.all_devices().await?;
        let hosts = config.hosts();
        tracing::debug!(
            "Auditing {} DHCP hosts against {} devices",
            hosts.len(),
            devices.len()
        );

        let warnings: Vec<String> = config
            .all_warnings()
            .iter()
            .map(|w| format!("line {}: {}", w.line, w.message))
            .collect();

        // 以正規化後的標籤建立索引，FQDN 標籤另以短名索引
        let mut by_label: HashMap<String, Vec<&Device>> = HashMap::new();
        for device in &devices {
            let Ok(full) = normalize(&device.label) else {
                continue;
            };
            if let Ok(short) = normalize(short_name(&device.label)) {
                if short.canonical != full.canonical {
                    by_label.entry(short.canonical).or_default().push(device);
                }
            }
            by_label.entry(full.canonical).or_default().push(device);
        }

        let mut errors = Vec::new();
        let mut macs: BTreeMap<&str, Vec<&str>> = BTreeMap::new();

        for host in &hosts {
            if let Some(mac) = host.mac_address.as_deref() {
                macs.entry(mac).or_default().push(host.hostname.as_str());
            }

            let Ok(short) = normalize(short_name(&host.hostname)) else {
                errors.push(format!(
                    "DHCP host without a usable name (MAC {})",
                    host.mac_address.as_deref().unwrap_or("unknown")
                ));
                continue;
            };

            let matches = normalize(&host.hostname)
                .ok()
                .and_then(|full| by_label.get(&full.canonical))
                .or_else(|| by_label.get(&short.canonical));
            let Some(matches) = matches else {
                errors.push(format!(
                    "DHCP host \"{}\" has no matching device in OpenDCIM",
                    host.hostname
                ));
                continue;
            };

            let Some(fixed) = host
                .fixed_address
                .as_deref()
                .and_then(|a| a.parse::<IpAddr>().ok())
            else {
                continue;
            };
            for device in matches {
                if let Ok(primary) = device.primary_ip.parse::<IpAddr>() {
                    if primary != fixed {
                        errors.push(format!(
                            "DHCP host \"{}\" has fixed-address {} but device {} (\"{}\") has PrimaryIP {}",
                            host.hostname, fixed, device.id, device.label, primary
                        ));
                    }
                }
            }
        }

        for (mac, names) in &macs {
            if names.len() > 1 {
                errors.push(format!(
                    "Duplicate MAC address {} for DHCP hosts: {}",
                    mac,
                    names.join(", ")
                ));
            }
        }

        Ok(AuditReport::new(errors, Vec::new(), warnings))
    }
}

/// Host part of a fully qualified name.
fn short_name(name: &str) -> &str {
    name.split('.').next().unwrap_or(name)
}
