use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// OpenDCIM sends ids and sizes as numbers or as strings depending on the
/// endpoint (`"CabinetID": "1"` next to `"DeviceID": 1`).
mod lenient {
    use serde::{de, Deserialize, Deserializer};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum NumberOrString {
        Number(u64),
        String(String),
    }

    pub fn u64<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u64, D::Error> {
        match NumberOrString::deserialize(deserializer)? {
            NumberOrString::Number(n) => Ok(n),
            NumberOrString::String(s) if s.trim().is_empty() => Ok(0),
            NumberOrString::String(s) => s.trim().parse().map_err(de::Error::custom),
        }
    }

    pub fn string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
        Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Device {
    #[serde(rename = "DeviceID", deserialize_with = "lenient::u64")]
    pub id: u64,
    #[serde(rename = "Label", default, deserialize_with = "lenient::string")]
    pub label: String,
    #[serde(rename = "Cabinet", default, deserialize_with = "lenient::u64")]
    pub cabinet: u64,
    #[serde(rename = "Position", default, deserialize_with = "lenient::u64")]
    pub position: u64,
    #[serde(rename = "Height", default, deserialize_with = "lenient::u64")]
    pub height: u64,
    #[serde(rename = "ParentDevice", default, deserialize_with = "lenient::u64")]
    pub parent_device: u64,
    #[serde(rename = "TemplateID", default, deserialize_with = "lenient::u64")]
    pub template_id: u64,
    #[serde(rename = "SerialNo", default, deserialize_with = "lenient::string")]
    pub serial_no: String,
    #[serde(rename = "PrimaryIP", default, deserialize_with = "lenient::string")]
    pub primary_ip: String,
    #[serde(rename = "DeviceType", default, deserialize_with = "lenient::string")]
    pub device_type: String,
}

impl Device {
    /// 直接裝在機櫃上（不在 chassis 內）
    pub fn is_top_level(&self) -> bool {
        self.parent_device == 0
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Cabinet {
    #[serde(rename = "CabinetID", deserialize_with = "lenient::u64")]
    pub id: u64,
    #[serde(rename = "DataCenterID", default, deserialize_with = "lenient::u64")]
    pub datacenter_id: u64,
    #[serde(rename = "Location", default, deserialize_with = "lenient::string")]
    pub location: String,
    #[serde(rename = "CabinetHeight", default, deserialize_with = "lenient::u64")]
    pub height: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DataCenter {
    #[serde(rename = "DataCenterID", deserialize_with = "lenient::u64")]
    pub id: u64,
    #[serde(rename = "Name", default, deserialize_with = "lenient::string")]
    pub name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DeviceTemplate {
    #[serde(rename = "TemplateID", deserialize_with = "lenient::u64")]
    pub id: u64,
    #[serde(rename = "Model", default, deserialize_with = "lenient::string")]
    pub model: String,
    #[serde(rename = "ManufacturerID", default, deserialize_with = "lenient::u64")]
    pub manufacturer_id: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Manufacturer {
    #[serde(rename = "ManufacturerID", deserialize_with = "lenient::u64")]
    pub id: u64,
    #[serde(rename = "Name", default, deserialize_with = "lenient::string")]
    pub name: String,
}

/// Physical location of a device, as printed by `dcim locate`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Location {
    pub datacenter: String,
    pub cabinet: String,
    pub position: u64,
    /// Enclosing chassis labels, innermost first.
    pub parent_devices: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ModelInfo {
    pub make: Option<String>,
    pub model: Option<String>,
    pub serial: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum AuditResult {
    #[serde(rename = "OK")]
    Ok,
    Repaired,
    Error,
}

#[derive(Debug, Clone, Serialize)]
pub struct AuditReport {
    pub result: AuditResult,
    pub errors: Vec<String>,
    pub repairs: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
    pub generated_at: DateTime<Utc>,
}

impl AuditReport {
    pub fn new(errors: Vec<String>, repairs: Vec<String>, warnings: Vec<String>) -> Self {
        let result = if errors.is_empty() && repairs.is_empty() {
            AuditResult::Ok
        } else if errors.is_empty() {
            AuditResult::Repaired
        } else {
            AuditResult::Error
        };

        Self {
            result,
            errors,
            repairs,
            warnings,
            generated_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_device_accepts_numbers_and_strings() {
        let device: Device = serde_json::from_value(serde_json::json!({
            "DeviceID": "4",
            "Label": "node103",
            "Cabinet": 1,
            "Position": "1",
            "Height": 1,
            "ParentDevice": "3",
            "TemplateID": 3,
            "SerialNo": null,
            "PrimaryIP": "192.168.0.1",
            "Notes": "ignored"
        }))
        .unwrap();

        assert_eq!(device.id, 4);
        assert_eq!(device.parent_device, 3);
        assert_eq!(device.position, 1);
        assert_eq!(device.serial_no, "");
        assert_eq!(device.device_type, "");
        assert!(!device.is_top_level());
    }

    #[test]
    fn test_cabinet_from_string_fields() {
        let cabinet: Cabinet = serde_json::from_value(serde_json::json!({
            "CabinetID": "1",
            "DataCenterID": "1",
            "Location": "A01",
            "CabinetHeight": "10",
            "MaxKW": "0"
        }))
        .unwrap();

        assert_eq!(cabinet.id, 1);
        assert_eq!(cabinet.height, 10);
        assert_eq!(cabinet.location, "A01");
    }

    #[test]
    fn test_bad_number_is_rejected() {
        let result: std::result::Result<Device, _> =
            serde_json::from_value(serde_json::json!({ "DeviceID": "four" }));
        assert!(result.is_err());
    }

    #[test]
    fn test_audit_result() {
        let ok = AuditReport::new(vec![], vec![], vec!["line 3: noise".to_string()]);
        assert_eq!(ok.result, AuditResult::Ok);

        let repaired = AuditReport::new(vec![], vec!["fixed".to_string()], vec![]);
        assert_eq!(repaired.result, AuditResult::Repaired);

        let error = AuditReport::new(vec!["bad".to_string()], vec!["fixed".to_string()], vec![]);
        assert_eq!(error.result, AuditResult::Error);

        let json = serde_json::to_value(&ok).unwrap();
        assert_eq!(json["result"], "OK");
        assert!(json.get("warnings").is_some());
        let json = serde_json::to_value(&repaired).unwrap();
        assert!(json.get("warnings").is_none());
    }
}
