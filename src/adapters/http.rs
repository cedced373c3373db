use crate::adapters::cache::{CacheKey, ResponseCache};
use crate::config::dcim_config::DcimConfig;
use crate::core::rack::render_rack;
use crate::domain::model::{
    Cabinet, DataCenter, Device, DeviceTemplate, Location, Manufacturer, ModelInfo,
};
use crate::domain::ports::Inventory;
use crate::utils::error::{DcimError, Result};
use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashSet;
use std::sync::Arc;

const DEVICE_PATH: &str = "api/v1/device";
const CABINET_PATH: &str = "api/v1/cabinet";
const DATACENTER_PATH: &str = "api/v1/datacenter";
const TEMPLATE_PATH: &str = "api/v1/devicetemplate";
const MANUFACTURER_PATH: &str = "api/v1/manufacturer";

/// OpenDCIM REST client. One instance keeps one connection pool.
pub struct DcimClient {
    client: Client,
    baseurl: String,
    username: String,
    password: String,
    cache: Option<Arc<ResponseCache>>,
}

impl DcimClient {
    pub fn new(config: &DcimConfig, cache: Option<Arc<ResponseCache>>) -> Result<Self> {
        if !config.ssl_verify() {
            tracing::warn!("⚠️ TLS certificate verification is disabled for {}", config.baseurl());
        }

        let client = Client::builder()
            .danger_accept_invalid_certs(!config.ssl_verify())
            .timeout(config.timeout())
            .build()?;

        Ok(Self {
            client,
            baseurl: config.baseurl().to_string(),
            username: config.dcim.username.clone(),
            password: config.dcim.password.clone(),
            cache,
        })
    }

    pub fn cache(&self) -> Option<&Arc<ResponseCache>> {
        self.cache.as_ref()
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.baseurl, path.trim_start_matches('/'))
    }

    async fn get(&self, path: &str, params: &[(&str, &str)]) -> Result<Value> {
        let key = CacheKey::new("GET", path, params);
        if let Some(value) = self.cache.as_ref().and_then(|c| c.get(&key)) {
            tracing::debug!("Cache hit: GET {} {:?}", path, params);
            return Ok(value);
        }

        tracing::debug!("GET {} {:?}", path, params);
        let response = self
            .client
            .get(self.url(path))
            .basic_auth(&self.username, Some(&self.password))
            .query(params)
            .send()
            .await?;
        let value = Self::decode(path, response).await?;

        if let Some(cache) = &self.cache {
            cache.insert(key, value.clone());
        }
        Ok(value)
    }

    async fn post(&self, path: &str, body: &Value) -> Result<Value> {
        tracing::debug!("POST {}", path);
        let response = self
            .client
            .post(self.url(path))
            .basic_auth(&self.username, Some(&self.password))
            .json(body)
            .send()
            .await?;

        // 任何寫入後快取內容都可能過時
        if let Some(cache) = &self.cache {
            cache.clear();
        }
        Self::decode(path, response).await
    }

    async fn decode(path: &str, response: Response) -> Result<Value> {
        let status = response.status();
        tracing::debug!("Response status for {}: {}", path, status);

        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(DcimError::Authentication);
        }
        if !status.is_success() {
            return Err(DcimError::HttpStatus {
                status: status.as_u16(),
                path: path.to_string(),
            });
        }

        let value: Value = response.json().await?;
        if value.get("error").and_then(Value::as_bool) == Some(true) {
            let message = value
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or("request failed");
            return Err(DcimError::Api {
                message: format!("{}: {}", path, message),
            });
        }
        Ok(value)
    }

    pub async fn device_by_label(&self, label: &str) -> Result<Device> {
        let value = self.get(DEVICE_PATH, &[("Label", label)]).await?;
        records::<Device>(&value, "device", DEVICE_PATH)?
            .into_iter()
            .next()
            .ok_or_else(|| DcimError::not_found(format!("Device label {}", label)))
    }

    pub async fn device_by_id(&self, id: u64) -> Result<Device> {
        let path = format!("{}/{}", DEVICE_PATH, id);
        let value = self.get(&path, &[]).await?;
        single(&value, "device", &path, || format!("Device {}", id))
    }

    pub async fn devices_in_cabinet(&self, cabinet_id: u64) -> Result<Vec<Device>> {
        let id = cabinet_id.to_string();
        let value = self.get(DEVICE_PATH, &[("Cabinet", &id)]).await?;
        records(&value, "device", DEVICE_PATH)
    }

    pub async fn cabinet_by_id(&self, id: u64) -> Result<Cabinet> {
        let path = format!("{}/{}", CABINET_PATH, id);
        let value = self.get(&path, &[]).await?;
        single(&value, "cabinet", &path, || format!("Cabinet {}", id))
    }

    pub async fn cabinet_by_location(&self, location: &str) -> Result<Cabinet> {
        let value = self.get(CABINET_PATH, &[("Location", location)]).await?;
        single(&value, "cabinet", CABINET_PATH, || format!("Cabinet {}", location))
    }

    pub async fn datacenter_by_id(&self, id: u64) -> Result<DataCenter> {
        let path = format!("{}/{}", DATACENTER_PATH, id);
        let value = self.get(&path, &[]).await?;
        single(&value, "datacenter", &path, || format!("Datacenter {}", id))
    }

    pub async fn template_by_id(&self, id: u64) -> Result<DeviceTemplate> {
        let path = format!("{}/{}", TEMPLATE_PATH, id);
        let value = self.get(&path, &[]).await?;
        single(&value, "template", &path, || format!("Device template {}", id))
    }

    pub async fn manufacturers(&self) -> Result<Vec<Manufacturer>> {
        let value = self.get(MANUFACTURER_PATH, &[]).await?;
        records(&value, "manufacturer", MANUFACTURER_PATH)
    }

    /// Datacenter, cabinet and position of a device.
    ///
    /// Devices inside a chassis report the position of the outermost
    /// enclosing device; the chassis labels are listed innermost first.
    /// When several devices share a label the first one is located.
    pub async fn locate(&self, label: &str) -> Result<Location> {
        let mut outer = self.device_by_label(label).await?;
        let mut parent_devices = Vec::new();
        let mut visited = HashSet::from([outer.id]);

        while !outer.is_top_level() {
            if !visited.insert(outer.parent_device) {
                return Err(DcimError::unexpected_response(
                    DEVICE_PATH,
                    format!("parent device loop at device {}", outer.parent_device),
                ));
            }
            let parent = self.device_by_id(outer.parent_device).await?;
            parent_devices.push(parent.label.clone());
            outer = parent;
        }

        let cabinet = self.cabinet_by_id(outer.cabinet).await?;
        let datacenter = self.datacenter_by_id(cabinet.datacenter_id).await?;

        Ok(Location {
            datacenter: datacenter.name,
            cabinet: cabinet.location,
            position: outer.position,
            parent_devices,
        })
    }

    /// Make and model from the device template, plus the serial number.
    pub async fn model(&self, label: &str) -> Result<ModelInfo> {
        let device = self.device_by_label(label).await?;
        if device.template_id == 0 {
            return Ok(ModelInfo {
                make: None,
                model: None,
                serial: device.serial_no,
            });
        }

        let template = self.template_by_id(device.template_id).await?;
        let make = self
            .manufacturers()
            .await?
            .into_iter()
            .find(|m| m.id == template.manufacturer_id)
            .map(|m| m.name);

        Ok(ModelInfo {
            make,
            model: Some(template.model),
            serial: device.serial_no,
        })
    }

    /// Rack elevation diagram of the cabinet at `location`.
    pub async fn showrack(&self, location: &str, width: usize) -> Result<Vec<String>> {
        let cabinet = self.cabinet_by_location(location).await?;
        let devices = self.devices_in_cabinet(cabinet.id).await?;
        Ok(render_rack(&cabinet, &devices, width))
    }
}

#[async_trait]
impl Inventory for DcimClient {
    async fn all_devices(&self) -> Result<Vec<Device>> {
        let value = self.get(DEVICE_PATH, &[]).await?;
        records(&value, "device", DEVICE_PATH)
    }

    async fn update_device(&self, id: u64, fields: Value) -> Result<()> {
        let path = format!("{}/{}", DEVICE_PATH, id);
        self.post(&path, &fields).await?;
        Ok(())
    }
}

/// OpenDCIM wraps results in `{"<field>": [...]}`, or `{"<field>": {...}}`
/// for single-record endpoints.
fn records<T: DeserializeOwned>(value: &Value, field: &str, path: &str) -> Result<Vec<T>> {
    match value.get(field) {
        Some(Value::Array(items)) => items
            .iter()
            .map(|item| T::deserialize(item).map_err(DcimError::from))
            .collect(),
        Some(object @ Value::Object(_)) => Ok(vec![T::deserialize(object)?]),
        _ => Err(DcimError::unexpected_response(
            path,
            format!("missing '{}' field", field),
        )),
    }
}

fn single<T: DeserializeOwned>(
    value: &Value,
    field: &str,
    path: &str,
    what: impl FnOnce() -> String,
) -> Result<T> {
    records(value, field, path)?
        .into_iter()
        .next()
        .ok_or_else(|| DcimError::not_found(what()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_records_from_array_and_object() {
        let list = json!({"device": [{"DeviceID": 1, "Label": "a"}, {"DeviceID": 2, "Label": "b"}]});
        let devices: Vec<Device> = records(&list, "device", DEVICE_PATH).unwrap();
        assert_eq!(devices.len(), 2);

        let one = json!({"device": {"DeviceID": "3", "Label": "c"}});
        let devices: Vec<Device> = records(&one, "device", DEVICE_PATH).unwrap();
        assert_eq!(devices[0].id, 3);
    }

    #[test]
    fn test_records_missing_field() {
        let value = json!({"error": false, "errorcode": 200});
        let result: Result<Vec<Device>> = records(&value, "device", DEVICE_PATH);
        assert!(matches!(result, Err(DcimError::Api { .. })));
    }

    #[test]
    fn test_single_empty_list_is_not_found() {
        let value = json!({"cabinet": []});
        let result: Result<Cabinet> = single(&value, "cabinet", CABINET_PATH, || "Cabinet B07".into());
        match result {
            Err(DcimError::NotFound { what }) => assert_eq!(what, "Cabinet B07"),
            other => panic!("unexpected result: {:?}", other),
        }
    }
}
