//! Enumeration records for HID devices

use serde::{Deserialize, Serialize};

/// One enumerated HID device, as supplied to device selection.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HidDeviceInfo {
    pub vendor_id: u16,
    pub product_id: u16,
    pub path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub serial_number: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub manufacturer: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub product_name: Option<String>,
}

impl HidDeviceInfo {
    pub fn new(vendor_id: u16, product_id: u16, path: impl Into<String>) -> Self {
        Self {
            vendor_id,
            product_id,
            path: path.into(),
            serial_number: None,
            manufacturer: None,
            product_name: None,
        }
    }

    /// Product string, then manufacturer, then `vvvv:pppp`.
    pub fn display_name(&self) -> String {
        self.product_name
            .clone()
            .or_else(|| self.manufacturer.clone())
            .unwrap_or_else(|| format!("{:04x}:{:04x}", self.vendor_id, self.product_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_name_falls_back_to_ids() {
        let bare = HidDeviceInfo::new(0x0fd9, 0x0063, "/dev/hidraw0");
        assert_eq!(bare.display_name(), "0fd9:0063");

        let branded = HidDeviceInfo {
            manufacturer: Some("Elgato".to_string()),
            ..bare.clone()
        };
        assert_eq!(branded.display_name(), "Elgato");

        let named = HidDeviceInfo {
            product_name: Some("Stream Deck Mini".to_string()),
            ..branded
        };
        assert_eq!(named.display_name(), "Stream Deck Mini");
    }

    #[test]
    fn test_device_info_wire_field_names() -> Result<(), serde_json::Error> {
        let info = HidDeviceInfo {
            serial_number: Some("AL12K1A01234".to_string()),
            ..HidDeviceInfo::new(0x0fd9, 0x0060, "/dev/hidraw1")
        };
        let json = serde_json::to_value(&info)?;
        assert_eq!(json["vendorId"], 0x0fd9);
        assert_eq!(json["productId"], 0x0060);
        assert_eq!(json["path"], "/dev/hidraw1");
        assert_eq!(json["serialNumber"], "AL12K1A01234");
        assert!(json.get("productName").is_none());
        Ok(())
    }
}
