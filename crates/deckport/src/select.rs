//! Picking supported panels out of an enumeration

use deckport_hid_common::HidDeviceInfo;
use hid_streamdeck_protocol::{DeckModel, VENDOR_ID_ELGATO};
use serde::{Deserialize, Serialize};

use crate::error::SelectionError;

/// An enumerated device this crate can drive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeckDevice {
    pub model: DeckModel,
    pub info: HidDeviceInfo,
}

impl DeckDevice {
    pub fn path(&self) -> &str {
        &self.info.path
    }
}

/// The first supported device within the optional vendor/product filters.
///
/// Devices that fall outside the filters are skipped. A device that passes a
/// filter but has no implementation is an error: an explicit `vendor` with
/// no known models yields `STRMDCK_MISSING_VENDOR`, an explicit `product` with
/// no implementation yields `STRMDCK_MISSING_PRODUCT`.
pub fn select_device(
    devices: &[HidDeviceInfo],
    vendor: Option<u16>,
    product: Option<u16>,
) -> Result<Option<DeckDevice>, SelectionError> {
    for info in devices {
        if let Some(model) = classify(info, vendor, product)? {
            return Ok(Some(DeckDevice {
                model,
                info: info.clone(),
            }));
        }
    }
    Ok(None)
}

/// Every supported device within the filters, in enumeration order.
pub fn select_all_devices(
    devices: &[HidDeviceInfo],
    vendor: Option<u16>,
    product: Option<u16>,
) -> Result<Vec<DeckDevice>, SelectionError> {
    let mut selected = Vec::new();
    for info in devices {
        if let Some(model) = classify(info, vendor, product)? {
            selected.push(DeckDevice {
                model,
                info: info.clone(),
            });
        }
    }
    Ok(selected)
}

fn classify(
    info: &HidDeviceInfo,
    vendor: Option<u16>,
    product: Option<u16>,
) -> Result<Option<DeckModel>, SelectionError> {
    if vendor.is_some_and(|v| v != info.vendor_id) {
        return Ok(None);
    }
    if info.vendor_id != VENDOR_ID_ELGATO {
        return match vendor {
            Some(vendor) => Err(SelectionError::MissingVendor { vendor }),
            None => Ok(None),
        };
    }
    if product.is_some_and(|p| p != info.product_id) {
        return Ok(None);
    }
    match (DeckModel::from_ids(info.vendor_id, info.product_id), product) {
        (Some(model), _) => Ok(Some(model)),
        (None, Some(product)) => Err(SelectionError::MissingProduct {
            vendor: info.vendor_id,
            product,
        }),
        (None, None) => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn devices() -> Vec<HidDeviceInfo> {
        vec![
            HidDeviceInfo::new(0x046d, 0xc24f, "/dev/hidraw0"),
            HidDeviceInfo::new(0x0fd9, 0x006d, "/dev/hidraw1"),
            HidDeviceInfo::new(0x0fd9, 0x0063, "/dev/hidraw2"),
            HidDeviceInfo::new(0x0fd9, 0x0060, "/dev/hidraw3"),
        ]
    }

    #[test]
    fn test_first_supported_device_wins() -> Result<(), SelectionError> {
        let selected = select_device(&devices(), None, None)?;
        assert_eq!(
            selected.as_ref().map(|d| (d.model, d.path())),
            Some((DeckModel::Mini, "/dev/hidraw2"))
        );
        Ok(())
    }

    #[test]
    fn test_product_filter_narrows() -> Result<(), SelectionError> {
        let selected = select_device(&devices(), Some(0x0fd9), Some(0x0060))?;
        assert_eq!(selected.map(|d| d.model), Some(DeckModel::Original));
        Ok(())
    }

    #[test]
    fn test_select_all_in_enumeration_order() -> Result<(), SelectionError> {
        let all = select_all_devices(&devices(), None, None)?;
        let paths: Vec<_> = all.iter().map(DeckDevice::path).collect();
        assert_eq!(paths, vec!["/dev/hidraw2", "/dev/hidraw3"]);
        Ok(())
    }

    #[test]
    fn test_unknown_vendor_filter() {
        let result = select_device(&devices(), Some(0x046d), None);
        assert_eq!(
            result.map_err(|e| e.code()),
            Err("STRMDCK_MISSING_VENDOR")
        );
    }

    #[test]
    fn test_unknown_product_filter() {
        let result = select_all_devices(&devices(), Some(0x0fd9), Some(0x006d));
        assert_eq!(
            result,
            Err(SelectionError::MissingProduct {
                vendor: 0x0fd9,
                product: 0x006d
            })
        );
    }

    #[test]
    fn test_filters_without_candidates_select_nothing() -> Result<(), SelectionError> {
        // No device carries the vendor, so nothing is inspected.
        assert_eq!(select_device(&devices(), Some(0x1209), None)?, None);
        assert_eq!(select_device(&[], Some(0x0fd9), Some(0x0060))?, None);
        Ok(())
    }
}
