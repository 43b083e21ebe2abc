//! Property-based tests for the mock HID backend.
//!
//! The executor side relies on partial-write semantics, so the mock must
//! honour them exactly: a write never accepts more than the configured
//! limit and looping over partial writes reproduces the original buffer.

use deckport_hid_common::mock::{MockHidBackend, MockHidDevice};
use deckport_hid_common::{HidBackend, HidCommonError};
use proptest::prelude::*;

proptest! {
    #![proptest_config(proptest::test_runner::Config::with_cases(200))]

    #[test]
    fn prop_partial_writes_reassemble(
        data in proptest::collection::vec(any::<u8>(), 1..2048),
        limit in 1usize..512,
    ) {
        let backend = MockHidBackend::new();
        let device = MockHidDevice::new(0x0fd9, 0x0060, "/dev/hidraw0");
        backend.add_device(device.clone());
        let mut handle = backend.open("/dev/hidraw0").map_err(|e| TestCaseError::fail(e.to_string()))?;
        device.set_write_limit(Some(limit));

        let mut offset = 0;
        while offset < data.len() {
            let rest = &data[offset..];
            let n = handle.write(rest).map_err(|e| TestCaseError::fail(e.to_string()))?;
            prop_assert!(n > 0 && n <= limit);
            offset += n;
        }

        let reassembled: Vec<u8> = device.get_write_history().concat();
        prop_assert_eq!(reassembled, data);
    }

    #[test]
    fn prop_feature_reports_recorded_verbatim(
        data in proptest::collection::vec(any::<u8>(), 0..64),
    ) {
        let backend = MockHidBackend::new();
        let device = MockHidDevice::new(0x0fd9, 0x0063, "/dev/hidraw1");
        backend.add_device(device.clone());
        let mut handle = backend.open("/dev/hidraw1").map_err(|e| TestCaseError::fail(e.to_string()))?;

        let sent = handle.send_feature_report(&data).map_err(|e| TestCaseError::fail(e.to_string()))?;
        prop_assert_eq!(sent, data.len());
        prop_assert_eq!(device.get_feature_history(), vec![data]);
    }
}

#[test]
fn reads_fail_once_the_device_is_unplugged() -> Result<(), HidCommonError> {
    let backend = MockHidBackend::new();
    let device = MockHidDevice::new(0x0fd9, 0x0060, "/dev/hidraw0");
    backend.add_device(device.clone());
    let mut handle = backend.open("/dev/hidraw0")?;

    device.queue_read(vec![0x01, 0x00]);
    assert_eq!(handle.read_timeout(-1)?, vec![0x01, 0x00]);

    device.disconnect();
    assert!(matches!(
        handle.read_timeout(0),
        Err(HidCommonError::Disconnected)
    ));
    assert_eq!(device.open_count(), 1);
    Ok(())
}
