//! Property tests for the wire codec and session refcounting

use std::sync::Arc;

use proptest::prelude::*;

use deckport_hid_common::mock::{MockHidBackend, MockHidDevice};
use deckport_ipc::prelude::*;

fn path_strategy() -> impl Strategy<Value = String> {
    // Includes characters JSON must escape.
    "[a-z0-9/_\n\"\\\\ ]{1,24}"
}

fn message_strategy() -> impl Strategy<Value = Message> {
    prop_oneof![
        path_strategy().prop_map(|path| Message::Register { path }),
        (
            path_strategy(),
            0u32..=0x7FFF_FFFF,
            prop::collection::vec(prop::collection::vec(any::<u8>(), 0..64), 0..4),
        )
            .prop_map(|(path, correlation_id, data)| Message::Write {
                path,
                correlation_id,
                data,
            }),
        (path_strategy(), prop::option::of(0u32..=0x7FFF_FFFF))
            .prop_map(|(path, correlation_id)| Message::Close { path, correlation_id }),
        (path_strategy(), any::<u32>(), any::<usize>()).prop_map(|(path, correlation_id, n)| {
            Message::Value {
                path,
                correlation_id,
                data: ReplyData::Count(n),
            }
        }),
        (path_strategy(), prop::collection::vec(any::<u8>(), 0..64)).prop_map(|(path, bytes)| {
            Message::Event {
                path,
                event: HardwareEvent::Data(bytes),
            }
        }),
        Just(Message::Ready),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    #[test]
    fn prop_encoded_message_is_exactly_one_line(message in message_strategy()) {
        let codec = MessageCodec::new();
        let line = codec
            .encode_line(&message)
            .map_err(|e| TestCaseError::fail(e.to_string()))?;

        prop_assert_eq!(line.last(), Some(&b'\n'));
        prop_assert_eq!(line.iter().filter(|b| **b == b'\n').count(), 1);

        let decoded = codec
            .decode_line(&line)
            .map_err(|e| TestCaseError::fail(e.to_string()))?;
        prop_assert_eq!(decoded, message);
    }

    #[test]
    fn prop_message_size_validation(
        max_size in 100usize..=10_000usize,
        test_size in 0usize..=20_000usize
    ) {
        let codec = MessageCodec::with_max_size(max_size);
        let expected_valid = test_size > 0 && test_size <= max_size;
        prop_assert_eq!(codec.is_valid_size(test_size), expected_valid);
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn prop_open_n_times_registers_once_and_last_close_tears_down(n in 1usize..8) {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| TestCaseError::fail(e.to_string()))?;

        runtime.block_on(async {
            let backend = Arc::new(MockHidBackend::new());
            let device = MockHidDevice::new(0x0fd9, 0x0063, "/dev/hidraw1");
            backend.add_device(device.clone());
            let mut config = TransportConfig::default();
            config.container.forward_input = false;
            let context = TransportContext::new(backend, config);

            let mut sessions = Vec::with_capacity(n);
            for _ in 0..n {
                let session = context
                    .session(TransportKind::InProcess, "/dev/hidraw1")
                    .await
                    .map_err(|e| TestCaseError::fail(e.to_string()))?;
                session.open().map_err(|e| TestCaseError::fail(e.to_string()))?;
                sessions.push(session);
            }
            prop_assert_eq!(device.open_count(), 1);

            for (i, session) in sessions.iter().enumerate() {
                let is_last = i + 1 == n;
                match session.close() {
                    CloseOutcome::Teardown(reply) => {
                        prop_assert!(is_last, "teardown on close {} of {}", i + 1, n);
                        let acked = reply.await.map_err(|e| TestCaseError::fail(e.to_string()))?;
                        prop_assert!(acked);
                    }
                    CloseOutcome::Released => prop_assert!(!is_last),
                    CloseOutcome::NotOpen => {
                        return Err(TestCaseError::fail("session was open"));
                    }
                }
            }
            prop_assert_eq!(device.close_count(), 1);
            Ok::<(), TestCaseError>(())
        })?;
    }
}
