//! Facade scenarios against mock panels

use std::sync::Arc;
use std::time::Duration;

use deckport::prelude::*;
use deckport_hid_common::mock::{MockHidBackend, MockHidDevice};
use deckport_ipc::{ContainerConfig, TransportConfig};

type TestResult = Result<(), Box<dyn std::error::Error>>;

const TIMEOUT: Duration = Duration::from_secs(5);

fn original(path: &str) -> MockHidDevice {
    MockHidDevice::new(0x0fd9, 0x0060, path)
}

fn mini(path: &str) -> MockHidDevice {
    MockHidDevice::new(0x0fd9, 0x0063, path)
}

fn context_with(devices: &[&MockHidDevice], forward_input: bool) -> Arc<TransportContext> {
    let backend = Arc::new(MockHidBackend::new());
    for device in devices {
        backend.add_device((*device).clone());
    }
    let config = TransportConfig {
        container: ContainerConfig {
            forward_input,
            ..ContainerConfig::default()
        },
        ..TransportConfig::default()
    };
    TransportContext::new(backend, config)
}

async fn open_only(
    context: &TransportContext,
    kind: TransportKind,
) -> Result<StreamDeck, Box<dyn std::error::Error>> {
    StreamDeck::connect(context, kind, None, None)
        .await?
        .ok_or_else(|| "no supported device".into())
}

async fn next_event(
    events: &mut tokio::sync::mpsc::UnboundedReceiver<DeckEvent>,
) -> Result<DeckEvent, Box<dyn std::error::Error>> {
    tokio::time::timeout(TIMEOUT, events.recv())
        .await?
        .ok_or_else(|| "event stream closed".into())
}

/// Key byte of an image page: index 5 on both models, one-based.
fn page_key(page: &[u8]) -> Option<u8> {
    page.get(5).copied()
}

mod fills {
    use super::*;

    #[tokio::test]
    async fn original_color_is_two_independent_pages() -> TestResult {
        let device = original("/dev/hidraw0");
        let context = context_with(&[&device], false);
        let deck = open_only(&context, TransportKind::InProcess).await?;

        assert_eq!(deck.fill_color(4, 0x10, 0x20, 0x30).await?, 2 * 8191);

        let writes = device.get_write_history();
        assert_eq!(writes.len(), 2);
        assert!(writes.iter().all(|page| page.len() == 8191));
        assert_eq!(writes.first().and_then(|p| p.get(..6)), Some(&[0x02, 0x01, 0x01, 0x00, 0x00, 0x05][..]));
        assert_eq!(writes.get(1).and_then(|p| p.get(..6)), Some(&[0x02, 0x01, 0x02, 0x00, 0x01, 0x05][..]));
        // Pixels are sent blue, green, red.
        assert_eq!(writes.first().and_then(|p| p.get(70..73)), Some(&[0x30, 0x20, 0x10][..]));
        Ok(())
    }

    #[tokio::test]
    async fn mini_image_is_one_batched_write() -> TestResult {
        let device = mini("/dev/hidraw0");
        let context = context_with(&[&device], false);
        let deck = open_only(&context, TransportKind::Worker).await?;
        assert_eq!(deck.model(), DeckModel::Mini);

        let written = deck.fill_image(5, &vec![0x7f; 80 * 80 * 3]).await?;
        assert_eq!(written, 20 * 1024);

        let writes = device.get_write_history();
        assert_eq!(writes.len(), 20);
        assert!(writes.iter().all(|page| page_key(page) == Some(6)));
        assert_eq!(writes.last().and_then(|p| p.get(4)).copied(), Some(1));
        Ok(())
    }

    #[tokio::test]
    async fn invalid_arguments_send_nothing() -> TestResult {
        let device = original("/dev/hidraw0");
        let context = context_with(&[&device], false);
        let deck = open_only(&context, TransportKind::InProcess).await?;

        let err = deck.fill_color(0, 0, 256, 0).await.err();
        assert!(err.as_ref().is_some_and(DeckError::is_validation));
        assert!(deck.fill_color(15, 0, 0, 0).await.is_err());
        assert!(deck.fill_image(0, &[0; 12]).await.is_err());
        assert!(deck.fill_panel(&[0; 12]).await.is_err());
        assert!(deck.set_brightness(101).await.is_err());
        assert!(deck.check_valid_key_index(14).is_ok());

        assert!(device.get_write_history().is_empty());
        assert!(device.get_feature_history().is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn clear_all_keys_touches_every_key() -> TestResult {
        let device = mini("/dev/hidraw0");
        let context = context_with(&[&device], false);
        let deck = open_only(&context, TransportKind::InProcess).await?;

        assert_eq!(deck.clear_all_keys().await?, 6 * 20 * 1024);
        let writes = device.get_write_history();
        assert_eq!(writes.len(), 120);
        for key in 1..=6u8 {
            assert_eq!(writes.iter().filter(|p| page_key(p) == Some(key)).count(), 20);
        }
        Ok(())
    }

    #[tokio::test]
    async fn fill_panel_places_tiles_through_the_layout() -> TestResult {
        let device = original("/dev/hidraw0");
        let context = context_with(&[&device], false);
        let deck = open_only(&context, TransportKind::InProcess).await?;

        // Only the top-left tile is lit.
        let (width, height) = (5 * 72, 3 * 72);
        let mut panel = vec![0u8; width * height * 3];
        for y in 0..72 {
            for x in 0..72 {
                let at = (y * width + x) * 3;
                if let Some(px) = panel.get_mut(at..at + 3) {
                    px.copy_from_slice(&[0xff, 0xff, 0xff]);
                }
            }
        }

        assert_eq!(deck.fill_panel(&panel).await?, 15 * 2 * 8191);
        let writes = device.get_write_history();
        assert_eq!(writes.len(), 30);

        // The top-left position is key 4, so only its pages carry green.
        let lit: Vec<u8> = writes
            .iter()
            .filter(|page| page.get(70..).is_some_and(|px| px.contains(&0xff)))
            .filter_map(|page| page_key(page))
            .collect();
        assert_eq!(lit, vec![5, 5]);
        assert_eq!(deck.button_index_from_position(0, 0)?, 4);
        Ok(())
    }

    #[tokio::test]
    async fn brightness_is_a_feature_report() -> TestResult {
        let device = original("/dev/hidraw0");
        let context = context_with(&[&device], false);
        let deck = open_only(&context, TransportKind::Worker).await?;

        assert_eq!(deck.set_brightness(50).await?, 17);
        let mut expected = vec![0x05, 0x55, 0xaa, 0xd1, 0x01, 50];
        expected.resize(17, 0);
        assert_eq!(device.get_feature_history(), vec![expected]);
        Ok(())
    }
}

mod keys {
    use super::*;

    #[tokio::test]
    async fn reports_become_edge_triggered_events() -> TestResult {
        let device = original("/dev/hidraw0");
        let context = context_with(&[&device], true);
        let deck = open_only(&context, TransportKind::Worker).await?;
        let mut events = deck.subscribe();

        let mut report = vec![0u8; 17];
        if let Some(key) = report.get_mut(1) {
            *key = 1;
        }
        device.queue_read(report.clone());
        assert_eq!(next_event(&mut events).await?, DeckEvent::Down(0));
        assert_eq!(deck.pressed_keys(), vec![0]);
        assert!(deck.is_pressed(0));

        // Repeating the same state is not a transition.
        device.queue_read(report);
        device.queue_read(vec![0u8; 17]);
        assert_eq!(next_event(&mut events).await?, DeckEvent::Up(0));
        assert!(deck.pressed_keys().is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn several_changes_arrive_in_key_order() -> TestResult {
        let device = mini("/dev/hidraw0");
        let context = context_with(&[&device], true);
        let deck = open_only(&context, TransportKind::InProcess).await?;
        let mut events = deck.subscribe();

        device.queue_read(vec![0x01, 0, 1, 0, 1, 1, 0, 0]);
        assert_eq!(next_event(&mut events).await?, DeckEvent::Down(1));
        assert_eq!(next_event(&mut events).await?, DeckEvent::Down(3));
        assert_eq!(next_event(&mut events).await?, DeckEvent::Down(4));
        assert_eq!(deck.pressed_keys(), vec![1, 3, 4]);
        Ok(())
    }

    #[tokio::test]
    async fn hardware_failure_is_an_error_event() -> TestResult {
        let device = mini("/dev/hidraw0");
        let context = context_with(&[&device], true);
        let deck = open_only(&context, TransportKind::Worker).await?;
        let mut events = deck.subscribe();

        device.disconnect();
        let event = next_event(&mut events).await?;
        assert!(matches!(
            event,
            DeckEvent::Error(ref e) if e.kind.as_deref() == Some("disconnected")
        ));
        Ok(())
    }
}

mod lifecycle {
    use super::*;
    use tracing_test::traced_test;

    #[tokio::test]
    #[traced_test]
    async fn open_logs_the_device_display_name() -> TestResult {
        let device = mini("/dev/hidraw1");
        let context = context_with(&[&device], false);
        let deck = open_only(&context, TransportKind::InProcess).await?;

        assert!(logs_contain("Opened Stream Deck"));
        // The mock has no product or manufacturer string.
        assert!(logs_contain("device=0fd9:0063"));
        deck.close().await?;
        Ok(())
    }

    #[tokio::test]
    async fn connect_skips_unsupported_devices() -> TestResult {
        let other = MockHidDevice::new(0x046d, 0xc24f, "/dev/hidraw0");
        let deck_device = mini("/dev/hidraw1");
        let context = context_with(&[&other, &deck_device], false);

        let deck = open_only(&context, TransportKind::InProcess).await?;
        assert_eq!(deck.path(), "/dev/hidraw1");
        assert_eq!(deck.capabilities().key_count, 6);
        assert_eq!(other.open_count(), 0);

        let missing = StreamDeck::connect(&context, TransportKind::InProcess, Some(0x046d), None).await;
        assert_eq!(
            missing.err().and_then(|e| e.code()),
            Some("STRMDCK_MISSING_VENDOR")
        );
        Ok(())
    }

    #[tokio::test]
    async fn connect_without_devices_yields_none() -> TestResult {
        let context = context_with(&[], false);
        let deck = StreamDeck::connect(&context, TransportKind::InProcess, None, None).await?;
        assert!(deck.is_none());
        Ok(())
    }

    #[tokio::test]
    async fn panels_on_one_path_share_the_handle() -> TestResult {
        let device = original("/dev/hidraw0");
        let context = context_with(&[&device], false);
        let decks = StreamDeck::connect_all(&context, TransportKind::InProcess, None, None).await?;
        let second = open_only(&context, TransportKind::InProcess).await?;
        assert_eq!(decks.len(), 1);
        assert_eq!(device.open_count(), 1);

        for deck in decks {
            deck.close().await?;
        }
        assert_eq!(device.close_count(), 0);

        second.close().await?;
        assert_eq!(device.close_count(), 1);
        assert_eq!(context.open_count("/dev/hidraw0"), 0);
        Ok(())
    }

    #[tokio::test]
    async fn for_each_key_visits_every_index() -> TestResult {
        let device = original("/dev/hidraw0");
        let context = context_with(&[&device], false);
        let deck = open_only(&context, TransportKind::InProcess).await?;

        let mut seen = Vec::new();
        deck.for_each_key(|key, deck| seen.push((key, deck.key_count())));
        assert_eq!(seen.len(), 15);
        assert_eq!(seen.first(), Some(&(0, 15)));
        assert_eq!(seen.last(), Some(&(14, 15)));
        Ok(())
    }
}
