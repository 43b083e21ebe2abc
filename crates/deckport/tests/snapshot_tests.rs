//! Snapshot tests for the facade's serialized shapes

use deckport::prelude::*;
use deckport_ipc::RemoteError;
use insta::assert_snapshot;

#[test]
fn test_snapshot_default_config() -> Result<(), serde_json::Error> {
    let json = serde_json::to_string_pretty(&DeckportConfig::default())?;
    assert_snapshot!(json, @r#"
    {
      "transport": "auto",
      "offload": {
        "program": null,
        "args": [],
        "handshake_timeout_ms": 5000
      },
      "container": {
        "forward_input": true,
        "poll_interval_ms": 5,
        "read_timeout_ms": 0
      }
    }
    "#);
    Ok(())
}

#[test]
fn test_snapshot_events() -> Result<(), serde_json::Error> {
    let events = [
        DeckEvent::Down(0),
        DeckEvent::Up(14),
        DeckEvent::Error(RemoteError::new("Device disconnected").with_kind("disconnected")),
    ];
    let lines = events
        .iter()
        .map(serde_json::to_string)
        .collect::<Result<Vec<_>, _>>()?;
    assert_snapshot!(lines.join("\n"), @r#"
    {"type":"down","data":0}
    {"type":"up","data":14}
    {"type":"error","data":{"message":"Device disconnected","kind":"disconnected"}}
    "#);
    Ok(())
}

#[test]
fn test_snapshot_selection_errors() {
    let errors = [
        SelectionError::MissingVendor { vendor: 0x046d },
        SelectionError::MissingProduct {
            vendor: 0x0fd9,
            product: 0x0080,
        },
    ];
    let lines = errors
        .iter()
        .map(|e| format!("{}: {e}", e.code()))
        .collect::<Vec<_>>();
    assert_snapshot!(lines.join("\n"), @r"
    STRMDCK_MISSING_VENDOR: No implementations for any product of vendor 0x046d
    STRMDCK_MISSING_PRODUCT: No implementations for the product 0x0080 of vendor 0x0fd9
    ");
}
