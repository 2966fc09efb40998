// Telemetry frame parsing.
//
// The backend pushes either a bare JSON array of device records or the
// `{"type": "telemetry_update", "data": {"plc_clients": [...]}}` envelope,
// plus periodic `{"type": "keepalive"}` messages. Anything else is
// malformed and the caller drops it.

use std::collections::HashSet;

use serde::Deserialize;

use crate::error::Error;
use crate::models::{DataResponse, DeviceRecord};

/// A decoded inbound text frame.
#[derive(Debug, Clone, PartialEq)]
pub enum Frame {
    /// A complete, ordered device list that replaces the previous one.
    Snapshot(Vec<DeviceRecord>),
    /// Liveness ping with no data.
    Keepalive,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawFrame {
    Bare(Vec<DeviceRecord>),
    Envelope(Envelope),
}

#[derive(Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum Envelope {
    TelemetryUpdate { data: DataResponse },
    Keepalive,
}

/// Decode one text frame.
///
/// A snapshot whose device URLs are not unique is rejected: the URL is the
/// reconciliation key downstream.
pub fn parse_frame(text: &str) -> Result<Frame, Error> {
    let raw: RawFrame = serde_json::from_str(text).map_err(|e| Error::Deserialization {
        message: e.to_string(),
        body: text.to_owned(),
    })?;

    let records = match raw {
        RawFrame::Bare(records) => records,
        RawFrame::Envelope(Envelope::TelemetryUpdate { data }) => data.plc_clients,
        RawFrame::Envelope(Envelope::Keepalive) => return Ok(Frame::Keepalive),
    };

    let mut seen = HashSet::with_capacity(records.len());
    for record in &records {
        if !seen.insert(record.url.as_str()) {
            return Err(Error::Deserialization {
                message: format!("duplicate device url '{}' in frame", record.url),
                body: text.to_owned(),
            });
        }
    }

    Ok(Frame::Snapshot(records))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::models::LinkStatus;

    #[test]
    fn parses_bare_array() {
        let text = r#"[{"url":"plc1","name":"Line1","status":"CONNECTED","nodes":{"CMD_Instant_Cutoff":"[True, False]"}}]"#;
        let Frame::Snapshot(records) = parse_frame(text).unwrap() else {
            panic!("expected snapshot");
        };
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].url, "plc1");
        assert_eq!(records[0].status, LinkStatus::Connected);
        assert_eq!(records[0].nodes["CMD_Instant_Cutoff"], "[True, False]");
    }

    #[test]
    fn parses_telemetry_envelope() {
        let text = r#"{"type":"telemetry_update","data":{"plc_clients":[
            {"url":"opc.tcp://a","name":"Park A","status":"CONNECTED","nodes":{}},
            {"url":"opc.tcp://b","name":"Park B","status":"ERROR","error":"OPC UA read error","nodes":{}}
        ]}}"#;
        let Frame::Snapshot(records) = parse_frame(text).unwrap() else {
            panic!("expected snapshot");
        };
        assert_eq!(records.len(), 2);
        assert_eq!(records[1].error.as_deref(), Some("OPC UA read error"));
    }

    #[test]
    fn frame_keeps_server_node_order() {
        let text = r#"[{"url":"plc1","name":"Line1","status":"CONNECTED","nodes":{"Zeta":"1","Alpha":"2","Mid":"3"}}]"#;
        let Frame::Snapshot(records) = parse_frame(text).unwrap() else {
            panic!("expected snapshot");
        };
        let keys: Vec<&str> = records[0].nodes.keys().map(String::as_str).collect();
        assert_eq!(keys, ["Zeta", "Alpha", "Mid"]);
    }

    #[test]
    fn keepalive_is_not_a_snapshot() {
        assert_eq!(parse_frame(r#"{"type":"keepalive"}"#).unwrap(), Frame::Keepalive);
    }

    #[test]
    fn empty_array_is_a_valid_snapshot() {
        assert_eq!(parse_frame("[]").unwrap(), Frame::Snapshot(Vec::new()));
    }

    #[test]
    fn malformed_payloads_are_errors() {
        for text in [
            "not json at all",
            r#"{"type":"something_else"}"#,
            r#"[{"url":"plc1"}]"#,
            r#"{"plc_clients": []}"#,
            "42",
        ] {
            assert!(
                matches!(parse_frame(text), Err(Error::Deserialization { .. })),
                "expected rejection for {text}"
            );
        }
    }

    #[test]
    fn duplicate_urls_are_rejected() {
        let text = r#"[
            {"url":"plc1","name":"A","status":"CONNECTED","nodes":{}},
            {"url":"plc1","name":"B","status":"CONNECTED","nodes":{}}
        ]"#;
        let err = parse_frame(text).unwrap_err();
        assert!(err.to_string().contains("duplicate device url"));
    }
}
