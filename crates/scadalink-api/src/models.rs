// Wire types for the telemetry backend.
//
// These mirror the JSON the backend emits and accepts. `scadalink-core`
// converts the read-side records into its domain model.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Response body of `POST /auth/jwt/login`.
#[derive(Debug, Clone, Deserialize)]
pub struct LoginResponse {
    pub access_token: String,
    #[serde(default)]
    pub token_type: Option<String>,
}

/// Response body of `GET /me`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserRecord {
    pub id: String,
    pub email: String,
    #[serde(default)]
    pub organization_id: Option<String>,
    #[serde(default)]
    pub default_park_id: Option<String>,
    #[serde(default)]
    pub is_superuser: bool,
    #[serde(default)]
    pub is_active: bool,
}

/// One row of `GET /admin/users`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdminUserRecord {
    pub id: Uuid,
    pub email: String,
    #[serde(default)]
    pub is_superuser: bool,
    #[serde(default)]
    pub is_active: bool,
    #[serde(default)]
    pub organization_id: Option<String>,
    #[serde(default)]
    pub default_park_id: Option<String>,
}

/// Query string for `GET /admin/users`. Unset filters are omitted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserQuery {
    /// Case-insensitive substring of the email address.
    #[serde(rename = "q", skip_serializing_if = "Option::is_none")]
    pub search: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_superuser: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_active: Option<bool>,
    /// Page size; the backend accepts 1..=500.
    pub limit: u32,
    pub offset: u32,
}

impl Default for UserQuery {
    fn default() -> Self {
        Self {
            search: None,
            is_superuser: None,
            is_active: None,
            limit: 50,
            offset: 0,
        }
    }
}

/// Link state the backend reports for one PLC.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display, strum::EnumString,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum LinkStatus {
    Connecting,
    Connected,
    Disconnected,
    Error,
}

/// One PLC entry inside a telemetry frame or the `/data` response.
///
/// `nodes` keeps the server's field order. Values are whatever the
/// controller reported: usually strings (`"True"`, `"[True, False]"`,
/// `"231.4"`) but any JSON value is accepted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceRecord {
    pub url: String,
    pub name: String,
    pub status: LinkStatus,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub nodes: IndexMap<String, serde_json::Value>,
}

/// `{"plc_clients": [...]}`, shared by `GET /data` and the push envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataResponse {
    pub plc_clients: Vec<DeviceRecord>,
}

/// Value carried by a write-back request.
///
/// Setpoints are plain numbers; switch-type nodes take a two-element
/// boolean array where `[true, false]` means "on".
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum WriteValue {
    Number(f64),
    Switch([bool; 2]),
}

impl WriteValue {
    /// Encode a switch position.
    pub fn switch(on: bool) -> Self {
        Self::Switch([on, !on])
    }
}

/// Body of `POST /write_value`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WriteRequest {
    /// Source URL of the target PLC (the device snapshot identifier).
    #[serde(rename = "plc_url")]
    pub target_url: String,
    pub node_name: String,
    pub value: WriteValue,
}

/// FastAPI error body: `{"detail": "..."}`. `detail` can also be a list
/// of validation errors, so it is kept as raw JSON.
#[derive(Debug, Deserialize)]
pub(crate) struct ErrorBody {
    pub detail: serde_json::Value,
}

impl ErrorBody {
    pub(crate) fn message(&self) -> String {
        match &self.detail {
            serde_json::Value::String(s) => s.clone(),
            other => other.to_string(),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn write_request_uses_backend_field_names() {
        let req = WriteRequest {
            target_url: "opc.tcp://10.0.0.5:4840".into(),
            node_name: "CMD_Instant_Cutoff".into(),
            value: WriteValue::switch(true),
        };
        let body = serde_json::to_value(&req).unwrap();
        assert_eq!(
            body,
            json!({
                "plc_url": "opc.tcp://10.0.0.5:4840",
                "node_name": "CMD_Instant_Cutoff",
                "value": [true, false]
            })
        );
    }

    #[test]
    fn switch_off_encodes_inverted_pair() {
        assert_eq!(WriteValue::switch(false), WriteValue::Switch([false, true]));
    }

    #[test]
    fn device_record_preserves_node_order() {
        let raw = r#"{
            "url": "plc1",
            "name": "Line1",
            "status": "CONNECTED",
            "nodes": { "Zeta": "1", "Alpha": "2", "Mid": "3" }
        }"#;
        let rec: DeviceRecord = serde_json::from_str(raw).unwrap();
        let keys: Vec<&str> = rec.nodes.keys().map(String::as_str).collect();
        assert_eq!(keys, ["Zeta", "Alpha", "Mid"]);
        assert_eq!(rec.status, LinkStatus::Connected);
        assert!(rec.error.is_none());
    }

    #[test]
    fn admin_user_id_is_a_uuid() {
        let raw = r#"{"id":"6f1c2d3e-4b5a-4c7d-8e9f-0a1b2c3d4e5f","email":"ops@plant.example","is_superuser":false,"is_active":true}"#;
        let rec: AdminUserRecord = serde_json::from_str(raw).unwrap();
        assert_eq!(rec.id.to_string(), "6f1c2d3e-4b5a-4c7d-8e9f-0a1b2c3d4e5f");
        assert!(rec.default_park_id.is_none());

        let bad = r#"{"id":"42","email":"ops@plant.example"}"#;
        assert!(serde_json::from_str::<AdminUserRecord>(bad).is_err());
    }

    #[test]
    fn user_query_omits_unset_filters() {
        let body = serde_json::to_value(UserQuery::default()).unwrap();
        assert_eq!(body, json!({ "limit": 50, "offset": 0 }));

        let query = UserQuery {
            search: Some("plant".into()),
            is_active: Some(true),
            ..UserQuery::default()
        };
        let body = serde_json::to_value(query).unwrap();
        assert_eq!(body["q"], "plant");
        assert_eq!(body["is_active"], true);
        assert!(body.get("is_superuser").is_none());
    }

    #[test]
    fn unknown_status_is_rejected() {
        let raw = json!({ "url": "plc1", "name": "Line1", "status": "SLEEPING", "nodes": {} });
        assert!(serde_json::from_value::<DeviceRecord>(raw).is_err());
    }

    #[test]
    fn error_detail_list_is_stringified() {
        let body: ErrorBody =
            serde_json::from_value(json!({ "detail": [{ "msg": "field required" }] })).unwrap();
        assert!(body.message().contains("field required"));
    }
}
