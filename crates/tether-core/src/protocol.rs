//! Closed protocol vocabulary spoken with the content surface.
//!
//! Inbound tags are matched exactly as the surface sends them, including
//! their inconsistent casing. Unknown tags map to [`InboundMessage::Unknown`]
//! and are ignored by the dispatcher.

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use crate::envelope::{encode, Envelope};

// ── Inbound tags ────────────────────────────────────────────────────

pub const CHECK_VERSION: &str = "Check_Version";
pub const TRACK_LOCATION: &str = "track_location";
pub const STOP_LOCATION: &str = "Stop_location";
pub const STOP_TRACKING: &str = "stopTracking";
pub const RESET_ACCURACY: &str = "resetAccuracy";
pub const OPEN_CAMERA: &str = "open_Camera";
pub const GET_LOCATION: &str = "Get_Location";
pub const GET_CURRENT_LOCATION: &str = "Get_Current_Location";
pub const OPEN_GOOGLE_MAP: &str = "OPEN_GOOGLE_MAP";
pub const EXIT_APP: &str = "Exit_App";
pub const ERROR_MESSAGE: &str = "errorMessage";
pub const INFO: &str = "info";

// ── Outbound tags ───────────────────────────────────────────────────

pub const LOCATION_DISABLED: &str = "Location_Disabled";
pub const LOCATION_UPDATE: &str = "location_update";
pub const CURRENT_LOCATION: &str = "current_Location";
pub const POSITION_ERROR: &str = "Position_error";
pub const LOCATION_OFF: &str = "Location_off";
pub const VERSION_NOT_EXPIRED: &str = "Version_Not_Expired";
pub const VERSION_EXPIRED: &str = "Version_Expired";
pub const MESSAGE_ERROR: &str = "Message_Error";
pub const EXIT_REQUEST: &str = "EXIT_REQUEST";
pub const ON_CONNECTIVITY_STATUS: &str = "onConnectivityStatus";
pub const ON_LOCATION_STATUS: &str = "onLocationStatus";

/// A latitude/longitude pair as the surface expects it.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct LatLng {
    pub lat: f64,
    pub lng: f64,
}

/// Severity of a diagnostic message forwarded by the surface.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DiagnosticLevel {
    Error,
    Info,
}

/// Inbound messages, parsed from an [`Envelope`].
#[derive(Clone, Debug, PartialEq)]
pub enum InboundMessage {
    CheckVersion { required_version: Option<String> },
    /// `accuracy` is the raw requested threshold; absent, zero and
    /// non-numeric values are all reported as `None`.
    TrackLocation { accuracy: Option<f64> },
    StopTracking,
    ResetAccuracy,
    OpenCamera,
    GetLocation,
    GetCurrentLocation,
    OpenMap { url: Option<String> },
    ExitApp,
    Diagnostic { level: DiagnosticLevel, msg: Option<String> },
    Unknown(String),
}

impl InboundMessage {
    pub fn from_envelope(envelope: &Envelope) -> Self {
        match envelope.kind() {
            CHECK_VERSION => Self::CheckVersion {
                required_version: envelope.field("requiredVersion").and_then(value_to_trimmed),
            },
            TRACK_LOCATION => Self::TrackLocation {
                accuracy: envelope
                    .field("accuracy")
                    .and_then(value_to_f64)
                    .filter(|a| *a > 0.0),
            },
            STOP_LOCATION | STOP_TRACKING => Self::StopTracking,
            RESET_ACCURACY => Self::ResetAccuracy,
            OPEN_CAMERA => Self::OpenCamera,
            GET_LOCATION => Self::GetLocation,
            GET_CURRENT_LOCATION => Self::GetCurrentLocation,
            OPEN_GOOGLE_MAP => Self::OpenMap {
                url: envelope
                    .field("url")
                    .and_then(Value::as_str)
                    .map(str::trim)
                    .filter(|u| !u.is_empty())
                    .map(str::to_owned),
            },
            EXIT_APP => Self::ExitApp,
            ERROR_MESSAGE => Self::Diagnostic {
                level: DiagnosticLevel::Error,
                msg: envelope.field("msg").map(value_to_log_string),
            },
            INFO => Self::Diagnostic {
                level: DiagnosticLevel::Info,
                msg: envelope.field("msg").map(value_to_log_string),
            },
            other => Self::Unknown(other.to_owned()),
        }
    }

    /// The wire tag this message was decoded from (canonical form).
    pub fn tag(&self) -> &str {
        match self {
            Self::CheckVersion { .. } => CHECK_VERSION,
            Self::TrackLocation { .. } => TRACK_LOCATION,
            Self::StopTracking => STOP_LOCATION,
            Self::ResetAccuracy => RESET_ACCURACY,
            Self::OpenCamera => OPEN_CAMERA,
            Self::GetLocation => GET_LOCATION,
            Self::GetCurrentLocation => GET_CURRENT_LOCATION,
            Self::OpenMap { .. } => OPEN_GOOGLE_MAP,
            Self::ExitApp => EXIT_APP,
            Self::Diagnostic { level: DiagnosticLevel::Error, .. } => ERROR_MESSAGE,
            Self::Diagnostic { level: DiagnosticLevel::Info, .. } => INFO,
            Self::Unknown(tag) => tag.as_str(),
        }
    }
}

/// Messages the bridge sends to the content surface.
#[derive(Clone, Debug, PartialEq)]
pub enum OutboundMessage {
    LocationDisabled,
    LocationUpdate(LatLng),
    CurrentLocation(LatLng),
    PositionError,
    LocationOff,
    VersionNotExpired,
    VersionExpired,
    MessageError,
    ExitRequest,
    ConnectivityStatus(bool),
    LocationStatus(bool),
    /// Confirmed photo as two `data:image/jpeg;base64,` URIs.
    CaptureResult { image: String, thumbnail_image: String },
}

impl OutboundMessage {
    /// Envelope form of the message. The capture result predates the
    /// envelope protocol and has no tag, so it has no envelope form.
    pub fn to_envelope(&self) -> Option<Envelope> {
        let env = match self {
            Self::LocationDisabled => Envelope::new(LOCATION_DISABLED),
            Self::LocationUpdate(pos) => {
                Envelope::with_payload(LOCATION_UPDATE, fields(json!({ "location": pos })))
            }
            Self::CurrentLocation(pos) => Envelope::with_payload(
                CURRENT_LOCATION,
                fields(json!({ "currentLocation": pos })),
            ),
            Self::PositionError => Envelope::new(POSITION_ERROR),
            Self::LocationOff => Envelope::new(LOCATION_OFF),
            Self::VersionNotExpired => Envelope::new(VERSION_NOT_EXPIRED),
            Self::VersionExpired => Envelope::new(VERSION_EXPIRED),
            Self::MessageError => Envelope::new(MESSAGE_ERROR),
            Self::ExitRequest => Envelope::new(EXIT_REQUEST),
            Self::ConnectivityStatus(on) => {
                Envelope::with_payload(ON_CONNECTIVITY_STATUS, fields(json!({ "status": on })))
            }
            Self::LocationStatus(on) => {
                Envelope::with_payload(ON_LOCATION_STATUS, fields(json!({ "status": on })))
            }
            Self::CaptureResult { .. } => return None,
        };
        Some(env)
    }

    /// Serialize to the string posted to the surface.
    pub fn to_wire(&self) -> String {
        match self {
            Self::CaptureResult {
                image,
                thumbnail_image,
            } => json!({ "image": image, "thumbnailImage": thumbnail_image }).to_string(),
            other => other
                .to_envelope()
                .map(|env| encode(&env))
                .unwrap_or_default(),
        }
    }

    /// Short name for logs.
    pub fn label(&self) -> &'static str {
        match self {
            Self::LocationDisabled => LOCATION_DISABLED,
            Self::LocationUpdate(_) => LOCATION_UPDATE,
            Self::CurrentLocation(_) => CURRENT_LOCATION,
            Self::PositionError => POSITION_ERROR,
            Self::LocationOff => LOCATION_OFF,
            Self::VersionNotExpired => VERSION_NOT_EXPIRED,
            Self::VersionExpired => VERSION_EXPIRED,
            Self::MessageError => MESSAGE_ERROR,
            Self::ExitRequest => EXIT_REQUEST,
            Self::ConnectivityStatus(_) => ON_CONNECTIVITY_STATUS,
            Self::LocationStatus(_) => ON_LOCATION_STATUS,
            Self::CaptureResult { .. } => "capture_result",
        }
    }
}

fn fields(v: Value) -> Map<String, Value> {
    match v {
        Value::Object(m) => m,
        _ => Map::new(),
    }
}

fn value_to_trimmed(v: &Value) -> Option<String> {
    let s = match v {
        Value::String(s) => s.trim().to_owned(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        _ => return None,
    };
    Some(s)
}

fn value_to_f64(v: &Value) -> Option<f64> {
    match v {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn value_to_log_string(v: &Value) -> String {
    match v {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::envelope::decode;

    fn inbound(raw: &str) -> InboundMessage {
        InboundMessage::from_envelope(&decode(raw.into()).unwrap())
    }

    #[test]
    fn track_location_reads_accuracy() {
        assert_eq!(
            inbound(r#"{"type":"track_location","accuracy":15}"#),
            InboundMessage::TrackLocation { accuracy: Some(15.0) }
        );
        assert_eq!(
            inbound(r#"{"type":"track_location","accuracy":"12.5"}"#),
            InboundMessage::TrackLocation { accuracy: Some(12.5) }
        );
    }

    #[test]
    fn track_location_falsy_accuracy_is_none() {
        for raw in [
            r#"{"type":"track_location"}"#,
            r#"{"type":"track_location","accuracy":0}"#,
            r#"{"type":"track_location","accuracy":"abc"}"#,
            r#"{"type":"track_location","accuracy":null}"#,
        ] {
            assert_eq!(
                inbound(raw),
                InboundMessage::TrackLocation { accuracy: None },
                "{raw}"
            );
        }
    }

    #[test]
    fn both_stop_aliases_map_to_stop() {
        assert_eq!(inbound("Stop_location"), InboundMessage::StopTracking);
        assert_eq!(inbound("stopTracking"), InboundMessage::StopTracking);
    }

    #[test]
    fn check_version_stringifies_numbers() {
        assert_eq!(
            inbound(r#"{"type":"Check_Version","requiredVersion":" 2.0 "}"#),
            InboundMessage::CheckVersion { required_version: Some("2.0".into()) }
        );
        assert_eq!(
            inbound(r#"{"type":"Check_Version","requiredVersion":3}"#),
            InboundMessage::CheckVersion { required_version: Some("3".into()) }
        );
        assert_eq!(
            inbound("Check_Version"),
            InboundMessage::CheckVersion { required_version: None }
        );
    }

    #[test]
    fn open_map_requires_non_empty_url() {
        assert_eq!(
            inbound(r#"{"type":"OPEN_GOOGLE_MAP","url":""}"#),
            InboundMessage::OpenMap { url: None }
        );
        assert_eq!(
            inbound(r#"{"type":"OPEN_GOOGLE_MAP","url":"geo:0,0"}"#),
            InboundMessage::OpenMap { url: Some("geo:0,0".into()) }
        );
    }

    #[test]
    fn diagnostics_keep_message() {
        assert_eq!(
            inbound(r#"{"type":"errorMessage","msg":"boom"}"#),
            InboundMessage::Diagnostic {
                level: DiagnosticLevel::Error,
                msg: Some("boom".into())
            }
        );
        assert_eq!(
            inbound(r#"{"type":"info","msg":{"a":1}}"#),
            InboundMessage::Diagnostic {
                level: DiagnosticLevel::Info,
                msg: Some(r#"{"a":1}"#.into())
            }
        );
    }

    #[test]
    fn unknown_tags_preserved() {
        let msg = inbound(r#"{"type":"future_thing","x":1}"#);
        assert_eq!(msg, InboundMessage::Unknown("future_thing".into()));
        assert_eq!(msg.tag(), "future_thing");
    }

    #[test]
    fn location_update_wire_shape() {
        let wire = OutboundMessage::LocationUpdate(LatLng { lat: 12.5, lng: 77.25 }).to_wire();
        let v: Value = serde_json::from_str(&wire).unwrap();
        assert_eq!(
            v,
            json!({"type": "location_update", "location": {"lat": 12.5, "lng": 77.25}})
        );
    }

    #[test]
    fn current_location_wire_shape() {
        let wire = OutboundMessage::CurrentLocation(LatLng { lat: 1.0, lng: 2.0 }).to_wire();
        let v: Value = serde_json::from_str(&wire).unwrap();
        assert_eq!(v["type"], "current_Location");
        assert_eq!(v["currentLocation"]["lng"], 2.0);
    }

    #[test]
    fn status_messages_carry_bool() {
        let v: Value =
            serde_json::from_str(&OutboundMessage::ConnectivityStatus(false).to_wire()).unwrap();
        assert_eq!(v, json!({"type": "onConnectivityStatus", "status": false}));
        let v: Value =
            serde_json::from_str(&OutboundMessage::LocationStatus(true).to_wire()).unwrap();
        assert_eq!(v, json!({"type": "onLocationStatus", "status": true}));
    }

    #[test]
    fn simple_replies_are_one_field() {
        assert_eq!(
            OutboundMessage::MessageError.to_wire(),
            r#"{"type":"Message_Error"}"#
        );
        assert_eq!(
            OutboundMessage::ExitRequest.to_wire(),
            r#"{"type":"EXIT_REQUEST"}"#
        );
    }

    #[test]
    fn capture_result_has_no_type() {
        let msg = OutboundMessage::CaptureResult {
            image: "data:image/jpeg;base64,AAA".into(),
            thumbnail_image: "data:image/jpeg;base64,BBB".into(),
        };
        assert!(msg.to_envelope().is_none());
        let v: Value = serde_json::from_str(&msg.to_wire()).unwrap();
        assert_eq!(
            v,
            json!({"image": "data:image/jpeg;base64,AAA", "thumbnailImage": "data:image/jpeg;base64,BBB"})
        );
    }
}
