//! Message bridge
//!
//! Decodes raw payloads relayed from the Avaturn iframe into a closed set of
//! events. Decoding never fails: anything that is not an actionable avatar
//! export comes back as [`InboundEvent::Malformed`] or
//! [`InboundEvent::Irrelevant`].

use serde_json::Value;
use thiserror::Error;

/// `source` value sent by the Avaturn iframe
pub const AVATURN_SOURCE: &str = "avaturn";

/// `eventName` of an avatar export
pub const AVATAR_EXPORTED: &str = "v2.avatar.exported";

/// Why a payload was rejected as malformed
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MalformedReason {
    #[error("payload is not valid JSON: {0}")]
    InvalidJson(String),

    #[error("avatar export without a string data.url")]
    MissingUrl,
}

/// Why a well-formed payload was ignored
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IrrelevantReason {
    #[error("payload is not a JSON object")]
    NotAnObject,

    #[error("foreign source {0:?}")]
    ForeignSource(Option<String>),

    #[error("unhandled event {0:?}")]
    UnknownEvent(Option<String>),
}

/// How Avaturn delivered the exported asset
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UrlType {
    /// `"httpURL"`: a link to the hosted GLB
    Http,
    /// `"dataURL"`: the GLB inlined as base64
    Data,
    Other(String),
}

impl UrlType {
    fn parse(value: &str) -> Self {
        match value {
            "httpURL" => UrlType::Http,
            "dataURL" => UrlType::Data,
            other => UrlType::Other(other.to_string()),
        }
    }
}

/// A decoded inbound message
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundEvent {
    Malformed(MalformedReason),
    Irrelevant(IrrelevantReason),
    AvatarExported {
        url: String,
        url_type: Option<UrlType>,
    },
}

/// Decode a raw message payload
pub fn decode(raw: &str) -> InboundEvent {
    let json: Value = match serde_json::from_str(raw) {
        Ok(json) => json,
        Err(e) => return InboundEvent::Malformed(MalformedReason::InvalidJson(e.to_string())),
    };

    let Some(object) = json.as_object() else {
        return InboundEvent::Irrelevant(IrrelevantReason::NotAnObject);
    };

    match object.get("source") {
        Some(Value::String(source)) if source == AVATURN_SOURCE => {}
        other => {
            let source = other.map(|v| match v {
                Value::String(s) => s.clone(),
                v => v.to_string(),
            });
            return InboundEvent::Irrelevant(IrrelevantReason::ForeignSource(source));
        }
    }

    match object.get("eventName").and_then(Value::as_str) {
        Some(AVATAR_EXPORTED) => {}
        other => {
            return InboundEvent::Irrelevant(IrrelevantReason::UnknownEvent(
                other.map(str::to_string),
            ))
        }
    }

    let data = object.get("data");
    let Some(url) = data.and_then(|d| d.get("url")).and_then(Value::as_str) else {
        return InboundEvent::Malformed(MalformedReason::MissingUrl);
    };

    let url_type = data
        .and_then(|d| d.get("urlType"))
        .and_then(Value::as_str)
        .map(UrlType::parse);

    InboundEvent::AvatarExported {
        url: url.to_string(),
        url_type,
    }
}
