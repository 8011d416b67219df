//! Canonical envelope and payload normalization.
//!
//! The feed delivers either a single JSON event or a JSON array of events per
//! frame. [`normalize`] turns one frame into one envelope per event and never
//! fails: anything that does not parse as an array is forwarded as a single
//! opaque event.

use serde::{Serialize, Serializer};
use serde_json::value::RawValue;
use serde_json::Value;

/// Key used when an event carries no usable symbol.
pub const UNKNOWN_KEY: &str = "unknown";

/// Wrapper published to the queue around each raw feed event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Envelope {
    pub source: String,
    pub feed: String,
    #[serde(rename = "ingest_ts_ms")]
    pub ingest_timestamp_ms: i64,
    #[serde(serialize_with = "serialize_event")]
    pub event: Vec<u8>,
}

impl Envelope {
    /// Partition key derived from this envelope's own event.
    pub fn partition_key(&self) -> String {
        partition_key(&self.event)
    }

    /// JSON bytes written as the queue message value.
    pub fn to_json(&self) -> serde_json::Result<Vec<u8>> {
        serde_json::to_vec(self)
    }
}

// Valid JSON is embedded verbatim; anything else is carried as a string.
fn serialize_event<S>(event: &[u8], serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    match std::str::from_utf8(event).ok().and_then(|s| serde_json::from_str::<&RawValue>(s).ok()) {
        | Some(raw) => raw.serialize(serializer),
        | None => serializer.serialize_str(&String::from_utf8_lossy(event)),
    }
}

/// Split one raw frame into envelopes sharing `source`, `feed` and `ingest_timestamp_ms`.
pub fn normalize(raw: &[u8], source: &str, feed: &str, ingest_timestamp_ms: i64) -> Vec<Envelope> {
    split_events(raw)
        .into_iter()
        .map(|event| Envelope {
            source: source.to_string(),
            feed: feed.to_string(),
            ingest_timestamp_ms,
            event: event.to_vec(),
        })
        .collect()
}

/// Split a frame into the byte slices of its events, in order.
pub fn split_events(raw: &[u8]) -> Vec<&[u8]> {
    let raw = trim_ascii_whitespace(raw);
    if raw.is_empty() {
        return Vec::new();
    }
    if raw[0] == b'[' {
        if let Ok(items) = std::str::from_utf8(raw)
            .map_err(|_| ())
            .and_then(|s| serde_json::from_str::<Vec<&RawValue>>(s).map_err(|_| ()))
        {
            return items.into_iter().map(|item| item.get().as_bytes()).collect();
        }
    }
    vec![raw]
}

/// Strip spaces, tabs, CR and LF from both ends.
pub fn trim_ascii_whitespace(bytes: &[u8]) -> &[u8] {
    let is_ws = |b: &u8| matches!(b, b' ' | b'\n' | b'\r' | b'\t');
    let start = bytes.iter().position(|b| !is_ws(b)).unwrap_or(bytes.len());
    let end = bytes.iter().rposition(|b| !is_ws(b)).map_or(start, |i| i + 1);
    &bytes[start..end]
}

/// `S`, then `symbol`; the first non-empty string wins. Anything that is not
/// a JSON object maps to [`UNKNOWN_KEY`].
pub fn partition_key(event: &[u8]) -> String {
    let value = match serde_json::from_slice::<Value>(event) {
        | Ok(value) => value,
        | Err(_) => return UNKNOWN_KEY.to_string(),
    };
    let fields = match value.as_object() {
        | Some(fields) => fields,
        | None => return UNKNOWN_KEY.to_string(),
    };
    ["S", "symbol"]
        .iter()
        .filter_map(|name| fields.get(*name).and_then(Value::as_str))
        .find(|s| !s.is_empty())
        .map_or_else(|| UNKNOWN_KEY.to_string(), str::to_string)
}
