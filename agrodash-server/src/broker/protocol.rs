//! Protocole filaire du broker : JSON délimité par `\n`, UTF-8.

use crate::models::SensorReading;
use serde::{Deserialize, Serialize};
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

#[derive(Debug, Serialize)]
struct GetCurrentRequest<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    topic: &'a str,
    data: u8,
    timestamp: String,
    client_id: &'a str,
}

/// Ligne de requête `get_current`, `\n` final inclus.
pub fn encode_get_current(now: OffsetDateTime, client_id: &str) -> Result<Vec<u8>, EncodeError> {
    let request = GetCurrentRequest {
        kind: "get_current",
        topic: "",
        data: 0,
        timestamp: now.format(&Rfc3339)?,
        client_id,
    };
    let mut line = serde_json::to_vec(&request)?;
    line.push(b'\n');
    Ok(line)
}

#[derive(Debug, thiserror::Error)]
pub enum EncodeError {
    #[error("timestamp formatting failed: {0}")]
    Timestamp(#[from] time::error::Format),
    #[error("JSON encoding failed: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
enum BrokerMessage {
    #[serde(rename = "sensor_data")]
    SensorData {
        topic: String,
        data: f64,
        #[serde(default)]
        timestamp: String,
    },
    #[serde(other)]
    Other,
}

#[derive(Debug, PartialEq)]
pub enum LineOutcome {
    Reading(SensorReading),
    /// JSON valide mais pas un `sensor_data`.
    Ignored,
    Malformed,
}

pub fn decode_line(line: &[u8]) -> LineOutcome {
    let Ok(text) = std::str::from_utf8(line) else {
        return LineOutcome::Malformed;
    };
    let text = text.trim();
    if text.is_empty() {
        return LineOutcome::Malformed;
    }
    match serde_json::from_str::<BrokerMessage>(text) {
        Ok(BrokerMessage::SensorData { topic, data, timestamp }) => {
            LineOutcome::Reading(SensorReading::new(topic, data, timestamp))
        }
        Ok(BrokerMessage::Other) => LineOutcome::Ignored,
        Err(_) => LineOutcome::Malformed,
    }
}

/// Accumule les octets reçus et rend les lignes complètes ; la ligne
/// partielle finale reste en attente du prochain chunk. Travaille en
/// octets pour ne pas casser un caractère UTF-8 coupé entre deux lectures.
#[derive(Debug, Default)]
pub struct LineBuffer {
    buf: Vec<u8>,
}

impl LineBuffer {
    pub fn extend(&mut self, chunk: &[u8]) {
        self.buf.extend_from_slice(chunk);
    }

    /// Ligne suivante, sans le `\n`.
    pub fn next_line(&mut self) -> Option<Vec<u8>> {
        let pos = self.buf.iter().position(|&b| b == b'\n')?;
        let mut line: Vec<u8> = self.buf.drain(..=pos).collect();
        line.pop();
        Some(line)
    }

    pub fn pending(&self) -> usize {
        self.buf.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    #[test]
    fn test_get_current_request_line() {
        let line = encode_get_current(datetime!(2024-05-01 12:30:00 UTC), "dashboard").unwrap();
        assert_eq!(line.last(), Some(&b'\n'));

        let json: serde_json::Value = serde_json::from_slice(&line[..line.len() - 1]).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "type": "get_current",
                "topic": "",
                "data": 0,
                "timestamp": "2024-05-01T12:30:00Z",
                "client_id": "dashboard"
            })
        );
    }

    #[test]
    fn test_decode_sensor_data() {
        let outcome = decode_line(
            br#"{"type":"sensor_data","topic":"humidity","data":42.5,"timestamp":"2024-05-01T12:00:00Z","client_id":"broker"}"#,
        );
        assert_eq!(
            outcome,
            LineOutcome::Reading(SensorReading::new("humidity", 42.5, "2024-05-01T12:00:00Z"))
        );
    }

    #[test]
    fn test_decode_unknown_topic_keeps_empty_unit() {
        let LineOutcome::Reading(reading) =
            decode_line(br#"{"type":"sensor_data","topic":"rain","data":3,"timestamp":"x"}"#)
        else {
            panic!("expected a reading");
        };
        assert_eq!(reading.topic, "rain");
        assert_eq!(reading.value, 3.0);
        assert_eq!(reading.unit, "");
    }

    #[test]
    fn test_decode_other_and_malformed_lines() {
        assert_eq!(decode_line(br#"{"type":"subscribe","topic":"wind"}"#), LineOutcome::Ignored);
        assert_eq!(decode_line(b"{not json"), LineOutcome::Malformed);
        assert_eq!(decode_line(b""), LineOutcome::Malformed);
        assert_eq!(decode_line(b"  \r"), LineOutcome::Malformed);
        assert_eq!(decode_line(br#"{"topic":"wind","data":1}"#), LineOutcome::Malformed);
        assert_eq!(decode_line(br#"{"type":"sensor_data","topic":"wind"}"#), LineOutcome::Malformed);
        assert_eq!(decode_line(&[0xff, 0xfe]), LineOutcome::Malformed);
    }

    #[test]
    fn test_decode_tolerates_crlf() {
        let outcome = decode_line(b"{\"type\":\"sensor_data\",\"topic\":\"wind\",\"data\":7,\"timestamp\":\"t\"}\r");
        assert!(matches!(outcome, LineOutcome::Reading(_)));
    }

    #[test]
    fn test_line_buffer_keeps_partial_line() {
        let mut buffer = LineBuffer::default();
        buffer.extend(b"first\nsec");
        assert_eq!(buffer.next_line(), Some(b"first".to_vec()));
        assert_eq!(buffer.next_line(), None);
        assert_eq!(buffer.pending(), 3);

        buffer.extend(b"ond\n\nthird");
        assert_eq!(buffer.next_line(), Some(b"second".to_vec()));
        assert_eq!(buffer.next_line(), Some(Vec::new()));
        assert_eq!(buffer.next_line(), None);
        assert_eq!(buffer.pending(), 5);
    }

    #[test]
    fn test_line_buffer_rejoins_split_utf8() {
        let line = "{\"type\":\"sensor_data\",\"topic\":\"température\",\"data\":1,\"timestamp\":\"t\"}\n";
        let bytes = line.as_bytes();
        let split = line.find('é').unwrap() + 1; // au milieu du caractère

        let mut buffer = LineBuffer::default();
        buffer.extend(&bytes[..split]);
        assert_eq!(buffer.next_line(), None);
        buffer.extend(&bytes[split..]);

        let decoded = buffer.next_line().map(|l| decode_line(&l));
        let Some(LineOutcome::Reading(reading)) = decoded else {
            panic!("expected a reading");
        };
        assert_eq!(reading.topic, "température");
    }
}
