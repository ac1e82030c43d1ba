/*!
Builders de messages du protocole broker

Une ligne = un objet JSON terminé par `\n`. Les builders produisent des
lignes prêtes à écrire sur le socket, au format émis par le broker.
*/

use serde::{Deserialize, Serialize};

/// Message du protocole (requêtes et réponses partagent la même forme).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WireMessage {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub topic: String,
    #[serde(default)]
    pub data: f64,
    #[serde(default)]
    pub timestamp: String,
    #[serde(default)]
    pub client_id: String,
}

impl WireMessage {
    pub fn to_line(&self) -> String {
        // Sérialiser une struct de String/f64 ne peut pas échouer
        let mut line = serde_json::to_string(self).unwrap_or_default();
        line.push('\n');
        line
    }
}

pub struct WireMessageBuilder;

impl WireMessageBuilder {
    /// Lecture capteur telle que le broker la renvoie pour `get_current`
    pub fn sensor_data<S: Into<String>>(topic: S, value: f64) -> WireMessage {
        WireMessage {
            kind: "sensor_data".into(),
            topic: topic.into(),
            data: value,
            timestamp: chrono::Utc::now().to_rfc3339(),
            client_id: "broker".into(),
        }
    }

    /// Requête `get_current` d'un client
    pub fn get_current<S: Into<String>>(client_id: S) -> WireMessage {
        WireMessage {
            kind: "get_current".into(),
            topic: String::new(),
            data: 0.0,
            timestamp: chrono::Utc::now().to_rfc3339(),
            client_id: client_id.into(),
        }
    }

    /// Message quelconque (subscribe, unsubscribe...) que le client doit ignorer
    pub fn other<S: Into<String>>(kind: S, topic: S) -> WireMessage {
        WireMessage {
            kind: kind.into(),
            topic: topic.into(),
            data: 0.0,
            timestamp: chrono::Utc::now().to_rfc3339(),
            client_id: "broker".into(),
        }
    }

    /// Concatène plusieurs messages en un seul bloc d'octets
    pub fn lines(messages: &[WireMessage]) -> Vec<u8> {
        messages.iter().map(WireMessage::to_line).collect::<String>().into_bytes()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sensor_data_line() {
        let line = WireMessageBuilder::sensor_data("humidity", 42.5).to_line();
        assert!(line.ends_with('\n'));

        let json: serde_json::Value = serde_json::from_str(line.trim_end()).unwrap();
        assert_eq!(json["type"], "sensor_data");
        assert_eq!(json["topic"], "humidity");
        assert_eq!(json["data"], 42.5);
        assert!(chrono::DateTime::parse_from_rfc3339(json["timestamp"].as_str().unwrap()).is_ok());
    }

    #[test]
    fn test_lines_concatenates() {
        let bytes = WireMessageBuilder::lines(&[
            WireMessageBuilder::sensor_data("wind", 1.0),
            WireMessageBuilder::other("subscribe", "wind"),
        ]);
        assert_eq!(bytes.iter().filter(|&&b| b == b'\n').count(), 2);
    }

    #[test]
    fn test_parses_client_request() {
        let msg: WireMessage = serde_json::from_str(
            r#"{"type":"get_current","topic":"","data":0,"timestamp":"2024-05-01T12:00:00Z","client_id":"dashboard"}"#,
        )
        .unwrap();
        assert_eq!(msg.kind, "get_current");
        assert_eq!(msg.client_id, "dashboard");
    }
}
