use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};

/// Unité d'affichage d'un topic ("" pour un topic inconnu).
pub fn unit_for_topic(topic: &str) -> &'static str {
    match topic {
        "humidity" => "%",
        "temperature" => "°C",
        "wind" => "km/h",
        _ => "",
    }
}

/// Une lecture décodée depuis une ligne `sensor_data` du broker.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SensorReading {
    #[serde(skip)]
    pub topic: String,
    pub value: f64,
    pub timestamp: String,
    pub unit: String,
}

impl SensorReading {
    pub fn new(topic: impl Into<String>, value: f64, timestamp: impl Into<String>) -> Self {
        let topic = topic.into();
        let unit = unit_for_topic(&topic).to_string();
        Self {
            topic,
            value,
            timestamp: timestamp.into(),
            unit,
        }
    }
}

/// Dernières lectures d'un cycle, indexées par topic, dans l'ordre d'arrivée.
/// Sérialisé comme un objet JSON `{topic: {value, timestamp, unit}}`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SensorSnapshot {
    readings: Vec<SensorReading>,
}

impl SensorSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Last-write-wins : un topic déjà présent garde sa position.
    pub fn upsert(&mut self, reading: SensorReading) {
        match self.readings.iter_mut().find(|r| r.topic == reading.topic) {
            Some(existing) => *existing = reading,
            None => self.readings.push(reading),
        }
    }

    pub fn get(&self, topic: &str) -> Option<&SensorReading> {
        self.readings.iter().find(|r| r.topic == topic)
    }

    pub fn value_of(&self, topic: &str) -> Option<f64> {
        self.get(topic).map(|r| r.value)
    }

    pub fn topics(&self) -> impl Iterator<Item = &str> {
        self.readings.iter().map(|r| r.topic.as_str())
    }

    pub fn len(&self) -> usize {
        self.readings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.readings.is_empty()
    }
}

impl FromIterator<SensorReading> for SensorSnapshot {
    fn from_iter<I: IntoIterator<Item = SensorReading>>(iter: I) -> Self {
        let mut snapshot = Self::new();
        for reading in iter {
            snapshot.upsert(reading);
        }
        snapshot
    }
}

impl Serialize for SensorSnapshot {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.readings.len()))?;
        for reading in &self.readings {
            map.serialize_entry(&reading.topic, reading)?;
        }
        map.end()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Warning,
    Danger,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Alert {
    #[serde(rename = "type")]
    pub severity: Severity,
    pub message: String,
    pub icon: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OverallStatus {
    Good,
    Warning,
    Critical,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SystemStatus {
    pub overall: OverallStatus,
    pub alerts: Vec<Alert>,
    pub irrigation_needed: bool,
    pub last_update: String,
}

/// Point d'historique fabriqué (HH:MM, valeur arrondie à 0.1).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistoricalPoint {
    pub timestamp: String,
    pub value: f64,
}
