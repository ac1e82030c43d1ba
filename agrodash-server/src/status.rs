/**
 * STATUS EVALUATOR - Seuils capteurs → alertes + état global
 *
 * Fonction pure : même snapshot, même résultat. Un topic absent prend une
 * valeur "milieu de gamme" qui ne déclenche aucune alerte. Au plus une
 * alerte par topic, dans l'ordre humidité, température, vent.
 */

use crate::models::{Alert, OverallStatus, SensorSnapshot, Severity, SystemStatus};
use time::macros::format_description;
use time::OffsetDateTime;

const DEFAULT_HUMIDITY: f64 = 50.0;
const DEFAULT_TEMPERATURE: f64 = 25.0;
const DEFAULT_WIND: f64 = 15.0;

/// Seuil sous lequel l'irrigation est recommandée (indépendant des alertes).
const IRRIGATION_HUMIDITY: f64 = 30.0;

/// Évalue un snapshot. `last_update` est le seul champ qui dépend de `now`.
pub fn evaluate(snapshot: &SensorSnapshot, now: OffsetDateTime) -> SystemStatus {
    let humidity = snapshot.value_of("humidity").unwrap_or(DEFAULT_HUMIDITY);
    let temperature = snapshot.value_of("temperature").unwrap_or(DEFAULT_TEMPERATURE);
    let wind = snapshot.value_of("wind").unwrap_or(DEFAULT_WIND);

    let alerts: Vec<Alert> = [
        humidity_alert(humidity),
        temperature_alert(temperature),
        wind_alert(wind),
    ]
    .into_iter()
    .flatten()
    .collect();

    let overall = if alerts.is_empty() {
        OverallStatus::Good
    } else if alerts.iter().any(|a| a.severity == Severity::Danger) {
        OverallStatus::Critical
    } else {
        OverallStatus::Warning
    };

    SystemStatus {
        overall,
        alerts,
        irrigation_needed: humidity < IRRIGATION_HUMIDITY,
        last_update: format_time_of_day(now),
    }
}

fn format_time_of_day(now: OffsetDateTime) -> String {
    now.format(format_description!("[hour]:[minute]:[second]"))
        .unwrap_or_default()
}

fn alert(severity: Severity, message: &str, icon: &str) -> Alert {
    Alert {
        severity,
        message: message.to_string(),
        icon: icon.to_string(),
    }
}

fn humidity_alert(value: f64) -> Option<Alert> {
    if value < 20.0 {
        Some(alert(
            Severity::Danger,
            "Dry soil conditions. Irrigation required.",
            "exclamation-triangle",
        ))
    } else if value < 30.0 {
        Some(alert(
            Severity::Warning,
            "Low soil humidity. Consider irrigating.",
            "exclamation-circle",
        ))
    } else {
        None
    }
}

fn temperature_alert(value: f64) -> Option<Alert> {
    if value > 35.0 {
        Some(alert(
            Severity::Danger,
            "Danger, extreme temperature! Crops may be taking damage, check them.",
            "thermometer-full",
        ))
    } else if value > 30.0 {
        Some(alert(Severity::Warning, "Attention, high temperature.", "thermometer-half"))
    } else {
        None
    }
}

fn wind_alert(value: f64) -> Option<Alert> {
    if value > 60.0 {
        Some(alert(
            Severity::Danger,
            "Danger, extreme winds! Risk of crop lodging.",
            "wind",
        ))
    } else if value > 40.0 {
        Some(alert(Severity::Warning, "Attention, strong winds in the area.", "wind"))
    } else {
        None
    }
}
