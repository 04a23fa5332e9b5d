//! Structured Logging via tracing-subscriber
//!
//! Die Einstellungen kommen aus der `[logging]`-Sektion der
//! Orchestrator-Konfiguration; die Umgebung (`PV_LOG_LEVEL`,
//! `PV_LOG_FORMAT`) gewinnt gegenueber der Datei, damit Integratoren das
//! Logging ohne Code-Aenderung umstellen koennen. Der Kern erzwingt
//! keinen Subscriber – die einbettende Anwendung initialisiert genau
//! einmal beim Start.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing_subscriber::{fmt, EnvFilter};

const ENV_LEVEL: &str = "PV_LOG_LEVEL";
const ENV_FORMAT: &str = "PV_LOG_FORMAT";

const LEVEL_NAMEN: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// Fehler bei der Logging-Validierung
#[derive(Debug, Error, PartialEq)]
pub enum LoggingFehler {
    #[error("Unbekannter Log-Level '{0}' (erlaubt: trace/debug/info/warn/error)")]
    UnbekannterLevel(String),

    #[error("Unbekanntes Log-Format '{0}' (erlaubt: text/json)")]
    UnbekanntesFormat(String),
}

/// Ausgabeformat der Log-Zeilen
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Menschlich lesbar, fuer Entwicklung
    #[default]
    Text,
    /// Eine JSON-Zeile pro Ereignis, fuer Log-Sammler
    Json,
}

impl LogFormat {
    /// Parst einen Format-Namen wie er in Umgebung oder TOML steht
    pub fn parsen(name: &str) -> Result<Self, LoggingFehler> {
        match name {
            "text" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            andere => Err(LoggingFehler::UnbekanntesFormat(andere.to_string())),
        }
    }
}

/// `[logging]`-Sektion der Orchestrator-Konfiguration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingEinstellungen {
    /// Log-Level (trace/debug/info/warn/error)
    pub level: String,
    /// Ausgabeformat
    pub format: LogFormat,
}

impl Default for LoggingEinstellungen {
    fn default() -> Self {
        Self {
            level: "info".into(),
            format: LogFormat::Text,
        }
    }
}

impl LoggingEinstellungen {
    /// Prueft den Level-Namen (das Format ist durch den Typ abgesichert)
    pub fn validieren(&self) -> Result<(), LoggingFehler> {
        if LEVEL_NAMEN.contains(&self.level.as_str()) {
            Ok(())
        } else {
            Err(LoggingFehler::UnbekannterLevel(self.level.clone()))
        }
    }

    /// Verrechnet Konfiguration und Umgebung zu den wirksamen Werten
    ///
    /// Ungueltige Umgebungswerte werden verworfen statt den Start zu
    /// verhindern – die Datei-Konfiguration ist bereits validiert.
    fn aufloesen(
        &self,
        env_level: Option<String>,
        env_format: Option<String>,
    ) -> (String, LogFormat) {
        let level = env_level
            .filter(|l| LEVEL_NAMEN.contains(&l.as_str()))
            .unwrap_or_else(|| self.level.clone());
        let format = env_format
            .and_then(|f| LogFormat::parsen(&f).ok())
            .unwrap_or(self.format);
        (level, format)
    }
}

/// Initialisiert das Logging-System aus den gegebenen Einstellungen
///
/// `PV_LOG_LEVEL` und `PV_LOG_FORMAT` ueberschreiben die Einstellungen.
pub fn logging_initialisieren(einstellungen: &LoggingEinstellungen) {
    let (level, format) = einstellungen.aufloesen(
        std::env::var(ENV_LEVEL).ok(),
        std::env::var(ENV_FORMAT).ok(),
    );
    let filter = EnvFilter::try_new(&level).unwrap_or_else(|_| EnvFilter::new("info"));

    match format {
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(filter)
                .with_target(true)
                .with_current_span(true)
                .init();
        }
        LogFormat::Text => {
            fmt().with_env_filter(filter).with_target(true).init();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standard_ist_info_text() {
        let einstellungen = LoggingEinstellungen::default();
        assert_eq!(einstellungen.level, "info");
        assert_eq!(einstellungen.format, LogFormat::Text);
        assert!(einstellungen.validieren().is_ok());
    }

    #[test]
    fn unbekannter_level_wird_abgelehnt() {
        let einstellungen = LoggingEinstellungen {
            level: "verbose".into(),
            ..Default::default()
        };
        assert_eq!(
            einstellungen.validieren(),
            Err(LoggingFehler::UnbekannterLevel("verbose".into()))
        );
    }

    #[test]
    fn format_parsen() {
        assert_eq!(LogFormat::parsen("json"), Ok(LogFormat::Json));
        assert_eq!(LogFormat::parsen("text"), Ok(LogFormat::Text));
        assert!(LogFormat::parsen("JSON").is_err()); // Gross-/Kleinschreibung
        assert!(LogFormat::parsen("xml").is_err());
    }

    #[test]
    fn umgebung_gewinnt() {
        let einstellungen = LoggingEinstellungen::default();
        let (level, format) =
            einstellungen.aufloesen(Some("debug".into()), Some("json".into()));
        assert_eq!(level, "debug");
        assert_eq!(format, LogFormat::Json);
    }

    #[test]
    fn ungueltige_umgebung_faellt_auf_konfiguration_zurueck() {
        let einstellungen = LoggingEinstellungen {
            level: "warn".into(),
            format: LogFormat::Json,
        };
        let (level, format) =
            einstellungen.aufloesen(Some("loud".into()), Some("xml".into()));
        assert_eq!(level, "warn");
        assert_eq!(format, LogFormat::Json);
    }

    #[test]
    fn ohne_umgebung_gilt_die_konfiguration() {
        let einstellungen = LoggingEinstellungen {
            level: "trace".into(),
            format: LogFormat::Text,
        };
        let (level, format) = einstellungen.aufloesen(None, None);
        assert_eq!(level, "trace");
        assert_eq!(format, LogFormat::Text);
    }
}
