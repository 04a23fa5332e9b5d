//! Konfiguration der Lautstaerke-Erkennung
//!
//! Alle Felder werden beim Erstellen auf ihre deklarierte Spanne geclamped
//! (dokumentierte Normalisierung, kein Fehler). Einzig die Schwellen-Ordnung
//! ist ein harter Validierungsfehler: die Sprech-Schwelle muss ueber der
//! Stille-Schwelle liegen.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Spanne des Erkennungsintervalls in Millisekunden
const INTERVALL_MIN_MS: u64 = 100;
const INTERVALL_MAX_MS: u64 = 5000;

/// Fehler bei der Konfigurations-Validierung
#[derive(Debug, Error, PartialEq)]
pub enum LautstaerkeKonfigFehler {
    #[error("Sprech-Schwelle ({sprech}) muss ueber der Stille-Schwelle ({stille}) liegen")]
    SchwellenOrdnung { sprech: f32, stille: f32 },
}

/// Konfiguration der Lautstaerke-Erkennung
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LautstaerkeKonfiguration {
    /// Erkennungsintervall in ms (geclamped auf 100–5000)
    pub intervall_ms: u64,
    /// Ab diesem geglaetteten Pegel gilt ein Benutzer als sprechend ([0,1])
    pub sprech_schwelle: f32,
    /// Unter diesem Pegel gilt ein Benutzer sicher als still ([0,1])
    pub stille_schwelle: f32,
    /// Glaettungsfaktor der EMA ([0,1]; 1.0 = keine Glaettung)
    pub glaettung: f32,
}

impl Default for LautstaerkeKonfiguration {
    fn default() -> Self {
        Self {
            intervall_ms: 500,
            sprech_schwelle: 0.3,
            stille_schwelle: 0.1,
            glaettung: 0.3,
        }
    }
}

impl LautstaerkeKonfiguration {
    /// Erstellt eine Konfiguration mit Clamping und Schwellen-Validierung
    pub fn neu(
        intervall_ms: u64,
        sprech_schwelle: f32,
        stille_schwelle: f32,
        glaettung: f32,
    ) -> Result<Self, LautstaerkeKonfigFehler> {
        let konfig = Self {
            intervall_ms: intervall_ms.clamp(INTERVALL_MIN_MS, INTERVALL_MAX_MS),
            sprech_schwelle: sprech_schwelle.clamp(0.0, 1.0),
            stille_schwelle: stille_schwelle.clamp(0.0, 1.0),
            glaettung: glaettung.clamp(0.0, 1.0),
        };
        konfig.validieren()?;
        Ok(konfig)
    }

    /// Prueft die Schwellen-Ordnung (nach Deserialisierung aufrufen)
    pub fn validieren(&self) -> Result<(), LautstaerkeKonfigFehler> {
        if self.sprech_schwelle <= self.stille_schwelle {
            return Err(LautstaerkeKonfigFehler::SchwellenOrdnung {
                sprech: self.sprech_schwelle,
                stille: self.stille_schwelle,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standard_ist_gueltig() {
        let konfig = LautstaerkeKonfiguration::default();
        assert!(konfig.validieren().is_ok());
    }

    #[test]
    fn intervall_wird_geclamped() {
        let konfig = LautstaerkeKonfiguration::neu(10, 0.5, 0.1, 0.3).unwrap();
        assert_eq!(konfig.intervall_ms, 100);

        let konfig = LautstaerkeKonfiguration::neu(99_999, 0.5, 0.1, 0.3).unwrap();
        assert_eq!(konfig.intervall_ms, 5000);
    }

    #[test]
    fn schwellen_werden_geclamped() {
        let konfig = LautstaerkeKonfiguration::neu(500, 7.0, -2.0, 5.0).unwrap();
        assert_eq!(konfig.sprech_schwelle, 1.0);
        assert_eq!(konfig.stille_schwelle, 0.0);
        assert_eq!(konfig.glaettung, 1.0);
    }

    #[test]
    fn schwellen_ordnung_wird_erzwungen() {
        let err = LautstaerkeKonfiguration::neu(500, 0.2, 0.5, 0.3).unwrap_err();
        assert!(matches!(
            err,
            LautstaerkeKonfigFehler::SchwellenOrdnung { .. }
        ));

        // Gleichheit ist ebenfalls ungueltig
        assert!(LautstaerkeKonfiguration::neu(500, 0.3, 0.3, 0.3).is_err());
    }

    #[test]
    fn konfiguration_aus_toml() {
        let konfig: LautstaerkeKonfiguration =
            toml::from_str("sprech_schwelle = 0.4\nglaettung = 0.5").unwrap();
        assert_eq!(konfig.sprech_schwelle, 0.4);
        assert_eq!(konfig.glaettung, 0.5);
        // Nicht gesetzte Felder fallen auf Defaults zurueck
        assert_eq!(konfig.intervall_ms, 500);
        assert!(konfig.validieren().is_ok());
    }
}
