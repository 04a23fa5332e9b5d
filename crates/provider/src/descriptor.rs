//! Provider-Deskriptoren und Faehigkeiten
//!
//! Ein `ProviderDescriptor` identifiziert eine Provider-Variante: stabiler
//! Schluessel, relative Prioritaet fuer die Fallback-Kette und ein
//! Produktions-/Test-Flag. Deskriptoren sind unveraenderlich und werden
//! zur Compile- oder Konfigurationszeit aufgezaehlt.

use palaver_core::types::ProviderId;
use serde::{Deserialize, Serialize};

/// Optionale Faehigkeiten die ein Provider deklarieren kann
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderFaehigkeit {
    Audio,
    Video,
    StreamPush,
    MediaRelay,
    LautstaerkeAnzeige,
    NachrichtenVerarbeitung,
}

/// Beschreibt eine Provider-Variante – unveraenderlich
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderDescriptor {
    /// Stabiler Registry-Schluessel (z.B. "agora", "mock")
    pub id: ProviderId,
    /// Relative Prioritaet – hoeher wird in der Fallback-Kette bevorzugt
    pub prioritaet: u8,
    /// Test-Provider (Mocks, Staging-Backends) statt Produktion
    pub test_modus: bool,
}

impl ProviderDescriptor {
    /// Erstellt einen Produktions-Deskriptor
    pub fn neu(id: impl Into<ProviderId>, prioritaet: u8) -> Self {
        Self {
            id: id.into(),
            prioritaet,
            test_modus: false,
        }
    }

    /// Erstellt einen Test-Deskriptor
    pub fn test(id: impl Into<ProviderId>, prioritaet: u8) -> Self {
        Self {
            id: id.into(),
            prioritaet,
            test_modus: true,
        }
    }
}

impl std::fmt::Display for ProviderDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} (prio={}, {})",
            self.id,
            self.prioritaet,
            if self.test_modus { "test" } else { "produktion" }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deskriptor_anzeige() {
        let d = ProviderDescriptor::neu("agora", 10);
        assert_eq!(d.to_string(), "provider:agora (prio=10, produktion)");

        let t = ProviderDescriptor::test("mock", 0);
        assert!(t.to_string().contains("test"));
    }

    #[test]
    fn faehigkeit_serde_snake_case() {
        let json = serde_json::to_string(&ProviderFaehigkeit::StreamPush).unwrap();
        assert_eq!(json, "\"stream_push\"");
    }
}
