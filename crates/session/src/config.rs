//! Orchestrator-Konfiguration
//!
//! Wird aus einer TOML-Datei geladen. Alle Felder haben sinnvolle
//! Standardwerte, sodass der Orchestrator ohne Konfigurationsdatei
//! lauffaehig ist.

use std::collections::HashMap;

use palaver_core::types::ProviderId;
use palaver_observability::LoggingEinstellungen;
use palaver_token::RetryKonfiguration;
use palaver_volume::LautstaerkeKonfiguration;
use serde::{Deserialize, Serialize};

use crate::error::{Result, SessionError};

/// Vollstaendige Orchestrator-Konfiguration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct OrchestratorKonfiguration {
    /// Fallback-Kette: bevorzugte Provider in absteigender Reihenfolge
    pub fallback_kette: Vec<ProviderId>,
    /// Token-Einstellungen
    pub token: TokenEinstellungen,
    /// Lautstaerke-Erkennung
    pub lautstaerke: LautstaerkeKonfiguration,
    /// Logging der einbettenden Anwendung
    pub logging: LoggingEinstellungen,
}

/// Token-Einstellungen des Orchestrators
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TokenEinstellungen {
    /// Vorlauf vor Ablauf in Sekunden, ab dem erneuert wird
    pub vorlauf_sekunden: u32,
    /// Standard-Retry fuer alle Provider
    pub retry: RetryKonfiguration,
    /// Retry-Ueberschreibungen pro Provider
    pub retry_overrides: HashMap<ProviderId, RetryKonfiguration>,
}

impl Default for TokenEinstellungen {
    fn default() -> Self {
        Self {
            vorlauf_sekunden: palaver_token::STANDARD_VORLAUF_SEKUNDEN,
            retry: RetryKonfiguration::default(),
            retry_overrides: HashMap::new(),
        }
    }
}

impl OrchestratorKonfiguration {
    /// Laedt die Konfiguration aus einer TOML-Datei.
    /// Gibt die Standardkonfiguration zurueck wenn die Datei nicht existiert.
    pub fn laden(pfad: &str) -> Result<Self> {
        match std::fs::read_to_string(pfad) {
            Ok(inhalt) => Self::aus_toml(&inhalt),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::warn!(
                    pfad = pfad,
                    "Konfigurationsdatei nicht gefunden, verwende Standardwerte"
                );
                Ok(Self::default())
            }
            Err(e) => Err(SessionError::Konfiguration(format!(
                "Konfigurationsdatei '{pfad}' nicht lesbar: {e}"
            ))),
        }
    }

    /// Parst die Konfiguration aus einem TOML-String und validiert sie
    pub fn aus_toml(inhalt: &str) -> Result<Self> {
        let konfig: Self = toml::from_str(inhalt)
            .map_err(|e| SessionError::Konfiguration(format!("TOML-Fehler: {e}")))?;
        konfig
            .lautstaerke
            .validieren()
            .map_err(|e| SessionError::Konfiguration(e.to_string()))?;
        konfig
            .logging
            .validieren()
            .map_err(|e| SessionError::Konfiguration(e.to_string()))?;
        Ok(konfig)
    }

    /// Retry-Konfiguration fuer einen Provider (Override oder Standard)
    pub fn retry_fuer(&self, provider: &ProviderId) -> &RetryKonfiguration {
        self.token
            .retry_overrides
            .get(provider)
            .unwrap_or(&self.token.retry)
    }

    /// Naechster Kandidat der Fallback-Kette nach dem aktuellen Provider
    ///
    /// `None` wenn der aktuelle Provider nicht in der Kette steht oder
    /// bereits ihr letztes Glied ist. Der Orchestrator wechselt nie
    /// selbstaendig; der Aufrufer entscheidet anhand dieser Auskunft.
    pub fn naechster_fallback(&self, aktuell: &ProviderId) -> Option<&ProviderId> {
        let position = self.fallback_kette.iter().position(|p| p == aktuell)?;
        self.fallback_kette.get(position + 1)
    }
}
