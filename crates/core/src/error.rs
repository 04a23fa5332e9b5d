//! Fehlertypen fuer Palaver
//!
//! Zentraler Fehler-Enum der alle moeglichen Fehlerzustaende abdeckt.
//! Untermodule (Provider, Token, Pipeline, Session) definieren eigene
//! Fehler und konvertieren via `#[from]` an der Kompositionskante.

use thiserror::Error;

use crate::types::{MessageId, ProviderId};

/// Globaler Result-Alias fuer Palaver
pub type Result<T> = std::result::Result<T, PalaverError>;

/// Alle moeglichen Fehler im Palaver-Kern
#[derive(Debug, Error)]
pub enum PalaverError {
    // --- Provider-Lebenszyklus ---
    #[error("Provider nicht verfuegbar: {0}")]
    ProviderNichtVerfuegbar(ProviderId),

    #[error("Provider bereits initialisiert: {0}")]
    ProviderBereitsInitialisiert(ProviderId),

    #[error("Provider-Initialisierung fehlgeschlagen ({provider}): {grund}")]
    ProviderInitialisierung { provider: ProviderId, grund: String },

    #[error("Provider-Wechsel fehlgeschlagen ({von} -> {nach}): {grund}")]
    ProviderWechsel {
        von: ProviderId,
        nach: ProviderId,
        grund: String,
    },

    // --- Session ---
    #[error("Keine aktive Session")]
    KeineAktiveSession,

    #[error("Operation laeuft bereits")]
    OperationLaeuftBereits,

    // --- Token ---
    #[error("Kein Erneuerungs-Handler registriert fuer {0}")]
    KeinTokenHandler(ProviderId),

    #[error("Token-Erneuerung fehlgeschlagen ({provider}, {versuche} Versuche): {grund}")]
    TokenErneuerung {
        provider: ProviderId,
        versuche: u32,
        grund: String,
    },

    #[error("Token abgelaufen: {0}")]
    TokenAbgelaufen(ProviderId),

    // --- Nachrichten ---
    #[error("Prozessor bereits registriert fuer Typ: {0}")]
    ProzessorBereitsRegistriert(String),

    #[error("Prozessor nicht gefunden: {0}")]
    ProzessorNichtGefunden(String),

    #[error("Verarbeitung fehlgeschlagen ({nachricht}): {grund}")]
    VerarbeitungFehlgeschlagen { nachricht: MessageId, grund: String },

    #[error("Ungueltige Nachricht: {0}")]
    UngueltigeNachricht(String),

    // --- Validierung & Konfiguration ---
    #[error("Ungueltiger Parameter: {0}")]
    Validierung(String),

    #[error("Konfigurationsfehler: {0}")]
    Konfiguration(String),

    // --- Persistenz ---
    #[error("Persistenzfehler: {0}")]
    Persistenz(String),

    // --- Intern ---
    #[error("Interner Fehler: {0}")]
    Intern(String),

    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}

impl PalaverError {
    /// Erstellt einen internen Fehler aus einer beliebigen Nachricht
    pub fn intern(msg: impl Into<String>) -> Self {
        Self::Intern(msg.into())
    }

    /// Gibt true zurueck wenn der Fehler wiederholbar sein koennte
    ///
    /// Initialisierungs- und Token-Fehler sind netzwerkgebunden; ein
    /// erneuter Versuch (oder ein Fallback-Provider) kann sinnvoll sein.
    pub fn ist_wiederholbar(&self) -> bool {
        matches!(
            self,
            Self::ProviderInitialisierung { .. }
                | Self::ProviderWechsel { .. }
                | Self::TokenErneuerung { .. }
        )
    }
}
