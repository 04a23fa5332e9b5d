//! Fehlertypen des Session-Orchestrators

use palaver_pipeline::PipelineError;
use palaver_provider::ProviderError;
use palaver_token::TokenError;
use thiserror::Error;

/// Result-Alias fuer Session-Operationen
pub type Result<T> = std::result::Result<T, SessionError>;

/// Fehler rund um Session-Aufbau, Provider-Wechsel und Ereignis-Verteilung
#[derive(Debug, Error)]
pub enum SessionError {
    /// Operation verlangt eine konfigurierte Session
    #[error("Keine aktive Session")]
    KeineAktiveSession,

    /// Konfigurieren/Wechseln laeuft bereits auf einem anderen Task
    #[error("Operation laeuft bereits")]
    OperationLaeuftBereits,

    /// Fehler aus dem Provider-Subsystem, durchgereicht
    #[error(transparent)]
    Provider(#[from] ProviderError),

    /// Fehler aus dem Token-Subsystem, durchgereicht
    #[error(transparent)]
    Token(#[from] TokenError),

    /// Fehler aus der Nachrichten-Pipeline, durchgereicht
    #[error(transparent)]
    Pipeline(#[from] PipelineError),

    /// Snapshot konnte nicht (de)serialisiert werden
    #[error("Snapshot-Serialisierung fehlgeschlagen: {0}")]
    Serialisierung(#[from] serde_json::Error),

    /// Fehler des hinterlegten Snapshot-Stores
    #[error("Persistenzfehler: {0}")]
    Persistenz(#[source] anyhow::Error),

    /// Konfigurationsdatei fehlerhaft oder nicht lesbar
    #[error("Konfigurationsfehler: {0}")]
    Konfiguration(String),
}

impl From<SessionError> for palaver_core::PalaverError {
    fn from(e: SessionError) -> Self {
        match e {
            SessionError::KeineAktiveSession => Self::KeineAktiveSession,
            SessionError::OperationLaeuftBereits => Self::OperationLaeuftBereits,
            SessionError::Provider(p) => p.into(),
            SessionError::Token(t) => t.into(),
            SessionError::Pipeline(p) => p.into(),
            SessionError::Serialisierung(s) => Self::Persistenz(s.to_string()),
            SessionError::Persistenz(p) => Self::Persistenz(p.to_string()),
            SessionError::Konfiguration(k) => Self::Konfiguration(k),
        }
    }
}
