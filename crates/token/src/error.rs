//! Fehlertypen des Token-Subsystems

use palaver_core::types::ProviderId;
use thiserror::Error;

/// Result-Alias fuer Token-Operationen
pub type Result<T> = std::result::Result<T, TokenError>;

/// Fehler rund um den Token-Lebenszyklus
#[derive(Debug, Error)]
pub enum TokenError {
    /// Kein Erneuerungs-Handler fuer diesen Provider registriert
    #[error("Kein Erneuerungs-Handler registriert fuer {0}")]
    KeinHandler(ProviderId),

    /// Alle Versuche einer Erneuerungs-Sequenz sind fehlgeschlagen
    #[error("Token-Erneuerung fehlgeschlagen ({provider}, {versuche} Versuche): {grund}")]
    ErneuerungFehlgeschlagen {
        provider: ProviderId,
        versuche: u32,
        grund: String,
    },
}

impl From<TokenError> for palaver_core::PalaverError {
    fn from(e: TokenError) -> Self {
        match e {
            TokenError::KeinHandler(p) => Self::KeinTokenHandler(p),
            TokenError::ErneuerungFehlgeschlagen {
                provider,
                versuche,
                grund,
            } => Self::TokenErneuerung {
                provider,
                versuche,
                grund,
            },
        }
    }
}
