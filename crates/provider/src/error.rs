//! Fehlertypen des Provider-Subsystems

use palaver_core::types::ProviderId;
use thiserror::Error;

use crate::descriptor::ProviderFaehigkeit;

/// Result-Alias fuer Provider-Operationen
pub type Result<T> = std::result::Result<T, ProviderError>;

/// Fehler rund um Provider-Registrierung und -Lebenszyklus
#[derive(Debug, Error)]
pub enum ProviderError {
    /// Keine Factory fuer diesen Provider registriert
    #[error("Provider nicht verfuegbar: {0}")]
    NichtVerfuegbar(ProviderId),

    /// Doppelte Factory-Registrierung
    #[error("Provider bereits registriert: {0}")]
    BereitsRegistriert(ProviderId),

    /// Operation auf einem nicht initialisierten Provider
    #[error("Provider nicht initialisiert: {0}")]
    NichtInitialisiert(ProviderId),

    /// Initialisierung der Verbindungs- oder Messaging-Handles fehlgeschlagen
    #[error("Provider-Initialisierung fehlgeschlagen ({provider}): {grund}")]
    Initialisierung { provider: ProviderId, grund: String },

    /// Der Provider deklariert eine benoetigte Faehigkeit nicht
    #[error("Provider {provider} unterstuetzt {faehigkeit:?} nicht")]
    FaehigkeitFehlt {
        provider: ProviderId,
        faehigkeit: ProviderFaehigkeit,
    },

    /// Fehler aus dem Vendor-Backend, durchgereicht als Text
    #[error("Backend-Fehler ({provider}): {grund}")]
    Backend { provider: ProviderId, grund: String },
}

impl ProviderError {
    /// Der Provider auf den sich dieser Fehler bezieht
    pub fn provider(&self) -> &ProviderId {
        match self {
            Self::NichtVerfuegbar(p)
            | Self::BereitsRegistriert(p)
            | Self::NichtInitialisiert(p) => p,
            Self::Initialisierung { provider, .. }
            | Self::FaehigkeitFehlt { provider, .. }
            | Self::Backend { provider, .. } => provider,
        }
    }
}

impl From<ProviderError> for palaver_core::PalaverError {
    fn from(e: ProviderError) -> Self {
        match e {
            ProviderError::NichtVerfuegbar(p) => Self::ProviderNichtVerfuegbar(p),
            ProviderError::Initialisierung { provider, grund } => {
                Self::ProviderInitialisierung { provider, grund }
            }
            andere => Self::Intern(andere.to_string()),
        }
    }
}
