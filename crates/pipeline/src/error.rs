//! Fehlertypen der Nachrichten-Pipeline

use palaver_core::message::NachrichtenTyp;
use thiserror::Error;

/// Result-Alias fuer Pipeline-Operationen
pub type Result<T> = std::result::Result<T, PipelineError>;

/// Fehler rund um Registrierung und Nachrichten-Format
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Ein anderer Prozessor besitzt einen der deklarierten Typen bereits
    #[error("Typ {typ:?} gehoert bereits Prozessor '{besitzer}' (Registrierung von '{prozessor}')")]
    ProzessorBereitsRegistriert {
        prozessor: String,
        besitzer: String,
        typ: NachrichtenTyp,
    },

    /// Format-Invarianten der Nachricht verletzt
    #[error("Ungueltige Nachricht: {0}")]
    UngueltigesFormat(String),
}

impl From<PipelineError> for palaver_core::PalaverError {
    fn from(e: PipelineError) -> Self {
        match e {
            PipelineError::ProzessorBereitsRegistriert { typ, .. } => {
                Self::ProzessorBereitsRegistriert(format!("{:?}", typ))
            }
            PipelineError::UngueltigesFormat(grund) => Self::UngueltigeNachricht(grund),
        }
    }
}
