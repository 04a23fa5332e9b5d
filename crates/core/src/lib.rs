//! palaver-core – Gemeinsame Typen, Ereignisse und Fehlertypen
//!
//! Dieses Crate stellt die fundamentalen Bausteine bereit, die von allen
//! anderen Palaver-Crates gemeinsam genutzt werden: ID-Newtypes, der
//! Echtzeit-Nachrichten-Typ, der Ereignis-Bus und der zentrale Fehler-Enum.

pub mod error;
pub mod event;
pub mod message;
pub mod types;

// Re-Exporte fuer bequemen Zugriff
pub use error::{PalaverError, Result};
pub use event::{EreignisBus, PalaverEvent, VerbindungsZustand};
pub use message::{
    EchtzeitNachricht, NachrichtenInhalt, NachrichtenStatus, NachrichtenTyp, NachrichtenZiel,
    Prioritaet,
};
pub use types::{ClientRolle, MessageId, ProviderId, RoheLautstaerke, SessionId, UserId};
