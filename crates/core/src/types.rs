//! Gemeinsame Identifikationstypen fuer Palaver
//!
//! Alle IDs verwenden das Newtype-Pattern um Verwechslungen zwischen
//! verschiedenen ID-Arten zur Compilezeit auszuschliessen. Benutzer- und
//! Provider-IDs kommen vom jeweiligen Backend und sind deshalb Strings;
//! Nachrichten- und Session-IDs werden lokal als UUID erzeugt.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Benutzer-ID – wird vom aktiven Provider vergeben
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UserId(pub String);

impl UserId {
    /// Erstellt eine UserId aus einem beliebigen String
    pub fn neu(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Gibt die ID als &str zurueck
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "user:{}", self.0)
    }
}

impl From<&str> for UserId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Stabiler Provider-Schluessel (z.B. "agora", "mock")
///
/// Dient als Registry-Schluessel fuer Factories, Token-Zustaende und
/// Retry-Konfigurationen.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProviderId(pub String);

impl ProviderId {
    /// Erstellt eine ProviderId aus einem Slug
    pub fn neu(slug: impl Into<String>) -> Self {
        Self(slug.into())
    }

    /// Gibt den Slug als &str zurueck
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ProviderId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "provider:{}", self.0)
    }
}

impl From<&str> for ProviderId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Eindeutige Nachrichten-ID
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MessageId(pub Uuid);

impl MessageId {
    /// Erstellt eine neue zufaellige MessageId
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Gibt die innere UUID zurueck
    pub fn inner(&self) -> Uuid {
        self.0
    }
}

impl Default for MessageId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for MessageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "msg:{}", self.0)
    }
}

/// Eindeutige Session-ID
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(pub Uuid);

impl SessionId {
    /// Erstellt eine neue zufaellige SessionId
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Gibt die innere UUID zurueck
    pub fn inner(&self) -> Uuid {
        self.0
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "session:{}", self.0)
    }
}

/// Rolle des lokalen Clients in der Session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClientRolle {
    /// Sendet und empfaengt Audio/Video
    Sprecher,
    /// Empfaengt nur
    Zuhoerer,
}

/// Rohe Lautstaerke-Probe wie sie vom Provider gemeldet wird
///
/// `pegel` liegt in [0,1]; Werte ausserhalb werden von der Engine
/// geclamped (dokumentierte Normalisierung, kein Fehler).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoheLautstaerke {
    pub user_id: UserId,
    pub pegel: f32,
}

impl RoheLautstaerke {
    /// Erstellt eine neue Probe
    pub fn neu(user_id: impl Into<UserId>, pegel: f32) -> Self {
        Self {
            user_id: user_id.into(),
            pegel,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_id_anzeige() {
        let uid = UserId::neu("u1");
        assert_eq!(uid.to_string(), "user:u1");
    }

    #[test]
    fn provider_id_slug() {
        let pid = ProviderId::neu("agora");
        assert_eq!(pid.as_str(), "agora");
        assert_eq!(pid.to_string(), "provider:agora");
    }

    #[test]
    fn message_id_eindeutig() {
        assert_ne!(MessageId::new(), MessageId::new());
    }

    #[test]
    fn ids_sind_serde_kompatibel() {
        let uid = UserId::neu("u1");
        let json = serde_json::to_string(&uid).unwrap();
        let zurueck: UserId = serde_json::from_str(&json).unwrap();
        assert_eq!(uid, zurueck);
    }
}
