//! Session- und Audio-Snapshots
//!
//! Der Orchestrator persistiert den minimalen Zustand der fuer eine
//! Wiederaufnahme nach Neustart oder Provider-Wechsel noetig ist. Die
//! Ablage selbst ist ein injizierter Key-Value-Store; konkrete Adapter
//! (Datei, Datenbank) bringen Integratoren mit. Werte sind serde_json-
//! kodierte Bytes, der Store interpretiert sie nicht.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use palaver_core::types::{ClientRolle, UserId};
use serde::{Deserialize, Serialize};

/// Store-Schluessel fuer den Session-Snapshot
pub const SCHLUESSEL_SESSION: &str = "session";
/// Store-Schluessel fuer die Audio-Einstellungen
pub const SCHLUESSEL_AUDIO: &str = "audio";

/// Momentaufnahme einer aktiven Session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub kanal: String,
    pub user: UserId,
    pub rolle: ClientRolle,
    pub beigetreten_am: DateTime<Utc>,
}

impl SessionSnapshot {
    /// Erstellt einen frischen Snapshot zum Beitrittszeitpunkt
    pub fn neu(kanal: impl Into<String>, user: UserId, rolle: ClientRolle) -> Self {
        Self {
            kanal: kanal.into(),
            user,
            rolle,
            beigetreten_am: Utc::now(),
        }
    }
}

/// Lokale Audio-Einstellungen des Clients
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioEinstellungen {
    pub gemutet: bool,
    /// Wiedergabe-Pegel in [0,1]
    pub lautstaerke: f32,
}

impl Default for AudioEinstellungen {
    fn default() -> Self {
        Self {
            gemutet: false,
            lautstaerke: 1.0,
        }
    }
}

/// Opaker Key-Value-Store fuer Snapshots
#[async_trait]
pub trait SnapshotStore: Send + Sync {
    /// Laedt die Bytes unter einem Schluessel, `None` wenn nicht vorhanden
    async fn laden(&self, schluessel: &str) -> anyhow::Result<Option<Vec<u8>>>;

    /// Speichert Bytes unter einem Schluessel (ueberschreibt)
    async fn speichern(&self, schluessel: &str, daten: Vec<u8>) -> anyhow::Result<()>;

    /// Entfernt einen Schluessel; unbekannte Schluessel sind kein Fehler
    async fn entfernen(&self, schluessel: &str) -> anyhow::Result<()>;
}

/// In-Memory-Store fuer Tests und Sessions ohne Persistenz
#[derive(Default)]
pub struct MemorySnapshotStore {
    eintraege: DashMap<String, Vec<u8>>,
}

impl MemorySnapshotStore {
    pub fn neu() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SnapshotStore for MemorySnapshotStore {
    async fn laden(&self, schluessel: &str) -> anyhow::Result<Option<Vec<u8>>> {
        Ok(self.eintraege.get(schluessel).map(|e| e.value().clone()))
    }

    async fn speichern(&self, schluessel: &str, daten: Vec<u8>) -> anyhow::Result<()> {
        self.eintraege.insert(schluessel.to_string(), daten);
        Ok(())
    }

    async fn entfernen(&self, schluessel: &str) -> anyhow::Result<()> {
        self.eintraege.remove(schluessel);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn memory_store_roundtrip() {
        let store = MemorySnapshotStore::neu();
        let snapshot = SessionSnapshot::neu("lobby", UserId::neu("u1"), ClientRolle::Sprecher);

        let bytes = serde_json::to_vec(&snapshot).unwrap();
        store.speichern(SCHLUESSEL_SESSION, bytes).await.unwrap();

        let geladen = store.laden(SCHLUESSEL_SESSION).await.unwrap().unwrap();
        let zurueck: SessionSnapshot = serde_json::from_slice(&geladen).unwrap();
        assert_eq!(zurueck, snapshot);
    }

    #[tokio::test]
    async fn entfernen_unbekannt_ist_ok() {
        let store = MemorySnapshotStore::neu();
        store.entfernen("fehlt").await.unwrap();
        assert!(store.laden("fehlt").await.unwrap().is_none());
    }
}
