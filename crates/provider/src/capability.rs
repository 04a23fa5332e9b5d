//! Capability-Schnittstelle fuer Provider-Implementierungen
//!
//! Der Kern kennt keine Vendor-SDKs – er haengt ausschliesslich an diesen
//! beiden Traits. Jede Provider-Implementierung bringt ihre eigene
//! Verbindungs- und Messaging-Semantik mit und meldet Ereignisse ueber
//! einen broadcast-Kanal zurueck (token-laeuft-ab, Lautstaerke-Batches,
//! eingehende Nachrichten, Verbindungszustand).

use async_trait::async_trait;
use palaver_core::message::EchtzeitNachricht;
use palaver_core::types::{ClientRolle, RoheLautstaerke, UserId};
use palaver_core::VerbindungsZustand;
use tokio::sync::broadcast;

use crate::error::Result;

/// Ereignisse die ein Provider an den Orchestrator meldet
#[derive(Debug, Clone)]
pub enum ProviderEreignis {
    /// Das aktuelle Token laeuft in `sekunden` ab
    TokenLaeuftAb { sekunden: u32 },
    /// Batch roher Lautstaerke-Proben (pro Erkennungsintervall)
    LautstaerkeProben(Vec<RoheLautstaerke>),
    /// Eingehende Echtzeit-Nachricht
    NachrichtEmpfangen(EchtzeitNachricht),
    /// Verbindungszustand hat sich geaendert
    VerbindungGeaendert(VerbindungsZustand),
}

/// Verbindungs- und Audio-Kontrolle eines Providers
///
/// Alle Methoden sind netzwerkgebunden und duerfen den aufrufenden
/// Kontext nicht blockieren.
#[async_trait]
pub trait ProviderVerbindung: Send + Sync {
    /// Initialisiert das Backend (SDK-Setup, Ressourcen)
    async fn initialisieren(&self) -> Result<()>;

    /// Tritt einem Kanal bei
    async fn verbinden(&self, kanal: &str, user: &UserId, token: &str) -> Result<()>;

    /// Verlaesst den aktuellen Kanal
    async fn trennen(&self) -> Result<()>;

    /// Mutet bzw. unmutet das lokale Mikrofon
    async fn mute_setzen(&self, gemutet: bool) -> Result<()>;

    /// Setzt die Wiedergabe-Lautstaerke (Eingabe wird auf [0,1] geclamped)
    async fn lautstaerke_setzen(&self, pegel: f32) -> Result<()>;

    /// Wechselt die Client-Rolle (Sprecher/Zuhoerer)
    async fn rolle_wechseln(&self, rolle: ClientRolle) -> Result<()>;

    /// Wendet ein frisch erneuertes Token auf die laufende Verbindung an
    async fn token_anwenden(&self, token: &str) -> Result<()>;

    /// Abonniert den Ereignis-Strom dieses Providers
    fn ereignisse(&self) -> broadcast::Receiver<ProviderEreignis>;
}

/// Messaging-Kontrolle eines Providers
#[async_trait]
pub trait ProviderMessaging: Send + Sync {
    /// Initialisiert den Messaging-Teil des Backends
    async fn initialisieren(&self) -> Result<()>;

    /// Sendet eine Nachricht ueber den Provider
    async fn senden(&self, nachricht: &EchtzeitNachricht) -> Result<()>;

    /// Schliesst den Messaging-Teil
    async fn schliessen(&self) -> Result<()>;
}
