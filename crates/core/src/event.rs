//! Ereignis-Bus fuer Palaver
//!
//! Der Kern rendert nichts selbst: UI- und Persistenz-Schichten abonnieren
//! Zustandsaenderungen ueber diesen Bus. Implementiert als tokio
//! broadcast-Kanal – mehrere Abonnenten, jeder erhaelt alle Ereignisse ab
//! dem Zeitpunkt seines Abonnements. Langsame Abonnenten verlieren die
//! aeltesten Ereignisse (broadcast-Semantik), der Kern blockiert nie.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::types::{MessageId, ProviderId, UserId};

/// Standard-Kapazitaet des Bus-Puffers
const BUS_KAPAZITAET: usize = 256;

/// Verbindungszustand des aktiven Providers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VerbindungsZustand {
    Getrennt,
    Verbindet,
    Verbunden,
    Fehlgeschlagen,
}

/// Alle Ereignisse die der Kern nach aussen meldet
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum PalaverEvent {
    // --- Session-Ereignisse ---
    /// Verbindungszustand des aktiven Providers hat sich geaendert
    VerbindungGeaendert {
        provider: ProviderId,
        zustand: VerbindungsZustand,
    },
    /// Aktiver Provider wurde gewechselt
    ProviderGewechselt {
        von: Option<ProviderId>,
        nach: ProviderId,
    },

    // --- Nachrichten-Ereignisse ---
    /// Eine Nachricht wurde verarbeitet; `None` bedeutet bewusst konsumiert
    NachrichtVerarbeitet {
        id: MessageId,
        transformiert: Option<crate::message::EchtzeitNachricht>,
    },
    /// Verarbeitung endgueltig fehlgeschlagen
    NachrichtFehlgeschlagen { id: MessageId, grund: String },

    // --- Lautstaerke-Ereignisse ---
    /// Geglaetteter Pegel eines Benutzers wurde aktualisiert
    LautstaerkeAktualisiert {
        user_id: UserId,
        pegel: f32,
        spricht: bool,
    },
    /// Benutzer hat zu sprechen begonnen
    SprechenBegonnen { user_id: UserId },
    /// Benutzer hat aufgehoert zu sprechen
    SprechenBeendet { user_id: UserId },
    /// Dominanter Sprecher hat gewechselt (`None` = niemand spricht)
    DominanterSprecherGewechselt { user_id: Option<UserId> },

    // --- Token-Ereignisse ---
    /// Neues Token wurde erfolgreich bezogen
    TokenErneuert { provider: ProviderId, token: String },
    /// Token-Erneuerung nach allen Versuchen fehlgeschlagen
    TokenFehlgeschlagen { provider: ProviderId, grund: String },
}

/// Ereignis-Bus – thread-safe, Clone teilt den Sender
///
/// Der Kern sendet, Kollaborateure abonnieren. Senden ohne Abonnenten ist
/// kein Fehler (das Ereignis verfaellt).
#[derive(Clone)]
pub struct EreignisBus {
    tx: broadcast::Sender<PalaverEvent>,
}

impl EreignisBus {
    /// Erstellt einen neuen Bus mit Standard-Kapazitaet
    pub fn neu() -> Self {
        Self::mit_kapazitaet(BUS_KAPAZITAET)
    }

    /// Erstellt einen neuen Bus mit expliziter Puffer-Kapazitaet
    pub fn mit_kapazitaet(kapazitaet: usize) -> Self {
        let (tx, _) = broadcast::channel(kapazitaet);
        Self { tx }
    }

    /// Sendet ein Ereignis an alle Abonnenten
    pub fn senden(&self, event: PalaverEvent) {
        // Fehler nur wenn keine Abonnenten existieren – bewusst ignoriert
        let _ = self.tx.send(event);
    }

    /// Abonniert alle zukuenftigen Ereignisse
    pub fn abonnieren(&self) -> broadcast::Receiver<PalaverEvent> {
        self.tx.subscribe()
    }

    /// Anzahl aktiver Abonnenten
    pub fn abonnenten(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for EreignisBus {
    fn default() -> Self {
        Self::neu()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn senden_und_empfangen() {
        let bus = EreignisBus::neu();
        let mut rx = bus.abonnieren();

        bus.senden(PalaverEvent::SprechenBegonnen {
            user_id: UserId::neu("u1"),
        });

        let event = rx.recv().await.unwrap();
        assert!(matches!(
            event,
            PalaverEvent::SprechenBegonnen { user_id } if user_id.as_str() == "u1"
        ));
    }

    #[tokio::test]
    async fn senden_ohne_abonnenten_ist_ok() {
        let bus = EreignisBus::neu();
        // Kein Abonnent – darf nicht panicen
        bus.senden(PalaverEvent::VerbindungGeaendert {
            provider: ProviderId::neu("mock"),
            zustand: VerbindungsZustand::Verbunden,
        });
        assert_eq!(bus.abonnenten(), 0);
    }

    #[tokio::test]
    async fn mehrere_abonnenten_erhalten_alles() {
        let bus = EreignisBus::neu();
        let mut rx1 = bus.abonnieren();
        let mut rx2 = bus.abonnieren();

        bus.senden(PalaverEvent::DominanterSprecherGewechselt { user_id: None });

        assert!(rx1.recv().await.is_ok());
        assert!(rx2.recv().await.is_ok());
    }

    #[test]
    fn event_ist_serde_kompatibel() {
        let event = PalaverEvent::TokenErneuert {
            provider: ProviderId::neu("agora"),
            token: "abc".into(),
        };
        let json = serde_json::to_string(&event).unwrap();
        let _: PalaverEvent = serde_json::from_str(&json).unwrap();
    }
}
