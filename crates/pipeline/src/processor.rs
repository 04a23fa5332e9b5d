//! Prozessor-Schnittstelle der Nachrichten-Pipeline
//!
//! Ein `NachrichtenProzessor` deklariert welche Nachrichtentypen er
//! beansprucht; pro Typ darf es zu jeder Zeit nur einen Besitzer geben.
//! `verarbeiten` liefert genau ein Ergebnis; `Wiederholen` ist ein
//! expliziter Zustandsuebergang den die Pipeline per Timer einplant –
//! kein blockierender Schlaf im Prozessor selbst.

use std::time::Duration;

use async_trait::async_trait;
use palaver_core::message::{EchtzeitNachricht, NachrichtenTyp};

/// Ergebnis eines Verarbeitungs-Schritts
#[derive(Debug, Clone)]
pub enum VerarbeitungsErgebnis {
    /// Kette stoppt; `None` bedeutet bewusst konsumiert ohne Ausgabe
    Verarbeitet(Option<EchtzeitNachricht>),
    /// Schritt fehlgeschlagen – die Pipeline ruft den Erholungs-Hook auf
    Fehlgeschlagen(String),
    /// Nicht zustaendig – die Kette laeuft weiter
    Uebersprungen,
    /// Nach `Duration` denselben Prozessor erneut aufrufen
    Wiederholen(Duration),
}

/// Ein Glied der Prozessor-Kette
#[async_trait]
pub trait NachrichtenProzessor: Send + Sync {
    /// Stabiler Bezeichner (fuer Registry und Logs)
    fn id(&self) -> &str;

    /// Ketten-Prioritaet – hoeher wird frueher konsultiert
    fn prioritaet(&self) -> u8;

    /// Die Nachrichtentypen die dieser Prozessor besitzt
    fn akzeptierte_typen(&self) -> &[NachrichtenTyp];

    /// Feinpruefung pro Nachricht; Standard: Typ-Zugehoerigkeit
    fn kann_verarbeiten(&self, nachricht: &EchtzeitNachricht) -> bool {
        self.akzeptierte_typen().contains(&nachricht.typ)
    }

    /// Verarbeitet eine Nachricht
    async fn verarbeiten(&self, nachricht: &EchtzeitNachricht) -> VerarbeitungsErgebnis;

    /// Erholungs-Hook nach `Fehlgeschlagen`
    ///
    /// Das Ergebnis wird behandelt als haette `verarbeiten` es geliefert.
    /// Standard: der Fehler bleibt bestehen.
    async fn fehler_behandeln(
        &self,
        _nachricht: &EchtzeitNachricht,
        grund: &str,
    ) -> VerarbeitungsErgebnis {
        VerarbeitungsErgebnis::Fehlgeschlagen(grund.to_string())
    }
}
