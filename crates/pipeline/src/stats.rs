//! Verarbeitungs-Statistik der Nachrichten-Pipeline
//!
//! Monoton steigende Zaehler plus ein Wiederholungs-Zaehler pro
//! Nachrichtentyp (begrenzt die Retries). Sinkt nie – ausser bei
//! explizitem Reset.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use palaver_core::message::NachrichtenTyp;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

/// Momentaufnahme der Zaehler (fuer UI/Monitoring)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatistikAufnahme {
    pub empfangen: u64,
    pub verarbeitet: u64,
    pub fehlgeschlagen: u64,
    pub uebersprungen: u64,
    pub wiederholungen: HashMap<NachrichtenTyp, u32>,
}

/// Thread-sichere Pipeline-Statistik
#[derive(Debug, Default)]
pub struct VerarbeitungsStatistik {
    empfangen: AtomicU64,
    verarbeitet: AtomicU64,
    fehlgeschlagen: AtomicU64,
    uebersprungen: AtomicU64,
    wiederholungen: Mutex<HashMap<NachrichtenTyp, u32>>,
}

impl VerarbeitungsStatistik {
    /// Erstellt eine neue Statistik mit Null-Zaehlern
    pub fn neu() -> Self {
        Self::default()
    }

    pub fn empfangen_zaehlen(&self) {
        self.empfangen.fetch_add(1, Ordering::Relaxed);
    }

    pub fn verarbeitet_zaehlen(&self) {
        self.verarbeitet.fetch_add(1, Ordering::Relaxed);
    }

    pub fn fehlgeschlagen_zaehlen(&self) {
        self.fehlgeschlagen.fetch_add(1, Ordering::Relaxed);
    }

    pub fn uebersprungen_zaehlen(&self) {
        self.uebersprungen.fetch_add(1, Ordering::Relaxed);
    }

    /// Registriert eine Wiederholung und gibt den neuen Stand zurueck
    pub fn wiederholung_zaehlen(&self, typ: NachrichtenTyp) -> u32 {
        let mut karte = self.wiederholungen.lock();
        let zaehler = karte.entry(typ).or_insert(0);
        *zaehler += 1;
        *zaehler
    }

    /// Aktueller Wiederholungs-Stand fuer einen Typ
    pub fn wiederholungen_fuer(&self, typ: NachrichtenTyp) -> u32 {
        *self.wiederholungen.lock().get(&typ).unwrap_or(&0)
    }

    /// Momentaufnahme aller Zaehler
    pub fn momentaufnahme(&self) -> StatistikAufnahme {
        StatistikAufnahme {
            empfangen: self.empfangen.load(Ordering::Relaxed),
            verarbeitet: self.verarbeitet.load(Ordering::Relaxed),
            fehlgeschlagen: self.fehlgeschlagen.load(Ordering::Relaxed),
            uebersprungen: self.uebersprungen.load(Ordering::Relaxed),
            wiederholungen: self.wiederholungen.lock().clone(),
        }
    }

    /// Setzt alle Zaehler explizit zurueck
    pub fn zuruecksetzen(&self) {
        self.empfangen.store(0, Ordering::Relaxed);
        self.verarbeitet.store(0, Ordering::Relaxed);
        self.fehlgeschlagen.store(0, Ordering::Relaxed);
        self.uebersprungen.store(0, Ordering::Relaxed);
        self.wiederholungen.lock().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zaehler_steigen_monoton() {
        let statistik = VerarbeitungsStatistik::neu();
        statistik.empfangen_zaehlen();
        statistik.empfangen_zaehlen();
        statistik.verarbeitet_zaehlen();

        let aufnahme = statistik.momentaufnahme();
        assert_eq!(aufnahme.empfangen, 2);
        assert_eq!(aufnahme.verarbeitet, 1);
        assert_eq!(aufnahme.fehlgeschlagen, 0);
    }

    #[test]
    fn wiederholungen_pro_typ() {
        let statistik = VerarbeitungsStatistik::neu();
        assert_eq!(statistik.wiederholung_zaehlen(NachrichtenTyp::Text), 1);
        assert_eq!(statistik.wiederholung_zaehlen(NachrichtenTyp::Text), 2);
        assert_eq!(statistik.wiederholungen_fuer(NachrichtenTyp::Text), 2);
        assert_eq!(statistik.wiederholungen_fuer(NachrichtenTyp::Bild), 0);
    }

    #[test]
    fn reset_loescht_alles() {
        let statistik = VerarbeitungsStatistik::neu();
        statistik.empfangen_zaehlen();
        statistik.wiederholung_zaehlen(NachrichtenTyp::Text);
        statistik.zuruecksetzen();

        let aufnahme = statistik.momentaufnahme();
        assert_eq!(aufnahme.empfangen, 0);
        assert!(aufnahme.wiederholungen.is_empty());
    }
}
