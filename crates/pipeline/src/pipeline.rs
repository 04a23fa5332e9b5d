//! Nachrichten-Pipeline – routet eine Nachricht durch die Prozessor-Kette
//!
//! Die Kette ist absteigend nach Prioritaet sortiert (stabil: Gleichstand
//! behaelt Registrierungs-Reihenfolge). Pro Nachricht entsteht genau ein
//! terminales Ergebnis:
//! - `Verarbeitet` stoppt die Kette
//! - `Fehlgeschlagen` laeuft zuerst durch den Erholungs-Hook des Prozessors
//! - `Uebersprungen` laesst die Kette weiterlaufen
//! - `Wiederholen(pause)` ruft denselben Prozessor nach `pause` erneut auf,
//!   sofern der Wiederholungs-Zaehler des Nachrichtentyps das Limit noch
//!   nicht erreicht hat
//!
//! Der Eintrag in der sichtbaren In-Flight-Tabelle wird auf jedem
//! Ausgangspfad entfernt (Drop-Wache), auch bei unerwarteten Abbruechen.

use std::sync::Arc;

use dashmap::DashMap;
use palaver_core::event::{EreignisBus, PalaverEvent};
use palaver_core::message::{EchtzeitNachricht, NachrichtenStatus, NachrichtenTyp};
use palaver_core::types::MessageId;
use parking_lot::RwLock;

use crate::error::{PipelineError, Result};
use crate::processor::{NachrichtenProzessor, VerarbeitungsErgebnis};
use crate::stats::{StatistikAufnahme, VerarbeitungsStatistik};

/// Standard-Limit fuer Wiederholungen pro Nachrichtentyp
pub const STANDARD_WIEDERHOLUNGS_LIMIT: u32 = 3;

/// Terminales Ergebnis von `nachricht_verarbeiten`
#[derive(Debug, Clone)]
pub enum PipelineErgebnis {
    /// Ein Prozessor hat die Nachricht beansprucht; `None` = konsumiert
    Verarbeitet(Option<EchtzeitNachricht>),
    /// Verarbeitung endgueltig fehlgeschlagen (nach Erholungs-Hook)
    Fehlgeschlagen { prozessor: String, grund: String },
    /// Kein Prozessor hat die Nachricht beansprucht
    Uebersprungen,
    /// Nachricht war beim Eintreffen bereits abgelaufen
    Abgelaufen,
}

struct PipelineInner {
    /// Prozessor-Kette, absteigend nach Prioritaet sortiert
    kette: RwLock<Vec<Arc<dyn NachrichtenProzessor>>>,
    /// Typ -> Prozessor-ID: genau ein Besitzer pro Typ
    typ_besitzer: DashMap<NachrichtenTyp, String>,
    /// Sichtbare In-Flight-Tabelle
    in_flight: DashMap<MessageId, EchtzeitNachricht>,
    statistik: VerarbeitungsStatistik,
    wiederholungs_limit: u32,
    bus: EreignisBus,
}

/// Entfernt den In-Flight-Eintrag auf jedem Ausgangspfad
struct InFlightWache {
    inner: Arc<PipelineInner>,
    id: MessageId,
}

impl Drop for InFlightWache {
    fn drop(&mut self) {
        self.inner.in_flight.remove(&self.id);
    }
}

/// Nachrichten-Pipeline – thread-safe, Clone teilt den inneren Zustand
#[derive(Clone)]
pub struct NachrichtenPipeline {
    inner: Arc<PipelineInner>,
}

impl NachrichtenPipeline {
    /// Erstellt eine neue Pipeline mit Standard-Wiederholungs-Limit
    pub fn neu(bus: EreignisBus) -> Self {
        Self::mit_wiederholungs_limit(bus, STANDARD_WIEDERHOLUNGS_LIMIT)
    }

    /// Erstellt eine neue Pipeline mit explizitem Wiederholungs-Limit
    pub fn mit_wiederholungs_limit(bus: EreignisBus, limit: u32) -> Self {
        Self {
            inner: Arc::new(PipelineInner {
                kette: RwLock::new(Vec::new()),
                typ_besitzer: DashMap::new(),
                in_flight: DashMap::new(),
                statistik: VerarbeitungsStatistik::neu(),
                wiederholungs_limit: limit,
                bus,
            }),
        }
    }

    /// Registriert einen Prozessor
    ///
    /// Schlaegt fehl wenn ein anderer Prozessor einen der deklarierten
    /// Typen bereits besitzt (exakte Kollision); in dem Fall bleibt der
    /// bestehende Besitzer unveraendert.
    pub fn registrieren(&self, prozessor: Arc<dyn NachrichtenProzessor>) -> Result<()> {
        for typ in prozessor.akzeptierte_typen() {
            if let Some(besitzer) = self.inner.typ_besitzer.get(typ) {
                return Err(PipelineError::ProzessorBereitsRegistriert {
                    prozessor: prozessor.id().to_string(),
                    besitzer: besitzer.value().clone(),
                    typ: *typ,
                });
            }
        }

        for typ in prozessor.akzeptierte_typen() {
            self.inner
                .typ_besitzer
                .insert(*typ, prozessor.id().to_string());
        }

        let mut kette = self.inner.kette.write();
        kette.push(Arc::clone(&prozessor));
        // Stabil: Gleichstand behaelt die Registrierungs-Reihenfolge
        kette.sort_by(|a, b| b.prioritaet().cmp(&a.prioritaet()));

        tracing::debug!(
            prozessor = prozessor.id(),
            prioritaet = prozessor.prioritaet(),
            "Prozessor registriert"
        );
        Ok(())
    }

    /// Entfernt einen Prozessor aus Registry und Kette
    ///
    /// No-op mit Warnung wenn der Bezeichner unbekannt ist.
    pub fn entfernen(&self, id: &str) -> bool {
        let mut kette = self.inner.kette.write();
        let vorher = kette.len();
        kette.retain(|p| p.id() != id);
        let entfernt = kette.len() < vorher;
        drop(kette);

        if entfernt {
            self.inner.typ_besitzer.retain(|_, besitzer| besitzer != id);
            tracing::debug!(prozessor = id, "Prozessor entfernt");
        } else {
            tracing::warn!(prozessor = id, "Prozessor nicht gefunden – entfernen uebersprungen");
        }
        entfernt
    }

    /// Routet eine Nachricht durch die Kette bis zum terminalen Ergebnis
    pub async fn nachricht_verarbeiten(
        &self,
        mut nachricht: EchtzeitNachricht,
    ) -> Result<PipelineErgebnis> {
        nachricht
            .validieren()
            .map_err(|e| PipelineError::UngueltigesFormat(e.to_string()))?;

        self.inner.statistik.empfangen_zaehlen();
        self.inner
            .in_flight
            .insert(nachricht.id, nachricht.clone());
        let _wache = InFlightWache {
            inner: Arc::clone(&self.inner),
            id: nachricht.id,
        };

        if nachricht.ist_abgelaufen() {
            nachricht.status_setzen(NachrichtenStatus::Abgelaufen);
            self.inner.statistik.fehlgeschlagen_zaehlen();
            tracing::debug!(id = %nachricht.id, "Nachricht bereits abgelaufen");
            self.inner.bus.senden(PalaverEvent::NachrichtFehlgeschlagen {
                id: nachricht.id,
                grund: "abgelaufen".into(),
            });
            return Ok(PipelineErgebnis::Abgelaufen);
        }

        nachricht.status_setzen(NachrichtenStatus::InVerarbeitung);

        // Momentaufnahme der Kette – kein Lock ueber await-Punkte
        let kette: Vec<Arc<dyn NachrichtenProzessor>> = self.inner.kette.read().clone();

        for prozessor in kette {
            if !prozessor.kann_verarbeiten(&nachricht) {
                continue;
            }

            match self.schritt_ausfuehren(&*prozessor, &nachricht).await {
                SchrittAusgang::Weiter => continue,
                SchrittAusgang::Erfolg(transformiert) => {
                    nachricht.status_setzen(NachrichtenStatus::Verarbeitet);
                    self.inner.statistik.verarbeitet_zaehlen();
                    self.inner.bus.senden(PalaverEvent::NachrichtVerarbeitet {
                        id: nachricht.id,
                        transformiert: transformiert.clone(),
                    });
                    return Ok(PipelineErgebnis::Verarbeitet(transformiert));
                }
                SchrittAusgang::Fehler(grund) => {
                    nachricht.status_setzen(NachrichtenStatus::Fehlgeschlagen);
                    self.inner.statistik.fehlgeschlagen_zaehlen();
                    tracing::warn!(
                        id = %nachricht.id,
                        prozessor = prozessor.id(),
                        grund = %grund,
                        "Verarbeitung fehlgeschlagen"
                    );
                    self.inner.bus.senden(PalaverEvent::NachrichtFehlgeschlagen {
                        id: nachricht.id,
                        grund: grund.clone(),
                    });
                    return Ok(PipelineErgebnis::Fehlgeschlagen {
                        prozessor: prozessor.id().to_string(),
                        grund,
                    });
                }
            }
        }

        // Ende der Kette: niemand hat die Nachricht beansprucht.
        // Der Status darf nie auf einen terminalen Erfolgswert springen.
        self.inner.statistik.uebersprungen_zaehlen();
        tracing::debug!(id = %nachricht.id, typ = ?nachricht.typ, "Kein Prozessor zustaendig");
        Ok(PipelineErgebnis::Uebersprungen)
    }

    /// Fuehrt einen Prozessor-Schritt inklusive Wiederholung und Erholung aus
    async fn schritt_ausfuehren(
        &self,
        prozessor: &dyn NachrichtenProzessor,
        nachricht: &EchtzeitNachricht,
    ) -> SchrittAusgang {
        let mut ergebnis = prozessor.verarbeiten(nachricht).await;
        let mut erholung_versucht = false;

        loop {
            match ergebnis {
                VerarbeitungsErgebnis::Uebersprungen => return SchrittAusgang::Weiter,
                VerarbeitungsErgebnis::Verarbeitet(transformiert) => {
                    return SchrittAusgang::Erfolg(transformiert)
                }
                VerarbeitungsErgebnis::Wiederholen(pause) => {
                    if self.inner.statistik.wiederholungen_fuer(nachricht.typ)
                        >= self.inner.wiederholungs_limit
                    {
                        // Limit erreicht: wie ein Fehlschlag behandeln
                        ergebnis = VerarbeitungsErgebnis::Fehlgeschlagen(format!(
                            "Wiederholungs-Limit ({}) fuer {:?} erreicht",
                            self.inner.wiederholungs_limit, nachricht.typ
                        ));
                        continue;
                    }
                    self.inner.statistik.wiederholung_zaehlen(nachricht.typ);
                    tracing::debug!(
                        id = %nachricht.id,
                        prozessor = prozessor.id(),
                        pause_ms = pause.as_millis() as u64,
                        "Wiederholung geplant"
                    );
                    tokio::time::sleep(pause).await;
                    ergebnis = prozessor.verarbeiten(nachricht).await;
                }
                VerarbeitungsErgebnis::Fehlgeschlagen(grund) => {
                    if erholung_versucht {
                        return SchrittAusgang::Fehler(grund);
                    }
                    erholung_versucht = true;
                    ergebnis = prozessor.fehler_behandeln(nachricht, &grund).await;
                }
            }
        }
    }

    /// Anzahl aktuell in Verarbeitung befindlicher Nachrichten
    pub fn in_flight_anzahl(&self) -> usize {
        self.inner.in_flight.len()
    }

    /// Momentaufnahme der In-Flight-Nachrichten
    pub fn in_flight(&self) -> Vec<EchtzeitNachricht> {
        self.inner.in_flight.iter().map(|e| e.value().clone()).collect()
    }

    /// Momentaufnahme der Statistik
    pub fn statistik(&self) -> StatistikAufnahme {
        self.inner.statistik.momentaufnahme()
    }

    /// Setzt die Statistik explizit zurueck
    pub fn statistik_zuruecksetzen(&self) {
        self.inner.statistik.zuruecksetzen();
    }

    /// Anzahl registrierter Prozessoren
    pub fn prozessor_anzahl(&self) -> usize {
        self.inner.kette.read().len()
    }

    /// Besitzer eines Nachrichtentyps (falls beansprucht)
    pub fn besitzer_von(&self, typ: NachrichtenTyp) -> Option<String> {
        self.inner.typ_besitzer.get(&typ).map(|e| e.value().clone())
    }
}

/// Ausgang eines einzelnen Ketten-Schritts
enum SchrittAusgang {
    /// Naechsten Prozessor konsultieren
    Weiter,
    /// Kette stoppt mit Erfolg
    Erfolg(Option<EchtzeitNachricht>),
    /// Kette stoppt mit endgueltigem Fehler
    Fehler(String),
}
