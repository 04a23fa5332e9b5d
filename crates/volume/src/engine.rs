//! Lautstaerke-Engine – Glaettung, Sprech-Erkennung, dominanter Sprecher
//!
//! Wandelt rohe per-User Lautstaerke-Proben in geglaetteten Zustand um:
//! - EMA-Glaettung: `geglaettet = alt * (1 - a) + roh * a`; die erste Probe
//!   eines Benutzers setzt den Wert direkt (kein kuenstlicher Anlauf)
//! - Sprech-Klassifikation: `spricht = geglaettet > sprech_schwelle`
//! - Mengendifferenz pro Batch liefert Begonnen/Beendet-Ereignisse
//! - Dominanter Sprecher: hoechster geglaetteter Pegel unter den Sprechenden;
//!   bei Gleichstand gewinnt der spaeter beobachtete Benutzer
//!
//! Die Engine haelt nur den letzten geglaetteten Wert pro Benutzer und
//! suspendiert nie – jeder Batch wird synchron verarbeitet.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use palaver_core::types::{RoheLautstaerke, UserId};
use serde::{Deserialize, Serialize};

use crate::config::LautstaerkeKonfiguration;

/// Geglaetteter Lautstaerke-Zustand eines Benutzers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BenutzerLautstaerke {
    pub user_id: UserId,
    /// Geglaetteter Pegel in [0,1]
    pub pegel: f32,
    /// Klassifikation aus dem letzten Batch
    pub spricht: bool,
    /// Zeitstempel der letzten Probe
    pub zeitstempel: DateTime<Utc>,
}

/// Ereignisse die ein Batch ausloesen kann
#[derive(Debug, Clone, PartialEq)]
pub enum LautstaerkeEreignis {
    SprechenBegonnen(UserId),
    SprechenBeendet(UserId),
    /// `None` = niemand spricht mehr
    DominanterSprecherGewechselt(Option<UserId>),
}

/// Ergebnis eines verarbeiteten Batches
#[derive(Debug, Clone)]
pub struct BatchErgebnis {
    /// Aktualisierte Infos der in diesem Batch beobachteten Benutzer
    pub infos: Vec<BenutzerLautstaerke>,
    /// Zustandsaenderungen in Batch-Reihenfolge
    pub ereignisse: Vec<LautstaerkeEreignis>,
}

/// Interner Zustand pro Benutzer
#[derive(Debug, Clone)]
struct BenutzerZustand {
    pegel: f32,
    zeitstempel: DateTime<Utc>,
}

/// Lautstaerke-Engine
///
/// Kein interner Lock – der Besitzer (Orchestrator) serialisiert Batches.
pub struct LautstaerkeEngine {
    konfig: LautstaerkeKonfiguration,
    /// Letzter geglaetteter Wert pro Benutzer
    zustaende: HashMap<UserId, BenutzerZustand>,
    /// Beobachtungs-Reihenfolge – haelt die Dominanz-Berechnung deterministisch
    reihenfolge: Vec<UserId>,
    /// Aktuell sprechende Benutzer
    sprechende: HashSet<UserId>,
    /// Dominanter Sprecher des letzten Batches
    dominanter: Option<UserId>,
}

impl LautstaerkeEngine {
    /// Erstellt eine neue Engine
    pub fn neu(konfig: LautstaerkeKonfiguration) -> Self {
        Self {
            konfig,
            zustaende: HashMap::new(),
            reihenfolge: Vec::new(),
            sprechende: HashSet::new(),
            dominanter: None,
        }
    }

    /// Die aktive Konfiguration
    pub fn konfiguration(&self) -> &LautstaerkeKonfiguration {
        &self.konfig
    }

    /// Verarbeitet einen Batch roher Proben
    ///
    /// Benutzer die im Batch fehlen behalten ihren letzten Zustand –
    /// kein Batch-Ausfall erzeugt falsche Beendet-Ereignisse.
    pub fn batch_verarbeiten(&mut self, proben: &[RoheLautstaerke]) -> BatchErgebnis {
        let jetzt = Utc::now();
        let a = self.konfig.glaettung;
        let mut infos = Vec::with_capacity(proben.len());
        let mut ereignisse = Vec::new();

        for probe in proben {
            let roh = probe.pegel.clamp(0.0, 1.0);

            let geglaettet = match self.zustaende.get(&probe.user_id) {
                Some(zustand) => zustand.pegel * (1.0 - a) + roh * a,
                None => {
                    // Erste Beobachtung: Wert direkt uebernehmen
                    self.reihenfolge.push(probe.user_id.clone());
                    roh
                }
            };

            self.zustaende.insert(
                probe.user_id.clone(),
                BenutzerZustand {
                    pegel: geglaettet,
                    zeitstempel: jetzt,
                },
            );

            let spricht = geglaettet > self.konfig.sprech_schwelle;
            if spricht && self.sprechende.insert(probe.user_id.clone()) {
                tracing::debug!(user_id = %probe.user_id, pegel = geglaettet, "Sprechen begonnen");
                ereignisse.push(LautstaerkeEreignis::SprechenBegonnen(probe.user_id.clone()));
            } else if !spricht && self.sprechende.remove(&probe.user_id) {
                tracing::debug!(user_id = %probe.user_id, pegel = geglaettet, "Sprechen beendet");
                ereignisse.push(LautstaerkeEreignis::SprechenBeendet(probe.user_id.clone()));
            }

            infos.push(BenutzerLautstaerke {
                user_id: probe.user_id.clone(),
                pegel: geglaettet,
                spricht,
                zeitstempel: jetzt,
            });
        }

        if let Some(ereignis) = self.dominanz_aktualisieren() {
            ereignisse.push(ereignis);
        }

        BatchErgebnis { infos, ereignisse }
    }

    /// Berechnet den dominanten Sprecher neu; Ereignis nur bei Wechsel
    fn dominanz_aktualisieren(&mut self) -> Option<LautstaerkeEreignis> {
        let mut neuer: Option<(&UserId, f32)> = None;
        for user_id in &self.reihenfolge {
            if !self.sprechende.contains(user_id) {
                continue;
            }
            let pegel = self.zustaende[user_id].pegel;
            // >= : bei Gleichstand gewinnt der spaeter beobachtete Benutzer
            if neuer.map_or(true, |(_, max)| pegel >= max) {
                neuer = Some((user_id, pegel));
            }
        }

        let neuer = neuer.map(|(uid, _)| uid.clone());
        if neuer != self.dominanter {
            self.dominanter = neuer.clone();
            tracing::debug!(dominanter = ?neuer, "Dominanter Sprecher gewechselt");
            Some(LautstaerkeEreignis::DominanterSprecherGewechselt(neuer))
        } else {
            None
        }
    }

    /// Der aktuell dominante Sprecher
    pub fn dominanter_sprecher(&self) -> Option<&UserId> {
        self.dominanter.as_ref()
    }

    /// Gibt `true` zurueck wenn der Benutzer aktuell als sprechend gilt
    pub fn spricht(&self, user_id: &UserId) -> bool {
        self.sprechende.contains(user_id)
    }

    /// Momentaufnahme aller bekannten Benutzer in Beobachtungs-Reihenfolge
    pub fn momentaufnahme(&self) -> Vec<BenutzerLautstaerke> {
        self.reihenfolge
            .iter()
            .filter_map(|uid| {
                self.zustaende.get(uid).map(|z| BenutzerLautstaerke {
                    user_id: uid.clone(),
                    pegel: z.pegel,
                    spricht: self.sprechende.contains(uid),
                    zeitstempel: z.zeitstempel,
                })
            })
            .collect()
    }

    /// Entfernt einen Benutzer (z.B. wenn er den Kanal verlaesst)
    ///
    /// Gibt die dadurch ausgeloesten Ereignisse zurueck.
    pub fn benutzer_entfernen(&mut self, user_id: &UserId) -> Vec<LautstaerkeEreignis> {
        let mut ereignisse = Vec::new();
        self.zustaende.remove(user_id);
        self.reihenfolge.retain(|u| u != user_id);
        if self.sprechende.remove(user_id) {
            ereignisse.push(LautstaerkeEreignis::SprechenBeendet(user_id.clone()));
        }
        if let Some(ereignis) = self.dominanz_aktualisieren() {
            ereignisse.push(ereignis);
        }
        ereignisse
    }

    /// Setzt die Engine vollstaendig zurueck
    pub fn zuruecksetzen(&mut self) {
        self.zustaende.clear();
        self.reihenfolge.clear();
        self.sprechende.clear();
        self.dominanter = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn engine(sprech_schwelle: f32, glaettung: f32) -> LautstaerkeEngine {
        LautstaerkeEngine::neu(
            LautstaerkeKonfiguration::neu(500, sprech_schwelle, 0.05, glaettung).unwrap(),
        )
    }

    fn probe(user: &str, pegel: f32) -> RoheLautstaerke {
        RoheLautstaerke::neu(user, pegel)
    }

    #[test]
    fn erste_probe_setzt_wert_direkt() {
        // Beispielszenario aus der Sprech-Erkennung: a=1.0, Schwelle 0.3
        let mut engine = engine(0.3, 1.0);
        let ergebnis = engine.batch_verarbeiten(&[probe("u1", 0.9)]);

        assert_eq!(ergebnis.infos.len(), 1);
        assert!((ergebnis.infos[0].pegel - 0.9).abs() < f32::EPSILON);
        assert!(ergebnis.infos[0].spricht);
        assert!(ergebnis
            .ereignisse
            .contains(&LautstaerkeEreignis::SprechenBegonnen(UserId::neu("u1"))));
    }

    #[test]
    fn ema_glaettung() {
        let mut engine = engine(0.3, 0.5);
        engine.batch_verarbeiten(&[probe("u1", 1.0)]);
        let ergebnis = engine.batch_verarbeiten(&[probe("u1", 0.0)]);
        // 1.0 * 0.5 + 0.0 * 0.5 = 0.5
        assert!((ergebnis.infos[0].pegel - 0.5).abs() < 1e-6);
    }

    #[test]
    fn stiller_benutzer_loest_nie_begonnen_aus() {
        let mut engine = engine(0.3, 1.0);
        for _ in 0..10 {
            let ergebnis = engine.batch_verarbeiten(&[probe("leise", 0.1)]);
            assert!(ergebnis.ereignisse.iter().all(|e| !matches!(
                e,
                LautstaerkeEreignis::SprechenBegonnen(_)
            )));
        }
        assert!(!engine.spricht(&UserId::neu("leise")));
    }

    #[test]
    fn beendet_nach_begonnen() {
        let mut engine = engine(0.3, 1.0);
        engine.batch_verarbeiten(&[probe("u1", 0.8)]);
        assert!(engine.spricht(&UserId::neu("u1")));

        let ergebnis = engine.batch_verarbeiten(&[probe("u1", 0.0)]);
        assert!(ergebnis
            .ereignisse
            .contains(&LautstaerkeEreignis::SprechenBeendet(UserId::neu("u1"))));
        assert!(!engine.spricht(&UserId::neu("u1")));
    }

    #[test]
    fn kein_doppeltes_begonnen_ereignis() {
        let mut engine = engine(0.3, 1.0);
        engine.batch_verarbeiten(&[probe("u1", 0.8)]);
        let ergebnis = engine.batch_verarbeiten(&[probe("u1", 0.9)]);
        assert!(ergebnis.ereignisse.iter().all(|e| !matches!(
            e,
            LautstaerkeEreignis::SprechenBegonnen(_)
        )));
    }

    #[test]
    fn fehlender_benutzer_behaelt_zustand() {
        let mut engine = engine(0.3, 1.0);
        engine.batch_verarbeiten(&[probe("u1", 0.8)]);

        // u1 fehlt im naechsten Batch – kein Beendet-Ereignis
        let ergebnis = engine.batch_verarbeiten(&[probe("u2", 0.1)]);
        assert!(ergebnis.ereignisse.iter().all(|e| !matches!(
            e,
            LautstaerkeEreignis::SprechenBeendet(_)
        )));
        assert!(engine.spricht(&UserId::neu("u1")));
    }

    #[test]
    fn dominanter_sprecher_hoechster_pegel() {
        let mut engine = engine(0.3, 1.0);
        let ergebnis = engine.batch_verarbeiten(&[probe("u1", 0.5), probe("u2", 0.9)]);

        assert_eq!(engine.dominanter_sprecher(), Some(&UserId::neu("u2")));
        assert!(ergebnis.ereignisse.contains(
            &LautstaerkeEreignis::DominanterSprecherGewechselt(Some(UserId::neu("u2")))
        ));
    }

    #[test]
    fn dominanz_gleichstand_spaeterer_gewinnt() {
        let mut engine = engine(0.3, 1.0);
        engine.batch_verarbeiten(&[probe("u1", 0.7), probe("u2", 0.7)]);
        assert_eq!(engine.dominanter_sprecher(), Some(&UserId::neu("u2")));
    }

    #[test]
    fn dominanz_wechsel_nur_bei_aenderung() {
        let mut engine = engine(0.3, 1.0);
        engine.batch_verarbeiten(&[probe("u1", 0.9)]);

        // Gleicher dominanter Sprecher – kein weiteres Ereignis
        let ergebnis = engine.batch_verarbeiten(&[probe("u1", 0.8)]);
        assert!(ergebnis.ereignisse.iter().all(|e| !matches!(
            e,
            LautstaerkeEreignis::DominanterSprecherGewechselt(_)
        )));
    }

    #[test]
    fn dominanz_wechsel_zu_niemandem() {
        let mut engine = engine(0.3, 1.0);
        engine.batch_verarbeiten(&[probe("u1", 0.9)]);
        let ergebnis = engine.batch_verarbeiten(&[probe("u1", 0.0)]);

        assert!(ergebnis
            .ereignisse
            .contains(&LautstaerkeEreignis::DominanterSprecherGewechselt(None)));
        assert_eq!(engine.dominanter_sprecher(), None);
    }

    #[test]
    fn pegel_wird_geclamped() {
        let mut engine = engine(0.3, 1.0);
        let ergebnis = engine.batch_verarbeiten(&[probe("u1", 7.5)]);
        assert!((ergebnis.infos[0].pegel - 1.0).abs() < f32::EPSILON);

        let ergebnis = engine.batch_verarbeiten(&[probe("u1", -3.0)]);
        assert!((ergebnis.infos[0].pegel - 0.0).abs() < f32::EPSILON);
    }

    #[test]
    fn benutzer_entfernen_raeumt_auf() {
        let mut engine = engine(0.3, 1.0);
        engine.batch_verarbeiten(&[probe("u1", 0.9)]);

        let ereignisse = engine.benutzer_entfernen(&UserId::neu("u1"));
        assert!(ereignisse.contains(&LautstaerkeEreignis::SprechenBeendet(UserId::neu("u1"))));
        assert!(ereignisse.contains(&LautstaerkeEreignis::DominanterSprecherGewechselt(None)));
        assert!(engine.momentaufnahme().is_empty());
    }

    #[test]
    fn momentaufnahme_in_beobachtungs_reihenfolge() {
        let mut engine = engine(0.3, 1.0);
        engine.batch_verarbeiten(&[probe("b", 0.2)]);
        engine.batch_verarbeiten(&[probe("a", 0.4)]);

        let aufnahme = engine.momentaufnahme();
        assert_eq!(aufnahme[0].user_id, UserId::neu("b"));
        assert_eq!(aufnahme[1].user_id, UserId::neu("a"));
    }
}
