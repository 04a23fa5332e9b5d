//! Echtzeit-Nachrichten – Domain-Typ fuer die Nachrichten-Pipeline
//!
//! Eine `EchtzeitNachricht` entsteht beim Empfang vom aktiven Provider oder
//! bei einem Sende-Auftrag. Der Status wandert nur vorwaerts (kein Ruecksprung
//! von `Verarbeitet` zurueck zu `Ausstehend`); `status_setzen` erzwingt das.
//!
//! Invariante: genau eines von {empfaenger, kanal} ist gesetzt – nie beides,
//! nie keines. `validieren` prueft das beim Erstellen und in der Pipeline.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::PalaverError;
use crate::types::{MessageId, UserId};

/// Nachrichtentyp – geschlossene Aufzaehlung
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NachrichtenTyp {
    Text,
    Bild,
    Audio,
    Video,
    Datei,
    System,
    Benutzerdefiniert,
    Benachrichtigung,
    Kommando,
}

/// Nachrichteninhalt – Variante passend zum Typ
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", tag = "art", content = "daten")]
pub enum NachrichtenInhalt {
    /// Klartext
    Text(String),
    /// Verweis auf eine Media-Ressource (Bild/Audio/Video/Datei)
    Media { url: String, mime_type: String },
    /// System- oder Benachrichtigungstext
    System(String),
    /// Freie Nutzdaten fuer benutzerdefinierte Nachrichten
    Benutzerdefiniert(serde_json::Value),
    /// Kommando mit Argumenten
    Kommando { name: String, argumente: Vec<String> },
}

impl NachrichtenInhalt {
    /// Prueft ob der Inhalt zur Typ-Variante passt
    pub fn passt_zu(&self, typ: NachrichtenTyp) -> bool {
        matches!(
            (self, typ),
            (NachrichtenInhalt::Text(_), NachrichtenTyp::Text)
                | (
                    NachrichtenInhalt::Media { .. },
                    NachrichtenTyp::Bild
                        | NachrichtenTyp::Audio
                        | NachrichtenTyp::Video
                        | NachrichtenTyp::Datei
                )
                | (
                    NachrichtenInhalt::System(_),
                    NachrichtenTyp::System | NachrichtenTyp::Benachrichtigung
                )
                | (
                    NachrichtenInhalt::Benutzerdefiniert(_),
                    NachrichtenTyp::Benutzerdefiniert
                )
                | (NachrichtenInhalt::Kommando { .. }, NachrichtenTyp::Kommando)
        )
    }
}

/// Verarbeitungsstatus einer Nachricht
///
/// Die Reihenfolge der Varianten definiert die erlaubte Statusrichtung:
/// Uebergaenge nur zu einem Status mit hoeherem Rang.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NachrichtenStatus {
    Ausstehend,
    InVerarbeitung,
    Verarbeitet,
    Gesendet,
    Zugestellt,
    Fehlgeschlagen,
    Abgelaufen,
}

/// Prioritaet einer Nachricht
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Prioritaet {
    Niedrig,
    Normal,
    Hoch,
    Dringend,
}

/// Ziel der Nachricht – genau eines von Direktempfaenger oder Kanal
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NachrichtenZiel {
    /// Direktnachricht an einen Benutzer
    Empfaenger(UserId),
    /// Kanalnachricht an alle Mitglieder
    Kanal(String),
}

/// Eine Echtzeit-Nachricht (Domain-Typ, kein Wire-Format)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EchtzeitNachricht {
    pub id: MessageId,
    pub typ: NachrichtenTyp,
    pub inhalt: NachrichtenInhalt,
    pub sender: UserId,
    pub ziel: NachrichtenZiel,
    pub zeitstempel: DateTime<Utc>,
    /// Optionaler Ablaufzeitpunkt; danach wird die Nachricht verworfen
    pub laeuft_ab_am: Option<DateTime<Utc>>,
    pub status: NachrichtenStatus,
    pub prioritaet: Prioritaet,
}

impl EchtzeitNachricht {
    /// Erstellt eine neue Nachricht mit Status `Ausstehend`
    ///
    /// Gibt `UngueltigeNachricht` zurueck wenn der Inhalt nicht zur
    /// Typ-Variante passt.
    pub fn neu(
        typ: NachrichtenTyp,
        inhalt: NachrichtenInhalt,
        sender: impl Into<UserId>,
        ziel: NachrichtenZiel,
    ) -> crate::Result<Self> {
        let nachricht = Self {
            id: MessageId::new(),
            typ,
            inhalt,
            sender: sender.into(),
            ziel,
            zeitstempel: Utc::now(),
            laeuft_ab_am: None,
            status: NachrichtenStatus::Ausstehend,
            prioritaet: Prioritaet::Normal,
        };
        nachricht.validieren()?;
        Ok(nachricht)
    }

    /// Bequemer Konstruktor fuer eine Textnachricht in einen Kanal
    pub fn text_in_kanal(
        sender: impl Into<UserId>,
        kanal: impl Into<String>,
        text: impl Into<String>,
    ) -> Self {
        Self {
            id: MessageId::new(),
            typ: NachrichtenTyp::Text,
            inhalt: NachrichtenInhalt::Text(text.into()),
            sender: sender.into(),
            ziel: NachrichtenZiel::Kanal(kanal.into()),
            zeitstempel: Utc::now(),
            laeuft_ab_am: None,
            status: NachrichtenStatus::Ausstehend,
            prioritaet: Prioritaet::Normal,
        }
    }

    /// Setzt die Prioritaet (Builder-Stil)
    pub fn mit_prioritaet(mut self, prioritaet: Prioritaet) -> Self {
        self.prioritaet = prioritaet;
        self
    }

    /// Setzt den Ablaufzeitpunkt (Builder-Stil)
    pub fn mit_ablauf(mut self, laeuft_ab_am: DateTime<Utc>) -> Self {
        self.laeuft_ab_am = Some(laeuft_ab_am);
        self
    }

    /// Prueft die Ziel- und Inhalts-Invarianten
    pub fn validieren(&self) -> crate::Result<()> {
        if !self.inhalt.passt_zu(self.typ) {
            return Err(PalaverError::UngueltigeNachricht(format!(
                "Inhalt passt nicht zum Typ {:?}",
                self.typ
            )));
        }
        match &self.ziel {
            NachrichtenZiel::Kanal(kanal) if kanal.is_empty() => Err(
                PalaverError::UngueltigeNachricht("Leerer Kanalname".into()),
            ),
            NachrichtenZiel::Empfaenger(uid) if uid.as_str().is_empty() => Err(
                PalaverError::UngueltigeNachricht("Leere Empfaenger-ID".into()),
            ),
            _ => Ok(()),
        }
    }

    /// Gibt `true` zurueck wenn der Ablaufzeitpunkt ueberschritten ist
    pub fn ist_abgelaufen(&self) -> bool {
        match self.laeuft_ab_am {
            Some(ablauf) => Utc::now() >= ablauf,
            None => false,
        }
    }

    /// Setzt den Status – nur Vorwaertsuebergaenge sind erlaubt
    ///
    /// Gibt `false` zurueck (und laesst den Status unveraendert) wenn der
    /// Uebergang ein Ruecksprung waere.
    pub fn status_setzen(&mut self, neuer: NachrichtenStatus) -> bool {
        if neuer >= self.status {
            self.status = neuer;
            true
        } else {
            false
        }
    }
}
