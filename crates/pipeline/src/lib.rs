//! palaver-pipeline – Nachrichten-Pipeline fuer Palaver
//!
//! Dieses Crate implementiert:
//! - `NachrichtenProzessor`: Capability-Trait fuer Ketten-Glieder
//! - `NachrichtenPipeline`: prioritaets-sortierte Kette mit Erholungs-Hook,
//!   Wiederholung-mit-Verzoegerung und sichtbarer In-Flight-Tabelle
//! - `VerarbeitungsStatistik`: monotone Zaehler plus Wiederholungs-Limit
//!
//! Pro Nachrichtentyp darf es genau einen besitzenden Prozessor geben;
//! die Kette einer einzelnen Nachricht laeuft strikt sequenziell.

pub mod error;
pub mod pipeline;
pub mod processor;
pub mod stats;

#[cfg(test)]
mod tests;

// Bequeme Re-Exporte
pub use error::{PipelineError, Result};
pub use pipeline::{NachrichtenPipeline, PipelineErgebnis, STANDARD_WIEDERHOLUNGS_LIMIT};
pub use processor::{NachrichtenProzessor, VerarbeitungsErgebnis};
pub use stats::{StatistikAufnahme, VerarbeitungsStatistik};
