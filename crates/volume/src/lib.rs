//! palaver-volume – Lautstaerke-Engine fuer Palaver
//!
//! Dieses Crate implementiert:
//! - `LautstaerkeKonfiguration`: geclampte Erkennungs-Parameter
//! - `LautstaerkeEngine`: EMA-Glaettung, Sprech-Klassifikation,
//!   Begonnen/Beendet-Ereignisse und dominanter Sprecher
//!
//! Die Engine ist bewusst synchron und lockfrei – der Orchestrator
//! serialisiert die Batches.

pub mod config;
pub mod engine;

// Bequeme Re-Exporte
pub use config::{LautstaerkeKonfigFehler, LautstaerkeKonfiguration};
pub use engine::{BatchErgebnis, BenutzerLautstaerke, LautstaerkeEngine, LautstaerkeEreignis};
