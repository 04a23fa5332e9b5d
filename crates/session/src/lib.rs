//! palaver-session – Session-Orchestrator fuer Palaver
//!
//! Dieses Crate bindet die Subsysteme zusammen:
//! - `SessionOrchestrator`: Provider-Auswahl, Wechsel mit Session-Erhalt,
//!   Ereignis-Verteilung an Token-Manager, Lautstaerke-Engine und Pipeline
//! - `OrchestratorKonfiguration`: TOML-ladbare Konfiguration mit
//!   Fallback-Kette und Retry-Ueberschreibungen
//! - `SnapshotStore`: injizierbare Persistenz fuer Session- und
//!   Audio-Snapshots

pub mod config;
pub mod error;
pub mod orchestrator;
pub mod snapshot;

#[cfg(test)]
mod tests;

// Bequeme Re-Exporte
pub use config::{OrchestratorKonfiguration, TokenEinstellungen};
pub use error::{Result, SessionError};
pub use orchestrator::SessionOrchestrator;
pub use snapshot::{AudioEinstellungen, MemorySnapshotStore, SessionSnapshot, SnapshotStore};
