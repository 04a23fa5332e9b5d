//! palaver-token – Token-Lebenszyklus fuer Palaver
//!
//! Dieses Crate implementiert:
//! - `TokenManager`: plant, wiederholt und meldet Token-Erneuerungen
//! - `RetryKonfiguration`: exponentielles Backoff pro Provider
//! - `TokenErneuerer`: injizierter Erneuerungs-Callback
//!
//! Der Manager fasst Provider-Handles nie direkt an – frische Tokens werden
//! ueber den Ereignis-Bus gemeldet und vom Orchestrator angewendet.

pub mod config;
pub mod error;
pub mod manager;

// Bequeme Re-Exporte
pub use config::RetryKonfiguration;
pub use error::{Result, TokenError};
pub use manager::{
    TokenErneuerer, TokenManager, TokenStatus, TokenZustand, STANDARD_VORLAUF_SEKUNDEN,
};
