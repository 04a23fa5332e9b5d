//! Retry-Konfiguration fuer die Token-Erneuerung
//!
//! Eine Konfiguration pro Provider; beim Start gelten Defaults, einzelne
//! Provider koennen ueberschrieben werden.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Retry-Politik fuer fehlgeschlagene Token-Erneuerungen
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryKonfiguration {
    /// Maximale Anzahl Versuche pro Erneuerungs-Sequenz
    pub max_versuche: u32,
    /// Basis-Verzoegerung vor dem zweiten Versuch
    pub basis_verzoegerung_ms: u64,
    /// Obergrenze der Verzoegerung
    pub max_verzoegerung_ms: u64,
    /// Exponentieller Multiplikator
    pub multiplikator: f64,
}

impl Default for RetryKonfiguration {
    fn default() -> Self {
        Self {
            max_versuche: 3,
            basis_verzoegerung_ms: 1_000,
            max_verzoegerung_ms: 30_000,
            multiplikator: 2.0,
        }
    }
}

impl RetryKonfiguration {
    /// Verzoegerung nach dem `versuch`-ten fehlgeschlagenen Versuch (1-basiert)
    ///
    /// `min(max, basis * multiplikator^(versuch-1))`
    pub fn verzoegerung_fuer(&self, versuch: u32) -> Duration {
        let exponent = versuch.saturating_sub(1);
        let ms = self.basis_verzoegerung_ms as f64 * self.multiplikator.powi(exponent as i32);
        let ms = ms.min(self.max_verzoegerung_ms as f64);
        Duration::from_millis(ms as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exponentielles_backoff() {
        let konfig = RetryKonfiguration::default();
        assert_eq!(konfig.verzoegerung_fuer(1), Duration::from_millis(1_000));
        assert_eq!(konfig.verzoegerung_fuer(2), Duration::from_millis(2_000));
        assert_eq!(konfig.verzoegerung_fuer(3), Duration::from_millis(4_000));
    }

    #[test]
    fn obergrenze_greift() {
        let konfig = RetryKonfiguration {
            max_versuche: 10,
            basis_verzoegerung_ms: 1_000,
            max_verzoegerung_ms: 5_000,
            multiplikator: 10.0,
        };
        assert_eq!(konfig.verzoegerung_fuer(2), Duration::from_millis(5_000));
        assert_eq!(konfig.verzoegerung_fuer(9), Duration::from_millis(5_000));
    }
}
