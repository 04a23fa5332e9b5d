//! palaver-observability – Logging-Setup fuer Palaver
//!
//! Stellt die `[logging]`-Konfigurationssektion und die zugehoerige
//! tracing-subscriber-Initialisierung bereit, die einbettende Anwendungen
//! einmal beim Start aufrufen. Der Kern selbst loggt nur ueber das
//! `tracing`-Frontend und erzwingt keinen Subscriber.

pub mod logging;

pub use logging::{logging_initialisieren, LogFormat, LoggingEinstellungen, LoggingFehler};
