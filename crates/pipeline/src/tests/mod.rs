//! Service-Tests der Nachrichten-Pipeline
