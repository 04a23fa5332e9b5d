//! Service-Tests des Session-Orchestrators
