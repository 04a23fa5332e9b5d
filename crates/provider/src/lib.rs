//! palaver-provider – Provider-Abstraktion fuer Palaver
//!
//! Dieses Crate implementiert:
//! - Capability-Traits (`ProviderVerbindung`, `ProviderMessaging`) hinter
//!   denen konkrete Vendor-Backends stehen
//! - `ProviderDescriptor` + Faehigkeitsmenge pro Variante
//! - `ProviderRegistry`: Factory-Registry mit stabilem Schluessel
//!
//! Der Kern haengt ausschliesslich an diesen Schnittstellen, nie an einem
//! konkreten Vendor-SDK.

pub mod capability;
pub mod descriptor;
pub mod error;
pub mod factory;

// Bequeme Re-Exporte
pub use capability::{ProviderEreignis, ProviderMessaging, ProviderVerbindung};
pub use descriptor::{ProviderDescriptor, ProviderFaehigkeit};
pub use error::{ProviderError, Result};
pub use factory::{ProviderFactory, ProviderRegistry};
