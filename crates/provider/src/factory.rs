//! Provider-Factory-Registry – verwaltet registrierte Provider-Varianten
//!
//! Eine Factory bildet genau einen Deskriptor auf Konstruktoren fuer
//! Verbindungs- und Messaging-Handles plus die deklarierte Faehigkeitsmenge
//! ab. Doppelte Registrierung desselben Schluessels ist ein Fehler.

use std::collections::HashSet;
use std::sync::Arc;

use dashmap::DashMap;
use palaver_core::types::ProviderId;

use crate::capability::{ProviderMessaging, ProviderVerbindung};
use crate::descriptor::{ProviderDescriptor, ProviderFaehigkeit};
use crate::error::{ProviderError, Result};

/// Baut Verbindungs- und Messaging-Handles fuer eine Provider-Variante
pub trait ProviderFactory: Send + Sync {
    /// Der Deskriptor dieser Variante
    fn descriptor(&self) -> &ProviderDescriptor;

    /// Die deklarierte Faehigkeitsmenge
    fn faehigkeiten(&self) -> HashSet<ProviderFaehigkeit>;

    /// Erstellt ein frisches Verbindungs-Handle
    fn verbindung_bauen(&self) -> Arc<dyn ProviderVerbindung>;

    /// Erstellt ein frisches Messaging-Handle
    fn messaging_bauen(&self) -> Arc<dyn ProviderMessaging>;
}

impl std::fmt::Debug for dyn ProviderFactory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderFactory")
            .field("descriptor", self.descriptor())
            .finish()
    }
}

/// Registry aller verfuegbaren Provider-Factories – thread-sicher via DashMap
pub struct ProviderRegistry {
    factories: DashMap<ProviderId, Arc<dyn ProviderFactory>>,
}

impl ProviderRegistry {
    /// Erstellt eine neue leere Registry
    pub fn neu() -> Self {
        Self {
            factories: DashMap::new(),
        }
    }

    /// Registriert eine Factory
    ///
    /// Gibt `BereitsRegistriert` zurueck wenn der Schluessel belegt ist.
    pub fn registrieren(&self, factory: Arc<dyn ProviderFactory>) -> Result<()> {
        let id = factory.descriptor().id.clone();
        if self.factories.contains_key(&id) {
            return Err(ProviderError::BereitsRegistriert(id));
        }
        tracing::debug!(provider = %id, "Provider-Factory registriert");
        self.factories.insert(id, factory);
        Ok(())
    }

    /// Entfernt eine Factory aus der Registry
    pub fn entfernen(&self, id: &ProviderId) -> Result<Arc<dyn ProviderFactory>> {
        let (_, factory) = self
            .factories
            .remove(id)
            .ok_or_else(|| ProviderError::NichtVerfuegbar(id.clone()))?;
        tracing::debug!(provider = %id, "Provider-Factory entfernt");
        Ok(factory)
    }

    /// Sucht die Factory fuer einen Provider
    pub fn holen(&self, id: &ProviderId) -> Result<Arc<dyn ProviderFactory>> {
        self.factories
            .get(id)
            .map(|e| Arc::clone(e.value()))
            .ok_or_else(|| ProviderError::NichtVerfuegbar(id.clone()))
    }

    /// Prueft ob ein Provider registriert ist
    pub fn ist_registriert(&self, id: &ProviderId) -> bool {
        self.factories.contains_key(id)
    }

    /// Gibt alle Deskriptoren zurueck, absteigend nach Prioritaet sortiert
    pub fn alle(&self) -> Vec<ProviderDescriptor> {
        let mut deskriptoren: Vec<ProviderDescriptor> = self
            .factories
            .iter()
            .map(|e| e.value().descriptor().clone())
            .collect();
        deskriptoren.sort_by(|a, b| b.prioritaet.cmp(&a.prioritaet));
        deskriptoren
    }

    /// Gibt alle Deskriptoren zurueck die eine bestimmte Faehigkeit deklarieren
    pub fn mit_faehigkeit(&self, faehigkeit: ProviderFaehigkeit) -> Vec<ProviderDescriptor> {
        let mut deskriptoren: Vec<ProviderDescriptor> = self
            .factories
            .iter()
            .filter(|e| e.value().faehigkeiten().contains(&faehigkeit))
            .map(|e| e.value().descriptor().clone())
            .collect();
        deskriptoren.sort_by(|a, b| b.prioritaet.cmp(&a.prioritaet));
        deskriptoren
    }

    /// Anzahl registrierter Factories
    pub fn anzahl(&self) -> usize {
        self.factories.len()
    }
}

impl Default for ProviderRegistry {
    fn default() -> Self {
        Self::neu()
    }
}
