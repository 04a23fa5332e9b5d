//! Session-Orchestrator – verdrahtet Provider, Token, Lautstaerke und Pipeline
//!
//! Der Orchestrator haelt hoechstens eine aktive Provider-Bindung. Er baut
//! Handles ueber die Factory-Registry, pumpt Provider-Ereignisse in die
//! Subsysteme (Token-Manager, Lautstaerke-Engine, Nachrichten-Pipeline)
//! und spiegelt deren Resultate auf den Ereignis-Bus. Session- und
//! Audio-Snapshots werden bei jeder Aenderung persistiert und beim
//! Konfigurieren wieder eingespielt.
//!
//! Konfigurieren und Wechseln sind gegeneinander ausgeschlossen
//! (compare-exchange-Flagge, auf jedem Ausgangspfad geloescht). Bei einem
//! Fehlschlag mitten im Wechsel gibt es kein automatisches Rollback; der
//! Aufrufer konsultiert die Fallback-Kette der Konfiguration.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use palaver_core::event::{EreignisBus, PalaverEvent};
use palaver_core::message::EchtzeitNachricht;
use palaver_core::types::{ClientRolle, ProviderId, UserId};
use palaver_pipeline::NachrichtenPipeline;
use palaver_provider::capability::{ProviderEreignis, ProviderMessaging, ProviderVerbindung};
use palaver_provider::descriptor::ProviderDescriptor;
use palaver_provider::factory::ProviderRegistry;
use palaver_token::{TokenError, TokenManager};
use palaver_volume::{BenutzerLautstaerke, LautstaerkeEngine, LautstaerkeEreignis};
use parking_lot::{Mutex, RwLock};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use crate::config::OrchestratorKonfiguration;
use crate::error::{Result, SessionError};
use crate::snapshot::{
    AudioEinstellungen, SessionSnapshot, SnapshotStore, SCHLUESSEL_AUDIO, SCHLUESSEL_SESSION,
};

/// Die aktuell konfigurierte Provider-Bindung
struct AktiveBindung {
    descriptor: ProviderDescriptor,
    verbindung: Arc<dyn ProviderVerbindung>,
    messaging: Arc<dyn ProviderMessaging>,
    session: Option<SessionSnapshot>,
    audio: AudioEinstellungen,
}

struct OrchestratorInner {
    konfig: OrchestratorKonfiguration,
    registry: Arc<ProviderRegistry>,
    token_manager: TokenManager,
    lautstaerke: Mutex<LautstaerkeEngine>,
    pipeline: NachrichtenPipeline,
    bus: EreignisBus,
    snapshots: Arc<dyn SnapshotStore>,
    /// Wird nie ueber einen await-Punkt gehalten
    aktiv: RwLock<Option<AktiveBindung>>,
    wechsel_laeuft: AtomicBool,
    pumpen: Mutex<Vec<JoinHandle<()>>>,
}

/// Loescht die Wechsel-Flagge auf jedem Ausgangspfad
struct WechselWache<'a> {
    flagge: &'a AtomicBool,
}

impl Drop for WechselWache<'_> {
    fn drop(&mut self) {
        self.flagge.store(false, Ordering::Release);
    }
}

/// Session-Orchestrator – thread-safe, Clone teilt den inneren Zustand
#[derive(Clone)]
pub struct SessionOrchestrator {
    inner: Arc<OrchestratorInner>,
}

impl SessionOrchestrator {
    /// Erstellt einen Orchestrator mit Registry, Snapshot-Store und Konfiguration
    pub fn neu(
        registry: Arc<ProviderRegistry>,
        snapshots: Arc<dyn SnapshotStore>,
        konfig: OrchestratorKonfiguration,
    ) -> Self {
        let bus = EreignisBus::neu();
        let token_manager = TokenManager::neu(bus.clone(), konfig.token.retry.clone());
        for (provider, retry) in &konfig.token.retry_overrides {
            token_manager.retry_setzen(provider.clone(), retry.clone());
        }
        let pipeline = NachrichtenPipeline::neu(bus.clone());
        let lautstaerke = LautstaerkeEngine::neu(konfig.lautstaerke);

        Self {
            inner: Arc::new(OrchestratorInner {
                konfig,
                registry,
                token_manager,
                lautstaerke: Mutex::new(lautstaerke),
                pipeline,
                bus,
                snapshots,
                aktiv: RwLock::new(None),
                wechsel_laeuft: AtomicBool::new(false),
                pumpen: Mutex::new(Vec::new()),
            }),
        }
    }

    // ------------------------------------------------------------------
    // Konfigurieren & Wechseln
    // ------------------------------------------------------------------

    /// Konfiguriert den Orchestrator auf einen Provider
    ///
    /// Baut und initialisiert frische Handles, startet die Ereignis-Pumpe
    /// und spielt persistierte Session- und Audio-Snapshots zurueck.
    /// Wiederholter Aufruf mit demselben Provider ist ein No-op;
    /// gleichzeitiges Konfigurieren wird mit `OperationLaeuftBereits`
    /// abgewiesen.
    pub async fn konfigurieren(&self, provider: &ProviderId) -> Result<()> {
        if let Some(bindung) = self.inner.aktiv.read().as_ref() {
            if bindung.descriptor.id == *provider {
                tracing::debug!(provider = %provider, "Bereits konfiguriert");
                return Ok(());
            }
        }
        let _wache = self.wechsel_sperren()?;
        self.konfigurieren_intern(provider, None).await
    }

    /// Wechselt auf einen anderen Provider
    ///
    /// Mit `session_erhalten` wird die laufende Session (Kanal, Benutzer,
    /// Rolle) und die Audio-Einstellung auf den neuen Provider uebertragen,
    /// sofern eine Session bestand. Fehlschlaege werden durchgereicht; der
    /// alte Provider wird nicht wiederhergestellt.
    pub async fn provider_wechseln(
        &self,
        ziel: &ProviderId,
        session_erhalten: bool,
    ) -> Result<()> {
        // Vorabpruefung, bevor die Flagge belegt wird
        self.inner.registry.holen(ziel)?;
        let _wache = self.wechsel_sperren()?;

        let bestehend = {
            let aktiv = self.inner.aktiv.read();
            match aktiv.as_ref() {
                Some(bindung) if bindung.descriptor.id == *ziel => {
                    tracing::debug!(provider = %ziel, "Wechsel auf aktiven Provider – No-op");
                    return Ok(());
                }
                Some(bindung) => Some((bindung.session.clone(), bindung.audio)),
                None => None,
            }
        };

        let uebernahme = match bestehend {
            Some((session, audio)) if session_erhalten => Some((session, audio)),
            Some((_, audio)) => Some((None, audio)),
            None if session_erhalten => None,
            None => {
                // Ohne Erhalt darf die persistierte Session nicht auf dem
                // Ziel wieder eingespielt werden; Audio bleibt bestehen.
                let (_, audio) = self.snapshots_laden().await?;
                Some((None, audio))
            }
        };

        self.konfigurieren_intern(ziel, uebernahme).await?;

        // Erst nach erfolgreichem Aufbau verwerfen: schlaegt der Wechsel
        // fehl, behaelt die bisherige Bindung ihren Snapshot.
        if !session_erhalten {
            self.inner
                .snapshots
                .entfernen(SCHLUESSEL_SESSION)
                .await
                .map_err(SessionError::Persistenz)?;
        }
        Ok(())
    }

    /// Baut die aktive Bindung samt Pumpen und Zustands-Einspielung auf
    ///
    /// `uebernahme` ueberschreibt die persistierten Snapshots (Wechsel mit
    /// laufender Session); ohne Uebernahme wird der Store befragt.
    async fn konfigurieren_intern(
        &self,
        provider: &ProviderId,
        uebernahme: Option<(Option<SessionSnapshot>, AudioEinstellungen)>,
    ) -> Result<()> {
        let factory = self.inner.registry.holen(provider)?;
        let descriptor = factory.descriptor().clone();
        let verbindung = factory.verbindung_bauen();
        let messaging = factory.messaging_bauen();

        // Initialisierung VOR dem Abbau der alten Bindung: schlaegt sie
        // fehl, bleibt der bisherige Provider unangetastet.
        verbindung.initialisieren().await?;
        messaging.initialisieren().await?;

        let von = self.alte_bindung_abbauen().await;

        self.pumpen_starten(provider.clone(), Arc::clone(&verbindung));

        let (session, audio) = match uebernahme {
            Some(paar) => paar,
            None => self.snapshots_laden().await?,
        };

        *self.inner.aktiv.write() = Some(AktiveBindung {
            descriptor,
            verbindung: Arc::clone(&verbindung),
            messaging,
            session: None,
            audio,
        });

        verbindung.mute_setzen(audio.gemutet).await?;
        verbindung.lautstaerke_setzen(audio.lautstaerke).await?;

        if let Some(snapshot) = session {
            self.session_wiederaufnehmen(provider, &verbindung, snapshot)
                .await?;
        }

        tracing::info!(von = ?von, nach = %provider, "Provider konfiguriert");
        self.inner.bus.senden(PalaverEvent::ProviderGewechselt {
            von,
            nach: provider.clone(),
        });
        Ok(())
    }

    /// Spielt eine frueher bestehende Session auf die neue Bindung zurueck
    ///
    /// Das alte Token ist an den alten Provider gebunden; ohne registrierten
    /// Erneuerungs-Handler kann keine frische Zugangsberechtigung beschafft
    /// werden und die Session startet getrennt.
    async fn session_wiederaufnehmen(
        &self,
        provider: &ProviderId,
        verbindung: &Arc<dyn ProviderVerbindung>,
        snapshot: SessionSnapshot,
    ) -> Result<()> {
        let token = match self.inner.token_manager.sofort_erneuern(provider).await {
            Ok(token) => token,
            Err(TokenError::KeinHandler(_)) => {
                tracing::warn!(
                    provider = %provider,
                    kanal = %snapshot.kanal,
                    "Kein Token-Handler – Session wird nicht wiederaufgenommen"
                );
                return Ok(());
            }
            Err(e) => return Err(e.into()),
        };

        verbindung
            .verbinden(&snapshot.kanal, &snapshot.user, &token)
            .await?;
        verbindung.rolle_wechseln(snapshot.rolle).await?;

        tracing::info!(provider = %provider, kanal = %snapshot.kanal, "Session wiederaufgenommen");
        let snapshot_kopie = snapshot.clone();
        if let Some(bindung) = self.inner.aktiv.write().as_mut() {
            bindung.session = Some(snapshot);
        }
        self.session_persistieren(&snapshot_kopie).await
    }

    /// Baut die alte Bindung ab (Pumpen, Verbindung, Messaging)
    async fn alte_bindung_abbauen(&self) -> Option<ProviderId> {
        let alt = self.inner.aktiv.write().take();
        self.pumpen_stoppen();

        let alt = alt?;
        let id = alt.descriptor.id.clone();
        if let Err(e) = alt.verbindung.trennen().await {
            tracing::warn!(provider = %id, fehler = %e, "Trennen der alten Verbindung fehlgeschlagen");
        }
        if let Err(e) = alt.messaging.schliessen().await {
            tracing::warn!(provider = %id, fehler = %e, "Schliessen des alten Messagings fehlgeschlagen");
        }
        Some(id)
    }

    /// Baut die Session vollstaendig ab
    ///
    /// Persistiert den letzten Stand, trennt Verbindung und Messaging,
    /// stoppt die Pumpen und verwirft den Token-Zeitplan des Providers.
    pub async fn trennen(&self) -> Result<()> {
        let _wache = self.wechsel_sperren()?;

        let bindung = self.inner.aktiv.write().take();
        self.pumpen_stoppen();
        let Some(bindung) = bindung else {
            return Ok(());
        };

        if let Some(snapshot) = &bindung.session {
            self.session_persistieren(snapshot).await?;
        }
        self.audio_persistieren(bindung.audio).await?;

        let id = bindung.descriptor.id.clone();
        if let Err(e) = bindung.verbindung.trennen().await {
            tracing::warn!(provider = %id, fehler = %e, "Trennen fehlgeschlagen");
        }
        if let Err(e) = bindung.messaging.schliessen().await {
            tracing::warn!(provider = %id, fehler = %e, "Schliessen fehlgeschlagen");
        }
        self.inner.token_manager.erneuerung_entfernen(&id);

        tracing::info!(provider = %id, "Session abgebaut");
        Ok(())
    }

    // ------------------------------------------------------------------
    // Session-Operationen
    // ------------------------------------------------------------------

    /// Tritt einem Kanal bei und persistiert den Session-Snapshot
    pub async fn beitreten(
        &self,
        kanal: &str,
        user: UserId,
        rolle: ClientRolle,
        token: &str,
    ) -> Result<()> {
        let verbindung = self.aktive_verbindung()?;
        verbindung.verbinden(kanal, &user, token).await?;
        verbindung.rolle_wechseln(rolle).await?;

        let snapshot = SessionSnapshot::neu(kanal, user, rolle);
        if let Some(bindung) = self.inner.aktiv.write().as_mut() {
            bindung.session = Some(snapshot.clone());
        }
        self.session_persistieren(&snapshot).await
    }

    /// Verlaesst den aktuellen Kanal und verwirft den Session-Snapshot
    pub async fn verlassen(&self) -> Result<()> {
        let verbindung = self.aktive_verbindung()?;
        verbindung.trennen().await?;

        if let Some(bindung) = self.inner.aktiv.write().as_mut() {
            bindung.session = None;
        }
        self.inner
            .snapshots
            .entfernen(SCHLUESSEL_SESSION)
            .await
            .map_err(SessionError::Persistenz)
    }

    /// Mutet bzw. unmutet das lokale Mikrofon
    pub async fn mute_setzen(&self, gemutet: bool) -> Result<()> {
        let verbindung = self.aktive_verbindung()?;
        verbindung.mute_setzen(gemutet).await?;

        let audio = self.audio_aktualisieren(|a| a.gemutet = gemutet)?;
        self.audio_persistieren(audio).await
    }

    /// Setzt die Wiedergabe-Lautstaerke (geclamped auf [0,1])
    pub async fn lautstaerke_setzen(&self, pegel: f32) -> Result<()> {
        let pegel = pegel.clamp(0.0, 1.0);
        let verbindung = self.aktive_verbindung()?;
        verbindung.lautstaerke_setzen(pegel).await?;

        let audio = self.audio_aktualisieren(|a| a.lautstaerke = pegel)?;
        self.audio_persistieren(audio).await
    }

    /// Wechselt die Client-Rolle
    pub async fn rolle_wechseln(&self, rolle: ClientRolle) -> Result<()> {
        let verbindung = self.aktive_verbindung()?;
        verbindung.rolle_wechseln(rolle).await?;

        let snapshot = {
            let mut aktiv = self.inner.aktiv.write();
            let bindung = aktiv.as_mut().ok_or(SessionError::KeineAktiveSession)?;
            if let Some(session) = bindung.session.as_mut() {
                session.rolle = rolle;
            }
            bindung.session.clone()
        };
        if let Some(snapshot) = snapshot {
            self.session_persistieren(&snapshot).await?;
        }
        Ok(())
    }

    /// Sendet eine Nachricht ueber den Messaging-Teil des aktiven Providers
    pub async fn nachricht_senden(&self, nachricht: &EchtzeitNachricht) -> Result<()> {
        let messaging = {
            self.inner
                .aktiv
                .read()
                .as_ref()
                .map(|b| Arc::clone(&b.messaging))
                .ok_or(SessionError::KeineAktiveSession)?
        };
        messaging.senden(nachricht).await?;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Ereignis-Pumpen
    // ------------------------------------------------------------------

    fn pumpen_starten(&self, provider: ProviderId, verbindung: Arc<dyn ProviderVerbindung>) {
        // Die Pumpe haelt den Orchestrator nur schwach: haelte sie ihn
        // stark, koennte `OrchestratorInner::drop` nie laufen und die
        // Pumpen wuerden den Prozess ueberleben.
        let ereignis_pumpe = {
            let inner: Weak<OrchestratorInner> = Arc::downgrade(&self.inner);
            let provider = provider.clone();
            let mut rx = verbindung.ereignisse();
            tokio::spawn(async move {
                loop {
                    match rx.recv().await {
                        Ok(ereignis) => {
                            let Some(inner) = inner.upgrade() else { break };
                            let orchestrator = SessionOrchestrator { inner };
                            orchestrator
                                .provider_ereignis_behandeln(&provider, ereignis)
                                .await
                        }
                        Err(broadcast::error::RecvError::Lagged(n)) => {
                            tracing::warn!(provider = %provider, verloren = n, "Ereignis-Pumpe haengt hinterher");
                        }
                        Err(broadcast::error::RecvError::Closed) => break,
                    }
                }
            })
        };

        // Frische Tokens aus dem Bus auf die laufende Verbindung anwenden
        let token_pumpe = {
            let mut rx = self.inner.bus.abonnieren();
            tokio::spawn(async move {
                loop {
                    match rx.recv().await {
                        Ok(PalaverEvent::TokenErneuert { provider: p, token }) if p == provider => {
                            if let Err(e) = verbindung.token_anwenden(&token).await {
                                tracing::warn!(provider = %p, fehler = %e, "Token-Anwendung fehlgeschlagen");
                            }
                        }
                        Ok(_) => {}
                        Err(broadcast::error::RecvError::Lagged(n)) => {
                            tracing::warn!(verloren = n, "Token-Pumpe haengt hinterher");
                        }
                        Err(broadcast::error::RecvError::Closed) => break,
                    }
                }
            })
        };

        let mut pumpen = self.inner.pumpen.lock();
        pumpen.push(ereignis_pumpe);
        pumpen.push(token_pumpe);
    }

    fn pumpen_stoppen(&self) {
        for pumpe in self.inner.pumpen.lock().drain(..) {
            pumpe.abort();
        }
    }

    /// Verteilt ein Provider-Ereignis an das zustaendige Subsystem
    async fn provider_ereignis_behandeln(&self, provider: &ProviderId, ereignis: ProviderEreignis) {
        match ereignis {
            ProviderEreignis::TokenLaeuftAb { sekunden } => {
                if let Err(e) = self.inner.token_manager.token_ablauf_behandeln(
                    provider.clone(),
                    sekunden,
                    self.inner.konfig.token.vorlauf_sekunden,
                ) {
                    tracing::warn!(provider = %provider, fehler = %e, "Token-Ablauf nicht behandelbar");
                }
            }
            ProviderEreignis::LautstaerkeProben(proben) => {
                let ergebnis = self.inner.lautstaerke.lock().batch_verarbeiten(&proben);
                for info in ergebnis.infos {
                    self.inner.bus.senden(PalaverEvent::LautstaerkeAktualisiert {
                        user_id: info.user_id,
                        pegel: info.pegel,
                        spricht: info.spricht,
                    });
                }
                for ereignis in ergebnis.ereignisse {
                    self.inner.bus.senden(match ereignis {
                        LautstaerkeEreignis::SprechenBegonnen(user_id) => {
                            PalaverEvent::SprechenBegonnen { user_id }
                        }
                        LautstaerkeEreignis::SprechenBeendet(user_id) => {
                            PalaverEvent::SprechenBeendet { user_id }
                        }
                        LautstaerkeEreignis::DominanterSprecherGewechselt(user_id) => {
                            PalaverEvent::DominanterSprecherGewechselt { user_id }
                        }
                    });
                }
            }
            ProviderEreignis::NachrichtEmpfangen(nachricht) => {
                let id = nachricht.id;
                if let Err(e) = self.inner.pipeline.nachricht_verarbeiten(nachricht).await {
                    tracing::warn!(nachricht = %id, fehler = %e, "Eingehende Nachricht abgelehnt");
                }
            }
            ProviderEreignis::VerbindungGeaendert(zustand) => {
                self.inner.bus.senden(PalaverEvent::VerbindungGeaendert {
                    provider: provider.clone(),
                    zustand,
                });
            }
        }
    }

    // ------------------------------------------------------------------
    // Snapshots
    // ------------------------------------------------------------------

    async fn snapshots_laden(&self) -> Result<(Option<SessionSnapshot>, AudioEinstellungen)> {
        let session = match self
            .inner
            .snapshots
            .laden(SCHLUESSEL_SESSION)
            .await
            .map_err(SessionError::Persistenz)?
        {
            Some(bytes) => Some(serde_json::from_slice(&bytes)?),
            None => None,
        };
        let audio = match self
            .inner
            .snapshots
            .laden(SCHLUESSEL_AUDIO)
            .await
            .map_err(SessionError::Persistenz)?
        {
            Some(bytes) => serde_json::from_slice(&bytes)?,
            None => AudioEinstellungen::default(),
        };
        Ok((session, audio))
    }

    async fn session_persistieren(&self, snapshot: &SessionSnapshot) -> Result<()> {
        let bytes = serde_json::to_vec(snapshot)?;
        self.inner
            .snapshots
            .speichern(SCHLUESSEL_SESSION, bytes)
            .await
            .map_err(SessionError::Persistenz)
    }

    async fn audio_persistieren(&self, audio: AudioEinstellungen) -> Result<()> {
        let bytes = serde_json::to_vec(&audio)?;
        self.inner
            .snapshots
            .speichern(SCHLUESSEL_AUDIO, bytes)
            .await
            .map_err(SessionError::Persistenz)
    }

    // ------------------------------------------------------------------
    // Zugriff & Hilfen
    // ------------------------------------------------------------------

    fn wechsel_sperren(&self) -> Result<WechselWache<'_>> {
        if self
            .inner
            .wechsel_laeuft
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(SessionError::OperationLaeuftBereits);
        }
        Ok(WechselWache {
            flagge: &self.inner.wechsel_laeuft,
        })
    }

    fn aktive_verbindung(&self) -> Result<Arc<dyn ProviderVerbindung>> {
        self.inner
            .aktiv
            .read()
            .as_ref()
            .map(|b| Arc::clone(&b.verbindung))
            .ok_or(SessionError::KeineAktiveSession)
    }

    fn audio_aktualisieren(
        &self,
        f: impl FnOnce(&mut AudioEinstellungen),
    ) -> Result<AudioEinstellungen> {
        let mut aktiv = self.inner.aktiv.write();
        let bindung = aktiv.as_mut().ok_or(SessionError::KeineAktiveSession)?;
        f(&mut bindung.audio);
        Ok(bindung.audio)
    }

    /// Der aktuell konfigurierte Provider
    pub fn aktiver_provider(&self) -> Option<ProviderId> {
        self.inner
            .aktiv
            .read()
            .as_ref()
            .map(|b| b.descriptor.id.clone())
    }

    /// Die aktuelle Session, falls einem Kanal beigetreten wurde
    pub fn session(&self) -> Option<SessionSnapshot> {
        self.inner.aktiv.read().as_ref().and_then(|b| b.session.clone())
    }

    /// Die aktuellen Audio-Einstellungen
    pub fn audio(&self) -> Option<AudioEinstellungen> {
        self.inner.aktiv.read().as_ref().map(|b| b.audio)
    }

    /// Abonniert den Ereignis-Bus
    pub fn abonnieren(&self) -> broadcast::Receiver<PalaverEvent> {
        self.inner.bus.abonnieren()
    }

    /// Der gemeinsame Ereignis-Bus
    pub fn bus(&self) -> &EreignisBus {
        &self.inner.bus
    }

    /// Die Nachrichten-Pipeline (Prozessor-Registrierung etc.)
    pub fn pipeline(&self) -> &NachrichtenPipeline {
        &self.inner.pipeline
    }

    /// Der Token-Manager (Handler-Registrierung etc.)
    pub fn token_manager(&self) -> &TokenManager {
        &self.inner.token_manager
    }

    /// Die Factory-Registry
    pub fn registry(&self) -> &Arc<ProviderRegistry> {
        &self.inner.registry
    }

    /// Die geladene Konfiguration
    pub fn konfiguration(&self) -> &OrchestratorKonfiguration {
        &self.inner.konfig
    }

    /// Momentaufnahme der Lautstaerke-Zustaende
    pub fn lautstaerke_momentaufnahme(&self) -> Vec<BenutzerLautstaerke> {
        self.inner.lautstaerke.lock().momentaufnahme()
    }

    /// Der aktuell dominante Sprecher
    pub fn dominanter_sprecher(&self) -> Option<UserId> {
        self.inner.lautstaerke.lock().dominanter_sprecher().cloned()
    }
}

impl Drop for OrchestratorInner {
    fn drop(&mut self) {
        for pumpe in self.pumpen.lock().drain(..) {
            pumpe.abort();
        }
    }
}
