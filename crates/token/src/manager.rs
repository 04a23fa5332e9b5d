//! Token-Manager – geplante Erneuerung mit Retry und Backoff
//!
//! Zustandsmaschine pro Provider:
//! `Unbekannt -> Aktiv -> Erneuernd -> {Aktiv, Fehlgeschlagen}`
//!
//! `Fehlgeschlagen` ist nicht terminal – das naechste Ablauf-Ereignis
//! betritt wieder `Erneuernd`. Pro Provider ist hoechstens eine Erneuerung
//! geplant (last-write-wins: ein neues Ablauf-Ereignis ersetzt den alten
//! Zeitplan). Erneuerungen verschiedener Provider laufen unabhaengig auf
//! eigenen Tasks und blockieren einander nie.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use palaver_core::event::{EreignisBus, PalaverEvent};
use palaver_core::types::ProviderId;
use tokio::task::JoinHandle;

use crate::config::RetryKonfiguration;
use crate::error::{Result, TokenError};

/// Vorlauf in Sekunden: so lange vor Ablauf wird standardmaessig erneuert
pub const STANDARD_VORLAUF_SEKUNDEN: u32 = 30;

/// Status eines Provider-Tokens
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenStatus {
    Unbekannt,
    Aktiv,
    Erneuernd,
    Fehlgeschlagen,
}

/// Zustand eines Provider-Tokens
///
/// Wird lazy angelegt sobald ein Handler registriert wird und beim
/// Entfernen des Handlers verworfen.
#[derive(Debug, Clone)]
pub struct TokenZustand {
    pub status: TokenStatus,
    /// Zeitpunkt der letzten erfolgreichen Erneuerung
    pub letzte_erneuerung: Option<DateTime<Utc>>,
    /// Bekannter Ablaufzeitpunkt des aktuellen Tokens
    pub laeuft_ab_am: Option<DateTime<Utc>>,
    /// Kumulative Versuche der laufenden Erneuerungs-Sequenz
    pub versuche: u32,
    /// Letzter Fehler (bleibt nach `Fehlgeschlagen` erhalten)
    pub letzter_fehler: Option<String>,
}

impl TokenZustand {
    fn neu() -> Self {
        Self {
            status: TokenStatus::Unbekannt,
            letzte_erneuerung: None,
            laeuft_ab_am: None,
            versuche: 0,
            letzter_fehler: None,
        }
    }
}

/// Erneuerungs-Callback – liefert ein frisches Token oder schlaegt fehl
///
/// Wird pro Provider von aussen injiziert; die konkrete Beschaffung
/// (App-Server, Vendor-API) ist Sache des Integrators.
#[async_trait]
pub trait TokenErneuerer: Send + Sync {
    async fn erneuern(&self) -> anyhow::Result<String>;
}

struct TokenManagerInner {
    zustaende: DashMap<ProviderId, TokenZustand>,
    handler: DashMap<ProviderId, Arc<dyn TokenErneuerer>>,
    retry: DashMap<ProviderId, RetryKonfiguration>,
    standard_retry: RetryKonfiguration,
    geplant: DashMap<ProviderId, JoinHandle<()>>,
    bus: EreignisBus,
}

/// Token-Manager – thread-safe, Clone teilt den inneren Zustand
#[derive(Clone)]
pub struct TokenManager {
    inner: Arc<TokenManagerInner>,
}

impl TokenManager {
    /// Erstellt einen neuen TokenManager
    pub fn neu(bus: EreignisBus, standard_retry: RetryKonfiguration) -> Self {
        Self {
            inner: Arc::new(TokenManagerInner {
                zustaende: DashMap::new(),
                handler: DashMap::new(),
                retry: DashMap::new(),
                standard_retry,
                geplant: DashMap::new(),
                bus,
            }),
        }
    }

    /// Registriert den Erneuerungs-Handler fuer einen Provider
    ///
    /// Legt lazy einen `TokenZustand` in `Unbekannt` an falls keiner existiert.
    pub fn erneuerung_registrieren(
        &self,
        provider: ProviderId,
        handler: Arc<dyn TokenErneuerer>,
    ) {
        self.inner
            .zustaende
            .entry(provider.clone())
            .or_insert_with(TokenZustand::neu);
        self.inner.handler.insert(provider.clone(), handler);
        tracing::debug!(provider = %provider, "Token-Handler registriert");
    }

    /// Ueberschreibt die Retry-Konfiguration fuer einen Provider
    pub fn retry_setzen(&self, provider: ProviderId, konfig: RetryKonfiguration) {
        self.inner.retry.insert(provider, konfig);
    }

    /// Gibt den aktuellen Token-Zustand eines Providers zurueck
    pub fn zustand(&self, provider: &ProviderId) -> Option<TokenZustand> {
        self.inner.zustaende.get(provider).map(|z| z.clone())
    }

    /// Behandelt ein Token-laeuft-ab-Ereignis des Providers
    ///
    /// Plant eine einmalige Erneuerung nach
    /// `max(0, sekunden_verbleibend - vorlauf)`. Ein neuer Aufruf fuer
    /// denselben Provider ersetzt einen bereits laufenden Zeitplan
    /// (last-write-wins, keine Warteschlange).
    pub fn token_ablauf_behandeln(
        &self,
        provider: ProviderId,
        sekunden_verbleibend: u32,
        vorlauf_sekunden: u32,
    ) -> Result<()> {
        if !self.inner.handler.contains_key(&provider) {
            return Err(TokenError::KeinHandler(provider));
        }

        if let Some(mut zustand) = self.inner.zustaende.get_mut(&provider) {
            zustand.laeuft_ab_am =
                Some(Utc::now() + chrono::Duration::seconds(sekunden_verbleibend as i64));
        }

        let verzoegerung =
            Duration::from_secs(sekunden_verbleibend.saturating_sub(vorlauf_sekunden) as u64);
        tracing::debug!(
            provider = %provider,
            verbleibend = sekunden_verbleibend,
            verzoegerung_s = verzoegerung.as_secs(),
            "Token-Erneuerung geplant"
        );

        let manager = self.clone();
        let task_provider = provider.clone();
        let handle = tokio::spawn(async move {
            tokio::time::sleep(verzoegerung).await;
            let _ = manager.erneuerung_durchfuehren(&task_provider).await;
        });

        // Alten Zeitplan wholesale abbrechen (inklusive Backoff-Schlaf)
        if let Some(alt) = self.inner.geplant.insert(provider, handle) {
            alt.abort();
        }
        Ok(())
    }

    /// Wie `token_ablauf_behandeln`, mit Standard-Vorlauf von 30 Sekunden
    pub fn token_laeuft_ab(&self, provider: ProviderId, sekunden_verbleibend: u32) -> Result<()> {
        self.token_ablauf_behandeln(provider, sekunden_verbleibend, STANDARD_VORLAUF_SEKUNDEN)
    }

    /// Erneuert das Token sofort, ein bestehender Zeitplan wird verworfen
    pub async fn sofort_erneuern(&self, provider: &ProviderId) -> Result<String> {
        if let Some((_, handle)) = self.inner.geplant.remove(provider) {
            handle.abort();
        }
        self.erneuerung_durchfuehren(provider).await
    }

    /// Fuehrt die Erneuerungs-Sequenz durch (intern, vom Zeitplan aufgerufen)
    async fn erneuerung_durchfuehren(&self, provider: &ProviderId) -> Result<String> {
        let handler = self
            .inner
            .handler
            .get(provider)
            .map(|h| Arc::clone(h.value()))
            .ok_or_else(|| TokenError::KeinHandler(provider.clone()))?;

        let retry = self
            .inner
            .retry
            .get(provider)
            .map(|r| *r.value())
            .unwrap_or(self.inner.standard_retry);

        let mut versuch = 0u32;
        loop {
            versuch += 1;
            self.zustand_aendern(provider, |z| {
                z.status = TokenStatus::Erneuernd;
                z.versuche += 1;
            });

            match handler.erneuern().await {
                Ok(token) => {
                    self.zustand_aendern(provider, |z| {
                        z.status = TokenStatus::Aktiv;
                        z.versuche = 0;
                        z.letzte_erneuerung = Some(Utc::now());
                        z.letzter_fehler = None;
                    });
                    tracing::info!(provider = %provider, versuch, "Token erneuert");
                    self.inner.bus.senden(PalaverEvent::TokenErneuert {
                        provider: provider.clone(),
                        token: token.clone(),
                    });
                    return Ok(token);
                }
                Err(fehler) => {
                    let grund = fehler.to_string();
                    self.zustand_aendern(provider, |z| {
                        z.letzter_fehler = Some(grund.clone());
                    });

                    if versuch >= retry.max_versuche {
                        self.zustand_aendern(provider, |z| {
                            z.status = TokenStatus::Fehlgeschlagen;
                        });
                        tracing::warn!(
                            provider = %provider,
                            versuche = versuch,
                            fehler = %grund,
                            "Token-Erneuerung endgueltig fehlgeschlagen"
                        );
                        self.inner.bus.senden(PalaverEvent::TokenFehlgeschlagen {
                            provider: provider.clone(),
                            grund: grund.clone(),
                        });
                        return Err(TokenError::ErneuerungFehlgeschlagen {
                            provider: provider.clone(),
                            versuche: versuch,
                            grund,
                        });
                    }

                    let pause = retry.verzoegerung_fuer(versuch);
                    tracing::debug!(
                        provider = %provider,
                        versuch,
                        pause_ms = pause.as_millis() as u64,
                        "Token-Erneuerung fehlgeschlagen, Backoff"
                    );
                    tokio::time::sleep(pause).await;
                }
            }
        }
    }

    /// Entfernt Handler, Zeitplan und Zustand eines Providers
    pub fn erneuerung_entfernen(&self, provider: &ProviderId) {
        if let Some((_, handle)) = self.inner.geplant.remove(provider) {
            handle.abort();
        }
        self.inner.handler.remove(provider);
        self.inner.zustaende.remove(provider);
        self.inner.retry.remove(provider);
        tracing::debug!(provider = %provider, "Token-Handler entfernt");
    }

    fn zustand_aendern<F: FnOnce(&mut TokenZustand)>(&self, provider: &ProviderId, f: F) {
        let mut zustand = self
            .inner
            .zustaende
            .entry(provider.clone())
            .or_insert_with(TokenZustand::neu);
        f(&mut zustand);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    /// Handler der die ersten `fehler` Aufrufe scheitern laesst
    struct ZaehlErneuerer {
        aufrufe: AtomicU32,
        fehler: u32,
    }

    impl ZaehlErneuerer {
        fn neu(fehler: u32) -> Arc<Self> {
            Arc::new(Self {
                aufrufe: AtomicU32::new(0),
                fehler,
            })
        }

        fn anzahl(&self) -> u32 {
            self.aufrufe.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl TokenErneuerer for ZaehlErneuerer {
        async fn erneuern(&self) -> anyhow::Result<String> {
            let n = self.aufrufe.fetch_add(1, Ordering::SeqCst) + 1;
            if n <= self.fehler {
                anyhow::bail!("Versuch {} fehlgeschlagen", n);
            }
            Ok(format!("token-{}", n))
        }
    }

    fn schneller_retry() -> RetryKonfiguration {
        RetryKonfiguration {
            max_versuche: 3,
            basis_verzoegerung_ms: 100,
            max_verzoegerung_ms: 1_000,
            multiplikator: 2.0,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn zweimal_fehlschlag_dann_erfolg() {
        let manager = TokenManager::neu(EreignisBus::neu(), schneller_retry());
        let provider = ProviderId::neu("a");
        let handler = ZaehlErneuerer::neu(2);
        manager.erneuerung_registrieren(provider.clone(), handler.clone());

        let token = manager.sofort_erneuern(&provider).await.unwrap();
        assert_eq!(token, "token-3");
        assert_eq!(handler.anzahl(), 3);

        let zustand = manager.zustand(&provider).unwrap();
        assert_eq!(zustand.status, TokenStatus::Aktiv);
        assert_eq!(zustand.versuche, 0);
        assert!(zustand.letzter_fehler.is_none());
        assert!(zustand.letzte_erneuerung.is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn dauerhaft_fehlschlag_endet_in_fehlgeschlagen() {
        let manager = TokenManager::neu(EreignisBus::neu(), schneller_retry());
        let provider = ProviderId::neu("a");
        let handler = ZaehlErneuerer::neu(u32::MAX);
        manager.erneuerung_registrieren(provider.clone(), handler.clone());

        let fehler = manager.sofort_erneuern(&provider).await.unwrap_err();
        assert!(matches!(
            fehler,
            TokenError::ErneuerungFehlgeschlagen { versuche: 3, .. }
        ));
        assert_eq!(handler.anzahl(), 3);

        let zustand = manager.zustand(&provider).unwrap();
        assert_eq!(zustand.status, TokenStatus::Fehlgeschlagen);
        assert_eq!(zustand.versuche, 3);
        assert!(zustand.letzter_fehler.is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn fehlgeschlagen_ist_nicht_terminal() {
        let manager = TokenManager::neu(EreignisBus::neu(), schneller_retry());
        let provider = ProviderId::neu("a");
        // Scheitert 3x (erste Sequenz), danach Erfolg
        let handler = ZaehlErneuerer::neu(3);
        manager.erneuerung_registrieren(provider.clone(), handler.clone());

        assert!(manager.sofort_erneuern(&provider).await.is_err());
        assert_eq!(
            manager.zustand(&provider).unwrap().status,
            TokenStatus::Fehlgeschlagen
        );

        // Naechstes Ablauf-Ereignis betritt wieder Erneuernd und gelingt
        manager
            .token_ablauf_behandeln(provider.clone(), 40, 30)
            .unwrap();
        tokio::time::sleep(Duration::from_secs(60)).await;

        assert_eq!(
            manager.zustand(&provider).unwrap().status,
            TokenStatus::Aktiv
        );
    }

    #[tokio::test(start_paused = true)]
    async fn zeitplan_mit_vorlauf() {
        let manager = TokenManager::neu(EreignisBus::neu(), schneller_retry());
        let provider = ProviderId::neu("a");
        let handler = ZaehlErneuerer::neu(0);
        manager.erneuerung_registrieren(provider.clone(), handler.clone());

        // 40s verbleibend, 30s Vorlauf -> Erneuerung nach 10s
        manager
            .token_ablauf_behandeln(provider.clone(), 40, 30)
            .unwrap();

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(handler.anzahl(), 0, "Vor Ablauf der Verzoegerung");

        tokio::time::sleep(Duration::from_secs(6)).await;
        assert_eq!(handler.anzahl(), 1, "Nach Ablauf der Verzoegerung");
    }

    #[tokio::test(start_paused = true)]
    async fn neuer_zeitplan_ersetzt_alten() {
        let manager = TokenManager::neu(EreignisBus::neu(), schneller_retry());
        let provider = ProviderId::neu("a");
        let handler = ZaehlErneuerer::neu(0);
        manager.erneuerung_registrieren(provider.clone(), handler.clone());

        // Erster Zeitplan wuerde nach 10s feuern, der zweite nach 70s
        manager
            .token_ablauf_behandeln(provider.clone(), 40, 30)
            .unwrap();
        // Zweiter Aufruf bevor der erste feuert: last-write-wins
        manager
            .token_ablauf_behandeln(provider.clone(), 100, 30)
            .unwrap();

        tokio::time::sleep(Duration::from_secs(15)).await;
        assert_eq!(handler.anzahl(), 0, "Der ersetzte Zeitplan darf nicht feuern");

        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(handler.anzahl(), 1, "Nur der juengste Zeitplan laeuft");
    }

    #[tokio::test(start_paused = true)]
    async fn entfernen_bricht_zeitplan_ab() {
        let manager = TokenManager::neu(EreignisBus::neu(), schneller_retry());
        let provider = ProviderId::neu("a");
        let handler = ZaehlErneuerer::neu(0);
        manager.erneuerung_registrieren(provider.clone(), handler.clone());

        manager
            .token_ablauf_behandeln(provider.clone(), 40, 30)
            .unwrap();
        manager.erneuerung_entfernen(&provider);

        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(handler.anzahl(), 0);
        assert!(manager.zustand(&provider).is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn ablauf_ohne_handler_ist_fehler() {
        let manager = TokenManager::neu(EreignisBus::neu(), schneller_retry());
        let fehler = manager
            .token_ablauf_behandeln(ProviderId::neu("fremd"), 40, 30)
            .unwrap_err();
        assert!(matches!(fehler, TokenError::KeinHandler(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn provider_laufen_unabhaengig() {
        let manager = TokenManager::neu(EreignisBus::neu(), schneller_retry());
        let (pa, pb) = (ProviderId::neu("a"), ProviderId::neu("b"));
        // a braucht Backoff-Runden, b gelingt sofort
        let ha = ZaehlErneuerer::neu(2);
        let hb = ZaehlErneuerer::neu(0);
        manager.erneuerung_registrieren(pa.clone(), ha.clone());
        manager.erneuerung_registrieren(pb.clone(), hb.clone());

        manager.token_ablauf_behandeln(pa.clone(), 30, 30).unwrap();
        manager.token_ablauf_behandeln(pb.clone(), 30, 30).unwrap();

        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(manager.zustand(&pa).unwrap().status, TokenStatus::Aktiv);
        assert_eq!(manager.zustand(&pb).unwrap().status, TokenStatus::Aktiv);
    }

    #[tokio::test(start_paused = true)]
    async fn erfolg_wird_auf_dem_bus_gemeldet() {
        let bus = EreignisBus::neu();
        let mut rx = bus.abonnieren();
        let manager = TokenManager::neu(bus, schneller_retry());
        let provider = ProviderId::neu("a");
        manager.erneuerung_registrieren(provider.clone(), ZaehlErneuerer::neu(0));

        manager.sofort_erneuern(&provider).await.unwrap();

        let event = rx.recv().await.unwrap();
        assert!(matches!(event, PalaverEvent::TokenErneuert { .. }));
    }
}
