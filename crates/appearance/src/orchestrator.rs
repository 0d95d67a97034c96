//! Top-level run sequencing (`spec.md` §4.1). `Orchestrator` owns the
//! single-flight run-flag, the set-appearance serial, and every capability
//! the pipeline needs; `request_set_appearance` is the crate's one public
//! entry point.

use std::sync::{
    atomic::{AtomicU64, AtomicU8, Ordering},
    Arc, Mutex,
};

use tokio::{sync::watch, task::JoinHandle, time::timeout};
use tracing::{info, instrument, warn};

use crate::{
    config::PipelineConfig,
    error::{AppearanceError, RunOutcome},
    external::{AssetFetcher, BakedUploader, Baker, TextureFetcher},
    model::BakeLayer,
    negotiator::CacheNegotiator,
    packets::{OutboundPacket, PacketSink, SessionIds, WearablesRequest},
    publisher::build_set_appearance,
    registry::WearableRegistry,
    scheduler,
    texture_table::TextureTable,
};

const IDLE: u8 = 0;
const BUSY: u8 = 1;

/// Releases the run-flag on every exit path, including an early return or a
/// panic unwinding through `run` (`spec.md` §5 run-flag invariant).
struct RunGuard<'a>(&'a AtomicU8);

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        self.0.store(IDLE, Ordering::SeqCst);
    }
}

/// Everything external the orchestrator drives: the asset/texture
/// fetchers, the uploader, the baker, and the outbound packet sink
/// (`spec.md` §6).
pub struct Capabilities {
    pub asset_fetcher: Arc<dyn AssetFetcher>,
    pub texture_fetcher: Arc<dyn TextureFetcher>,
    pub uploader: Arc<dyn BakedUploader>,
    pub baker: Arc<dyn Baker>,
    pub sink: Arc<dyn PacketSink>,
}

pub struct Orchestrator {
    ids: SessionIds,
    registry: Arc<WearableRegistry>,
    wearables_received: tokio::sync::Mutex<watch::Receiver<u64>>,
    table: Arc<Mutex<TextureTable>>,
    negotiator: Arc<CacheNegotiator>,
    config: PipelineConfig,
    capabilities: Capabilities,
    run_flag: AtomicU8,
    serial: AtomicU64,
}

impl Orchestrator {
    pub fn new(ids: SessionIds, config: PipelineConfig, capabilities: Capabilities) -> Arc<Self> {
        let (registry, wearables_received) = WearableRegistry::new();
        Arc::new(Self {
            ids,
            registry: Arc::new(registry),
            wearables_received: tokio::sync::Mutex::new(wearables_received),
            table: Arc::new(Mutex::new(TextureTable::default())),
            negotiator: Arc::new(CacheNegotiator::new()),
            config,
            capabilities,
            run_flag: AtomicU8::new(IDLE),
            serial: AtomicU64::new(0),
        })
    }

    pub fn registry(&self) -> &WearableRegistry {
        &self.registry
    }

    pub fn negotiator(&self) -> &CacheNegotiator {
        &self.negotiator
    }

    /// Starts a run on a dedicated background task (`spec.md` §5) and
    /// returns immediately. A second call observing the busy run-flag
    /// returns `DuplicateRun` without queuing — it never blocks waiting for
    /// the in-flight run.
    pub fn request_set_appearance(
        self: &Arc<Self>,
        force_rebake: bool,
    ) -> Result<JoinHandle<Result<RunOutcome, AppearanceError>>, AppearanceError> {
        if self.ids.agent_id.is_nil() || self.ids.session_id.is_nil() {
            return Err(AppearanceError::TransportUnavailable);
        }
        if self
            .run_flag
            .compare_exchange(IDLE, BUSY, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(AppearanceError::DuplicateRun);
        }

        let this = self.clone();
        Ok(tokio::spawn(async move { this.run(force_rebake).await }))
    }

    #[instrument(skip(self))]
    async fn run(self: Arc<Self>, force_rebake: bool) -> Result<RunOutcome, AppearanceError> {
        let _guard = RunGuard(&self.run_flag);
        let mut outcome = RunOutcome::Complete;

        if force_rebake {
            let mut table = self.table.lock().expect("texture table mutex poisoned");
            for layer in BakeLayer::ALL {
                table.zero_face(layer.baked_face());
            }
        }

        let first_run = self.serial.load(Ordering::SeqCst) == 0;

        if first_run {
            self.capabilities
                .sink
                .send(OutboundPacket::WearablesRequest(WearablesRequest { ids: self.ids }));
            let mut rx = self.wearables_received.lock().await;
            if timeout(self.config.wearable_list_timeout, rx.changed()).await.is_err() {
                warn!("timed out waiting for wearables list");
                return Err(AppearanceError::WearablesEnumTimeout);
            }
        }

        scheduler::fetch_wearable_assets(
            &self.registry,
            &self.table,
            &self.capabilities.asset_fetcher,
            &self.config,
            &mut outcome,
        )
        .await;

        if first_run && !force_rebake {
            let snapshot = self.registry.snapshot().await;
            let receiver = self
                .negotiator
                .query(self.ids, &snapshot, self.capabilities.sink.as_ref())
                .await;

            if let Some(rx) = receiver {
                match timeout(self.config.cache_query_timeout, rx).await {
                    Ok(Ok(response)) => {
                        let mut table = self.table.lock().expect("texture table mutex poisoned");
                        CacheNegotiator::apply_response(&response, &mut table);
                    }
                    _ => {
                        warn!("cache negotiation timed out, treating all layers as misses");
                        outcome.degrade(AppearanceError::CacheNegotiationTimeout);
                    }
                }
            }
        }

        // A layer with nothing worn in it never has a baked id to recover
        // and never needs one — the cache query skips it for the same
        // reason (`negotiator::published_fingerprint` returns `None`).
        // Without this guard an unworn layer's permanently-zero baked face
        // would look "pending" forever and get baked from nothing.
        let pending: Vec<BakeLayer> = {
            let snapshot = self.registry.snapshot().await;
            let table = self.table.lock().expect("texture table mutex poisoned");
            BakeLayer::ALL
                .into_iter()
                .filter(|layer| {
                    table.get(layer.baked_face()).is_empty()
                        && crate::negotiator::raw_fingerprint(*layer, &snapshot) != 0
                })
                .collect()
        };

        scheduler::fetch_pending_textures(
            &self.table,
            &pending,
            &self.capabilities.texture_fetcher,
            &self.config,
            &mut outcome,
        )
        .await;

        scheduler::bake_and_upload(
            &self.registry,
            &self.table,
            &pending,
            &self.capabilities.baker,
            &self.capabilities.uploader,
            &self.config,
            &mut outcome,
        )
        .await;

        let serial = self.serial.fetch_add(1, Ordering::SeqCst) + 1;
        let snapshot = self.registry.snapshot().await;
        let packet = {
            let table = self.table.lock().expect("texture table mutex poisoned");
            build_set_appearance(self.ids, serial, &snapshot, &table)
        };
        self.capabilities.sink.send(OutboundPacket::SetAppearance(packet));
        info!(serial, partial = outcome.is_partial(), "published appearance");

        Ok(outcome)
    }
}
