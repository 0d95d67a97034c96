use std::{
    collections::HashMap,
    sync::atomic::{AtomicU64, Ordering},
};

use tokio::sync::{oneshot, Mutex};
use uuid::Uuid;

use crate::{
    bake::{bake_slots, magic_hash},
    model::{BakeLayer, WearableRecord, WearableSlot},
    packets::{
        CachedTextureQuery, CachedTextureQueryEntry, CachedTextureResponse, PacketSink,
        OutboundPacket, SessionIds,
    },
    texture_table::TextureTable,
};

/// XOR-reduction of the worn asset ids contributing to `layer`. Zero means
/// "nothing in this layer" (`spec.md` §3).
pub fn raw_fingerprint(
    layer: BakeLayer,
    snapshot: &HashMap<WearableSlot, WearableRecord>,
) -> u128 {
    bake_slots(layer).iter().fold(0u128, |acc, slot| {
        let contribution = snapshot
            .get(slot)
            .map(|record| record.asset_id.as_u128())
            .unwrap_or(0);
        acc ^ contribution
    })
}

/// The fingerprint actually placed on the wire: `raw_fingerprint` XOR the
/// layer's magic hash, or `None` if the layer has nothing worn in it
/// (`spec.md` §3, §4.4).
pub fn published_fingerprint(
    layer: BakeLayer,
    snapshot: &HashMap<WearableSlot, WearableRecord>,
) -> Option<Uuid> {
    let raw = raw_fingerprint(layer, snapshot);
    if raw == 0 {
        None
    } else {
        Some(Uuid::from_u128(raw ^ magic_hash(layer).as_u128()))
    }
}

/// Computes fingerprints, issues the cache query, and completes the
/// one-shot response barrier (`spec.md` §4.4, §9).
pub struct CacheNegotiator {
    serial: AtomicU64,
    pending: Mutex<Option<oneshot::Sender<CachedTextureResponse>>>,
}

impl Default for CacheNegotiator {
    fn default() -> Self {
        Self::new()
    }
}

impl CacheNegotiator {
    pub fn new() -> Self {
        Self {
            serial: AtomicU64::new(0),
            pending: Mutex::new(None),
        }
    }

    fn build_query(&self, ids: SessionIds, snapshot: &HashMap<WearableSlot, WearableRecord>) -> CachedTextureQuery {
        let serial = self.serial.fetch_add(1, Ordering::SeqCst) + 1;
        let entries = BakeLayer::ALL
            .into_iter()
            .filter_map(|layer| published_fingerprint(layer, snapshot).map(|fp| CachedTextureQueryEntry {
                layer,
                fingerprint: fp,
            }))
            .collect();
        CachedTextureQuery {
            ids,
            serial,
            entries,
        }
    }

    /// Sends a `CachedTextureQuery` and registers the one-shot barrier the
    /// orchestrator awaits for the response. Returns `None` when every
    /// layer is empty, in which case the query is suppressed entirely
    /// (`spec.md` §8 boundary behavior) and no response is expected.
    pub async fn query(
        &self,
        ids: SessionIds,
        snapshot: &HashMap<WearableSlot, WearableRecord>,
        sink: &dyn PacketSink,
    ) -> Option<oneshot::Receiver<CachedTextureResponse>> {
        let packet = self.build_query(ids, snapshot);
        if packet.entries.is_empty() {
            return None;
        }

        let (tx, rx) = oneshot::channel();
        *self.pending.lock().await = Some(tx);
        sink.send(OutboundPacket::CachedTextureQuery(packet));
        Some(rx)
    }

    /// Delivers an inbound `CachedTextureResponse` to whatever run is
    /// waiting on it. Fires the cache-negotiated completion exactly once;
    /// a response with nothing pending is dropped.
    pub async fn deliver_response(&self, response: CachedTextureResponse) {
        if let Some(tx) = self.pending.lock().await.take() {
            let _ = tx.send(response);
        }
    }

    /// Applies a response into the texture table: nonzero ids populate the
    /// corresponding baked face, zero ids are left alone (forcing a local
    /// rebake in the fetch/bake stage).
    pub fn apply_response(response: &CachedTextureResponse, table: &mut TextureTable) {
        for entry in &response.entries {
            if !entry.texture_id.is_nil() {
                table.set_texture_id(entry.layer.baked_face(), entry.texture_id);
            }
        }
    }
}
