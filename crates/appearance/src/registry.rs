use std::collections::HashMap;

use tokio::sync::{watch, Mutex};
use uuid::Uuid;

use crate::{
    model::{DecodedAsset, WearableRecord, WearableSlot},
    packets::WearablesUpdate,
};

/// Authoritative slot → worn-wearable mapping. All operations serialize
/// under a single mutex (`spec.md` §4.2); cross-thread reads go through
/// [`WearableRegistry::snapshot`], never a borrow into the guarded map.
pub struct WearableRegistry {
    inner: Mutex<HashMap<WearableSlot, WearableRecord>>,
    generation: watch::Sender<u64>,
}

impl WearableRegistry {
    /// Returns the registry plus a receiver that ticks once per
    /// wearables-received event (a fresh, non-duplicate wearables-update).
    pub fn new() -> (Self, watch::Receiver<u64>) {
        let (tx, rx) = watch::channel(0);
        (
            Self {
                inner: Mutex::new(HashMap::new()),
                generation: tx,
            },
            rx,
        )
    }

    /// Apply an inbound `WearablesUpdate` packet. Returns `true` iff the
    /// registry actually changed (and the wearables-received event fired);
    /// duplicate packets are discarded silently (`spec.md` §4.2, §8).
    pub async fn update_from_server(&self, packet: &WearablesUpdate) -> bool {
        let mut incoming: HashMap<WearableSlot, (Uuid, Uuid)> = HashMap::new();
        for block in &packet.blocks {
            if block.slot == WearableSlot::Invalid {
                continue;
            }
            incoming.insert(block.slot, (block.item_id, block.asset_id));
        }

        let mut guard = self.inner.lock().await;

        let changed = incoming.iter().any(|(slot, (item_id, asset_id))| {
            match guard.get(slot) {
                None => true,
                Some(existing) => existing.item_id != *item_id || existing.asset_id != *asset_id,
            }
        }) || guard.keys().any(|slot| !incoming.contains_key(slot));

        if !changed {
            return false;
        }

        let mut replacement = HashMap::with_capacity(incoming.len());
        for (slot, (item_id, asset_id)) in incoming {
            replacement.insert(slot, WearableRecord::new(item_id, asset_id, slot));
        }
        *guard = replacement;
        drop(guard);

        self.generation.send_modify(|g| *g = g.wrapping_add(1));
        true
    }

    pub async fn get_asset_id(&self, slot: WearableSlot) -> Uuid {
        self.inner
            .lock()
            .await
            .get(&slot)
            .map(|r| r.asset_id)
            .unwrap_or(Uuid::nil())
    }

    pub async fn is_worn(&self, item_id: Uuid) -> Option<WearableSlot> {
        self.inner
            .lock()
            .await
            .values()
            .find(|r| r.item_id == item_id)
            .map(|r| r.slot)
    }

    /// Deep copy for use outside the lock.
    pub async fn snapshot(&self) -> HashMap<WearableSlot, WearableRecord> {
        self.inner.lock().await.clone()
    }

    pub async fn records_without_asset(&self) -> Vec<WearableRecord> {
        self.inner
            .lock()
            .await
            .values()
            .filter(|r| r.asset.is_none())
            .cloned()
            .collect()
    }

    /// Installs a decoded asset for `slot`, but only if `asset_id` still
    /// matches the currently-worn item — a later wearables-update may have
    /// replaced it while the fetch was in flight.
    pub async fn install_decoded_asset(
        &self,
        slot: WearableSlot,
        asset_id: Uuid,
        asset: DecodedAsset,
    ) -> bool {
        let mut guard = self.inner.lock().await;
        match guard.get_mut(&slot) {
            Some(record) if record.asset_id == asset_id => {
                record.asset = Some(asset);
                true
            }
            _ => false,
        }
    }
}
