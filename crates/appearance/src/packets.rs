//! Inbound/outbound message bodies (`spec.md` §6). How these cross the
//! wire — framing, message ids, routing to the right session — is the
//! transport's job and explicitly out of scope (`spec.md` §1). What lives
//! here is just the payload shape plus the narrow [`PacketSink`] egress
//! seam a transport plugs into.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::model::{BakeLayer, WearableSlot};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionIds {
    pub agent_id: Uuid,
    pub session_id: Uuid,
}

/// One (slot, item-id, asset-id) block of an inbound wearables-update.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct WearablesUpdateBlock {
    pub slot: WearableSlot,
    pub item_id: Uuid,
    pub asset_id: Uuid,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WearablesUpdate {
    pub blocks: Vec<WearablesUpdateBlock>,
}

/// `(baked-face index, texture-id, host-name-bytes)`. `host_name` is parsed
/// and kept but never read — the same "observed, explicitly unused" status
/// the source gives this field (see `DESIGN.md` open questions).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CachedTextureResponseEntry {
    pub layer: BakeLayer,
    pub texture_id: Uuid,
    pub host_name: Vec<u8>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CachedTextureResponse {
    pub serial: u64,
    pub entries: Vec<CachedTextureResponseEntry>,
}

/// A region-handoff trigger: "start a new appearance run for this region".
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct EventQueueRunning {
    pub region_id: Uuid,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct WearablesRequest {
    pub ids: SessionIds,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct CachedTextureQueryEntry {
    pub layer: BakeLayer,
    pub fingerprint: Uuid,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CachedTextureQuery {
    pub ids: SessionIds,
    pub serial: u64,
    pub entries: Vec<CachedTextureQueryEntry>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct WearableDataBlock {
    pub layer: BakeLayer,
    pub fingerprint: Uuid,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SetAppearance {
    pub ids: SessionIds,
    pub serial: u64,
    /// `(width, height, height)` in meters — `spec.md` §4.6.
    pub size: [f32; 3],
    pub texture_entry: Vec<u8>,
    /// Always exactly 218 bytes.
    pub visual_params: Vec<u8>,
    /// One block per baked layer, always all 6, regardless of worn/empty.
    pub wearable_data: [WearableDataBlock; 6],
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum OutboundPacket {
    WearablesRequest(WearablesRequest),
    CachedTextureQuery(CachedTextureQuery),
    SetAppearance(SetAppearance),
}

/// Egress seam a transport implements; the pipeline never knows how a
/// packet actually leaves the process.
pub trait PacketSink: Send + Sync {
    fn send(&self, packet: OutboundPacket);
}
