use std::collections::HashMap;

use uuid::Uuid;

use crate::{
    bake::DEFAULT_AVATAR_TEXTURE,
    catalog::{quantize, CATALOG, GROUP0_LEN},
    model::{BakeLayer, TextureFace, WearableRecord, WearableSlot},
    negotiator::published_fingerprint,
    packets::{SessionIds, SetAppearance, WearableDataBlock},
    texture_table::TextureTable,
};

/// Resolve every group-0 (and body-size) param's published value: the
/// first decoded wearable asset that defines the id wins, else the catalog
/// default (`spec.md` §4.6).
pub fn resolve_visual_params(snapshot: &HashMap<WearableSlot, WearableRecord>) -> HashMap<u32, f32> {
    let mut resolved = HashMap::new();
    for id in CATALOG.group0_order() {
        resolved.insert(*id, resolve_one(*id, snapshot));
    }
    resolved
}

/// Resolves a single param id, including ones outside group 0 (the body
/// size formula references ids regardless of publish group). Walks
/// `WearableSlot::ALL` in its fixed declaration order rather than the
/// snapshot's `HashMap` iteration order, so the "first asset that defines
/// this id wins" rule (`spec.md` §4.6) is reproducible across runs with
/// identical worn state.
pub fn resolve_one(id: u32, snapshot: &HashMap<WearableSlot, WearableRecord>) -> f32 {
    for slot in WearableSlot::ALL {
        let Some(record) = snapshot.get(&slot) else { continue };
        let Some(asset) = &record.asset else { continue };
        if let Some(value) = asset.visual_params.get(&id) {
            return *value;
        }
    }
    CATALOG.default_value(id)
}

/// The published visual-parameter byte vector: always 218 bytes, in
/// ascending catalog-id order, one linearly-quantized byte per group-0
/// param (`spec.md` §4.6).
pub fn visual_param_vector(snapshot: &HashMap<WearableSlot, WearableRecord>) -> Vec<u8> {
    let bytes: Vec<u8> = CATALOG
        .group0_order()
        .iter()
        .map(|id| {
            let def = CATALOG.get(*id).expect("group0_order only lists known ids");
            let value = resolve_one(*id, snapshot);
            quantize(value, def.min, def.max)
        })
        .collect();
    debug_assert_eq!(bytes.len(), GROUP0_LEN);
    bytes
}

/// Packed texture-entry bytes: the default-avatar-texture as the base
/// face, overridden by every nonzero face in the table (`spec.md` §4.6).
/// Format: 21 consecutive 16-byte texture ids, in `TextureFace::ALL` order
/// — simple and stable; the protocol's actual packed encoding is a
/// transport concern.
pub fn texture_entry_bytes(table: &TextureTable) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(TextureFace::COUNT * 16);
    for face in TextureFace::ALL {
        let slot = table.get(face);
        let id = if slot.texture_id.is_nil() {
            DEFAULT_AVATAR_TEXTURE
        } else {
            slot.texture_id
        };
        bytes.extend_from_slice(id.as_bytes());
    }
    bytes
}

/// One wearable-data block per baked layer, always all 6 — including
/// layers with nothing worn, whose fingerprint is zero (`spec.md` §8
/// boundary behavior).
pub fn wearable_data_blocks(snapshot: &HashMap<WearableSlot, WearableRecord>) -> [WearableDataBlock; 6] {
    let mut blocks = [WearableDataBlock {
        layer: BakeLayer::Head,
        fingerprint: Uuid::nil(),
    }; 6];
    for (i, layer) in BakeLayer::ALL.into_iter().enumerate() {
        blocks[i] = WearableDataBlock {
            layer,
            fingerprint: published_fingerprint(layer, snapshot).unwrap_or(Uuid::nil()),
        };
    }
    blocks
}

/// The seven body-size contributors and the derived bounding box
/// (`spec.md` §4.6):
///
/// H = 1.706 + 0.1918·p692 + 0.0375·p842 + 0.12022·p33 + 0.01117·p682
///     + 0.038·p756 + 0.08·p198 + 0.07·p503
pub fn body_size(snapshot: &HashMap<WearableSlot, WearableRecord>) -> [f32; 3] {
    let p = |id: u32| resolve_one(id, snapshot);
    let height = 1.706
        + 0.1918 * p(692)
        + 0.0375 * p(842)
        + 0.12022 * p(33)
        + 0.01117 * p(682)
        + 0.038 * p(756)
        + 0.08 * p(198)
        + 0.07 * p(503);
    [0.45, 0.60, height]
}

/// Assembles the final `SetAppearance` packet. `serial` must already be
/// the freshly-incremented set-appearance serial.
pub fn build_set_appearance(
    ids: SessionIds,
    serial: u64,
    snapshot: &HashMap<WearableSlot, WearableRecord>,
    table: &TextureTable,
) -> SetAppearance {
    SetAppearance {
        ids,
        serial,
        size: body_size(snapshot),
        texture_entry: texture_entry_bytes(table),
        visual_params: visual_param_vector(snapshot),
        wearable_data: wearable_data_blocks(snapshot),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids() -> SessionIds {
        SessionIds {
            agent_id: Uuid::new_v4(),
            session_id: Uuid::new_v4(),
        }
    }

    #[test]
    fn visual_param_vector_is_always_218_bytes() {
        let snapshot = HashMap::new();
        assert_eq!(visual_param_vector(&snapshot).len(), GROUP0_LEN);
    }

    #[test]
    fn body_size_matches_worked_example() {
        // spec.md §8 scenario (f): p33=0.5, p198=0.1, p503=0.2, p682=0.5,
        // p692=0.8, p756=0.3, p842=0.4
        let mut asset = crate::model::DecodedAsset::default();
        for (id, value) in [
            (33u32, 0.5f32),
            (198, 0.1),
            (503, 0.2),
            (682, 0.5),
            (692, 0.8),
            (756, 0.3),
            (842, 0.4),
        ] {
            asset.visual_params.insert(id, value);
        }
        let mut snapshot = HashMap::new();
        snapshot.insert(
            WearableSlot::Shape,
            WearableRecord {
                item_id: Uuid::new_v4(),
                asset_id: Uuid::new_v4(),
                slot: WearableSlot::Shape,
                category: crate::model::AssetCategory::Bodypart,
                asset: Some(asset),
            },
        );

        let expected = 1.706
            + 0.1918 * 0.8
            + 0.0375 * 0.4
            + 0.12022 * 0.5
            + 0.01117 * 0.5
            + 0.038 * 0.3
            + 0.08 * 0.1
            + 0.07 * 0.2;

        let size = body_size(&snapshot);
        assert_eq!(size[0], 0.45);
        assert_eq!(size[1], 0.60);
        assert!((size[2] - expected).abs() < 1e-6);
    }

    #[test]
    fn texture_entry_defaults_unset_faces_to_the_default_avatar_texture() {
        let table = TextureTable::default();
        let bytes = texture_entry_bytes(&table);
        assert_eq!(bytes.len(), TextureFace::COUNT * 16);
        assert_eq!(&bytes[0..16], DEFAULT_AVATAR_TEXTURE.as_bytes());
    }

    #[test]
    fn wearable_data_always_has_all_six_blocks_skirt_zero_when_unworn() {
        let snapshot = HashMap::new();
        let blocks = wearable_data_blocks(&snapshot);
        assert_eq!(blocks.len(), 6);
        let skirt = blocks.iter().find(|b| b.layer == BakeLayer::Skirt).unwrap();
        assert!(skirt.fingerprint.is_nil());
    }

    #[test]
    fn build_set_appearance_is_self_consistent() {
        let snapshot = HashMap::new();
        let table = TextureTable::default();
        let packet = build_set_appearance(ids(), 1, &snapshot, &table);
        assert_eq!(packet.serial, 1);
        assert_eq!(packet.visual_params.len(), GROUP0_LEN);
        assert_eq!(packet.wearable_data.len(), 6);
    }
}
