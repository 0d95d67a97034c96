//! The Bake Composition Table (`spec.md` §6) and the per-layer magic hashes
//! folded into cache fingerprints.

use uuid::{uuid, Uuid};

use crate::model::{BakeLayer, TextureFace, WearableSlot};

/// The default avatar texture id. Canonicalized to zero wherever it would
/// otherwise be stored in the texture table (`spec.md` §3 invariant).
pub const DEFAULT_AVATAR_TEXTURE: Uuid = uuid!("c228d1cf-4b5d-4ba8-84f4-899a0796aa97");

/// Per-layer magic constants XOR-mixed into a fingerprint before it is sent
/// on the wire, in `BakeLayer` order.
pub const MAGIC_HASH: [Uuid; 6] = [
    uuid!("18ded8d6-bcfc-e415-8539-944c0f5ea7a6"), // Head
    uuid!("338c29e3-3024-4dbb-998d-7c04cf4fa88f"), // UpperBody
    uuid!("91b4a2c7-1b1a-ba16-9a16-1f8f8dcc1c3f"), // LowerBody
    uuid!("b2cf28af-b840-1071-3c6a-78085d8128b5"), // Eyes
    uuid!("ea800387-ea1a-14e0-56cb-24f2022f969a"), // Skirt
    uuid!("0af1ef7c-ad24-11dd-8790-001f5bf833e8"), // Hair
];

pub fn magic_hash(layer: BakeLayer) -> Uuid {
    MAGIC_HASH[layer as usize]
}

/// The ordered, non-`Invalid` slot list contributing to each baked layer.
/// An unused contributor slot is simply absent here — no magic sentinel
/// value sits at the boundary of `WearableSlot`'s valid range.
pub fn bake_slots(layer: BakeLayer) -> &'static [WearableSlot] {
    use WearableSlot::*;
    match layer {
        BakeLayer::Head => &[Shape, Skin, Hair],
        BakeLayer::UpperBody => &[Shape, Skin, Shirt, Jacket, Gloves, Undershirt],
        BakeLayer::LowerBody => &[Shape, Skin, Pants, Shoes, Socks, Jacket, Underpants],
        BakeLayer::Eyes => &[Eyes],
        BakeLayer::Skirt => &[Skirt],
        BakeLayer::Hair => &[Hair],
    }
}

/// The unbaked source faces a layer's bake reads from. A wearable can feed
/// more than one layer through different faces (the Skin wearable owns
/// `HeadBodypaint`, `UpperBodypaint`, and `LowerBodypaint` in turn) so this
/// is keyed by layer, not derived from `bake_slots`.
pub fn contributing_faces(layer: BakeLayer) -> &'static [TextureFace] {
    use TextureFace::*;
    match layer {
        BakeLayer::Head => &[HeadBodypaint, Hair],
        BakeLayer::UpperBody => &[UpperBodypaint, Shirt, Jacket, Gloves, Undershirt],
        BakeLayer::LowerBody => &[LowerBodypaint, Pants, Shoes, Socks, Jacket, Underpants],
        BakeLayer::Eyes => &[EyesIris],
        BakeLayer::Skirt => &[Skirt],
        BakeLayer::Hair => &[Hair],
    }
}
