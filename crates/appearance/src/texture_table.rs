use std::collections::HashMap;

use uuid::Uuid;

use crate::{bake::DEFAULT_AVATAR_TEXTURE, model::TextureFace};

/// Canonicalize the well-known default-avatar-texture id to zero — it is
/// never meaningfully "set" in the texture table (`spec.md` §3 invariant).
pub fn canonicalize(id: Uuid) -> Uuid {
    if id == DEFAULT_AVATAR_TEXTURE {
        Uuid::nil()
    } else {
        id
    }
}

/// One texture face's worth of state. A stable array cell, repeatedly
/// overwritten in place — no per-slot allocation beyond the decoded byte
/// buffer itself.
#[derive(Debug, Clone, Default)]
pub struct TextureSlot {
    pub texture_id: Uuid,
    pub decoded: Option<Vec<u8>>,
    /// Keyed by [`crate::catalog::AlphaDescriptor`] id.
    pub alpha_params: HashMap<u32, f32>,
    /// Keyed by [`crate::catalog::ColorDescriptor`] id.
    pub color_params: HashMap<u32, f32>,
}

impl TextureSlot {
    pub fn is_empty(&self) -> bool {
        self.texture_id.is_nil()
    }
}

/// Fixed-size array indexed by [`TextureFace`]. No inner lock: concurrency
/// during the fetch/bake stages is confined to disjoint indices (`spec.md`
/// §5), and outside a run the orchestrator holds exclusive logical
/// ownership between intake events.
pub struct TextureTable {
    slots: [TextureSlot; TextureFace::COUNT],
}

impl Default for TextureTable {
    fn default() -> Self {
        Self {
            slots: std::array::from_fn(|_| TextureSlot::default()),
        }
    }
}

impl TextureTable {
    pub fn get(&self, face: TextureFace) -> &TextureSlot {
        &self.slots[face.index()]
    }

    pub fn get_mut(&mut self, face: TextureFace) -> &mut TextureSlot {
        &mut self.slots[face.index()]
    }

    /// Assigning a new texture id clears decoded bytes and canonicalizes
    /// the default-avatar-texture id to zero (`spec.md` §4.3).
    pub fn set_texture_id(&mut self, face: TextureFace, id: Uuid) {
        let slot = self.get_mut(face);
        slot.texture_id = canonicalize(id);
        slot.decoded = None;
    }

    pub fn set_decoded(&mut self, face: TextureFace, bytes: Vec<u8>) {
        self.get_mut(face).decoded = Some(bytes);
    }

    pub fn set_params(&mut self, face: TextureFace, alpha: HashMap<u32, f32>, color: HashMap<u32, f32>) {
        let slot = self.get_mut(face);
        slot.alpha_params = alpha;
        slot.color_params = color;
    }

    pub fn zero_face(&mut self, face: TextureFace) {
        self.set_texture_id(face, Uuid::nil());
    }

    pub fn faces_needing_decode(&self) -> impl Iterator<Item = TextureFace> + '_ {
        TextureFace::ALL
            .into_iter()
            .filter(|f| !f.is_baked())
            .filter(|f| {
                let slot = self.get(*f);
                !slot.is_empty() && slot.decoded.is_none()
            })
    }
}
