use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The 13 wearable categories plus the `Invalid` wire sentinel. Values are
/// stable wire integers — never renumber a live variant, only append.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[repr(u8)]
pub enum WearableSlot {
    Shape = 0,
    Skin = 1,
    Hair = 2,
    Eyes = 3,
    Shirt = 4,
    Pants = 5,
    Shoes = 6,
    Socks = 7,
    Jacket = 8,
    Gloves = 9,
    Undershirt = 10,
    Underpants = 11,
    Skirt = 12,
    Invalid = 255,
}

impl WearableSlot {
    pub const ALL: [WearableSlot; 13] = [
        WearableSlot::Shape,
        WearableSlot::Skin,
        WearableSlot::Hair,
        WearableSlot::Eyes,
        WearableSlot::Shirt,
        WearableSlot::Pants,
        WearableSlot::Shoes,
        WearableSlot::Socks,
        WearableSlot::Jacket,
        WearableSlot::Gloves,
        WearableSlot::Undershirt,
        WearableSlot::Underpants,
        WearableSlot::Skirt,
    ];

    pub fn from_wire(value: u8) -> WearableSlot {
        Self::ALL
            .into_iter()
            .find(|slot| *slot as u8 == value)
            .unwrap_or(WearableSlot::Invalid)
    }

    pub fn category(self) -> AssetCategory {
        match self {
            WearableSlot::Shape | WearableSlot::Skin | WearableSlot::Hair | WearableSlot::Eyes => {
                AssetCategory::Bodypart
            }
            WearableSlot::Invalid => AssetCategory::Unknown,
            _ => AssetCategory::Clothing,
        }
    }
}

/// 15 unbaked source faces plus the 6 baked composites, 21 total.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[repr(u8)]
pub enum TextureFace {
    HeadBodypaint = 0,
    UpperBodypaint = 1,
    LowerBodypaint = 2,
    Eyebrows = 3,
    Hair = 4,
    EyesIris = 5,
    Shirt = 6,
    Pants = 7,
    Shoes = 8,
    Socks = 9,
    Jacket = 10,
    Gloves = 11,
    Undershirt = 12,
    Underpants = 13,
    Skirt = 14,

    HeadBaked = 15,
    UpperBaked = 16,
    LowerBaked = 17,
    EyesBaked = 18,
    SkirtBaked = 19,
    HairBaked = 20,
}

impl TextureFace {
    pub const COUNT: usize = 21;

    pub const ALL: [TextureFace; Self::COUNT] = [
        TextureFace::HeadBodypaint,
        TextureFace::UpperBodypaint,
        TextureFace::LowerBodypaint,
        TextureFace::Eyebrows,
        TextureFace::Hair,
        TextureFace::EyesIris,
        TextureFace::Shirt,
        TextureFace::Pants,
        TextureFace::Shoes,
        TextureFace::Socks,
        TextureFace::Jacket,
        TextureFace::Gloves,
        TextureFace::Undershirt,
        TextureFace::Underpants,
        TextureFace::Skirt,
        TextureFace::HeadBaked,
        TextureFace::UpperBaked,
        TextureFace::LowerBaked,
        TextureFace::EyesBaked,
        TextureFace::SkirtBaked,
        TextureFace::HairBaked,
    ];

    pub fn index(self) -> usize {
        self as u8 as usize
    }

    pub fn is_baked(self) -> bool {
        self.index() >= 15
    }
}

/// The six composited layers. Stable wire integers used as the
/// `layer-index` in `CachedTextureQuery`/`SetAppearance` wearable-data
/// blocks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[repr(u8)]
pub enum BakeLayer {
    Head = 0,
    UpperBody = 1,
    LowerBody = 2,
    Eyes = 3,
    Skirt = 4,
    Hair = 5,
}

impl BakeLayer {
    pub const ALL: [BakeLayer; 6] = [
        BakeLayer::Head,
        BakeLayer::UpperBody,
        BakeLayer::LowerBody,
        BakeLayer::Eyes,
        BakeLayer::Skirt,
        BakeLayer::Hair,
    ];

    pub fn baked_face(self) -> TextureFace {
        match self {
            BakeLayer::Head => TextureFace::HeadBaked,
            BakeLayer::UpperBody => TextureFace::UpperBaked,
            BakeLayer::LowerBody => TextureFace::LowerBaked,
            BakeLayer::Eyes => TextureFace::EyesBaked,
            BakeLayer::Skirt => TextureFace::SkirtBaked,
            BakeLayer::Hair => TextureFace::HairBaked,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AssetCategory {
    Bodypart,
    Clothing,
    Unknown,
}

/// A wearable's decoded asset: visual-param overrides plus the source
/// texture it contributes per face.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DecodedAsset {
    pub visual_params: HashMap<u32, f32>,
    pub textures: HashMap<TextureFace, Uuid>,
}

impl DecodedAsset {
    /// Asset decoding is out of scope (`spec.md` §1); wearable assets are
    /// modeled as their already-decoded JSON form, the same "decode is just
    /// deserialize" shortcut the scope boundary implies.
    pub fn decode(bytes: &[u8]) -> Result<Self, String> {
        serde_json::from_slice(bytes).map_err(|e| e.to_string())
    }
}

/// One slot's worth of worn-wearable state. Born from a wearables-update
/// packet without a decoded asset; the orchestrator fills `asset` in once
/// the asset fetch (stage A, §4.5) completes.
#[derive(Debug, Clone)]
pub struct WearableRecord {
    pub item_id: Uuid,
    pub asset_id: Uuid,
    pub slot: WearableSlot,
    pub category: AssetCategory,
    pub asset: Option<DecodedAsset>,
}

impl WearableRecord {
    pub fn new(item_id: Uuid, asset_id: Uuid, slot: WearableSlot) -> Self {
        Self {
            item_id,
            asset_id,
            slot,
            category: slot.category(),
            asset: None,
        }
    }
}
