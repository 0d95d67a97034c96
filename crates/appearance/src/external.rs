//! Capability interfaces for everything `spec.md` §1/§6 treats as an
//! external collaborator: the asset/texture services, the uploader, the
//! inventory service, and the Baker. The pipeline only ever sees these
//! traits — never a concrete transport, disk cache, or image codec.

use std::collections::HashMap;

use async_trait::async_trait;
use uuid::Uuid;

use crate::{error::AppearanceError, model::AssetCategory, model::BakeLayer};

#[derive(Debug, Clone)]
pub enum FetchOutcome {
    Success(Vec<u8>),
    Failed,
}

#[async_trait]
pub trait AssetFetcher: Send + Sync {
    async fn fetch(&self, asset_id: Uuid, category: AssetCategory) -> FetchOutcome;
}

#[async_trait]
pub trait TextureFetcher: Send + Sync {
    async fn fetch_image(&self, texture_id: Uuid) -> FetchOutcome;
}

#[async_trait]
pub trait BakedUploader: Send + Sync {
    /// Returns `Uuid::nil()` on failure.
    async fn upload_baked(&self, bytes: Vec<u8>) -> Uuid;
}

#[async_trait]
pub trait InventoryService: Send + Sync {
    async fn resolve_path(&self, path: &str) -> Option<Uuid>;
    async fn folder_contents(&self, folder_id: Uuid) -> Vec<Uuid>;

    /// Outfit-swap composition. The source's `wear_outfit` loop body was
    /// empty with no way to tell whether that was deliberate; rather than
    /// guess, this is left an explicit stub (`DESIGN.md` open questions).
    async fn compose_outfit(&self, _folder_id: Uuid) -> Result<(), AppearanceError> {
        Err(AppearanceError::Unsupported("outfit composition"))
    }
}

/// A single layer's worth of in-progress compositing. The Baker
/// internally substitutes defaults for any face fed `None`.
#[async_trait]
pub trait BakeCompositor: Send + Sync {
    async fn feed_face(&mut self, bytes: Option<&[u8]>);

    /// Returns the composited bytes once the layer is complete, `None`
    /// otherwise.
    async fn finish(&mut self) -> Option<Vec<u8>>;
}

#[async_trait]
pub trait Baker: Send + Sync {
    async fn new_compositor(
        &self,
        layer: BakeLayer,
        contributing_faces: usize,
        visual_params: &HashMap<u32, f32>,
    ) -> Box<dyn BakeCompositor>;
}
