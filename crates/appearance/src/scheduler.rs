//! Stage A/B/C of the fetch/bake/upload pipeline (`spec.md` §4.5). Each
//! stage fans out under a [`tokio::sync::Semaphore`] and never aborts the
//! run on a single failure — timeouts and decode failures degrade the
//! [`RunOutcome`] and the stage continues.

use std::{
    collections::{HashMap, HashSet},
    sync::{Arc, Mutex},
    time::Duration,
};

use tokio::{sync::Semaphore, task::JoinSet, time::timeout};
use uuid::Uuid;

use crate::{
    bake::contributing_faces,
    catalog::CATALOG,
    config::PipelineConfig,
    error::{AppearanceError, RunOutcome},
    external::{AssetFetcher, BakedUploader, Baker, FetchOutcome, TextureFetcher},
    model::{BakeLayer, DecodedAsset, TextureFace, WearableRecord, WearableSlot},
    publisher::resolve_visual_params,
    registry::WearableRegistry,
    texture_table::{canonicalize, TextureTable},
};

/// Builds the alpha/color accumulators a decoded wearable's visual params
/// contribute, per the driver-chasing and Skin-color rules (`spec.md` §4.5
/// bullet 2).
fn build_accumulators(slot: WearableSlot, asset: &DecodedAsset) -> (HashMap<u32, f32>, HashMap<u32, f32>) {
    let mut alpha = HashMap::new();
    let mut color = HashMap::new();

    for (&id, &value) in &asset.visual_params {
        let Some(def) = CATALOG.get(id) else { continue };

        if let Some(descriptor) = &def.color {
            let contributes = slot != WearableSlot::Skin || matches!(descriptor.id, 108 | 110 | 111);
            if contributes {
                color.insert(descriptor.id, value);
            }
        }

        for &driver_id in &def.drivers {
            let Some(driver) = CATALOG.get(driver_id) else { continue };
            if driver.is_bump {
                continue;
            }
            let Some(alpha_desc) = &driver.alpha else { continue };
            let has_file = alpha_desc.tga_file.as_deref().is_some_and(|f| !f.is_empty());
            if has_file {
                alpha.insert(alpha_desc.id, value);
                break;
            }
        }
    }

    (alpha, color)
}

async fn fetch_one(
    record: WearableRecord,
    semaphore: Arc<Semaphore>,
    per_asset_timeout: Duration,
    fetcher: Arc<dyn AssetFetcher>,
) -> (WearableRecord, Result<DecodedAsset, AppearanceError>) {
    let _permit = semaphore.acquire_owned().await.expect("semaphore never closed");
    let asset_id = record.asset_id;
    let category = record.category;

    let result = timeout(per_asset_timeout, fetcher.fetch(asset_id, category)).await;
    let outcome = match result {
        Err(_) => Err(AppearanceError::WearableFetchTimeout { asset_id }),
        Ok(FetchOutcome::Failed) => Err(AppearanceError::WearableFetchTimeout { asset_id }),
        Ok(FetchOutcome::Success(bytes)) => DecodedAsset::decode(&bytes)
            .map_err(|reason| AppearanceError::WearableDecodeFailure { asset_id, reason }),
    };
    (record, outcome)
}

/// Stage A — fetches every wearable lacking a decoded asset, installs the
/// decode back into the registry, and writes the wearable's contributed
/// faces into the texture table.
pub async fn fetch_wearable_assets(
    registry: &WearableRegistry,
    table: &Mutex<TextureTable>,
    fetcher: &Arc<dyn AssetFetcher>,
    config: &PipelineConfig,
    outcome: &mut RunOutcome,
) {
    let pending = registry.records_without_asset().await;
    if pending.is_empty() {
        return;
    }

    let semaphore = Arc::new(Semaphore::new(config.download_concurrency.max(1)));
    let mut joins = JoinSet::new();
    for record in pending {
        joins.spawn(fetch_one(record, semaphore.clone(), config.wearable_fetch_timeout, fetcher.clone()));
    }

    while let Some(result) = joins.join_next().await {
        let Ok((record, outcome_piece)) = result else { continue };
        match outcome_piece {
            Ok(asset) => {
                let slot = record.slot;
                let asset_id = record.asset_id;
                let (alpha, color) = build_accumulators(slot, &asset);

                let mut guard = table.lock().expect("texture table mutex poisoned");
                for (&face, &texture_id) in &asset.textures {
                    if guard.get(face).texture_id != canonicalize(texture_id) {
                        guard.set_texture_id(face, texture_id);
                        guard.set_params(face, alpha.clone(), color.clone());
                    }
                }
                drop(guard);

                registry.install_decoded_asset(slot, asset_id, asset).await;
            }
            Err(err) => outcome.degrade(err),
        }
    }
}

/// Faces a set of pending layers actually needs decoded source textures
/// for, deduplicated and excluding faces already decoded or empty
/// (`spec.md` §4.5 Stage B).
fn faces_needed(pending: &[BakeLayer], table: &TextureTable) -> Vec<TextureFace> {
    let mut seen = HashSet::new();
    let mut faces = Vec::new();
    for &layer in pending {
        for &face in contributing_faces(layer) {
            if seen.insert(face) {
                let slot = table.get(face);
                if !slot.is_empty() && slot.decoded.is_none() {
                    faces.push(face);
                }
            }
        }
    }
    faces
}

async fn fetch_texture(
    texture_id: Uuid,
    semaphore: Arc<Semaphore>,
    per_texture_timeout: Duration,
    fetcher: Arc<dyn TextureFetcher>,
) -> (Uuid, Result<Vec<u8>, AppearanceError>) {
    let _permit = semaphore.acquire_owned().await.expect("semaphore never closed");
    let result = timeout(per_texture_timeout, fetcher.fetch_image(texture_id)).await;
    let outcome = match result {
        Err(_) => Err(AppearanceError::TextureFetchTimeout { texture_id }),
        Ok(FetchOutcome::Failed) => Err(AppearanceError::TextureFetchTimeout { texture_id }),
        Ok(FetchOutcome::Success(bytes)) => Ok(bytes),
    };
    (texture_id, outcome)
}

/// Stage B — fetches decoded source textures for every face the pending
/// layers need, installing the result into every matching face.
pub async fn fetch_pending_textures(
    table: &Mutex<TextureTable>,
    pending: &[BakeLayer],
    fetcher: &Arc<dyn TextureFetcher>,
    config: &PipelineConfig,
    outcome: &mut RunOutcome,
) {
    let ids_by_face: Vec<(TextureFace, Uuid)> = {
        let guard = table.lock().expect("texture table mutex poisoned");
        faces_needed(pending, &guard)
            .into_iter()
            .map(|f| (f, guard.get(f).texture_id))
            .collect()
    };
    if ids_by_face.is_empty() {
        return;
    }

    let mut unique_ids: Vec<Uuid> = ids_by_face.iter().map(|(_, id)| *id).collect();
    unique_ids.sort_unstable();
    unique_ids.dedup();

    let semaphore = Arc::new(Semaphore::new(config.download_concurrency.max(1)));
    let mut joins = JoinSet::new();
    for texture_id in unique_ids {
        joins.spawn(fetch_texture(texture_id, semaphore.clone(), config.texture_fetch_timeout, fetcher.clone()));
    }

    let mut decoded: HashMap<Uuid, Vec<u8>> = HashMap::new();
    while let Some(result) = joins.join_next().await {
        let Ok((texture_id, piece)) = result else { continue };
        match piece {
            Ok(bytes) => {
                decoded.insert(texture_id, bytes);
            }
            Err(err) => outcome.degrade(err),
        }
    }

    let mut guard = table.lock().expect("texture table mutex poisoned");
    for (face, texture_id) in ids_by_face {
        if let Some(bytes) = decoded.get(&texture_id) {
            guard.set_decoded(face, bytes.clone());
        }
    }
}

async fn bake_and_upload_one(
    layer: BakeLayer,
    table: Arc<Mutex<TextureTable>>,
    visual_params: Arc<HashMap<u32, f32>>,
    baker: Arc<dyn Baker>,
    uploader: Arc<dyn BakedUploader>,
    upload_timeout: Duration,
    semaphore: Arc<Semaphore>,
) -> (BakeLayer, Result<Option<Uuid>, AppearanceError>) {
    let _permit = semaphore.acquire_owned().await.expect("semaphore never closed");
    let faces = contributing_faces(layer);
    let mut compositor = baker.new_compositor(layer, faces.len(), &visual_params).await;

    for &face in faces {
        let bytes = {
            let guard = table.lock().expect("texture table mutex poisoned");
            guard.get(face).decoded.clone()
        };
        compositor.feed_face(bytes.as_deref()).await;
    }

    let Some(baked_bytes) = compositor.finish().await else {
        return (layer, Ok(None));
    };

    let outcome = match timeout(upload_timeout, uploader.upload_baked(baked_bytes)).await {
        Err(_) => Err(AppearanceError::UploadTimeout { layer }),
        Ok(id) if id.is_nil() => Err(AppearanceError::UploadFailure { layer }),
        Ok(id) => Ok(Some(id)),
    };
    (layer, outcome)
}

/// Stage C — bakes and uploads every pending layer in parallel up to the
/// upload cap, writing the returned asset id into that layer's baked face.
pub async fn bake_and_upload(
    registry: &WearableRegistry,
    table: &Arc<Mutex<TextureTable>>,
    pending: &[BakeLayer],
    baker: &Arc<dyn Baker>,
    uploader: &Arc<dyn BakedUploader>,
    config: &PipelineConfig,
    outcome: &mut RunOutcome,
) {
    if pending.is_empty() {
        return;
    }

    let snapshot = registry.snapshot().await;
    let visual_params = Arc::new(resolve_visual_params(&snapshot));
    let semaphore = Arc::new(Semaphore::new(config.upload_concurrency.max(1)));

    let mut joins = JoinSet::new();
    for &layer in pending {
        joins.spawn(bake_and_upload_one(
            layer,
            table.clone(),
            visual_params.clone(),
            baker.clone(),
            uploader.clone(),
            config.upload_timeout,
            semaphore.clone(),
        ));
    }

    while let Some(result) = joins.join_next().await {
        let Ok((layer, piece)) = result else { continue };
        match piece {
            Ok(Some(id)) => {
                let mut guard = table.lock().expect("texture table mutex poisoned");
                guard.set_texture_id(layer.baked_face(), id);
            }
            Ok(None) => {}
            Err(err) => outcome.degrade(err),
        }
    }
}
