use thiserror::Error;

use crate::model::BakeLayer;

/// The closed error taxonomy a pipeline run can hit. Every variant but
/// [`AppearanceError::TransportUnavailable`] and
/// [`AppearanceError::WearablesEnumTimeout`] is non-fatal to the run: it is
/// logged, folded into a [`RunOutcome::Partial`], and the run continues.
#[derive(Debug, Error, Clone)]
pub enum AppearanceError {
    #[error("transport unavailable, cannot start pipeline run")]
    TransportUnavailable,

    #[error("timed out waiting for the wearables list")]
    WearablesEnumTimeout,

    #[error("timed out fetching wearable asset {asset_id}")]
    WearableFetchTimeout { asset_id: uuid::Uuid },

    #[error("failed to decode wearable asset {asset_id}: {reason}")]
    WearableDecodeFailure { asset_id: uuid::Uuid, reason: String },

    #[error("cache negotiation timed out, treating all layers as misses")]
    CacheNegotiationTimeout,

    #[error("timed out fetching texture {texture_id}")]
    TextureFetchTimeout { texture_id: uuid::Uuid },

    #[error("upload for layer {layer:?} timed out")]
    UploadTimeout { layer: BakeLayer },

    #[error("upload for layer {layer:?} failed")]
    UploadFailure { layer: BakeLayer },

    #[error("a pipeline run is already in progress")]
    DuplicateRun,

    #[error("not implemented: {0}")]
    Unsupported(&'static str),
}

/// The eventual, possibly degraded, outcome of a single run. Mirrors the
/// "best-effort, no cancellation" propagation policy: nothing in stage
/// 4/5/6 aborts the run, it only ever downgrades `Complete` to `Partial`.
#[derive(Debug, Clone, Default)]
pub enum RunOutcome {
    #[default]
    Complete,
    Partial(Vec<AppearanceError>),
}

impl RunOutcome {
    pub fn degrade(&mut self, reason: AppearanceError) {
        match self {
            RunOutcome::Complete => *self = RunOutcome::Partial(vec![reason]),
            RunOutcome::Partial(reasons) => reasons.push(reason),
        }
    }

    pub fn is_partial(&self) -> bool {
        matches!(self, RunOutcome::Partial(_))
    }
}
