use std::time::Duration;

/// Tunables the host chooses at construction time; see `spec.md` §4/§5
/// "design default" call-outs. There is no file-backed config layer here —
/// seven numbers don't earn one, and the caller already owns its own
/// settings story.
#[derive(Debug, Clone, Copy)]
pub struct PipelineConfig {
    pub wearable_list_timeout: Duration,
    pub wearable_fetch_timeout: Duration,
    pub cache_query_timeout: Duration,
    pub texture_fetch_timeout: Duration,
    pub upload_timeout: Duration,
    pub download_concurrency: usize,
    pub upload_concurrency: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            wearable_list_timeout: Duration::from_secs(10),
            wearable_fetch_timeout: Duration::from_secs(10),
            cache_query_timeout: Duration::from_secs(10),
            texture_fetch_timeout: Duration::from_secs(30),
            upload_timeout: Duration::from_secs(30),
            download_concurrency: 5,
            upload_concurrency: 3,
        }
    }
}
