//! Engine tuning

/// File extensions treated as candidate audio, lower-case, without the dot
pub const DEFAULT_AUDIO_EXTENSIONS: [&str; 10] = [
    "mp3", "flac", "wav", "opus", "m4a", "aif", "alac", "ape", "wma", "ogg",
];

/// Sync coordinator configuration
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Number of concurrent workers. `None` uses one per available CPU,
    /// since a transcode saturates a core.
    pub worker_count: Option<usize>,

    /// Extensions that trigger a probe; everything else is copied as is
    pub audio_extensions: Vec<String>,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            worker_count: None,
            audio_extensions: DEFAULT_AUDIO_EXTENSIONS
                .iter()
                .map(|ext| ext.to_string())
                .collect(),
        }
    }
}

impl SyncConfig {
    pub fn with_worker_count(mut self, workers: usize) -> Self {
        self.worker_count = Some(workers);
        self
    }

    /// Resolved worker count, never less than 1
    pub fn workers(&self) -> usize {
        self.worker_count
            .unwrap_or_else(|| {
                std::thread::available_parallelism()
                    .map(|n| n.get())
                    .unwrap_or(1)
            })
            .max(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_workers_never_zero() {
        assert_eq!(SyncConfig::default().with_worker_count(0).workers(), 1);
        assert_eq!(SyncConfig::default().with_worker_count(3).workers(), 3);
        assert!(SyncConfig::default().workers() >= 1);
    }

    #[test]
    fn test_default_extensions() {
        let config = SyncConfig::default();
        assert_eq!(config.audio_extensions.len(), 10);
        assert!(config.audio_extensions.iter().any(|ext| ext == "aif"));
    }
}
