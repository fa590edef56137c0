//! Runtime configuration, constructed explicitly by the caller (§9: no
//! global singletons, no env-var magic — that belongs to an external CLI).

/// Default clock skew tolerance applied to mandate validity checks.
pub const DEFAULT_CLOCK_SKEW_SECONDS: i64 = 30;

/// Default Merkle batch size trigger (§4.6).
pub const DEFAULT_BATCH_SIZE: usize = 100;

/// Default Merkle batch time trigger, in seconds.
pub const DEFAULT_BATCH_INTERVAL_SECONDS: i64 = 300;

/// Runtime configuration for one `AuthorityCore` instance.
#[derive(Debug, Clone)]
pub struct Config {
    /// Tolerance applied when comparing `now` against mandate validity windows.
    pub clock_skew_seconds: i64,
    /// Batch forms once this many unbatched events accumulate.
    pub batch_size: usize,
    /// Batch forms once this many seconds elapse since the last batch, even
    /// if `batch_size` has not been reached.
    pub batch_interval_seconds: i64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            clock_skew_seconds: DEFAULT_CLOCK_SKEW_SECONDS,
            batch_size: DEFAULT_BATCH_SIZE,
            batch_interval_seconds: DEFAULT_BATCH_INTERVAL_SECONDS,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_spec_constants() {
        let config = Config::default();
        assert_eq!(config.batch_size, DEFAULT_BATCH_SIZE);
        assert_eq!(config.batch_interval_seconds, DEFAULT_BATCH_INTERVAL_SECONDS);
    }
}
