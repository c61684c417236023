use tracing_subscriber::EnvFilter;

pub const DEFAULT_DIRECTIVES: &str = "condra=info,condra_lib=info";

/// `RUST_LOG` replaces the defaults entirely when it is set and parses.
pub fn env_filter(rust_log: Option<&str>) -> EnvFilter {
    rust_log
        .and_then(|directives| EnvFilter::try_new(directives).ok())
        .unwrap_or_else(|| EnvFilter::new(DEFAULT_DIRECTIVES))
}

pub fn init() {
    let rust_log = std::env::var(EnvFilter::DEFAULT_ENV).ok();

    tracing_subscriber::fmt()
        .with_env_filter(env_filter(rust_log.as_deref()))
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rust_log_keeps_debug_for_library() {
        let filter = env_filter(Some("condra_lib=debug")).to_string().to_lowercase();

        assert!(filter.contains("condra_lib=debug"));
        assert!(!filter.contains("condra_lib=info"));
    }

    #[test]
    fn test_defaults_without_rust_log() {
        let filter = env_filter(None).to_string().to_lowercase();

        assert!(filter.contains("condra=info"));
        assert!(filter.contains("condra_lib=info"));
    }

    #[test]
    fn test_unparseable_rust_log_falls_back() {
        let filter = env_filter(Some("condra_lib=loud")).to_string().to_lowercase();

        assert!(filter.contains("condra_lib=info"));
    }
}
