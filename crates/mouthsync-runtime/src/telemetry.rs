//! Tracing subscriber setup
//!
//! `RUST_LOG` wins over the default filter passed in. Installing a second
//! subscriber is not an error; the call just returns false.

use tracing_subscriber::EnvFilter;

fn filter(default_filter: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter))
}

/// Human-readable logs on stderr
pub fn init_tracing(default_filter: &str) -> bool {
    tracing_subscriber::fmt()
        .with_env_filter(filter(default_filter))
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init()
        .is_ok()
}

/// One JSON object per event on stderr
pub fn init_tracing_json(default_filter: &str) -> bool {
    tracing_subscriber::fmt()
        .json()
        .with_env_filter(filter(default_filter))
        .with_writer(std::io::stderr)
        .with_current_span(false)
        .try_init()
        .is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_second_install_is_refused() {
        // whichever test installs first wins; the second call must not panic
        let _ = init_tracing("mouthsync=debug");
        assert!(!init_tracing("mouthsync=debug"));
        assert!(!init_tracing_json("info"));
    }
}
