//! Metrics registry for the command-line driver.

use anyhow::{Context, Result};
use prometheus::{Encoder, Registry, TextEncoder};

/// Registry holding every core collector.
pub fn registry() -> Result<Registry> {
    let registry = Registry::new();
    for metric in vodsync_core::metrics::all_metrics() {
        registry
            .register(metric)
            .context("Failed to register metric")?;
    }
    Ok(registry)
}

/// Text exposition of everything gathered so far.
pub fn render(registry: &Registry) -> Result<String> {
    let mut buffer = Vec::new();
    TextEncoder::new()
        .encode(&registry.gather(), &mut buffer)
        .context("Failed to encode metrics")?;
    String::from_utf8(buffer).context("Metrics output is not UTF-8")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_includes_core_metrics() {
        let registry = registry().unwrap();
        vodsync_core::metrics::REAUTHENTICATIONS.inc();

        let text = render(&registry).unwrap();
        assert!(text.contains("vodsync_reauthentications_total"));
    }
}
