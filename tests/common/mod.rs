#![allow(dead_code)]

use std::sync::Once;
use std::time::Instant;
use strangelove::config::{self, Catalog, Layer, MergedConfig};
use tracing::info;

pub mod cli;
pub mod fake_cluster;

static INIT: Once = Once::new();

pub fn init_test_logging() {
    INIT.call_once(|| {
        strangelove::logging::init_test_logging();
    });
}

pub struct TestLogGuard {
    name: String,
    start: Instant,
}

impl TestLogGuard {
    fn new(name: &str) -> Self {
        init_test_logging();
        info!("{name}: starting");
        Self {
            name: name.to_string(),
            start: Instant::now(),
        }
    }
}

impl Drop for TestLogGuard {
    fn drop(&mut self) {
        info!(
            "{}: assertions passed (elapsed {:?})",
            self.name,
            self.start.elapsed()
        );
    }
}

pub fn test_log(name: &str) -> TestLogGuard {
    TestLogGuard::new(name)
}

/// Built-in catalog merged for the default experiment, no overrides.
pub fn builtin_config() -> MergedConfig {
    let catalog = Catalog::builtin().expect("builtin catalog");
    let defaults = catalog.cluster_defaults();
    let base = catalog.base_layer(false, false);
    config::merge(
        &[&defaults, &base],
        &catalog.experiments,
        catalog.default_experiment(),
        &Layer::new(),
    )
    .expect("merge builtin catalog")
}
