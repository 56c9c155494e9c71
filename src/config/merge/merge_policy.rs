//! Merge rules: defaults, override order, conflict handling.

use config::Config;
use config::ConfigBuilder;
use config::ConfigError;

/// Create a Config builder with merge policy defaults applied.
pub fn builder_with_defaults() -> Result<ConfigBuilder<config::builder::DefaultState>, ConfigError>
{
    Config::builder()
        .set_default("name", "default")?
        .set_default("immutable", false)?
        .set_default("sync.interval_secs", 60)?
        .set_default("sync.drain_timeout_secs", 30)
}
