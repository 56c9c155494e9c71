//! Environment source: MIRRORFS__SECTION__KEY

use config::builder::DefaultState;
use config::ConfigBuilder;
use config::Environment;

pub const ENV_PREFIX: &str = "MIRRORFS";
pub const ENV_SEPARATOR: &str = "__";

/// Add environment overrides, e.g. `MIRRORFS__SYNC__INTERVAL_SECS=10`.
pub fn add_to_builder(builder: ConfigBuilder<DefaultState>) -> ConfigBuilder<DefaultState> {
    builder.add_source(
        Environment::with_prefix(ENV_PREFIX)
            .prefix_separator(ENV_SEPARATOR)
            .separator(ENV_SEPARATOR)
            .try_parsing(true),
    )
}
