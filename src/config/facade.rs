//! Config loading entry point

use super::merge::merge_policy;
use super::sources::{environment, global_file, workspace_file};
use super::{paths, MirrorConfig};
use crate::error::FsError;
use config::File;
use std::path::{Path, PathBuf};
use tracing::debug;

pub struct ConfigLoader;

impl ConfigLoader {
    /// Load with all layers: defaults, global file, workspace files, environment.
    pub fn load(workspace_root: &Path) -> Result<MirrorConfig, FsError> {
        let builder = merge_policy::builder_with_defaults()?;
        let builder = global_file::add_to_builder(builder)?;
        let builder = workspace_file::add_to_builder(builder, workspace_root)?;
        let builder = environment::add_to_builder(builder);

        let config: MirrorConfig = builder.build()?.try_deserialize()?;
        debug!(name = %config.name, workspace = %workspace_root.display(), "Loaded configuration");
        Self::validated(config)
    }

    /// Load a single file over the defaults. Environment overrides still apply.
    pub fn load_from_file(path: &Path) -> Result<MirrorConfig, FsError> {
        if !path.exists() {
            return Err(FsError::ConfigError(format!(
                "Config file not found: {}",
                path.display()
            )));
        }
        let builder = merge_policy::builder_with_defaults()?
            .add_source(File::from(path.to_path_buf()).required(true));
        let builder = environment::add_to_builder(builder);
        let config: MirrorConfig = builder.build()?.try_deserialize()?;
        Self::validated(config)
    }

    /// Path of the global config file, whether or not it exists.
    pub fn global_config_path() -> Option<PathBuf> {
        paths::global_config_path()
    }

    fn validated(config: MirrorConfig) -> Result<MirrorConfig, FsError> {
        config.validate().map_err(|errors| {
            FsError::ConfigError(
                errors
                    .iter()
                    .map(ToString::to_string)
                    .collect::<Vec<_>>()
                    .join("; "),
            )
        })?;
        Ok(config)
    }
}
