//! Command implementations.

mod info;
mod run;
mod validate;

pub use info::run_info;
pub use run::run_pipeline;
pub use validate::run_validate;

use std::path::Path;

use anyhow::{Context, Result};
use contracts::PollerBlueprint;

use crate::error::CliError;

/// Load a configuration file
///
/// A relative address file is resolved against the configuration's directory.
fn load_blueprint(path: &Path) -> Result<PollerBlueprint> {
    if !path.exists() {
        return Err(CliError::config_not_found(path.display().to_string()).into());
    }

    let mut blueprint = config_loader::ConfigLoader::load_from_path(path)
        .with_context(|| format!("Failed to load config from {}", path.display()))?;
    resolve_address_file(&mut blueprint, path);
    Ok(blueprint)
}

fn resolve_address_file(blueprint: &mut PollerBlueprint, config_path: &Path) {
    let Some(file) = blueprint.addresses.file.as_mut() else {
        return;
    };
    if file.is_relative() {
        if let Some(dir) = config_path.parent() {
            *file = dir.join(&*file);
        }
    }
}
