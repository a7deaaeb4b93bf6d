pub mod check;
pub mod init;
pub mod run;

use std::path::Path;

use pscape_core::SimConfig;

/// Load parameters from `path`, or fall back to the built-in defaults.
fn load_config(path: Option<&Path>) -> Result<SimConfig, String> {
    match path {
        Some(path) => {
            SimConfig::from_file(path).map_err(|e| format!("{}: {e}", path.display()))
        }
        None => Ok(SimConfig::default()),
    }
}
