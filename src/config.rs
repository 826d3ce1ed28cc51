pub mod settings;
pub mod user;

pub use settings::{DeviceProfile, LinkSettings, ResolvedSettings};
pub use user::{CONFIG_FILE_NAME, load_user_config, user_config_path};

use std::fs;
use std::path::Path;

use crate::error::{LinkError, LinkResult};

const LOG_TARGET: &str = "robolink::config";

/// Merge two LinkSettings, preferring values from `primary` over `fallback`
pub fn merge_settings(
    fallback: Option<LinkSettings>,
    primary: Option<LinkSettings>,
) -> Option<LinkSettings> {
    match (fallback, primary) {
        (None, None) => None,
        (Some(settings), None) => Some(settings),
        (None, Some(settings)) => Some(settings),
        (Some(fallback), Some(primary)) => Some(LinkSettings {
            device: primary.device.or(fallback.device),
            base_url: primary.base_url.or(fallback.base_url),
            cache_window_ms: primary.cache_window_ms.or(fallback.cache_window_ms),
            request_timeout_ms: primary.request_timeout_ms.or(fallback.request_timeout_ms),
            default_device: primary.default_device.or(fallback.default_device),
            disconnected_sentinel: primary
                .disconnected_sentinel
                .or(fallback.disconnected_sentinel),
        }),
    }
}

/// Read and parse one TOML settings file.
pub fn load_settings_file(path: &Path) -> LinkResult<LinkSettings> {
    let contents = fs::read_to_string(path)
        .map_err(|e| LinkError::Io(format!("Failed to read {}: {}", path.display(), e)))?;
    let settings = LinkSettings::from_toml_str(&contents)
        .map_err(|e| LinkError::config(format!("Failed to parse {}: {}", path.display(), e)))?;
    log::debug!(target: LOG_TARGET, "Loaded settings from {}", path.display());
    Ok(settings)
}

/// Load every configuration layer, lowest precedence first:
/// user config, `robolink.toml` in `project_dir`, then `explicit`.
///
/// A missing user or project file is skipped; a missing explicit file is an
/// error.
pub fn load_layered(explicit: Option<&Path>, project_dir: Option<&Path>) -> LinkResult<LinkSettings> {
    let mut merged = load_user_config()?;

    if let Some(dir) = project_dir {
        let project_file = dir.join(CONFIG_FILE_NAME);
        if project_file.exists() {
            merged = merge_settings(merged, Some(load_settings_file(&project_file)?));
        }
    }

    if let Some(path) = explicit {
        merged = merge_settings(merged, Some(load_settings_file(path)?));
    }

    Ok(merged.unwrap_or_default())
}
