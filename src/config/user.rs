//! User configuration loading for robolink.
//!
//! User config location: $XDG_CONFIG_HOME/robolink/robolink.toml
//! Fallback: the platform config directory (`dirs::config_dir()`).

use std::path::PathBuf;

use super::{LinkSettings, load_settings_file};
use crate::error::LinkResult;

pub const CONFIG_FILE_NAME: &str = "robolink.toml";

/// Returns the path to the user configuration file.
///
/// Returns None if no config directory can be determined.
pub fn user_config_path() -> Option<PathBuf> {
    if let Ok(xdg_config) = std::env::var("XDG_CONFIG_HOME")
        && !xdg_config.is_empty()
    {
        return Some(PathBuf::from(xdg_config).join("robolink").join(CONFIG_FILE_NAME));
    }

    dirs::config_dir().map(|dir| dir.join("robolink").join(CONFIG_FILE_NAME))
}

/// Load the user configuration file, if one exists.
pub fn load_user_config() -> LinkResult<Option<LinkSettings>> {
    let Some(path) = user_config_path() else {
        return Ok(None);
    };
    if !path.exists() {
        return Ok(None);
    }
    load_settings_file(&path).map(Some)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::env;

    #[test]
    #[serial(xdg_env)]
    fn user_config_path_uses_xdg_config_home_when_set() {
        let original = env::var("XDG_CONFIG_HOME").ok();

        // SAFETY: #[serial(xdg_env)] prevents concurrent modification of XDG_CONFIG_HOME
        unsafe {
            env::set_var("XDG_CONFIG_HOME", "/custom/config");
        }

        let path = user_config_path();

        // SAFETY: #[serial(xdg_env)] prevents concurrent modification of XDG_CONFIG_HOME
        unsafe {
            match original {
                Some(val) => env::set_var("XDG_CONFIG_HOME", val),
                None => env::remove_var("XDG_CONFIG_HOME"),
            }
        }

        assert_eq!(
            path,
            Some(PathBuf::from("/custom/config/robolink/robolink.toml")),
            "should use XDG_CONFIG_HOME/robolink/robolink.toml"
        );
    }
}
