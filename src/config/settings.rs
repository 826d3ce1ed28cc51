use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{LinkError, LinkResult};
use crate::key::DeviceId;

/// Which robot family the control server speaks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum DeviceProfile {
    #[default]
    Finch,
    /// The classic Hummingbird Duo controller.
    Hummingbird,
    HummingbirdBit,
}

impl DeviceProfile {
    pub fn default_base_url(self) -> &'static str {
        match self {
            DeviceProfile::Finch | DeviceProfile::Hummingbird => "http://localhost:22179",
            DeviceProfile::HummingbirdBit => "http://localhost:30061",
        }
    }

    pub fn default_cache_window(self) -> Duration {
        match self {
            DeviceProfile::Finch | DeviceProfile::Hummingbird => Duration::from_millis(100),
            DeviceProfile::HummingbirdBit => Duration::from_millis(200),
        }
    }

    /// Plain-text payload the server returns when no robot is attached.
    pub fn default_sentinel(self) -> &'static str {
        match self {
            DeviceProfile::Finch => "Finch not connected",
            DeviceProfile::Hummingbird | DeviceProfile::HummingbirdBit => {
                "Hummingbird not connected"
            }
        }
    }
}

impl fmt::Display for DeviceProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            DeviceProfile::Finch => "finch",
            DeviceProfile::Hummingbird => "hummingbird",
            DeviceProfile::HummingbirdBit => "hummingbird-bit",
        })
    }
}

impl FromStr for DeviceProfile {
    type Err = LinkError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "finch" => Ok(DeviceProfile::Finch),
            "hummingbird" | "duo" => Ok(DeviceProfile::Hummingbird),
            "hummingbird-bit" | "hummingbird_bit" | "bit" => Ok(DeviceProfile::HummingbirdBit),
            other => Err(LinkError::config(format!("Unknown device profile: {}", other))),
        }
    }
}

/// One layer of link configuration, as read from TOML or the command line.
///
/// Every field is optional so layers can be merged with
/// [`merge_settings`](super::merge_settings).
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct LinkSettings {
    pub device: Option<DeviceProfile>,
    pub base_url: Option<String>,
    pub cache_window_ms: Option<u64>,
    pub request_timeout_ms: Option<u64>,
    pub default_device: Option<String>,
    pub disconnected_sentinel: Option<String>,
}

/// Fully-populated settings a link is built from.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedSettings {
    pub profile: DeviceProfile,
    pub base_url: Url,
    pub cache_window: Duration,
    pub request_timeout: Option<Duration>,
    pub default_device: DeviceId,
    pub disconnected_sentinel: String,
}

impl LinkSettings {
    pub fn from_toml_str(contents: &str) -> LinkResult<Self> {
        toml::from_str(contents).map_err(|e| LinkError::config(e.to_string()))
    }

    /// Settings selecting `profile` and nothing else.
    pub fn for_profile(profile: DeviceProfile) -> Self {
        Self {
            device: Some(profile),
            ..Self::default()
        }
    }

    /// Fill unset fields from the profile defaults and validate.
    pub fn resolve(&self) -> LinkResult<ResolvedSettings> {
        let profile = self.device.unwrap_or_default();

        let raw_url = self
            .base_url
            .as_deref()
            .unwrap_or(profile.default_base_url());
        let base_url = Url::parse(raw_url)
            .map_err(|e| LinkError::config(format!("Invalid base_url {:?}: {}", raw_url, e)))?;
        if !matches!(base_url.scheme(), "http" | "https") {
            return Err(LinkError::config(format!(
                "base_url must be http or https, got {:?}",
                raw_url
            )));
        }

        let default_device = match self.default_device.as_deref() {
            Some("") => return Err(LinkError::config("default_device must not be empty")),
            Some(id) => DeviceId::new(id),
            None => DeviceId::default(),
        };

        Ok(ResolvedSettings {
            profile,
            base_url,
            cache_window: self
                .cache_window_ms
                .map(Duration::from_millis)
                .unwrap_or(profile.default_cache_window()),
            request_timeout: self.request_timeout_ms.map(Duration::from_millis),
            default_device,
            disconnected_sentinel: self
                .disconnected_sentinel
                .clone()
                .unwrap_or_else(|| profile.default_sentinel().to_string()),
        })
    }
}
