//! Controller configuration.

use cdsso_client::CdssoConfig;
use merkos_client::MerkosConfig;
use serde::{Deserialize, Serialize};
use universe_core::ProviderName;
use valu_client::ValuConfig;

/// Top-level configuration for the unified auth controller.
///
/// Every field has a default, so a partial JSON document (or
/// `UniverseAuthConfig::default()`) yields a working platform-only
/// setup.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct UniverseAuthConfig {
    /// Whether the platform (merkos) provider participates.
    #[serde(default = "default_true")]
    pub enable_merkos: bool,
    /// Whether the social/iframe (valu) provider participates.
    #[serde(default)]
    pub enable_valu: bool,
    /// Whether the cross-domain SSO bridge runs during initialization.
    #[serde(default)]
    pub enable_cdsso: bool,
    /// Run `initialize` as part of `from_config`.
    #[serde(default = "default_true")]
    pub auto_initialize: bool,
    /// Which provider's fields win when both are authenticated.
    #[serde(default)]
    pub priority: ProviderName,
    #[serde(default)]
    pub merkos: MerkosConfig,
    #[serde(default)]
    pub valu: ValuConfig,
    #[serde(default)]
    pub cdsso: CdssoConfig,
}

fn default_true() -> bool {
    true
}

impl Default for UniverseAuthConfig {
    fn default() -> Self {
        Self {
            enable_merkos: true,
            enable_valu: false,
            enable_cdsso: false,
            auto_initialize: true,
            priority: ProviderName::default(),
            merkos: MerkosConfig::default(),
            valu: ValuConfig::default(),
            cdsso: CdssoConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_platform_only() {
        let config = UniverseAuthConfig::default();
        assert!(config.enable_merkos);
        assert!(!config.enable_valu);
        assert!(!config.enable_cdsso);
        assert!(config.auto_initialize);
        assert_eq!(config.priority, ProviderName::Merkos);
    }

    #[test]
    fn partial_json_fills_in_defaults() {
        let config: UniverseAuthConfig =
            serde_json::from_str(r#"{"enable_valu": true, "priority": "valu"}"#).unwrap();
        assert!(config.enable_merkos);
        assert!(config.enable_valu);
        assert_eq!(config.priority, ProviderName::Valu);
        assert_eq!(config.merkos.api_url, MerkosConfig::default().api_url);
    }
}
