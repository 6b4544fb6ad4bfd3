//! Engine-wide configuration.
//!
//! The core keeps no global state (see spec §9); the handful of knobs that
//! genuinely vary per embedding application — decimal rendering scale, the
//! wildcard locale tag, the default base URI, and a recursion guard for
//! cyclic-shape expansion — are collected here and threaded explicitly
//! through the call sites that need them, the same way `inputlayer`'s
//! `figment`-layered settings are read once and passed down rather than
//! read from a global.

use serde::{Deserialize, Serialize};

/// Tunable knobs for codec rendering and model expansion.
///
/// Load with [`figment`]:
///
/// ```no_run
/// use figment::{Figment, providers::{Toml, Env, Format}};
/// use linkmesh::config::EngineConfig;
///
/// let config: EngineConfig = Figment::from(EngineConfig::default())
///     .merge(Toml::file("linkmesh.toml"))
///     .merge(Env::prefixed("LINKMESH_"))
///     .extract()
///     .expect("valid configuration");
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Base URI used to relativise URIs/Data literals when the caller does
    /// not supply one explicitly, and as the namespace for fresh `@id`s
    /// minted by [`crate::model::expand`].
    pub base_uri: String,
    /// Locale tag rendered for the distinguished wildcard locale (`*`).
    pub wildcard_locale: String,
    /// Maximum selector/recursion depth walked before
    /// [`crate::error::ParseError::Selector`] is raised; guards against
    /// runaway traversal of cyclic shapes.
    pub max_depth: usize,
    /// Decimal places used when rendering a `Floating` value that has no
    /// exact scientific form (diagnostics only; the canonical codec always
    /// uses `<sig>e<exp>` per spec §6).
    pub float_display_precision: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            base_uri: "urn:linkmesh:".to_string(),
            wildcard_locale: "*".to_string(),
            max_depth: 64,
            float_display_precision: 17,
        }
    }
}

impl figment::Provider for EngineConfig {
    fn metadata(&self) -> figment::Metadata {
        figment::Metadata::named("linkmesh default configuration")
    }

    fn data(
        &self,
    ) -> Result<figment::value::Map<figment::Profile, figment::value::Dict>, figment::Error> {
        figment::providers::Serialized::defaults(self).data()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_self_consistent() {
        let config = EngineConfig::default();
        assert!(config.max_depth > 0);
        assert_eq!(config.wildcard_locale, "*");
    }

    #[test]
    fn figment_layers_toml_over_defaults() {
        use figment::Figment;
        use figment::providers::{Format, Toml};

        let toml = "base_uri = \"https://example.org/\"\nmax_depth = 8\n";
        let config: EngineConfig = Figment::from(EngineConfig::default())
            .merge(Toml::string(toml))
            .extract()
            .expect("valid configuration");
        assert_eq!(config.base_uri, "https://example.org/");
        assert_eq!(config.max_depth, 8);
        // untouched fields keep their defaults
        assert_eq!(config.wildcard_locale, "*");
    }
}
