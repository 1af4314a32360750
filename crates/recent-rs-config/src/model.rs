//! Configuration schema for recency attachments.

use crate::ConfigError;
use recent_rs_core::{RecentOptions, RecentPolicy};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};

/// Root config: shared defaults plus one entry per named attachment.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct RecentConfig {
    #[serde(default, rename = "$schema", skip_serializing_if = "Option::is_none")]
    pub schema: Option<String>,
    /// Options applied to every attachment unless it sets them itself.
    #[serde(default)]
    pub defaults: RecentOptions,
    /// Attachments keyed by their default entry name.
    #[serde(default)]
    pub attachments: BTreeMap<String, RecentOptions>,
}

impl RecentConfig {
    /// Start building a config programmatically.
    pub fn builder() -> RecentConfigBuilder {
        RecentConfigBuilder::new()
    }

    /// Effective sparse options for one attachment, or `None` when the
    /// attachment is not configured.
    ///
    /// Precedence is attachment options, then the attachment key as `name`,
    /// then the shared defaults.
    pub fn attachment_options(&self, key: &str) -> Option<RecentOptions> {
        let options = self.attachments.get(key)?;
        let keyed = RecentOptions::new().name(key).overlay(&self.defaults);
        Some(options.overlay(&keyed))
    }

    /// Effective options for every configured attachment, by key.
    pub fn effective_options(&self) -> BTreeMap<String, RecentOptions> {
        self.attachments
            .keys()
            .filter_map(|key| {
                self.attachment_options(key)
                    .map(|options| (key.clone(), options))
            })
            .collect()
    }

    /// Resolve the policy of one attachment using `==` to compare values.
    pub fn policy<V>(&self, key: &str) -> Result<RecentPolicy<V>, ConfigError>
    where
        V: PartialEq + 'static,
    {
        let options = self
            .attachment_options(key)
            .ok_or_else(|| ConfigError::Invalid(format!("no attachment configured for {key}")))?;
        Ok(RecentPolicy::resolve(&options)?)
    }

    /// Resolve every attachment and reject clashing generated names.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut operations = HashMap::new();
        let mut fields = HashMap::new();
        for key in self.attachments.keys() {
            let policy = self.policy::<Value>(key)?;
            if let Some(other) = operations.insert(policy.operation_name().to_string(), key) {
                return Err(ConfigError::Invalid(format!(
                    "attachments {other} and {key} both generate {}",
                    policy.operation_name()
                )));
            }
            if let Some(other) = fields.insert(policy.list_field().to_string(), key) {
                return Err(ConfigError::Invalid(format!(
                    "attachments {other} and {key} both store into {}",
                    policy.list_field()
                )));
            }
        }
        Ok(())
    }
}

/// Builder for assembling a `RecentConfig` in code.
#[derive(Debug, Default, Clone)]
pub struct RecentConfigBuilder {
    config: RecentConfig,
}

impl RecentConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the shared defaults.
    pub fn defaults(mut self, defaults: RecentOptions) -> Self {
        self.config.defaults = defaults;
        self
    }

    /// Add or replace one attachment.
    pub fn attachment(mut self, key: impl Into<String>, options: RecentOptions) -> Self {
        self.config.attachments.insert(key.into(), options);
        self
    }

    /// Validate and return the config.
    pub fn build(self) -> Result<RecentConfig, ConfigError> {
        self.config.validate()?;
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::RecentConfig;
    use crate::ConfigError;
    use pretty_assertions::assert_eq;
    use recent_rs_core::{ConcurrencyGuard, RecentOptions};

    #[test]
    fn attachment_key_names_entries_by_default() {
        let config = RecentConfig::builder()
            .defaults(RecentOptions::new().capacity(20))
            .attachment("view", RecentOptions::new())
            .attachment("play", RecentOptions::new().timestamp_field("time"))
            .build()
            .expect("config");

        let play = config.attachment_options("play").expect("play");
        assert_eq!(play.name.as_deref(), Some("play"));
        assert_eq!(play.capacity, Some(20));
        assert_eq!(play.timestamp_field.as_deref(), Some("time"));

        let policy = config.policy::<String>("play").expect("policy");
        assert_eq!(policy.list_field(), "recentPlays");
        assert_eq!(policy.capacity().get(), 20);
        assert!(config.attachment_options("song").is_none());
    }

    #[test]
    fn attachment_options_win_over_defaults() {
        let config = RecentConfig::builder()
            .defaults(
                RecentOptions::new()
                    .capacity(20)
                    .concurrency(ConcurrencyGuard::Serialized),
            )
            .attachment("view", RecentOptions::new().capacity(3).name("page"))
            .build()
            .expect("config");
        let options = config.attachment_options("view").expect("view");
        assert_eq!(options.capacity, Some(3));
        assert_eq!(options.name.as_deref(), Some("page"));
        assert_eq!(options.concurrency, Some(ConcurrencyGuard::Serialized));
    }

    #[test]
    fn clashing_operations_are_rejected() {
        let err = RecentConfig::builder()
            .attachment("view", RecentOptions::new())
            .attachment("page", RecentOptions::new().operation_name("addRecentView"))
            .build()
            .expect_err("clash");
        assert!(err.to_string().contains("both generate addRecentView"));
    }

    #[test]
    fn unresolvable_options_surface_as_policy_errors() {
        let err = RecentConfig::builder()
            .attachment("view", RecentOptions::new().capacity(0))
            .build()
            .expect_err("capacity");
        assert!(matches!(err, ConfigError::Policy(_)));
    }
}
