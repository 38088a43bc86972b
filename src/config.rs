// Copyright (c) 2025 - Cowboy AI, Inc.

//! Inventory source configuration
//!
//! The configuration surface consumed by the construction engine. The host
//! runtime parses its own YAML/INI files; this crate only needs the typed
//! view plus a `from_yaml_str` helper for the bundled binary and tests.
//!
//! Validation is fail-fast: unknown filter keys, conflicting host-key
//! flags and malformed rule expressions are all rejected before any fetch
//! is attempted.

use std::collections::BTreeMap;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::errors::{InventoryError, InventoryResult};
use crate::filters::{FilterSet, FilterValue};

fn default_true() -> bool {
    true
}

fn default_separator() -> String {
    "_".to_string()
}

fn default_cache_ttl() -> u64 {
    3600
}

/// Which IP lands in the host's address variable
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum IpPreference {
    /// Public IP when present, private otherwise
    #[default]
    PreferPublic,
    PublicOnly,
    PrivateOnly,
}

/// Built-in grouping dimensions applied to every host before the
/// configured `keyed_groups` rules
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GroupByField {
    /// One `tag_<Key>_<value>` group per tag
    Tags,
    /// A group named after the configured region
    Region,
    /// A group named after the placement subregion
    Subregion,
    /// `vm_type_<type>`
    VmType,
    /// `state_<state>`
    State,
}

fn default_group_by() -> Vec<GroupByField> {
    vec![
        GroupByField::Tags,
        GroupByField::Region,
        GroupByField::Subregion,
        GroupByField::VmType,
        GroupByField::State,
    ]
}

/// Attribute used as the stable host key
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostKeySource {
    Id,
    PrivateIp,
    PublicIp,
}

impl HostKeySource {
    /// Dotted attribute path holding the key
    pub fn attribute(&self) -> &'static str {
        match self {
            HostKeySource::Id => "id",
            HostKeySource::PrivateIp => "private_ip",
            HostKeySource::PublicIp => "public_ip",
        }
    }
}

/// One `keyed_groups` rule as configured
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct KeyedGroupConfig {
    /// Source expression evaluated per host
    pub key: String,

    /// Prefix for derived group names
    #[serde(default)]
    pub prefix: String,

    /// Separator between prefix and stringified element
    #[serde(default = "default_separator")]
    pub separator: String,

    /// Substitute for absent/empty results; without it the host is simply
    /// omitted from this rule's grouping
    #[serde(default)]
    pub default_value: Option<String>,

    /// Parents of each derived group (default: `all`)
    #[serde(default)]
    pub parent_groups: Vec<String>,
}

/// A static group declaration: bare predicate string, or detailed form
/// with explicit parents
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StaticGroupConfig {
    Predicate(String),
    Detailed {
        #[serde(default)]
        when: Option<String>,
        #[serde(default)]
        parents: Vec<String>,
    },
}

/// Configuration for one Outscale inventory source
///
/// Unrecognized keys are rejected at parse time rather than silently
/// ignored, so a misspelled option cannot turn a rule into a no-op.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct InventoryConfig {
    /// Outscale region, e.g. "eu-west-2"
    #[serde(default)]
    pub region: Option<String>,

    /// API access key
    #[serde(default)]
    pub access_key: Option<String>,

    /// API secret key
    #[serde(default)]
    pub secret_key: Option<String>,

    /// Key hosts by private IP instead of VM id
    #[serde(default)]
    pub use_private_ip: bool,

    /// Key hosts by public IP instead of VM id
    #[serde(default)]
    pub use_public_ip: bool,

    /// Which IP to expose as the host address variable
    #[serde(default)]
    pub ip_preference: IpPreference,

    /// Provider-side selection criteria for `ReadVms`
    #[serde(default)]
    pub filters: BTreeMap<String, FilterValue>,

    /// Built-in grouping dimensions; defaults to all of them
    #[serde(default = "default_group_by")]
    pub group_by: Vec<GroupByField>,

    /// Dynamic group derivation rules, applied in declaration order
    #[serde(default)]
    pub keyed_groups: Vec<KeyedGroupConfig>,

    /// Computed host variables, applied in declaration order
    #[serde(default)]
    pub compose: IndexMap<String, String>,

    /// Static groups with membership predicates
    #[serde(default)]
    pub groups: IndexMap<String, StaticGroupConfig>,

    /// Keep the separator in front of unprefixed keyed-group names
    #[serde(default = "default_true")]
    pub leading_separator: bool,

    /// Enable the fetch cache
    #[serde(default = "default_true")]
    pub cache: bool,

    /// Fetch cache TTL in seconds; zero disables caching
    #[serde(default = "default_cache_ttl")]
    pub cache_ttl_secs: u64,
}

impl Default for InventoryConfig {
    fn default() -> Self {
        Self {
            region: None,
            access_key: None,
            secret_key: None,
            use_private_ip: false,
            use_public_ip: false,
            ip_preference: IpPreference::default(),
            filters: BTreeMap::new(),
            group_by: default_group_by(),
            keyed_groups: Vec::new(),
            compose: IndexMap::new(),
            groups: IndexMap::new(),
            leading_separator: true,
            cache: true,
            cache_ttl_secs: default_cache_ttl(),
        }
    }
}

impl InventoryConfig {
    /// Parse from YAML text
    pub fn from_yaml_str(text: &str) -> InventoryResult<Self> {
        serde_yaml::from_str(text)
            .map_err(|e| InventoryError::Configuration(format!("invalid YAML config: {e}")))
    }

    /// Validate everything that can fail before a fetch
    pub fn validate(&self) -> InventoryResult<()> {
        if self.use_private_ip && self.use_public_ip {
            return Err(InventoryError::Configuration(
                "use_private_ip and use_public_ip are mutually exclusive".to_string(),
            ));
        }
        self.filter_set()?;
        Ok(())
    }

    /// The validated filter set for this source
    pub fn filter_set(&self) -> InventoryResult<FilterSet> {
        FilterSet::from_config(&self.filters)
    }

    /// How hosts are keyed for this source
    pub fn host_key_source(&self) -> InventoryResult<HostKeySource> {
        match (self.use_private_ip, self.use_public_ip) {
            (true, true) => Err(InventoryError::Configuration(
                "use_private_ip and use_public_ip are mutually exclusive".to_string(),
            )),
            (true, false) => Ok(HostKeySource::PrivateIp),
            (false, true) => Ok(HostKeySource::PublicIp),
            (false, false) => Ok(HostKeySource::Id),
        }
    }

    /// Set the region
    pub fn with_region(mut self, region: impl Into<String>) -> Self {
        self.region = Some(region.into());
        self
    }

    /// Set API credentials
    pub fn with_credentials(
        mut self,
        access_key: impl Into<String>,
        secret_key: impl Into<String>,
    ) -> Self {
        self.access_key = Some(access_key.into());
        self.secret_key = Some(secret_key.into());
        self
    }
}
