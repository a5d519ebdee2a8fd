use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::config::{SDK_PLATFORM, SDK_VERSION};

/// A third party receiving ad-related data.
///
/// Equality, hashing and ordering all cover the full (id, name, policy url)
/// triple, so a provider that changes its name or policy counts as a new one.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AdProvider {
    #[serde(rename = "company_id")]
    pub id: String,
    #[serde(rename = "company_name", default, deserialize_with = "null_as_empty")]
    pub name: String,
    #[serde(rename = "policy_url", default, deserialize_with = "null_as_empty")]
    pub privacy_policy_url: String,
}

/// Lookup servers send `null` for unknown names and policy urls.
fn null_as_empty<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Option::<String>::deserialize(deserializer).map(Option::unwrap_or_default)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConsentStatus {
    #[default]
    Unknown,
    NonPersonalized,
    Personalized,
}

impl ConsentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConsentStatus::Unknown => "unknown",
            ConsentStatus::NonPersonalized => "non_personalized",
            ConsentStatus::Personalized => "personalized",
        }
    }
}

impl fmt::Display for ConsentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Who last assigned the consent status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConsentSource {
    /// Reset by a lookup merge.
    Sdk,
    /// Chosen by the user on the consent form.
    Form,
    /// Set by the host application.
    Programmatic,
}

impl ConsentSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConsentSource::Sdk => "sdk",
            ConsentSource::Form => "form",
            ConsentSource::Programmatic => "programmatic",
        }
    }
}

impl fmt::Display for ConsentSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Location override honoured only for test devices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DebugGeography {
    #[default]
    Disabled,
    Eea,
    NotEea,
}

impl DebugGeography {
    /// Value sent as the `debug_geo` query parameter.
    pub fn code(&self) -> u8 {
        match self {
            DebugGeography::Disabled => 0,
            DebugGeography::Eea => 1,
            DebugGeography::NotEea => 2,
        }
    }
}

/// The persisted consent record. One exists per installation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConsentData {
    #[serde(rename = "providers")]
    pub ad_providers: BTreeSet<AdProvider>,
    pub is_request_in_eea_or_unknown: bool,
    #[serde(rename = "consented_providers")]
    pub consented_ad_providers: BTreeSet<AdProvider>,
    #[serde(rename = "tag_for_under_age_of_consent")]
    pub under_age_of_consent: bool,
    #[serde(rename = "consent_state")]
    pub consent_status: ConsentStatus,
    #[serde(rename = "pub_ids")]
    pub publisher_ids: BTreeSet<String>,
    #[serde(rename = "has_any_npa_pub_id")]
    pub has_non_personalized_publisher_id: bool,
    pub consent_source: Option<ConsentSource>,
    #[serde(rename = "version")]
    pub sdk_version: String,
    #[serde(rename = "plat")]
    pub sdk_platform: String,
    pub raw_response: String,
}

impl Default for ConsentData {
    fn default() -> Self {
        Self {
            ad_providers: BTreeSet::new(),
            is_request_in_eea_or_unknown: false,
            consented_ad_providers: BTreeSet::new(),
            under_age_of_consent: false,
            consent_status: ConsentStatus::Unknown,
            publisher_ids: BTreeSet::new(),
            has_non_personalized_publisher_id: false,
            consent_source: None,
            sdk_version: SDK_VERSION.to_string(),
            sdk_platform: SDK_PLATFORM.to_string(),
            raw_response: String::new(),
        }
    }
}

impl ConsentData {
    /// Assign a status. An unknown status drops the provider set (and with it
    /// any consented providers), any other status snapshots the provider set as
    /// the consented set.
    pub fn apply_status(&mut self, status: ConsentStatus, source: ConsentSource) {
        if status == ConsentStatus::Unknown {
            self.ad_providers.clear();
            self.consented_ad_providers.clear();
        } else {
            self.consented_ad_providers = self.ad_providers.clone();
        }
        self.consent_source = Some(source);
        self.consent_status = status;
    }
}
