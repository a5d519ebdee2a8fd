//! Parsing, validation and merging of the ad-provider lookup response.

use std::collections::{BTreeSet, HashSet};

use serde::Deserialize;

use super::models::{AdProvider, ConsentData, ConsentSource, ConsentStatus};
use crate::error::{ConsentError, Result};

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AdNetworkLookupResponse {
    #[serde(rename = "ad_network_id", default)]
    pub id: String,
    #[serde(default)]
    pub company_ids: Option<Vec<String>>,
    #[serde(default)]
    pub lookup_failed: bool,
    #[serde(default)]
    pub not_found: bool,
    #[serde(rename = "is_npa", default)]
    pub is_non_personalized: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LookupResponse {
    #[serde(default)]
    pub companies: Option<Vec<AdProvider>>,
    #[serde(rename = "ad_network_ids", default)]
    pub ad_network_lookup_responses: Option<Vec<AdNetworkLookupResponse>>,
    #[serde(default)]
    pub is_request_in_eea_or_unknown: Option<bool>,
}

impl LookupResponse {
    fn network_responses(&self) -> &[AdNetworkLookupResponse] {
        self.ad_network_lookup_responses.as_deref().unwrap_or_default()
    }
}

pub fn parse(raw: &str) -> Result<LookupResponse> {
    serde_json::from_str(raw)
        .map_err(|e| ConsentError::InvalidResponse(format!("Could not parse lookup response: {e}")))
}

/// Reject responses that cannot be merged. Returns the region flag on success.
pub fn validate(response: &LookupResponse) -> Result<bool> {
    let Some(in_region) = response.is_request_in_eea_or_unknown else {
        return Err(ConsentError::InvalidResponse(
            "Could not parse lookup response: missing region flag".into(),
        ));
    };

    if !in_region {
        return Ok(false);
    }

    if response.companies.is_none() {
        return Err(ConsentError::InvalidResponse(
            "Could not parse lookup response: missing companies".into(),
        ));
    }

    let mut lookup_failed: Vec<&str> = Vec::new();
    let mut not_found: Vec<&str> = Vec::new();
    for network in response.network_responses() {
        if network.lookup_failed && !lookup_failed.contains(&network.id.as_str()) {
            lookup_failed.push(&network.id);
        }
        if network.not_found && !not_found.contains(&network.id.as_str()) {
            not_found.push(&network.id);
        }
    }

    if lookup_failed.is_empty() && not_found.is_empty() {
        return Ok(true);
    }

    let mut message = String::from("Response error.");
    if !lookup_failed.is_empty() {
        message.push_str(&format!(" Lookup failure for: {}.", lookup_failed.join(",")));
    }
    if !not_found.is_empty() {
        message.push_str(&format!(" Publisher Ids not found: {}", not_found.join(",")));
    }
    Err(ConsentError::InvalidResponse(message))
}

/// Fold a validated response into the previous record.
///
/// Consent is reset to unknown when the user is in a regulated region and
/// either the provider set or the non-personalized flag moved away from what
/// the user last consented to.
pub fn merge(
    mut data: ConsentData,
    response: &LookupResponse,
    raw_response: &str,
    publisher_ids: &[String],
) -> ConsentData {
    let mut non_personalized_ids: HashSet<&str> = HashSet::new();
    let mut has_non_personalized_publisher_id = false;
    for network in response
        .network_responses()
        .iter()
        .filter(|n| n.is_non_personalized)
    {
        has_non_personalized_publisher_id = true;
        if let Some(ids) = &network.company_ids {
            non_personalized_ids.extend(ids.iter().map(String::as_str));
        }
    }

    let providers: BTreeSet<AdProvider> = match &response.companies {
        None => BTreeSet::new(),
        Some(companies) if has_non_personalized_publisher_id => companies
            .iter()
            .filter(|p| non_personalized_ids.contains(p.id.as_str()))
            .cloned()
            .collect(),
        Some(companies) => companies.iter().cloned().collect(),
    };

    let npa_changed = data.has_non_personalized_publisher_id != has_non_personalized_publisher_id;
    let in_region = response.is_request_in_eea_or_unknown.unwrap_or(false);

    data.has_non_personalized_publisher_id = has_non_personalized_publisher_id;
    data.raw_response = raw_response.to_string();
    data.publisher_ids = publisher_ids.iter().cloned().collect();
    data.ad_providers = providers;
    data.is_request_in_eea_or_unknown = in_region;

    if !in_region {
        return data;
    }

    if data.ad_providers != data.consented_ad_providers || npa_changed {
        tracing::info!(
            npa_changed,
            providers = data.ad_providers.len(),
            "Ad providers changed since last consent, resetting status"
        );
        data.consent_source = Some(ConsentSource::Sdk);
        data.consent_status = ConsentStatus::Unknown;
        data.consented_ad_providers.clear();
    }

    data
}

#[cfg(test)]
mod tests {
    use super::*;

    fn provider(id: &str) -> AdProvider {
        AdProvider {
            id: id.into(),
            name: format!("Company {id}"),
            privacy_policy_url: format!("https://{id}.example.com/privacy"),
        }
    }

    fn pubs() -> Vec<String> {
        vec!["pub-1".to_string()]
    }

    const IN_REGION: &str = r#"{
        "is_request_in_eea_or_unknown": true,
        "companies": [
            {"company_id": "c1", "company_name": "Company c1", "policy_url": "https://c1.example.com/privacy"}
        ],
        "ad_network_ids": [
            {"ad_network_id": "n1", "company_ids": ["c1"], "is_npa": false, "lookup_failed": false, "not_found": false}
        ]
    }"#;

    #[test]
    fn test_missing_region_flag_fails() {
        let response = parse(r#"{"companies": []}"#).unwrap();
        assert!(matches!(
            validate(&response),
            Err(ConsentError::InvalidResponse(_))
        ));
    }

    #[test]
    fn test_null_region_flag_fails() {
        let response = parse(r#"{"is_request_in_eea_or_unknown": null}"#).unwrap();
        assert!(validate(&response).is_err());
    }

    #[test]
    fn test_company_with_null_policy_url_still_parses() {
        let response = parse(
            r#"{"is_request_in_eea_or_unknown": true,
                "companies": [
                    {"company_id": "c1", "company_name": "Company c1", "policy_url": null}
                ],
                "ad_network_ids": []}"#,
        )
        .unwrap();
        assert!(validate(&response).unwrap());
        let companies = response.companies.unwrap();
        assert_eq!(companies[0].privacy_policy_url, "");
    }

    #[test]
    fn test_outside_region_accepts_missing_companies() {
        let response = parse(r#"{"is_request_in_eea_or_unknown": false}"#).unwrap();
        assert!(!validate(&response).unwrap());
    }

    #[test]
    fn test_outside_region_ignores_failed_lookups() {
        let response = parse(
            r#"{"is_request_in_eea_or_unknown": false,
                "ad_network_ids": [{"ad_network_id": "n1", "lookup_failed": true}]}"#,
        )
        .unwrap();
        assert!(validate(&response).is_ok());
    }

    #[test]
    fn test_in_region_requires_companies() {
        let response = parse(r#"{"is_request_in_eea_or_unknown": true}"#).unwrap();
        assert!(validate(&response).is_err());
    }

    #[test]
    fn test_lookup_failure_names_network() {
        let response = parse(
            r#"{"is_request_in_eea_or_unknown": true, "companies": [],
                "ad_network_ids": [{"ad_network_id": "n1", "company_ids": [], "lookup_failed": true}]}"#,
        )
        .unwrap();
        let err = validate(&response).unwrap_err().to_string();
        assert!(err.contains("n1"));
        assert_eq!(err, "Response error. Lookup failure for: n1.");
    }

    #[test]
    fn test_composite_error_lists_failures_before_not_found() {
        let response = parse(
            r#"{"is_request_in_eea_or_unknown": true, "companies": [],
                "ad_network_ids": [
                    {"ad_network_id": "n3", "not_found": true},
                    {"ad_network_id": "n1", "lookup_failed": true},
                    {"ad_network_id": "n2", "lookup_failed": true},
                    {"ad_network_id": "n1", "lookup_failed": true}
                ]}"#,
        )
        .unwrap();
        let err = validate(&response).unwrap_err().to_string();
        assert_eq!(
            err,
            "Response error. Lookup failure for: n1,n2. Publisher Ids not found: n3"
        );
    }

    #[test]
    fn test_parse_rejects_malformed_json() {
        assert!(matches!(
            parse("not json"),
            Err(ConsentError::InvalidResponse(_))
        ));
    }

    #[test]
    fn test_merge_in_region_with_new_providers_resets_status() {
        let response = parse(IN_REGION).unwrap();
        assert!(validate(&response).unwrap());

        let previous = ConsentData {
            consent_status: ConsentStatus::Personalized,
            consent_source: Some(ConsentSource::Form),
            ..Default::default()
        };
        let merged = merge(previous, &response, IN_REGION, &pubs());

        assert_eq!(merged.ad_providers, BTreeSet::from([provider("c1")]));
        assert!(!merged.has_non_personalized_publisher_id);
        assert!(merged.is_request_in_eea_or_unknown);
        assert_eq!(merged.consent_status, ConsentStatus::Unknown);
        assert_eq!(merged.consent_source, Some(ConsentSource::Sdk));
        assert!(merged.consented_ad_providers.is_empty());
        assert_eq!(merged.raw_response, IN_REGION);
        assert_eq!(merged.publisher_ids, BTreeSet::from(["pub-1".to_string()]));
    }

    #[test]
    fn test_merge_in_region_unchanged_preserves_status() {
        let response = parse(IN_REGION).unwrap();
        let previous = ConsentData {
            consent_status: ConsentStatus::Personalized,
            consent_source: Some(ConsentSource::Form),
            consented_ad_providers: BTreeSet::from([provider("c1")]),
            ..Default::default()
        };
        let merged = merge(previous, &response, IN_REGION, &pubs());

        assert_eq!(merged.consent_status, ConsentStatus::Personalized);
        assert_eq!(merged.consent_source, Some(ConsentSource::Form));
        assert_eq!(merged.consented_ad_providers, BTreeSet::from([provider("c1")]));
    }

    #[test]
    fn test_merge_npa_flag_change_resets_status() {
        let raw = r#"{
            "is_request_in_eea_or_unknown": true,
            "companies": [
                {"company_id": "c1", "company_name": "Company c1", "policy_url": "https://c1.example.com/privacy"}
            ],
            "ad_network_ids": [{"ad_network_id": "n1", "company_ids": ["c1"], "is_npa": true}]
        }"#;
        let response = parse(raw).unwrap();
        let previous = ConsentData {
            consent_status: ConsentStatus::NonPersonalized,
            consented_ad_providers: BTreeSet::from([provider("c1")]),
            has_non_personalized_publisher_id: false,
            ..Default::default()
        };
        let merged = merge(previous, &response, raw, &pubs());

        assert!(merged.has_non_personalized_publisher_id);
        assert_eq!(merged.ad_providers, BTreeSet::from([provider("c1")]));
        assert_eq!(merged.consent_status, ConsentStatus::Unknown);
        assert_eq!(merged.consent_source, Some(ConsentSource::Sdk));
    }

    #[test]
    fn test_merge_npa_filters_providers() {
        let raw = r#"{
            "is_request_in_eea_or_unknown": true,
            "companies": [
                {"company_id": "c1", "company_name": "Company c1", "policy_url": "https://c1.example.com/privacy"},
                {"company_id": "c2", "company_name": "Company c2", "policy_url": "https://c2.example.com/privacy"},
                {"company_id": "c3", "company_name": "Company c3", "policy_url": "https://c3.example.com/privacy"}
            ],
            "ad_network_ids": [
                {"ad_network_id": "n1", "company_ids": ["c1", "c2"], "is_npa": false},
                {"ad_network_id": "n2", "company_ids": ["c3"], "is_npa": true},
                {"ad_network_id": "n3", "company_ids": null, "is_npa": true}
            ]
        }"#;
        let response = parse(raw).unwrap();
        let merged = merge(ConsentData::default(), &response, raw, &pubs());

        assert!(merged.has_non_personalized_publisher_id);
        assert_eq!(merged.ad_providers, BTreeSet::from([provider("c3")]));
    }

    #[test]
    fn test_merge_outside_region_never_resets_status() {
        let raw = r#"{
            "is_request_in_eea_or_unknown": false,
            "companies": [
                {"company_id": "c9", "company_name": "Company c9", "policy_url": "https://c9.example.com/privacy"}
            ],
            "ad_network_ids": [{"ad_network_id": "n1", "company_ids": ["c9"], "is_npa": true}]
        }"#;
        let response = parse(raw).unwrap();
        let previous = ConsentData {
            consent_status: ConsentStatus::Personalized,
            consent_source: Some(ConsentSource::Programmatic),
            consented_ad_providers: BTreeSet::from([provider("c1")]),
            is_request_in_eea_or_unknown: true,
            ..Default::default()
        };
        let merged = merge(previous, &response, raw, &pubs());

        assert!(!merged.is_request_in_eea_or_unknown);
        assert_eq!(merged.ad_providers, BTreeSet::from([provider("c9")]));
        assert_eq!(merged.consent_status, ConsentStatus::Personalized);
        assert_eq!(merged.consent_source, Some(ConsentSource::Programmatic));
        assert_eq!(merged.consented_ad_providers, BTreeSet::from([provider("c1")]));
    }

    #[test]
    fn test_merge_without_companies_yields_empty_set() {
        let raw = r#"{"is_request_in_eea_or_unknown": false}"#;
        let response = parse(raw).unwrap();
        let previous = ConsentData {
            ad_providers: BTreeSet::from([provider("c1")]),
            ..Default::default()
        };
        let merged = merge(previous, &response, raw, &pubs());
        assert!(merged.ad_providers.is_empty());
    }
}
