//! `consent://` event URIs emitted by the presentation surface, and the setup
//! command sent back to it.

use reqwest::Url;
use serde::Serialize;

use crate::consent::ConsentData;
use crate::error::Result;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormEvent {
    LoadComplete { status: Option<String> },
    Dismiss { status: Option<String> },
    Browser { url: Option<String> },
    /// A consent URI with an action this controller does not handle.
    Ignored,
}

pub fn is_event_url(url: &str) -> bool {
    url.starts_with("consent://")
}

/// Decode a surface event. Returns `None` for URLs outside the `consent` scheme.
pub fn parse_event(url: &str) -> Option<FormEvent> {
    if !is_event_url(url) {
        return None;
    }
    let Ok(parsed) = Url::parse(url) else {
        tracing::warn!(url, "Malformed consent event");
        return Some(FormEvent::Ignored);
    };

    let param = |name: &str| {
        parsed
            .query_pairs()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.into_owned())
    };

    let event = match param("action").as_deref() {
        Some("load_complete") => FormEvent::LoadComplete {
            status: param("status"),
        },
        Some("dismiss") => FormEvent::Dismiss {
            status: param("status"),
        },
        Some("browser") => FormEvent::Browser { url: param("url") },
        _ => FormEvent::Ignored,
    };
    Some(event)
}

/// Build an event URI, escaping parameter values. Used by surface
/// implementations that originate events themselves.
pub fn event_url(action: &str, params: &[(&str, &str)]) -> String {
    let mut url = String::from("consent://consent/");
    if let Ok(mut parsed) = Url::parse(&url) {
        parsed
            .query_pairs_mut()
            .append_pair("action", action)
            .extend_pairs(params.iter().copied());
        url = parsed.into();
    }
    url
}

/// Error tokens are free-form; anything mentioning "Error" counts as one.
pub fn signals_error(status: &str) -> bool {
    status.contains("Error")
}

/// Everything the form content needs to render itself.
#[derive(Debug, Serialize)]
pub struct FormInfo<'a> {
    pub app_name: &'a str,
    pub offer_personalized: bool,
    pub offer_non_personalized: bool,
    pub offer_ad_free: bool,
    pub is_request_in_eea_or_unknown: bool,
    pub app_privacy_url: &'a str,
    pub plat: &'a str,
    pub consent_info: &'a ConsentData,
}

pub fn setup_command(info: &FormInfo<'_>) -> Result<String> {
    let info_json = serde_json::to_string(info)?;
    let args = serde_json::json!({ "args": { "info": info_json } });
    Ok(format!("javascript:setUpConsentDialog({args})"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_load_complete() {
        let event = parse_event("consent://consent/?action=load_complete&status=form_loaded");
        assert_eq!(
            event,
            Some(FormEvent::LoadComplete {
                status: Some("form_loaded".into())
            })
        );
    }

    #[test]
    fn test_parse_dismiss_without_status() {
        assert_eq!(
            parse_event("consent://consent/?action=dismiss"),
            Some(FormEvent::Dismiss { status: None })
        );
    }

    #[test]
    fn test_parse_browser_unescapes_url() {
        let event = parse_event(
            "consent://consent/?action=browser&url=https%3A%2F%2Fexample.com%2Fprivacy%3Fa%3D1",
        );
        assert_eq!(
            event,
            Some(FormEvent::Browser {
                url: Some("https://example.com/privacy?a=1".into())
            })
        );
    }

    #[test]
    fn test_unknown_action_is_ignored() {
        assert_eq!(
            parse_event("consent://consent/?action=resize&height=10"),
            Some(FormEvent::Ignored)
        );
        assert_eq!(parse_event("consent://consent/"), Some(FormEvent::Ignored));
    }

    #[test]
    fn test_other_schemes_are_not_events() {
        assert_eq!(parse_event("https://example.com/?action=dismiss"), None);
        assert_eq!(parse_event(""), None);
    }

    #[test]
    fn test_event_url_round_trips_through_parse() {
        let url = event_url("browser", &[("url", "https://example.com/a b?c=d&e")]);
        assert_eq!(
            parse_event(&url),
            Some(FormEvent::Browser {
                url: Some("https://example.com/a b?c=d&e".into())
            })
        );
    }

    #[test]
    fn test_signals_error() {
        assert!(signals_error("Error: network"));
        assert!(signals_error("LoadError"));
        assert!(!signals_error("personalized"));
    }

    #[test]
    fn test_setup_command_wraps_info_as_string() {
        let data = ConsentData::default();
        let info = FormInfo {
            app_name: "Demo",
            offer_personalized: true,
            offer_non_personalized: true,
            offer_ad_free: false,
            is_request_in_eea_or_unknown: true,
            app_privacy_url: "https://example.com/privacy",
            plat: &data.sdk_platform,
            consent_info: &data,
        };
        let command = setup_command(&info).unwrap();

        let args = command
            .strip_prefix("javascript:setUpConsentDialog(")
            .and_then(|s| s.strip_suffix(')'))
            .unwrap();
        let args: serde_json::Value = serde_json::from_str(args).unwrap();
        let inner: serde_json::Value =
            serde_json::from_str(args["args"]["info"].as_str().unwrap()).unwrap();
        assert_eq!(inner["app_name"], "Demo");
        assert_eq!(inner["offer_ad_free"], false);
        assert_eq!(inner["app_privacy_url"], "https://example.com/privacy");
        assert_eq!(inner["consent_info"]["consent_state"], "unknown");
    }
}
