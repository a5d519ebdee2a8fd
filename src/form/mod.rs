pub mod protocol;
pub mod surface;

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use reqwest::Url;
use thiserror::Error;

use crate::config::CONSENT_FORM_RESOURCE;
use crate::consent::{ConsentInformation, ConsentSource, ConsentStatus};
use crate::error::{ConsentError, Result};
use protocol::{FormEvent, FormInfo};

pub use surface::PresentationSurface;

/// Reasons handed to [`ConsentFormListener::on_consent_form_error`].
#[derive(Debug, Error)]
pub enum FormError {
    #[error("Cannot simultaneously load multiple consent forms.")]
    AlreadyLoading,

    #[error("No information")]
    NoLoadStatus,

    #[error("{0}")]
    Reported(String),

    #[error("Consent form is not ready to be displayed.")]
    NotReady,

    #[error("Error: tagged for under age of consent")]
    UnderAgeOfConsent,

    #[error("Consent form could not be displayed.")]
    CouldNotDisplay,

    #[error("No information provided.")]
    NoDismissStatus,

    #[error("No valid URL for browser navigation.")]
    NoBrowserUrl,

    #[error("No handler found for browser navigation.")]
    NoBrowserHandler,

    #[error("{0}")]
    Consent(#[from] ConsentError),
}

pub trait ConsentFormListener: Send + Sync {
    fn on_consent_form_loaded(&self);
    fn on_consent_form_error(&self, reason: &str);
    fn on_consent_form_opened(&self);
    fn on_consent_form_closed(&self, status: ConsentStatus, user_prefers_ad_free: bool);
}

/// Stands in when the host registers no listener.
struct LoggingListener;

impl ConsentFormListener for LoggingListener {
    fn on_consent_form_loaded(&self) {
        tracing::info!("Consent form loaded");
    }

    fn on_consent_form_error(&self, reason: &str) {
        tracing::warn!("Consent form error: {reason}");
    }

    fn on_consent_form_opened(&self) {
        tracing::info!("Consent form opened");
    }

    fn on_consent_form_closed(&self, status: ConsentStatus, user_prefers_ad_free: bool) {
        tracing::info!(%status, user_prefers_ad_free, "Consent form closed");
    }
}

/// Which choices the form offers and who hears about it.
#[derive(Clone, Default)]
pub struct ConsentFormOptions {
    pub listener: Option<Arc<dyn ConsentFormListener>>,
    pub personalized_option: bool,
    pub non_personalized_option: bool,
    pub ad_free_option: bool,
    /// Shown in the form header.
    pub app_name: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadState {
    NotReady,
    Loading,
    Loaded,
}

struct FormState {
    load_state: LoadState,
    /// Set while the surface is navigating because of one of our own events,
    /// so the page-finished notification does not re-send the setup command.
    internal_redirect: bool,
}

/// Drives a [`PresentationSurface`] through load, show and dismiss, and
/// commits the user's choice to [`ConsentInformation`].
///
/// The state lock is never held while calling the surface, the listener or the
/// consent manager, so any of them may call back into the form.
pub struct ConsentForm {
    information: Arc<ConsentInformation>,
    surface: Arc<dyn PresentationSurface>,
    listener: Arc<dyn ConsentFormListener>,
    personalized_option: bool,
    non_personalized_option: bool,
    ad_free_option: bool,
    app_name: String,
    app_privacy_url: Url,
    state: Mutex<FormState>,
}

impl ConsentForm {
    /// Fails when `app_privacy_url` is empty or not an absolute URL.
    pub fn new(
        information: Arc<ConsentInformation>,
        surface: Arc<dyn PresentationSurface>,
        app_privacy_url: &str,
        options: ConsentFormOptions,
    ) -> Result<Self> {
        if app_privacy_url.trim().is_empty() {
            return Err(ConsentError::InvalidPrivacyUrl("missing".into()));
        }
        let app_privacy_url = Url::parse(app_privacy_url)
            .map_err(|e| ConsentError::InvalidPrivacyUrl(format!("{app_privacy_url}: {e}")))?;

        Ok(Self {
            information,
            surface,
            listener: options.listener.unwrap_or_else(|| Arc::new(LoggingListener)),
            personalized_option: options.personalized_option,
            non_personalized_option: options.non_personalized_option,
            ad_free_option: options.ad_free_option,
            app_name: options.app_name,
            app_privacy_url,
            state: Mutex::new(FormState {
                load_state: LoadState::NotReady,
                internal_redirect: false,
            }),
        })
    }

    fn lock_state(&self) -> MutexGuard<'_, FormState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn set_load_state(&self, load_state: LoadState) {
        let mut state = self.lock_state();
        if state.load_state != load_state {
            tracing::debug!(from = ?state.load_state, to = ?load_state, "Consent form transition");
        }
        state.load_state = load_state;
    }

    fn fail(&self, error: FormError) {
        tracing::debug!("Consent form error: {error}");
        self.listener.on_consent_form_error(&error.to_string());
    }

    pub fn load_state(&self) -> LoadState {
        self.lock_state().load_state
    }

    pub fn is_showing(&self) -> bool {
        self.surface.is_showing()
    }

    pub fn load(&self) {
        let previous = {
            let mut state = self.lock_state();
            let previous = state.load_state;
            if previous == LoadState::NotReady {
                state.load_state = LoadState::Loading;
                state.internal_redirect = false;
            }
            previous
        };

        match previous {
            LoadState::Loading => self.fail(FormError::AlreadyLoading),
            LoadState::Loaded => self.listener.on_consent_form_loaded(),
            LoadState::NotReady => {
                tracing::debug!(resource = CONSENT_FORM_RESOURCE, "Loading consent form");
                self.surface.load(CONSENT_FORM_RESOURCE);
            }
        }
    }

    pub fn show(&self) {
        if self.load_state() != LoadState::Loaded {
            self.fail(FormError::NotReady);
            return;
        }

        match self.information.is_tagged_for_under_age_of_consent() {
            Ok(false) => {}
            Ok(true) => {
                self.fail(FormError::UnderAgeOfConsent);
                return;
            }
            Err(e) => {
                self.fail(e.into());
                return;
            }
        }

        if self.surface.show() {
            self.listener.on_consent_form_opened();
        } else {
            self.set_load_state(LoadState::NotReady);
            self.fail(FormError::CouldNotDisplay);
        }
    }

    /// Feed a URL observed by the surface. Returns true when it was a consent
    /// event and has been consumed.
    pub fn handle_url(&self, url: &str) -> bool {
        let Some(event) = protocol::parse_event(url) else {
            return false;
        };

        self.lock_state().internal_redirect = !matches!(event, FormEvent::Dismiss { .. });
        match event {
            FormEvent::LoadComplete { status } => self.handle_load_complete(status),
            FormEvent::Dismiss { status } => self.handle_dismiss(status),
            FormEvent::Browser { url } => self.handle_open_browser(url),
            FormEvent::Ignored => tracing::debug!(url, "Ignoring consent event"),
        }
        true
    }

    /// The surface finished loading a page.
    pub fn on_page_finished(&self) {
        if self.lock_state().internal_redirect {
            return;
        }
        match self.setup_command() {
            Ok(command) => self.surface.execute(&command),
            Err(e) => self.fail(e.into()),
        }
    }

    /// The surface failed to render its content.
    pub fn on_load_error(&self, reason: &str) {
        self.set_load_state(LoadState::NotReady);
        self.fail(FormError::Reported(reason.to_string()));
    }

    fn setup_command(&self) -> Result<String> {
        let data = self.information.load_consent_data()?;
        protocol::setup_command(&FormInfo {
            app_name: &self.app_name,
            offer_personalized: self.personalized_option,
            offer_non_personalized: self.non_personalized_option,
            offer_ad_free: self.ad_free_option,
            is_request_in_eea_or_unknown: data.is_request_in_eea_or_unknown,
            app_privacy_url: self.app_privacy_url.as_str(),
            plat: &data.sdk_platform,
            consent_info: &data,
        })
    }

    fn handle_load_complete(&self, status: Option<String>) {
        match status.filter(|s| !s.is_empty()) {
            None => {
                self.set_load_state(LoadState::NotReady);
                self.fail(FormError::NoLoadStatus);
            }
            Some(status) if protocol::signals_error(&status) => {
                self.set_load_state(LoadState::NotReady);
                self.fail(FormError::Reported(status));
            }
            Some(_) => {
                self.set_load_state(LoadState::Loaded);
                self.listener.on_consent_form_loaded();
            }
        }
    }

    fn handle_dismiss(&self, status: Option<String>) {
        self.set_load_state(LoadState::NotReady);
        self.surface.dismiss();

        let Some(status) = status.filter(|s| !s.is_empty()) else {
            self.fail(FormError::NoDismissStatus);
            return;
        };
        if protocol::signals_error(&status) {
            self.fail(FormError::Reported(status));
            return;
        }

        let (consent_status, user_prefers_ad_free) = match status.as_str() {
            "personalized" => (ConsentStatus::Personalized, false),
            "non_personalized" => (ConsentStatus::NonPersonalized, false),
            "ad_free" => (ConsentStatus::Unknown, true),
            _ => (ConsentStatus::Unknown, false),
        };

        if let Err(e) = self
            .information
            .set_consent_status_with_source(consent_status, ConsentSource::Form)
        {
            self.fail(e.into());
            return;
        }
        self.listener
            .on_consent_form_closed(consent_status, user_prefers_ad_free);
    }

    fn handle_open_browser(&self, url: Option<String>) {
        let Some(url) = url.filter(|u| !u.is_empty()) else {
            self.fail(FormError::NoBrowserUrl);
            return;
        };
        if !self.surface.open_browser(&url) {
            self.fail(FormError::NoBrowserHandler);
        }
    }
}
