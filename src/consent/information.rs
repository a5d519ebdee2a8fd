use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use reqwest::Url;
use tokio::task::JoinHandle;

use super::device::DeviceInfo;
use super::lookup;
use super::models::{AdProvider, ConsentData, ConsentSource, ConsentStatus, DebugGeography};
use super::transport::LookupTransport;
use crate::config::{CONSENT_DATA_KEY, LOOKUP_URL, SDK_PLATFORM, SDK_VERSION};
use crate::error::{ConsentError, Result};
use crate::store::PersistentStore;

/// Callbacks for [`ConsentInformation::request_consent_info_update_with_listener`].
pub trait ConsentInfoUpdateListener: Send + Sync {
    fn on_consent_info_updated(&self, status: ConsentStatus);
    fn on_failed_to_update_consent_info(&self, reason: &str);
}

/// Serializes the consent record to and from the persistent store.
struct RecordStore {
    store: Arc<dyn PersistentStore>,
}

impl RecordStore {
    fn load(&self) -> Result<ConsentData> {
        match self.store.get(CONSENT_DATA_KEY)? {
            Some(json) if !json.is_empty() => Ok(serde_json::from_str(&json)?),
            _ => Ok(ConsentData::default()),
        }
    }

    fn save(&self, data: &ConsentData) -> Result<()> {
        let json = serde_json::to_string(data)?;
        self.store.set(CONSENT_DATA_KEY, &json)
    }
}

/// Owner of the consent record and the lookup flow.
///
/// Construct one per process and share it (usually behind an `Arc`). Every
/// read-modify-persist sequence on the record runs while holding the record
/// lock, so concurrent callers only ever observe whole updates.
pub struct ConsentInformation {
    records: Mutex<RecordStore>,
    transport: Arc<dyn LookupTransport>,
    device: Arc<dyn DeviceInfo>,
    test_devices: Mutex<Vec<String>>,
    debug_geography: Mutex<DebugGeography>,
    lookup_url: String,
}

impl ConsentInformation {
    pub fn new(
        store: Arc<dyn PersistentStore>,
        transport: Arc<dyn LookupTransport>,
        device: Arc<dyn DeviceInfo>,
    ) -> Self {
        Self {
            records: Mutex::new(RecordStore { store }),
            transport,
            device,
            test_devices: Mutex::new(Vec::new()),
            debug_geography: Mutex::new(DebugGeography::Disabled),
            lookup_url: LOOKUP_URL.to_string(),
        }
    }

    /// Replace the default lookup endpoint.
    pub fn with_lookup_url(mut self, url: impl Into<String>) -> Self {
        self.lookup_url = url.into();
        self
    }

    fn lock_records(&self) -> MutexGuard<'_, RecordStore> {
        self.records.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn read<T>(&self, f: impl FnOnce(&ConsentData) -> T) -> Result<T> {
        let records = self.lock_records();
        let data = records.load()?;
        Ok(f(&data))
    }

    fn modify<T>(&self, f: impl FnOnce(&mut ConsentData) -> T) -> Result<T> {
        let records = self.lock_records();
        let mut data = records.load()?;
        let out = f(&mut data);
        records.save(&data)?;
        Ok(out)
    }

    // --- Test devices ---

    pub fn debug_geography(&self) -> DebugGeography {
        *self
            .debug_geography
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    pub fn set_debug_geography(&self, geography: DebugGeography) {
        *self
            .debug_geography
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = geography;
    }

    pub fn hashed_device_id(&self) -> String {
        self.device.hashed_device_id()
    }

    /// Register a device whose requests honour the debug geography.
    pub fn add_test_device(&self, hashed_device_id: impl Into<String>) {
        self.test_devices
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(hashed_device_id.into());
    }

    pub fn is_test_device(&self) -> bool {
        if self.device.is_emulator() {
            return true;
        }
        let hashed = self.device.hashed_device_id();
        self.test_devices
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(&hashed)
    }

    // --- Lookup ---

    /// Build the lookup URL for `publisher_ids` against `base_url`.
    pub fn lookup_url_for(&self, publisher_ids: &[String], base_url: &str) -> Result<Url> {
        if publisher_ids.is_empty() {
            return Err(ConsentError::NoPublisherIds);
        }

        let mut url =
            Url::parse(base_url).map_err(|e| ConsentError::InvalidUrl(format!("{base_url}: {e}")))?;
        {
            let mut query = url.query_pairs_mut();
            query
                .append_pair("pubs", &publisher_ids.join(","))
                .append_pair("es", "2")
                .append_pair("plat", SDK_PLATFORM)
                .append_pair("v", SDK_VERSION);

            let geography = self.debug_geography();
            if geography != DebugGeography::Disabled && self.is_test_device() {
                query.append_pair("debug_geo", &geography.code().to_string());
            }
        }
        Ok(url)
    }

    /// Fetch provider and region information from the default endpoint and
    /// merge it into the record. Resolves to the resulting consent status.
    pub async fn request_consent_info_update(
        &self,
        publisher_ids: &[String],
    ) -> Result<ConsentStatus> {
        let base_url = self.lookup_url.clone();
        self.request_consent_info_update_from(publisher_ids, &base_url)
            .await
    }

    pub async fn request_consent_info_update_from(
        &self,
        publisher_ids: &[String],
        base_url: &str,
    ) -> Result<ConsentStatus> {
        if self.is_test_device() {
            tracing::info!("This request is sent from a test device.");
        } else {
            tracing::info!(
                "Use add_test_device(\"{}\") to get test ads on this device.",
                self.device.hashed_device_id()
            );
        }

        let url = self.lookup_url_for(publisher_ids, base_url)?;
        tracing::debug!(%url, "Requesting consent info update");

        let body = self.transport.fetch(url.as_str()).await.inspect_err(|e| {
            tracing::warn!("Consent lookup failed: {e}");
        })?;

        self.update_consent_data(&body, publisher_ids)?;
        self.consent_status()
    }

    /// Spawn the lookup on the current tokio runtime and report through
    /// `listener`. The returned handle completes after the listener fired.
    ///
    /// # Panics
    ///
    /// Panics when called outside a tokio runtime.
    pub fn request_consent_info_update_with_listener(
        self: &Arc<Self>,
        publisher_ids: Vec<String>,
        listener: Arc<dyn ConsentInfoUpdateListener>,
    ) -> JoinHandle<()> {
        let this = Arc::clone(self);
        tokio::spawn(async move {
            match this.request_consent_info_update(&publisher_ids).await {
                Ok(status) => listener.on_consent_info_updated(status),
                Err(e) => listener.on_failed_to_update_consent_info(&e.to_string()),
            }
        })
    }

    /// Validate a raw lookup body and merge it into the persisted record.
    /// An invalid body leaves the record untouched.
    pub fn update_consent_data(&self, raw_response: &str, publisher_ids: &[String]) -> Result<()> {
        let response = lookup::parse(raw_response)?;
        lookup::validate(&response).inspect_err(|e| {
            tracing::warn!("Rejected lookup response: {e}");
        })?;

        self.modify(|data| {
            *data = lookup::merge(
                std::mem::take(data),
                &response,
                raw_response,
                publisher_ids,
            );
        })
    }

    // --- Record queries and mutations ---

    pub fn load_consent_data(&self) -> Result<ConsentData> {
        self.read(ConsentData::clone)
    }

    pub fn consent_status(&self) -> Result<ConsentStatus> {
        self.read(|data| data.consent_status)
    }

    /// Set the status on behalf of the host application.
    pub fn set_consent_status(&self, status: ConsentStatus) -> Result<()> {
        self.set_consent_status_with_source(status, ConsentSource::Programmatic)
    }

    pub fn set_consent_status_with_source(
        &self,
        status: ConsentStatus,
        source: ConsentSource,
    ) -> Result<()> {
        tracing::debug!(%status, %source, "Setting consent status");
        self.modify(|data| data.apply_status(status, source))
    }

    pub fn is_request_in_eea_or_unknown(&self) -> Result<bool> {
        self.read(|data| data.is_request_in_eea_or_unknown)
    }

    pub fn is_tagged_for_under_age_of_consent(&self) -> Result<bool> {
        self.read(|data| data.under_age_of_consent)
    }

    pub fn set_tag_for_under_age_of_consent(&self, under_age_of_consent: bool) -> Result<()> {
        self.modify(|data| data.under_age_of_consent = under_age_of_consent)
    }

    pub fn ad_providers(&self) -> Result<Vec<AdProvider>> {
        self.read(|data| data.ad_providers.iter().cloned().collect())
    }

    /// Drop the persisted record and forget all registered test devices.
    pub fn reset(&self) -> Result<()> {
        let records = self.lock_records();
        records.store.clear()?;
        self.test_devices
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
        tracing::info!("Consent information reset");
        Ok(())
    }
}
