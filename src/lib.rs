//! Ad-personalization consent: regional provider lookup, the persisted consent
//! record, and the consent form lifecycle.

pub mod config;
pub mod consent;
pub mod error;
pub mod form;
pub mod store;

pub use consent::{
    AdProvider, ConsentData, ConsentInfoUpdateListener, ConsentInformation, ConsentSource,
    ConsentStatus, DebugGeography,
};
pub use error::{ConsentError, Result};
pub use form::{ConsentForm, ConsentFormListener, ConsentFormOptions, LoadState};
pub use store::{MemoryStore, PersistentStore, SqliteStore};
