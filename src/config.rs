use std::path::PathBuf;

use directories::ProjectDirs;

pub const LOOKUP_URL: &str = "https://adservice.google.com/getconfig/pubvendors";

/// Key under which the serialized consent record is persisted.
pub const CONSENT_DATA_KEY: &str = "consent_string";

pub const SDK_VERSION: &str = "1.0.8";
pub const SDK_PLATFORM: &str = "android";

/// Local content resource the presentation surface loads for the consent form.
pub const CONSENT_FORM_RESOURCE: &str = "file:///android_asset/Content/consentform.html";

pub fn project_dirs() -> anyhow::Result<ProjectDirs> {
    ProjectDirs::from("", "ad-consent", "ad-consent")
        .ok_or_else(|| anyhow::anyhow!("Could not determine home directory"))
}

pub fn store_path() -> anyhow::Result<PathBuf> {
    let dirs = project_dirs()?;
    let data_dir = dirs.data_dir();
    std::fs::create_dir_all(data_dir)?;
    Ok(data_dir.join("consent.db"))
}
