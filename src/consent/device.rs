use sha2::{Digest, Sha256};

/// Identity of the device the consent flow runs on.
pub trait DeviceInfo: Send + Sync {
    /// True when the device looks like an emulator or development host.
    fn is_emulator(&self) -> bool;
    /// Stable hashed identifier used to register test devices.
    fn hashed_device_id(&self) -> String;
}

/// Hash a raw device identifier; a missing identifier hashes as `"emulator"`.
pub fn hash_device_id(raw: Option<&str>) -> String {
    let source = raw.filter(|id| !id.is_empty()).unwrap_or("emulator");
    hex::encode_upper(Sha256::digest(source.as_bytes()))
}

/// The machine the CLI runs on, identified by its systemd machine id.
pub struct HostDevice {
    machine_id: Option<String>,
}

impl HostDevice {
    pub fn detect() -> Self {
        let machine_id = std::fs::read_to_string("/etc/machine-id")
            .ok()
            .map(|id| id.trim().to_string())
            .filter(|id| !id.is_empty());
        if machine_id.is_none() {
            tracing::debug!("No machine id available, treating host as emulator");
        }
        Self { machine_id }
    }
}

impl DeviceInfo for HostDevice {
    fn is_emulator(&self) -> bool {
        self.machine_id.is_none()
    }

    fn hashed_device_id(&self) -> String {
        hash_device_id(self.machine_id.as_deref())
    }
}

/// Fixed device identity, for hosts that compute their own.
#[derive(Debug, Clone)]
pub struct StaticDevice {
    pub hashed_id: String,
    pub emulator: bool,
}

impl DeviceInfo for StaticDevice {
    fn is_emulator(&self) -> bool {
        self.emulator
    }

    fn hashed_device_id(&self) -> String {
        self.hashed_id.clone()
    }
}
