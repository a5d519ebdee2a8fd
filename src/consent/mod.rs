pub mod device;
pub mod information;
pub mod lookup;
pub mod models;
pub mod transport;

pub use device::{DeviceInfo, HostDevice, StaticDevice};
pub use information::{ConsentInfoUpdateListener, ConsentInformation};
pub use models::{AdProvider, ConsentData, ConsentSource, ConsentStatus, DebugGeography};
pub use transport::{HttpTransport, LookupTransport};
