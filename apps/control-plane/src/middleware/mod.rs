// [apps/control-plane/src/middleware/mod.rs]
pub mod auth;

pub use auth::{device_auth_guard, DeviceIdentity};
