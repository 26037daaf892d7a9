//! Device-inspection capabilities consumed by the collector.
//!
//! Each external collaborator is a trait so the probes can run against the
//! real host ([`host`]) or against scripted doubles in tests.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::ProbeError;

pub mod host;
#[cfg(test)]
pub mod mock;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Os {
    Ios,
    Android,
    Macos,
    Linux,
    Windows,
    Other,
}

impl Os {
    pub fn current() -> Self {
        match std::env::consts::OS {
            "ios" => Os::Ios,
            "android" => Os::Android,
            "macos" => Os::Macos,
            "linux" => Os::Linux,
            "windows" => Os::Windows,
            _ => Os::Other,
        }
    }

    /// Apple platforms expose a keychain-backed secure store instead of a disk-encryption flag.
    pub fn is_apple(self) -> bool {
        matches!(self, Os::Ios | Os::Macos)
    }

    pub fn icon(self) -> &'static str {
        match self {
            Os::Ios | Os::Macos => "🍎",
            Os::Android => "🤖",
            Os::Linux => "🐧",
            Os::Windows => "🪟",
            Os::Other => "💻",
        }
    }
}

impl fmt::Display for Os {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Os::Ios => "iOS",
            Os::Android => "Android",
            Os::Macos => "macOS",
            Os::Linux => "Linux",
            Os::Windows => "Windows",
            Os::Other => "Unknown OS",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct NetworkState {
    pub internet_reachable: bool,
    pub connection_is_secure: bool,
}

#[async_trait]
pub trait BiometricApi: Send + Sync {
    /// Whether biometric hardware is present.
    async fn has_hardware(&self) -> Result<bool, ProbeError>;
    /// Whether at least one biometric is enrolled.
    async fn is_enrolled(&self) -> Result<bool, ProbeError>;
}

/// Physical-vs-emulator flag. The platform always answers this one.
#[async_trait]
pub trait DeviceInfoApi: Send + Sync {
    async fn is_physical_device(&self) -> bool;
}

/// Storage encryption status. Implementations are mutually exclusive per OS,
/// see [`encryption_for`].
#[async_trait]
pub trait EncryptionApi: Send + Sync {
    /// Short name of the underlying platform check, for logs.
    fn kind(&self) -> &'static str;
    async fn is_encrypted(&self) -> Result<bool, ProbeError>;
}

#[async_trait]
pub trait NetworkApi: Send + Sync {
    async fn network_state(&self) -> Result<NetworkState, ProbeError>;
}

/// The set of capabilities the collector probes, chosen once at startup.
#[derive(Clone)]
pub struct Platform {
    pub os: Os,
    pub biometric: Arc<dyn BiometricApi>,
    pub device: Arc<dyn DeviceInfoApi>,
    pub encryption: Arc<dyn EncryptionApi>,
    pub network: Arc<dyn NetworkApi>,
}

impl Platform {
    /// Real probes for the machine we run on. `os` picks the encryption
    /// capability and the OS tooling each probe calls.
    pub fn host(os: Os, reachability_host: &str) -> Self {
        Self {
            os,
            biometric: Arc::new(host::HostBiometric::new(os)),
            device: Arc::new(host::HostDeviceInfo::new(os)),
            encryption: encryption_for(os),
            network: Arc::new(host::HostNetwork::new(os, reachability_host)),
        }
    }
}

impl fmt::Debug for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Platform").field("os", &self.os).finish_non_exhaustive()
    }
}

/// Selects the encryption capability for `os`: secure-store availability on
/// Apple platforms, the disk-encryption flag everywhere else.
pub fn encryption_for(os: Os) -> Arc<dyn EncryptionApi> {
    if os.is_apple() {
        Arc::new(host::SecureStoreEncryption)
    } else {
        Arc::new(host::DiskEncryption::new(os))
    }
}
