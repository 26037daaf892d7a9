//! Scripted capability doubles.
//!
//! Each mock answers with a fixed result, optionally after a delay, and counts
//! how often it was asked.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use super::{BiometricApi, DeviceInfoApi, EncryptionApi, NetworkApi, NetworkState, Os, Platform};
use crate::error::ProbeError;

async fn pause(delay: Option<Duration>) {
    if let Some(d) = delay {
        tokio::time::sleep(d).await;
    }
}

#[derive(Clone)]
pub struct MockBiometric {
    hardware: Result<bool, ProbeError>,
    enrolled: Result<bool, ProbeError>,
    delay: Option<Duration>,
    calls: Arc<AtomicUsize>,
}

impl MockBiometric {
    pub fn new(hardware: bool, enrolled: bool) -> Self {
        Self {
            hardware: Ok(hardware),
            enrolled: Ok(enrolled),
            delay: None,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// The hardware query rejects with `err`.
    pub fn failing(err: ProbeError) -> Self {
        Self {
            hardware: Err(err),
            ..Self::new(true, true)
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Number of platform calls made so far (hardware and enrollment queries both count).
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl BiometricApi for MockBiometric {
    async fn has_hardware(&self) -> Result<bool, ProbeError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        pause(self.delay).await;
        self.hardware.clone()
    }

    async fn is_enrolled(&self) -> Result<bool, ProbeError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.enrolled.clone()
    }
}

#[derive(Clone)]
pub struct MockDeviceInfo {
    physical: bool,
    delay: Option<Duration>,
    calls: Arc<AtomicUsize>,
}

impl MockDeviceInfo {
    pub fn new(physical: bool) -> Self {
        Self {
            physical,
            delay: None,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DeviceInfoApi for MockDeviceInfo {
    async fn is_physical_device(&self) -> bool {
        self.calls.fetch_add(1, Ordering::SeqCst);
        pause(self.delay).await;
        self.physical
    }
}

#[derive(Clone)]
pub struct MockEncryption {
    kind: &'static str,
    result: Result<bool, ProbeError>,
    delay: Option<Duration>,
    calls: Arc<AtomicUsize>,
}

impl MockEncryption {
    /// Secure-store availability, as answered on Apple platforms.
    pub fn secure_store(available: bool) -> Self {
        Self::with_kind("secure-store", Ok(available))
    }

    /// Disk-encryption flag, as answered everywhere else.
    pub fn disk(encrypted: bool) -> Self {
        Self::with_kind("disk-encryption", Ok(encrypted))
    }

    pub fn failing(err: ProbeError) -> Self {
        Self::with_kind("disk-encryption", Err(err))
    }

    fn with_kind(kind: &'static str, result: Result<bool, ProbeError>) -> Self {
        Self {
            kind,
            result,
            delay: None,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl EncryptionApi for MockEncryption {
    fn kind(&self) -> &'static str {
        self.kind
    }

    async fn is_encrypted(&self) -> Result<bool, ProbeError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        pause(self.delay).await;
        self.result.clone()
    }
}

#[derive(Clone)]
pub struct MockNetwork {
    result: Result<NetworkState, ProbeError>,
    delay: Option<Duration>,
    calls: Arc<AtomicUsize>,
}

impl MockNetwork {
    pub fn new(internet_reachable: bool, connection_is_secure: bool) -> Self {
        Self {
            result: Ok(NetworkState {
                internet_reachable,
                connection_is_secure,
            }),
            delay: None,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn failing(err: ProbeError) -> Self {
        Self {
            result: Err(err),
            ..Self::new(false, false)
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl NetworkApi for MockNetwork {
    async fn network_state(&self) -> Result<NetworkState, ProbeError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        pause(self.delay).await;
        self.result.clone()
    }
}

/// Assembles a [`Platform`] from individual mocks.
pub struct MockPlatform {
    pub os: Os,
    pub biometric: MockBiometric,
    pub device: MockDeviceInfo,
    pub encryption: MockEncryption,
    pub network: MockNetwork,
}

impl MockPlatform {
    /// Every probe answers favourably.
    pub fn healthy(os: Os) -> Self {
        let encryption = if os.is_apple() {
            MockEncryption::secure_store(true)
        } else {
            MockEncryption::disk(true)
        };
        Self {
            os,
            biometric: MockBiometric::new(true, true),
            device: MockDeviceInfo::new(true),
            encryption,
            network: MockNetwork::new(true, true),
        }
    }

    pub fn build(&self) -> Platform {
        Platform {
            os: self.os,
            biometric: Arc::new(self.biometric.clone()),
            device: Arc::new(self.device.clone()),
            encryption: Arc::new(self.encryption.clone()),
            network: Arc::new(self.network.clone()),
        }
    }
}
