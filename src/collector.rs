//! Runs the platform probes behind the screen.
//!
//! Every probe is an independent task owned by a [`SignalCollector`]. The
//! tasks are aborted when the collector is dropped, so a probe that resolves
//! after the screen is gone never reaches any state.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TryRecvError;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use crate::error::ProbeError;
use crate::platform::{BiometricApi, DeviceInfoApi, EncryptionApi, NetworkApi, Platform};
use crate::report::{DeviceSignals, Signal, SignalState};

/// Called after every update is queued, e.g. to wake the UI.
pub type Notify = Arc<dyn Fn() + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProbeUpdate {
    pub signal: Signal,
    pub state: SignalState,
}

pub struct SignalCollector {
    tasks: JoinSet<()>,
    rx: mpsc::UnboundedReceiver<ProbeUpdate>,
    pending: usize,
}

impl SignalCollector {
    /// Dispatches the four probes on `runtime` without awaiting any of them.
    pub fn start(runtime: &Handle, platform: &Platform, timeout: Duration, notify: Notify) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut tasks = JoinSet::new();

        info!(
            "Probing device signals on {} (encryption via {})",
            platform.os,
            platform.encryption.kind()
        );

        let biometric = platform.biometric.clone();
        spawn_probe(&mut tasks, runtime, Signal::SecureLock, timeout, &tx, &notify, async move {
            probe_secure_lock(biometric.as_ref()).await
        });
        let device = platform.device.clone();
        spawn_probe(&mut tasks, runtime, Signal::Rooted, timeout, &tx, &notify, async move {
            probe_rooted(device.as_ref()).await
        });
        let encryption = platform.encryption.clone();
        spawn_probe(&mut tasks, runtime, Signal::Encryption, timeout, &tx, &notify, async move {
            probe_encryption(encryption.as_ref()).await
        });
        let network = platform.network.clone();
        spawn_probe(&mut tasks, runtime, Signal::Network, timeout, &tx, &notify, async move {
            probe_network(network.as_ref()).await
        });

        let pending = tasks.len();
        Self { tasks, rx, pending }
    }

    /// Next queued update, without waiting.
    pub fn try_next(&mut self) -> Option<ProbeUpdate> {
        match self.rx.try_recv() {
            Ok(update) => {
                self.pending = self.pending.saturating_sub(1);
                Some(update)
            }
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => {
                self.give_up();
                None
            }
        }
    }

    // Every sender is gone: probes that never reported won't anymore.
    fn give_up(&mut self) {
        if self.pending > 0 {
            warn!("{} probe(s) ended without a result", self.pending);
            self.pending = 0;
        }
    }

    /// Waits for the next update; `None` once every probe has reported.
    pub async fn next(&mut self) -> Option<ProbeUpdate> {
        if self.pending == 0 {
            return None;
        }
        match self.rx.recv().await {
            Some(update) => {
                self.pending -= 1;
                Some(update)
            }
            None => {
                self.give_up();
                None
            }
        }
    }

    /// Applies every queued update to `signals`. Returns how many were applied.
    pub fn drain_into(&mut self, signals: &mut DeviceSignals) -> usize {
        let mut applied = 0;
        while let Some(update) = self.try_next() {
            if signals.resolve(update.signal, update.state) {
                applied += 1;
            }
        }
        if self.is_finished() {
            signals.fail_unresolved();
        }
        applied
    }

    /// Waits for all probes and applies their results to `signals`.
    pub async fn collect(mut self, signals: &mut DeviceSignals) {
        while let Some(update) = self.next().await {
            signals.resolve(update.signal, update.state);
        }
        signals.fail_unresolved();
    }

    pub fn is_finished(&self) -> bool {
        self.pending == 0
    }
}

impl Drop for SignalCollector {
    fn drop(&mut self) {
        if self.pending > 0 {
            debug!("Cancelling {} outstanding probe(s)", self.pending);
        }
        self.tasks.abort_all();
    }
}

fn spawn_probe<F>(
    tasks: &mut JoinSet<()>,
    runtime: &Handle,
    signal: Signal,
    timeout: Duration,
    tx: &mpsc::UnboundedSender<ProbeUpdate>,
    notify: &Notify,
    probe: F,
) where
    F: Future<Output = SignalState> + Send + 'static,
{
    let tx = tx.clone();
    let notify = notify.clone();
    tasks.spawn_on(
        async move {
            let state = with_deadline(signal, timeout, probe).await;
            debug!("{signal} resolved to {state:?}");
            // The receiver only disappears with the collector, which aborts us first.
            if tx.send(ProbeUpdate { signal, state }).is_ok() {
                notify();
            }
        },
        runtime,
    );
}

async fn with_deadline<F>(signal: Signal, timeout: Duration, probe: F) -> SignalState
where
    F: Future<Output = SignalState>,
{
    match tokio::time::timeout(timeout, probe).await {
        Ok(state) => state,
        Err(_) => {
            warn!("{signal} probe: {}", ProbeError::TimedOut(timeout));
            SignalState::Unknown
        }
    }
}

/// Secure lock: biometric hardware present and at least one biometric enrolled.
pub async fn probe_secure_lock(api: &dyn BiometricApi) -> SignalState {
    let result = async {
        let has_hardware = api.has_hardware().await?;
        let is_enrolled = api.is_enrolled().await?;
        Ok::<_, ProbeError>(has_hardware && is_enrolled)
    }
    .await;
    match result {
        Ok(enabled) => Signal::SecureLock.classify(enabled),
        Err(e) => {
            error!("Error checking secure lock: {e}");
            SignalState::Unknown
        }
    }
}

/// Rooted heuristic: anything that is not a physical device counts as rooted.
pub async fn probe_rooted(api: &dyn DeviceInfoApi) -> SignalState {
    let is_emulator = !api.is_physical_device().await;
    Signal::Rooted.classify(is_emulator)
}

pub async fn probe_encryption(api: &dyn EncryptionApi) -> SignalState {
    match api.is_encrypted().await {
        Ok(encrypted) => Signal::Encryption.classify(encrypted),
        Err(e) => {
            error!("Error checking encryption ({}): {e}", api.kind());
            SignalState::Unknown
        }
    }
}

/// Secure network: internet reachable and the link reports a secure transport.
pub async fn probe_network(api: &dyn NetworkApi) -> SignalState {
    match api.network_state().await {
        Ok(state) => Signal::Network.classify(state.internet_reachable && state.connection_is_secure),
        Err(e) => {
            error!("Error checking network security: {e}");
            SignalState::Unknown
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::platform::mock::{
        MockBiometric, MockDeviceInfo, MockEncryption, MockNetwork, MockPlatform,
    };
    use crate::platform::Os;
    use crate::report::Tone;

    const TIMEOUT: Duration = Duration::from_secs(5);

    fn noop() -> Notify {
        Arc::new(|| {})
    }

    async fn run(mock: &MockPlatform) -> DeviceSignals {
        let mut signals = DeviceSignals::new(false);
        SignalCollector::start(&Handle::current(), &mock.build(), TIMEOUT, noop())
            .collect(&mut signals)
            .await;
        signals
    }

    #[tokio::test]
    async fn healthy_device_is_all_green() {
        let mock = MockPlatform::healthy(Os::Android);
        let signals = run(&mock).await;
        assert!(signals.all_resolved());
        assert!(signals.indicators().iter().all(|i| i.tone == Tone::Green));
    }

    #[tokio::test]
    async fn each_platform_call_is_made_once() {
        let mock = MockPlatform::healthy(Os::Ios);
        run(&mock).await;
        assert_eq!(mock.biometric.calls(), 2);
        assert_eq!(mock.device.calls(), 1);
        assert_eq!(mock.encryption.calls(), 1);
        assert_eq!(mock.network.calls(), 1);
    }

    #[tokio::test]
    async fn hardware_without_enrollment_disables_secure_lock() {
        let state = probe_secure_lock(&MockBiometric::new(true, false)).await;
        assert_eq!(state, SignalState::Insecure);

        let mut signals = DeviceSignals::new(false);
        signals.resolve(Signal::SecureLock, state);
        let row = &signals.indicators()[1];
        assert_eq!(row.tone, Tone::Red);
        assert_eq!(row.label, "Secure Lock: Disabled");
    }

    #[tokio::test]
    async fn biometric_failure_is_contained() {
        let api = MockBiometric::failing(ProbeError::Platform("LAErrorNotInteractive".into()));
        let state = probe_secure_lock(&api).await;
        assert_eq!(state, SignalState::Unknown);
        assert_ne!(state, SignalState::Secure);
        // enrollment is not queried after the hardware query rejects
        assert_eq!(api.calls(), 1);
    }

    #[tokio::test]
    async fn emulator_counts_as_rooted() {
        let mut mock = MockPlatform::healthy(Os::Android);
        mock.device = MockDeviceInfo::new(false);
        let signals = run(&mock).await;
        assert_eq!(signals.rooted, SignalState::Insecure);
        let row = &signals.indicators()[2];
        assert_eq!(row.tone, Tone::Red);
        assert_eq!(row.label, "Device Rooted: Yes");
        assert!(row.tappable);
    }

    #[tokio::test]
    async fn ios_secure_store_means_encrypted() {
        let mock = MockPlatform::healthy(Os::Ios);
        assert_eq!(mock.encryption.kind(), "secure-store");
        let signals = run(&mock).await;
        assert_eq!(signals.encryption, SignalState::Secure);
        assert_eq!(signals.indicators()[3].tone, Tone::Green);
    }

    #[tokio::test]
    async fn encryption_failure_is_unknown_not_disabled() {
        let state = probe_encryption(&MockEncryption::failing(ProbeError::Unavailable(
            "disk encryption query".into(),
        )))
        .await;
        assert_eq!(state, SignalState::Unknown);
    }

    #[tokio::test]
    async fn unreachable_network_is_never_secure() {
        for secure in [true, false] {
            let state = probe_network(&MockNetwork::new(false, secure)).await;
            assert_eq!(state, SignalState::Insecure);
        }
        assert_eq!(probe_network(&MockNetwork::new(true, false)).await, SignalState::Insecure);
        assert_eq!(probe_network(&MockNetwork::new(true, true)).await, SignalState::Secure);
        assert_eq!(
            probe_network(&MockNetwork::failing(ProbeError::Platform("offline".into()))).await,
            SignalState::Unknown
        );
    }

    #[tokio::test]
    async fn hung_probe_times_out_as_unknown() {
        let mut mock = MockPlatform::healthy(Os::Linux);
        mock.network = MockNetwork::new(true, true).with_delay(Duration::from_secs(30));
        let mut signals = DeviceSignals::new(false);
        SignalCollector::start(&Handle::current(), &mock.build(), Duration::from_millis(50), noop())
            .collect(&mut signals)
            .await;
        assert_eq!(signals.network, SignalState::Unknown);
        assert_eq!(signals.encryption, SignalState::Secure);
    }

    #[tokio::test]
    async fn probes_do_not_wait_for_each_other() {
        let mut mock = MockPlatform::healthy(Os::Linux);
        mock.biometric = MockBiometric::new(true, true).with_delay(Duration::from_millis(300));
        let mut collector =
            SignalCollector::start(&Handle::current(), &mock.build(), TIMEOUT, noop());
        let first = collector.next().await.unwrap();
        assert_ne!(first.signal, Signal::SecureLock);
    }

    #[tokio::test]
    async fn dropping_the_collector_cancels_late_results() {
        let delay = Duration::from_millis(50);
        let mut mock = MockPlatform::healthy(Os::Android);
        mock.biometric = MockBiometric::new(true, true).with_delay(delay);
        mock.device = MockDeviceInfo::new(true).with_delay(delay);
        mock.encryption = MockEncryption::disk(true).with_delay(delay);
        mock.network = MockNetwork::new(true, true).with_delay(delay);

        let notified = Arc::new(AtomicUsize::new(0));
        let counter = notified.clone();
        let collector = SignalCollector::start(
            &Handle::current(),
            &mock.build(),
            TIMEOUT,
            Arc::new(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            }),
        );
        drop(collector);

        tokio::time::sleep(delay * 4).await;
        assert_eq!(notified.load(Ordering::SeqCst), 0);
    }

    struct CrashingNetwork;

    #[async_trait::async_trait]
    impl NetworkApi for CrashingNetwork {
        async fn network_state(&self) -> Result<crate::platform::NetworkState, ProbeError> {
            panic!("network backend crashed");
        }
    }

    fn with_crashing_network() -> Platform {
        let mut platform = MockPlatform::healthy(Os::Linux).build();
        platform.network = Arc::new(CrashingNetwork);
        platform
    }

    #[tokio::test]
    async fn crashed_probe_resolves_to_unknown() {
        let mut signals = DeviceSignals::new(false);
        SignalCollector::start(&Handle::current(), &with_crashing_network(), TIMEOUT, noop())
            .collect(&mut signals)
            .await;
        assert!(signals.all_resolved());
        assert_eq!(signals.network, SignalState::Unknown);
        assert_eq!(signals.encryption, SignalState::Secure);
    }

    #[tokio::test]
    async fn crashed_probe_does_not_leave_the_screen_checking() {
        let mut collector =
            SignalCollector::start(&Handle::current(), &with_crashing_network(), TIMEOUT, noop());
        let mut signals = DeviceSignals::new(false);
        for _ in 0..1000 {
            collector.drain_into(&mut signals);
            if collector.is_finished() {
                break;
            }
            tokio::task::yield_now().await;
        }
        assert!(collector.is_finished());
        assert!(signals.all_resolved());
        assert_eq!(signals.network, SignalState::Unknown);
    }

    #[tokio::test]
    async fn drain_applies_what_has_arrived() {
        let mock = MockPlatform::healthy(Os::Android);
        let mut collector =
            SignalCollector::start(&Handle::current(), &mock.build(), TIMEOUT, noop());
        let mut signals = DeviceSignals::new(false);
        let mut applied = 0;
        while !collector.is_finished() {
            applied += collector.drain_into(&mut signals);
            tokio::task::yield_now().await;
        }
        assert_eq!(applied, 4);
        assert!(signals.all_resolved());
    }
}
