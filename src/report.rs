use std::fmt;

use serde::Serialize;

/// One device-security dimension shown on the screen, in display order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Signal {
    DeveloperMode,
    SecureLock,
    Rooted,
    Encryption,
    Network,
}

impl Signal {
    pub const ALL: [Signal; 5] = [
        Signal::DeveloperMode,
        Signal::SecureLock,
        Signal::Rooted,
        Signal::Encryption,
        Signal::Network,
    ];

    pub fn title(self) -> &'static str {
        match self {
            Signal::DeveloperMode => "Developer Mode",
            Signal::SecureLock => "Secure Lock",
            Signal::Rooted => "Device Rooted",
            Signal::Encryption => "Encryption",
            Signal::Network => "Network Security",
        }
    }

    /// True when a raised flag is the bad outcome.
    pub fn inverted(self) -> bool {
        matches!(self, Signal::DeveloperMode | Signal::Rooted)
    }

    /// Maps the raw platform flag to a state, honouring polarity.
    pub fn classify(self, flag: bool) -> SignalState {
        if flag != self.inverted() {
            SignalState::Secure
        } else {
            SignalState::Insecure
        }
    }

    /// Whether the row opens a remediation popup when tapped.
    pub fn tappable(self) -> bool {
        matches!(
            self,
            Signal::DeveloperMode | Signal::SecureLock | Signal::Rooted
        )
    }

    fn flag_words(self) -> (&'static str, &'static str) {
        match self {
            Signal::DeveloperMode | Signal::SecureLock | Signal::Encryption => ("Enabled", "Disabled"),
            Signal::Rooted => ("Yes", "No"),
            Signal::Network => ("Secure", "Not Secure"),
        }
    }

    pub fn icon(self) -> &'static str {
        match self {
            Signal::DeveloperMode => "🛠",
            Signal::SecureLock => "🔒",
            Signal::Rooted => "#",
            Signal::Encryption => "🛡",
            Signal::Network => "🌐",
        }
    }
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.title())
    }
}

/// Outcome of one signal. `Checking` and `Unknown` are never shown as a verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalState {
    /// Probe still in flight.
    Checking,
    Secure,
    Insecure,
    /// Probe failed or timed out.
    Unknown,
}

impl SignalState {
    pub fn is_resolved(self) -> bool {
        self != SignalState::Checking
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Tone {
    Green,
    Red,
    Grey,
}

impl From<SignalState> for Tone {
    fn from(state: SignalState) -> Self {
        match state {
            SignalState::Secure => Tone::Green,
            SignalState::Insecure => Tone::Red,
            SignalState::Checking | SignalState::Unknown => Tone::Grey,
        }
    }
}

/// A rendered row: what the screen (or the console report) shows for a signal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Indicator {
    pub signal: Signal,
    pub state: SignalState,
    pub tone: Tone,
    pub label: String,
    pub tappable: bool,
}

impl Indicator {
    pub fn new(signal: Signal, state: SignalState) -> Self {
        Self {
            signal,
            state,
            tone: state.into(),
            label: label(signal, state),
            tappable: signal.tappable(),
        }
    }
}

pub fn label(signal: Signal, state: SignalState) -> String {
    let (raised, lowered) = signal.flag_words();
    let value = match state {
        SignalState::Checking => "Checking...",
        SignalState::Unknown => "Unknown",
        // Secure means "flag raised" unless the polarity is inverted.
        SignalState::Secure if signal.inverted() => lowered,
        SignalState::Secure => raised,
        SignalState::Insecure if signal.inverted() => raised,
        SignalState::Insecure => lowered,
    };
    format!("{}: {}", signal.title(), value)
}

/// Current state of every signal on the screen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceSignals {
    pub developer_mode: SignalState,
    pub secure_lock: SignalState,
    pub rooted: SignalState,
    pub encryption: SignalState,
    pub network: SignalState,
}

impl DeviceSignals {
    /// Fresh screen state: developer mode comes from the build flag, the
    /// probed signals are still being checked.
    pub fn new(developer_mode: bool) -> Self {
        Self {
            developer_mode: Signal::DeveloperMode.classify(developer_mode),
            secure_lock: SignalState::Checking,
            rooted: SignalState::Checking,
            encryption: SignalState::Checking,
            network: SignalState::Checking,
        }
    }

    pub fn get(&self, signal: Signal) -> SignalState {
        match signal {
            Signal::DeveloperMode => self.developer_mode,
            Signal::SecureLock => self.secure_lock,
            Signal::Rooted => self.rooted,
            Signal::Encryption => self.encryption,
            Signal::Network => self.network,
        }
    }

    fn slot(&mut self, signal: Signal) -> &mut SignalState {
        match signal {
            Signal::DeveloperMode => &mut self.developer_mode,
            Signal::SecureLock => &mut self.secure_lock,
            Signal::Rooted => &mut self.rooted,
            Signal::Encryption => &mut self.encryption,
            Signal::Network => &mut self.network,
        }
    }

    /// Records a probe result. A signal is written at most once; returns
    /// false if it was already resolved.
    pub fn resolve(&mut self, signal: Signal, state: SignalState) -> bool {
        let slot = self.slot(signal);
        if slot.is_resolved() {
            return false;
        }
        *slot = state;
        true
    }

    /// Marks every signal still being checked as `Unknown`. Returns how many changed.
    pub fn fail_unresolved(&mut self) -> usize {
        let mut failed = 0;
        for signal in Signal::ALL {
            if self.resolve(signal, SignalState::Unknown) {
                failed += 1;
            }
        }
        failed
    }

    pub fn all_resolved(&self) -> bool {
        Signal::ALL.iter().all(|s| self.get(*s).is_resolved())
    }

    pub fn indicators(&self) -> Vec<Indicator> {
        Signal::ALL
            .iter()
            .map(|s| Indicator::new(*s, self.get(*s)))
            .collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    Secure,
    Insecure,
    Incomplete,
}

pub fn verdict(indicators: &[Indicator]) -> Verdict {
    if indicators.iter().any(|i| i.state == SignalState::Insecure) {
        Verdict::Insecure
    } else if indicators.iter().all(|i| i.state == SignalState::Secure) {
        Verdict::Secure
    } else {
        Verdict::Incomplete
    }
}

#[derive(Serialize)]
struct JsonReport<'a> {
    os: String,
    verdict: Verdict,
    indicators: &'a [Indicator],
}

pub fn to_json(os: &str, indicators: &[Indicator]) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(&JsonReport {
        os: os.to_string(),
        verdict: verdict(indicators),
        indicators,
    })
}

pub fn render_summary(indicators: &[Indicator]) -> String {
    let mut out = String::new();
    for i in indicators {
        let line = match i.tone {
            Tone::Green => format!("\x1b[32m[✔] {}\x1b[0m\n", i.label),
            Tone::Red => format!("\x1b[31m[✘] {}\x1b[0m\n", i.label),
            Tone::Grey => format!("\x1b[90m[?] {}\x1b[0m\n", i.label),
        };
        out.push_str(&line);
    }

    out.push_str("--------------------------------------\n");
    match verdict(indicators) {
        Verdict::Secure => out.push_str("\x1b[32mDevice is SECURE.\x1b[0m\n"),
        Verdict::Insecure => out.push_str("\x1b[31mDevice is NOT secure.\x1b[0m\n"),
        Verdict::Incomplete => {
            let unknown = indicators.iter().filter(|i| i.tone == Tone::Grey).count();
            out.push_str(&format!(
                "\x1b[90mNo issues found, but {unknown} check(s) could not be completed.\x1b[0m\n"
            ));
        }
    }
    out
}

pub fn print_summary(indicators: &[Indicator]) {
    print!("{}", render_summary(indicators));
}
