use crate::platform::Os;
use crate::report::Signal;

/// Manual fix instructions shown in a popup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Remediation {
    pub title: String,
    pub body: &'static str,
}

/// Instructions for `signal` on `os`, or `None` for display-only rows.
pub fn for_signal(signal: Signal, os: Os) -> Option<Remediation> {
    let body = match signal {
        Signal::DeveloperMode => developer_mode(os),
        Signal::SecureLock => secure_lock(os),
        Signal::Rooted => rooted(os),
        Signal::Encryption | Signal::Network => return None,
    };
    Some(Remediation {
        title: format!("{} Instructions", signal.title()),
        body,
    })
}

fn developer_mode(os: Os) -> &'static str {
    match os {
        Os::Ios => "To disable Developer Mode, go to Settings > Privacy & Security > Developer Mode and turn it off.",
        Os::Android => "To disable Developer Mode, go to Settings > Additional Settings > Developer options and turn it off.",
        _ => "This is a debug build. Install a release build to leave Developer Mode.",
    }
}

fn secure_lock(os: Os) -> &'static str {
    match os {
        Os::Ios => "To adjust lock screen settings, go to Settings > Face ID & Passcode or Touch ID & Passcode and configure your preferred options.",
        Os::Android => "To adjust lock screen settings, go to Settings > Security & Location and configure your preferred options.",
        Os::Macos => "To adjust lock screen settings, go to System Settings > Touch ID & Password and add a fingerprint.",
        Os::Windows => "To adjust lock screen settings, go to Settings > Accounts > Sign-in options and set up Windows Hello.",
        Os::Linux => "To adjust lock screen settings, enroll a fingerprint with `fprintd-enroll` or in your desktop's user settings.",
        Os::Other => "To adjust lock screen settings, enable biometric or passcode authentication in your system settings.",
    }
}

fn rooted(os: Os) -> &'static str {
    match os {
        Os::Ios | Os::Android => "Your device is rooted. This can compromise security.\n\nThis check only detects emulators: a physical device is always reported as not rooted.",
        _ => "This machine appears to be virtualized. This can compromise security.\n\nThis check only detects emulators and virtual machines, not privilege escalation.",
    }
}
