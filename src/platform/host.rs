//! Probes against the machine the binary runs on, using the OS's own tooling.

use std::time::Duration;

use async_trait::async_trait;
use tokio::net::TcpStream;
use tokio::process::Command;
use tracing::debug;

use super::{BiometricApi, DeviceInfoApi, EncryptionApi, NetworkApi, NetworkState, Os};
use crate::error::ProbeError;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(3);

// -- Utility: run a program, return trimmed stdout --
async fn run(program: &str, args: &[&str]) -> Result<String, ProbeError> {
    let output = Command::new(program)
        .args(args)
        .kill_on_drop(true)
        .output()
        .await
        .map_err(|e| ProbeError::Command {
            program: program.to_string(),
            reason: e.to_string(),
        })?;
    if !output.status.success() {
        return Err(ProbeError::Command {
            program: program.to_string(),
            reason: format!(
                "exit status {}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            ),
        });
    }
    Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
}

// Some tools (systemd-detect-virt) report their answer through a non-zero exit.
async fn run_any_status(program: &str, args: &[&str]) -> Result<String, ProbeError> {
    let output = Command::new(program)
        .args(args)
        .kill_on_drop(true)
        .output()
        .await
        .map_err(|e| ProbeError::Command {
            program: program.to_string(),
            reason: e.to_string(),
        })?;
    Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
}

async fn run_powershell(script: &str) -> Result<String, ProbeError> {
    run("powershell", &["-NoLogo", "-NoProfile", "-Command", script]).await
}

async fn getprop(name: &str) -> Result<String, ProbeError> {
    run("getprop", &[name]).await
}

fn unavailable(what: &str, os: Os) -> ProbeError {
    ProbeError::Unavailable(format!("{what} on {os}"))
}

// ========== Biometrics ==========

pub struct HostBiometric {
    os: Os,
}

impl HostBiometric {
    pub fn new(os: Os) -> Self {
        Self { os }
    }
}

#[async_trait]
impl BiometricApi for HostBiometric {
    async fn has_hardware(&self) -> Result<bool, ProbeError> {
        match self.os {
            Os::Linux => {
                let user = current_user();
                let out = run("fprintd-list", &[user.as_str()]).await?;
                Ok(fprintd_has_device(&out))
            }
            Os::Macos => Ok(run("bioutil", &["-r"]).await.is_ok()),
            Os::Windows => {
                let out = run_powershell(
                    "Get-PnpDevice -Class Biometric -Status OK -ErrorAction SilentlyContinue | Select-Object -ExpandProperty FriendlyName",
                )
                .await?;
                Ok(!out.is_empty())
            }
            Os::Android => {
                let out = run("pm", &["list", "features"]).await?;
                Ok(out.lines().any(|l| {
                    l.trim() == "feature:android.hardware.fingerprint"
                        || l.trim() == "feature:android.hardware.biometrics.face"
                }))
            }
            os => Err(unavailable("biometric query", os)),
        }
    }

    async fn is_enrolled(&self) -> Result<bool, ProbeError> {
        match self.os {
            Os::Linux => {
                let user = current_user();
                let out = run("fprintd-list", &[user.as_str()]).await?;
                Ok(fprintd_enrolled(&out))
            }
            Os::Macos => {
                let out = run("bioutil", &["-c"]).await?;
                Ok(bioutil_template_count(&out) > 0)
            }
            Os::Windows => {
                let out = run_powershell(
                    "Get-ChildItem 'HKLM:\\SOFTWARE\\Microsoft\\Windows\\CurrentVersion\\WinBio\\AccountInfo' -ErrorAction SilentlyContinue | Measure-Object | Select-Object -ExpandProperty Count",
                )
                .await?;
                Ok(parse_count(&out)? > 0)
            }
            os => Err(unavailable("biometric enrollment query", os)),
        }
    }
}

fn parse_count(out: &str) -> Result<u32, ProbeError> {
    out.trim()
        .parse::<u32>()
        .map_err(|_| ProbeError::Platform(format!("unexpected count {out:?}")))
}

fn current_user() -> String {
    std::env::var("USER")
        .or_else(|_| std::env::var("USERNAME"))
        .unwrap_or_default()
}

fn fprintd_has_device(out: &str) -> bool {
    !out.contains("No devices available")
}

fn fprintd_enrolled(out: &str) -> bool {
    out.lines().any(|l| l.trim_start().starts_with("- #"))
}

/// `bioutil -c` prints e.g. "User 501:\t2 biometric template(s)".
fn bioutil_template_count(out: &str) -> u32 {
    out.lines()
        .filter(|l| l.contains("biometric template"))
        .filter_map(|l| {
            let before = l.split("biometric template").next()?;
            before.split_whitespace().last()?.parse::<u32>().ok()
        })
        .sum()
}

// ========== Device physicality ==========

pub struct HostDeviceInfo {
    os: Os,
}

impl HostDeviceInfo {
    pub fn new(os: Os) -> Self {
        Self { os }
    }
}

#[async_trait]
impl DeviceInfoApi for HostDeviceInfo {
    async fn is_physical_device(&self) -> bool {
        let virtual_hint = match self.os {
            Os::Linux => run_any_status("systemd-detect-virt", &[])
                .await
                .map(|out| detect_virt_is_virtual(&out)),
            Os::Macos => run("sysctl", &["-n", "kern.hv_vmm_present"])
                .await
                .map(|out| out == "1"),
            Os::Windows => run_powershell("(Get-CimInstance Win32_ComputerSystem).Model")
                .await
                .map(|out| model_is_virtual(&out)),
            Os::Android => getprop("ro.kernel.qemu").await.map(|out| out == "1"),
            os => Err(unavailable("virtualization query", os)),
        };
        match virtual_hint {
            Ok(is_virtual) => !is_virtual,
            Err(e) => {
                // Nothing to go on: report a physical device.
                debug!("Virtualization check inconclusive: {e}");
                true
            }
        }
    }
}

fn detect_virt_is_virtual(out: &str) -> bool {
    let out = out.trim();
    !out.is_empty() && out != "none"
}

fn model_is_virtual(model: &str) -> bool {
    const MARKERS: &[&str] = &["Virtual", "VMware", "VirtualBox", "KVM", "QEMU", "HVM domU"];
    MARKERS.iter().any(|m| model.contains(m))
}

// ========== Encryption ==========

/// Apple platforms: the keychain-backed secure store is available.
pub struct SecureStoreEncryption;

#[async_trait]
impl EncryptionApi for SecureStoreEncryption {
    fn kind(&self) -> &'static str {
        "secure-store"
    }

    async fn is_encrypted(&self) -> Result<bool, ProbeError> {
        let out = run("security", &["default-keychain"]).await?;
        Ok(!out.is_empty())
    }
}

/// Everything else: the OS reports its system volume as encrypted.
pub struct DiskEncryption {
    os: Os,
}

impl DiskEncryption {
    pub fn new(os: Os) -> Self {
        Self { os }
    }
}

#[async_trait]
impl EncryptionApi for DiskEncryption {
    fn kind(&self) -> &'static str {
        "disk-encryption"
    }

    async fn is_encrypted(&self) -> Result<bool, ProbeError> {
        match self.os {
            Os::Linux => {
                let out = run("lsblk", &["-rno", "TYPE"]).await?;
                Ok(out.lines().any(|t| t.trim() == "crypt"))
            }
            Os::Windows => {
                let out = run("manage-bde", &["-status", "C:"]).await?;
                Ok(out.contains("Percentage Encrypted: 100%"))
            }
            Os::Macos => {
                let out = run("fdesetup", &["status"]).await?;
                Ok(out.contains("FileVault is On"))
            }
            Os::Android => Ok(getprop("ro.crypto.state").await? == "encrypted"),
            os => Err(unavailable("disk encryption query", os)),
        }
    }
}

// ========== Network ==========

pub struct HostNetwork {
    os: Os,
    reachability_host: String,
}

impl HostNetwork {
    pub fn new(os: Os, reachability_host: &str) -> Self {
        Self {
            os,
            reachability_host: reachability_host.to_string(),
        }
    }

    async fn internet_reachable(&self) -> bool {
        match tokio::time::timeout(CONNECT_TIMEOUT, TcpStream::connect(&self.reachability_host)).await {
            Ok(Ok(_)) => true,
            Ok(Err(e)) => {
                debug!("{} unreachable: {e}", self.reachability_host);
                false
            }
            Err(_) => {
                debug!("{} unreachable: connect timed out", self.reachability_host);
                false
            }
        }
    }
}

#[async_trait]
impl NetworkApi for HostNetwork {
    async fn network_state(&self) -> Result<NetworkState, ProbeError> {
        if !self.internet_reachable().await {
            return Ok(NetworkState {
                internet_reachable: false,
                connection_is_secure: false,
            });
        }
        let connection_is_secure = match self.os {
            Os::Linux => nmcli_link_secure(&run("nmcli", &["-t", "-f", "ACTIVE,SECURITY", "dev", "wifi"]).await?),
            Os::Windows => netsh_link_secure(&run("netsh", &["wlan", "show", "interfaces"]).await?),
            Os::Macos => airport_link_secure(&run("system_profiler", &["SPAirPortDataType"]).await?),
            os => return Err(unavailable("link security query", os)),
        };
        Ok(NetworkState {
            internet_reachable: true,
            connection_is_secure,
        })
    }
}

/// `nmcli -t -f ACTIVE,SECURITY dev wifi`: one `yes:<security>` line for the
/// associated network. No associated Wi-Fi means a wired link.
fn nmcli_link_secure(out: &str) -> bool {
    match out.lines().find_map(|l| l.strip_prefix("yes:")) {
        Some(security) => {
            let security = security.trim();
            !security.is_empty() && security != "--" && security != "WEP"
        }
        None => true,
    }
}

fn netsh_link_secure(out: &str) -> bool {
    if out.contains("There is no wireless interface") || !out.contains("State") {
        return true;
    }
    if !out.lines().any(|l| l.contains("State") && l.contains(": connected")) {
        return true;
    }
    out.contains("WPA2") || out.contains("WPA3")
}

/// `system_profiler SPAirPortDataType` lists the joined network under
/// "Current Network Information:" with a `Security:` line.
fn airport_link_secure(out: &str) -> bool {
    let Some((_, current)) = out.split_once("Current Network Information:") else {
        return true;
    };
    match current.lines().find_map(|l| l.trim().strip_prefix("Security:")) {
        Some(security) => security.contains("WPA2") || security.contains("WPA3"),
        None => true,
    }
}
