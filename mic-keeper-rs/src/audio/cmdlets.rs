//! Volume backend built on the AudioDeviceCmdlets PowerShell module.
//!
//! Every operation runs a short PowerShell script and scrapes its output.

use super::backend::{AudioMethod, BackendError, VolumeBackend, DEFAULT_DEVICE};
use std::io::Read;
use std::process::{Command, ExitStatus, Stdio};
use std::sync::mpsc;
use std::thread;
use std::time::{Duration, Instant};

/// Timeout for volume reads, writes and device listing.
pub const COMMAND_TIMEOUT: Duration = Duration::from_secs(10);

/// Timeout for the availability probe.
pub const PROBE_TIMEOUT: Duration = Duration::from_secs(5);

const IMPORT_MODULE: &str = "Import-Module AudioDeviceCmdlets -ErrorAction SilentlyContinue";

#[cfg(windows)]
const CREATE_NO_WINDOW: u32 = 0x0800_0000;

/// Finished PowerShell invocation.
#[derive(Debug)]
pub struct ScriptOutput {
    pub status: ExitStatus,
    pub stdout: String,
}

/// Backend that shells out to `powershell`.
#[derive(Debug)]
pub struct CmdletsBackend {
    timeout: Duration,
}

impl CmdletsBackend {
    /// Create a backend with the default command timeout.
    pub fn new() -> Self {
        Self {
            timeout: COMMAND_TIMEOUT,
        }
    }

    /// Check whether the AudioDeviceCmdlets module is installed.
    pub fn is_available() -> bool {
        let script = "Get-Module -ListAvailable AudioDeviceCmdlets | Select-Object -First 1";
        match run_powershell(script, PROBE_TIMEOUT) {
            Ok(output) => output.status.success() && output.stdout.contains("AudioDeviceCmdlets"),
            Err(e) => {
                tracing::debug!("AudioDeviceCmdlets probe failed: {}", e);
                false
            }
        }
    }
}

impl Default for CmdletsBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl VolumeBackend for CmdletsBackend {
    fn method(&self) -> AudioMethod {
        AudioMethod::Cmdlets
    }

    fn read(&mut self, device: &str) -> Result<u8, BackendError> {
        let output = run_powershell(&read_script(device), self.timeout)?;

        if !output.status.success() || output.stdout.trim().is_empty() {
            return Err(BackendError::ReadFailed(format!(
                "powershell exited with {}",
                output.status
            )));
        }

        parse_volume_output(&output.stdout).ok_or_else(|| {
            let head: String = output.stdout.trim().chars().take(100).collect();
            BackendError::ReadFailed(format!("could not extract volume from output: '{head}...'"))
        })
    }

    fn write(&mut self, device: &str, percent: u8) -> Result<(), BackendError> {
        let output = run_powershell(&write_script(device, percent), self.timeout)?;

        if output.status.success() {
            Ok(())
        } else {
            Err(BackendError::WriteFailed {
                percent,
                reason: format!("powershell exited with {}", output.status),
            })
        }
    }

    fn list_devices(&mut self) -> Result<Vec<String>, BackendError> {
        let script = format!(
            "{IMPORT_MODULE}; Get-AudioDevice -List | Where-Object {{$_.Type -eq \"Recording\"}} | \
             Select-Object -ExpandProperty Name"
        );
        let output = run_powershell(&script, self.timeout)?;

        if !output.status.success() {
            return Err(BackendError::Unavailable(format!(
                "device listing exited with {}",
                output.status
            )));
        }

        Ok(output
            .stdout
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(str::to_string)
            .collect())
    }
}

/// Extract a volume percentage from command output.
///
/// Scans from the last line up and takes the first line consisting only of
/// digits with an optional `%`.
pub fn parse_volume_output(output: &str) -> Option<u8> {
    output.lines().rev().map(str::trim).find_map(|line| {
        let digits = line.replace('%', "");
        if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
            return None;
        }
        digits.parse::<u8>().ok().filter(|v| *v <= 100)
    })
}

/// Escape text for use inside a PowerShell double-quoted string.
pub fn escape_ps_string(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        if matches!(c, '`' | '"' | '$') {
            escaped.push('`');
        }
        escaped.push(c);
    }
    escaped
}

fn select_device_block(device: &str) -> String {
    format!(
        "$device = Get-AudioDevice -List | Where-Object {{$_.Name -eq \"{}\" -and $_.Type -eq \"Recording\"}} | Select-Object -First 1\n",
        escape_ps_string(device)
    )
}

/// Script printing the recording volume of `device`.
pub fn read_script(device: &str) -> String {
    if device == DEFAULT_DEVICE {
        return format!("{IMPORT_MODULE}; Get-AudioDevice -RecordingVolume");
    }

    format!(
        "{IMPORT_MODULE}\n{}if ($device) {{\n    Set-AudioDevice -ID $device.ID | Out-Null\n}}\nGet-AudioDevice -RecordingVolume\n",
        select_device_block(device)
    )
}

/// Script setting the recording volume of `device` to `percent`.
pub fn write_script(device: &str, percent: u8) -> String {
    if device == DEFAULT_DEVICE {
        return format!("{IMPORT_MODULE}; Set-AudioDevice -RecordingVolume {percent}");
    }

    format!(
        "{IMPORT_MODULE}\n{}if ($device) {{\n    Set-AudioDevice -ID $device.ID | Out-Null\n}}\nSet-AudioDevice -RecordingVolume {percent}\nWrite-Output \"OK\"\n",
        select_device_block(device)
    )
}

/// Run a PowerShell script, killing it if it outlives `timeout`.
pub fn run_powershell(script: &str, timeout: Duration) -> Result<ScriptOutput, BackendError> {
    let mut command = Command::new("powershell");
    command
        .args(["-NoProfile", "-NonInteractive", "-Command", script])
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::null());

    #[cfg(windows)]
    {
        use std::os::windows::process::CommandExt;
        command.creation_flags(CREATE_NO_WINDOW);
    }

    let mut child = command.spawn().map_err(BackendError::Spawn)?;

    // Drain stdout on a helper thread so a chatty script cannot block on a full pipe
    let (tx, rx) = mpsc::channel();
    if let Some(mut stdout) = child.stdout.take() {
        thread::spawn(move || {
            let mut text = String::new();
            let _ = stdout.read_to_string(&mut text);
            let _ = tx.send(text);
        });
    }

    let deadline = Instant::now() + timeout;
    let status = loop {
        match child.try_wait().map_err(BackendError::Spawn)? {
            Some(status) => break status,
            None if Instant::now() >= deadline => {
                let _ = child.kill();
                let _ = child.wait();
                return Err(BackendError::Timeout(timeout));
            }
            None => thread::sleep(Duration::from_millis(20)),
        }
    };

    let stdout = rx.recv_timeout(Duration::from_secs(1)).unwrap_or_default();

    Ok(ScriptOutput { status, stdout })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_last_percentage_line() {
        let output = "Some banner\nDevice: Mic\n75%\n";
        assert_eq!(parse_volume_output(output), Some(75));
    }

    #[test]
    fn prefers_line_nearest_the_end() {
        let output = "40%\nnoise\n82\n   \n";
        assert_eq!(parse_volume_output(output), Some(82));
    }

    #[test]
    fn ignores_mixed_lines() {
        assert_eq!(parse_volume_output("Volume is 50%\nOK"), None);
        assert_eq!(parse_volume_output(""), None);
        assert_eq!(parse_volume_output("%\n"), None);
    }

    #[test]
    fn rejects_out_of_range() {
        assert_eq!(parse_volume_output("250%"), None);
        assert_eq!(parse_volume_output("100%\n101%"), Some(100));
    }

    #[test]
    fn handles_crlf_output() {
        assert_eq!(parse_volume_output("header\r\n64%\r\n"), Some(64));
    }

    #[test]
    fn escapes_powershell_specials() {
        assert_eq!(escape_ps_string(r#"Mic "Pro" $x `y"#), r#"Mic `"Pro`" `$x ``y"#);
        assert_eq!(escape_ps_string("Plain"), "Plain");
    }

    #[test]
    fn default_device_scripts_skip_selection() {
        let read = read_script(DEFAULT_DEVICE);
        assert!(read.ends_with("Get-AudioDevice -RecordingVolume"));
        assert!(!read.contains("Where-Object"));

        let write = write_script(DEFAULT_DEVICE, 90);
        assert!(write.ends_with("Set-AudioDevice -RecordingVolume 90"));
    }

    #[test]
    fn named_device_scripts_select_by_name() {
        let read = read_script("USB \"Mic\"");
        assert!(read.contains(r#"$_.Name -eq "USB `"Mic`"""#));
        assert!(read.contains("Set-AudioDevice -ID $device.ID"));

        let write = write_script("Headset", 55);
        assert!(write.contains("Set-AudioDevice -RecordingVolume 55"));
        assert!(write.contains("Write-Output \"OK\""));
    }
}
