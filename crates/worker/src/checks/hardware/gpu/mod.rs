use std::fmt::Debug;
use std::process::Command;

pub(crate) mod amd;
pub(crate) mod nvidia;

pub(crate) const BYTES_TO_MB: u64 = 1024 * 1024;

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct GpuDevice {
    pub(crate) name: String,
    pub(crate) vram_gb: u8,
    pub(crate) vendor: GpuVendor,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum GpuVendor {
    Nvidia,
    Amd,
}

impl std::fmt::Display for GpuVendor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GpuVendor::Nvidia => write!(f, "nvidia"),
            GpuVendor::Amd => write!(f, "amd"),
        }
    }
}

/// One way of discovering the primary GPU.
pub(crate) trait GpuDetector: Debug + Send + Sync {
    /// Short name shown in probe output, e.g. `"nvml"`.
    fn strategy(&self) -> &'static str;

    fn detect(&self) -> Option<GpuDevice>;
}

/// Runs `program`, returning trimmed stdout on a zero exit.
pub(crate) fn exec_command(program: &str, args: &[&str]) -> Option<String> {
    let output = Command::new(program).args(args).output().ok()?;
    if !output.status.success() {
        log::debug!("{program} exited with {}", output.status);
        return None;
    }
    Some(String::from_utf8_lossy(&output.stdout).trim().to_string())
}

/// Whole gigabytes in `mb` megabytes, saturating at `u8::MAX`.
pub(crate) fn mb_to_gb(mb: u64) -> u8 {
    u8::try_from(mb / 1024).unwrap_or(u8::MAX)
}
