use super::{exec_command, mb_to_gb, GpuDetector, GpuDevice, GpuVendor, BYTES_TO_MB};
use lazy_static::lazy_static;
use nvml_wrapper::Nvml;
use std::sync::Mutex;

const NVML_LIB_PATHS: [&str; 3] = [
    "libnvidia-ml.so.1",
    "/usr/lib/x86_64-linux-gnu/libnvidia-ml.so.1",
    "/usr/lib/libnvidia-ml.so.1",
];

// Use lazy_static to initialize NVML once and reuse it
lazy_static! {
    static ref NVML: Mutex<Option<Nvml>> = Mutex::new(None);
}

/// Queries the NVIDIA management library directly.
#[derive(Debug, Default)]
pub(crate) struct NvmlDetector;

impl GpuDetector for NvmlDetector {
    fn strategy(&self) -> &'static str {
        "nvml"
    }

    fn detect(&self) -> Option<GpuDevice> {
        let mut nvml_guard = NVML.lock().unwrap_or_else(std::sync::PoisonError::into_inner);

        if nvml_guard.is_none() {
            *nvml_guard = NVML_LIB_PATHS
                .iter()
                .find_map(|path| Nvml::builder().lib_path(std::ffi::OsStr::new(path)).init().ok());
        }
        let nvml = nvml_guard.as_ref()?;

        if nvml.device_count().ok()? == 0 {
            return None;
        }
        let device = nvml.device_by_index(0).ok()?;
        let name = device.name().ok()?;
        let memory = device.memory_info().map(|m| m.total).unwrap_or(0);

        Some(GpuDevice {
            name,
            vram_gb: mb_to_gb(memory / BYTES_TO_MB),
            vendor: GpuVendor::Nvidia,
        })
    }
}

/// Falls back to `nvidia-smi` when the library cannot be loaded.
#[derive(Debug, Default)]
pub(crate) struct NvidiaSmiDetector;

impl GpuDetector for NvidiaSmiDetector {
    fn strategy(&self) -> &'static str {
        "nvidia-smi"
    }

    fn detect(&self) -> Option<GpuDevice> {
        let names = exec_command("nvidia-smi", &["--query-gpu=name", "--format=csv,noheader"])?;
        let name = parse_first_line(&names)?;
        let vram_gb = exec_command(
            "nvidia-smi",
            &["--query-gpu=memory.total", "--format=csv,noheader,nounits"],
        )
        .and_then(|output| parse_memory_mb(&output))
        .map_or(0, mb_to_gb);

        Some(GpuDevice {
            name,
            vram_gb,
            vendor: GpuVendor::Nvidia,
        })
    }
}

/// Multi-GPU hosts print one line per device; the first one is reported.
fn parse_first_line(output: &str) -> Option<String> {
    output
        .lines()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .map(ToString::to_string)
}

fn parse_memory_mb(output: &str) -> Option<u64> {
    parse_first_line(output)?.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_smi_name_takes_first_device() {
        let output = "NVIDIA GeForce RTX 4090\nNVIDIA GeForce RTX 4090\n";
        assert_eq!(
            parse_first_line(output).as_deref(),
            Some("NVIDIA GeForce RTX 4090")
        );
        assert_eq!(parse_first_line("  \n"), None);
    }

    #[test]
    fn test_parse_smi_memory() {
        assert_eq!(parse_memory_mb("24564\n24564"), Some(24_564));
        assert_eq!(parse_memory_mb("[N/A]"), None);
    }
}
