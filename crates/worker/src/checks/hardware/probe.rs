use super::gpu::amd::RocmSmiDetector;
use super::gpu::nvidia::{NvidiaSmiDetector, NvmlDetector};
use super::gpu::{GpuDetector, GpuDevice};
use super::score::{self, CPU_ONLY_MODEL};
use crate::console::Console;
use log::info;
use shared::models::ResourceCapability;
use sysinfo::System;

/// Read-only hardware discovery. Detection failures degrade to a CPU-only
/// capability and never fail startup.
#[derive(Debug)]
pub(crate) struct HardwareProbe {
    detectors: Vec<Box<dyn GpuDetector>>,
}

impl Default for HardwareProbe {
    fn default() -> Self {
        Self::new(vec![
            Box::new(NvmlDetector),
            Box::new(NvidiaSmiDetector),
            Box::new(RocmSmiDetector),
        ])
    }
}

impl HardwareProbe {
    pub(crate) fn new(detectors: Vec<Box<dyn GpuDetector>>) -> Self {
        Self { detectors }
    }

    pub(crate) fn probe(&self, resource_id: u64, price_override: Option<u64>) -> ResourceCapability {
        Console::title("Hardware Detection");

        let cpu_cores = detect_cpu_cores();
        Console::info("CPU cores", &cpu_cores.to_string());

        let (gpu_model, vram_gb) = match self.detect_gpu() {
            Some(device) => {
                Console::info("GPU", &format!("{} ({})", device.name, device.vendor));
                Console::info("VRAM", &format!("{} GB", device.vram_gb));
                (device.name, device.vram_gb)
            }
            None => {
                Console::warning("No GPU detected, using CPU-only mode");
                (CPU_ONLY_MODEL.to_string(), 0)
            }
        };

        let capability = score::capability(resource_id, &gpu_model, vram_gb, cpu_cores, price_override);
        Console::info("Compute rating", &capability.compute_rating.to_string());
        Console::info("Price per hour", &capability.price_per_hour.to_string());
        info!(
            "Hardware detection complete: GPU={}, VRAM={}GB, Cores={}, Rating={}",
            capability.gpu_model, capability.vram_gb, capability.cpu_cores, capability.compute_rating
        );
        capability
    }

    /// First strategy that reports a device wins.
    fn detect_gpu(&self) -> Option<GpuDevice> {
        self.detectors.iter().find_map(|detector| {
            let device = detector.detect();
            match &device {
                Some(found) => log::debug!("{} detected {}", detector.strategy(), found.name),
                None => log::debug!("{} found no GPU", detector.strategy()),
            }
            device
        })
    }
}

fn detect_cpu_cores() -> u8 {
    let mut sys = System::new();
    sys.refresh_cpu();
    let cores = sys.cpus().len().max(1);
    u8::try_from(cores).unwrap_or(u8::MAX)
}
