use super::{exec_command, mb_to_gb, GpuDetector, GpuDevice, GpuVendor};

/// Uses `rocm-smi` for AMD devices.
#[derive(Debug, Default)]
pub(crate) struct RocmSmiDetector;

impl GpuDetector for RocmSmiDetector {
    fn strategy(&self) -> &'static str {
        "rocm-smi"
    }

    fn detect(&self) -> Option<GpuDevice> {
        let products = exec_command("rocm-smi", &["--showproductname"])?;
        let name = parse_product_name(&products)?;
        let vram_gb = exec_command("rocm-smi", &["--showmeminfo", "vram"])
            .and_then(|output| parse_vram_gb(&output))
            .unwrap_or(0);

        Some(GpuDevice {
            name,
            vram_gb,
            vendor: GpuVendor::Amd,
        })
    }
}

fn parse_product_name(output: &str) -> Option<String> {
    output
        .lines()
        .filter(|line| line.contains("Card series:") || line.contains("Card model:"))
        .find_map(|line| {
            let (_, value) = line.split_once("Card series:").or_else(|| line.split_once("Card model:"))?;
            let name = value.trim();
            (!name.is_empty()).then(|| name.to_string())
        })
}

/// Reads the `Total Memory` line, which rocm-smi prints either in bytes
/// (`Total Memory (B): 68702699520`) or with a unit suffix.
fn parse_vram_gb(output: &str) -> Option<u8> {
    let line = output.lines().find(|line| line.contains("Total Memory"))?;

    let tokens: Vec<&str> = line.split_whitespace().collect();
    for (i, token) in tokens.iter().enumerate() {
        let value = i
            .checked_sub(1)
            .and_then(|prev| tokens[prev].parse::<u64>().ok());
        match (*token, value) {
            ("GB", Some(gb)) => return Some(u8::try_from(gb).unwrap_or(u8::MAX)),
            ("MB", Some(mb)) => return Some(mb_to_gb(mb)),
            _ => {}
        }
    }

    if line.contains("(B)") {
        let bytes: u64 = line.rsplit(':').next()?.trim().parse().ok()?;
        return Some(mb_to_gb(bytes / super::BYTES_TO_MB));
    }
    None
}
