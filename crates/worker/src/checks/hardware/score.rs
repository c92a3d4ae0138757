//! Compute rating and pricing for a resource.
//!
//! The rating is `cpu_cores * 500` plus a bonus for the GPU family. The
//! hourly price (in the ledger's smallest unit) is tiered on the rating.

use shared::models::ResourceCapability;

pub(crate) const CPU_ONLY_MODEL: &str = "CPU-Only";

const RATING_PER_CORE: u32 = 500;
const BASE_PRICE: u64 = 5000;

/// Checked in order; the first matching marker wins.
const GPU_BONUSES: &[(&[&str], u32)] = &[
    (&["H100"], 40_000),
    (&["4090", "A100"], 30_000),
    (&["4080", "3090"], 20_000),
    (&["4070", "3080"], 15_000),
    (&["4060", "3070"], 10_000),
    (&["MI300", "MI250"], 35_000),
    (&["7900"], 20_000),
];

const UNKNOWN_GPU_BONUS: u32 = 8_000;

const PRICE_TIERS: &[(u32, u64)] = &[
    (35_000, 45_000),
    (25_000, 35_000),
    (15_000, 20_000),
    (8_000, 8_000),
];

pub(crate) fn gpu_bonus(gpu_model: &str) -> u32 {
    if gpu_model == CPU_ONLY_MODEL {
        return 0;
    }
    GPU_BONUSES
        .iter()
        .find(|(markers, _)| markers.iter().any(|marker| gpu_model.contains(marker)))
        .map_or(UNKNOWN_GPU_BONUS, |(_, bonus)| *bonus)
}

pub(crate) fn compute_rating(cpu_cores: u8, gpu_model: &str) -> u32 {
    u32::from(cpu_cores) * RATING_PER_CORE + gpu_bonus(gpu_model)
}

pub(crate) fn price_per_hour(compute_rating: u32) -> u64 {
    let premium = PRICE_TIERS
        .iter()
        .find(|(threshold, _)| compute_rating >= *threshold)
        .map_or(0, |(_, premium)| *premium);
    BASE_PRICE + premium
}

/// Builds the advertised record. A configured price replaces the tiered
/// price.
pub(crate) fn capability(
    resource_id: u64,
    gpu_model: &str,
    vram_gb: u8,
    cpu_cores: u8,
    price_override: Option<u64>,
) -> ResourceCapability {
    let compute_rating = compute_rating(cpu_cores, gpu_model);
    ResourceCapability {
        resource_id,
        gpu_model: gpu_model.to_string(),
        vram_gb,
        cpu_cores,
        compute_rating,
        price_per_hour: price_override.unwrap_or_else(|| price_per_hour(compute_rating)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gpu_bonus_table() {
        assert_eq!(gpu_bonus("NVIDIA H100 80GB HBM3"), 40_000);
        assert_eq!(gpu_bonus("NVIDIA GeForce RTX 4090"), 30_000);
        assert_eq!(gpu_bonus("NVIDIA A100-SXM4-40GB"), 30_000);
        assert_eq!(gpu_bonus("NVIDIA GeForce RTX 3090"), 20_000);
        assert_eq!(gpu_bonus("NVIDIA GeForce RTX 3080 Ti"), 15_000);
        assert_eq!(gpu_bonus("NVIDIA GeForce RTX 4060"), 10_000);
        assert_eq!(gpu_bonus("AMD Instinct MI300X"), 35_000);
        assert_eq!(gpu_bonus("Radeon RX 7900 XTX"), 20_000);
        assert_eq!(gpu_bonus("Tesla T4"), 8_000);
        assert_eq!(gpu_bonus(CPU_ONLY_MODEL), 0);
    }

    #[test]
    fn test_first_matching_marker_wins() {
        // Contains both "4090" and "3090"; the higher tier is listed first.
        assert_eq!(gpu_bonus("RTX 4090/3090 test rig"), 30_000);
    }

    #[test]
    fn test_compute_rating_adds_core_score() {
        assert_eq!(compute_rating(16, "NVIDIA GeForce RTX 4090"), 38_000);
        assert_eq!(compute_rating(8, CPU_ONLY_MODEL), 4_000);
        assert_eq!(compute_rating(255, CPU_ONLY_MODEL), 127_500);
    }

    #[test]
    fn test_price_tiers() {
        assert_eq!(price_per_hour(4_000), 5_000);
        assert_eq!(price_per_hour(8_000), 13_000);
        assert_eq!(price_per_hour(15_000), 25_000);
        assert_eq!(price_per_hour(24_999), 25_000);
        assert_eq!(price_per_hour(25_000), 40_000);
        assert_eq!(price_per_hour(35_000), 50_000);
        assert_eq!(price_per_hour(120_000), 50_000);
    }

    #[test]
    fn test_capability_respects_price_override() {
        let derived = capability(9, "Tesla T4", 16, 4, None);
        assert_eq!(derived.compute_rating, 10_000);
        assert_eq!(derived.price_per_hour, 13_000);

        let fixed = capability(9, "Tesla T4", 16, 4, Some(777));
        assert_eq!(fixed.compute_rating, 10_000);
        assert_eq!(fixed.price_per_hour, 777);
    }
}
