//! Startup device classification

use serde::{Deserialize, Serialize};
use tracing::info;

use super::tier::PerformanceTier;

/// GPU renderer substrings that mark an integrated or mobile part
const WEAK_GPU_MARKERS: &[&str] = &[
    "intel hd",
    "intel(r) hd",
    "intel uhd",
    "mali",
    "adreno 3",
    "adreno 4",
    "adreno 5",
    "powervr",
    "swiftshader",
    "llvmpipe",
];

/// What the host reports about itself
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HardwareProfile {
    /// Device memory in GB, if known
    pub device_memory_gb: Option<f64>,
    pub touch_capable: bool,
    /// Unmasked renderer string, if known
    pub gpu_renderer: Option<String>,
}

impl HardwareProfile {
    fn weak_gpu(&self) -> bool {
        self.gpu_renderer.as_deref().is_some_and(|renderer| {
            let renderer = renderer.to_lowercase();
            WEAK_GPU_MARKERS.iter().any(|m| renderer.contains(m))
        })
    }

    /// Starting tier for this device
    pub fn classify(&self) -> PerformanceTier {
        let by_memory = match self.device_memory_gb {
            Some(gb) if gb <= 2.0 => Some(PerformanceTier::Low),
            Some(gb) if gb <= 4.0 => Some(if self.touch_capable {
                PerformanceTier::Low
            } else {
                PerformanceTier::Medium
            }),
            _ => None,
        };

        let tier = match (by_memory, self.weak_gpu()) {
            (Some(tier), true) => tier.degraded(),
            (Some(tier), false) => tier,
            (None, true) => PerformanceTier::High.degraded(),
            (None, false) if self.touch_capable => PerformanceTier::Medium,
            (None, false) => PerformanceTier::High,
        };

        info!(
            memory_gb = ?self.device_memory_gb,
            touch = self.touch_capable,
            gpu = ?self.gpu_renderer,
            tier = ?tier,
            "Hardware classified"
        );
        tier
    }
}
