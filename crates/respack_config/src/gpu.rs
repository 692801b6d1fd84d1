//! Target GPU families for texture export.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// A GPU family that textures are exported for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum GpuFamily {
    /// Uncompressed source format.
    Origin,
    /// PowerVR on iOS.
    PowerVrIos,
    /// PowerVR on Android.
    PowerVrAndroid,
    /// NVIDIA Tegra.
    Tegra,
    /// ARM Mali.
    Mali,
    /// Qualcomm Adreno.
    Adreno,
    /// Desktop DirectX 11.
    Dx11,
}

impl GpuFamily {
    /// Every family, in export order.
    pub const ALL: [GpuFamily; 7] = [
        GpuFamily::Origin,
        GpuFamily::PowerVrIos,
        GpuFamily::PowerVrAndroid,
        GpuFamily::Tegra,
        GpuFamily::Mali,
        GpuFamily::Adreno,
        GpuFamily::Dx11,
    ];

    /// Name used on the command line and as a flag token (`--<name>`).
    pub fn name(self) -> &'static str {
        match self {
            GpuFamily::Origin => "origin",
            GpuFamily::PowerVrIos => "PowerVR_iOS",
            GpuFamily::PowerVrAndroid => "PowerVR_Android",
            GpuFamily::Tegra => "tegra",
            GpuFamily::Mali => "mali",
            GpuFamily::Adreno => "adreno",
            GpuFamily::Dx11 => "dx11",
        }
    }

    /// Returns `true` for hardware families that need compression options.
    pub fn is_device(self) -> bool {
        self != GpuFamily::Origin
    }
}

impl fmt::Display for GpuFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for GpuFamily {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        GpuFamily::ALL
            .into_iter()
            .find(|gpu| gpu.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| ConfigError::UnknownGpu(s.to_string()))
    }
}
