// ============================================================
// Layer 5 - Compute Backends
// ============================================================
// Burn is generic over the tensor backend. This crate ships:
//
//   Cpu         NdArray              (always compiled)
//   Accelerator Wgpu                 (cargo feature "wgpu")
//
// Training wraps either in Autodiff; validation and serving use
// the plain backend through AutodiffModule::valid().
//
// `model.device = auto` picks the accelerator when it is compiled
// in, otherwise the CPU. Asking for the accelerator in a build
// without it is a configuration error.

use serde::{Deserialize, Serialize};

use crate::domain::error::{FaceVerifyError, Result};

pub type CpuBackend    = burn::backend::NdArray;
pub type CpuAutodiff   = burn::backend::Autodiff<CpuBackend>;

#[cfg(feature = "wgpu")]
pub type GpuBackend    = burn::backend::Wgpu;
#[cfg(feature = "wgpu")]
pub type GpuAutodiff   = burn::backend::Autodiff<GpuBackend>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceKind {
    #[default]
    Auto,
    Cpu,
    #[serde(alias = "cuda", alias = "gpu", alias = "mps")]
    Accelerator,
}

/// Backend after resolving `Auto`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolvedDevice {
    Cpu,
    Accelerator,
}

impl DeviceKind {
    pub fn resolve(self) -> Result<ResolvedDevice> {
        let accelerator_built = cfg!(feature = "wgpu");
        match self {
            DeviceKind::Cpu  => Ok(ResolvedDevice::Cpu),
            DeviceKind::Auto => Ok(if accelerator_built {
                ResolvedDevice::Accelerator
            } else {
                ResolvedDevice::Cpu
            }),
            DeviceKind::Accelerator if accelerator_built => Ok(ResolvedDevice::Accelerator),
            DeviceKind::Accelerator => Err(FaceVerifyError::Configuration(
                "device 'accelerator' requested but this build has no GPU backend \
                 (rebuild with --features wgpu)"
                    .to_string(),
            )),
        }
    }
}

impl std::str::FromStr for DeviceKind {
    type Err = FaceVerifyError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "auto" => Ok(DeviceKind::Auto),
            "cpu"  => Ok(DeviceKind::Cpu),
            "accelerator" | "cuda" | "gpu" | "mps" => Ok(DeviceKind::Accelerator),
            other => Err(FaceVerifyError::Configuration(format!("unknown device '{other}'"))),
        }
    }
}
