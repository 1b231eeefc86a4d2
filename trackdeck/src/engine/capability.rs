//! Hardware capability detection.
//!
//! The primary renderer is only attempted when a hardware adapter is
//! available. Builds without the `gpu` feature always report the capability
//! as missing, which sends every map instance straight to the fallback.

use std::fmt;

use super::{EngineError, EngineResult};
use crate::BoxFuture;

/// A usable adapter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Capability {
    pub adapter: String,
    pub backend: String,
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.adapter, self.backend)
    }
}

/// Detects whether the accelerated renderer can run.
pub trait CapabilityProbe: Send + Sync {
    fn detect(&self) -> BoxFuture<'_, EngineResult<Capability>>;
}

/// Fixed answer, for tests and `--force-fallback`.
#[derive(Debug, Clone)]
pub struct StaticCapability(Result<Capability, String>);

impl StaticCapability {
    pub fn available(adapter: impl Into<String>) -> Self {
        Self(Ok(Capability {
            adapter: adapter.into(),
            backend: "static".to_string(),
        }))
    }

    pub fn missing(reason: impl Into<String>) -> Self {
        Self(Err(reason.into()))
    }
}

impl CapabilityProbe for StaticCapability {
    fn detect(&self) -> BoxFuture<'_, EngineResult<Capability>> {
        let result = self.0.clone().map_err(EngineError::CapabilityMissing);
        Box::pin(async move { result })
    }
}

/// Requests a hardware adapter through `wgpu`.
///
/// Software (CPU) adapters do not count.
#[cfg(feature = "gpu")]
#[derive(Debug, Default, Clone)]
pub struct GpuCapabilityProbe;

#[cfg(feature = "gpu")]
impl CapabilityProbe for GpuCapabilityProbe {
    fn detect(&self) -> BoxFuture<'_, EngineResult<Capability>> {
        Box::pin(async move {
            let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor::default());
            let adapter = instance
                .request_adapter(&wgpu::RequestAdapterOptions {
                    power_preference: wgpu::PowerPreference::HighPerformance,
                    force_fallback_adapter: false,
                    compatible_surface: None,
                })
                .await
                .map_err(|e| EngineError::CapabilityMissing(format!("no GPU adapter: {}", e)))?;

            let info = adapter.get_info();
            if info.device_type == wgpu::DeviceType::Cpu {
                return Err(EngineError::CapabilityMissing(format!(
                    "only a software adapter is available ({})",
                    info.name
                )));
            }

            tracing::info!(adapter = %info.name, backend = ?info.backend, "GPU adapter found");
            Ok(Capability {
                adapter: info.name,
                backend: format!("{:?}", info.backend),
            })
        })
    }
}

/// The capability probe for this build.
pub fn default_probe() -> std::sync::Arc<dyn CapabilityProbe> {
    #[cfg(feature = "gpu")]
    {
        std::sync::Arc::new(GpuCapabilityProbe)
    }
    #[cfg(not(feature = "gpu"))]
    {
        std::sync::Arc::new(StaticCapability::missing("built without GPU support"))
    }
}
