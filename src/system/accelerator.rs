//! Accelerator detection
//!
//! Best-effort probe for a GPU-backed execution context usable by the local
//! inference path. Nothing here fails: a probe that cannot run simply reports
//! the accelerator as unavailable.

use std::path::Path;
use std::process::Command;

use serde::{Deserialize, Serialize};

/// Environment override: `none`, `cpu`, or a backend name such as `vulkan`
pub const ACCELERATOR_ENV: &str = "AIHUB_LOCAL_ACCELERATOR";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AcceleratorBackend {
    Cuda,
    Metal,
    Vulkan,
    None,
}

/// Accelerator information
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AcceleratorInfo {
    pub name: String,
    pub backend: AcceleratorBackend,
    pub available: bool,
}

impl AcceleratorInfo {
    pub fn unavailable() -> Self {
        Self {
            name: "No accelerator detected".to_string(),
            backend: AcceleratorBackend::None,
            available: false,
        }
    }

    fn found(name: impl Into<String>, backend: AcceleratorBackend) -> Self {
        Self {
            name: name.into(),
            backend,
            available: true,
        }
    }
}

/// Detect an accelerator (best effort)
pub fn detect_accelerator() -> AcceleratorInfo {
    if let Ok(value) = std::env::var(ACCELERATOR_ENV) {
        if let Some(info) = parse_override(&value) {
            tracing::debug!("Accelerator override from {}: {:?}", ACCELERATOR_ENV, info);
            return info;
        }
    }

    let info = probe_nvidia()
        .or_else(probe_metal)
        .or_else(probe_render_node)
        .unwrap_or_else(AcceleratorInfo::unavailable);

    tracing::info!(
        available = info.available,
        backend = ?info.backend,
        "Accelerator probe: {}",
        info.name
    );
    info
}

/// Interpret the override variable. Unknown values are ignored.
pub fn parse_override(value: &str) -> Option<AcceleratorInfo> {
    match value.trim().to_lowercase().as_str() {
        "" => None,
        "none" | "cpu" | "off" => Some(AcceleratorInfo::unavailable()),
        "cuda" => Some(AcceleratorInfo::found("CUDA (override)", AcceleratorBackend::Cuda)),
        "metal" => Some(AcceleratorInfo::found("Metal (override)", AcceleratorBackend::Metal)),
        "vulkan" | "webgpu" => Some(AcceleratorInfo::found(
            "Vulkan (override)",
            AcceleratorBackend::Vulkan,
        )),
        other => {
            tracing::warn!("Ignoring unknown {} value '{}'", ACCELERATOR_ENV, other);
            None
        }
    }
}

fn probe_nvidia() -> Option<AcceleratorInfo> {
    let output = Command::new("nvidia-smi")
        .args(["--query-gpu=name", "--format=csv,noheader"])
        .output()
        .ok()?;

    if !output.status.success() {
        return None;
    }

    let stdout = String::from_utf8_lossy(&output.stdout);
    let name = stdout.lines().map(str::trim).find(|l| !l.is_empty())?;
    Some(AcceleratorInfo::found(name, AcceleratorBackend::Cuda))
}

#[cfg(target_os = "macos")]
fn probe_metal() -> Option<AcceleratorInfo> {
    let output = Command::new("sysctl")
        .args(["-n", "machdep.cpu.brand_string"])
        .output()
        .ok()?;

    if !output.status.success() {
        return None;
    }

    let brand = String::from_utf8_lossy(&output.stdout).trim().to_string();
    if !brand.contains("Apple") {
        return None;
    }
    Some(AcceleratorInfo::found(
        format!("{} GPU (Metal)", brand),
        AcceleratorBackend::Metal,
    ))
}

#[cfg(not(target_os = "macos"))]
fn probe_metal() -> Option<AcceleratorInfo> {
    None
}

fn probe_render_node() -> Option<AcceleratorInfo> {
    let node = Path::new("/dev/dri/renderD128");
    if node.exists() {
        Some(AcceleratorInfo::found(
            "DRM render node (Vulkan)",
            AcceleratorBackend::Vulkan,
        ))
    } else {
        None
    }
}
