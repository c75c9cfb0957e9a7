//! Backend detection and auto-selection.

use super::BackendKind;

/// Information about a compute backend.
#[derive(Debug, Clone)]
pub struct BackendInfo {
    /// Backend type.
    pub kind: BackendKind,
    /// Human-readable name.
    pub name: &'static str,
    /// Whether backend is available.
    pub available: bool,
    /// Priority for auto-selection (higher = preferred).
    pub priority: u32,
    /// Description.
    pub description: &'static str,
}

/// Detect all known backends, most preferred first.
pub fn detect_backends() -> Vec<BackendInfo> {
    let mut backends = vec![
        BackendInfo {
            kind: BackendKind::Cpu,
            name: "CPU",
            available: BackendKind::Cpu.is_available(),
            priority: 10,
            description: "Host memory with rayon parallelization",
        },
        BackendInfo {
            kind: BackendKind::Cuda,
            name: "CUDA",
            available: BackendKind::Cuda.is_available(),
            priority: if BackendKind::Cuda.is_available() { 150 } else { 0 },
            description: "NVIDIA GPU via CUDA (external)",
        },
        BackendInfo {
            kind: BackendKind::Dx11,
            name: "DX11",
            available: BackendKind::Dx11.is_available(),
            priority: if BackendKind::Dx11.is_available() { 100 } else { 0 },
            description: "DirectX 11 compute (external)",
        },
    ];

    backends.sort_by(|a, b| b.priority.cmp(&a.priority));
    backends
}

/// Select the best available backend.
pub fn select_best_backend() -> BackendKind {
    detect_backends()
        .into_iter()
        .filter(|b| b.available)
        .max_by_key(|b| b.priority)
        .map(|b| b.kind)
        .unwrap_or(BackendKind::Cpu)
}

/// Get description of available backends.
pub fn describe_backends() -> String {
    let mut desc = String::new();
    for info in detect_backends() {
        let status = if info.available { "+" } else { "-" };
        desc.push_str(&format!("[{}] {}: {}\n", status, info.name, info.description));
    }
    desc
}
