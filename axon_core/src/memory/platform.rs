// Cross-platform shared memory path abstraction
//
// Linux: /dev/shm/axon (tmpfs - RAM-backed, fastest)
// macOS: /tmp/axon (regular filesystem, but still fast for IPC)
// Windows: %TEMP%\axon (uses system temp directory)

use std::path::PathBuf;

/// Get the base directory for AXON shared memory segments
///
/// - Linux: `/dev/shm/axon` (tmpfs for maximum performance)
/// - macOS: `/tmp/axon` (no /dev/shm, but /tmp is still fast)
/// - Windows: `%TEMP%\axon` (system temp directory)
pub fn shm_base_dir() -> PathBuf {
    #[cfg(target_os = "linux")]
    {
        PathBuf::from("/dev/shm/axon")
    }

    #[cfg(target_os = "macos")]
    {
        // macOS doesn't have /dev/shm, use /tmp instead
        PathBuf::from("/tmp/axon")
    }

    #[cfg(target_os = "windows")]
    {
        std::env::temp_dir().join("axon")
    }

    #[cfg(not(any(target_os = "linux", target_os = "macos", target_os = "windows")))]
    {
        // Fallback for other Unix-like systems (BSD, etc.)
        PathBuf::from("/tmp/axon")
    }
}

/// Map a segment name to its backing file path.
///
/// Names may contain `/` or `:` separators (topic-style names); these are
/// flattened so every segment is a single file under the base directory.
pub fn shm_path(name: &str) -> PathBuf {
    let safe_name = name.replace(['/', ':'], "_");
    shm_base_dir().join(format!("axon_{}", safe_name))
}

/// Whether the base directory is RAM-backed shared memory. Where it is
/// not, segments are plain files and mapping latency follows the
/// filesystem, not tmpfs.
pub fn has_native_shm() -> bool {
    cfg!(target_os = "linux")
}

/// Platform label for establishment log lines.
pub fn platform_name() -> &'static str {
    if cfg!(target_os = "linux") {
        "Linux"
    } else if cfg!(target_os = "macos") {
        "macOS"
    } else if cfg!(target_os = "windows") {
        "Windows"
    } else {
        "Unix"
    }
}
