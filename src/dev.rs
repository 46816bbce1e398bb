//! Developer-mode gate for operations that are unsafe in production use.

/// Environment variable that enables developer mode when set to "1".
pub const DEV_MODE_KEY: &str = "REFSTATE_DEV";

/// Returns true if the process is running in developer mode.
///
/// The flag is read-only configuration: it is derived from the environment
/// and callers must not expect mid-process changes to be picked up reliably.
pub fn in_dev_mode() -> bool {
    std::env::var(DEV_MODE_KEY).map(|v| v == "1").unwrap_or(false)
}
