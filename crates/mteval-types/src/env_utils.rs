//! Environment variable parsing utilities.
//!
//! ```
//! use mteval_types::env_utils::{env_var, env_var_or};
//!
//! let timeout: u64 = env_var_or("MTEVAL_HTTP_TIMEOUT_SECS", 120);
//! let data_dir: Option<std::path::PathBuf> = env_var("MTEVAL_DATA_DIR");
//! ```

use std::str::FromStr;

/// Parse an environment variable into a type that implements `FromStr`.
///
/// Returns `None` if the variable is not set, is blank, or cannot be parsed.
pub fn env_var<T: FromStr>(key: &str) -> Option<T> {
    std::env::var(key)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .and_then(|v| v.trim().parse().ok())
}

/// Parse an environment variable with a default value.
pub fn env_var_or<T: FromStr>(key: &str, default: T) -> T {
    env_var(key).unwrap_or(default)
}
