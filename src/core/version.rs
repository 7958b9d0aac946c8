//! Build metadata and engine API version accessors.
//! Includes the generated version.rs from the build script, providing a
//! single source of truth for the binary banner and adapters.

include!(concat!(env!("OUT_DIR"), "/version.rs"));

/// Parse the engine API version string from the build script into u32.
/// Falls back to a stable default if parsing fails.
pub fn get_api_version() -> u32 {
    ENGINE_API_VERSION.parse().unwrap_or(20261016)
}

/// Build time string from the build script (UTC)
pub fn build_time() -> &'static str {
    BUILD_TIME
}

/// Short git hash captured by the build script
pub fn git_hash() -> &'static str {
    GIT_HASH
}

/// One-line banner used at startup
pub fn banner() -> String {
    format!(
        "{} {} (api {}, {} built {})",
        env!("CARGO_PKG_NAME"),
        env!("CARGO_PKG_VERSION"),
        get_api_version(),
        git_hash(),
        build_time()
    )
}
