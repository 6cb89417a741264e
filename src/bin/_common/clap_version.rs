use std::sync::OnceLock;

/// Build the version string shown by clap for the bsmtrace binaries.
///
/// Kept under `src/bin/_common` so it doesn't leak into the library API
/// surface. Reference it in the clap attribute as
/// `#[clap(version = clap_version::bsmtrace_clap_version())]`.
pub(crate) fn bsmtrace_clap_version() -> &'static str {
    // clap requires a &'static str, so we cache the computed String here.
    static CLAP_VERSION: OnceLock<String> = OnceLock::new();

    CLAP_VERSION.get_or_init(|| {
        #[cfg(debug_assertions)]
        const PROFILE: &str = "debug";
        #[cfg(not(debug_assertions))]
        const PROFILE: &str = "release";

        format!(
            r#"{}
profile: {PROFILE}"#,
            bsmtrace::metadata::VERSION,
        )
    })
}
