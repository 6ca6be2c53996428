use crate::common::constants::VERSION_PREFIX;

/// Strips a single leading version-prefix character from an observed version.
/// Observed values carry the prefix inconsistently, and may carry build/dirty
/// suffixes, e.g. wanted '0.19.3-815-g50e67d4' is reported as
/// 'v0.19.3-815-g50e67d4034e858-dirty'.
pub(crate) fn normalized(observed: &str) -> &str {
    observed.strip_prefix(VERSION_PREFIX).unwrap_or(observed)
}

/// Prepends the version prefix expected by the upgrade script.
pub(crate) fn prefixed(version: &str) -> String {
    format!("{VERSION_PREFIX}{version}")
}
