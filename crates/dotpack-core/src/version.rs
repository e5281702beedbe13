use std::fmt::Write;

/// The current version, read from Cargo.toml at compile time.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Returns a formatted version string including the protocol schema version.
#[must_use]
pub fn version_string() -> String {
    let mut s = format!("dotpack {VERSION}");
    let _ = write!(s, " (protocol v{})", dotpack_proto::PROTO_SCHEMA_VERSION);
    s
}
