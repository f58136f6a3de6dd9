//! Version and build information
//!
//! Values are embedded by `build.rs` at compile time.

use std::fmt;

/// Build information embedded at compile time
#[derive(Debug, Clone)]
pub struct BuildInfo {
    pub version: &'static str,
    pub name: &'static str,
    /// Git commit hash (short)
    pub git_hash: &'static str,
    git_dirty_str: &'static str,
    pub build_timestamp: &'static str,
    /// Target triple (e.g., x86_64-unknown-linux-gnu)
    pub target: &'static str,
    /// Build profile (debug/release)
    pub profile: &'static str,
    pub rustc_version: &'static str,
}

impl BuildInfo {
    pub const fn current() -> Self {
        Self {
            version: env!("CARGO_PKG_VERSION"),
            name: env!("CARGO_PKG_NAME"),
            git_hash: env!("STEPONE_GIT_HASH"),
            git_dirty_str: env!("STEPONE_GIT_DIRTY"),
            build_timestamp: env!("STEPONE_BUILD_TIMESTAMP"),
            target: env!("STEPONE_TARGET"),
            profile: env!("STEPONE_PROFILE"),
            rustc_version: env!("STEPONE_RUSTC_VERSION"),
        }
    }

    pub fn git_dirty(&self) -> bool {
        self.git_dirty_str == "true"
    }

    /// Version with commit suffix (e.g., "0.1.0-abc1234")
    pub fn full_version(&self) -> String {
        if self.git_dirty() {
            format!("{}-{}-dirty", self.version, self.git_hash)
        } else {
            format!("{}-{}", self.version, self.git_hash)
        }
    }
}

impl fmt::Display for BuildInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{} {}", self.name, self.full_version())?;
        writeln!(f)?;
        writeln!(f, "  Git Hash:  {}{}", self.git_hash, if self.git_dirty() { " (dirty)" } else { "" })?;
        writeln!(f, "  Built:     {}", self.build_timestamp)?;
        writeln!(f, "  Profile:   {}", self.profile)?;
        writeln!(f, "  Target:    {}", self.target)?;
        writeln!(f, "  Compiler:  {}", self.rustc_version)?;
        Ok(())
    }
}

pub fn build_info() -> BuildInfo {
    BuildInfo::current()
}

/// `User-Agent` sent to completion and speech providers.
pub fn user_agent() -> String {
    let info = build_info();
    format!("{}/{}", info.name, info.version)
}

pub fn print_version() {
    print!("{}", build_info());
}
