use uvm_domain::EnvSnapshot;

pub const STRICT_LOCKING_ENV: &str = "UVM_STRICT_LOCKING";
pub const UV_BIN_ENV: &str = "UVM_UV_BIN";

const DEFAULT_UV_BIN: &str = "uv";

/// Behaviour knobs for [`crate::Registry`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RegistryOptions {
    /// Fail instead of proceeding unlocked when the registry lock cannot be
    /// taken. Off by default: an unavailable lock is logged and the atomic
    /// rename alone protects the file from torn writes.
    pub strict_locking: bool,
}

impl RegistryOptions {
    pub fn from_snapshot(snapshot: &EnvSnapshot) -> Self {
        Self {
            strict_locking: snapshot.flag_is_enabled(STRICT_LOCKING_ENV),
        }
    }

    #[must_use]
    pub fn strict() -> Self {
        Self {
            strict_locking: true,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProvisionerConfig {
    pub program: String,
}

impl ProvisionerConfig {
    pub fn from_snapshot(snapshot: &EnvSnapshot) -> Self {
        Self {
            program: snapshot
                .non_empty(UV_BIN_ENV)
                .map_or(DEFAULT_UV_BIN, str::trim)
                .to_string(),
        }
    }
}

impl Default for ProvisionerConfig {
    fn default() -> Self {
        Self {
            program: DEFAULT_UV_BIN.to_string(),
        }
    }
}
