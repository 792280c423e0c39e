//! Presence configuration resolved once at startup.

/// Default client poll interval in seconds.
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 10;

/// Minimum poll interval in seconds.
pub const MIN_POLL_INTERVAL_SECS: u64 = 1;

/// Maximum poll interval in seconds (1 hour).
pub const MAX_POLL_INTERVAL_SECS: u64 = 3600;

/// Guard used for principals that do not name one.
pub const DEFAULT_GUARD: &str = "web";

/// Display name given to viewers without an identity.
pub const DEFAULT_ANONYMOUS_NAME: &str = "Guest";

/// Roles allowed to take control unless configured otherwise.
pub const DEFAULT_TAKE_CONTROL_ROLES: &[&str] = &["admin", "editor"];

/// Plain configuration for the registry and lock arbiter.
#[derive(Debug, Clone)]
pub struct PresenceConfig {
    /// How often clients refresh. Entry and store TTLs derive from this.
    pub poll_interval_secs: u64,
    /// Resource types whose viewers are arbitrated for write control.
    pub lockable_types: Vec<String>,
    /// Roles permitted to take control of a lockable resource.
    pub take_control_roles: Vec<String>,
    pub default_guard: String,
    pub anonymous_name: String,
}

impl Default for PresenceConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: DEFAULT_POLL_INTERVAL_SECS,
            lockable_types: Vec::new(),
            take_control_roles: DEFAULT_TAKE_CONTROL_ROLES
                .iter()
                .map(|r| r.to_string())
                .collect(),
            default_guard: DEFAULT_GUARD.to_string(),
            anonymous_name: DEFAULT_ANONYMOUS_NAME.to_string(),
        }
    }
}

impl PresenceConfig {
    pub fn is_lockable(&self, resource_type: &str) -> bool {
        self.lockable_types.iter().any(|t| t == resource_type)
    }

    /// Whether a caller with `role` may take control. Anonymous callers never may.
    pub fn may_take_control(&self, role: Option<&str>) -> bool {
        role.is_some_and(|role| self.take_control_roles.iter().any(|r| r == role))
    }

    pub fn validate(&self) -> Result<(), String> {
        validate_poll_interval(self.poll_interval_secs)?;
        if self.default_guard.trim().is_empty() {
            return Err("default guard must not be empty".to_string());
        }
        Ok(())
    }
}

/// Validate a poll interval in seconds. Returns `Ok(())` or an error message.
pub fn validate_poll_interval(secs: u64) -> Result<(), String> {
    if secs < MIN_POLL_INTERVAL_SECS {
        return Err(format!(
            "Poll interval must be at least {MIN_POLL_INTERVAL_SECS} second(s), got {secs}"
        ));
    }
    if secs > MAX_POLL_INTERVAL_SECS {
        return Err(format!(
            "Poll interval must be at most {MAX_POLL_INTERVAL_SECS} seconds, got {secs}"
        ));
    }
    Ok(())
}
