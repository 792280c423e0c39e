/// All timestamps are UTC.
pub type Timestamp = chrono::DateTime<chrono::Utc>;

/// Opaque identity of a viewing principal, as supplied by the identity provider.
pub type PrincipalId = String;
