/// Longest accepted vehicle id, in characters.
pub const MAX_VEHICLE_ID_LEN: usize = 32;

/// Upper bound on `k` for a multi-step rollback.
pub const MAX_ROLLBACK_STEPS: usize = 64;

/// Topology size caps, checked when the topology is loaded.
pub const MAX_ZONES: usize = 1_024;
pub const MAX_SLOTS_TOTAL: usize = 100_000;

/// Largest accepted form body on the mutating endpoints.
pub const MAX_FORM_BODY_BYTES: usize = 4 * 1024;
