//! Allocation limits and trusted-mode switches.
//!
//! The configuration is an explicit value handed to
//! [`AppIdService`](crate::AppIdService) at construction. Nothing here is
//! read from process state.

/// Maximum number of caller-supplied IDs accepted by one register request.
pub const DEFAULT_MAX_IDS_IN_REGISTER: usize = 50;

/// Maximum number of IDs generated by one create request.
pub const DEFAULT_MAX_IDS_IN_CREATE: usize = 50;

/// Number of regenerations allowed for a generated ID that collides.
pub const DEFAULT_MAX_GEN_RETRY: u32 = 3;

/// Items of a batch allocated at once. 1 keeps store contention low.
pub const DEFAULT_BATCH_CONCURRENCY: usize = 1;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AllocationConfig {
    pub max_ids_in_register: usize,
    pub max_ids_in_create: usize,
    pub max_gen_retry: u32,
    /// Lets a create request pick the values of its "generated" IDs.
    pub can_set_ids_in_create: bool,
    /// Lets a create request override `max_gen_retry`.
    pub can_set_retries_in_create: bool,
    pub batch_concurrency: usize,
}

impl Default for AllocationConfig {
    fn default() -> Self {
        Self {
            max_ids_in_register: DEFAULT_MAX_IDS_IN_REGISTER,
            max_ids_in_create: DEFAULT_MAX_IDS_IN_CREATE,
            max_gen_retry: DEFAULT_MAX_GEN_RETRY,
            can_set_ids_in_create: false,
            can_set_retries_in_create: false,
            batch_concurrency: DEFAULT_BATCH_CONCURRENCY,
        }
    }
}

impl AllocationConfig {
    /// Configuration with both trusted-mode switches on.
    #[must_use]
    pub fn trusted(self) -> Self {
        Self {
            can_set_ids_in_create: true,
            can_set_retries_in_create: true,
            ..self
        }
    }
}
