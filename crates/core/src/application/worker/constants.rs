// Queue listener limits
use std::time::Duration;

/// Upper bound the queue service accepts for one receive call
pub const MAX_MESSAGES_PER_RECEIVE: u32 = 32;

/// How long shutdown waits for in-flight jobs before aborting them (30s)
/// Aborted jobs stay QUEUED and their messages reappear after the visibility timeout
pub const DRAIN_TIMEOUT: Duration = Duration::from_secs(30);
