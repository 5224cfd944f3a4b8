// Clock port; job timestamps are epoch seconds, token expiries derive from it

pub trait TimeProvider: Send + Sync {
    fn now_millis(&self) -> i64;

    /// Job rows store whole seconds
    fn now_secs(&self) -> i64 {
        self.now_millis() / 1000
    }
}

/// Wall clock
pub struct SystemTimeProvider;

impl TimeProvider for SystemTimeProvider {
    fn now_millis(&self) -> i64 {
        chrono::Utc::now().timestamp_millis()
    }
}

pub mod mocks {
    use super::*;
    use std::sync::atomic::{AtomicI64, Ordering};

    /// Fixed clock, advanced by hand
    pub struct FixedTimeProvider(AtomicI64);

    impl FixedTimeProvider {
        pub fn new(now_millis: i64) -> Self {
            Self(AtomicI64::new(now_millis))
        }

        pub fn advance_secs(&self, secs: i64) {
            self.0.fetch_add(secs * 1000, Ordering::SeqCst);
        }
    }

    impl TimeProvider for FixedTimeProvider {
        fn now_millis(&self) -> i64 {
            self.0.load(Ordering::SeqCst)
        }
    }
}
