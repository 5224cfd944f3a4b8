// Job id source; job ids double as blob path segments

pub trait IdProvider: Send + Sync {
    fn generate_id(&self) -> String;
}

/// Random v4 UUIDs, hyphenated lowercase
pub struct UuidProvider;

impl IdProvider for UuidProvider {
    fn generate_id(&self) -> String {
        uuid::Uuid::new_v4().to_string()
    }
}

pub mod mocks {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// `<prefix>-1`, `<prefix>-2`, ...
    pub struct SequentialIds {
        prefix: String,
        issued: AtomicUsize,
    }

    impl SequentialIds {
        pub fn new(prefix: impl Into<String>) -> Self {
            Self {
                prefix: prefix.into(),
                issued: AtomicUsize::new(0),
            }
        }
    }

    impl IdProvider for SequentialIds {
        fn generate_id(&self) -> String {
            let n = self.issued.fetch_add(1, Ordering::SeqCst) + 1;
            format!("{}-{}", self.prefix, n)
        }
    }
}
