// Object Store Port (Interface)
// Named byte blobs inside named containers, plus scoped access URLs

use crate::domain::layout;
use crate::error::Result;
use async_trait::async_trait;
use std::time::Duration;

/// Blob content with its stored content type
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredBlob {
    pub data: Vec<u8>,
    pub content_type: Option<String>,
}

/// Permission set of a scoped access URL
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AccessScope {
    pub read: bool,
    pub add: bool,
    pub create: bool,
    pub write: bool,
    pub delete: bool,
    pub list: bool,
}

impl AccessScope {
    pub fn read_only() -> Self {
        Self {
            read: true,
            ..Self::default()
        }
    }

    /// Source container: read + list
    pub fn read_list() -> Self {
        Self {
            read: true,
            list: true,
            ..Self::default()
        }
    }

    /// Destination container: read, add, create, write, list
    pub fn read_write() -> Self {
        Self {
            read: true,
            add: true,
            create: true,
            write: true,
            list: true,
            ..Self::default()
        }
    }

    /// Permission letters in canonical `racwdl` order
    pub fn permissions(&self) -> String {
        [
            (self.read, 'r'),
            (self.add, 'a'),
            (self.create, 'c'),
            (self.write, 'w'),
            (self.delete, 'd'),
            (self.list, 'l'),
        ]
        .iter()
        .filter(|(on, _)| *on)
        .map(|(_, c)| *c)
        .collect()
    }
}

/// Object store interface
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Fetch a blob, `None` when it does not exist
    async fn get(&self, container: &str, path: &str) -> Result<Option<StoredBlob>>;

    /// Create or overwrite a blob
    async fn put(&self, container: &str, path: &str, data: Vec<u8>, content_type: &str)
        -> Result<()>;

    /// Delete a blob; `false` when it did not exist
    async fn delete(&self, container: &str, path: &str) -> Result<bool>;

    /// Blob names under a prefix, in lexical order
    async fn list(&self, container: &str, prefix: &str) -> Result<Vec<String>>;

    /// Time-boxed URL granting `scope` on a whole container
    fn container_access_url(&self, container: &str, scope: AccessScope, ttl: Duration)
        -> Result<String>;

    /// Time-boxed URL granting `scope` on a single blob
    fn blob_access_url(
        &self,
        container: &str,
        path: &str,
        scope: AccessScope,
        ttl: Duration,
    ) -> Result<String>;

    /// Check that a scoped URL actually resolves (HEAD)
    async fn verify_access(&self, url: &str) -> Result<()>;

    /// Delete every blob under `prefix`, returning the number deleted
    async fn clear_prefix(&self, container: &str, prefix: &str) -> Result<usize> {
        let mut deleted = 0;
        for name in self.list(container, prefix).await? {
            if self.delete(container, &name).await? {
                deleted += 1;
            }
        }
        Ok(deleted)
    }

    /// Fetch at `path`, then by bare basename
    ///
    /// Returns the path that matched together with the blob.
    async fn get_with_fallback(
        &self,
        container: &str,
        path: &str,
    ) -> Result<Option<(String, StoredBlob)>> {
        if let Some(blob) = self.get(container, path).await? {
            return Ok(Some((path.to_string(), blob)));
        }
        let base = layout::basename(path);
        if !base.is_empty() && base != path {
            if let Some(blob) = self.get(container, &base).await? {
                return Ok(Some((base, blob)));
            }
        }
        Ok(None)
    }
}

// ============================================================================
// Mock Implementations for Testing
// ============================================================================

pub mod mocks {
    use super::*;
    use crate::error::AppError;
    use std::collections::BTreeMap;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// In-memory object store issuing `memory://` access URLs
    ///
    /// URL shapes: `memory://<container>?sp=<perm>&ttl=<secs>` and
    /// `memory://<container>/<path>?sp=<perm>&ttl=<secs>`.
    #[derive(Default)]
    pub struct InMemoryObjectStore {
        blobs: Mutex<BTreeMap<(String, String), StoredBlob>>,
        fail_reads: AtomicBool,
        fail_verify: AtomicBool,
        puts: AtomicUsize,
    }

    impl InMemoryObjectStore {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn insert(&self, container: &str, path: &str, data: impl Into<Vec<u8>>) {
            self.blobs.lock().unwrap().insert(
                (container.to_string(), path.to_string()),
                StoredBlob {
                    data: data.into(),
                    content_type: None,
                },
            );
        }

        pub fn blob(&self, container: &str, path: &str) -> Option<Vec<u8>> {
            self.blobs
                .lock()
                .unwrap()
                .get(&(container.to_string(), path.to_string()))
                .map(|b| b.data.clone())
        }

        pub fn names(&self, container: &str) -> Vec<String> {
            self.blobs
                .lock()
                .unwrap()
                .keys()
                .filter(|(c, _)| c == container)
                .map(|(_, p)| p.clone())
                .collect()
        }

        /// Make every `get` fail with a storage error
        pub fn set_fail_reads(&self, fail: bool) {
            self.fail_reads.store(fail, Ordering::SeqCst);
        }

        /// Make preflight checks fail
        pub fn set_fail_verify(&self, fail: bool) {
            self.fail_verify.store(fail, Ordering::SeqCst);
        }

        pub fn put_count(&self) -> usize {
            self.puts.load(Ordering::SeqCst)
        }

        /// Split a `memory://` URL into (container, optional blob path)
        pub fn parse_url(url: &str) -> Option<(String, Option<String>)> {
            let rest = url.strip_prefix("memory://")?;
            let location = rest.split('?').next().unwrap_or(rest);
            match location.split_once('/') {
                Some((container, path)) if !path.is_empty() => {
                    Some((container.to_string(), Some(path.to_string())))
                }
                Some((container, _)) => Some((container.to_string(), None)),
                None => Some((location.to_string(), None)),
            }
        }
    }

    #[async_trait]
    impl ObjectStore for InMemoryObjectStore {
        async fn get(&self, container: &str, path: &str) -> Result<Option<StoredBlob>> {
            if self.fail_reads.load(Ordering::SeqCst) {
                return Err(AppError::Storage("injected read failure".to_string()));
            }
            Ok(self
                .blobs
                .lock()
                .unwrap()
                .get(&(container.to_string(), path.to_string()))
                .cloned())
        }

        async fn put(
            &self,
            container: &str,
            path: &str,
            data: Vec<u8>,
            content_type: &str,
        ) -> Result<()> {
            self.puts.fetch_add(1, Ordering::SeqCst);
            self.blobs.lock().unwrap().insert(
                (container.to_string(), path.to_string()),
                StoredBlob {
                    data,
                    content_type: Some(content_type.to_string()),
                },
            );
            Ok(())
        }

        async fn delete(&self, container: &str, path: &str) -> Result<bool> {
            Ok(self
                .blobs
                .lock()
                .unwrap()
                .remove(&(container.to_string(), path.to_string()))
                .is_some())
        }

        async fn list(&self, container: &str, prefix: &str) -> Result<Vec<String>> {
            Ok(self
                .names(container)
                .into_iter()
                .filter(|p| p.starts_with(prefix))
                .collect())
        }

        fn container_access_url(
            &self,
            container: &str,
            scope: AccessScope,
            ttl: Duration,
        ) -> Result<String> {
            Ok(format!(
                "memory://{}?sp={}&ttl={}",
                container,
                scope.permissions(),
                ttl.as_secs()
            ))
        }

        fn blob_access_url(
            &self,
            container: &str,
            path: &str,
            scope: AccessScope,
            ttl: Duration,
        ) -> Result<String> {
            Ok(format!(
                "memory://{}/{}?sp={}&ttl={}",
                container,
                path,
                scope.permissions(),
                ttl.as_secs()
            ))
        }

        async fn verify_access(&self, url: &str) -> Result<()> {
            if self.fail_verify.load(Ordering::SeqCst) {
                return Err(AppError::Storage(format!("HEAD {} returned 403", url)));
            }
            match Self::parse_url(url) {
                Some((container, Some(path))) => {
                    let exists = self
                        .blobs
                        .lock()
                        .unwrap()
                        .contains_key(&(container, path.clone()));
                    if exists {
                        Ok(())
                    } else {
                        Err(AppError::Storage(format!("HEAD {} returned 404", path)))
                    }
                }
                Some((_, None)) => Ok(()),
                None => Err(AppError::Validation(format!("not a memory url: {}", url))),
            }
        }
    }
}
