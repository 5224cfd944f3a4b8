// Drive Delivery Port (Interface)
// "Store bytes under a user's drive, return an item id and a web URL"

use crate::domain::DriveItem;
use crate::error::Result;
use async_trait::async_trait;

#[async_trait]
pub trait DriveDelivery: Send + Sync {
    async fn upload(&self, user_id: &str, file_name: &str, data: &[u8]) -> Result<DriveItem>;
}

pub mod mocks {
    use super::*;
    use crate::error::AppError;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Mutex;

    /// Records uploads; can be switched to fail
    #[derive(Default)]
    pub struct MockDrive {
        fail: AtomicBool,
        uploads: Mutex<Vec<(String, String, usize)>>,
    }

    impl MockDrive {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn failing() -> Self {
            let drive = Self::default();
            drive.fail.store(true, Ordering::SeqCst);
            drive
        }

        /// (user, file name, size) per upload
        pub fn uploads(&self) -> Vec<(String, String, usize)> {
            self.uploads.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl DriveDelivery for MockDrive {
        async fn upload(&self, user_id: &str, file_name: &str, data: &[u8]) -> Result<DriveItem> {
            if self.fail.load(Ordering::SeqCst) {
                return Err(AppError::Drive("token request returned 401".to_string()));
            }
            self.uploads
                .lock()
                .unwrap()
                .push((user_id.to_string(), file_name.to_string(), data.len()));
            Ok(DriveItem {
                item_id: format!("item-{}", file_name),
                web_url: format!("https://drive.example/{}/{}", user_id, file_name),
            })
        }
    }
}
