// Glossary Composer Port (Interface)

use crate::error::Result;
use async_trait::async_trait;

/// Builds a TSV glossary (`source<TAB>target` per line) from a text sample
///
/// An empty result means "no glossary".
#[async_trait]
pub trait GlossaryComposer: Send + Sync {
    async fn compose(&self, source_lang: &str, target_lang: &str, sample: &str) -> Result<Vec<u8>>;
}

pub mod mocks {
    use super::*;
    use crate::error::AppError;

    /// Always fails
    pub struct FailingGlossary;

    #[async_trait]
    impl GlossaryComposer for FailingGlossary {
        async fn compose(&self, _source_lang: &str, _target_lang: &str, _sample: &str) -> Result<Vec<u8>> {
            Err(AppError::Internal("glossary backend unavailable".to_string()))
        }
    }

    /// Returns fixed bytes
    pub struct StaticGlossary(pub Vec<u8>);

    #[async_trait]
    impl GlossaryComposer for StaticGlossary {
        async fn compose(&self, _source_lang: &str, _target_lang: &str, _sample: &str) -> Result<Vec<u8>> {
            Ok(self.0.clone())
        }
    }
}
