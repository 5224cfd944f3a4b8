// First-fit batcher
use crate::domain::{DocumentPart, TranslationBatch};

/// Group parts into batches whose summed size stays within `max_batch_bytes`
///
/// Parts are taken in name order and appended to the open batch until the
/// next one would overflow it; then a new batch is opened. A part larger than
/// the ceiling on its own still gets a batch of its own.
pub fn batch_parts(mut parts: Vec<DocumentPart>, max_batch_bytes: u64) -> Vec<TranslationBatch> {
    parts.sort_by_key(DocumentPart::name);

    let mut batches: Vec<TranslationBatch> = Vec::new();
    let mut current: Vec<DocumentPart> = Vec::new();
    let mut current_size: u64 = 0;

    for part in parts {
        let size = part.size();
        if !current.is_empty() && current_size + size > max_batch_bytes {
            batches.push(TranslationBatch {
                index: batches.len() + 1,
                parts: std::mem::take(&mut current),
            });
            current_size = 0;
        }
        current_size += size;
        current.push(part);
    }
    if !current.is_empty() {
        batches.push(TranslationBatch {
            index: batches.len() + 1,
            parts: current,
        });
    }
    batches
}
