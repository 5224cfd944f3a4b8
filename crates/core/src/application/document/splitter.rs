// Size-bounded, order-preserving PDF splitter
use crate::domain::DocumentPart;
use crate::error::{AppError, Result};
use crate::port::PdfEngine;
use tracing::{debug, warn};

/// Split a PDF into parts no larger than `max_bytes`
///
/// Greedy: each part is extended one page at a time until the next page
/// would push it over the ceiling. A single page that alone exceeds the
/// ceiling becomes its own (oversized) part. A document already within the
/// ceiling yields exactly one part holding the original bytes.
///
/// CPU bound; run inside `spawn_blocking`.
pub fn split_by_size(engine: &dyn PdfEngine, data: &[u8], max_bytes: u64) -> Result<Vec<DocumentPart>> {
    let source = engine.open(data)?;
    let page_count = source.page_count();
    if page_count == 0 {
        return Err(AppError::Document("PDF has no pages".to_string()));
    }

    if data.len() as u64 <= max_bytes {
        return Ok(vec![DocumentPart {
            index: 1,
            pages: 0..page_count,
            bytes: data.to_vec(),
            oversized: false,
        }]);
    }

    let mut parts: Vec<DocumentPart> = Vec::new();
    let mut start = 0;
    while start < page_count {
        let mut accepted: Option<(usize, Vec<u8>)> = None;
        let mut end = start + 1;
        while end <= page_count {
            let candidate = source.extract(start..end)?;
            if candidate.len() as u64 > max_bytes {
                break;
            }
            accepted = Some((end, candidate));
            end += 1;
        }

        let index = parts.len() + 1;
        match accepted {
            Some((end, bytes)) => {
                debug!(part = index, first_page = start, last_page = end - 1, bytes = bytes.len(), "Part committed");
                parts.push(DocumentPart {
                    index,
                    pages: start..end,
                    bytes,
                    oversized: false,
                });
                start = end;
            }
            None => {
                let bytes = source.extract(start..start + 1)?;
                warn!(
                    part = index,
                    page = start,
                    bytes = bytes.len(),
                    max_bytes,
                    "Single page exceeds the per-document ceiling; submitting it alone"
                );
                parts.push(DocumentPart {
                    index,
                    pages: start..start + 1,
                    bytes,
                    oversized: true,
                });
                start += 1;
            }
        }
    }
    Ok(parts)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::port::document::mocks::FakePdfEngine;

    const MB: usize = 1024 * 1024;

    fn doc(page_sizes: &[usize]) -> Vec<u8> {
        let pages: Vec<String> = page_sizes
            .iter()
            .enumerate()
            .map(|(i, size)| format!("{}:{}", i, "x".repeat(*size)))
            .collect();
        FakePdfEngine::document(&pages)
    }

    fn page_ids(part: &DocumentPart) -> Vec<usize> {
        FakePdfEngine::pages(&part.bytes)
            .unwrap()
            .iter()
            .map(|p| p.split(':').next().unwrap().parse().unwrap())
            .collect()
    }

    #[test]
    fn test_small_document_is_one_identical_part() {
        let data = doc(&[10, 10, 10]);
        let parts = split_by_size(&FakePdfEngine, &data, 10_000).unwrap();

        assert_eq!(parts.len(), 1);
        assert_eq!(parts[0].bytes, data);
        assert_eq!(parts[0].pages, 0..3);
        assert_eq!(parts[0].name(), "part_001.pdf");
    }

    #[test]
    fn test_three_ten_mb_pages_under_fifteen_mb_ceiling() {
        let data = doc(&[10 * MB, 10 * MB, 10 * MB]);
        let parts = split_by_size(&FakePdfEngine, &data, 15 * MB as u64).unwrap();

        assert_eq!(parts.len(), 3);
        for (i, part) in parts.iter().enumerate() {
            assert_eq!(part.pages, i..i + 1);
            assert_eq!(page_ids(part), vec![i]);
            assert!(!part.oversized);
        }
        let names: Vec<String> = parts.iter().map(DocumentPart::name).collect();
        assert_eq!(names, vec!["part_001.pdf", "part_002.pdf", "part_003.pdf"]);
    }

    #[test]
    fn test_parts_preserve_page_order_and_respect_ceiling() {
        let sizes = [300, 500, 200, 900, 100, 100, 700, 50];
        let data = doc(&sizes);
        let max = 1_200;
        let parts = split_by_size(&FakePdfEngine, &data, max).unwrap();

        let all: Vec<usize> = parts.iter().flat_map(page_ids).collect();
        assert_eq!(all, (0..sizes.len()).collect::<Vec<_>>());
        assert!(parts.iter().all(|p| p.size() <= max));
        assert!(parts.len() > 1);
    }

    #[test]
    fn test_oversized_single_page_is_committed_alone() {
        let data = doc(&[100, 5_000, 100]);
        let parts = split_by_size(&FakePdfEngine, &data, 1_000).unwrap();

        assert_eq!(parts.len(), 3);
        assert!(parts[1].oversized);
        assert_eq!(parts[1].pages, 1..2);
        assert!(!parts[0].oversized && !parts[2].oversized);
    }

    #[test]
    fn test_empty_document_is_rejected() {
        let data = FakePdfEngine::document(&[]);
        assert!(split_by_size(&FakePdfEngine, &data, 1).is_err());
    }
}
