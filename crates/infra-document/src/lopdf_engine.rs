// PDF page operations on lopdf

use doctrans_core::error::{AppError, Result};
use doctrans_core::port::{PageSource, PdfEngine};
use lopdf::{Dictionary, Document, Object, ObjectId};
use std::collections::BTreeMap;
use std::ops::Range;
use tracing::debug;

/// Page attributes a page may inherit from its ancestors in the page tree
const INHERITABLE: [&[u8]; 4] = [b"Resources", b"MediaBox", b"CropBox", b"Rotate"];

/// Guard against cyclic `Parent` chains in damaged files
const MAX_TREE_DEPTH: usize = 64;

#[derive(Debug, Default, Clone, Copy)]
pub struct LopdfEngine;

impl LopdfEngine {
    pub fn new() -> Self {
        Self
    }
}

impl PdfEngine for LopdfEngine {
    fn open(&self, data: &[u8]) -> Result<Box<dyn PageSource>> {
        let document = Document::load_mem(data).map_err(|e| pdf_error("load", e))?;
        let page_count = document.get_pages().len();
        debug!(pages = page_count, bytes = data.len(), "PDF loaded");
        Ok(Box::new(LopdfPages {
            document,
            page_count,
        }))
    }

    fn merge(&self, documents: &[Vec<u8>]) -> Result<Vec<u8>> {
        match documents {
            [] => Err(AppError::Document("Nothing to merge".to_string())),
            [single] => Ok(single.clone()),
            many => merge_documents(many),
        }
    }
}

struct LopdfPages {
    document: Document,
    page_count: usize,
}

impl PageSource for LopdfPages {
    fn page_count(&self) -> usize {
        self.page_count
    }

    fn extract(&self, pages: Range<usize>) -> Result<Vec<u8>> {
        if pages.is_empty() || pages.end > self.page_count {
            return Err(AppError::Document(format!(
                "Page range {}..{} outside 0..{}",
                pages.start, pages.end, self.page_count
            )));
        }

        let mut doc = self.document.clone();
        // get_pages numbers pages from 1
        let drop: Vec<u32> = doc
            .get_pages()
            .keys()
            .copied()
            .filter(|n| !pages.contains(&(*n as usize - 1)))
            .collect();
        if !drop.is_empty() {
            doc.delete_pages(&drop);
            doc.prune_objects();
        }
        save(&mut doc)
    }
}

fn merge_documents(documents: &[Vec<u8>]) -> Result<Vec<u8>> {
    let mut max_id = 1;
    let mut pages: Vec<(ObjectId, Dictionary)> = Vec::new();
    let mut objects: BTreeMap<ObjectId, Object> = BTreeMap::new();

    for data in documents {
        let mut doc = Document::load_mem(data).map_err(|e| pdf_error("load", e))?;
        doc.renumber_objects_with(max_id);
        max_id = doc.max_id + 1;

        for page_id in doc.get_pages().into_values() {
            pages.push((page_id, flatten_page(&doc, page_id)?));
        }
        objects.extend(doc.objects);
    }

    let mut merged = Document::with_version("1.5");
    let mut catalog: Option<(ObjectId, Dictionary)> = None;
    let mut pages_id: Option<ObjectId> = None;

    for (id, object) in objects {
        match object.type_name().unwrap_or_default() {
            b"Catalog" => {
                if catalog.is_none() {
                    catalog = object.as_dict().ok().map(|d| (id, d.clone()));
                }
            }
            b"Pages" => {
                pages_id.get_or_insert(id);
            }
            // Pages are re-inserted below; outlines point into the old trees
            b"Page" | b"Outlines" | b"Outline" => {}
            _ => {
                merged.objects.insert(id, object);
            }
        }
    }

    let (catalog_id, mut catalog) =
        catalog.ok_or_else(|| AppError::Document("No catalog in merged input".to_string()))?;
    let pages_id =
        pages_id.ok_or_else(|| AppError::Document("No page tree in merged input".to_string()))?;

    let kids: Vec<Object> = pages.iter().map(|(id, _)| Object::Reference(*id)).collect();
    let count = pages.len();
    for (id, mut page) in pages {
        page.set("Parent", Object::Reference(pages_id));
        merged.objects.insert(id, Object::Dictionary(page));
    }

    let mut tree = Dictionary::new();
    tree.set("Type", Object::Name(b"Pages".to_vec()));
    tree.set("Count", Object::Integer(count as i64));
    tree.set("Kids", Object::Array(kids));
    merged.objects.insert(pages_id, Object::Dictionary(tree));

    catalog.set("Pages", Object::Reference(pages_id));
    catalog.remove(b"Outlines");
    merged.objects.insert(catalog_id, Object::Dictionary(catalog));
    merged.trailer.set("Root", Object::Reference(catalog_id));

    merged.max_id = merged.objects.keys().map(|(n, _)| *n).max().unwrap_or(0);
    merged.renumber_objects();
    merged.compress();

    debug!(documents = documents.len(), pages = count, "PDF documents merged");
    save(&mut merged)
}

/// Page dictionary with inherited attributes copied down
fn flatten_page(doc: &Document, page_id: ObjectId) -> Result<Dictionary> {
    let mut page = doc
        .get_object(page_id)
        .and_then(Object::as_dict)
        .map_err(|e| pdf_error("read page", e))?
        .clone();

    let mut parent = page.get(b"Parent").and_then(Object::as_reference).ok();
    let mut depth = 0;
    while let Some(node_id) = parent {
        depth += 1;
        if depth > MAX_TREE_DEPTH {
            break;
        }
        let Ok(node) = doc.get_object(node_id).and_then(Object::as_dict) else {
            break;
        };
        for key in INHERITABLE {
            if !page.has(key) {
                if let Ok(value) = node.get(key) {
                    page.set(key.to_vec(), value.clone());
                }
            }
        }
        parent = node.get(b"Parent").and_then(Object::as_reference).ok();
    }
    Ok(page)
}

fn save(doc: &mut Document) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    doc.save_to(&mut out).map_err(|e| pdf_error("save", e))?;
    Ok(out)
}

fn pdf_error(action: &str, err: impl std::fmt::Display) -> AppError {
    AppError::Document(format!("PDF {} failed: {}", action, err))
}
