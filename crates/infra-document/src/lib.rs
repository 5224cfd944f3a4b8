// Doctrans Infrastructure - Document Adapters
// Implements: DocumentConverter (LibreOffice subprocess), PdfEngine (lopdf)

pub mod lopdf_engine;
pub mod office_converter;

pub use lopdf_engine::LopdfEngine;
pub use office_converter::OfficeConverter;
