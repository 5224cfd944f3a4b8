// Document preparation: normalize -> split -> batch, and merge on the way back

pub mod batcher;
pub mod merger;
pub mod normalizer;
pub mod splitter;

pub use batcher::batch_parts;
pub use merger::Merger;
pub use normalizer::Normalizer;
pub use splitter::split_by_size;
