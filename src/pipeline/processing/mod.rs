// Pipeline processing: delimited table parsing and wide-to-long normalization

pub mod normalize;
pub mod table;

pub use normalize::{normalize, normalize_bytes};
pub use table::{Cell, RawTable};
