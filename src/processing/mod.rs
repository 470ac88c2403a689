//! Input preparation: keyword normalization, volume parsing and file loading.

mod loader;
mod normalize;

pub use loader::{
    decode_bytes, load_keywords_from_file, parse_keywords, KEYWORD_COLUMN_ALIASES,
    VOLUME_COLUMN_ALIASES,
};
pub use normalize::{normalize_keyword, parse_volume, parse_volume_f64, parse_volume_str};
