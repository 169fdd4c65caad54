pub mod listing;
pub mod model;

pub use listing::{render, ListingOptions};
pub use model::{bytes_to_words, load_image, words_to_bytes, ByteOrder};
