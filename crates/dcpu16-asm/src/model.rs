use anyhow::Result;
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ByteOrder {
    #[default]
    Big,
    Little,
}

impl ByteOrder {
    pub fn little(flag: bool) -> Self {
        if flag {
            ByteOrder::Little
        } else {
            ByteOrder::Big
        }
    }
}

pub fn words_to_bytes(words: &[u16], order: ByteOrder) -> Vec<u8> {
    words
        .iter()
        .flat_map(|w| match order {
            ByteOrder::Big => w.to_be_bytes(),
            ByteOrder::Little => w.to_le_bytes(),
        })
        .collect()
}

/// A trailing odd byte is rejected rather than padded.
pub fn bytes_to_words(bytes: &[u8], order: ByteOrder) -> Result<Vec<u16>> {
    anyhow::ensure!(bytes.len() % 2 == 0, "image has an odd number of bytes ({})", bytes.len());
    anyhow::ensure!(bytes.len() <= 0x2_0000, "image is larger than 65536 words");
    Ok(bytes
        .chunks_exact(2)
        .map(|p| match order {
            ByteOrder::Big => u16::from_be_bytes([p[0], p[1]]),
            ByteOrder::Little => u16::from_le_bytes([p[0], p[1]]),
        })
        .collect())
}

pub fn load_image(path: &Path, order: ByteOrder) -> Result<Vec<u16>> {
    let file = std::fs::read(path)?;
    bytes_to_words(&file, order)
}
