use std::collections::BTreeMap;
use std::fmt::Write as _;

use dcpu16_rs::asm::srcmap::MapExport;
use dcpu16_rs::decoder::Decoder;
use dcpu16_rs::disasm::fmt_decoded;
use dcpu16_rs::isa::dcpu17::Dcpu17Decoder;

#[derive(Debug, Clone, Default)]
pub struct ListingOptions {
    pub start: u16,
    /// Exclusive; defaults to the end of the image.
    pub end: Option<u16>,
    pub show_words: bool,
}

fn in_code(map: &MapExport, addr: u16) -> bool {
    map.code.iter().any(|[s, e]| addr >= *s && addr < *e)
}

/// Text listing of `words`. With a map, labels are printed and data words are
/// never decoded as instructions.
pub fn render(words: &[u16], map: Option<&MapExport>, opts: &ListingOptions) -> String {
    let mut by_addr: BTreeMap<u16, Vec<&str>> = BTreeMap::new();
    if let Some(m) = map {
        for (name, addr) in &m.labels {
            by_addr.entry(*addr).or_default().push(name);
        }
    }

    let dec = Dcpu17Decoder::new();
    let end = opts
        .end
        .map(|e| (e as usize).min(words.len()))
        .unwrap_or(words.len());
    let mut pc = opts.start as usize;
    let mut out = String::new();
    while pc < end {
        let addr = pc as u16;
        for name in by_addr.get(&addr).into_iter().flatten() {
            let _ = writeln!(out, "{name}:");
        }
        let decoded = match map {
            Some(m) if !in_code(m, addr) => None,
            _ => dec.decode(words[pc]),
        };
        let (width, text) = match decoded {
            Some(d) => {
                let w = d.width() as usize;
                let stop = (pc + w).min(words.len());
                (w, fmt_decoded(&d, &words[pc + 1..stop]))
            }
            None => (1, format!("DAT {:#06x}", words[pc])),
        };
        let _ = write!(out, "{addr:04x}: ");
        if opts.show_words {
            let mut cells = String::new();
            for w in &words[pc..(pc + width).min(words.len())] {
                let _ = write!(cells, "{w:04x} ");
            }
            let _ = write!(out, "{cells:<15}");
        }
        let _ = writeln!(out, "{text}");
        pc += width;
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use dcpu16_rs::assemble;
    use pretty_assertions::assert_eq;

    #[test]
    fn labels_and_data_follow_the_map() {
        let out = assemble(":start SET A, 1\n:msg DAT 0x7c01").unwrap();
        let map = out.map.export();
        let text = render(&out.words, Some(&map), &ListingOptions::default());
        assert_eq!(text, "start:\n0000: SET A, 1\nmsg:\n0001: DAT 0x7c01\n");
    }

    #[test]
    fn without_a_map_everything_decodes() {
        let words = [0x7c01, 0x0030];
        let opts = ListingOptions { show_words: true, ..Default::default() };
        assert_eq!(render(&words, None, &opts), "0000: 7c01 0030      SET A, 0x0030\n");
    }
}
