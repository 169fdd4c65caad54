use std::collections::BTreeMap;

use bitvec::prelude::*;
use serde::{Deserialize, Serialize};

/// Word address to source line, and which words hold code rather than `DAT`.
#[derive(Debug, Clone, Default)]
pub struct SourceMap {
    lines: Vec<usize>,
    first: BTreeMap<usize, u16>,
    code: BitVec,
    labels: BTreeMap<String, u16>,
}

/// Flattened form written next to an image by the command line tools.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MapExport {
    pub labels: BTreeMap<String, u16>,
    pub lines: BTreeMap<u16, usize>,
    pub code: Vec<[u16; 2]>,
}

impl SourceMap {
    pub(crate) fn record(&mut self, line: usize, count: usize, is_code: bool) {
        if count == 0 {
            return;
        }
        self.first.entry(line).or_insert(self.lines.len() as u16);
        for _ in 0..count {
            self.lines.push(line);
            self.code.push(is_code);
        }
    }

    pub(crate) fn set_labels(&mut self, labels: impl IntoIterator<Item = (String, u16)>) {
        self.labels = labels.into_iter().collect();
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn line_of(&self, addr: u16) -> Option<usize> {
        self.lines.get(addr as usize).copied()
    }

    /// First word emitted for `line`.
    pub fn addr_of(&self, line: usize) -> Option<u16> {
        self.first.get(&line).copied()
    }

    pub fn is_code(&self, addr: u16) -> bool {
        self.code.get(addr as usize).map(|b| *b).unwrap_or(false)
    }

    pub fn label(&self, name: &str) -> Option<u16> {
        self.labels.get(name).copied()
    }

    /// Half-open `[start, end)` runs of code words.
    pub fn code_ranges(&self) -> Vec<[u16; 2]> {
        let mut out = Vec::new();
        let mut start = None;
        for (i, bit) in self.code.iter().by_vals().enumerate() {
            match (bit, start) {
                (true, None) => start = Some(i),
                (false, Some(s)) => {
                    out.push([s as u16, i as u16]);
                    start = None;
                }
                _ => {}
            }
        }
        if let Some(s) = start {
            // An image filling all of memory ends at 0x10000; clamp to the last word.
            out.push([s as u16, self.code.len().min(u16::MAX as usize) as u16]);
        }
        out
    }

    pub fn export(&self) -> MapExport {
        let lines = self
            .lines
            .iter()
            .enumerate()
            .map(|(addr, line)| (addr as u16, *line))
            .collect();
        MapExport {
            labels: self.labels.clone(),
            lines,
            code: self.code_ranges(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn records_lines_and_code_runs() {
        let mut m = SourceMap::default();
        m.record(1, 2, true);
        m.record(2, 3, false);
        m.record(4, 1, true);
        assert_eq!(m.line_of(1), Some(1));
        assert_eq!(m.line_of(4), Some(2));
        assert_eq!(m.addr_of(4), Some(5));
        assert_eq!(m.addr_of(3), None);
        assert!(m.is_code(0));
        assert!(!m.is_code(3));
        assert_eq!(m.code_ranges(), vec![[0, 2], [5, 6]]);
    }
}
