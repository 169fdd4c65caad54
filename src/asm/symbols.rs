use std::collections::BTreeMap;

use serde::Serialize;

use super::AsmError;

/// Label name to word address. Names are case sensitive.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct SymbolTable {
    labels: BTreeMap<String, u16>,
}

impl SymbolTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn define(&mut self, name: &str, addr: u16, line: usize) -> Result<(), AsmError> {
        if self.labels.contains_key(name) {
            return Err(AsmError::DuplicateLabel { name: name.to_string(), line });
        }
        self.labels.insert(name.to_string(), addr);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<u16> {
        self.labels.get(name).copied()
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, u16)> {
        self.labels.iter().map(|(k, v)| (k.as_str(), *v))
    }

    /// Labels sitting exactly at `addr`, for listings.
    pub fn names_at(&self, addr: u16) -> Vec<&str> {
        self.iter().filter(|(_, a)| *a == addr).map(|(n, _)| n).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_definition_is_rejected() {
        let mut t = SymbolTable::new();
        t.define("loop", 4, 1).unwrap();
        let err = t.define("loop", 9, 5).unwrap_err();
        assert_eq!(err, AsmError::DuplicateLabel { name: "loop".into(), line: 5 });
        assert_eq!(t.get("loop"), Some(4));
        assert_eq!(t.get("LOOP"), None);
    }
}
