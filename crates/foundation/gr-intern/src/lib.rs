//! Identifier interning
//!
//! Every identifier in a tree is held as a [`Symbol`], one machine word,
//! so renames and equality checks never touch string data. The interner is
//! shared by value: clones point at the same table, which keeps symbols
//! minted by different trees of one compilation comparable.

pub use lasso::Spur as Symbol;
use lasso::ThreadedRodeo;
use std::sync::{Arc, Mutex};

/// Shared string-to-symbol table
#[derive(Clone)]
pub struct Interner {
    table: Arc<Mutex<ThreadedRodeo>>,
}

impl Interner {
    /// Creates an empty table
    pub fn new() -> Self {
        Self {
            table: Arc::new(Mutex::new(ThreadedRodeo::new())),
        }
    }

    /// The symbol for `text`, minting one on first sight
    #[allow(clippy::unwrap_used, reason = "interner mutex cannot be poisoned without a prior panic")]
    pub fn intern(&self, text: &str) -> Symbol {
        self.table.lock().unwrap().get_or_intern(text)
    }

    /// The text a symbol was minted from
    #[allow(clippy::unwrap_used, reason = "interner mutex cannot be poisoned without a prior panic")]
    pub fn resolve(&self, sym: &Symbol) -> String {
        self.table.lock().unwrap().resolve(sym).to_owned()
    }

    /// Like [`Self::resolve`], but returns `None` for symbols this table
    /// never minted
    #[allow(clippy::unwrap_used, reason = "interner mutex cannot be poisoned without a prior panic")]
    pub fn try_resolve(&self, sym: &Symbol) -> Option<String> {
        self.table
            .lock()
            .unwrap()
            .try_resolve(sym)
            .map(str::to_owned)
    }
}

impl Default for Interner {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_intern_round_trip() {
        let interner = Interner::new();
        let sym = interner.intern("callee");
        assert_eq!(interner.resolve(&sym), "callee");
        assert_eq!(interner.intern("callee"), sym);
    }

    #[test]
    fn test_clones_share_one_table() {
        let interner = Interner::new();
        let alias = interner.clone();
        let sym = alias.intern("shared");
        assert_eq!(interner.try_resolve(&sym).as_deref(), Some("shared"));
    }
}
