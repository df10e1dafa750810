//! String interning for symbols.
//!
//! Template, class, slot, rule, and function names, as well as symbol field
//! values, are interned so equality and hashing are integer operations.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Interned symbol identifier.
#[derive(Copy, Clone, Eq, PartialEq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SymbolId(pub(crate) u32);

impl SymbolId {
    /// Returns the raw index of this symbol.
    #[must_use]
    pub const fn index(self) -> u32 {
        self.0
    }

    /// Reserved symbol `nil`.
    pub const NIL: SymbolId = SymbolId(0);

    /// Reserved symbol `TRUE`.
    pub const TRUE: SymbolId = SymbolId(1);

    /// Reserved symbol `FALSE`.
    pub const FALSE: SymbolId = SymbolId(2);
}

impl fmt::Debug for SymbolId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SymbolId({})", self.0)
    }
}

/// Interner for symbol names.
///
/// Not thread-safe; the engine owns exactly one.
#[derive(Clone, Debug, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Interner {
    /// Symbol storage indexed by `SymbolId`.
    strings: Vec<Arc<str>>,
    /// Map from string to its symbol.
    lookup: HashMap<Arc<str>, SymbolId>,
}

impl Interner {
    /// Reserved symbols that are pre-interned at startup.
    const RESERVED: &'static [&'static str] = &["nil", "TRUE", "FALSE"];

    /// Creates a new interner with the reserved symbols pre-interned.
    #[must_use]
    pub fn new() -> Self {
        let mut interner = Self::default();
        for (i, &name) in Self::RESERVED.iter().enumerate() {
            let id = interner.intern(name);
            debug_assert_eq!(id.0 as usize, i, "reserved symbol '{name}' out of place");
        }
        interner
    }

    /// Interns a string, returning its [`SymbolId`].
    ///
    /// # Panics
    ///
    /// Panics if the number of interned symbols exceeds `u32::MAX`.
    pub fn intern(&mut self, s: &str) -> SymbolId {
        if let Some(&id) = self.lookup.get(s) {
            return id;
        }
        let id = SymbolId(u32::try_from(self.strings.len()).expect("too many symbols"));
        let arc: Arc<str> = s.into();
        self.strings.push(arc.clone());
        self.lookup.insert(arc, id);
        id
    }

    /// Looks up a string without interning it.
    #[must_use]
    pub fn get(&self, s: &str) -> Option<SymbolId> {
        self.lookup.get(s).copied()
    }

    /// Resolves a symbol to its string.
    #[must_use]
    pub fn resolve(&self, id: SymbolId) -> Option<&str> {
        self.strings.get(id.0 as usize).map(AsRef::as_ref)
    }

    /// Resolves a symbol to its string, falling back to a placeholder.
    #[must_use]
    pub fn name(&self, id: SymbolId) -> &str {
        self.resolve(id).unwrap_or("<unknown>")
    }

    /// Returns the number of interned symbols.
    #[must_use]
    pub fn len(&self) -> usize {
        self.strings.len()
    }

    /// Returns true if nothing beyond the reserved symbols is interned.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.strings.len() <= Self::RESERVED.len()
    }
}
