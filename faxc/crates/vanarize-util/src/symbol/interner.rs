//! String interner backing [`Symbol`].
//!
//! A single `Mutex<FxHashMap<...>>` guards the table. The compiler's
//! single-threaded resource model means lock-free concurrent interning buys
//! nothing here - a plain mutex is simpler and still `Sync` for the rare
//! case a caller shares a `Symbol` across threads.

use rustc_hash::FxHashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{LazyLock, Mutex};

use super::{InternerStats, Symbol};

/// Global string table, populated with the known keywords on first use.
pub static STRING_TABLE: LazyLock<StringTable> = LazyLock::new(|| {
    let table = StringTable::new();
    table.initialize_known_symbols();
    table
});

struct Inner {
    /// string -> index, for the intern fast path
    by_str: FxHashMap<&'static str, u32>,
    /// index -> string, for `Symbol::as_str`
    by_index: Vec<&'static str>,
}

/// Interned-string table. Strings are leaked to obtain `'static` references;
/// acceptable because the table lives for the process lifetime and nothing
/// is ever removed.
pub struct StringTable {
    inner: Mutex<Inner>,
    hits: AtomicUsize,
    misses: AtomicUsize,
}

impl StringTable {
    fn new() -> Self {
        StringTable {
            inner: Mutex::new(Inner { by_str: FxHashMap::default(), by_index: Vec::new() }),
            hits: AtomicUsize::new(0),
            misses: AtomicUsize::new(0),
        }
    }

    fn initialize_known_symbols(&self) {
        for s in super::KNOWN_SYMBOLS {
            self.intern(s);
        }
    }

    pub fn intern(&self, s: &str) -> Symbol {
        {
            let inner = self.inner.lock().unwrap();
            if let Some(&index) = inner.by_str.get(s) {
                self.hits.fetch_add(1, Ordering::Relaxed);
                return Symbol { index };
            }
        }
        let mut inner = self.inner.lock().unwrap();
        // Re-check: another caller may have interned `s` between the
        // unlock above and this lock.
        if let Some(&index) = inner.by_str.get(s) {
            self.hits.fetch_add(1, Ordering::Relaxed);
            return Symbol { index };
        }
        self.misses.fetch_add(1, Ordering::Relaxed);
        let leaked: &'static str = Box::leak(s.to_owned().into_boxed_str());
        let index = inner.by_index.len() as u32;
        inner.by_index.push(leaked);
        inner.by_str.insert(leaked, index);
        Symbol { index }
    }

    pub fn get(&self, sym: Symbol) -> Option<&'static str> {
        let inner = self.inner.lock().unwrap();
        inner.by_index.get(sym.index as usize).copied()
    }

    pub fn stats(&self) -> InternerStats {
        let inner = self.inner.lock().unwrap();
        InternerStats {
            count: inner.by_index.len(),
            capacity: inner.by_str.capacity(),
            collisions: 0,
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }

    #[cfg(test)]
    pub fn reset_stats(&self) {
        self.hits.store(0, Ordering::Relaxed);
        self.misses.store(0, Ordering::Relaxed);
    }
}
