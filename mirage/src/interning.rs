use std::{
    fmt,
    sync::{Arc, LazyLock},
};

use ahash::AHashMap;
use parking_lot::RwLock;

/// Handle to a process-wide interned selector string.
///
/// Two symbols compare equal iff they were interned from the same text.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Symbol(u32);

struct InternedStringsImpl {
    table: Vec<Arc<str>>,
    mappings: AHashMap<Arc<str>, Symbol>,
}

static STRINGS: LazyLock<RwLock<InternedStringsImpl>> =
    LazyLock::new(|| RwLock::new(InternedStringsImpl::new()));

const ASSIGNMENT_MARKER: &str = ":=";

impl InternedStringsImpl {
    fn new() -> Self {
        Self {
            table: Vec::new(),
            mappings: AHashMap::new(),
        }
    }

    fn get_or_add(&mut self, value: &str) -> Symbol {
        // another thread may have won the race between read and write lock
        if let Some(&symbol) = self.mappings.get(value) {
            return symbol;
        }
        let symbol = Symbol(self.table.len() as u32);
        let interned = Arc::<str>::from(value);
        self.table.push(interned.clone());
        self.mappings.insert(interned, symbol);
        symbol
    }
}

impl Symbol {
    pub fn intern(value: &str) -> Self {
        if let Some(&symbol) = STRINGS.read().mappings.get(value) {
            return symbol;
        }
        STRINGS.write().get_or_add(value)
    }

    pub fn as_str(self) -> Arc<str> {
        STRINGS.read().table[self.0 as usize].clone()
    }

    /// `x:=` style selectors name the mutator of field `x`.
    pub fn is_assignment(self) -> bool {
        let text = self.as_str();
        text.len() > ASSIGNMENT_MARKER.len()
            && text.ends_with(ASSIGNMENT_MARKER)
    }

    /// `x:=` -> `x`
    pub fn assignment_target(self) -> Option<Symbol> {
        let text = self.as_str();
        let stripped = text.strip_suffix(ASSIGNMENT_MARKER)?;
        if stripped.is_empty() {
            return None;
        }
        Some(Symbol::intern(stripped))
    }

    /// `x` -> `x:=`
    pub fn assignment(self) -> Symbol {
        let text = self.as_str();
        Symbol::intern(&format!("{text}{ASSIGNMENT_MARKER}"))
    }
}

impl fmt::Debug for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.as_str())
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.as_str())
    }
}

impl From<&str> for Symbol {
    fn from(value: &str) -> Self {
        Symbol::intern(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn interning_is_idempotent() {
        let a = Symbol::intern("foo");
        let b = Symbol::intern("foo");
        let c = Symbol::intern("bar");
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(&*a.as_str(), "foo");
    }

    #[test]
    fn assignment_selectors() {
        let x = Symbol::intern("x");
        let assign = x.assignment();
        assert_eq!(&*assign.as_str(), "x:=");
        assert!(assign.is_assignment());
        assert!(!x.is_assignment());
        assert_eq!(assign.assignment_target(), Some(x));
        assert_eq!(Symbol::intern(":=").assignment_target(), None);
        assert!(!Symbol::intern(":=").is_assignment());
    }

    #[test]
    fn concurrent_interning_agrees() {
        let handles: Vec<_> = (0..8)
            .map(|_| {
                thread::spawn(|| {
                    (0..64)
                        .map(|i| Symbol::intern(&format!("sym-{i}")))
                        .collect::<Vec<_>>()
                })
            })
            .collect();
        let results: Vec<_> =
            handles.into_iter().map(|h| h.join().unwrap()).collect();
        for other in &results[1..] {
            assert_eq!(&results[0], other);
        }
    }
}
