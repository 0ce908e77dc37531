//! Interned symbols.
//!
//! Every symbol name is folded to lowercase and stored once in a
//! thread-local table, so two symbols with the same name are the same `Rc`
//! and can be compared by pointer.

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::rc::Rc;

#[derive(Clone)]
pub struct Symbol(Rc<str>);

thread_local! {
    static SYMBOL_TABLE: RefCell<HashMap<String, Symbol>> = RefCell::new(HashMap::new());
}

/// Return the unique symbol for `name` (case-insensitive).
pub fn intern_symbol(name: &str) -> Symbol {
    let name = name.to_lowercase();
    SYMBOL_TABLE.with(|table| {
        let mut table = table.borrow_mut();
        if let Some(sym) = table.get(&name) {
            return sym.clone();
        }
        let sym = Symbol(Rc::from(name.as_str()));
        table.insert(name, sym.clone());
        sym
    })
}

impl Symbol {
    pub fn name(&self) -> &str {
        &self.0
    }

    pub fn is(&self, name: &str) -> bool {
        &*self.0 == name
    }
}

impl PartialEq for Symbol {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl Eq for Symbol {}

impl Hash for Symbol {
    fn hash<H: Hasher>(&self, state: &mut H) {
        (Rc::as_ptr(&self.0) as *const u8 as usize).hash(state);
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Symbol({})", &self.0)
    }
}
