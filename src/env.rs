//! Lexical environments.
//!
//! An environment is a chain of frames. Each frame maps interned symbols to
//! shared storage cells, so a `set!` through any scope that can reach a cell
//! is visible through every other scope sharing it.

use crate::error::SchemeError;
use crate::symbol::Symbol;
use crate::value::SchemeValue;
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

/// A storage location.
pub type Cell = Rc<RefCell<SchemeValue>>;

pub type EnvRef = Rc<RefCell<Frame>>;

/// A single environment frame containing variable bindings
#[derive(Default)]
pub struct Frame {
    bindings: HashMap<Symbol, Cell>,
    parent: Option<EnvRef>,
}

impl Frame {
    fn get_local(&self, symbol: &Symbol) -> Option<Cell> {
        self.bindings.get(symbol).cloned()
    }

    /// Number of enclosing frames; zero for the global frame.
    pub fn depth(&self) -> usize {
        let mut depth = 0;
        let mut current = self.parent.clone();
        while let Some(frame) = current {
            depth += 1;
            current = frame.borrow().parent.clone();
        }
        depth
    }

    /// Names bound directly in this frame, sorted.
    pub fn local_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.bindings.keys().map(|s| s.name().to_string()).collect();
        names.sort();
        names
    }
}

impl std::fmt::Debug for Frame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Frame")
            .field("names", &self.local_names())
            .field("depth", &self.depth())
            .finish()
    }
}

/// Create the root frame of a chain.
pub fn new_global_env() -> EnvRef {
    Rc::new(RefCell::new(Frame::default()))
}

pub trait EnvOps {
    /// Bind `symbol` to a fresh cell in this frame, shadowing any ancestor.
    fn define(&self, symbol: Symbol, value: SchemeValue);
    /// Find the cell for `symbol`, searching outward.
    fn lookup_cell(&self, symbol: &Symbol) -> Option<Cell>;
    fn lookup(&self, symbol: &Symbol) -> Result<SchemeValue, SchemeError>;
    /// Overwrite the existing cell for `symbol` in place.
    fn assign(&self, symbol: &Symbol, value: SchemeValue) -> Result<(), SchemeError>;
    /// A new, empty child scope.
    fn branch(&self) -> EnvRef;
}

impl EnvOps for EnvRef {
    fn define(&self, symbol: Symbol, value: SchemeValue) {
        self.borrow_mut()
            .bindings
            .insert(symbol, Rc::new(RefCell::new(value)));
    }

    fn lookup_cell(&self, symbol: &Symbol) -> Option<Cell> {
        let mut current = Some(self.clone());
        while let Some(frame_rc) = current {
            let frame = frame_rc.borrow();
            if let Some(cell) = frame.get_local(symbol) {
                return Some(cell);
            }
            current = frame.parent.clone();
        }
        None
    }

    fn lookup(&self, symbol: &Symbol) -> Result<SchemeValue, SchemeError> {
        match self.lookup_cell(symbol) {
            Some(cell) => {
                let value = cell.borrow().clone();
                Ok(value)
            }
            None => Err(SchemeError::UnboundVariable(symbol.name().to_string())),
        }
    }

    fn assign(&self, symbol: &Symbol, value: SchemeValue) -> Result<(), SchemeError> {
        match self.lookup_cell(symbol) {
            Some(cell) => {
                *cell.borrow_mut() = value;
                Ok(())
            }
            None => Err(SchemeError::UnboundVariable(symbol.name().to_string())),
        }
    }

    fn branch(&self) -> EnvRef {
        Rc::new(RefCell::new(Frame {
            bindings: HashMap::new(),
            parent: Some(self.clone()),
        }))
    }
}
