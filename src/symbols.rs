use log::debug;

use crate::model::{Symbol, Symbols, Value};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SymbolTable {
    bindings: Symbols,
}

impl SymbolTable {
    pub fn new() -> Self {
        debug!("new symbol table");
        Self::default()
    }
    pub fn add_binding(&mut self, var: String, value: Value) -> Option<Symbol> {
        debug!("add binding: {var} <- {value}");
        let previous = self.bindings.insert(var, value.into());
        if let Some(previous) = &previous {
            debug!("replaced previous value {}", previous.value);
        }
        previous
    }
    pub fn get_binding(&self, var: &str) -> Option<&Value> {
        debug!("get binding: {var}");
        self.bindings.get(var).map(|symbol| &symbol.value)
    }
    pub fn contains(&self, var: &str) -> bool {
        self.bindings.contains_key(var)
    }
    pub fn into_symbols(self) -> Symbols {
        self.bindings
    }
}
