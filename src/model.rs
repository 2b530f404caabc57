use std::collections::BTreeMap;
use std::fmt;

use pest_derive::Parser;
use serde::{Deserialize, Serialize, Serializer};

#[derive(Parser)]
#[grammar = "mdl.pest"]
pub struct MdlGrammar;

pub type Symbols = BTreeMap<String, Symbol>;
pub type Commands = Vec<Command>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Integer(i64),
    #[serde(serialize_with = "finite_float")]
    Float(f64),
    String(String),
    Array(Vec<Value>),
}

fn finite_float<S: Serializer>(f: &f64, serializer: S) -> Result<S::Ok, S::Error> {
    if f.is_finite() {
        serializer.serialize_f64(*f)
    } else {
        Err(serde::ser::Error::custom(format!("non-finite number {f}")))
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Integer(a) => write!(f, "{a}"),
            Value::Float(a) => write!(f, "{a}"),
            Value::String(a) => write!(f, "{a}"),
            Value::Array(a) =>
                write!(f, "[{}]", a.iter().map(|x| x.to_string()).collect::<Vec<_>>().join(",")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SymbolKind {
    Number,
    String,
    Array,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Symbol {
    #[serde(rename = "type")]
    pub kind: SymbolKind,
    pub value: Value,
}

impl From<Value> for Symbol {
    fn from(value: Value) -> Self {
        let kind = match value {
            Value::Integer(_) | Value::Float(_) => SymbolKind::Number,
            Value::String(_) => SymbolKind::String,
            Value::Array(_) => SymbolKind::Array,
        };
        Self { kind, value }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Command {
    pub op: String,
    pub args: Vec<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<Vec<Entry>>,
}

impl Command {
    pub fn new(op: impl Into<String>, args: Vec<Value>) -> Self {
        Self { op: op.into(), args, body: None }
    }

    pub fn block(op: impl Into<String>, args: Vec<Value>, body: Vec<Entry>) -> Self {
        Self { op: op.into(), args, body: Some(body) }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Entry {
    Property { key: String, value: Value },
    Command(Command),
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Parsed {
    pub commands: Commands,
    pub symbols: Symbols,
}

impl Parsed {
    pub fn is_empty(&self) -> bool {
        self.commands.is_empty() && self.symbols.is_empty()
    }
}

/// The document written to stdout. Field order is part of the output format.
#[derive(Debug, Serialize)]
pub struct OutputDocument<'a> {
    pub symbols: &'a Symbols,
    pub commands: &'a [Command],
}

impl<'a> From<&'a Parsed> for OutputDocument<'a> {
    fn from(parsed: &'a Parsed) -> Self {
        Self { symbols: &parsed.symbols, commands: &parsed.commands }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_key_order() {
        let mut parsed = Parsed::default();
        parsed.symbols.insert("x".to_owned(), Value::Integer(5).into());
        parsed.commands.push(Command::new("set", vec![Value::String("x".to_owned()), Value::Integer(5)]));
        let json = serde_json::to_string(&OutputDocument::from(&parsed)).unwrap();
        assert_eq!(json, r#"{"symbols":{"x":{"type":"number","value":5}},"commands":[{"op":"set","args":["x",5]}]}"#);
    }

    #[test]
    fn entries_decode_by_shape() {
        let body: Vec<Entry> = serde_json::from_str(
            r#"[{"key":"SHAPE","value":"SPHERICAL"},{"op":"a","args":[1.5]}]"#).unwrap();
        assert_eq!(body, vec![
            Entry::Property { key: "SHAPE".to_owned(), value: Value::String("SPHERICAL".to_owned()) },
            Entry::Command(Command::new("a", vec![Value::Float(1.5)])),
        ]);
    }

    #[test]
    fn non_finite_floats_do_not_serialize() {
        assert!(serde_json::to_string(&Value::Float(f64::INFINITY)).is_err());
        assert_eq!(serde_json::to_string(&Value::Float(2.5)).unwrap(), "2.5");
    }
}
