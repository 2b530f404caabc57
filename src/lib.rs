use std::ffi::OsString;
use std::io::Write;
use std::path::Path;

use anyhow::{Result, anyhow};
use clap::error::ErrorKind;
use log::{debug, error};

pub mod adapter;
pub mod builtin;
pub mod config;
pub mod model;
pub mod parse;
pub mod report;
pub mod symbols;

pub use config::{Config, DebugFormat};
pub use model::{Command, Entry, OutputDocument, Parsed, Symbol, SymbolKind, Value};
pub use parse::MdlParser;
pub use report::{Reporter, Status};

pub trait ModelParser {
    fn parse_file(&self, path: &Path) -> Result<Parsed>;
}

pub fn unescape_string(text: &str) -> Result<String> {
    unescape::unescape(text).ok_or_else(|| anyhow!("invalid escape sequence in {text:?}"))
}

/// Parses the command line, runs `parser` on the model file and reports to `out`/`err`.
///
/// The parser is never invoked when the arguments are invalid.
pub fn run<I, T>(args: I, parser: &dyn ModelParser, out: &mut dyn Write, err: &mut dyn Write) -> Status
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    let config = match Config::try_from_args(args) {
        Ok(config) => config,
        Err(e) => return usage(e, out, err).unwrap_or_else(|e| {
            error!("cannot write usage: {e:#}");
            Status::UsageError
        }),
    };
    debug!("{config:?}");
    let result = adapter::parse(parser, &config.model_path);
    Reporter::new(&config, out, err)
        .report(&config.model_path, result)
        .unwrap_or_else(|e| {
            error!("cannot write output: {e:#}");
            Status::ParseFailure
        })
}

fn usage(e: clap::Error, out: &mut dyn Write, err: &mut dyn Write) -> Result<Status> {
    let rendered = e.render();
    Ok(match e.kind() {
        ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => {
            write!(out, "{rendered}")?;
            Status::Success
        }
        _ => {
            write!(err, "{rendered}")?;
            Status::UsageError
        }
    })
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;

    use super::*;

    struct Stub {
        calls: Cell<usize>,
        result: fn() -> Result<Parsed>,
    }

    impl Stub {
        fn new(result: fn() -> Result<Parsed>) -> Self {
            Self { calls: Cell::new(0), result }
        }
    }

    impl ModelParser for Stub {
        fn parse_file(&self, _path: &Path) -> Result<Parsed> {
            self.calls.set(self.calls.get() + 1);
            (self.result)()
        }
    }

    fn sample() -> Result<Parsed> {
        let mut parsed = Parsed::default();
        parsed.symbols.insert("x".to_owned(), Value::Integer(5).into());
        parsed.commands.push(Command::new("set", vec![Value::String("x".to_owned()), Value::Integer(5)]));
        Ok(parsed)
    }

    fn invoke(args: &[&str], parser: &Stub) -> (Status, String, String) {
        let (mut out, mut err) = (Vec::new(), Vec::new());
        let status = run(args.iter().copied(), parser, &mut out, &mut err);
        (status, String::from_utf8(out).unwrap(), String::from_utf8(err).unwrap())
    }

    #[test]
    fn missing_debug_flag_never_parses() {
        let stub = Stub::new(sample);
        let (status, out, err) = invoke(&["mdl2json", "m.mdl"], &stub);
        assert_eq!(status, Status::UsageError);
        assert_eq!(status.code(), 2);
        assert_eq!(stub.calls.get(), 0);
        assert!(out.is_empty());
        assert!(err.contains("Usage"), "{err}");
    }

    #[test]
    fn success_with_and_without_debug() {
        let stub = Stub::new(sample);
        let (status, plain, _) = invoke(&["mdl2json", "m.mdl", "false"], &stub);
        assert_eq!(status, Status::Success);
        assert_eq!(plain.lines().count(), 1);

        let (status, debug, _) = invoke(&["mdl2json", "m.mdl", "true"], &stub);
        assert_eq!(status, Status::Success);
        assert!(debug.starts_with(&plain));
        assert!(debug.len() > plain.len());
        assert_eq!(stub.calls.get(), 2);
    }

    #[test]
    fn parse_failure() {
        let stub = Stub::new(|| Err(anyhow!("unexpected token")));
        let (status, out, err) = invoke(&["mdl2json", "m.mdl", "true"], &stub);
        assert_eq!(status, Status::ParseFailure);
        assert_eq!(out, "Failed to parse\n");
        assert_eq!(err, "error: m.mdl: unexpected token\n");
    }

    #[test]
    fn help_goes_to_stdout() {
        let stub = Stub::new(sample);
        let (status, out, _) = invoke(&["mdl2json", "--help"], &stub);
        assert_eq!(status, Status::Success);
        assert!(out.contains("debug-format"));
        assert_eq!(stub.calls.get(), 0);
    }

    struct Closed;

    impl Write for Closed {
        fn write(&mut self, _buf: &[u8]) -> std::io::Result<usize> {
            Err(std::io::Error::new(std::io::ErrorKind::BrokenPipe, "closed"))
        }
        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn closed_output_is_not_success() {
        let stub = Stub::new(sample);
        let mut err = Vec::new();
        assert_eq!(run(["mdl2json", "--help"], &stub, &mut Closed, &mut err), Status::UsageError);
        assert_eq!(run(["mdl2json", "m.mdl"], &stub, &mut Vec::new(), &mut Closed), Status::UsageError);
        assert_eq!(run(["mdl2json", "m.mdl", "false"], &stub, &mut Closed, &mut err), Status::ParseFailure);
    }

    #[test]
    fn unescape() {
        assert_eq!(unescape_string(r#"a\tb\"c"#).unwrap(), "a\tb\"c");
    }
}
