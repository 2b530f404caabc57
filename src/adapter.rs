use std::path::Path;

use anyhow::{Context, Result, anyhow};
use log::debug;

use crate::{model::Parsed, ModelParser};

/// Runs `parser` over `path` and normalizes the outcome.
///
/// Errors carry the file path as context. A parser that comes back with
/// neither commands nor symbols has produced no result, which is a failure too.
pub fn parse(parser: &dyn ModelParser, path: &Path) -> Result<Parsed> {
    debug!("parse {}", path.display());
    let parsed = parser.parse_file(path)
        .with_context(|| format!("{}", path.display()))?;
    if parsed.is_empty() {
        Err(anyhow!("{}: parser produced no result", path.display()))?
    }
    debug!("parsed {} commands, {} symbols", parsed.commands.len(), parsed.symbols.len());
    Ok(parsed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Command, Value};
    use crate::parse::MdlParser;

    struct Canned(Option<Parsed>);

    impl ModelParser for Canned {
        fn parse_file(&self, _path: &Path) -> Result<Parsed> {
            self.0.clone().ok_or_else(|| anyhow!("syntax error at 1:1"))
        }
    }

    #[test]
    fn success_is_passed_through() {
        let mut parsed = Parsed::default();
        parsed.commands.push(Command::new("run", vec![Value::Integer(1)]));
        let result = parse(&Canned(Some(parsed.clone())), Path::new("m.mdl")).unwrap();
        assert_eq!(result, parsed);
    }

    #[test]
    fn failure_names_the_file() {
        let err = parse(&Canned(None), Path::new("m.mdl")).unwrap_err();
        assert_eq!(format!("{err:#}"), "m.mdl: syntax error at 1:1");
    }

    #[test]
    fn engine_errors_name_the_file_once() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("m.mdl");
        std::fs::write(&path, "x = 1\n\ny = z\n").unwrap();
        let err = parse(&MdlParser, &path).unwrap_err();
        assert_eq!(format!("{err:#}"), format!("{}: line 3: undefined symbol z", path.display()));
    }

    #[test]
    fn empty_result_is_a_failure() {
        let err = parse(&Canned(Some(Parsed::default())), Path::new("m.mdl")).unwrap_err();
        assert!(err.to_string().contains("no result"));
    }
}
