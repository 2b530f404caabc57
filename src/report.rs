use std::io::{self, Write};
use std::path::Path;

use anyhow::{Context, Result};
use log::{debug, error};
use serde::Serialize;
use serde_json::ser::Formatter;

use crate::{
    config::{Config, DebugFormat},
    model::{OutputDocument, Parsed},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Success,
    ParseFailure,
    UsageError,
    SerializationFailure,
}

impl Status {
    pub fn code(self) -> u8 {
        match self {
            Status::Success => 0,
            Status::ParseFailure => 1,
            Status::UsageError => 2,
            Status::SerializationFailure => 3,
        }
    }
}

pub const PARSE_FAILURE_LINE: &str = "Failed to parse";

pub struct Reporter<'w> {
    out: &'w mut dyn Write,
    err: &'w mut dyn Write,
    debug_format: Option<DebugFormat>,
}

impl<'w> Reporter<'w> {
    pub fn new(config: &Config, out: &'w mut dyn Write, err: &'w mut dyn Write) -> Self {
        let debug_format = config.debug_enabled.then_some(config.debug_format);
        Self { out, err, debug_format }
    }

    // only I/O errors on the output streams escape
    pub fn report(&mut self, path: &Path, result: Result<Parsed>) -> Result<Status> {
        let parsed = match result {
            Ok(parsed) => parsed,
            Err(e) => {
                error!("parsing {} failed: {e:#}", path.display());
                writeln!(self.out, "{PARSE_FAILURE_LINE}")?;
                writeln!(self.err, "error: {e:#}")?;
                return Ok(Status::ParseFailure);
            }
        };
        let document = OutputDocument::from(&parsed);
        let rendered = render(&document, self.debug_format)
            .with_context(|| format!("{}: cannot serialize parse result", path.display()));
        match rendered {
            Ok((compact, pretty)) => {
                writeln!(self.out, "{compact}")?;
                if let Some(pretty) = pretty {
                    writeln!(self.out, "{pretty}")?;
                }
                Ok(Status::Success)
            }
            Err(e) => {
                error!("{e:#}");
                writeln!(self.err, "error: {e:#}")?;
                Ok(Status::SerializationFailure)
            }
        }
    }
}

/// Single-line JSON with `", "` between items and `": "` after keys.
/// Non-ASCII characters are written as `\uXXXX` escapes.
struct SpacedFormatter;

impl Formatter for SpacedFormatter {
    fn begin_array_value<W: ?Sized + Write>(&mut self, writer: &mut W, first: bool) -> io::Result<()> {
        if first { Ok(()) } else { writer.write_all(b", ") }
    }

    fn begin_object_key<W: ?Sized + Write>(&mut self, writer: &mut W, first: bool) -> io::Result<()> {
        if first { Ok(()) } else { writer.write_all(b", ") }
    }

    fn begin_object_value<W: ?Sized + Write>(&mut self, writer: &mut W) -> io::Result<()> {
        writer.write_all(b": ")
    }

    fn write_string_fragment<W: ?Sized + Write>(&mut self, writer: &mut W, fragment: &str) -> io::Result<()> {
        for c in fragment.chars() {
            if c.is_ascii() {
                writer.write_all(&[c as u8])?;
            } else {
                let mut units = [0u16; 2];
                for unit in c.encode_utf16(&mut units) {
                    write!(writer, "\\u{unit:04x}")?;
                }
            }
        }
        Ok(())
    }
}

pub fn to_spaced_json<T: ?Sized + Serialize>(value: &T) -> Result<String> {
    let mut buf = Vec::new();
    let mut serializer = serde_json::Serializer::with_formatter(&mut buf, SpacedFormatter);
    value.serialize(&mut serializer)?;
    Ok(String::from_utf8(buf)?)
}

// both renderings come from the one document; nothing is printed unless both succeed
fn render(document: &OutputDocument, debug_format: Option<DebugFormat>) -> Result<(String, Option<String>)> {
    let compact = to_spaced_json(document)?;
    let pretty = match debug_format {
        None => None,
        Some(DebugFormat::Json) => Some(serde_json::to_string_pretty(document)?),
        #[cfg(feature = "ron")]
        Some(DebugFormat::Ron) =>
            Some(ron::ser::to_string_pretty(document, ron::ser::PrettyConfig::default())?),
    };
    debug!("rendered {} bytes", compact.len());
    Ok((compact, pretty))
}
