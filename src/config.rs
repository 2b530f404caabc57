use std::path::PathBuf;

use clap::{Parser, ValueEnum};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum DebugFormat {
    #[default]
    Json,
    #[cfg(feature = "ron")]
    Ron,
}

#[derive(Parser, Debug)]
#[command(name = "mdl2json", version, about = "Parse a model description file and print it as JSON")]
pub struct Cli {
    /// Model description file to parse
    pub model: PathBuf,
    /// `true` to also print an indented rendering of the result
    pub debug: String,
    /// Format of the indented rendering
    #[arg(long, value_enum, default_value_t = DebugFormat::Json)]
    pub debug_format: DebugFormat,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub model_path: PathBuf,
    pub debug_enabled: bool,
    pub debug_format: DebugFormat,
}

impl From<Cli> for Config {
    fn from(cli: Cli) -> Self {
        Self {
            model_path: cli.model,
            debug_enabled: cli.debug == "true",
            debug_format: cli.debug_format,
        }
    }
}

impl Config {
    pub fn try_from_args<I, T>(args: I) -> Result<Self, clap::Error>
    where
        I: IntoIterator<Item = T>,
        T: Into<std::ffi::OsString> + Clone,
    {
        Cli::try_parse_from(args).map(Self::from)
    }
}
