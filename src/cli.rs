use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

#[derive(Parser, Debug)]
#[command(
    name = "patent-fulltext",
    version,
    about = "Normalize bulk patent full-text archives and load them into sqlite"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    Parse(ParseArgs),
    Ingest(IngestArgs),
    Status(StatusArgs),
}

#[derive(Args, Debug, Clone)]
pub struct ParseArgs {
    /// Bulk full-text zip archives (APS, SGML or XML members).
    #[arg(long = "archive", required = true)]
    pub archives: Vec<PathBuf>,

    #[arg(long, default_value = "patents.zip")]
    pub output: PathBuf,

    #[arg(long)]
    pub skip_list: Option<PathBuf>,

    /// Record attributes written per patent; defaults to the standard set.
    #[arg(long = "attribute")]
    pub attributes: Vec<String>,

    #[arg(long, value_enum, default_value_t = LineEnding::Crlf)]
    pub line_ending: LineEnding,

    /// Keep all-uppercase legacy paragraph lines exactly as archived.
    #[arg(long, default_value_t = false)]
    pub no_heading_space: bool,

    #[arg(long)]
    pub manifest_path: Option<PathBuf>,
}

#[derive(Args, Debug, Clone)]
pub struct IngestArgs {
    /// Zip archive of flattened text members produced by `parse`.
    #[arg(long)]
    pub archive: PathBuf,

    #[arg(long, default_value = "patents.db")]
    pub db_path: PathBuf,

    #[arg(long)]
    pub skip_list: Option<PathBuf>,

    #[arg(long)]
    pub manifest_path: Option<PathBuf>,
}

#[derive(Args, Debug, Clone)]
pub struct StatusArgs {
    #[arg(long, default_value = "patents.db")]
    pub db_path: PathBuf,
}

#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, ValueEnum)]
pub enum LineEnding {
    #[default]
    Crlf,
    Lf,
}

impl LineEnding {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Crlf => "crlf",
            Self::Lf => "lf",
        }
    }

    pub fn separator(self) -> &'static str {
        match self {
            Self::Crlf => "\r\n",
            Self::Lf => "\n",
        }
    }

    pub fn detect(text: &str) -> Self {
        if text.contains("\r\n") {
            Self::Crlf
        } else {
            Self::Lf
        }
    }
}
