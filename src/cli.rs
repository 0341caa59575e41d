use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "domsift")]
#[command(version)]
#[command(about = "Extract unique domain names from the Companies sheet of an XLSX export", long_about = None)]
#[command(after_help = "Examples:\n  \
  domsift export.xlsx                        list distinct domains from a local export\n  \
  domsift export.xlsx --known known.txt      classify against a newline-separated known list\n  \
  domsift https://example.com/export.xlsx --json   fetch remotely, print a JSON report")]
pub struct Cli {
    /// XLSX file path or HTTP URL
    #[arg(value_name = "FILE")]
    pub file: String,

    /// Newline-separated file of already-known domains
    #[arg(long, value_name = "FILE")]
    pub known: Option<PathBuf>,

    /// Print JSON instead of a plain listing
    #[arg(long)]
    pub json: bool,

    /// Quiet mode (suppress progress messages)
    #[arg(short = 'q', long)]
    pub quiet: bool,
}

impl Cli {
    pub fn is_http_url(&self) -> bool {
        self.file.starts_with("http://") || self.file.starts_with("https://")
    }
}
