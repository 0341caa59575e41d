//! Main entry point for the domsift CLI application.
//!
//! Fetches an XLSX export from a local path or an HTTP URL, extracts the
//! distinct domain names from its Companies sheet, and prints either the
//! plain list or a new-vs-existing change report.

use anyhow::Result;
use clap::Parser;
use std::collections::HashSet;
use std::path::Path;

use domsift::{ArchiveSource, ChangeReport, Cli, DomainExtractor, HttpSource, LocalFileSource};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let archive = if cli.is_http_url() {
        HttpSource::new(cli.file.clone())?.fetch().await?
    } else {
        LocalFileSource::new(cli.file.as_str()).fetch().await?
    };

    if !cli.quiet {
        eprintln!("Fetched {} bytes, scanning...", archive.len());
    }

    let domains = DomainExtractor::default().extract(archive)?;

    match &cli.known {
        Some(path) => {
            let known = load_known_domains(path).await?;
            let report = ChangeReport::classify(domains, &known);
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                print_report(&report);
            }
        }
        None => {
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&domains)?);
            } else {
                for domain in &domains {
                    println!("{domain}");
                }
                if !cli.quiet {
                    eprintln!("\n{} distinct domains", domains.len());
                }
            }
        }
    }

    Ok(())
}

/// Read a newline-separated domain list, trimming and dropping blank lines.
async fn load_known_domains(path: &Path) -> Result<HashSet<String>> {
    let text = tokio::fs::read_to_string(path).await?;
    Ok(text
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(String::from)
        .collect())
}

fn print_report(report: &ChangeReport) {
    println!("new ({}):", report.number_of_companies_to_add);
    for domain in &report.new_domains {
        println!("  {domain}");
    }
    println!("existing ({}):", report.number_of_companies_to_update);
    for domain in &report.existing_domains {
        println!("  {domain}");
    }
}
