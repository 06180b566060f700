use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "pdftools")]
#[command(about = "Small PDF tools: cut a page range out of a document")]
#[command(version)]
pub struct Cli {
    #[command(flatten)]
    pub license: LicenseArgs,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Args)]
pub struct LicenseArgs {
    /// License key (takes precedence over the environment and the license file)
    #[arg(long, global = true)]
    pub license_key: Option<String>,

    /// File the license key is read from and saved to
    #[arg(long, global = true)]
    pub license_file: Option<PathBuf>,

    /// Never ask for a license key interactively
    #[arg(long, global = true)]
    pub no_prompt: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Get a few pages from a PDF document as a new PDF document
    Section {
        /// PDF file to take pages from
        #[arg(short, long)]
        path: PathBuf,

        /// First page number (1-based, inclusive)
        #[arg(short, long, allow_negative_numbers = true)]
        from: i64,

        /// Last page number (1-based, inclusive)
        #[arg(short, long, allow_negative_numbers = true)]
        till: i64,

        /// Output file (default: the source path with `.pdf` replaced by `_output.pdf`)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Display PDF metadata and page count
    Info {
        /// PDF file to inspect
        path: PathBuf,
    },

    /// Run as MCP server over stdio
    Mcp,
}
