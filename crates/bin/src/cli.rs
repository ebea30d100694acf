//! CLI argument definitions for the docmesh binary.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Inspect and resolve documents of a docmesh store file
#[derive(Parser, Debug)]
#[command(name = "docmesh")]
#[command(about = "docmesh: resolve document references across collections")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Resolve documents and print them with their references expanded
    Resolve(ResolveArgs),
    /// Show document counts per collection
    Info(InfoArgs),
}

/// Store location shared by every command
#[derive(clap::Args, Debug)]
pub struct StoreArgs {
    /// JSON file written by the in-memory store
    #[arg(short = 'D', long, default_value = "docmesh.json", env = "DOCMESH_DATA")]
    pub data: PathBuf,
}

/// Arguments for the resolve command
#[derive(clap::Args, Debug)]
pub struct ResolveArgs {
    #[command(flatten)]
    pub store: StoreArgs,

    /// Document addresses such as Car/abc or Person/john/Pet/rex
    #[arg(required = true)]
    pub addresses: Vec<String>,

    /// Load paths to expand, comma separated or repeated (ALL expands everything)
    #[arg(short, long = "path")]
    pub paths: Vec<String>,

    /// Client configuration file; flags below override it
    #[arg(short, long, env = "DOCMESH_CONFIG")]
    pub config: Option<PathBuf>,

    /// Field each document's id is written to
    #[arg(long, env = "DOCMESH_ID_FIELD")]
    pub id_field: Option<String>,

    /// Reference field that is always followed
    #[arg(long, env = "DOCMESH_PARENT_FIELD")]
    pub parent_field: Option<String>,
}

/// Arguments for the info command
#[derive(clap::Args, Debug)]
pub struct InfoArgs {
    #[command(flatten)]
    pub store: StoreArgs,

    /// Print JSON instead of a table
    #[arg(long)]
    pub json: bool,
}
