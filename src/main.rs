//! Sheaf - dependency-ordered, fingerprinted script and stylesheet bundles.

#![allow(dead_code)]

mod bundle;
mod cli;
mod collection;
mod compress;
mod config;
mod error;
mod graph;
mod lazy;
mod logger;
mod resolver;
mod resource;
mod utils;

use anyhow::Result;
use clap::{ColorChoice, Parser};
use cli::{Cli, Commands};
use config::find_config_file;
use resolver::Resolver;
use std::path::PathBuf;

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set global color override based on CLI option
    match cli.color {
        ColorChoice::Always => owo_colors::set_override(true),
        ColorChoice::Never => owo_colors::set_override(false),
        ColorChoice::Auto => {} // owo-colors auto-detects TTY
    }
    logger::set_verbose(cli.verbose);

    let config_files = config_files(&cli.config);
    let resolver = Resolver::new(config_files.clone(), cli.resolver_options());

    match &cli.command {
        Commands::Build { output } => cli::build::build_all(&resolver, output, false).map(|_| ()),
        Commands::Resolve { path, info } => cli::resolve::resolve(&resolver, path, *info),
        Commands::List { bundle } => cli::list::list(&resolver, bundle.as_deref()),
        Commands::Watch { output } => cli::watch::watch(&resolver, &config_files, output),
    }
}

/// Relative config paths not found in the working directory are searched
/// for in its ancestors.
fn config_files(paths: &[PathBuf]) -> Vec<PathBuf> {
    paths
        .iter()
        .map(|path| {
            if path.is_relative() && !path.exists() {
                find_config_file(path).unwrap_or_else(|| path.clone())
            } else {
                path.clone()
            }
        })
        .collect()
}
