//! CLI command implementations
//!
//! Each subcommand has its own module with:
//! - Args struct for command-line arguments
//! - run() function to execute the command

use clap::Subcommand;

pub mod dictionary;
pub mod expand;
pub mod facets;
pub mod health;
pub mod import;
pub mod keywords;
pub mod search;
pub mod stats;

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Expand a keyword and run a ranked search
    Search(search::SearchArgs),

    /// Show the expansion of a keyword without searching
    Expand(expand::ExpandArgs),

    /// List or search dictionary keywords
    Keywords(keywords::KeywordsArgs),

    /// Dictionary statistics and quality report
    Dictionary(dictionary::DictionaryArgs),

    /// Check the active search engine
    Health(health::HealthArgs),

    /// Distinct filter values in the local index
    Facets(facets::FacetsArgs),

    /// Active engine health plus local index statistics
    Stats(stats::StatsArgs),

    /// Load tender records (JSON lines) into the local index
    Import(import::ImportArgs),
}

use crate::app::AppContext;
use crate::error::Result;

/// Dispatch a command to its handler
pub fn run(ctx: &AppContext, command: &Commands) -> Result<()> {
    match command {
        Commands::Search(args) => search::run(ctx, args),
        Commands::Expand(args) => expand::run(ctx, args),
        Commands::Keywords(args) => keywords::run(ctx, args),
        Commands::Dictionary(args) => dictionary::run(ctx, args),
        Commands::Health(args) => health::run(ctx, args),
        Commands::Facets(args) => facets::run(ctx, args),
        Commands::Stats(args) => stats::run(ctx, args),
        Commands::Import(args) => import::run(ctx, args),
    }
}
