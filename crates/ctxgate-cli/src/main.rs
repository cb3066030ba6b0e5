//! ctxgate CLI: the `ctxgate` command.

mod cli;
mod commands;

use clap::Parser;
use cli::{Cli, Commands};

fn main() {
    let cli = Cli::parse();

    match cli.command {
        Commands::RouteCheck { docs, root, json } => commands::route_check::run(docs, root, json),

        Commands::LexiconCheck { docs, json } => commands::lexicon_check::run(docs, json),

        Commands::Verify {
            paths,
            mode,
            repo_root,
            json,
        } => commands::verify::run(paths, mode, repo_root, json),

        Commands::Extract { docs, json } => commands::extract::run(docs, json),
    }
}
