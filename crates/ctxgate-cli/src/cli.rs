use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "ctxgate",
    about = "ctxgate: routing and verification governance for context-document corpora",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Validate the routing reference graph over a document tree
    RouteCheck {
        /// Corpus directory to load
        #[arg(long, default_value = ".")]
        docs: String,

        /// Designated root document (corpus-relative path)
        #[arg(long, default_value = "root.md")]
        root: String,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Cross-check declared routing keywords against the governance lexicon
    LexiconCheck {
        /// Corpus directory to load
        #[arg(long, default_value = ".")]
        docs: String,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Execute verification blocks from an explicit document list
    Verify {
        /// Comma-separated document paths (resolved against --repo-root)
        #[arg(long, required = true, value_delimiter = ',')]
        paths: Vec<String>,

        /// Halting policy: blocking or advisory
        #[arg(long, default_value = "blocking")]
        mode: String,

        /// Repository root used for variable resolution
        #[arg(long, default_value = ".")]
        repo_root: String,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Dump the extracted annotations for inspection
    Extract {
        /// Corpus directory to load
        #[arg(long, default_value = ".")]
        docs: String,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}
