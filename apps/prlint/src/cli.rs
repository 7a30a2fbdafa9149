//! CLI argument parsing via `clap`.

use clap::{ArgAction, Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "prlint",
    version,
    about = "Report only the issues a pull request introduces",
    long_about = "prlint — run static analysis over the files a pull request touches and report only the issues on lines the pull request both changed and authored.\n\nConfiguration precedence: CLI > prlint.toml > defaults.",
    after_help = "Examples:\n  prlint review --head HEAD --base origin/main\n  prlint review --head 3f2c1e0 --pr 41:origin/main --pr 42:origin/release --output json\n  prlint review --head HEAD --base main -vv",
    arg_required_else_help = true
)]
/// Top-level CLI options and subcommands.
pub struct Cli {
    #[command(subcommand)]
    pub cmd: Commands,
}

#[derive(Subcommand)]
/// Supported subcommands.
pub enum Commands {
    /// Show version
    #[command(
        about = "Show version",
        long_about = "Print the current prlint version."
    )]
    Version,
    /// Review one or more pull requests against the checked-out head
    #[command(
        about = "Review pull requests",
        long_about = "Verify the checkout matches --head, then scan each changed file and report issues attributed to the pull request. Error-severity issues contribute to CI exits.",
        after_help = "Examples:\n  prlint review --head HEAD --base origin/main\n  prlint review --head HEAD --pr 7:origin/main --output json"
    )]
    Review {
        #[arg(long, help = "Repository root (default: current dir)")]
        repo_root: Option<String>,
        #[arg(long, help = "Revision expected to be checked out (required)")]
        head: String,
        #[arg(long, help = "Base revision of a single pull request", conflicts_with = "pr")]
        base: Option<String>,
        #[arg(long, help = "Pull request as NUMBER:BASE (repeatable)")]
        pr: Vec<String>,
        #[arg(long, help = "Output mode: human|json (default: human)")]
        output: Option<String>,
        #[arg(long, help = "Path to prlint.toml|yaml (default: discovered)")]
        config: Option<String>,
        #[arg(short, long, action = ArgAction::Count, help = "Increase log verbosity (-v info, -vv debug)")]
        verbose: u8,
    },
}
