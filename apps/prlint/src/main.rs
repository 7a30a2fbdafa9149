//! prlint CLI binary entry point.
//! Resolves configuration, verifies the checkout, reviews, and prints results.

use clap::Parser;
use log::LevelFilter;
use prlint::cli::{Cli, Commands};
use prlint::config;
use prlint::context::RunContext;
use prlint::error::FatalError;
use prlint::git::Repository;
use prlint::models::revision::PullRequest;
use prlint::output;
use prlint::process::ProcessRunner;
use prlint::review;
use prlint::scanner::ScannerSet;
use prlint::utils::{error_prefix, info_prefix, note_prefix};

fn main() {
    let cli = Cli::parse();
    match cli.cmd {
        Commands::Version => {
            println!("{}", env!("CARGO_PKG_VERSION"));
        }
        Commands::Review {
            repo_root,
            head,
            base,
            pr,
            output,
            config,
            verbose,
        } => {
            init_logging(verbose);
            let eff = config::resolve_effective(
                repo_root.as_deref(),
                config.as_deref(),
                output.as_deref(),
            )
            .unwrap_or_else(|e| fail(&e));
            if eff.output != "json" {
                match &eff.config_path {
                    Some(p) => eprintln!("{} Using config {}", info_prefix(), p.display()),
                    None => eprintln!(
                        "{} No prlint.toml found; no scanners configured.",
                        note_prefix()
                    ),
                }
            }
            let prs = pull_requests(base, &pr).unwrap_or_else(|e| fail(&e));

            let mut ctx = RunContext::new(ProcessRunner::new(eff.retries, eff.backoff));
            let repo = Repository::open(&mut ctx, &eff.repo_root, &head)
                .unwrap_or_else(|e| fail(&e));
            let scanners = ScannerSet::from_effective(&eff);
            let report = review::run(&mut ctx, &repo, &eff.filter, &scanners, &prs);
            output::print_review(&report, &eff.output);
            if report.pull_requests.iter().any(|p| p.errors() > 0) {
                std::process::exit(1);
            }
        }
    }
}

/// `RUST_LOG` wins; otherwise `-v` maps to info and `-vv` to debug.
fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        _ => LevelFilter::Debug,
    };
    env_logger::Builder::new()
        .filter_level(level)
        .parse_env("RUST_LOG")
        .format_timestamp(None)
        .init();
}

fn pull_requests(base: Option<String>, prs: &[String]) -> Result<Vec<PullRequest>, FatalError> {
    if let Some(base) = base {
        return Ok(vec![PullRequest { number: None, base }]);
    }
    if prs.is_empty() {
        return Err(FatalError::Config(
            "nothing to review: pass --base or --pr NUMBER:BASE".to_string(),
        ));
    }
    prs.iter()
        .map(|s| {
            PullRequest::parse(s).ok_or_else(|| {
                FatalError::Config(format!("invalid --pr '{}' (expected NUMBER:BASE)", s))
            })
        })
        .collect()
}

fn fail(err: &FatalError) -> ! {
    eprintln!("{} {}", error_prefix(), err);
    std::process::exit(err.exit_code())
}
