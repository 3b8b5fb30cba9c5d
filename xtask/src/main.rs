use std::path::Path;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

mod gates;

use gates::{DEFAULT_MIN_COVERAGE, Gate, Workspace};

/// Build and quality gate tasks, run with `cargo xtask <task>`
#[derive(Parser, Debug)]
#[command(about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    task: Task,

    /// Log the commands being run
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Task {
    /// Print the version derived from git tags
    Version,
    /// Check that packaged files match version-controlled files
    ManifestCheck,
    /// Check that code is formatted
    FmtCheck,
    /// Run clippy, denying warnings
    Lint,
    /// Type-check every target
    TypeCheck,
    /// Run the tests with line coverage
    Test {
        /// Minimum line coverage in percent
        #[arg(long, default_value_t = DEFAULT_MIN_COVERAGE)]
        min_coverage: f64,
    },
    /// Run every gate and report all failures
    Ci {
        /// Minimum line coverage in percent
        #[arg(long, default_value_t = DEFAULT_MIN_COVERAGE)]
        min_coverage: f64,

        /// Stop at the first failing gate
        #[arg(long)]
        fail_fast: bool,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let root = Path::new(env!("CARGO_MANIFEST_DIR"))
        .parent()
        .ok_or_else(|| anyhow::anyhow!("xtask must live in the workspace"))?;
    let workspace = Workspace::new(root);

    match cli.task {
        Task::Version => {
            let version = pdfss_version::describe_repo(workspace.root())?;
            println!("{}", version);
        }
        Task::ManifestCheck => workspace.run(Gate::ManifestCheck)?,
        Task::FmtCheck => workspace.run(Gate::FmtCheck)?,
        Task::Lint => workspace.run(Gate::Lint)?,
        Task::TypeCheck => workspace.run(Gate::TypeCheck)?,
        Task::Test { min_coverage } => workspace.run(Gate::Test { min_coverage })?,
        Task::Ci {
            min_coverage,
            fail_fast,
        } => ci(&workspace, min_coverage, fail_fast)?,
    }
    Ok(())
}

fn init_tracing(verbose: bool) {
    let default_filter = if verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| default_filter.into()))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn ci(workspace: &Workspace, min_coverage: f64, fail_fast: bool) -> anyhow::Result<()> {
    let mut failures = Vec::new();
    for gate in Gate::pipeline(min_coverage) {
        match workspace.run(gate) {
            Ok(()) => eprintln!("PASS {}", gate),
            Err(e) => {
                eprintln!("FAIL {}: {}", gate, e);
                failures.push(gate);
                if fail_fast {
                    break;
                }
            }
        }
    }

    if !failures.is_empty() {
        let names: Vec<&str> = failures.iter().map(Gate::name).collect();
        anyhow::bail!("{} gate(s) failed: {}", failures.len(), names.join(", "));
    }
    Ok(())
}
