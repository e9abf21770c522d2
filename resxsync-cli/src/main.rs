use std::io;

use clap::{ArgAction, Args as ClapArgs, CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use resxsync::CancellationToken;
use tracing_subscriber::EnvFilter;

use resxsync_cli::exchange::{ExportOptions, ImportOptions, run_export_command, run_import_command};
use resxsync_cli::scan::run_scan_command;
use resxsync_cli::sync::{SyncOptions, run_sync_command};
use resxsync_cli::{CommandError, ProjectOptions, Workspace};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Increase log verbosity (-v info, -vv debug, -vvv trace). RUST_LOG takes precedence.
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    commands: Commands,
}

/// Where to look for projects.
#[derive(ClapArgs, Debug, Clone)]
struct ProjectArgs {
    /// Directory to search for projects (repeatable; defaults to the current directory)
    #[arg(short, long = "root")]
    roots: Vec<String>,

    /// Only use projects whose name matches this glob (repeatable)
    #[arg(short, long = "project")]
    projects: Vec<String>,

    /// Configuration file (defaults to resxsync.toml in the first root)
    #[arg(long)]
    config: Option<String>,
}

impl From<ProjectArgs> for ProjectOptions {
    fn from(args: ProjectArgs) -> Self {
        ProjectOptions {
            roots: args.roots,
            projects: args.projects,
            config: args.config,
        }
    }
}

/// Supported subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// List projects, resource groups and their cultures.
    Scan {
        #[command(flatten)]
        projects: ProjectArgs,

        /// Print the result as JSON
        #[arg(long)]
        json: bool,
    },

    /// Make every resource group carry exactly the selected cultures, with the neutral keys.
    Sync {
        #[command(flatten)]
        projects: ProjectArgs,

        /// Culture to keep (repeatable or comma separated; defaults to the cultures present)
        #[arg(short, long = "culture")]
        cultures: Vec<String>,

        /// Delete culture files of cultures that are not selected
        #[arg(long)]
        remove_unselected: bool,

        /// Nest culture files under their neutral file (true) or at top level (false)
        #[arg(long)]
        embed: Option<bool>,

        /// Set (true) or clear (false) the default item type of resource files
        #[arg(long)]
        content_type: Option<bool>,

        /// Set (true) or blank (false) the default code generator of neutral files
        #[arg(long)]
        generator: Option<bool>,

        /// Write a JSON report of the changes to this path
        #[arg(long)]
        report_json: Option<String>,
    },

    /// Export resources to a directory of sheets (one per project).
    Export {
        #[command(flatten)]
        projects: ProjectArgs,

        /// Output directory
        #[arg(short, long)]
        output: String,

        /// Culture column to export (repeatable or comma separated; defaults to the cultures present)
        #[arg(short, long = "culture")]
        cultures: Vec<String>,

        /// Sheet format: csv or tsv
        #[arg(long)]
        format: Option<String>,
    },

    /// Import translated sheets back into the resource files.
    Import {
        #[command(flatten)]
        projects: ProjectArgs,

        /// Directory of sheets written by `export`
        #[arg(short, long)]
        input: String,

        /// Sheet format: csv or tsv
        #[arg(long)]
        format: Option<String>,

        /// Write a JSON report of the import to this path
        #[arg(long)]
        report_json: Option<String>,
    },

    /// Generate shell completions.
    Completions {
        #[arg(value_enum)]
        shell: Shell,
    },
}

fn init_tracing(verbose: u8) {
    let default_level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .try_init();
}

async fn dispatch(command: Commands) -> Result<(), CommandError> {
    let cancel = CancellationToken::new();
    let watcher = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            watcher.cancel();
        }
    });

    match command {
        Commands::Scan { projects, json } => {
            let workspace = Workspace::open(&projects.into(), cancel)?;
            run_scan_command(&workspace, json)
        }
        Commands::Sync {
            projects,
            cultures,
            remove_unselected,
            embed,
            content_type,
            generator,
            report_json,
        } => {
            let mut workspace = Workspace::open(&projects.into(), cancel)?;
            run_sync_command(
                &mut workspace,
                SyncOptions {
                    cultures,
                    remove_unselected,
                    embed,
                    content_type,
                    generator,
                    report_json,
                },
            )
            .await
        }
        Commands::Export {
            projects,
            output,
            cultures,
            format,
        } => {
            let workspace = Workspace::open(&projects.into(), cancel)?;
            run_export_command(
                &workspace,
                ExportOptions {
                    output,
                    cultures,
                    format,
                },
            )
            .await
        }
        Commands::Import {
            projects,
            input,
            format,
            report_json,
        } => {
            let workspace = Workspace::open(&projects.into(), cancel)?;
            run_import_command(
                &workspace,
                ImportOptions {
                    input,
                    format,
                    report_json,
                },
            )
            .await
        }
        Commands::Completions { .. } => Ok(()),
    }
}

fn run(args: Args) -> Result<(), CommandError> {
    if let Commands::Completions { shell } = args.commands {
        let mut command = Args::command();
        clap_complete::generate(shell, &mut command, "resxsync", &mut io::stdout());
        return Ok(());
    }

    let runtime = tokio::runtime::Runtime::new()
        .map_err(|e| format!("Failed to start async runtime: {}", e))?;
    runtime.block_on(dispatch(args.commands))
}

fn main() {
    let args = Args::parse();
    init_tracing(args.verbose);

    if let Err(e) = run(args) {
        match &e {
            CommandError::Cancelled => eprintln!("⚠️  Cancelled; finished work was kept"),
            CommandError::Failed(message) => eprintln!("❌ Error: {}", message),
        }
        std::process::exit(e.exit_code());
    }
}
