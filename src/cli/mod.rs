use crate::app_error::AppError;
use crate::config::{self, Config};
use crate::detach::{self, Worker};
use crate::logging;
use crate::model::{Run, RunStatus};
use crate::orchestrator::{self, Request};
use crate::output::{self, RunRow, RunSummary};
use crate::runner::{RUN_DIR_ENV, ShellRunner};
use crate::status::{self, Selector};
use crate::version;
use crate::workspace;
use clap::builder::styling::{AnsiColor, Effects, Styles};
use clap::{ArgGroup, Args, CommandFactory, Parser, Subcommand, ValueEnum};
use clap_complete::{Generator, generate};
use serde::Serialize;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use time::OffsetDateTime;

#[derive(Debug, Parser)]
#[command(
    name = "longrun",
    version = version::VALUE,
    about = "Run a command and its follow-ups in the background with pollable state",
    styles = clap_styles()
)]
struct Cli {
    #[arg(long = "no-color", global = true)]
    no_color: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Run a main command, then each follow-up while they keep succeeding
    Run(RunArgs),
    /// Show the state of one run
    Status(StatusArgs),
    /// List runs in the workspace, newest first
    List(ListArgs),
    /// Check the workspace config file
    Validate(ValidateArgs),
    Version,
    Completion(CompletionArgs),
}

#[derive(Debug, Args)]
struct WorkspaceArgs {
    /// Workspace root (default: enclosing git repository)
    #[arg(long, env = "LONGRUN_WORKSPACE")]
    workspace: Option<PathBuf>,
    /// Config file (default: <workspace>/longrun.yml)
    #[arg(long)]
    config: Option<PathBuf>,
}

#[derive(Debug, Args)]
struct RunArgs {
    #[command(flatten)]
    target: WorkspaceArgs,

    /// Short name for the run, used as the run id prefix
    #[arg(long)]
    label: String,

    /// Main shell command
    #[arg(long, allow_hyphen_values = true)]
    cmd: String,

    /// Follow-up shell command, run in order after the main command succeeds
    #[arg(long = "then", allow_hyphen_values = true)]
    then: Vec<String>,

    /// Start a background orchestrator and print only the run id
    #[arg(long)]
    detach: bool,
}

#[derive(Debug, Args)]
#[command(group(ArgGroup::new("selector").required(true).args(["run_id", "latest"])))]
struct StatusArgs {
    #[command(flatten)]
    target: WorkspaceArgs,

    #[arg(long = "run-id")]
    run_id: Option<String>,

    /// Most recently created run
    #[arg(long)]
    latest: bool,

    /// Print the raw state record
    #[arg(long)]
    json: bool,
}

#[derive(Debug, Args)]
struct ListArgs {
    #[command(flatten)]
    target: WorkspaceArgs,

    #[arg(long, default_value_t = 20)]
    limit: usize,

    #[arg(long)]
    json: bool,
}

#[derive(Debug, Args)]
struct ValidateArgs {
    #[command(flatten)]
    target: WorkspaceArgs,

    #[arg(long)]
    json: bool,
}

#[derive(Debug, Args)]
struct CompletionArgs {
    #[arg(value_enum)]
    shell: Shell,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Shell {
    Bash,
    Zsh,
    Fish,
    Powershell,
}

fn clap_styles() -> Styles {
    Styles::plain()
        .header(AnsiColor::White.on_default() | Effects::BOLD)
        .error(AnsiColor::Red.on_default() | Effects::BOLD)
        .usage(AnsiColor::Cyan.on_default())
        .literal(AnsiColor::Cyan.on_default())
        .placeholder(AnsiColor::Cyan.on_default())
        .valid(AnsiColor::Cyan.on_default())
        .invalid(AnsiColor::Cyan.on_default())
        .context(AnsiColor::White.on_default())
        .context_value(AnsiColor::Cyan.on_default())
}

pub fn run_cli() -> Result<(), AppError> {
    let cli = Cli::parse();
    output::configure(cli.no_color);

    // Read once; everything below takes the handed-over directory as a plain argument.
    let reattach = match &cli.command {
        Commands::Run(_) => std::env::var_os(RUN_DIR_ENV)
            .filter(|dir| !dir.is_empty())
            .map(PathBuf::from),
        _ => None,
    };
    logging::init(if reattach.is_some() { "info" } else { "warn" });

    match cli.command {
        Commands::Run(args) => run_run(args, reattach),
        Commands::Status(args) => run_status(args),
        Commands::List(args) => run_list(args),
        Commands::Validate(args) => run_validate(args),
        Commands::Version => {
            println!("{}", version::VALUE);
            Ok(())
        }
        Commands::Completion(args) => run_completion(args),
    }
}

struct Resolved {
    workspace: PathBuf,
    config: Config,
    explicit_config: Option<PathBuf>,
}

impl Resolved {
    fn runs_root(&self) -> PathBuf {
        self.config.runs_root(&self.workspace)
    }
}

fn resolve_target(args: &WorkspaceArgs) -> Result<Resolved, AppError> {
    let workspace = workspace::resolver(args.workspace.as_deref()).resolve()?;

    let explicit_config = match &args.config {
        Some(path) => Some(
            std::path::absolute(path)
                .map_err(|e| AppError::usage(format!("config path {}: {e}", path.display())))?,
        ),
        None => None,
    };
    let config_path = config::path_for(&workspace, explicit_config.as_deref());
    let config = load_config_classified(&config_path, explicit_config.is_some())?;

    Ok(Resolved {
        workspace,
        config,
        explicit_config,
    })
}

fn load_config_classified(path: &Path, explicit: bool) -> Result<Config, AppError> {
    config::load(path, explicit).map_err(|err| {
        if err.starts_with("read config:") {
            AppError::internal(err)
        } else {
            AppError::usage(err)
        }
    })
}

fn run_run(args: RunArgs, reattach: Option<PathBuf>) -> Result<(), AppError> {
    if args.detach && reattach.is_some() {
        return Err(AppError::usage(format!(
            "--detach cannot be used while {RUN_DIR_ENV} is set"
        )));
    }

    let resolved = resolve_target(&args.target)?;
    let request = Request {
        label: args.label,
        workspace: resolved.workspace.clone(),
        runs_root: resolved.runs_root(),
        main_command: args.cmd,
        followup_commands: args.then,
    };

    if args.detach {
        let (dir, run) = orchestrator::create(&request, OffsetDateTime::now_utc())?;
        let worker = Worker::current(resolved.workspace, resolved.explicit_config)?;
        detach::spawn(&worker, &dir, &run)?;
        println!("{}", run.run_id);
        return Ok(());
    }

    let runner = ShellRunner::new(resolved.config.shell.clone());
    let (_, run) = orchestrator::execute(&request, reattach.as_deref(), &runner)?;

    match run.status {
        RunStatus::Completed => Ok(()),
        _ => Err(AppError::runtime(format!(
            "run {} failed: {}",
            run.run_id,
            run.error_message.as_deref().unwrap_or("unknown error")
        ))),
    }
}

fn run_status(args: StatusArgs) -> Result<(), AppError> {
    let resolved = resolve_target(&args.target)?;
    let selector = match args.run_id {
        Some(run_id) => Selector::RunId(run_id),
        None => Selector::Latest,
    };

    let report = status::report(&resolved.runs_root(), &selector)?;

    if args.json {
        let mut stdout = io::stdout().lock();
        serde_json::to_writer_pretty(&mut stdout, &report.run)
            .map_err(|e| AppError::internal(format!("encode state json: {e}")))?;
        writeln!(stdout).map_err(|e| AppError::internal(format!("write output: {e}")))?;
        return Ok(());
    }

    output::print_status(io::stdout().lock(), &report, OffsetDateTime::now_utc())
        .map_err(|e| AppError::internal(format!("print status: {e}")))
}

#[derive(Serialize)]
struct ListEntry<'a> {
    run_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    state: Option<&'a Run>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

fn run_list(args: ListArgs) -> Result<(), AppError> {
    let resolved = resolve_target(&args.target)?;
    let mut runs = status::list(&resolved.runs_root())?;
    runs.truncate(args.limit);

    if args.json {
        let entries: Vec<ListEntry<'_>> = runs
            .iter()
            .map(|(dir, state)| ListEntry {
                run_id: dir.run_id(),
                state: state.as_ref().ok(),
                error: state.as_ref().err().map(|e| e.to_string()),
            })
            .collect();

        let mut stdout = io::stdout().lock();
        serde_json::to_writer_pretty(&mut stdout, &entries)
            .map_err(|e| AppError::internal(format!("encode runs json: {e}")))?;
        writeln!(stdout).map_err(|e| AppError::internal(format!("write output: {e}")))?;
        return Ok(());
    }

    let rows: Vec<RunRow> = runs
        .into_iter()
        .map(|(dir, state)| RunRow {
            run_id: dir.run_id(),
            state: state.ok().map(|run| RunSummary {
                label: run.label,
                status: run.status,
                created_at: run.created_at,
                error_message: run.error_message,
            }),
        })
        .collect();

    output::print_runs(io::stdout().lock(), &rows)
        .map_err(|e| AppError::internal(format!("print runs: {e}")))
}

fn run_validate(args: ValidateArgs) -> Result<(), AppError> {
    #[derive(Serialize)]
    struct Issue<'a> {
        field: &'a str,
        message: &'a str,
    }

    #[derive(Serialize)]
    struct ValidateOutput<'a> {
        valid: bool,
        config: &'a str,
        #[serde(skip_serializing_if = "Option::is_none")]
        issues: Option<Vec<Issue<'a>>>,
        #[serde(skip_serializing_if = "Option::is_none")]
        error: Option<&'a str>,
    }

    fn emit(out: &ValidateOutput<'_>) -> Result<(), AppError> {
        let mut stdout = io::stdout().lock();
        serde_json::to_writer_pretty(&mut stdout, out)
            .map_err(|e| AppError::internal(format!("encode validate json: {e}")))?;
        writeln!(stdout).map_err(|e| AppError::internal(format!("write output: {e}")))
    }

    let workspace = workspace::resolver(args.target.workspace.as_deref()).resolve()?;
    let config_path = config::path_for(&workspace, args.target.config.as_deref());
    let config_path_text = config_path.display().to_string();

    let parsed = if config_path.exists() {
        config::parse(&config_path)
    } else {
        Err(format!("config file {config_path_text} not found"))
    };

    let cfg = match parsed {
        Ok(cfg) => cfg,
        Err(err) => {
            if args.json {
                emit(&ValidateOutput {
                    valid: false,
                    config: &config_path_text,
                    issues: None,
                    error: Some(&err),
                })?;
            }
            return Err(AppError::usage(err));
        }
    };

    match config::validate(&cfg) {
        Ok(()) => {
            if args.json {
                emit(&ValidateOutput {
                    valid: true,
                    config: &config_path_text,
                    issues: None,
                    error: None,
                })?;
            } else {
                println!("valid {}", output::command(&config_path_text));
            }
            Ok(())
        }
        Err(err) => {
            if args.json {
                let issues: Vec<Issue<'_>> = err
                    .issues
                    .iter()
                    .map(|issue| Issue {
                        field: &issue.field,
                        message: &issue.message,
                    })
                    .collect();
                emit(&ValidateOutput {
                    valid: false,
                    config: &config_path_text,
                    issues: Some(issues),
                    error: Some(&err.to_string()),
                })?;
            }
            Err(AppError::usage(err.to_string()))
        }
    }
}

fn run_completion(args: CompletionArgs) -> Result<(), AppError> {
    let mut cmd = Cli::command();
    let mut stdout = io::stdout().lock();

    match args.shell {
        Shell::Bash => generate_completion(clap_complete::shells::Bash, &mut cmd, &mut stdout),
        Shell::Zsh => generate_completion(clap_complete::shells::Zsh, &mut cmd, &mut stdout),
        Shell::Fish => generate_completion(clap_complete::shells::Fish, &mut cmd, &mut stdout),
        Shell::Powershell => {
            generate_completion(clap_complete::shells::PowerShell, &mut cmd, &mut stdout)
        }
    }
    .map_err(|e| AppError::internal(format!("generate completion: {e}")))
}

fn generate_completion<G: Generator>(
    generator: G,
    cmd: &mut clap::Command,
    writer: &mut impl Write,
) -> Result<(), io::Error> {
    generate(generator, cmd, "longrun", writer);
    writer.flush()
}
