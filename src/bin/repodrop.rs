use std::io::{self, BufRead, Write};
use std::process::ExitCode;
use std::sync::Arc;

use camino::Utf8PathBuf;
use clap::{Args, Parser, Subcommand, ValueEnum};
use miette::IntoDiagnostic;
use tracing_subscriber::EnvFilter;

use repodrop::app::{App, Landing};
use repodrop::backend::{BackendHttpClient, UploadBackend};
use repodrop::config::{ConfigLoader, ResolvedConfig};
use repodrop::domain::{LocalFile, RepositoryName};
use repodrop::error::{ErrorKind, RepodropError};
use repodrop::extract::partition_requested;
use repodrop::github::{GithubHttpClient, HostingApi};
use repodrop::output::{JsonOutput, OutputMode, TextProgress, render_listing, render_toast};
use repodrop::session::{FileSessionStorage, Session};
use repodrop::tui::Tui;
use repodrop::view::Screen;
use repodrop::workflow::{ProgressSink, Stage, Step, UploadOutcome};

const TOKEN_ENV: &str = "REPODROP_TOKEN";

#[derive(Parser)]
#[command(name = "repodrop")]
#[command(about = "Upload local files into a folder of a GitHub repository")]
#[command(version, author)]
#[command(args_conflicts_with_subcommands = true)]
struct Cli {
    /// Print results as JSON.
    #[arg(long, global = true)]
    json: bool,

    /// Keep the session in memory only.
    #[arg(long, global = true)]
    ephemeral: bool,

    #[arg(long, global = true)]
    config: Option<String>,

    /// Files to preselect in the interactive UI.
    files: Vec<Utf8PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "Sign in, or print the authorization URL")]
    Login(LoginArgs),
    #[command(about = "Forget the stored access token")]
    Logout,
    #[command(about = "Show the signed-in account")]
    Whoami,
    #[command(about = "List repositories you can push to")]
    Repos,
    #[command(about = "List a folder of a repository")]
    Ls(LsArgs),
    #[command(about = "Upload files into a repository folder")]
    Upload(UploadArgs),
}

#[derive(Args)]
#[group(multiple = false)]
struct LoginArgs {
    /// URL the authorization flow redirected to (carries `?token=`).
    #[arg(long)]
    redirect: Option<String>,

    #[arg(long)]
    token: Option<String>,
}

#[derive(Args)]
struct LsArgs {
    repo: RepositoryName,

    #[arg(default_value = "")]
    path: String,
}

#[derive(Args)]
struct UploadArgs {
    #[arg(required = true)]
    files: Vec<Utf8PathBuf>,

    #[arg(long)]
    repo: RepositoryName,

    #[arg(long, default_value = "")]
    folder: String,

    /// Archive to extract server-side; repeatable.
    #[arg(long = "extract")]
    extract: Vec<String>,

    /// Whether to create a cache file when the repository is empty.
    #[arg(long, value_enum, default_value_t = Bootstrap::Ask)]
    bootstrap: Bootstrap,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Bootstrap {
    Yes,
    No,
    Ask,
}

fn main() -> ExitCode {
    if let Err(report) = run() {
        eprintln!("{report:?}");
        if let Some(error) = report.downcast_ref::<RepodropError>() {
            return ExitCode::from(map_exit_code(error));
        }
        return ExitCode::from(1);
    }
    ExitCode::SUCCESS
}

fn map_exit_code(error: &RepodropError) -> u8 {
    match error.kind() {
        ErrorKind::AuthExpired => 4,
        ErrorKind::NotFound => 2,
        ErrorKind::RemoteFailure | ErrorKind::NetworkFailure => 3,
        ErrorKind::Local => 1,
    }
}

fn run() -> miette::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let output_mode = if cli.json {
        OutputMode::Json
    } else if cli.command.is_some() {
        OutputMode::Text
    } else {
        OutputMode::Interactive
    };

    let config = ConfigLoader::resolve(cli.config.as_deref())?;
    let session = open_session(cli.ephemeral)?;
    let api = GithubHttpClient::new(&config, session.clone())?;
    let backend = BackendHttpClient::new(&config, session.clone())?;
    let mut app = App::new(config, session, api, backend);

    match cli.command {
        Some(command) => run_command(command, &mut app, output_mode),
        None => run_interactive(&mut app, cli.files, output_mode),
    }
}

fn open_session(ephemeral: bool) -> miette::Result<Session> {
    let session = if ephemeral {
        Session::in_memory()
    } else {
        Session::restore(Arc::new(FileSessionStorage::new()?))
    };
    if let Ok(token) = std::env::var(TOKEN_ENV) {
        if !token.trim().is_empty() {
            session.set(token.trim())?;
        }
    }
    Ok(session)
}

fn run_interactive<H: HostingApi, B: UploadBackend>(
    app: &mut App<H, B>,
    files: Vec<Utf8PathBuf>,
    output_mode: OutputMode,
) -> miette::Result<()> {
    let landing = app.initialize(None)?;
    let files = LocalFile::load_all(&files)?;
    if !files.is_empty() {
        app.workflow_mut().select_files(files)?;
    }
    if !matches!(output_mode, OutputMode::Interactive) {
        return print_landing(&landing, app.config(), output_mode, app.login_url()?);
    }
    let mut tui = Tui::new(app.login_url()?);
    tui.run(app)
}

fn run_command<H: HostingApi, B: UploadBackend>(
    command: Commands,
    app: &mut App<H, B>,
    output_mode: OutputMode,
) -> miette::Result<()> {
    match command {
        Commands::Login(args) => {
            let landing = if let Some(token) = args.token {
                app.login_with_token(&token)?
            } else if let Some(redirect) = args.redirect {
                app.initialize(Some(&redirect))?
            } else {
                let url = app.login_url()?;
                if matches!(output_mode, OutputMode::Json) {
                    JsonOutput::print_json(&serde_json::json!({ "authorize_url": url }))
                        .into_diagnostic()?;
                } else {
                    println!("Open this URL to authorize repodrop:\n{url}");
                }
                return Ok(());
            };
            if matches!(landing, Landing::Login) {
                return Err(RepodropError::AuthExpired.into());
            }
            print_landing(&landing, app.config(), output_mode, app.login_url()?)
        }
        Commands::Logout => {
            let step = app.logout();
            if matches!(output_mode, OutputMode::Json) {
                JsonOutput::print_step(&step).into_diagnostic()?;
            } else {
                println!("Signed out.");
            }
            Ok(())
        }
        Commands::Whoami => {
            let user = app.current_user()?;
            if matches!(output_mode, OutputMode::Json) {
                JsonOutput::print_user(&user).into_diagnostic()?;
            } else {
                println!("{}", user.login);
            }
            Ok(())
        }
        Commands::Repos => {
            let repositories = app.list_repositories()?;
            if matches!(output_mode, OutputMode::Json) {
                JsonOutput::print_repositories(&repositories).into_diagnostic()?;
            } else {
                for repo in &repositories {
                    let badge = if repo.private { "  private" } else { "" };
                    println!("{}{badge}", repo.full_name);
                }
            }
            Ok(())
        }
        Commands::Ls(args) => {
            let view = app.browse(args.repo, &args.path)?;
            if matches!(output_mode, OutputMode::Json) {
                JsonOutput::print_listing(&view).into_diagnostic()?;
            } else {
                for line in render_listing(&view) {
                    println!("{line}");
                }
            }
            Ok(())
        }
        Commands::Upload(args) => run_upload(args, app, output_mode),
    }
}

fn print_landing(
    landing: &Landing,
    config: &ResolvedConfig,
    output_mode: OutputMode,
    login_url: String,
) -> miette::Result<()> {
    if matches!(output_mode, OutputMode::Json) {
        return JsonOutput::print_json(landing).into_diagnostic();
    }
    match landing {
        Landing::Dashboard(user) => println!("Signed in as {} ({})", user.login, config.api_base_url),
        Landing::Login => println!("Not signed in. Authorize at:\n{login_url}"),
    }
    Ok(())
}

/// Drives one upload cycle the way the interactive UI would, answering each
/// screen from the command line arguments.
fn run_upload<H: HostingApi, B: UploadBackend>(
    args: UploadArgs,
    app: &mut App<H, B>,
    output_mode: OutputMode,
) -> miette::Result<()> {
    let files = LocalFile::load_all(&args.files)?;
    let (extract, ignored) = partition_requested(&files, &args.extract);
    for name in &ignored {
        tracing::warn!(name = %name, "not an archive in the selection; ignored");
    }
    let text = TextProgress;
    let json = JsonOutput;
    let sink: &dyn ProgressSink = match output_mode {
        OutputMode::Json => &json,
        _ => &text,
    };

    let workflow = app.workflow_mut();
    workflow.select_files(files)?;

    let step = settled(workflow.start(sink)?, output_mode)?;
    if let Screen::RepoPicker(picker) = &step.screen {
        if let Some(error) = &picker.error {
            tracing::warn!("{error}");
        }
    }

    let step = settled(workflow.pick_repository(args.repo.clone(), sink)?, output_mode)?;
    if step.stage == Stage::Idle {
        let message = step
            .toasts
            .first()
            .map(|toast| toast.message.clone())
            .unwrap_or_else(|| format!("could not open {}", args.repo));
        return Err(RepodropError::UploadFailed(message).into());
    }

    if !args.folder.is_empty() {
        settled(workflow.open_folder(&args.folder)?, output_mode)?;
    }
    settled(workflow.select_folder()?, output_mode)?;

    let mut step = if extract.is_empty() {
        workflow.skip_extraction(sink)?
    } else {
        for name in &extract {
            workflow.toggle_extraction(name)?;
        }
        workflow.confirm_extraction(sink)?
    };
    step = settled(step, output_mode)?;

    if let Screen::CachePrompt { repository } = &step.screen {
        let accept = match args.bootstrap {
            Bootstrap::Yes => true,
            Bootstrap::No => false,
            Bootstrap::Ask => ask(&format!(
                "{repository} is empty. Create a cache file first? [y/N] "
            ))?,
        };
        step = if accept {
            workflow.accept_bootstrap(sink)?
        } else {
            workflow.decline_bootstrap(sink)?
        };
        step = settled(step, output_mode)?;
    }

    if let Screen::BootstrapFailed { message, help_url } = &step.screen {
        let error = RepodropError::BootstrapFailed {
            message: message.clone(),
            help_url: help_url.clone(),
        };
        workflow.dismiss()?;
        return Err(error.into());
    }

    match &step.outcome {
        Some(UploadOutcome::Done) => Ok(()),
        Some(UploadOutcome::Failed(message)) => {
            Err(RepodropError::UploadFailed(message.clone()).into())
        }
        None => Err(RepodropError::UploadFailed(format!(
            "upload stopped at {}",
            step.stage
        ))
        .into()),
    }
}

/// Reports toasts of a step and turns a forced logout into an error.
fn settled(step: Step, output_mode: OutputMode) -> miette::Result<Step> {
    match output_mode {
        OutputMode::Json => {
            if !step.toasts.is_empty() || step.outcome.is_some() {
                JsonOutput::print_step(&step).into_diagnostic()?;
            }
        }
        _ => {
            for toast in &step.toasts {
                eprintln!("{}", render_toast(toast));
            }
        }
    }
    if step.screen.is_login() {
        return Err(RepodropError::AuthExpired.into());
    }
    Ok(step)
}

fn ask(prompt: &str) -> miette::Result<bool> {
    let mut stderr = io::stderr();
    stderr.write_all(prompt.as_bytes()).into_diagnostic()?;
    stderr.flush().into_diagnostic()?;
    let mut answer = String::new();
    io::stdin()
        .lock()
        .read_line(&mut answer)
        .into_diagnostic()?;
    Ok(matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes"))
}
