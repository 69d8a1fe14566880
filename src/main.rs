// ABOUTME: scrape-ctl command-line entry point
// ABOUTME: Parses arguments, loads configuration, and drives the job controller

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use dialoguer::MultiSelect;
use std::io::{IsTerminal, Read};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;
use tracing_subscriber::EnvFilter;

use scrape_controller::remote::SampleUrl;
use scrape_controller::ui::{render, LogKind, TerminalRenderer};
use scrape_controller::{Config, ControllerState, JobController, JobService, RemoteClient};

#[derive(Parser)]
#[command(name = "scrape-ctl")]
#[command(about = "Start, stop, and follow a remote scraping job")]
#[command(version)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, default_value = "scrape-ctl.toml")]
    config: PathBuf,

    /// Base URL of the scraping service
    #[arg(long, env = "SCRAPE_CTL_URL")]
    url: Option<String>,

    /// Status poll interval in milliseconds
    #[arg(long)]
    poll_interval_ms: Option<u64>,

    /// Give up after this many consecutive failed status polls
    #[arg(long)]
    max_poll_failures: Option<u32>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start a job and follow it until it finishes (Ctrl-C stops it)
    Run(StartArgs),
    /// Start a job and return immediately
    Start(StartArgs),
    /// Stop the running job
    Stop,
    /// Print the current job status
    Status {
        /// Print raw JSON
        #[arg(long)]
        json: bool,
    },
    /// Attach to a running job and follow it
    Watch,
    /// List the service's sample category URLs
    Samples,
    /// Download the latest results artifact
    Download {
        /// Output file (defaults to scrape_results_<timestamp>.xlsx)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Check that the service is reachable
    Health,
}

#[derive(Args)]
struct StartArgs {
    /// Category URLs
    urls: Vec<String>,

    /// Read URLs from a file, one per line ("-" for stdin)
    #[arg(short, long)]
    file: Option<PathBuf>,

    /// Choose from the service's sample URLs interactively
    #[arg(long)]
    pick: bool,

    /// Number of scraping workers
    #[arg(short, long)]
    workers: Option<u32>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = Config::load(&cli.config)?;
    if let Some(url) = cli.url {
        config.base_url = url;
    }
    if let Some(ms) = cli.poll_interval_ms {
        config.poll_interval_ms = ms;
    }
    if cli.max_poll_failures.is_some() {
        config.max_consecutive_failures = cli.max_poll_failures;
    }
    config.validate()?;

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let client = Arc::new(RemoteClient::new(
        config.base_url.clone(),
        config.request_timeout(),
    )?);
    let controller = JobController::new(client.clone(), config.controller_options());

    match cli.command {
        Commands::Run(args) => {
            let input = collect_input(&args, client.as_ref()).await?;
            let workers = args.workers.unwrap_or(config.default_workers);
            run(&controller, &input, workers).await
        }
        Commands::Start(args) => {
            let input = collect_input(&args, client.as_ref()).await?;
            let workers = args.workers.unwrap_or(config.default_workers);
            let result = controller.request_start(&input, workers).await?;
            println!(
                "Started scraping {} categories",
                result.accepted_count.unwrap_or_default()
            );
            controller.synchronizer().stop();
            Ok(())
        }
        Commands::Stop => {
            if controller.attach().await? != ControllerState::Running {
                println!("No job is running");
                return Ok(());
            }
            let result = controller.request_stop().await?;
            println!(
                "{}",
                result.message.unwrap_or_else(|| "Stopped".to_string())
            );
            Ok(())
        }
        Commands::Status { json } => {
            let status = client.status().await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&status)?);
            } else {
                println!(
                    "{} {:.0}%",
                    render::badge(render::remote_state(&status)),
                    status.progress_percent
                );
                if let Some(task) = &status.current_task {
                    println!("Task:     {}", task);
                }
                if let Some(error) = &status.error {
                    println!("Error:    {}", error);
                }
                if let Some(results) = &status.results {
                    for line in render::summary_lines(results) {
                        println!("{}", line);
                    }
                }
            }
            Ok(())
        }
        Commands::Watch => {
            let mut renderer = renderer();
            let mut events = controller.subscribe();
            if controller.attach().await? != ControllerState::Running {
                renderer.log(LogKind::Info, "No job is running");
                return Ok(());
            }
            follow(&controller, &mut events, &mut renderer).await
        }
        Commands::Samples => {
            for sample in client.sample_urls().await? {
                println!("{}\n    {}\n    {}", sample.name, sample.description, sample.url);
            }
            Ok(())
        }
        Commands::Download { output } => {
            let bytes = client.download_results().await?;
            let path = output.unwrap_or_else(|| {
                PathBuf::from(format!(
                    "scrape_results_{}.xlsx",
                    chrono::Utc::now().timestamp()
                ))
            });
            tokio::fs::write(&path, &bytes)
                .await
                .with_context(|| format!("Failed to write {}", path.display()))?;
            println!("Saved {} bytes to {}", bytes.len(), path.display());
            Ok(())
        }
        Commands::Health => {
            let health = client.health().await?;
            println!(
                "{} (version {})",
                health.status,
                health.version.as_deref().unwrap_or("unknown")
            );
            Ok(())
        }
    }
}

fn renderer() -> TerminalRenderer {
    if std::io::stdout().is_terminal() {
        TerminalRenderer::new()
    } else {
        TerminalRenderer::hidden()
    }
}

async fn run(controller: &JobController, input: &str, workers: u32) -> Result<()> {
    let mut renderer = renderer();
    let mut events = controller.subscribe();
    controller.request_start(input, workers).await?;
    follow(controller, &mut events, &mut renderer).await
}

#[derive(Debug, PartialEq, Eq)]
enum InterruptAction {
    RequestStop,
    Exit,
}

/// The first Ctrl-C asks the service to stop the job; any later one exits,
/// since the handler has replaced the default SIGINT behaviour.
#[derive(Default)]
struct Interrupts {
    seen: u32,
}

impl Interrupts {
    fn next(&mut self) -> InterruptAction {
        self.seen += 1;
        if self.seen == 1 {
            InterruptAction::RequestStop
        } else {
            InterruptAction::Exit
        }
    }
}

/// Renders notifications until the run reaches a terminal state.
async fn follow(
    controller: &JobController,
    events: &mut tokio::sync::broadcast::Receiver<scrape_controller::StateChange>,
    renderer: &mut TerminalRenderer,
) -> Result<()> {
    let mut interrupts = Interrupts::default();

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => match interrupts.next() {
                InterruptAction::RequestStop => {
                    renderer.log(LogKind::Warning, "Stopping... (Ctrl-C again to exit)");
                    if let Err(e) = controller.request_stop().await {
                        renderer.log(LogKind::Error, format!("Stop failed: {}", e));
                    }
                }
                InterruptAction::Exit => anyhow::bail!("Interrupted"),
            },
            change = events.recv() => match change {
                Ok(change) => {
                    renderer.render(&change);
                    if change.state.is_terminal() {
                        if change.state == ControllerState::Errored {
                            anyhow::bail!(
                                "job failed: {}",
                                change.message.unwrap_or_default()
                            );
                        }
                        return Ok(());
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    tracing::debug!(skipped, "Renderer fell behind");
                }
                Err(RecvError::Closed) => return Ok(()),
            }
        }
    }
}

/// Joins positional URLs, file/stdin lines, and picked samples into one
/// newline-separated input. Filtering happens in the controller.
async fn collect_input(args: &StartArgs, service: &dyn JobService) -> Result<String> {
    let mut lines = args.urls.clone();

    if let Some(path) = &args.file {
        let raw = if path.as_os_str() == "-" {
            let mut buf = String::new();
            std::io::stdin()
                .read_to_string(&mut buf)
                .context("Failed to read URLs from stdin")?;
            buf
        } else {
            std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read URL file {}", path.display()))?
        };
        lines.extend(raw.lines().map(str::to_string));
    }

    if args.pick {
        let samples = service.sample_urls().await?;
        lines.extend(pick_samples(&samples)?);
    }

    Ok(lines.join("\n"))
}

fn pick_samples(samples: &[SampleUrl]) -> Result<Vec<String>> {
    if samples.is_empty() {
        return Ok(Vec::new());
    }
    let items: Vec<String> = samples
        .iter()
        .map(|s| format!("{} ({})", s.name, s.description))
        .collect();
    let chosen = MultiSelect::new()
        .with_prompt("Select sample categories")
        .items(&items)
        .interact()
        .context("Sample selection cancelled")?;
    Ok(chosen.into_iter().map(|i| samples[i].url.clone()).collect())
}
