use std::env;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{anyhow, bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use indicatif::{ProgressBar, ProgressStyle};
use sentinel_core::{
    render_result, sort_newest_first, AnalysisBackend, AnalysisMode, AnalysisRequest,
    AnalysisResult, ClientSettings, HttpBackend, JobId, OutputFormat, PollPolicy, SessionDriver,
    SessionState,
};
use serde::Deserialize;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::warn;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(
    name = "sentinel",
    author,
    version,
    about = "Upload contracts and code to a Sentinel-Edge analysis service and review the findings"
)]
struct Cli {
    /// Configuration file with a [client] table (TOML, YAML or JSON)
    #[arg(long, value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    /// Base URL of the analysis service (overrides config and SENTINEL_BASE_URL)
    #[arg(long = "base-url", value_name = "URL", global = true)]
    base_url: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Upload a file, wait for the analysis and print the findings
    Analyze {
        /// File to analyse (.pdf; code files for vulnerability detection)
        file: PathBuf,
        /// Analysis mode: legal, vuln or pii
        #[arg(long, default_value = "legal")]
        mode: AnalysisMode,
        /// Optional context or question for the analysis
        #[arg(long)]
        prompt: Option<String>,
        #[arg(long, value_enum, default_value_t = Format::Human)]
        format: Format,
        /// Also download the rendered HTML report to this path
        /// (needs a service that runs analyses as jobs)
        #[arg(long = "html-out", value_name = "PATH")]
        html_out: Option<PathBuf>,
    },
    /// Show status and progress of a job
    Status { job_id: String },
    /// Fetch the report of a finished job
    Report {
        job_id: String,
        /// Mode the job was submitted with (defaults to the mode stated in the report)
        #[arg(long)]
        mode: Option<AnalysisMode>,
        #[arg(long, value_enum, default_value_t = Format::Human)]
        format: Format,
        #[arg(long = "html-out", value_name = "PATH")]
        html_out: Option<PathBuf>,
    },
    /// List past analyses, newest first
    History {
        /// Emit entries as JSON instead of human-readable text
        #[arg(long)]
        json: bool,
    },
    /// Check that the analysis service is reachable
    Health,
    /// List analysis modes and the file types they accept
    Modes,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Format {
    Human,
    Json,
    Yaml,
}

#[derive(Debug, Default, Deserialize)]
struct FileConfig {
    #[serde(default)]
    client: Option<ClientSettings>,
}

/// Environment variables layered over the `[client]` table of a config file.
const ENV_OVERRIDES: [(&str, &str); 5] = [
    ("base_url", "SENTINEL_BASE_URL"),
    ("timeout_secs", "SENTINEL_TIMEOUT_SECS"),
    ("poll_interval", "SENTINEL_POLL_INTERVAL"),
    ("max_poll_failures", "SENTINEL_MAX_POLL_FAILURES"),
    ("max_poll_duration", "SENTINEL_MAX_POLL_DURATION"),
];

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();
    let settings = load_settings(cli.config.as_deref(), cli.base_url.as_deref())?;

    match cli.command {
        Commands::Analyze {
            file,
            mode,
            prompt,
            format,
            html_out,
        } => analyze(&settings, &file, mode, prompt, format, html_out.as_deref()).await?,
        Commands::Status { job_id } => status(&settings, &JobId::new(job_id)).await?,
        Commands::Report {
            job_id,
            mode,
            format,
            html_out,
        } => report(&settings, &JobId::new(job_id), mode, format, html_out.as_deref()).await?,
        Commands::History { json } => history(&settings, json).await?,
        Commands::Health => health(&settings).await?,
        Commands::Modes => list_modes(),
    }
    Ok(())
}

fn load_settings(config: Option<&Path>, base_url: Option<&str>) -> Result<ClientSettings> {
    let mut settings = match config {
        Some(path) => load_config_file(path)?,
        None => ClientSettings::from_env()?,
    };
    if let Some(url) = base_url {
        settings.base_url = url.to_string();
    }
    Ok(settings)
}

fn load_config_file(path: &Path) -> Result<ClientSettings> {
    let mut builder = config::Config::builder().add_source(config::File::from(path));
    for (key, var) in ENV_OVERRIDES {
        if let Some(value) = env::var(var).ok().filter(|v| !v.trim().is_empty()) {
            builder = builder
                .set_override(format!("client.{key}"), value)
                .with_context(|| format!("failed to apply {var}"))?;
        }
    }
    let file: FileConfig = builder
        .build()
        .and_then(|cfg| cfg.try_deserialize())
        .with_context(|| format!("failed to load configuration from {}", path.display()))?;
    Ok(file.client.unwrap_or_default())
}

fn backend(settings: &ClientSettings) -> Result<Arc<HttpBackend>> {
    Ok(Arc::new(HttpBackend::new(settings)?))
}

async fn analyze(
    settings: &ClientSettings,
    file: &Path,
    mode: AnalysisMode,
    prompt: Option<String>,
    format: Format,
    html_out: Option<&Path>,
) -> Result<()> {
    let filename = file
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .with_context(|| format!("{} is not a file", file.display()))?;
    let contents = tokio::fs::read(file)
        .await
        .with_context(|| format!("failed to read {}", file.display()))?;
    let request = AnalysisRequest::new(filename.clone(), contents, mode)?.with_prompt(prompt);

    let backend = backend(settings)?;
    let driver = SessionDriver::new(Arc::clone(&backend), PollPolicy::from(settings));
    driver.select_file(request);
    let progress = show_progress(driver.subscribe(), filename);

    let state = tokio::select! {
        state = driver.submit() => state,
        _ = tokio::signal::ctrl_c() => {
            driver.reset();
            driver.state()
        }
    };
    if let Err(err) = progress.await {
        warn!(error = %err, "progress display task failed");
    }

    match state {
        SessionState::Complete(result) => {
            print_result(&result, format)?;
            if let Some(path) = html_out {
                let Some(job_id) = driver.current_job() else {
                    bail!(
                        "the service returned the report directly; no HTML report to write to {}",
                        path.display()
                    );
                };
                save_html(backend.as_ref(), &job_id, path).await?;
            }
            Ok(())
        }
        SessionState::Failed(err) => Err(anyhow!(err.user_message())),
        SessionState::Idle => bail!("analysis cancelled"),
        other => bail!("analysis ended in unexpected state `{}`", other.name()),
    }
}

/// Progress bar fed from session updates; ends when the session leaves the busy states.
fn show_progress(mut updates: watch::Receiver<SessionState>, filename: String) -> JoinHandle<()> {
    tokio::spawn(async move {
        let bar = ProgressBar::new(100);
        bar.set_style(
            ProgressStyle::with_template("{spinner} {msg} [{bar:40}] {pos}%")
                .unwrap_or_else(|_| ProgressStyle::default_bar()),
        );
        bar.set_message(format!("Uploading {filename}"));
        while updates.changed().await.is_ok() {
            let state = updates.borrow_and_update().clone();
            match state {
                SessionState::Submitting => bar.set_message(format!("Uploading {filename}")),
                SessionState::InProgress { progress, .. } => {
                    bar.set_message(format!("Analyzing {filename}"));
                    bar.set_position(u64::from(progress));
                }
                _ => break,
            }
        }
        bar.finish_and_clear();
    })
}

fn print_result(result: &AnalysisResult, format: Format) -> Result<()> {
    let output = match format {
        Format::Human => render_result(result, OutputFormat::Human)?,
        Format::Json => render_result(result, OutputFormat::Json)?,
        Format::Yaml => serde_yaml::to_string(result)?,
    };
    println!("{}", output.trim_end());
    Ok(())
}

async fn save_html(backend: &HttpBackend, job_id: &JobId, path: &Path) -> Result<()> {
    let html = backend
        .report_html(job_id)
        .await
        .with_context(|| format!("failed to download HTML report for job {job_id}"))?;
    tokio::fs::write(path, html)
        .await
        .with_context(|| format!("failed to write {}", path.display()))?;
    eprintln!("HTML report written to {}", path.display());
    Ok(())
}

async fn status(settings: &ClientSettings, job_id: &JobId) -> Result<()> {
    let snapshot = backend(settings)?
        .status(job_id)
        .await
        .with_context(|| format!("failed to fetch status of job {job_id}"))?;
    println!(
        "{job_id}: {:?} ({}%)",
        snapshot.status, snapshot.progress
    );
    if let Some(error) = snapshot.error {
        println!("  error: {error}");
    }
    Ok(())
}

async fn report(
    settings: &ClientSettings,
    job_id: &JobId,
    mode: Option<AnalysisMode>,
    format: Format,
    html_out: Option<&Path>,
) -> Result<()> {
    let backend = backend(settings)?;
    let raw = backend
        .report(job_id)
        .await
        .with_context(|| format!("failed to fetch report of job {job_id}"))?;
    let result = AnalysisResult::from_report(raw, mode, None);
    print_result(&result, format)?;
    if let Some(path) = html_out {
        save_html(backend.as_ref(), job_id, path).await?;
    }
    Ok(())
}

async fn history(settings: &ClientSettings, json: bool) -> Result<()> {
    let mut entries = backend(settings)?
        .history()
        .await
        .context("failed to fetch analysis history")?;
    sort_newest_first(&mut entries);
    if json {
        println!("{}", serde_json::to_string_pretty(&entries)?);
        return Ok(());
    }

    if entries.is_empty() {
        println!("No past scans.");
        return Ok(());
    }
    println!("{} past scan(s)", entries.len());
    for entry in entries {
        let created = entry
            .created()
            .map(|at| at.format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_else(|| "-".to_string());
        let score = match (entry.score, entry.band()) {
            (Some(score), Some(band)) => format!("{score:>5.0} ({band:?})"),
            _ => "    -".to_string(),
        };
        let findings = entry
            .finding_count
            .map(|n| format!(", {n} findings"))
            .unwrap_or_default();
        println!(
            "- {created:<16} {name:<32} score {score}{findings}",
            name = entry.filename,
        );
    }
    Ok(())
}

async fn health(settings: &ClientSettings) -> Result<()> {
    let backend = backend(settings)?;
    println!("Checking analysis service at {}", backend.base_url());
    let status = backend
        .health()
        .await
        .with_context(|| format!("analysis service at {} is unreachable", backend.base_url()))?;
    if !status.is_ok() {
        bail!("analysis service reported status `{}`", status.status);
    }
    println!("  status: {}", status.status);
    for (key, value) in &status.details {
        println!("  {key}: {value}");
    }
    Ok(())
}

fn list_modes() {
    for mode in AnalysisMode::ALL {
        let extensions = mode
            .accepted_extensions()
            .iter()
            .map(|ext| format!(".{ext}"))
            .collect::<Vec<_>>()
            .join(" ");
        println!(
            "- {name:<24} {desc} [{extensions}]",
            name = mode.as_str(),
            desc = mode.description(),
        );
    }
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,tokio=warn,hyper=warn,reqwest=warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .try_init();
}
