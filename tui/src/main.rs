//! localchat Entry Point
//!
//! Launches the terminal chat UI, or answers a single prompt without it.
//!
//! Usage:
//!   localchat [OPTIONS]
//!
//! Options:
//!   --host <HOST>          Ollama host (default: localhost)
//!   --port <PORT>          Ollama port (default: 11434)
//!   -m, --model <NAME>     Model to use
//!   --config <PATH>        Config file
//!   --history-dir <PATH>   Saved conversations folder
//!   -p, --prompt <TEXT>    Print one answer and exit
//!   --log-file <PATH>      Log file for the TUI

use std::io;
use std::panic;
use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::Parser;
use crossterm::{
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::backend::CrosstermBackend;
use ratatui::Terminal;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use localchat_core::{
    load_config_from_path, ChatBackend, ChatConfig, ConfigOverrides, GenerateRequest,
    OllamaBackend,
};
use localchat_tui::App;

/// Chat with a local model server
#[derive(Parser, Debug)]
#[command(name = "localchat", version, about)]
struct Args {
    /// Ollama host
    #[arg(long)]
    host: Option<String>,

    /// Ollama port
    #[arg(long)]
    port: Option<u16>,

    /// Model to use
    #[arg(short, long)]
    model: Option<String>,

    /// Configuration file (default: ~/.config/localchat/config.toml)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Folder for saved conversations
    #[arg(long)]
    history_dir: Option<PathBuf>,

    /// Answer one prompt on stdout and exit
    #[arg(short, long)]
    prompt: Option<String>,

    /// Log file (default: <data dir>/localchat/localchat.log)
    #[arg(long)]
    log_file: Option<PathBuf>,
}

impl Args {
    fn overrides(&self) -> ConfigOverrides {
        let mut overrides = ConfigOverrides::new();
        if let Some(host) = &self.host {
            overrides = overrides.with_host(host.clone());
        }
        if let Some(port) = self.port {
            overrides = overrides.with_port(port);
        }
        if let Some(model) = &self.model {
            overrides = overrides.with_default_model(model.clone());
        }
        if let Some(dir) = &self.history_dir {
            overrides = overrides.with_history_dir(dir.clone());
        }
        overrides
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let mut config = load_config_from_path(args.config.clone())
        .await
        .context("loading configuration")?;
    args.overrides().apply(&mut config);
    config.validate()?;

    if let Some(prompt) = &args.prompt {
        init_stderr_logging();
        return answer_once(&config, prompt).await;
    }

    let log_path = args
        .log_file
        .clone()
        .or_else(default_log_path)
        .unwrap_or_else(|| PathBuf::from("localchat.log"));
    init_file_logging(&log_path)?;

    tracing::info!(
        source = %config.source(),
        host = %config.host,
        port = config.port,
        "Starting localchat"
    );

    require_tty()?;
    install_panic_hook();

    let mut terminal = setup_terminal()?;

    // Run the app
    let result = run_app(&mut terminal, config).await;

    restore_terminal(&mut terminal)?;

    // Propagate any errors
    result
}

async fn run_app(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    config: ChatConfig,
) -> anyhow::Result<()> {
    let mut app = App::new(config).await?;
    app.run(terminal).await
}

/// `--prompt`: one non-streaming answer, no UI
async fn answer_once(config: &ChatConfig, prompt: &str) -> anyhow::Result<()> {
    let backend = OllamaBackend::new(
        config.backend_config().base_url(),
        config.connect_timeout,
        config.request_timeout,
    )?;

    let model = match &config.default_model {
        Some(model) => model.clone(),
        None => backend
            .list_models()
            .await?
            .into_iter()
            .map(|m| m.name)
            .min()
            .context("no model configured and the server lists none; pass --model")?,
    };

    let response = backend
        .generate(&GenerateRequest {
            model: model.clone(),
            prompt: prompt.to_string(),
            context: None,
        })
        .await?;

    tracing::info!(model = %model, duration_ms = response.duration_ms, "Prompt answered");
    println!("{}", localchat_core::clean_response(&response.content));
    Ok(())
}

fn default_log_path() -> Option<PathBuf> {
    dirs::data_dir().map(|d| d.join("localchat").join("localchat.log"))
}

fn init_stderr_logging() {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_target(false).with_writer(io::stderr))
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .init();
}

/// Log to a file so output never lands on the alternate screen
fn init_file_logging(path: &Path) -> anyhow::Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("creating log directory {}", parent.display()))?;
    }
    let file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("opening log file {}", path.display()))?;

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_ansi(false)
                .with_writer(std::sync::Mutex::new(file)),
        )
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    Ok(())
}

fn require_tty() -> anyhow::Result<()> {
    use std::io::IsTerminal;

    if !io::stdin().is_terminal() || !io::stdout().is_terminal() {
        anyhow::bail!(
            "localchat requires a terminal (TTY); use --prompt for non-interactive use"
        );
    }
    Ok(())
}

/// Restore the terminal before the panic message prints
fn install_panic_hook() {
    let original_hook = panic::take_hook();
    panic::set_hook(Box::new(move |panic_info| {
        let _ = disable_raw_mode();
        let _ = execute!(io::stdout(), LeaveAlternateScreen);
        original_hook(panic_info);
    }));
}

fn setup_terminal() -> anyhow::Result<Terminal<CrosstermBackend<io::Stdout>>> {
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let mut terminal = Terminal::new(CrosstermBackend::new(stdout))?;
    terminal.clear()?;
    Ok(terminal)
}

fn restore_terminal(terminal: &mut Terminal<CrosstermBackend<io::Stdout>>) -> anyhow::Result<()> {
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_cli_overrides() {
        let args = Args::parse_from([
            "localchat",
            "--host",
            "gpu-box",
            "--port",
            "11500",
            "-m",
            "mistral",
            "--history-dir",
            "/tmp/chats",
        ]);
        let mut config = ChatConfig::default();
        args.overrides().apply(&mut config);

        assert_eq!(config.host, "gpu-box");
        assert_eq!(config.port, 11500);
        assert_eq!(config.default_model.as_deref(), Some("mistral"));
        assert_eq!(config.history_dir, Some(PathBuf::from("/tmp/chats")));
    }

    #[test]
    fn test_prompt_flag() {
        let args = Args::parse_from(["localchat", "-p", "why is the sky blue?"]);
        assert_eq!(args.prompt.as_deref(), Some("why is the sky blue?"));
        assert!(args.model.is_none());
    }
}
