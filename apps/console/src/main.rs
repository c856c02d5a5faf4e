use std::{path::PathBuf, sync::Arc};

use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use clap::{Parser, Subcommand};
use client_core::{
    connect, load_settings, presentation::project, ClientSettings, Controller, Outcome,
    PayloadEncoding, Presenter, Prompt, RenderTarget, ViewFragment,
};
use tracing_subscriber::EnvFilter;

mod render;
mod shell;

use render::TerminalTarget;
use shell::StdinPrompt;

#[derive(Parser, Debug)]
#[command(name = "payload-console", about = "Browse, edit, run and save payloads on the device")]
struct Args {
    /// TOML config file (defaults to ./console.toml when present)
    #[arg(long)]
    config: Option<PathBuf>,
    #[arg(long)]
    device_url: Option<String>,
    #[arg(long)]
    username: Option<String>,
    #[arg(long)]
    password: Option<String>,
    /// Request timeout in seconds, 0 to wait forever
    #[arg(long)]
    timeout: Option<u64>,
    /// plain or base64
    #[arg(long, value_parser = parse_encoding)]
    encoding: Option<PayloadEncoding>,
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Interactive shell (default)
    Shell,
    /// Print the payloads stored on the device
    List,
    /// Print board identity and storage/memory utilization
    Stats,
    /// Print a stored payload
    Show { name: String },
    /// Load a stored payload and run it
    Run { name: String },
    /// Upload a local file as a payload
    Save {
        path: PathBuf,
        /// Name on the device (defaults to the local file name)
        #[arg(long)]
        name: Option<String>,
    },
}

fn parse_encoding(raw: &str) -> Result<PayloadEncoding> {
    raw.parse()
}

fn resolve_settings(args: &Args) -> Result<ClientSettings> {
    let mut settings = load_settings(args.config.as_deref())?;
    if let Some(v) = &args.device_url {
        settings.device_url = v.clone();
    }
    if let Some(v) = &args.username {
        settings.username = Some(v.clone());
    }
    if let Some(v) = &args.password {
        settings.password = Some(v.clone());
    }
    if let Some(v) = args.timeout {
        settings.request_timeout = (v > 0).then(|| std::time::Duration::from_secs(v));
    }
    if let Some(v) = args.encoding {
        settings.payload_encoding = v;
    }
    Ok(settings)
}

/// Answers the filename prompt of a one-shot save.
struct FixedName(String);

#[async_trait]
impl Prompt for FixedName {
    async fn prompt_text(&self, _message: &str) -> Option<String> {
        Some(self.0.clone())
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn settled(outcome: Outcome) -> Result<()> {
    match outcome {
        Outcome::Applied => Ok(()),
        Outcome::Failed(failure) => Err(anyhow!(failure)),
        Outcome::Superseded => bail!("request was superseded"),
        Outcome::Aborted => bail!("aborted"),
    }
}

fn print_fragments(controller: &Controller, wanted: impl Fn(&ViewFragment) -> bool) {
    let target = TerminalTarget;
    for fragment in project(&controller.state()) {
        if wanted(&fragment) {
            target.render(fragment);
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let args = Args::parse();
    let settings = resolve_settings(&args)?;

    match args.command.unwrap_or(Command::Shell) {
        Command::Shell => {
            let input = shell::stdin_lines();
            let controller = Arc::new(connect(
                &settings,
                Arc::new(StdinPrompt::new(input.clone())),
            )?);
            let presenter = Presenter::new(Arc::new(TerminalTarget));
            let rx = controller.store().subscribe();
            let follower = tokio::spawn(async move { presenter.follow(rx).await });
            let result = shell::run_shell(controller, input).await;
            follower.abort();
            result
        }
        Command::List => {
            let controller = connect(&settings, Arc::new(client_core::NoPrompt))?;
            settled(controller.list_payloads().await)?;
            print_fragments(&controller, |f| matches!(f, ViewFragment::PayloadList(_)));
            Ok(())
        }
        Command::Stats => {
            let controller = connect(&settings, Arc::new(client_core::NoPrompt))?;
            settled(controller.fetch_statistics().await)?;
            print_fragments(&controller, |f| matches!(f, ViewFragment::Statistics(_)));
            Ok(())
        }
        Command::Show { name } => {
            let controller = connect(&settings, Arc::new(client_core::NoPrompt))?;
            settled(controller.load_payload(&name).await)?;
            print_fragments(&controller, |f| matches!(f, ViewFragment::ActivePayload(_)));
            Ok(())
        }
        Command::Run { name } => {
            let controller = connect(&settings, Arc::new(client_core::NoPrompt))?;
            settled(controller.load_payload(&name).await)?;
            settled(controller.run_payload().await)?;
            print_fragments(&controller, |f| {
                matches!(f, ViewFragment::ActivePayload(_) | ViewFragment::Notification(_))
            });
            Ok(())
        }
        Command::Save { path, name } => {
            let name = match name {
                Some(name) => name,
                None => path
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .ok_or_else(|| anyhow!("cannot derive a payload name from {}", path.display()))?,
            };
            let content = shell::read_local(&path).await?;
            let controller = connect(&settings, Arc::new(FixedName(name)))?;
            controller.edit_content(content);
            settled(controller.save_payload().await)?;
            let state = controller.state();
            print_fragments(&controller, |f| matches!(f, ViewFragment::Notification(_)));
            if state.notification.severity == shared::domain::Severity::Error {
                bail!("device rejected the save");
            }
            Ok(())
        }
    }
}
