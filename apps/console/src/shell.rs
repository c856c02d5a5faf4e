//! Interactive shell: reads operator commands from stdin and forwards them
//! as intents. Remote operations other than save run in the background so
//! a pending request can be replaced or cancelled from the prompt.

use std::{path::Path, sync::Arc};

use anyhow::{Context, Result};
use async_trait::async_trait;
use client_core::{dispatch, Controller, Intent, OperationClass, Prompt};
use tokio::{
    io::{self, AsyncBufReadExt, AsyncWriteExt, BufReader, Lines, Stdin},
    sync::Mutex,
};
use tracing::debug;

pub type InputLines = Arc<Mutex<Lines<BufReader<Stdin>>>>;

pub fn stdin_lines() -> InputLines {
    Arc::new(Mutex::new(BufReader::new(io::stdin()).lines()))
}

/// Filename prompt backed by the same stdin the shell reads from.
pub struct StdinPrompt {
    input: InputLines,
}

impl StdinPrompt {
    pub fn new(input: InputLines) -> Self {
        Self { input }
    }
}

#[async_trait]
impl Prompt for StdinPrompt {
    async fn prompt_text(&self, message: &str) -> Option<String> {
        let mut out = io::stdout();
        let _ = out.write_all(message.as_bytes()).await;
        let _ = out.flush().await;
        match self.input.lock().await.next_line().await {
            Ok(line) => line,
            Err(err) => {
                debug!(%err, "prompt input closed");
                None
            }
        }
    }
}

const HELP: &str = "\
commands:
  ls                 refresh payload list and device statistics
  load <name>        load a payload from the device into the editor
  edit               replace the editor content (end input with a single `.`)
  open <path>        replace the editor content with a local file
  run                run the editor content on the device
  save               save the editor content (asks for a name if unsaved)
  new                clear the editor
  cancel <class>     cancel a pending list|stats|load|run|save request
  help               show this text
  quit               leave";

#[derive(Debug, PartialEq, Eq)]
enum Command {
    Intent(Intent),
    Edit,
    Open(String),
    Help,
    Quit,
    Unknown(String),
}

fn parse_command(line: &str) -> Option<Command> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }
    let (word, rest) = match line.split_once(char::is_whitespace) {
        Some((word, rest)) => (word, rest.trim()),
        None => (line, ""),
    };
    let command = match (word, rest) {
        ("ls" | "refresh", _) => Command::Intent(Intent::Refresh),
        ("load", name) if !name.is_empty() => Command::Intent(Intent::Load(name.to_string())),
        ("run", "") => Command::Intent(Intent::Run),
        ("save", "") => Command::Intent(Intent::Save),
        ("new", "") => Command::Intent(Intent::New),
        ("cancel", class) => match parse_class(class) {
            Some(class) => Command::Intent(Intent::Cancel(class)),
            None => Command::Unknown(line.to_string()),
        },
        ("edit", "") => Command::Edit,
        ("open", path) if !path.is_empty() => Command::Open(path.to_string()),
        ("help" | "?", _) => Command::Help,
        ("quit" | "exit", _) => Command::Quit,
        _ => Command::Unknown(line.to_string()),
    };
    Some(command)
}

fn parse_class(raw: &str) -> Option<OperationClass> {
    let class = match raw {
        "list" | "list_payloads" => OperationClass::List,
        "stats" | "statistics" | "fetch_statistics" => OperationClass::Stats,
        "load" | "load_payload" => OperationClass::Load,
        "run" | "run_payload" => OperationClass::Run,
        "save" | "save_payload" => OperationClass::Save,
        _ => return None,
    };
    Some(class)
}

pub async fn run_shell(controller: Arc<Controller>, input: InputLines) -> Result<()> {
    println!("{HELP}");
    spawn_intent(&controller, Intent::Refresh);

    loop {
        let line = input.lock().await.next_line().await.context("failed to read stdin")?;
        let Some(line) = line else {
            return Ok(());
        };
        let Some(command) = parse_command(&line) else {
            continue;
        };
        match command {
            Command::Intent(Intent::Save) => {
                // inline: the filename prompt needs stdin
                dispatch(&controller, Intent::Save).await;
            }
            Command::Intent(intent) => spawn_intent(&controller, intent),
            Command::Edit => {
                let content = read_block(&input).await?;
                if !controller.edit_content(content) {
                    println!("editor is locked while a request is pending");
                }
            }
            Command::Open(path) => {
                let content = read_local(Path::new(&path)).await?;
                if !controller.edit_content(content) {
                    println!("editor is locked while a request is pending");
                }
            }
            Command::Help => println!("{HELP}"),
            Command::Quit => return Ok(()),
            Command::Unknown(line) => println!("unknown command `{line}`; try `help`"),
        }
    }
}

fn spawn_intent(controller: &Arc<Controller>, intent: Intent) {
    let controller = controller.clone();
    tokio::spawn(async move {
        let outcomes = dispatch(&controller, intent).await;
        debug!(?outcomes, "intent settled");
    });
}

async fn read_block(input: &InputLines) -> Result<String> {
    let mut lines = Vec::new();
    let mut input = input.lock().await;
    while let Some(line) = input.next_line().await.context("failed to read stdin")? {
        if line == "." {
            break;
        }
        lines.push(line);
    }
    Ok(lines.join("\n"))
}

pub async fn read_local(path: &Path) -> Result<String> {
    tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("failed to read {}", path.display()))
}
