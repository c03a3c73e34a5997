//! A terminal front end for `react-agent`.

#[macro_use]
extern crate tracing;

use std::fs;
use std::io::Write as _;
use std::path::{Path, PathBuf};
use std::pin::pin;
use std::time::Duration;

use anyhow::Context as _;
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use owo_colors::OwoColorize;
use react_agent::core::{RunError, StepEvent};
use react_agent::{Config, Session, SessionBuilder};
use react_agent_openai_model::OpenAIProvider;
use react_agent_test_model::{Script, TestModelProvider};
use tokio::io::{self, AsyncBufReadExt, BufReader, Lines, Stdin};
use tokio::select;
use tokio::sync::mpsc;
use tokio::time::sleep;

const BAR_CHAR: &str = "▎";
const EXIT_WORDS: [&str; 3] = ["exit", "quit", "sair"];

/// Solves tasks step by step with a language model and tools.
#[derive(Debug, Parser)]
#[command(version, about)]
struct Cli {
    /// Path of a TOML configuration file.
    #[arg(long, env = "REACT_AGENT_CONFIG")]
    config: Option<PathBuf>,

    /// Maximum number of model calls per task.
    #[arg(long)]
    max_iterations: Option<usize>,

    /// Replies with a scripted model loaded from a JSON file instead of
    /// calling a real one.
    #[arg(long)]
    script: Option<PathBuf>,

    /// Solves this task and exits. Starts an interactive prompt if omitted.
    prompt: Option<String>,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let mut config = match &cli.config {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };
    config.apply_env();
    if let Some(max_iterations) = cli.max_iterations {
        config.agent.max_iterations = max_iterations;
    }

    let builder = match &cli.script {
        Some(path) => SessionBuilder::with_model_provider(load_script(path)?),
        None => {
            let openai_config = config.openai_config();
            info!("using model {}", openai_config.model());
            SessionBuilder::with_model_provider(OpenAIProvider::new(openai_config))
        }
    };
    let session = builder
        .with_agent_config(&config.agent)
        .with_mcp_servers(config.mcp_server_configs())
        .build()
        .await;
    info!("available tools: {}", session.tool_names().join(", "));

    let result = match &cli.prompt {
        Some(prompt) => run_once(&session, prompt).await,
        None => {
            run_interactive(&session).await;
            Ok(())
        }
    };
    session.close().await;
    result
}

fn load_script(path: &Path) -> anyhow::Result<TestModelProvider> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let script: Script = serde_json::from_str(&text)
        .with_context(|| format!("invalid script {}", path.display()))?;
    Ok(TestModelProvider::from_script(script))
}

async fn run_once(session: &Session, prompt: &str) -> anyhow::Result<()> {
    let answer = session.ask(prompt, None).await?;
    println!("{answer}");
    Ok(())
}

async fn run_interactive(session: &Session) {
    let progress_style = ProgressStyle::with_template("{spinner} {wide_msg}")
        .unwrap_or_else(|_| ProgressStyle::default_spinner())
        .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏");
    let mut lines = BufReader::new(io::stdin()).lines();

    loop {
        print!("> ");
        std::io::stdout().flush().ok();

        let Some(line) = read_line(&mut lines).await else {
            break;
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if EXIT_WORDS.iter().any(|word| line.eq_ignore_ascii_case(word)) {
            break;
        }

        ask_with_progress(session, line, &progress_style).await;
        println!();
    }
}

async fn ask_with_progress(
    session: &Session,
    prompt: &str,
    progress_style: &ProgressStyle,
) {
    let (event_tx, mut event_rx) = mpsc::unbounded_channel::<StepEvent>();
    let mut run = pin!(session.ask(prompt, Some(&event_tx)));
    let mut progress_bar: Option<ProgressBar> = None;
    let mut printer = EventPrinter::default();

    let result = loop {
        // Create a new progress bar if it has been finished.
        progress_bar
            .get_or_insert_with(|| {
                let progress_bar = ProgressBar::new_spinner();
                progress_bar.set_style(progress_style.clone());
                progress_bar.set_message("🤔 Thinking...");
                progress_bar
            })
            .inc(1);

        select! {
            result = &mut run => break result,
            Some(event) = event_rx.recv() => {
                // Finish the progress bar before printing anything else.
                if let Some(progress_bar) = progress_bar.take() {
                    progress_bar.finish_and_clear();
                }
                printer.print(&event);
            }
            _ = sleep(Duration::from_millis(100)) => {}
        }
    };

    if let Some(progress_bar) = progress_bar.take() {
        progress_bar.finish_and_clear();
    }
    while let Ok(event) = event_rx.try_recv() {
        printer.print(&event);
    }
    if let Err(err) = result {
        match printer.failure_line(&err) {
            Some(line) => println!("{line}"),
            None => debug!("run failed: {err}"),
        }
    }
}

/// Prints step events, remembering whether a failure was already shown.
#[derive(Default)]
struct EventPrinter {
    error_shown: bool,
}

impl EventPrinter {
    fn print(&mut self, event: &StepEvent) {
        if matches!(event, StepEvent::Error { .. }) {
            self.error_shown = true;
        }
        println!("{}", format_event(event));
    }

    /// Returns the line for a failed run, `None` if an error event already
    /// reported it.
    fn failure_line(&self, err: &RunError) -> Option<String> {
        (!self.error_shown)
            .then(|| format!("{}❌ {}", BAR_CHAR.bright_red(), err.bright_red()))
    }
}

fn format_event(event: &StepEvent) -> String {
    match event {
        StepEvent::Thought {
            content,
            chosen_action,
            ..
        } => {
            let bar = BAR_CHAR.bright_black();
            format!(
                "{bar}💭 {}\n{bar}   → {}",
                content.bright_black(),
                chosen_action.bright_black().italic()
            )
        }
        StepEvent::ToolStart { tool, input } => {
            let input = serde_json::to_string(input).unwrap_or_default();
            format!(
                "{}🔧 {} {}",
                BAR_CHAR.bright_yellow(),
                tool.bright_white().bold(),
                input.bright_black()
            )
        }
        StepEvent::Observation { content } => {
            format!("{}📋 {}", BAR_CHAR.bright_green(), content)
        }
        StepEvent::Error { content } => {
            format!("{}⚠️  {}", BAR_CHAR.bright_red(), content.bright_red())
        }
        StepEvent::Final { content } => {
            format!("{}🤖 {}", BAR_CHAR.bright_cyan(), content.bright_white())
        }
    }
}

async fn read_line(lines: &mut Lines<BufReader<Stdin>>) -> Option<String> {
    match lines.next_line().await {
        Ok(line) => line,
        Err(err) => {
            error!("error reading input: {}", err);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_model_failure_is_reported_once() {
        // Nothing scripted, so the first model call fails.
        let session = SessionBuilder::with_model_provider(TestModelProvider::default())
            .build()
            .await;
        let (event_tx, mut event_rx) = mpsc::unbounded_channel::<StepEvent>();
        let err = session.ask("hello", Some(&event_tx)).await.unwrap_err();

        let mut printer = EventPrinter::default();
        assert!(printer.failure_line(&err).is_some());
        let mut errors = 0;
        while let Ok(event) = event_rx.try_recv() {
            if matches!(event, StepEvent::Error { .. }) {
                errors += 1;
            }
            printer.print(&event);
        }
        assert_eq!(errors, 1);
        assert_eq!(printer.failure_line(&err), None);
    }

    #[test]
    fn test_format_event() {
        let line = format_event(&StepEvent::Observation {
            content: "14".to_owned(),
        });
        assert!(line.ends_with("📋 14"));
    }
}
