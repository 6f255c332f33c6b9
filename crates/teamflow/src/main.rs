//! Runs a workflow described in a JSON file, with an OpenAI-compatible
//! model backing the whole team.

#[macro_use]
extern crate tracing;

use std::env;
use std::process::ExitCode;
use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};
use owo_colors::{AnsiColors, OwoColorize};
use teamflow::core::{ModelMessage, Role};
use teamflow::openai::{OpenAIConfigBuilder, OpenAIProvider};
use teamflow::{SessionBuilder, WorkflowConfig};

const BAR_CHAR: &str = "▎";

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let Some(path) = env::args().nth(1) else {
        eprintln!("usage: teamflow <workflow.json>");
        return ExitCode::FAILURE;
    };
    let config = match WorkflowConfig::load(&path) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("{err}");
            return ExitCode::FAILURE;
        }
    };

    let Ok(api_key) = env::var("OPENAI_API_KEY") else {
        eprintln!("OPENAI_API_KEY environment variable is not set");
        return ExitCode::FAILURE;
    };
    let mut openai_config = OpenAIConfigBuilder::with_api_key(api_key);
    if let Ok(base_url) = env::var("OPENAI_BASE_URL") {
        openai_config = openai_config.with_base_url(base_url);
    }
    if let Ok(model) = env::var("OPENAI_MODEL") {
        openai_config = openai_config.with_model(model);
    }
    let model_provider = OpenAIProvider::new(openai_config.build());

    let mut session = SessionBuilder::with_model_provider(model_provider)
        .with_config(config)
        .build();

    let progress_style = ProgressStyle::with_template("{spinner} {wide_msg}")
        .unwrap_or_else(|_| ProgressStyle::default_spinner())
        .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏");

    for message in &session.state().messages {
        print_message(message);
    }
    let mut printed = session.state().messages.len();
    let mut branches = 0;

    while !session.is_done() {
        let progress_bar = ProgressBar::new_spinner();
        progress_bar.set_style(progress_style.clone());
        progress_bar.set_message(format!(
            "🤔 {} is thinking...",
            session.state().agent
        ));
        progress_bar.enable_steady_tick(Duration::from_millis(100));

        let result = session.step().await;

        // Finish the progress bar before printing anything else.
        progress_bar.finish_and_clear();

        let state = match result {
            Ok(state) => state,
            Err(err) => {
                error!("workflow aborted: {err}");
                eprintln!("{} {err}", "error:".bright_red().bold());
                return ExitCode::FAILURE;
            }
        };

        if state.children.len() != branches {
            branches = state.children.len();
            if branches > 0 {
                let agents: Vec<_> = state
                    .children
                    .iter()
                    .map(|child| child.agent.to_string())
                    .collect();
                println!(
                    "{}⇉ {} working in parallel",
                    BAR_CHAR.bright_magenta(),
                    agents.join(", ").bright_white()
                );
            }
        }
        for message in state.messages.iter().skip(printed) {
            print_message(message);
        }
        printed = state.messages.len();
    }

    if let Some(outcome) = session.outcome() {
        println!("\n{}\n{outcome}", "Outcome:".bright_green().bold());
    }
    ExitCode::SUCCESS
}

fn print_message(message: &ModelMessage) {
    let (color, icon) = match message.role() {
        Role::System => (AnsiColors::BrightBlack, "⚙️ "),
        Role::User => (AnsiColors::BrightYellow, "📋"),
        Role::Assistant => (AnsiColors::BrightCyan, "🤖"),
        Role::Tool => (AnsiColors::BrightBlue, "🔧"),
    };
    println!(
        "{}{icon} {}",
        BAR_CHAR.color(color),
        message.content().to_text().bright_white()
    );
}
