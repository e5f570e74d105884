//! `mindscope chat` — Interactive or single-message chat.

use std::io::Write;

use mindscope_engine::{TurnInput, TurnPipeline, TurnResult};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::debug;

pub async fn run(
    assessment: bool,
    session: Option<String>,
    message: Option<String>,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = super::load_config()?;
    let pipeline = super::build_pipeline(&config)?;
    let session_id = session.unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
    let mut assessment = assessment;

    if let Some(msg) = message {
        // Single message mode
        let result = turn(&pipeline, &session_id, &msg, assessment).await?;
        println!("{}", result.llm_response);
        return Ok(());
    }

    println!();
    println!("  ╔══════════════════════════════════════════════╗");
    println!("  ║         MindScope — Interactive Chat         ║");
    println!("  ╚══════════════════════════════════════════════╝");
    println!();
    println!("  Provider:  {}", config.default_provider);
    println!("  Model:     {}", config.default_model);
    println!("  Session:   {session_id}");
    println!();
    println!("  Type your message and press Enter.");
    println!("  Type '/assess' or '/chat' to switch modes, 'exit' to quit.");
    println!();

    if assessment {
        let result = turn(&pipeline, &session_id, "", true).await?;
        print_reply(&result, true);
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    prompt()?;

    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        match line {
            "exit" | "quit" => break,
            "/assess" | "/chat" => {
                assessment = line == "/assess";
                println!(
                    "  [{} mode]",
                    if assessment { "Assessment" } else { "Chat" }
                );
                if assessment {
                    match turn(&pipeline, &session_id, "", true).await {
                        Ok(result) => print_reply(&result, true),
                        Err(e) => eprintln!("  [Error] {e}"),
                    }
                }
                prompt()?;
                continue;
            }
            "" => {
                prompt()?;
                continue;
            }
            _ => {}
        }

        eprint!("  ...");
        let outcome = turn(&pipeline, &session_id, line, assessment).await;
        eprint!("\r     \r");
        match outcome {
            Ok(result) => print_reply(&result, assessment),
            Err(e) => {
                eprintln!("  [Error] {e}");
                println!();
            }
        }
        prompt()?;
    }

    pipeline.sessions().remove(&session_id).await;
    debug!(session_id = %session_id, "Chat ended");

    println!();
    println!("  Take care. 👋");
    println!();

    Ok(())
}

async fn turn(
    pipeline: &TurnPipeline,
    session_id: &str,
    text: &str,
    assessment: bool,
) -> Result<TurnResult, mindscope_engine::PipelineError> {
    pipeline
        .process_turn(TurnInput {
            text: Some(text.to_string()),
            session_id: Some(session_id.to_string()),
            assessment_mode: assessment,
            ..TurnInput::default()
        })
        .await
}

fn print_reply(result: &TurnResult, assessment: bool) {
    println!();
    for line in result.llm_response.lines() {
        println!("  MindScope > {line}");
    }
    if assessment {
        let progress = &result.assessment_progress;
        println!(
            "  [{}/{} answered, phase: {}]",
            progress.questions_asked, progress.total_questions, progress.current_phase
        );
    }
    println!();
}

fn prompt() -> std::io::Result<()> {
    print!("  You > ");
    std::io::stdout().flush()
}
