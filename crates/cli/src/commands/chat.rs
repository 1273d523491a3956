//! `genbi chat` and `genbi ask`: interactive and single-question modes.

use super::runtime::{self, Runtime};
use genbi_agent::{InteractiveRenderer, LogHandler, replay};
use genbi_config::AppConfig;
use std::io::Write;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::error;

fn renderer(rt: &Runtime, session_id: &str) -> InteractiveRenderer<std::io::Stdout> {
    let renderer = InteractiveRenderer::new(session_id, rt.artifacts.clone(), std::io::stdout())
        .recording(rt.sessions.clone());
    match &rt.config.charts.output_dir {
        Some(dir) => renderer.with_chart_dir(dir),
        None => renderer,
    }
}

async fn turn(rt: &Runtime, query: &str, session_id: &str) {
    let handler = renderer(rt, session_id);
    handler.record_query(query).await;
    if let Err(e) = rt.agent.stream(query, session_id, &handler).await {
        error!(session_id, error = %e, "Turn failed");
        eprintln!("  [Error] {e}");
    }
}

pub async fn ask(query: String, log_only: bool) -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;
    let rt = runtime::build(config).await?;
    let session_id = uuid::Uuid::new_v4().to_string();

    if log_only {
        let answer = rt
            .agent
            .stream(&query, &session_id, &LogHandler::new(&session_id))
            .await?;
        println!("{answer}");
        return Ok(());
    }

    let handler = renderer(&rt, &session_id);
    handler.record_query(&query).await;
    rt.agent.stream(&query, &session_id, &handler).await?;
    Ok(())
}

pub async fn run(session: Option<String>) -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;
    let rt = runtime::build(config).await?;
    let mut session_id = session.unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

    println!();
    println!("  genbi — conversational business intelligence");
    println!();
    println!("  Model:     {}", rt.config.default_model);
    println!("  Dialect:   {}", rt.config.database.dialect_name());
    println!("  Session:   {session_id}");
    println!();
    println!("  Commands:  /history  /new  /stats  q");
    println!();

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("  You > ");
        std::io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let input = line.trim();
        if input.is_empty() {
            continue;
        }

        rt.agent.evict_idle(chrono::Utc::now()).await;

        match input {
            "q" | "exit" => break,
            "/history" => {
                let history = rt.sessions.history(&session_id).await;
                let viewer =
                    InteractiveRenderer::new(&session_id, rt.artifacts.clone(), std::io::stdout());
                let summary = replay(&history, &viewer).await;
                if summary.skipped > 0 {
                    eprintln!("  [{} message(s) could not be shown]", summary.skipped);
                }
            }
            "/new" => {
                rt.agent.close_session(&session_id).await;
                session_id = uuid::Uuid::new_v4().to_string();
                println!("  Session:   {session_id}");
            }
            "/stats" => {
                let stats = rt.agent.dispatch_stats();
                println!(
                    "  dispatched={} unknown_dropped={} classification_failures={} handler_failures={}",
                    stats.dispatched,
                    stats.unknown_dropped,
                    stats.classification_failures,
                    stats.handler_failures
                );
            }
            query => {
                println!();
                turn(&rt, query, &session_id).await;
                println!();
            }
        }
    }

    println!();
    println!("  Goodbye!");
    println!();
    Ok(())
}
