use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use exam_seating::{
    config::{Config, LogFormat},
    models::plan::GenerationRequest,
    services::{ExternalStudent, ExternalStudentService, SeatingService},
    AppState,
};

#[derive(Parser)]
#[command(name = "exam-seating", version, about = "Exam seat allocation and session cache")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Create an empty planning session
    NewPlan {
        #[arg(long)]
        plan_id: Option<String>,
    },
    /// Generate a room from a JSON request file and save it
    Generate {
        plan_id: String,
        room: String,
        request: PathBuf,
    },
    /// Print a saved room
    Show { plan_id: String, room: String },
    /// Copy a room from one plan into another
    Import {
        source_plan_id: String,
        dest_plan_id: String,
        room: String,
    },
    /// Fix the plan, optionally keeping only some rooms
    Finalize {
        plan_id: String,
        #[arg(long = "keep")]
        keep: Vec<String>,
    },
    /// List unallocated seats of a room
    EmptySeats { plan_id: String, room: String },
    /// Seat a walk-in student on an empty seat
    AddExternal {
        plan_id: String,
        room: String,
        row: usize,
        col: usize,
        roll_number: String,
        #[arg(long, default_value = "External")]
        batch_label: String,
        #[arg(long)]
        name: Option<String>,
    },
    /// Free a seat taken by a walk-in student
    RemoveExternal {
        plan_id: String,
        room: String,
        row: usize,
        col: usize,
    },
    /// Delete a plan snapshot
    Delete { plan_id: String },
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let config = Config::from_env().context("Failed to load configuration")?;

    let filter = EnvFilter::new(&config.app.rust_log);
    match config.app.log_format {
        LogFormat::Json => tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init(),
        LogFormat::Text => tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init(),
    }

    let cli = Cli::parse();
    info!(environment = %config.app.environment, "Starting exam seating");

    let state = AppState::new(config)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to open storage: {e}"))?;
    let seating = SeatingService::new(state.clone());
    let externals = ExternalStudentService::new(state.clone());

    match cli.command {
        Command::NewPlan { plan_id } => {
            let plan_id = state.cache.create_plan(plan_id.as_deref()).await?;
            println!("{plan_id}");
        }
        Command::Generate { plan_id, room, request } => {
            let raw = tokio::fs::read(&request)
                .await
                .with_context(|| format!("Failed to read {}", request.display()))?;
            let request: GenerationRequest =
                serde_json::from_slice(&raw).context("Malformed generation request")?;
            let outcome = seating.generate_room(&plan_id, &room, request).await?;
            info!(source = ?outcome.source, written = outcome.written, "Generation finished");
            print_json(&outcome.response())?;
        }
        Command::Show { plan_id, room } => {
            let result = state
                .cache
                .load_room(&plan_id, &room)
                .await?
                .with_context(|| format!("Room {room:?} not found in plan {plan_id}"))?;
            print_json(&result)?;
        }
        Command::Import { source_plan_id, dest_plan_id, room } => {
            let result = seating.import_room(&source_plan_id, &dest_plan_id, &room).await?;
            print_json(&result.validation())?;
        }
        Command::Finalize { plan_id, keep } => {
            let keep = (!keep.is_empty()).then_some(keep);
            let snapshot = state.cache.finalize(&plan_id, keep.as_deref()).await?;
            print_json(&snapshot.metadata)?;
        }
        Command::EmptySeats { plan_id, room } => {
            let seats = state.cache.empty_seats(&plan_id, &room).await?;
            let positions: Vec<String> = seats.iter().map(|s| s.position()).collect();
            print_json(&positions)?;
        }
        Command::AddExternal { plan_id, room, row, col, roll_number, batch_label, name } => {
            let student = ExternalStudent {
                student_name: name,
                ..ExternalStudent::new(roll_number, batch_label)
            };
            let seat = externals.add_external(&plan_id, &room, row, col, student).await?;
            print_json(&seat)?;
        }
        Command::RemoveExternal { plan_id, room, row, col } => {
            let seat = externals.remove_external(&plan_id, &room, row, col).await?;
            print_json(&seat)?;
        }
        Command::Delete { plan_id } => {
            let removed = state.cache.delete_snapshot(&plan_id).await?;
            println!("{}", if removed { "deleted" } else { "not found" });
        }
    }
    Ok(())
}
