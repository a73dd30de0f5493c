//! `opflow flow`: Store, list and run flow scripts.

use clap::{Args, Subcommand};
use opflow_core::{new_flow, StoreError};
use opflow_flow::{parse, FlowEngine, FlowError};
use std::path::PathBuf;

use crate::app::App;

#[derive(Args, Debug)]
pub struct FlowArgs {
    #[command(subcommand)]
    pub command: FlowCommand,
}

#[derive(Subcommand, Debug)]
pub enum FlowCommand {
    /// Validate a script and store it as a named flow.
    Add(AddArgs),
    /// List stored flows.
    List,
    /// Run a stored flow, printing its progress.
    Run(RunArgs),
}

#[derive(Args, Debug)]
pub struct AddArgs {
    /// Human readable name.
    #[arg(short, long)]
    pub name: String,

    /// File holding the script, one command per line.
    #[arg(short, long)]
    pub file: PathBuf,

    /// Explicit flow id. Generated when omitted.
    #[arg(long)]
    pub id: Option<String>,
}

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Flow id.
    pub id: String,

    /// Run against an in-process sandbox instead of the real wallets.
    #[arg(long)]
    pub sandbox: bool,
}

pub async fn run(args: &FlowArgs, app: &App) -> anyhow::Result<()> {
    match &args.command {
        FlowCommand::Add(args) => add(args, app),
        FlowCommand::List => list(app),
        FlowCommand::Run(args) => run_flow(args, app).await,
    }
}

fn add(args: &AddArgs, app: &App) -> anyhow::Result<()> {
    let script = std::fs::read_to_string(&args.file)?;
    let commands = parse(&script)?;

    let draft = new_flow(args.id.as_deref(), &args.name, &script);
    let flow = app.store().insert_flow(&draft.id, &draft.name, &draft.steps)?;

    println!("Flow stored!");
    println!("  ID:        {}", flow.id);
    println!("  Name:      {}", flow.name);
    println!("  Commands:  {}", commands.len());
    Ok(())
}

fn list(app: &App) -> anyhow::Result<()> {
    let flows = app.store().list_flows()?;
    if flows.is_empty() {
        println!("No flows stored. Add one with: opflow flow add");
        return Ok(());
    }

    println!("{} flow(s):", flows.len());
    for flow in flows {
        let commands = flow.steps.lines().filter(|l| !l.trim().is_empty()).count();
        println!("  {}  {}  ({} line(s))", flow.id, flow.name, commands);
    }
    Ok(())
}

async fn run_flow(args: &RunArgs, app: &App) -> anyhow::Result<()> {
    let flow = app
        .store()
        .get_flow(&args.id)?
        .ok_or_else(|| StoreError::FlowNotFound(args.id.clone()))?;
    tracing::info!(flow = %flow.id, name = %flow.name, sandbox = args.sandbox, "running flow");

    let engine = FlowEngine::new(app.payments_for(args.sandbox)?);
    let mut run = engine.start(&flow.steps);

    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            event = run.next_event() => match event {
                Some(event) => println!("{}", event),
                None => break,
            },
            _ = &mut shutdown => {
                tracing::info!("received shutdown signal");
                run.cancel().await?;
                println!("Flow cancelled.");
                return Ok(());
            }
        }
    }

    match run.finish().await {
        Ok(()) => Ok(()),
        Err(FlowError::Persistence(e)) => {
            anyhow::bail!("flow stopped, wallet credentials may be stale: {}", e)
        }
        Err(e) => Err(e.into()),
    }
}
