//! `opflow send`: Send a single payment from a connected wallet.

use async_trait::async_trait;
use clap::Args;
use opflow_client::{ClientError, TransferObserver, TransferStep};

use crate::app::App;

#[derive(Args, Debug)]
pub struct SendArgs {
    /// Sending wallet, as connected with `opflow wallet connect`.
    #[arg(short, long)]
    pub from: String,

    /// Receiving wallet address URL or payment pointer.
    #[arg(short, long)]
    pub to: String,

    /// Amount in the sender's asset, e.g. 10.50.
    #[arg(short, long)]
    pub amount: f64,

    /// Run against an in-process sandbox instead of the real wallets.
    #[arg(long)]
    pub sandbox: bool,
}

/// Prints each transfer step as it starts.
struct PrintSteps;

#[async_trait]
impl TransferObserver for PrintSteps {
    async fn on_step(&self, step: TransferStep) -> Result<(), ClientError> {
        println!("  {}", step);
        Ok(())
    }
}

pub async fn run(args: &SendArgs, app: &App) -> anyhow::Result<()> {
    println!("Sending payment...");
    println!("  From:     {}", args.from);
    println!("  To:       {}", args.to);
    println!("  Amount:   {}", args.amount);
    println!();

    let payment = app
        .payments_for(args.sandbox)?
        .send(&args.from, &args.to, args.amount, &PrintSteps)
        .await?;

    println!();
    println!("Payment created!");
    println!("  ID:       {}", payment.id);
    if let Some(amount) = &payment.debit_amount {
        println!("  Debit:    {}", amount);
    }
    Ok(())
}
