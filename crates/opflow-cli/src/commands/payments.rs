//! `opflow payments`: Show the latest outgoing payments of a wallet.

use clap::Args;

use crate::app::App;

#[derive(Args, Debug)]
pub struct PaymentsArgs {
    /// Wallet address URL or payment pointer.
    pub wallet: String,

    /// Print the payments as JSON.
    #[arg(long)]
    pub json: bool,

    /// Run against an in-process sandbox instead of the real wallets.
    #[arg(long)]
    pub sandbox: bool,
}

pub async fn run(args: &PaymentsArgs, app: &App) -> anyhow::Result<()> {
    let payments = app
        .payments_for(args.sandbox)?
        .list_outgoing_payments(&args.wallet)
        .await?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&payments)?);
        return Ok(());
    }
    if payments.is_empty() {
        println!("No outgoing payments.");
        return Ok(());
    }

    println!("{} outgoing payment(s):", payments.len());
    for payment in payments {
        let amount = payment
            .debit_amount
            .as_ref()
            .map(|a| a.to_string())
            .unwrap_or_else(|| "-".into());
        let status = if payment.failed { "failed" } else { "ok" };
        println!("  {}", payment.id);
        println!("    Amount:   {}", amount);
        println!("    To:       {}", payment.receiver);
        println!("    Status:   {}", status);
        if let Some(created) = &payment.created_at {
            println!("    Created:  {}", created);
        }
    }
    Ok(())
}
