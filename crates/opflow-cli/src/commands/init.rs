//! `opflow init`: Write a default configuration file.

use clap::Args;
use opflow_core::OpflowConfig;
use std::path::Path;

#[derive(Args, Debug)]
pub struct InitArgs {
    /// Overwrite an existing configuration file.
    #[arg(long)]
    pub force: bool,
}

pub fn run(args: &InitArgs, config_path: &Path, config: &OpflowConfig) -> anyhow::Result<()> {
    if config_path.exists() && !args.force {
        anyhow::bail!(
            "configuration file already exists at {}",
            config_path.display()
        );
    }

    config.save(config_path)?;
    std::fs::create_dir_all(&config.storage.data_dir)?;
    tracing::info!(path = %config_path.display(), "wrote config");

    println!("Initialized opflow at {}", config_path.display());
    println!("  Data dir: {}", config.storage.data_dir.display());
    println!();
    println!("Next steps:");
    println!("  opflow keygen                 generate a key to register with your wallet");
    println!("  opflow wallet connect ...     connect the wallet");
    Ok(())
}
