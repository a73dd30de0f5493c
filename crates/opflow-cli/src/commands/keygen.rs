//! `opflow keygen`: Generate a signing key pair.

use clap::Args;
use opflow_crypto::generate_key_material;

#[derive(Args, Debug)]
pub struct KeygenArgs {
    /// Print the key material as JSON.
    #[arg(long)]
    pub json: bool,
}

pub fn run(args: &KeygenArgs) -> anyhow::Result<()> {
    let material = generate_key_material()?;

    if args.json {
        let value = serde_json::json!({
            "keyId": material.key_id,
            "privateKey": material.private_key,
            "publicKey": material.public_key,
        });
        println!("{}", serde_json::to_string_pretty(&value)?);
        return Ok(());
    }

    println!("Key ID:       {}", material.key_id);
    println!("Private key:  {}", material.private_key);
    println!("Public key:   {}", material.public_key);
    println!();
    println!("Register the public key with your wallet under the key ID above,");
    println!("then run 'opflow wallet connect'.");
    Ok(())
}
