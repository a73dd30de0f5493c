use async_trait::async_trait;

use crate::error::ClientError;

/// Presents an authorization URL to the user.
#[async_trait]
pub trait InteractionHandler: Send + Sync {
    async fn open(&self, url: &str) -> Result<(), ClientError>;
}

/// Opens URLs with the platform's default browser.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemBrowser;

impl SystemBrowser {
    fn launcher() -> (&'static str, &'static [&'static str]) {
        if cfg!(target_os = "macos") {
            ("open", &[])
        } else if cfg!(target_os = "windows") {
            ("cmd", &["/C", "start", ""])
        } else {
            ("xdg-open", &[])
        }
    }
}

#[async_trait]
impl InteractionHandler for SystemBrowser {
    async fn open(&self, url: &str) -> Result<(), ClientError> {
        let (program, args) = Self::launcher();
        tracing::info!(%url, program, "opening authorization URL");
        let status = tokio::process::Command::new(program)
            .args(args)
            .arg(url)
            .status()
            .await
            .map_err(|e| ClientError::Interaction(format!("{}: {}", program, e)))?;
        if status.success() {
            Ok(())
        } else {
            Err(ClientError::Interaction(format!("{} exited with {}", program, status)))
        }
    }
}
