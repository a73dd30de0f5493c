use opflow_core::StoreError;

/// Reasons a flow run ends without reaching `Done`.
#[derive(Debug, thiserror::Error)]
pub enum FlowError {
    /// A rotated access token could not be saved; the stored credential no
    /// longer matches the server.
    #[error("could not persist wallet credentials: {0}")]
    Persistence(#[from] StoreError),

    /// The consumer stopped listening for events.
    #[error("flow run abandoned by its consumer")]
    Abandoned,

    #[error("flow worker aborted: {0}")]
    Aborted(String),
}
