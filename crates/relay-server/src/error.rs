//! Server error types.

/// Errors that stop the HTTP listener.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// Listener could not bind.
    #[error("failed to bind {addr}: {source}")]
    Bind {
        /// Address that was requested.
        addr: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Accept loop failed.
    #[error("server error: {0}")]
    Serve(#[from] std::io::Error),
}
