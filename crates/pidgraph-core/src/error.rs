pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// An instance references a path id that does not exist in the
    /// document's path registry. This is the only structurally fatal input.
    #[error("unknown path id referenced by an instance: {id}")]
    UnknownPathId { id: String },

    #[error("invalid graph document: {message}")]
    InvalidDocument { message: String },

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}
