use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum BomError {
    #[error("Unsupported BOM format: header `{header}` does not match the required shape `{required}`")]
    UnsupportedBomFormat { header: String, required: String },

    #[error("{} is not in the assembly format yet, rewrite it before assigning part numbers", path.display())]
    NotNormalized { path: PathBuf },

    #[error("The assembly session has already finished")]
    SessionFinished,

    #[error("Failed to parse CSV: {0}")]
    Csv(#[from] csv::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to save {}: {reason}", path.display())]
    Persist { path: PathBuf, reason: String },
}

pub type Result<T, E = BomError> = std::result::Result<T, E>;
