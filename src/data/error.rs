use std::path::PathBuf;

/// Errors raised while reading or writing tabular data.
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    /// I/O error
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// CSV error
    #[error("CSV error in {}: {source}", path.display())]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    /// JSON error
    #[error("JSON error in {}: {source}", path.display())]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// Parquet error
    #[error("Parquet error in {}: {source}", path.display())]
    Parquet {
        path: PathBuf,
        #[source]
        source: parquet::errors::ParquetError,
    },

    /// Arrow error
    #[error("Arrow error in {}: {source}", path.display())]
    Arrow {
        path: PathBuf,
        #[source]
        source: arrow::error::ArrowError,
    },

    #[error("invalid data kind '{0}', expected \"hist\", \"TDP\", \"transition_frequency\" or \"other\"")]
    UnknownKind(String),

    #[error("no column names given, a column list is required for transition frequency tables")]
    MissingColumnNames,

    #[error("no *.{extension} files found in {}", dir.display())]
    NoInputFiles {
        dir: PathBuf,
        extension: &'static str,
    },

    #[error("{}:{line}: expected {expected} columns, found {found}", path.display())]
    SchemaMismatch {
        path: PathBuf,
        line: usize,
        expected: usize,
        found: usize,
    },

    #[error("{}:{line}: '{token}' is not a valid {what}", path.display())]
    InvalidNumber {
        path: PathBuf,
        line: usize,
        token: String,
        what: &'static str,
    },

    #[error("unsupported file extension '.{0}'")]
    UnsupportedExtension(String),

    #[error("{}: {message}", path.display())]
    InvalidFormat { path: PathBuf, message: String },
}

impl LoadError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        LoadError::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn csv(path: impl Into<PathBuf>, source: csv::Error) -> Self {
        LoadError::Csv {
            path: path.into(),
            source,
        }
    }
}
