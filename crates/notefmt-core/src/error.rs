use std::path::PathBuf;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("No formatter configuration for record type `{record_type}`")]
    MissingTypeConfig { record_type: String },

    #[error("Record type `{record_type}` has no configuration for field `{field}`")]
    MissingFieldConfig { record_type: String, field: String },

    #[error("Unknown transformer `{name}` (field `{field}` of `{record_type}`)")]
    UnknownTransformer {
        name: String,
        record_type: String,
        field: String,
    },

    #[error("Malformed HTML on line {line}: {message}")]
    MalformedHtml { line: u64, message: String },

    #[error("Malformed occlusion SVG: {message}")]
    MalformedSvg { message: String },

    #[error(transparent)]
    Xml(#[from] roxmltree::Error),

    #[error("Invalid image occlusion field: {message}")]
    InvalidOcclusionField { message: String },

    #[error("Media file `{name}`: {message}")]
    Media { name: String, message: String },

    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid JSON in {}: {source}", path.display())]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Record store error: {message}")]
    Store { message: String },

    #[error("Record `{record}`, field `{field}`: {source}")]
    Field {
        record: String,
        field: String,
        #[source]
        source: Box<Error>,
    },
}

impl Error {
    pub(crate) fn malformed_html(line: u64, message: impl Into<String>) -> Self {
        Self::MalformedHtml {
            line,
            message: message.into(),
        }
    }

    pub(crate) fn malformed_svg(message: impl Into<String>) -> Self {
        Self::MalformedSvg {
            message: message.into(),
        }
    }
}
