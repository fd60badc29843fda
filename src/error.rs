#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("ZIP error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("XML parse error: {0}")]
    Xml(#[from] roxmltree::Error),

    #[error("XML write error: {0}")]
    XmlWrite(#[from] quick_xml::Error),

    #[error("invalid DOCX: {0}")]
    InvalidDocx(String),

    /// Fatal template problem: nothing is generated.
    #[error("invalid template: {0}")]
    InvalidTemplate(String),

    #[error("template is {size} bytes, limit is {limit}")]
    TemplateTooLarge { size: u64, limit: u64 },

    #[error("invalid finding {id}: {reason}")]
    InvalidFinding { id: String, reason: String },

    #[error("invalid findings file: {0}")]
    Json(#[from] serde_json::Error),
}
