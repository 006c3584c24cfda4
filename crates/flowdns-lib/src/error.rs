/// Failures surfaced by [`parse`](crate::parse) and the extraction helpers
#[derive(Debug, thiserror::Error)]
pub enum MessageError {
    /// The buffer is not a well-formed DNS message
    #[error("failed to parse DNS message: {0:#}")]
    ParseFailed(anyhow::Error),
    #[error("DNS message contains no question")]
    NoQuestion,
    /// Header announces questions but none could be collected
    #[error("failed to parse DNS question section")]
    QuestionParseFailed,
}
