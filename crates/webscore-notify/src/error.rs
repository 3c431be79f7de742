/// Errors raised while building channels or messages.
///
/// # Examples
///
/// ```rust
/// use webscore_notify::error::NotifyError;
///
/// let err = NotifyError::InvalidConfig("missing smtp_host".to_string());
/// assert!(err.to_string().contains("smtp_host"));
/// ```
#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    /// Channel configuration is missing a required field or contains an invalid value.
    #[error("Notify: invalid channel configuration: {0}")]
    InvalidConfig(String),

    /// A sender or recipient is not a valid mailbox.
    #[error("Notify: invalid address '{address}': {reason}")]
    InvalidAddress { address: String, reason: String },

    /// SMTP transport error when sending email.
    #[error("Notify: SMTP error: {0}")]
    Smtp(String),

    /// The message could not be assembled.
    #[error("Notify: message error: {0}")]
    Message(String),
}

/// Convenience `Result` alias for notification operations.
pub type Result<T> = std::result::Result<T, NotifyError>;
