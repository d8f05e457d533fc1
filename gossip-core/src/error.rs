//! Local validation failures, raised before any request is sent.

use thiserror::Error;

/// Input rejected locally. No round trip is made for these.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// Neither text nor an attachment.
    #[error("Message must have text or an attachment")]
    EmptyMessage,

    /// Group name empty after trimming.
    #[error("Group name is required")]
    MissingGroupName,

    /// A required form field was left empty.
    #[error("{0} is required")]
    MissingField(&'static str),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_are_user_facing() {
        assert_eq!(
            ValidationError::MissingField("Email").to_string(),
            "Email is required"
        );
        assert_eq!(
            ValidationError::MissingGroupName.to_string(),
            "Group name is required"
        );
    }
}
