//! Posting robot error types.

use thiserror::Error;

use crate::browser::BrowserError;

/// Result type for robot operations.
pub type RobotResult<T> = Result<T, RobotError>;

/// Errors that can occur while starting or running the robot.
#[derive(Debug, Error)]
pub enum RobotError {
    /// A run is already active.
    #[error("a run is already in progress")]
    AlreadyRunning,

    /// None of the profile selectors matched after opening the direct link.
    #[error("profile not detected, check the direct link")]
    ProfileNotDetected,

    /// No create-post link was found on the home page.
    #[error("create-post button not found")]
    CreateButtonNotFound,

    /// The post form is missing its text field or submit button.
    #[error("post form not found (textarea: {textarea}, submit: {submit})")]
    FormNotFound { textarea: bool, submit: bool },

    /// Neither the submit click nor the submit event went through.
    #[error("post could not be submitted: {0}")]
    SubmitFailed(String),

    /// The configured direct link is not a usable URL.
    #[error("invalid direct link '{url}': {message}")]
    InvalidUrl { url: String, message: String },

    /// Browser failure.
    #[error(transparent)]
    Browser(#[from] BrowserError),
}
