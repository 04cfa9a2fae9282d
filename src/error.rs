use thiserror::Error;

/// Errors surfaced when reaching through a [`SharedHandle`](crate::SharedHandle).
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum HandleError {
    /// The handle is empty or has been moved out of.
    #[error("attempting to access a null pointer")]
    NullAccess,
    /// Another handle of the same group holds a conflicting borrow of the value.
    #[error("the shared value is already borrowed through another handle")]
    Borrowed,
}

pub type Result<T, E = HandleError> = std::result::Result<T, E>;
