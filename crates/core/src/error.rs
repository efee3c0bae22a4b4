use crate::types::DbId;

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Entity not found: {entity} with id {id}")]
    NotFound { entity: &'static str, id: DbId },

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// A plan quota was exceeded. Carries enough structure for the client
    /// to render a specific message (what ran out, on which plan).
    #[error("{kind} limit of {limit} reached on the {plan} plan")]
    ResourceLimit {
        kind: &'static str,
        limit: i64,
        plan: String,
    },

    #[error("Internal error: {0}")]
    Internal(String),
}
