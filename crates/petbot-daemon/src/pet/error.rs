use thiserror::Error;

/// Failures surfaced to chat users. `Display` is the rejection text.
#[derive(Debug, Error)]
pub enum PetError {
    #[error("Pet by that name already exists")]
    DuplicateName(String),

    #[error("No pet by that name")]
    NotFound(String),

    #[error("{0} is not one of your pets")]
    NotOwner(String),

    #[error("{0}")]
    InvalidArgument(String),

    #[error("Only bot admins can use {0}")]
    PermissionDenied(String),

    #[error("No pet type called {0}")]
    UnknownSpecies(String),

    #[error("{species} has no {category} actions")]
    UnknownCategory { species: String, category: String },

    #[error("storage failure: {0}")]
    Storage(#[from] anyhow::Error),
}

impl PetError {
    pub fn usage(text: impl Into<String>) -> Self {
        Self::InvalidArgument(text.into())
    }
}
