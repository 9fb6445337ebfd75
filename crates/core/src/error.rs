//! Error types and Result module.

pub(crate) mod collector;

use std::error::Error;

use thiserror::Error;

use crate::{
    collection::CollectionErrorKind, collision::CollisionErrorKind, item::ItemErrorKind,
    pager::PagerErrorKind, path::PathErrorKind, permission::PermissionErrorKind,
};

pub use collector::FaultCollector;

/// Result type that is being returned from methods that can fail and thus have [`RestoreError`]s.
pub type RestoreResult<T> = Result<T, RestoreError>;

// [`Error`] is public, but opaque and easy to keep compatible.
#[derive(Error, Debug)]
#[error(transparent)]
/// Errors that can result from a restore.
pub struct RestoreError(#[from] RestoreErrorKind);

// Accessors for anything we do want to expose publicly.
impl RestoreError {
    /// Expose the inner error kind.
    ///
    /// This is useful for matching on the error kind.
    pub fn into_inner(self) -> RestoreErrorKind {
        self.0
    }

    /// Reference to the inner error kind.
    #[must_use]
    pub fn kind(&self) -> &RestoreErrorKind {
        &self.0
    }

    /// Checks if the error signals that the item already exists at the destination
    /// and the collision policy forbade touching it.
    #[must_use]
    pub fn is_conflict(&self) -> bool {
        matches!(
            self.0,
            RestoreErrorKind::Collision(CollisionErrorKind::ItemAlreadyExists { .. })
        )
    }

    /// Checks if the error is caused by a parent directory which was not visited before its children.
    #[must_use]
    pub fn is_missing_precondition(&self) -> bool {
        matches!(
            self.0,
            RestoreErrorKind::Permission(PermissionErrorKind::MissingParentMetadata(_))
        )
    }

    /// Checks if the operation was cancelled.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        matches!(self.0, RestoreErrorKind::Cancelled)
    }

    /// Checks if the error was returned by a remote collaborator.
    #[must_use]
    pub fn is_remote(&self) -> bool {
        self.remote_error().is_some()
    }

    /// Get the corresponding remote error, if the error is caused by a remote call.
    ///
    /// Returns `anyhow::Error`; you need to downcast this to the real error type of the collaborator
    pub fn remote_error(&self) -> Option<&anyhow::Error> {
        match &self.0 {
            RestoreErrorKind::Remote(error) => Some(error),
            RestoreErrorKind::Collision(CollisionErrorKind::DeletingReplacedItemFailed {
                source,
                ..
            }) => Some(source),
            _ => None,
        }
    }

    /// If the item was created before the error happened, return its remote id.
    ///
    /// This is the case when the replaced item could not be removed.
    #[must_use]
    pub fn created_item_id(&self) -> Option<&str> {
        match &self.0 {
            RestoreErrorKind::Collision(CollisionErrorKind::DeletingReplacedItemFailed {
                new_id,
                ..
            }) => Some(new_id),
            _ => None,
        }
    }
}

/// [`RestoreErrorKind`] describes the errors that can happen while restoring.
///
/// This is a non-exhaustive enum, so additional variants may be added in future. It is
/// recommended to match against the wildcard `_` instead of listing all possible variants,
/// to avoid problems when new variants are added.
#[non_exhaustive]
#[derive(Error, Debug, displaydoc::Display)]
pub enum RestoreErrorKind {
    /// {0}
    #[error(transparent)]
    Path(#[from] PathErrorKind),

    /// {0}
    #[error(transparent)]
    Permission(#[from] PermissionErrorKind),

    /// {0}
    #[error(transparent)]
    Collision(#[from] CollisionErrorKind),

    /// {0}
    #[error(transparent)]
    Item(#[from] ItemErrorKind),

    /// {0}
    #[error(transparent)]
    Collection(#[from] CollectionErrorKind),

    /// {0}
    #[error(transparent)]
    Pager(#[from] PagerErrorKind),

    /// {0}
    #[error(transparent)]
    Remote(anyhow::Error),

    /// operation cancelled
    Cancelled,
}

trait RestoreErrorMarker: Error {}

impl RestoreErrorMarker for PathErrorKind {}
impl RestoreErrorMarker for PermissionErrorKind {}
impl RestoreErrorMarker for CollisionErrorKind {}
impl RestoreErrorMarker for ItemErrorKind {}
impl RestoreErrorMarker for CollectionErrorKind {}
impl RestoreErrorMarker for PagerErrorKind {}

impl<E> From<E> for RestoreError
where
    E: RestoreErrorMarker,
    RestoreErrorKind: From<E>,
{
    fn from(value: E) -> Self {
        Self(RestoreErrorKind::from(value))
    }
}

impl RestoreError {
    /// Wrap an error returned by a remote collaborator.
    pub fn remote(error: anyhow::Error) -> Self {
        Self(RestoreErrorKind::Remote(error))
    }

    /// The error signaling a cancelled operation.
    #[must_use]
    pub fn cancelled() -> Self {
        Self(RestoreErrorKind::Cancelled)
    }
}
