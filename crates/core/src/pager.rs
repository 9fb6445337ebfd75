//! Paged enumeration of remote containers and items.
//!
//! Item enumeration uses delta queries: the remote returns the items added or removed since a
//! previous enumeration, identified by a delta link. Expired delta links are reported by the
//! pager with an [`InvalidDeltaToken`] error, upon which the enumeration starts over.

use log::{debug, warn};

use crate::{
    cancel::CancelToken,
    error::{FaultCollector, RestoreError, RestoreResult},
    remote::Container,
};

/// [`PagerErrorKind`] describes the errors that can happen while enumerating remote data
#[derive(thiserror::Error, Debug, displaydoc::Display)]
#[non_exhaustive]
pub enum PagerErrorKind {
    /// container `{0}` has no id or no name
    IncompleteContainer(String),
    /// handling container `{id}` failed: `{source}`
    HandlingContainerFailed {
        /// id of the container
        id: String,
        /// the underlying error
        source: anyhow::Error,
    },
}

// returned by a `DeltaPager` when the delta link it was started with is no longer valid
#[derive(thiserror::Error, Debug, displaydoc::Display, Clone, Copy, PartialEq, Eq)]
/// the delta token is invalid or expired
pub struct InvalidDeltaToken;

/// Checks if `err` or one of its causes is an [`InvalidDeltaToken`].
#[must_use]
pub fn is_invalid_delta(err: &anyhow::Error) -> bool {
    err.chain().any(|cause| cause.is::<InvalidDeltaToken>())
}

/// One page of results
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page<T> {
    /// The values of this page
    pub values: Vec<T>,
    /// Link to the next page; `None` on the last page
    pub next_link: Option<String>,
    /// Link for the next delta enumeration; only set on the last page of delta queries
    pub delta_link: Option<String>,
}

/// A paged query.
pub trait Pager<T> {
    /// Fetch the current page.
    ///
    /// # Errors
    ///
    /// If the remote call failed.
    fn get_page(&mut self) -> anyhow::Result<Page<T>>;

    /// Continue with the page at `link`.
    fn set_next(&mut self, link: &str);
}

/// A paged delta query.
pub trait DeltaPager<T>: Pager<T> {
    /// Restart the enumeration without a delta link.
    fn reset(&mut self);
}

/// An item as returned by delta queries.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ItemChange {
    /// The item id
    pub id: String,
    /// Whether the item was removed
    pub removed: bool,
}

/// The delta link of an enumeration.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeltaUpdate {
    /// Link to use for the next enumeration
    pub url: String,
    /// Whether previously known items have to be discarded, as this was a full enumeration
    pub reset: bool,
}

/// The result of a delta enumeration.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AddedAndRemoved {
    /// Ids of added or changed items
    pub added: Vec<String>,
    /// Ids of removed items
    pub removed: Vec<String>,
    /// The delta link for the next enumeration
    pub delta: DeltaUpdate,
}

/// Enumerate the items added and removed since the delta link the pager was created with.
///
/// The pages are followed until the last one, which carries the new delta link. If the pager
/// reports an invalid delta token, it is reset once and the ids are enumerated from scratch;
/// this is flagged by [`DeltaUpdate::reset`].
///
/// # Errors
///
/// * [`RestoreErrorKind::Cancelled`] - If cancelled before fetching a page
/// * [`RestoreErrorKind::Remote`] - If fetching a page failed
///
/// [`RestoreErrorKind::Cancelled`]: crate::error::RestoreErrorKind::Cancelled
/// [`RestoreErrorKind::Remote`]: crate::error::RestoreErrorKind::Remote
pub fn get_added_and_removed_item_ids(
    pager: &mut dyn DeltaPager<ItemChange>,
    cancel: &CancelToken,
) -> RestoreResult<AddedAndRemoved> {
    let mut result = AddedAndRemoved::default();

    loop {
        cancel.check()?;

        let page = match pager.get_page() {
            Ok(page) => page,
            Err(err) if is_invalid_delta(&err) && !result.delta.reset => {
                warn!("delta token invalid, enumerating all items: {err}");
                pager.reset();
                result = AddedAndRemoved {
                    delta: DeltaUpdate {
                        reset: true,
                        ..DeltaUpdate::default()
                    },
                    ..AddedAndRemoved::default()
                };
                continue;
            }
            Err(err) => return Err(RestoreError::remote(err)),
        };

        for change in page.values {
            if change.removed {
                result.removed.push(change.id);
            } else {
                result.added.push(change.id);
            }
        }

        match page.next_link {
            Some(link) if !link.is_empty() => pager.set_next(&link),
            _ => {
                result.delta.url = page.delta_link.unwrap_or_default();
                break;
            }
        }
    }

    debug!(
        "enumerated {} added and {} removed items",
        result.added.len(),
        result.removed.len()
    );
    Ok(result)
}

/// Call `f` on all containers returned by `pager`.
///
/// Containers without id or name and failures of `f` are added as recoverable errors to
/// `faults`; the enumeration stops once `faults` has a failure.
///
/// # Errors
///
/// * [`RestoreErrorKind::Cancelled`] - If cancelled before fetching a page
/// * [`RestoreErrorKind::Remote`] - If fetching a page failed
///
/// [`RestoreErrorKind::Cancelled`]: crate::error::RestoreErrorKind::Cancelled
/// [`RestoreErrorKind::Remote`]: crate::error::RestoreErrorKind::Remote
pub fn enumerate_containers<C, F>(
    pager: &mut dyn Pager<C>,
    cancel: &CancelToken,
    faults: &mut FaultCollector,
    mut f: F,
) -> RestoreResult<()>
where
    C: Container,
    F: FnMut(&C) -> anyhow::Result<()>,
{
    while faults.failure().is_none() {
        cancel.check()?;
        let page = pager.get_page().map_err(RestoreError::remote)?;

        for container in &page.values {
            if faults.failure().is_some() {
                break;
            }
            if container.id().is_empty() || container.display_name().is_empty() {
                let name = format!("{}/{}", container.id(), container.display_name());
                faults.add_recoverable(PagerErrorKind::IncompleteContainer(name).into());
                continue;
            }
            if let Err(source) = f(container) {
                faults.add_recoverable(
                    PagerErrorKind::HandlingContainerFailed {
                        id: container.id().to_string(),
                        source,
                    }
                    .into(),
                );
            }
        }

        match page.next_link {
            Some(link) if !link.is_empty() => pager.set_next(&link),
            _ => break,
        }
    }

    Ok(())
}
