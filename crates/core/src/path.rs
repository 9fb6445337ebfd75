//! Hierarchical paths of restore collections and items.
//!
//! A path has the shape `<tenant>/<service>/<resource owner>/<category>/<elements...>`.
//! For drive-like categories the elements are `drives/<drive id>/root:/<folders...>`.

use std::{fmt, str::FromStr};

use serde_derive::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// [`PathErrorKind`] describes the errors that can be returned when handling restore paths
#[derive(thiserror::Error, Debug, displaydoc::Display)]
#[non_exhaustive]
pub enum PathErrorKind {
    /// path `{0}` has too few elements
    TooFewElements(String),
    /// unknown service `{0}`
    UnknownService(String),
    /// unknown category `{0}`
    UnknownCategory(String),
    /// path `{0}` has no parent directory
    NoParent(String),
    /// path `{0}` is not a drive path
    NotADrivePath(String),
    /// path element `{0}` must be non-empty and must not contain `/`
    InvalidElement(String),
}

pub(crate) type PathResult<T> = Result<T, PathErrorKind>;

/// The element starting the drive part of a path
pub const DRIVES_ELEMENT: &str = "drives";
/// The element marking the root folder of a drive
pub const ROOT_ELEMENT: &str = "root:";

/// The service a resource owner's data belongs to.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ServiceType {
    /// Mail, contacts and calendars
    Exchange,
    /// Personal drives
    OneDrive,
    /// Sites with document libraries, lists and pages
    SharePoint,
}

/// The kind of data stored below a path.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Category {
    /// Exchange contacts
    Contacts,
    /// Exchange calendar events
    Events,
    /// OneDrive files
    Files,
    /// SharePoint document libraries
    Libraries,
    /// SharePoint lists
    Lists,
    /// SharePoint site pages
    Pages,
}

/// A path of a collection or an item within a backup.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RestorePath {
    tenant: String,
    service: ServiceType,
    resource_owner: String,
    category: Category,
    elements: Vec<String>,
}

fn check_element(element: &str) -> PathResult<()> {
    if element.is_empty() || element.contains('/') {
        return Err(PathErrorKind::InvalidElement(element.to_string()));
    }
    Ok(())
}

impl RestorePath {
    /// Create a new [`RestorePath`].
    ///
    /// # Errors
    ///
    /// * [`PathErrorKind::InvalidElement`] - If an element is empty or contains a `/`
    pub fn new<I, S>(
        tenant: impl Into<String>,
        service: ServiceType,
        resource_owner: impl Into<String>,
        category: Category,
        elements: I,
    ) -> PathResult<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let elements: Vec<String> = elements.into_iter().map(Into::into).collect();
        for element in &elements {
            check_element(element)?;
        }
        Ok(Self {
            tenant: tenant.into(),
            service,
            resource_owner: resource_owner.into(),
            category,
            elements,
        })
    }

    /// The tenant this path belongs to.
    #[must_use]
    pub fn tenant(&self) -> &str {
        &self.tenant
    }

    /// The service of this path.
    #[must_use]
    pub const fn service(&self) -> ServiceType {
        self.service
    }

    /// The resource owner (user or site) of this path.
    #[must_use]
    pub fn resource_owner(&self) -> &str {
        &self.resource_owner
    }

    /// The category of this path.
    #[must_use]
    pub const fn category(&self) -> Category {
        self.category
    }

    /// The elements following the category.
    #[must_use]
    pub fn elements(&self) -> &[String] {
        &self.elements
    }

    /// The last element, if any.
    #[must_use]
    pub fn last(&self) -> Option<&str> {
        self.elements.last().map(String::as_str)
    }

    /// The parent directory of this path.
    ///
    /// # Errors
    ///
    /// * [`PathErrorKind::NoParent`] - If the path has no elements left
    pub fn dir(&self) -> PathResult<Self> {
        if self.elements.is_empty() {
            return Err(PathErrorKind::NoParent(self.to_string()));
        }
        let mut parent = self.clone();
        _ = parent.elements.pop();
        Ok(parent)
    }

    /// Append an element, e.g. an item name, to this path.
    ///
    /// # Errors
    ///
    /// * [`PathErrorKind::InvalidElement`] - If the element is empty or contains a `/`
    pub fn append(&self, element: &str) -> PathResult<Self> {
        check_element(element)?;
        let mut path = self.clone();
        path.elements.push(element.to_string());
        Ok(path)
    }

    /// Interpret this path as a drive path.
    ///
    /// # Errors
    ///
    /// * [`PathErrorKind::NotADrivePath`] - If the elements don't start with `drives/<id>/root:`
    pub fn to_drive_path(&self) -> PathResult<DrivePath> {
        match self.elements.as_slice() {
            [drives, drive_id, root, folders @ ..]
                if drives == DRIVES_ELEMENT && root == ROOT_ELEMENT =>
            {
                Ok(DrivePath {
                    drive_id: drive_id.clone(),
                    folders: folders.to_vec(),
                })
            }
            _ => Err(PathErrorKind::NotADrivePath(self.to_string())),
        }
    }
}

impl fmt::Display for RestorePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}/{}/{}",
            self.tenant, self.service, self.resource_owner, self.category
        )?;
        for element in &self.elements {
            write!(f, "/{element}")?;
        }
        Ok(())
    }
}

impl FromStr for RestorePath {
    type Err = PathErrorKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.split('/');
        let (Some(tenant), Some(service), Some(owner), Some(category)) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            return Err(PathErrorKind::TooFewElements(s.to_string()));
        };
        let service = service
            .parse()
            .map_err(|_| PathErrorKind::UnknownService(service.to_string()))?;
        let category = category
            .parse()
            .map_err(|_| PathErrorKind::UnknownCategory(category.to_string()))?;
        Self::new(tenant, service, owner, category, parts)
    }
}

/// The drive part of a [`RestorePath`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DrivePath {
    /// The id of the drive
    pub drive_id: String,
    /// The folders below the drive root
    pub folders: Vec<String>,
}

impl DrivePath {
    /// Whether this is the root folder of the drive.
    #[must_use]
    pub fn is_root(&self) -> bool {
        self.folders.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case("t/onedrive/u/files/drives/d/root:")]
    #[case("t/sharepoint/site/libraries/drives/d/root:/a/b")]
    #[case("t/exchange/u/contacts/folder")]
    fn parse_display_roundtrip(#[case] input: &str) {
        let path: RestorePath = input.parse().unwrap();
        assert_eq!(path.to_string(), input);
    }

    #[rstest]
    #[case("t/onedrive/u")]
    #[case("t/nosuch/u/files")]
    #[case("t/onedrive/u/nosuch")]
    #[case("t/onedrive/u/files//a")]
    fn parse_invalid(#[case] input: &str) {
        assert!(input.parse::<RestorePath>().is_err());
    }

    #[test]
    fn drive_path_of_folder() {
        let path: RestorePath = "t/onedrive/u/files/drives/d1/root:/a/b".parse().unwrap();
        let drive_path = path.to_drive_path().unwrap();
        assert_eq!(drive_path.drive_id, "d1");
        assert_eq!(drive_path.folders, vec!["a", "b"]);
        assert!(!drive_path.is_root());

        let root = path.dir().unwrap().dir().unwrap().to_drive_path().unwrap();
        assert!(root.is_root());
    }

    #[test]
    fn non_drive_path_is_rejected() {
        let path: RestorePath = "t/onedrive/u/files/drives/d1".parse().unwrap();
        assert!(path.to_drive_path().is_err());
    }

    #[test]
    fn dir_of_empty_path_fails() {
        let path: RestorePath = "t/exchange/u/contacts".parse().unwrap();
        assert!(path.dir().is_err());
    }
}
