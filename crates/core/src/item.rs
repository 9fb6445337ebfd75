//! Serialized item bodies of non-drive categories.
//!
//! Items are stored as JSON records carrying a `kind` tag. The tag selects the decode path;
//! fields which are not needed for restoring are kept verbatim so they can be posted back.

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDateTime, Utc};
use serde_derive::{Deserialize, Serialize};
use serde_json::Value;
use serde_with::skip_serializing_none;

use crate::{
    path::Category,
    remote::{Calendar, ContactFolder, Container, Site},
};

/// [`ItemErrorKind`] describes the errors that can happen while decoding stored items
#[derive(thiserror::Error, Debug, displaydoc::Display)]
#[non_exhaustive]
pub enum ItemErrorKind {
    /// deserializing item `{id}` failed: `{source}`
    DecodingItemFailed {
        /// id of the item
        id: String,
        /// the underlying error
        source: serde_json::Error,
    },
    /// item `{id}` is a `{found}`, expected a `{expected}`
    UnexpectedKind {
        /// id of the item
        id: String,
        /// the kind of the decoded item
        found: &'static str,
        /// the kind required by the collection
        expected: &'static str,
    },
}

pub(crate) type ItemResult<T> = Result<T, ItemErrorKind>;

/// Fields of an item which are passed through unchanged
pub type ExtraFields = BTreeMap<String, Value>;

/// A stored item body, tagged by its kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ItemBody {
    /// A contact
    Contact(Contact),
    /// A calendar event
    Event(Event),
    /// A `SharePoint` list
    List(List),
    /// A `SharePoint` site page
    Page(Page),
}

impl ItemBody {
    /// Decode an item body.
    ///
    /// # Errors
    ///
    /// * [`ItemErrorKind::DecodingItemFailed`] - If the data is no valid item record
    pub fn from_slice(id: &str, data: &[u8]) -> ItemResult<Self> {
        serde_json::from_slice(data).map_err(|source| ItemErrorKind::DecodingItemFailed {
            id: id.to_string(),
            source,
        })
    }

    /// The name of the kind of this item.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Contact(_) => Contact::KIND,
            Self::Event(_) => Event::KIND,
            Self::List(_) => List::KIND,
            Self::Page(_) => Page::KIND,
        }
    }
}

/// An item which can be restored into a container with collision detection.
pub trait RestorableItem: Sized + Send + Sync + 'static {
    /// The name of the kind, as used in the `kind` tag
    const KIND: &'static str;
    /// The category items of this kind are stored in
    const CATEGORY: Category;
    /// The container items of this kind are restored into
    type Container: Container + Send + Sync;

    /// Extract the item from a decoded body, if it has the right kind.
    fn from_body(body: ItemBody) -> Result<Self, ItemBody>;

    /// The key identifying the item at the destination.
    ///
    /// It is computed the same for the item to restore and for the existing items, so equal keys
    /// mean the item already exists.
    fn collision_key(&self) -> String;

    /// A human-readable name used for reporting.
    fn display_name(&self) -> String;

    /// Adapt the item before it is posted to a destination named `location`.
    ///
    /// `fallback_name` is used by items which are renamed but carry no name. The default keeps
    /// the item unchanged.
    fn prepare_for(&mut self, _location: &str, _fallback_name: &str) {}

    /// Take the children which have to be posted after the item itself.
    fn take_children(&mut self) -> Vec<Value> {
        Vec::new()
    }

    /// Decode the item from stored data.
    ///
    /// # Errors
    ///
    /// * [`ItemErrorKind::DecodingItemFailed`] - If the data is no valid item record
    /// * [`ItemErrorKind::UnexpectedKind`] - If the record is of another kind
    fn decode(id: &str, data: &[u8]) -> ItemResult<Self> {
        let body = ItemBody::from_slice(id, data)?;
        Self::from_body(body).map_err(|body| ItemErrorKind::UnexpectedKind {
            id: id.to_string(),
            found: body.kind(),
            expected: Self::KIND,
        })
    }
}

/// A contact
#[skip_serializing_none]
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Contact {
    /// The given name
    pub given_name: Option<String>,
    /// The surname
    pub surname: Option<String>,
    /// Email addresses
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub email_addresses: Vec<String>,
    /// Other fields
    #[serde(flatten)]
    pub extra: ExtraFields,
}

impl RestorableItem for Contact {
    const KIND: &'static str = "contact";
    const CATEGORY: Category = Category::Contacts;
    type Container = ContactFolder;

    fn from_body(body: ItemBody) -> Result<Self, ItemBody> {
        match body {
            ItemBody::Contact(contact) => Ok(contact),
            body => Err(body),
        }
    }

    fn collision_key(&self) -> String {
        format!(
            "{}{}{}",
            self.given_name.as_deref().unwrap_or_default(),
            self.surname.as_deref().unwrap_or_default(),
            self.email_addresses
                .first()
                .map(|email| email.to_lowercase())
                .unwrap_or_default(),
        )
    }

    fn display_name(&self) -> String {
        [self.given_name.as_deref(), self.surname.as_deref()]
            .into_iter()
            .flatten()
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// A point in time with the time zone it was given in
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct DateTimeTimeZone {
    /// The date and time, without offset
    pub date_time: String,
    /// The name of the time zone
    pub time_zone: String,
}

impl DateTimeTimeZone {
    /// A normalized form to compare times given in different notations.
    ///
    /// Times in UTC (or without time zone) are normalized to RFC 3339, others are kept as given
    /// together with their time zone.
    #[must_use]
    pub fn normalized(&self) -> String {
        let is_utc = self.time_zone.is_empty() || self.time_zone.eq_ignore_ascii_case("utc");
        let parsed = DateTime::parse_from_rfc3339(&self.date_time)
            .map(|dt| dt.with_timezone(&Utc))
            .or_else(|_| {
                NaiveDateTime::parse_from_str(&self.date_time, "%Y-%m-%dT%H:%M:%S%.f")
                    .map(|dt| dt.and_utc())
            });
        match parsed {
            Ok(dt) if is_utc => dt.to_rfc3339(),
            _ => format!("{}{}", self.date_time, self.time_zone),
        }
    }
}

/// A calendar event
#[skip_serializing_none]
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Event {
    /// The subject
    pub subject: Option<String>,
    /// Start of the event
    pub start: Option<DateTimeTimeZone>,
    /// End of the event
    pub end: Option<DateTimeTimeZone>,
    /// Other fields
    #[serde(flatten)]
    pub extra: ExtraFields,
}

impl RestorableItem for Event {
    const KIND: &'static str = "event";
    const CATEGORY: Category = Category::Events;
    type Container = Calendar;

    fn from_body(body: ItemBody) -> Result<Self, ItemBody> {
        match body {
            ItemBody::Event(event) => Ok(event),
            body => Err(body),
        }
    }

    fn collision_key(&self) -> String {
        format!(
            "{}{}{}",
            self.subject.as_deref().unwrap_or_default(),
            self.start
                .as_ref()
                .map(DateTimeTimeZone::normalized)
                .unwrap_or_default(),
            self.end
                .as_ref()
                .map(DateTimeTimeZone::normalized)
                .unwrap_or_default(),
        )
    }

    fn display_name(&self) -> String {
        self.subject.clone().unwrap_or_default()
    }
}

/// A `SharePoint` list with its items
#[skip_serializing_none]
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct List {
    /// The name of the list
    pub display_name: Option<String>,
    /// The items of the list, posted after the list is created
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub items: Vec<Value>,
    /// Other fields
    #[serde(flatten)]
    pub extra: ExtraFields,
}

impl RestorableItem for List {
    const KIND: &'static str = "list";
    const CATEGORY: Category = Category::Lists;
    type Container = Site;

    fn from_body(body: ItemBody) -> Result<Self, ItemBody> {
        match body {
            ItemBody::List(list) => Ok(list),
            body => Err(body),
        }
    }

    fn collision_key(&self) -> String {
        self.display_name.clone().unwrap_or_default()
    }

    fn display_name(&self) -> String {
        self.display_name.clone().unwrap_or_default()
    }

    fn prepare_for(&mut self, location: &str, fallback_name: &str) {
        let name = self.display_name.as_deref().unwrap_or(fallback_name);
        self.display_name = Some(prefixed_name(location, name));
    }

    fn take_children(&mut self) -> Vec<Value> {
        std::mem::take(&mut self.items)
    }
}

/// A `SharePoint` site page
#[skip_serializing_none]
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Page {
    /// The file name of the page
    pub name: Option<String>,
    /// The title of the page
    pub title: Option<String>,
    /// Other fields
    #[serde(flatten)]
    pub extra: ExtraFields,
}

impl RestorableItem for Page {
    const KIND: &'static str = "page";
    const CATEGORY: Category = Category::Pages;
    type Container = Site;

    fn from_body(body: ItemBody) -> Result<Self, ItemBody> {
        match body {
            ItemBody::Page(page) => Ok(page),
            body => Err(body),
        }
    }

    fn collision_key(&self) -> String {
        self.name.clone().unwrap_or_default()
    }

    fn display_name(&self) -> String {
        self.title.clone().or_else(|| self.name.clone()).unwrap_or_default()
    }

    fn prepare_for(&mut self, location: &str, fallback_name: &str) {
        let name = self.name.as_deref().unwrap_or(fallback_name);
        self.name = Some(prefixed_name(location, name));
    }
}

/// Lists and pages are restored next to the originals as `<location>_<name>`.
fn prefixed_name(location: &str, name: &str) -> String {
    match (location, name) {
        ("", name) => name.to_string(),
        (location, "") => location.to_string(),
        (location, name) => format!("{location}_{name}"),
    }
}
