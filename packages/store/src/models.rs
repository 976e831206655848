//! # Domain models for notes and password entries
//!
//! Defines the typed entities held in repository snapshots, the drafts and
//! patches used to create and change them, and the mapping between these types
//! and the untyped [`Row`]s exchanged with a [`crate::TableStore`].
//!
//! ## Types
//!
//! | Type | Represents |
//! |------|-----------|
//! | [`OwnerId`] | The authenticated user id that scopes every row. |
//! | [`Note`] | A note/task row from the `notes` table. |
//! | [`NoteDraft`] / [`NotePatch`] | Fields for creating a note, and a partial change to one. |
//! | [`PasswordEntry`] | A saved credential from the `passwords` table. The secret is redacted from `Debug`. |
//! | [`PasswordDraft`] / [`PasswordPatch`] | Fields for creating an entry, and a partial change to one. |
//!
//! ## Decoding
//!
//! The remote store is untyped, so rows are decoded defensively:
//!
//! - an unknown or missing `priority` becomes [`Priority::Medium`];
//! - a missing `description` becomes the empty string;
//! - an empty `category` becomes `None`;
//! - a missing `updated_at` falls back to `created_at`;
//! - a missing id, owner, title, site, username or secret is a
//!   [`StoreError::MalformedRow`].

use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::error::StoreError;
use crate::table::Row;

/// Categories offered by the vault form. Any other text is accepted too.
pub const SUGGESTED_CATEGORIES: [&str; 6] = [
    "Email",
    "Development",
    "Entertainment",
    "Social",
    "Banking",
    "Other",
];

/// Identifier of the user owning a row.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OwnerId(String);

impl OwnerId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for OwnerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for OwnerId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

/// Note priority.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    High,
    #[default]
    Medium,
    Low,
}

impl Priority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::High => "high",
            Self::Medium => "medium",
            Self::Low => "low",
        }
    }

    /// Parse a stored or submitted priority, falling back to medium.
    pub fn parse_or_default(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "high" => Self::High,
            "low" => Self::Low,
            _ => Self::Medium,
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a due date reads relative to a given day.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DueLabel {
    None,
    Today,
    Tomorrow,
    On(NaiveDate),
}

impl fmt::Display for DueLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => f.write_str("No due date"),
            Self::Today => f.write_str("Today"),
            Self::Tomorrow => f.write_str("Tomorrow"),
            Self::On(date) => write!(f, "{}", date.format("%Y-%m-%d")),
        }
    }
}

/// A note owned by one user.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Note {
    pub id: String,
    pub title: String,
    pub description: String,
    pub priority: Priority,
    pub due_date: Option<NaiveDate>,
    pub completed: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub owner: OwnerId,
}

impl Note {
    /// Case-insensitive match of `needle` against title or description.
    /// `needle` must already be lowercase.
    pub(crate) fn matches_lowercase(&self, needle: &str) -> bool {
        self.title.to_lowercase().contains(needle)
            || self.description.to_lowercase().contains(needle)
    }

    pub fn due_label(&self, today: NaiveDate) -> DueLabel {
        match self.due_date {
            None => DueLabel::None,
            Some(date) if date == today => DueLabel::Today,
            Some(date) if today.succ_opt() == Some(date) => DueLabel::Tomorrow,
            Some(date) => DueLabel::On(date),
        }
    }

    pub(crate) fn from_row(row: Row) -> Result<Self, StoreError> {
        let raw: NoteRow = serde_json::from_value(Value::Object(row))
            .map_err(|e| StoreError::MalformedRow(format!("note: {e}")))?;
        let id = opaque_id(&raw.id).ok_or_else(|| malformed("note", "id"))?;
        let title = raw
            .title
            .filter(|t| !t.trim().is_empty())
            .ok_or_else(|| malformed("note", "title"))?;

        Ok(Self {
            id,
            title,
            description: raw.description.unwrap_or_default(),
            priority: raw
                .priority
                .as_deref()
                .map(Priority::parse_or_default)
                .unwrap_or_default(),
            due_date: raw.due_date.as_deref().and_then(parse_date),
            completed: raw.completed.unwrap_or(false),
            created_at: raw.created_at,
            updated_at: raw.updated_at.unwrap_or(raw.created_at),
            owner: OwnerId(raw.user_id),
        })
    }
}

/// Shape of a `notes` row as the remote returns it.
#[derive(Deserialize)]
struct NoteRow {
    id: Value,
    title: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    priority: Option<String>,
    #[serde(default)]
    due_date: Option<String>,
    #[serde(default)]
    completed: Option<bool>,
    created_at: DateTime<Utc>,
    #[serde(default)]
    updated_at: Option<DateTime<Utc>>,
    user_id: String,
}

/// User-supplied fields for a new note.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct NoteDraft {
    pub title: String,
    pub description: String,
    pub priority: Priority,
    pub due_date: Option<NaiveDate>,
}

impl NoteDraft {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Self::default()
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_due_date(mut self, due_date: NaiveDate) -> Self {
        self.due_date = Some(due_date);
        self
    }

    pub(crate) fn validate(&self) -> Result<(), StoreError> {
        require("title", &self.title)
    }

    pub(crate) fn to_row(&self, owner: &OwnerId) -> Row {
        into_row(json!({
            "title": self.title,
            "description": self.description,
            "priority": self.priority.as_str(),
            "due_date": self.due_date.map(format_date),
            "completed": false,
            "user_id": owner.as_str(),
        }))
    }
}

/// Partial change to a note. `None` leaves a field untouched.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct NotePatch {
    pub title: Option<String>,
    pub description: Option<String>,
    pub priority: Option<Priority>,
    /// `Some(None)` clears the due date.
    pub due_date: Option<Option<NaiveDate>>,
    pub completed: Option<bool>,
}

impl NotePatch {
    pub fn completed(completed: bool) -> Self {
        Self {
            completed: Some(completed),
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }

    pub(crate) fn validate(&self) -> Result<(), StoreError> {
        if self.is_empty() {
            return Err(StoreError::validation("patch", "nothing to update"));
        }
        if let Some(title) = &self.title {
            require("title", title)?;
        }
        Ok(())
    }

    pub(crate) fn to_row(&self) -> Row {
        let mut row = Row::new();
        if let Some(title) = &self.title {
            row.insert("title".into(), json!(title));
        }
        if let Some(description) = &self.description {
            row.insert("description".into(), json!(description));
        }
        if let Some(priority) = self.priority {
            row.insert("priority".into(), json!(priority.as_str()));
        }
        if let Some(due_date) = self.due_date {
            row.insert("due_date".into(), json!(due_date.map(format_date)));
        }
        if let Some(completed) = self.completed {
            row.insert("completed".into(), json!(completed));
        }
        row
    }
}

/// A saved credential owned by one user.
///
/// The secret is stored exactly as entered.
#[derive(Clone, PartialEq)]
pub struct PasswordEntry {
    pub id: String,
    pub site_name: String,
    pub username: String,
    pub secret: String,
    pub category: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub owner: OwnerId,
}

impl fmt::Debug for PasswordEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PasswordEntry")
            .field("id", &self.id)
            .field("site_name", &self.site_name)
            .field("username", &self.username)
            .field("secret", &"[HIDDEN]")
            .field("category", &self.category)
            .field("created_at", &self.created_at)
            .field("updated_at", &self.updated_at)
            .field("owner", &self.owner)
            .finish()
    }
}

impl PasswordEntry {
    pub(crate) fn matches_lowercase(&self, needle: &str) -> bool {
        self.site_name.to_lowercase().contains(needle)
            || self.username.to_lowercase().contains(needle)
            || self
                .category
                .as_deref()
                .is_some_and(|c| c.to_lowercase().contains(needle))
    }

    pub(crate) fn from_row(row: Row) -> Result<Self, StoreError> {
        let raw: PasswordRow = serde_json::from_value(Value::Object(row))
            .map_err(|e| StoreError::MalformedRow(format!("password: {e}")))?;
        let id = opaque_id(&raw.id).ok_or_else(|| malformed("password", "id"))?;
        let non_empty = |v: Option<String>, field: &str| {
            v.filter(|s| !s.trim().is_empty())
                .ok_or_else(|| malformed("password", field))
        };

        Ok(Self {
            id,
            site_name: non_empty(raw.site_name, "site_name")?,
            username: non_empty(raw.username, "username")?,
            secret: non_empty(raw.encrypted_password, "encrypted_password")?,
            category: normalize_category(raw.category),
            created_at: raw.created_at,
            updated_at: raw.updated_at.unwrap_or(raw.created_at),
            owner: OwnerId(raw.user_id),
        })
    }
}

#[derive(Deserialize)]
struct PasswordRow {
    id: Value,
    site_name: Option<String>,
    username: Option<String>,
    encrypted_password: Option<String>,
    #[serde(default)]
    category: Option<String>,
    created_at: DateTime<Utc>,
    #[serde(default)]
    updated_at: Option<DateTime<Utc>>,
    user_id: String,
}

/// User-supplied fields for a new credential.
#[derive(Clone, Default, PartialEq)]
pub struct PasswordDraft {
    pub site_name: String,
    pub username: String,
    pub secret: String,
    pub category: Option<String>,
}

impl fmt::Debug for PasswordDraft {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PasswordDraft")
            .field("site_name", &self.site_name)
            .field("username", &self.username)
            .field("secret", &"[HIDDEN]")
            .field("category", &self.category)
            .finish()
    }
}

impl PasswordDraft {
    pub fn new(
        site_name: impl Into<String>,
        username: impl Into<String>,
        secret: impl Into<String>,
    ) -> Self {
        Self {
            site_name: site_name.into(),
            username: username.into(),
            secret: secret.into(),
            category: None,
        }
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = normalize_category(Some(category.into()));
        self
    }

    pub(crate) fn validate(&self) -> Result<(), StoreError> {
        require("site_name", &self.site_name)?;
        require("username", &self.username)?;
        require("secret", &self.secret)
    }

    pub(crate) fn to_row(&self, owner: &OwnerId) -> Row {
        into_row(json!({
            "site_name": self.site_name,
            "username": self.username,
            "encrypted_password": self.secret,
            "category": normalize_category(self.category.clone()),
            "user_id": owner.as_str(),
        }))
    }
}

/// Partial change to a credential.
#[derive(Clone, Default, PartialEq)]
pub struct PasswordPatch {
    pub site_name: Option<String>,
    pub username: Option<String>,
    pub secret: Option<String>,
    /// `Some(None)` or `Some(Some(""))` clears the category.
    pub category: Option<Option<String>>,
}

impl fmt::Debug for PasswordPatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PasswordPatch")
            .field("site_name", &self.site_name)
            .field("username", &self.username)
            .field("secret", &self.secret.as_ref().map(|_| "[HIDDEN]"))
            .field("category", &self.category)
            .finish()
    }
}

impl PasswordPatch {
    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }

    pub(crate) fn validate(&self) -> Result<(), StoreError> {
        if self.is_empty() {
            return Err(StoreError::validation("patch", "nothing to update"));
        }
        if let Some(site_name) = &self.site_name {
            require("site_name", site_name)?;
        }
        if let Some(username) = &self.username {
            require("username", username)?;
        }
        if let Some(secret) = &self.secret {
            require("secret", secret)?;
        }
        Ok(())
    }

    pub(crate) fn to_row(&self) -> Row {
        let mut row = Row::new();
        if let Some(site_name) = &self.site_name {
            row.insert("site_name".into(), json!(site_name));
        }
        if let Some(username) = &self.username {
            row.insert("username".into(), json!(username));
        }
        if let Some(secret) = &self.secret {
            row.insert("encrypted_password".into(), json!(secret));
        }
        if let Some(category) = &self.category {
            row.insert(
                "category".into(),
                json!(normalize_category(category.clone())),
            );
        }
        row
    }
}

fn require(field: &'static str, value: &str) -> Result<(), StoreError> {
    if value.trim().is_empty() {
        return Err(StoreError::validation(field, "must not be empty"));
    }
    Ok(())
}

fn malformed(entity: &str, field: &str) -> StoreError {
    StoreError::MalformedRow(format!("{entity}: missing or empty {field}"))
}

fn normalize_category(category: Option<String>) -> Option<String> {
    category.filter(|c| !c.trim().is_empty())
}

/// Ids are opaque; the remote may hand back strings or integers.
fn opaque_id(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn format_date(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

/// Accepts `YYYY-MM-DD` and full RFC 3339 timestamps.
fn parse_date(s: &str) -> Option<NaiveDate> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .or_else(|| DateTime::parse_from_rfc3339(s).ok().map(|dt| dt.date_naive()))
}

fn into_row(value: Value) -> Row {
    match value {
        Value::Object(row) => row,
        _ => Row::new(),
    }
}
