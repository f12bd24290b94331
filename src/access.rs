//! Region allow-lists.
//!
//! The region directory says which region names a user may see. Those names
//! are resolved to region IDs against the current snapshot, and every read
//! path checks or trims by ID. A request naming a region outside the list is
//! rejected outright; a request with no region scope gets trimmed results.

use crate::completeness::CompletenessNode;
use crate::error::{Error, Result};
use crate::identity::Identities;
use crate::types::{AggregateRow, MonthlyRecord, RegionWithDistricts};
use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::{Mutex, PoisonError};
use tracing::{debug, warn};

/// Credentials for the region directory, held as a plain value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expires_at: DateTime<Utc>,
}

impl Session {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

pub trait RegionDirectory: Send + Sync {
    fn authenticate(&self) -> Result<Session>;
    fn refresh(&self, session: &Session) -> Result<Session>;
    /// Region names `email` may see. An empty list means every region.
    fn list_allowed_regions(&self, session: &Session, email: &str) -> Result<Vec<String>>;
}

impl<T: RegionDirectory + ?Sized> RegionDirectory for Box<T> {
    fn authenticate(&self) -> Result<Session> {
        (**self).authenticate()
    }

    fn refresh(&self, session: &Session) -> Result<Session> {
        (**self).refresh(session)
    }

    fn list_allowed_regions(&self, session: &Session, email: &str) -> Result<Vec<String>> {
        (**self).list_allowed_regions(session, email)
    }
}

pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Directory client plus the session it is currently using.
pub struct SessionState<D> {
    directory: D,
    session: Mutex<Option<Session>>,
}

impl<D: RegionDirectory> SessionState<D> {
    pub fn new(directory: D) -> Self {
        Self {
            directory,
            session: Mutex::new(None),
        }
    }

    pub fn allowed_region_names(&self, email: &str, now: DateTime<Utc>) -> Result<Vec<String>> {
        let session = self.current_session(now)?;
        self.directory
            .list_allowed_regions(&session, &normalize_email(email))
    }

    /// A live session: the cached one, a refreshed one, or a new login when
    /// refreshing is refused.
    fn current_session(&self, now: DateTime<Utc>) -> Result<Session> {
        let mut slot = self.session.lock().unwrap_or_else(PoisonError::into_inner);
        let session = match slot.take() {
            Some(s) if !s.is_expired(now) => s,
            Some(expired) => match self.directory.refresh(&expired) {
                Ok(s) => s,
                Err(e) => {
                    warn!(error = %e, "session refresh failed; re-authenticating");
                    self.directory.authenticate()?
                }
            },
            None => self.directory.authenticate()?,
        };
        *slot = Some(session.clone());
        Ok(session)
    }
}

/// Allow-list file: `{ "user@example.org": ["Arusha", "Mtwara"] }`. Users
/// mapped to an empty list see every region; users not listed are refused.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(transparent)]
pub struct StaticDirectory {
    users: HashMap<String, Vec<String>>,
}

impl StaticDirectory {
    pub fn from_path(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json(&text)
    }

    pub fn from_json(text: &str) -> Result<Self> {
        let parsed: StaticDirectory = serde_json::from_str(text)?;
        let users = parsed
            .users
            .into_iter()
            .map(|(email, regions)| (normalize_email(&email), regions))
            .collect();
        Ok(Self { users })
    }
}

impl RegionDirectory for StaticDirectory {
    fn authenticate(&self) -> Result<Session> {
        Ok(Session {
            access_token: "static".to_string(),
            refresh_token: None,
            expires_at: Utc::now() + Duration::hours(1),
        })
    }

    fn refresh(&self, _session: &Session) -> Result<Session> {
        self.authenticate()
    }

    fn list_allowed_regions(&self, _session: &Session, email: &str) -> Result<Vec<String>> {
        self.users
            .get(email)
            .cloned()
            .ok_or_else(|| Error::Directory(format!("{} is not on the allow-list", email)))
    }
}

/// Region IDs a caller may see.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum AllowList {
    #[default]
    Unrestricted,
    Regions(HashSet<String>),
}

impl AllowList {
    /// Match directory region names against the snapshot. A non-empty name
    /// list that matches nothing allows nothing.
    pub fn resolve(region_names: &[String], ids: &Identities) -> Self {
        if region_names.is_empty() {
            return AllowList::Unrestricted;
        }
        let wanted: HashSet<&str> = region_names.iter().map(|n| n.trim()).collect();
        let allowed: HashSet<String> = ids
            .regions()
            .iter()
            .filter(|r| wanted.contains(r.name.as_str()))
            .map(|r| r.id.clone())
            .collect();
        debug!(names = region_names.len(), matched = allowed.len(), "resolved allow-list");
        AllowList::Regions(allowed)
    }

    pub fn allows(&self, region_id: &str) -> bool {
        match self {
            AllowList::Unrestricted => true,
            AllowList::Regions(ids) => ids.contains(region_id),
        }
    }

    /// Reject the request if any requested region is outside the list.
    pub fn authorize<'a, I>(&self, requested: I) -> Result<()>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let denied: Vec<String> = requested
            .into_iter()
            .filter(|r| !self.allows(r))
            .map(str::to_string)
            .collect();
        if denied.is_empty() {
            Ok(())
        } else {
            warn!(regions = ?denied, "request for regions outside allow-list");
            Err(Error::Unauthorized { regions: denied })
        }
    }

}

/// Anything that belongs to exactly one region.
pub trait RegionScoped {
    fn region_id(&self) -> &str;
}

impl<T: RegionScoped + ?Sized> RegionScoped for &T {
    fn region_id(&self) -> &str {
        (**self).region_id()
    }
}

impl RegionScoped for MonthlyRecord {
    fn region_id(&self) -> &str {
        &self.region_id
    }
}

impl RegionScoped for AggregateRow {
    fn region_id(&self) -> &str {
        &self.region_id
    }
}

impl RegionScoped for RegionWithDistricts {
    fn region_id(&self) -> &str {
        &self.region_id
    }
}

/// Region roots of a completeness forest.
impl RegionScoped for CompletenessNode {
    fn region_id(&self) -> &str {
        &self.id
    }
}

/// Trim rows to the regions the caller may see. Every unscoped read goes
/// through here.
pub fn restrict_to_regions<T: RegionScoped>(rows: Vec<T>, allow: &AllowList) -> Vec<T> {
    match allow {
        AllowList::Unrestricted => rows,
        AllowList::Regions(ids) => rows
            .into_iter()
            .filter(|r| ids.contains(r.region_id()))
            .collect(),
    }
}
