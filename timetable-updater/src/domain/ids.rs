//! Feed-scoped identifiers.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Error returned when parsing an invalid feed-scoped id.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid feed-scoped id: {reason}")]
pub struct InvalidFeedScopedId {
    reason: &'static str,
}

/// An identifier qualified by the feed it was imported from.
///
/// Real-time messages usually reference entities by their raw id only, so the
/// raw part is exposed separately through [`FeedScopedId::id`].
///
/// # Examples
///
/// ```
/// use timetable_updater::domain::FeedScopedId;
///
/// let id = FeedScopedId::parse("RB:NSR:Quay:7").unwrap();
/// assert_eq!(id.feed_id(), "RB");
/// assert_eq!(id.id(), "NSR:Quay:7");
/// assert_eq!(id.to_string(), "RB:NSR:Quay:7");
///
/// assert!(FeedScopedId::parse("no-separator").is_err());
/// assert!(FeedScopedId::parse(":empty-feed").is_err());
/// ```
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct FeedScopedId {
    feed_id: String,
    id: String,
}

impl FeedScopedId {
    /// Creates an id from its two parts.
    pub fn new(feed_id: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            feed_id: feed_id.into(),
            id: id.into(),
        }
    }

    /// Parse `"FEED:ID"`. The feed is everything before the first colon.
    pub fn parse(s: &str) -> Result<Self, InvalidFeedScopedId> {
        let (feed_id, id) = s.split_once(':').ok_or(InvalidFeedScopedId {
            reason: "expected FEED:ID",
        })?;
        if feed_id.is_empty() {
            return Err(InvalidFeedScopedId {
                reason: "feed id must not be empty",
            });
        }
        if id.is_empty() {
            return Err(InvalidFeedScopedId {
                reason: "id must not be empty",
            });
        }
        Ok(Self::new(feed_id, id))
    }

    /// The feed part.
    pub fn feed_id(&self) -> &str {
        &self.feed_id
    }

    /// The raw id, without the feed.
    pub fn id(&self) -> &str {
        &self.id
    }
}

impl TryFrom<String> for FeedScopedId {
    type Error = InvalidFeedScopedId;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<FeedScopedId> for String {
    fn from(value: FeedScopedId) -> Self {
        value.to_string()
    }
}

impl fmt::Debug for FeedScopedId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FeedScopedId({}:{})", self.feed_id, self.id)
    }
}

impl fmt::Display for FeedScopedId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.feed_id, self.id)
    }
}

/// Identifier of a scheduled trip.
pub type TripId = FeedScopedId;

/// Identifier of a stop (quay / platform).
pub type StopId = FeedScopedId;

/// Identifier of a trip pattern.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PatternId(pub FeedScopedId);

impl fmt::Display for PatternId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}
