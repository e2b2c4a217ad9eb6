//! Data models for sublist
//!
//! Defines the two core data structures: `Subscriber` and `SubscriberSet`.
//! Field names on the wire follow the provider's JSON (`Name`, `EmailAddress`).

use serde::{Deserialize, Serialize};

/// A single mailing list subscriber
///
/// The email address is the identity key. It is compared case-sensitively,
/// exactly as it was entered.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Subscriber {
    /// Display name
    #[serde(rename = "Name")]
    pub name: String,
    /// Email address (identity key)
    #[serde(rename = "EmailAddress")]
    pub email: String,
}

impl Subscriber {
    /// Create a new subscriber
    pub fn new(name: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            email: email.into(),
        }
    }

    /// Whether `other` has the same email and the same name
    pub fn same_record(&self, other: &Subscriber) -> bool {
        self.email == other.email && self.name == other.name
    }
}

/// An ordered collection of subscribers keyed by email
///
/// Order is display order. Upserts move the record to the end, which is how
/// a freshly added subscriber shows up in the table.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(transparent)]
pub struct SubscriberSet {
    subscribers: Vec<Subscriber>,
}

impl SubscriberSet {
    /// Create an empty set
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.subscribers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.subscribers.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Subscriber> {
        self.subscribers.iter()
    }

    pub fn as_slice(&self) -> &[Subscriber] {
        &self.subscribers
    }

    /// Look up a subscriber by email
    pub fn get(&self, email: &str) -> Option<&Subscriber> {
        self.subscribers.iter().find(|s| s.email == email)
    }

    /// Whether a subscriber with this email is present
    pub fn contains_email(&self, email: &str) -> bool {
        self.get(email).is_some()
    }

    /// Insert or replace the record for `subscriber.email`
    ///
    /// Any existing record with the same email is removed first and the new
    /// record is appended.
    pub fn upsert(&mut self, subscriber: Subscriber) {
        self.subscribers.retain(|s| s.email != subscriber.email);
        self.subscribers.push(subscriber);
    }

    /// Remove the record for `email`, returning it if it was present
    pub fn remove(&mut self, email: &str) -> Option<Subscriber> {
        let index = self.subscribers.iter().position(|s| s.email == email)?;
        Some(self.subscribers.remove(index))
    }

    /// Reconciliation predicate: does `observed` satisfy `self` as expected?
    ///
    /// True iff both sets have the same length and every expected record has
    /// an observed record with the same email and name. The containment
    /// check only runs one way.
    pub fn matches(&self, observed: &SubscriberSet) -> bool {
        self.len() == observed.len()
            && self
                .subscribers
                .iter()
                .all(|expected| observed.iter().any(|o| o.same_record(expected)))
    }
}

impl From<Vec<Subscriber>> for SubscriberSet {
    fn from(subscribers: Vec<Subscriber>) -> Self {
        Self { subscribers }
    }
}

impl FromIterator<Subscriber> for SubscriberSet {
    fn from_iter<I: IntoIterator<Item = Subscriber>>(iter: I) -> Self {
        Self {
            subscribers: iter.into_iter().collect(),
        }
    }
}

impl IntoIterator for SubscriberSet {
    type Item = Subscriber;
    type IntoIter = std::vec::IntoIter<Subscriber>;

    fn into_iter(self) -> Self::IntoIter {
        self.subscribers.into_iter()
    }
}

impl<'a> IntoIterator for &'a SubscriberSet {
    type Item = &'a Subscriber;
    type IntoIter = std::slice::Iter<'a, Subscriber>;

    fn into_iter(self) -> Self::IntoIter {
        self.subscribers.iter()
    }
}
