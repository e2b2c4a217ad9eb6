//! Provider wire types
//!
//! JSON bodies exchanged with the createsend v3.3 API. Only the fields we
//! use are modelled; everything else in a response is ignored.

use serde::{Deserialize, Serialize};

use crate::models::Subscriber;

/// Value sent as `ConsentToTrack`; the API rejects adds without it
pub const CONSENT_TO_TRACK: &str = "Yes";

/// Body of `POST /subscribers/{list_id}.json`
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "PascalCase")]
pub struct UpsertRequest<'a> {
    pub email_address: &'a str,
    pub name: &'a str,
    /// Lets a previously removed address be added again
    pub resubscribe: bool,
    pub consent_to_track: &'static str,
}

impl<'a> UpsertRequest<'a> {
    pub fn new(subscriber: &'a Subscriber) -> Self {
        Self {
            email_address: &subscriber.email,
            name: &subscriber.name,
            resubscribe: true,
            consent_to_track: CONSENT_TO_TRACK,
        }
    }
}

/// One page of `GET /lists/{list_id}/active.json`
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ActiveSubscribersPage {
    /// Missing on error bodies; treated as an empty page
    #[serde(default)]
    pub results: Vec<Subscriber>,
    #[serde(default)]
    pub page_number: u32,
    #[serde(default)]
    pub number_of_pages: u32,
    #[serde(default)]
    pub total_number_of_records: u32,
}

impl ActiveSubscribersPage {
    /// Whether another page follows this one
    pub fn has_more(&self) -> bool {
        self.page_number < self.number_of_pages
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_upsert_request_body() {
        let sub = Subscriber::new("Ann", "ann@x.com");
        let json = serde_json::to_value(UpsertRequest::new(&sub)).unwrap();

        assert_eq!(
            json,
            serde_json::json!({
                "EmailAddress": "ann@x.com",
                "Name": "Ann",
                "Resubscribe": true,
                "ConsentToTrack": "Yes"
            })
        );
    }

    #[test]
    fn test_page_decodes_results() {
        let page: ActiveSubscribersPage = serde_json::from_str(
            r#"{
                "Results": [
                    {"EmailAddress": "ann@x.com", "Name": "Ann", "Date": "2024-01-01 10:00:00", "State": "Active"}
                ],
                "ResultsOrderedBy": "email",
                "PageNumber": 1,
                "PageSize": 1000,
                "RecordsOnThisPage": 1,
                "TotalNumberOfRecords": 1,
                "NumberOfPages": 1
            }"#,
        )
        .unwrap();

        assert_eq!(page.results, vec![Subscriber::new("Ann", "ann@x.com")]);
        assert!(!page.has_more());
    }

    #[test]
    fn test_page_without_results_is_empty() {
        let page: ActiveSubscribersPage =
            serde_json::from_str(r#"{"Code": 50, "Message": "Must supply a valid HTTP Basic Authorization header"}"#)
                .unwrap();
        assert!(page.results.is_empty());
        assert!(!page.has_more());
    }

    #[test]
    fn test_has_more() {
        let page = ActiveSubscribersPage {
            page_number: 1,
            number_of_pages: 3,
            ..Default::default()
        };
        assert!(page.has_more());
    }
}
