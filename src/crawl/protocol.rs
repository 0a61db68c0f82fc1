//! Bodies exchanged with the history controller

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Body of `POST /ws/profiles/first_post`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FirstPostReport {
    /// URL of the history page that reached its first post
    pub link: String,

    /// Oldest publish date on the page, epoch milliseconds; null when unreadable
    #[serde(rename = "publishAt", default)]
    pub publish_at: Option<i64>,
}

impl FirstPostReport {
    /// Oldest publish date as an instant
    pub fn publish_at(&self) -> Option<DateTime<Utc>> {
        self.publish_at.and_then(DateTime::from_timestamp_millis)
    }
}

/// Body answered on `GET /wx/profiles/next_link`; empty `data` means none yet
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NextLinkResponse {
    pub data: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_first_post_report() {
        let report: FirstPostReport = serde_json::from_str(
            r#"{"link":"https://mp.weixin.qq.com/mp/profile_ext?action=home&__biz=MzI4","publishAt":1562083200000}"#,
        )
        .unwrap();

        assert_eq!(
            report.publish_at(),
            Some(Utc.with_ymd_and_hms(2019, 7, 2, 16, 0, 0).unwrap())
        );
    }

    #[test]
    fn test_first_post_report_without_date() {
        let report: FirstPostReport =
            serde_json::from_str(r#"{"link":"https://x","publishAt":null}"#).unwrap();
        assert_eq!(report.publish_at(), None);

        let report: FirstPostReport = serde_json::from_str(r#"{"link":"https://x"}"#).unwrap();
        assert_eq!(report.publish_at, None);
    }

    #[test]
    fn test_next_link_response() {
        let body = serde_json::to_string(&NextLinkResponse {
            data: String::new(),
        })
        .unwrap();
        assert_eq!(body, r#"{"data":""}"#);
    }
}
