//! Join-request parsing.
//!
//! A participant enlists by `PUT`ting to the LRA, carrying its callback
//! addresses either as a `Link` header (`<url>; rel="compensate", ...`) or
//! as a JSON body. Both forms produce the same capability set.

use lra_common::ParticipantEndpoints;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error raised for malformed join requests.
#[derive(Error, Debug)]
pub enum JoinParseError {
    #[error("malformed link header entry: {0}")]
    MalformedLink(String),

    #[error("unknown link relation: {0}")]
    UnknownRelation(String),

    #[error("malformed join body: {0}")]
    MalformedBody(#[from] serde_json::Error),

    #[error("no compensate or complete callback supplied")]
    NoEndPhaseCallback,
}

/// JSON body form of a join request.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct JoinRequest {
    pub compensate: Option<String>,
    pub complete: Option<String>,
    pub status: Option<String>,
    pub forget: Option<String>,
    pub leave: Option<String>,
    pub after: Option<String>,
    /// Guarantee window in milliseconds after which the participant may no
    /// longer be able to compensate. Zero = unbounded.
    pub compensate_time_limit_ms: Option<u64>,
    /// Opaque data round-tripped on end-phase callbacks.
    pub user_data: Option<String>,
}

impl JoinRequest {
    /// Convert into the capability set stored on the enlistment.
    pub fn into_endpoints(self) -> Result<ParticipantEndpoints, JoinParseError> {
        let endpoints = ParticipantEndpoints {
            compensate: self.compensate,
            complete: self.complete,
            status: self.status,
            forget: self.forget,
            leave: self.leave,
            after: self.after,
        };
        if !endpoints.has_end_phase_callback() {
            return Err(JoinParseError::NoEndPhaseCallback);
        }
        Ok(endpoints)
    }
}

/// Parse a `Link` header value into a capability set.
///
/// Entries look like `<http://host/compensate>; rel="compensate"` and are
/// comma-separated. Relations other than the six known capabilities are
/// rejected.
pub fn endpoints_from_link_header(value: &str) -> Result<ParticipantEndpoints, JoinParseError> {
    let mut endpoints = ParticipantEndpoints::default();

    for entry in split_link_entries(value) {
        let entry = entry.trim();
        if entry.is_empty() {
            continue;
        }

        let (url, params) = entry
            .split_once('>')
            .ok_or_else(|| JoinParseError::MalformedLink(entry.to_string()))?;
        let url = url
            .strip_prefix('<')
            .ok_or_else(|| JoinParseError::MalformedLink(entry.to_string()))?
            .to_string();

        let rel = params
            .split(';')
            .filter_map(|p| p.trim().strip_prefix("rel="))
            .map(|r| r.trim_matches('"'))
            .next()
            .ok_or_else(|| JoinParseError::MalformedLink(entry.to_string()))?;

        let slot = match rel {
            "compensate" => &mut endpoints.compensate,
            "complete" => &mut endpoints.complete,
            "status" => &mut endpoints.status,
            "forget" => &mut endpoints.forget,
            "leave" => &mut endpoints.leave,
            "after" => &mut endpoints.after,
            other => return Err(JoinParseError::UnknownRelation(other.to_string())),
        };
        *slot = Some(url);
    }

    if !endpoints.has_end_phase_callback() {
        return Err(JoinParseError::NoEndPhaseCallback);
    }
    Ok(endpoints)
}

/// Split a link header on the commas that separate entries, not the ones
/// inside `<...>` URL brackets.
fn split_link_entries(value: &str) -> Vec<&str> {
    let mut entries = Vec::new();
    let mut depth = 0usize;
    let mut start = 0usize;

    for (i, c) in value.char_indices() {
        match c {
            '<' => depth += 1,
            '>' => depth = depth.saturating_sub(1),
            ',' if depth == 0 => {
                entries.push(&value[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    entries.push(&value[start..]);
    entries
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_link_header() {
        let value = r#"<http://p:8080/compensate>; rel="compensate", <http://p:8080/complete>; rel="complete", <http://p:8080/status>; rel="status""#;
        let endpoints = endpoints_from_link_header(value).unwrap();
        assert_eq!(
            endpoints.compensate.as_deref(),
            Some("http://p:8080/compensate")
        );
        assert_eq!(endpoints.complete.as_deref(), Some("http://p:8080/complete"));
        assert_eq!(endpoints.status.as_deref(), Some("http://p:8080/status"));
        assert!(endpoints.forget.is_none());
    }

    #[test]
    fn test_parse_link_header_unquoted_rel() {
        let value = "<http://p/compensate>; rel=compensate";
        let endpoints = endpoints_from_link_header(value).unwrap();
        assert_eq!(endpoints.compensate.as_deref(), Some("http://p/compensate"));
    }

    #[test]
    fn test_reject_unknown_relation() {
        let value = r#"<http://p/x>; rel="observe""#;
        assert!(matches!(
            endpoints_from_link_header(value),
            Err(JoinParseError::UnknownRelation(_))
        ));
    }

    #[test]
    fn test_reject_join_without_end_phase_callback() {
        let value = r#"<http://p/status>; rel="status""#;
        assert!(matches!(
            endpoints_from_link_header(value),
            Err(JoinParseError::NoEndPhaseCallback)
        ));

        let body = JoinRequest {
            status: Some("http://p/status".into()),
            ..Default::default()
        };
        assert!(matches!(
            body.into_endpoints(),
            Err(JoinParseError::NoEndPhaseCallback)
        ));
    }

    #[test]
    fn test_join_body_round_trip() {
        let json = r#"{"compensate":"http://p/compensate","complete":"http://p/complete","userData":"order-42"}"#;
        let req: JoinRequest = serde_json::from_str(json).unwrap();
        assert_eq!(req.user_data.as_deref(), Some("order-42"));
        let endpoints = req.into_endpoints().unwrap();
        assert!(endpoints.has_end_phase_callback());
    }
}
