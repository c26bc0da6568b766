//! Outbound HTTP invoker for participant callbacks.
//!
//! The client never surfaces a participant-level failure as an error:
//! every call is classified into an outcome value and reconciled by the
//! coordinator's state machine. Transport failures and unrecognized
//! responses classify as ambiguous, never as a guessed terminal state.

use std::str::FromStr;

use reqwest::StatusCode;
use tracing::{debug, instrument, warn};

use lra_common::{Direction, LraError, LraId, LraStatus, Participant, ParticipantStatus, Result};
use lra_protocol::{LRA_CONTEXT_HEADER, LRA_ENDED_HEADER, LRA_PARENT_HEADER};

use crate::config::ClientConfig;

/// Classified result of a complete or compensate call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotificationOutcome {
    /// The participant finished the requested direction (200, or 410 for
    /// an already-forgotten participant).
    Done,
    /// The participant accepted the call and is still working (202).
    /// Retried by the recovery engine.
    InProgress,
    /// The participant reported a terminal failure for this direction
    /// (409 with a recognizable status body).
    FailedTerminal(ParticipantStatus),
    /// Unreachable, timed out, or unrecognized response. Resolved via the
    /// status endpoint or retried; never treated as failure.
    Ambiguous(String),
}

/// Classified result of a status probe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatusProbe {
    /// The participant reported its current status.
    Reported(ParticipantStatus),
    /// The participant is still determining its status (202).
    Undetermined,
    /// The participant already finished and forgot the LRA (410);
    /// treated as success for the direction in flight.
    Finished,
    /// The status endpoint could not be reached.
    Unreachable(String),
}

/// Stateless HTTP client for participant callbacks.
pub struct ParticipantClient {
    config: ClientConfig,
    http: reqwest::Client,
}

impl ParticipantClient {
    /// Create a new client with bounded timeouts from the configuration.
    pub fn new(config: ClientConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .connect_timeout(config.connect_timeout)
            .build()
            .map_err(|e| LraError::Internal(format!("failed to build http client: {e}")))?;

        Ok(Self { config, http })
    }

    /// Deliver a complete or compensate notification.
    ///
    /// A participant lacking the callback for the requested direction is
    /// vacuously done. Callbacks must be idempotent; delivery is
    /// at-least-once.
    #[instrument(skip(self, participant), fields(lra_id = %participant.lra_id, direction = %direction))]
    pub async fn notify(
        &self,
        participant: &Participant,
        direction: Direction,
        parent_id: Option<LraId>,
    ) -> NotificationOutcome {
        let Some(url) = participant.endpoints.for_direction(direction) else {
            debug!("participant lacks {direction} callback, vacuously done");
            return NotificationOutcome::Done;
        };

        let mut request = self
            .http
            .put(url)
            .header(
                LRA_CONTEXT_HEADER,
                participant.lra_id.to_uri(&self.config.lra_base_url),
            )
            .body(participant.user_data.clone().unwrap_or_default());

        if let Some(parent) = parent_id {
            request = request.header(LRA_PARENT_HEADER, parent.to_uri(&self.config.lra_base_url));
        }

        let response = match request.send().await {
            Ok(response) => response,
            Err(e) => {
                warn!(url, error = %e, "{direction} call failed to reach participant");
                return NotificationOutcome::Ambiguous(e.to_string());
            }
        };

        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        self.classify_notification(direction, status, &body)
    }

    fn classify_notification(
        &self,
        direction: Direction,
        status: StatusCode,
        body: &str,
    ) -> NotificationOutcome {
        match status {
            StatusCode::OK => {
                // A final-state body is optional on 200.
                match ParticipantStatus::from_str(body) {
                    Ok(reported) if reported == direction.failure() => {
                        NotificationOutcome::FailedTerminal(reported)
                    }
                    _ => NotificationOutcome::Done,
                }
            }
            StatusCode::GONE => NotificationOutcome::Done,
            StatusCode::ACCEPTED => NotificationOutcome::InProgress,
            StatusCode::CONFLICT => match ParticipantStatus::from_str(body) {
                Ok(reported) if reported.is_failed() => {
                    NotificationOutcome::FailedTerminal(reported)
                }
                _ => NotificationOutcome::Ambiguous(format!(
                    "409 with unrecognized body: {body:?}"
                )),
            },
            other => NotificationOutcome::Ambiguous(format!("unexpected response: {other}")),
        }
    }

    /// Probe a participant's status endpoint to resolve ambiguous state.
    #[instrument(skip(self, participant), fields(lra_id = %participant.lra_id))]
    pub async fn probe_status(&self, participant: &Participant) -> StatusProbe {
        let Some(url) = participant.endpoints.status.as_deref() else {
            return StatusProbe::Undetermined;
        };

        let request = self.http.get(url).header(
            LRA_CONTEXT_HEADER,
            participant.lra_id.to_uri(&self.config.lra_base_url),
        );

        let response = match request.send().await {
            Ok(response) => response,
            Err(e) => {
                warn!(url, error = %e, "status probe failed to reach participant");
                return StatusProbe::Unreachable(e.to_string());
            }
        };

        match response.status() {
            StatusCode::OK => {
                let body = response.text().await.unwrap_or_default();
                match ParticipantStatus::from_str(&body) {
                    Ok(reported) => StatusProbe::Reported(reported),
                    Err(_) => {
                        warn!(url, body, "status probe returned unparseable body");
                        StatusProbe::Undetermined
                    }
                }
            }
            StatusCode::ACCEPTED => StatusProbe::Undetermined,
            StatusCode::GONE => StatusProbe::Finished,
            other => StatusProbe::Unreachable(format!("unexpected response: {other}")),
        }
    }

    /// Acknowledge a failed participant so it can discard its state.
    /// Returns true once the participant confirms (200 or 410).
    #[instrument(skip(self, participant), fields(lra_id = %participant.lra_id))]
    pub async fn forget(&self, participant: &Participant) -> bool {
        let Some(url) = participant.endpoints.forget.as_deref() else {
            // Nothing to acknowledge.
            return true;
        };

        let request = self.http.delete(url).header(
            LRA_CONTEXT_HEADER,
            participant.lra_id.to_uri(&self.config.lra_base_url),
        );

        match request.send().await {
            Ok(response) => matches!(response.status(), StatusCode::OK | StatusCode::GONE),
            Err(e) => {
                warn!(url, error = %e, "forget call failed to reach participant");
                false
            }
        }
    }

    /// Notify an after-LRA listener that the LRA has ended. Returns true
    /// once delivered (200 or 410).
    #[instrument(skip(self))]
    pub async fn notify_after(&self, url: &str, lra_id: LraId, final_status: LraStatus) -> bool {
        let request = self
            .http
            .put(url)
            .header(LRA_ENDED_HEADER, lra_id.to_uri(&self.config.lra_base_url))
            .body(final_status.to_string());

        match request.send().await {
            Ok(response) => matches!(response.status(), StatusCode::OK | StatusCode::GONE),
            Err(e) => {
                warn!(url, error = %e, "after-LRA notification failed to reach listener");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lra_common::ParticipantEndpoints;
    use wiremock::matchers::{header_exists, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn create_test_client() -> ParticipantClient {
        ParticipantClient::new(ClientConfig::default()).unwrap()
    }

    fn create_test_participant(base: &str) -> Participant {
        Participant::new(
            LraId::new(),
            ParticipantEndpoints {
                compensate: Some(format!("{base}/compensate")),
                complete: Some(format!("{base}/complete")),
                status: Some(format!("{base}/status")),
                forget: Some(format!("{base}/forget")),
                ..Default::default()
            },
        )
    }

    #[tokio::test]
    async fn test_200_classifies_done() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/complete"))
            .and(header_exists(LRA_CONTEXT_HEADER))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let client = create_test_client();
        let participant = create_test_participant(&server.uri());
        let outcome = client.notify(&participant, Direction::Complete, None).await;
        assert_eq!(outcome, NotificationOutcome::Done);
    }

    #[tokio::test]
    async fn test_410_classifies_done() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/compensate"))
            .respond_with(ResponseTemplate::new(410))
            .mount(&server)
            .await;

        let client = create_test_client();
        let participant = create_test_participant(&server.uri());
        let outcome = client
            .notify(&participant, Direction::Compensate, None)
            .await;
        assert_eq!(outcome, NotificationOutcome::Done);
    }

    #[tokio::test]
    async fn test_202_classifies_in_progress() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/complete"))
            .respond_with(ResponseTemplate::new(202))
            .mount(&server)
            .await;

        let client = create_test_client();
        let participant = create_test_participant(&server.uri());
        let outcome = client.notify(&participant, Direction::Complete, None).await;
        assert_eq!(outcome, NotificationOutcome::InProgress);
    }

    #[tokio::test]
    async fn test_409_with_status_body_classifies_terminal_failure() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/compensate"))
            .respond_with(ResponseTemplate::new(409).set_body_string("FailedToCompensate"))
            .mount(&server)
            .await;

        let client = create_test_client();
        let participant = create_test_participant(&server.uri());
        let outcome = client
            .notify(&participant, Direction::Compensate, None)
            .await;
        assert_eq!(
            outcome,
            NotificationOutcome::FailedTerminal(ParticipantStatus::FailedToCompensate)
        );
    }

    #[tokio::test]
    async fn test_409_with_garbage_body_classifies_ambiguous() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/complete"))
            .respond_with(ResponseTemplate::new(409).set_body_string("not-a-status"))
            .mount(&server)
            .await;

        let client = create_test_client();
        let participant = create_test_participant(&server.uri());
        let outcome = client.notify(&participant, Direction::Complete, None).await;
        assert!(matches!(outcome, NotificationOutcome::Ambiguous(_)));
    }

    #[tokio::test]
    async fn test_unreachable_participant_classifies_ambiguous() {
        let client = create_test_client();
        // Port 9 (discard) is not listening.
        let participant = create_test_participant("http://127.0.0.1:9");
        let outcome = client.notify(&participant, Direction::Complete, None).await;
        assert!(matches!(outcome, NotificationOutcome::Ambiguous(_)));
    }

    #[tokio::test]
    async fn test_missing_capability_is_vacuously_done() {
        let client = create_test_client();
        let mut participant = create_test_participant("http://127.0.0.1:9");
        participant.endpoints.complete = None;
        let outcome = client.notify(&participant, Direction::Complete, None).await;
        assert_eq!(outcome, NotificationOutcome::Done);
    }

    #[tokio::test]
    async fn test_status_probe_reported() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/status"))
            .respond_with(ResponseTemplate::new(200).set_body_string("Compensated"))
            .mount(&server)
            .await;

        let client = create_test_client();
        let participant = create_test_participant(&server.uri());
        let probe = client.probe_status(&participant).await;
        assert_eq!(probe, StatusProbe::Reported(ParticipantStatus::Compensated));
    }

    #[tokio::test]
    async fn test_status_probe_gone_means_finished() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/status"))
            .respond_with(ResponseTemplate::new(410))
            .mount(&server)
            .await;

        let client = create_test_client();
        let participant = create_test_participant(&server.uri());
        assert_eq!(client.probe_status(&participant).await, StatusProbe::Finished);
    }

    #[tokio::test]
    async fn test_forget() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(path("/forget"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let client = create_test_client();
        let participant = create_test_participant(&server.uri());
        assert!(client.forget(&participant).await);
    }

    #[tokio::test]
    async fn test_notify_after_carries_ended_header() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/after"))
            .and(header_exists(LRA_ENDED_HEADER))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let client = create_test_client();
        let url = format!("{}/after", server.uri());
        assert!(
            client
                .notify_after(&url, LraId::new(), LraStatus::Closed)
                .await
        );
    }
}
