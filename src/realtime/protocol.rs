//! Wire format of the real-time channel. Every frame is a JSON object of the
//! form `{"event": "<kebab-case name>", "data": {...}}`.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    error::HelplineError,
    models::{ChatMessage, HelpRequest, HelpRequestDraft, PsychiatristKey},
};

use super::lifecycle::HelpRequestState;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PresenceSignal {
    pub psychiatrist_key: PsychiatristKey,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatSignal {
    pub text: String,
}

/// Client to server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "kebab-case")]
pub enum ClientSignal {
    AnnounceOnline(PresenceSignal),
    AnnounceOffline(PresenceSignal),
    SubmitHelpRequest(HelpRequestDraft),
    SendChatMessage(ChatSignal),
}

impl ClientSignal {
    pub fn parse(frame: &[u8]) -> Result<Self, HelplineError> {
        let signal: Self =
            serde_json::from_slice(frame).map_err(|e| HelplineError::MalformedSignal(e.to_string()))?;

        match &signal {
            Self::AnnounceOnline(p) | Self::AnnounceOffline(p) if p.psychiatrist_key.as_str().is_empty() => {
                return Err(HelplineError::MalformedSignal("psychiatristKey must not be empty".into()));
            }
            Self::SubmitHelpRequest(draft) => draft.validate()?,
            _ => {}
        }
        Ok(signal)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusChange {
    pub psychiatrist_key: PsychiatristKey,
    pub online: bool,
}

/// Reply sent to whoever submitted a help request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeliveryReport {
    pub request_id: Uuid,
    pub state: HelpRequestState,
    pub message: String,
}

/// Server to client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "kebab-case")]
pub enum ServerEvent {
    StatusChanged(StatusChange),
    HelpRequestReceived(HelpRequest),
    ChatMessage(ChatMessage),
    HelpRequestResult(DeliveryReport),
}

impl ServerEvent {
    pub fn name(&self) -> &'static str {
        match self {
            Self::StatusChanged(_) => "status-changed",
            Self::HelpRequestReceived(_) => "help-request-received",
            Self::ChatMessage(_) => "chat-message",
            Self::HelpRequestResult(_) => "help-request-result",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_announce_online() {
        let signal = ClientSignal::parse(br#"{"event":"announce-online","data":{"psychiatristKey":"doc-1"}}"#).unwrap();
        assert_eq!(
            signal,
            ClientSignal::AnnounceOnline(PresenceSignal { psychiatrist_key: "doc-1".into() })
        );
    }

    #[test]
    fn parses_help_request() {
        let signal = ClientSignal::parse(
            br#"{"event":"submit-help-request","data":{"name":"Ann","contact":"a@x.com","description":"anxious","targetKey":"doc-1"}}"#,
        )
        .unwrap();
        let ClientSignal::SubmitHelpRequest(draft) = signal else {
            panic!("wrong variant");
        };
        assert_eq!(draft.target_key, Some("doc-1".into()));
    }

    #[test]
    fn missing_fields_are_malformed() {
        for frame in [
            &br#"{"event":"announce-online","data":{}}"#[..],
            br#"{"event":"send-chat-message"}"#,
            br#"{"event":"submit-help-request","data":{"name":"Ann"}}"#,
            br#"{"event":"dance","data":{}}"#,
            b"not json",
        ] {
            assert!(matches!(
                ClientSignal::parse(frame),
                Err(HelplineError::MalformedSignal(_))
            ));
        }
    }

    #[test]
    fn empty_key_and_invalid_draft_are_malformed() {
        assert!(ClientSignal::parse(br#"{"event":"announce-offline","data":{"psychiatristKey":""}}"#).is_err());
        assert!(ClientSignal::parse(
            br#"{"event":"submit-help-request","data":{"name":"Ann","contact":"nope","description":"anxious"}}"#
        )
        .is_err());
    }

    #[test]
    fn server_event_wire_shape() {
        let event = ServerEvent::StatusChanged(StatusChange { psychiatrist_key: "doc-1".into(), online: true });
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event"], event.name());
        assert_eq!(json["data"]["psychiatristKey"], "doc-1");
        assert_eq!(json["data"]["online"], true);

        let event = ServerEvent::ChatMessage(ChatMessage { text: "hi".into(), sender: "Calm Owl".into() });
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event"], "chat-message");
        assert_eq!(json["data"]["sender"], "Calm Owl");
    }
}
