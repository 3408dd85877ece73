use std::fmt;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::error::HelplineError;

/// Opaque reference to a registered psychiatrist.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PsychiatristKey(pub String);

impl PsychiatristKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PsychiatristKey {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PsychiatristKey {
    fn from(key: &str) -> Self {
        Self(key.to_owned())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PsychiatristIdentity {
    pub key: PsychiatristKey,
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub online: bool,
}

/// Payload of a psychiatrist registration.
#[derive(Debug, Clone, Deserialize)]
pub struct Registration {
    pub name: String,
    pub email: String,
}

impl Registration {
    pub fn validate(&self) -> Result<(), HelplineError> {
        if self.name.trim().is_empty() {
            return Err(HelplineError::MalformedSignal("name must not be empty".into()));
        }
        if !is_email_shaped(&self.email) {
            return Err(HelplineError::MalformedSignal(format!("{:?} is not an email address", self.email)));
        }
        Ok(())
    }
}

/// What an anonymous requester submits, before the request exists.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HelpRequestDraft {
    pub name: String,
    pub contact: String,
    pub description: String,
    #[serde(default)]
    pub target_key: Option<PsychiatristKey>,
}

impl HelpRequestDraft {
    pub fn validate(&self) -> Result<(), HelplineError> {
        if self.name.trim().is_empty() {
            return Err(HelplineError::MalformedSignal("name must not be empty".into()));
        }
        if self.description.trim().is_empty() {
            return Err(HelplineError::MalformedSignal("description must not be empty".into()));
        }
        if !is_email_shaped(&self.contact) {
            return Err(HelplineError::MalformedSignal(format!("{:?} is not an email address", self.contact)));
        }
        Ok(())
    }

    /// Stamps the draft into an immutable request.
    pub fn into_request(self) -> HelpRequest {
        HelpRequest {
            id: Uuid::now_v7(),
            name: self.name,
            contact: self.contact,
            description: self.description,
            target_key: self.target_key,
            created_at: OffsetDateTime::now_utc(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HelpRequest {
    pub id: Uuid,
    pub name: String,
    pub contact: String,
    pub description: String,
    pub target_key: Option<PsychiatristKey>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

/// Anonymous chat line. Never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub text: String,
    pub sender: String,
}

pub(crate) fn is_email_shaped(s: &str) -> bool {
    if s.chars().any(char::is_whitespace) {
        return false;
    }
    let Some((local, domain)) = s.split_once('@') else {
        return false;
    };
    let Some((host, tld)) = domain.rsplit_once('.') else {
        return false;
    };
    !local.is_empty() && !host.is_empty() && !tld.is_empty() && !domain.contains('@')
}

#[cfg(test)]
mod tests {
    use super::*;

    fn draft() -> HelpRequestDraft {
        HelpRequestDraft {
            name: "Ann".into(),
            contact: "a@x.com".into(),
            description: "anxious".into(),
            target_key: Some("doc-1".into()),
        }
    }

    #[test]
    fn email_shapes() {
        assert!(is_email_shaped("a@x.com"));
        assert!(is_email_shaped("first.last@mail.example.org"));
        assert!(!is_email_shaped("a@x"));
        assert!(!is_email_shaped("@x.com"));
        assert!(!is_email_shaped("a@.com"));
        assert!(!is_email_shaped("a@@x.com"));
        assert!(!is_email_shaped("a b@x.com"));
        assert!(!is_email_shaped(""));
    }

    #[test]
    fn valid_draft_passes() {
        assert!(draft().validate().is_ok());
    }

    #[test]
    fn draft_rejects_blank_fields() {
        let mut d = draft();
        d.name = "  ".into();
        assert!(matches!(d.validate(), Err(HelplineError::MalformedSignal(_))));

        let mut d = draft();
        d.description = String::new();
        assert!(matches!(d.validate(), Err(HelplineError::MalformedSignal(_))));

        let mut d = draft();
        d.contact = "not-an-email".into();
        assert!(matches!(d.validate(), Err(HelplineError::MalformedSignal(_))));
    }

    #[test]
    fn draft_target_is_optional_on_the_wire() {
        let d: HelpRequestDraft =
            serde_json::from_str(r#"{"name":"Ann","contact":"a@x.com","description":"anxious"}"#).unwrap();
        assert_eq!(d.target_key, None);

        let d: HelpRequestDraft = serde_json::from_str(
            r#"{"name":"Ann","contact":"a@x.com","description":"anxious","targetKey":"doc-1"}"#,
        )
        .unwrap();
        assert_eq!(d.target_key, Some(PsychiatristKey::new("doc-1")));
    }

    #[test]
    fn into_request_keeps_fields() {
        let req = draft().into_request();
        assert_eq!(req.name, "Ann");
        assert_eq!(req.contact, "a@x.com");
        assert_eq!(req.description, "anxious");
        assert_eq!(req.target_key, Some(PsychiatristKey::new("doc-1")));

        let json = serde_json::to_value(&req).unwrap();
        assert_eq!(json["targetKey"], "doc-1");
        assert!(json["createdAt"].is_string());
    }

    #[test]
    fn registration_validation() {
        let ok = Registration { name: "Dr. Who".into(), email: "who@tardis.org".into() };
        assert!(ok.validate().is_ok());
        let bad = Registration { name: "".into(), email: "who@tardis.org".into() };
        assert!(bad.validate().is_err());
        let bad = Registration { name: "Dr. Who".into(), email: "who".into() };
        assert!(bad.validate().is_err());
    }
}
