// src/core/events.rs — Provider webhook events as a closed enum
//
// The provider delivers a JSON envelope `{type, ...}`. Parsing maps the known
// kinds onto variants and everything else onto Unrecognized, which the
// processor accepts and ignores so unknown event types never feed the
// provider's retry loop.

use serde_json::Value;

use crate::infra::errors::ParleyError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallEvent {
    SessionStarted {
        meeting_id: String,
    },
    ParticipantLeft {
        meeting_id: String,
        user_id: String,
    },
    SessionEnded {
        meeting_id: String,
    },
    TranscriptionReady {
        meeting_id: String,
        url: String,
    },
    RecordingReady {
        meeting_id: String,
        url: String,
    },
    ChatMessage {
        meeting_id: String,
        author_id: String,
        text: String,
    },
    Unrecognized {
        event_type: String,
    },
}

impl CallEvent {
    /// Parse a webhook envelope. Unknown types parse successfully as
    /// `Unrecognized`; known types with missing fields are Validation errors
    /// (the provider sent a malformed payload, not a new kind of event).
    pub fn parse(payload: &Value) -> Result<CallEvent, ParleyError> {
        let event_type = payload
            .get("type")
            .and_then(Value::as_str)
            .ok_or_else(|| ParleyError::Validation("missing event type".into()))?;

        match event_type {
            "call.session_started" => Ok(CallEvent::SessionStarted {
                meeting_id: meeting_id_from_custom(payload)?,
            }),
            "call.session_participant_left" => Ok(CallEvent::ParticipantLeft {
                meeting_id: meeting_id_from_cid(payload)?,
                user_id: string_at(payload, &["participant", "user", "id"])?,
            }),
            "call.session_ended" => Ok(CallEvent::SessionEnded {
                meeting_id: meeting_id_from_custom(payload)?,
            }),
            "call.transcription_ready" => Ok(CallEvent::TranscriptionReady {
                meeting_id: meeting_id_from_cid(payload)?,
                url: string_at(payload, &["call_transcription", "url"])?,
            }),
            "call.recording_ready" => Ok(CallEvent::RecordingReady {
                meeting_id: meeting_id_from_cid(payload)?,
                url: string_at(payload, &["call_recording", "url"])?,
            }),
            "message.new" => Ok(CallEvent::ChatMessage {
                meeting_id: meeting_id_from_cid(payload)?,
                author_id: string_at(payload, &["user", "id"])?,
                text: string_at(payload, &["message", "text"])?,
            }),
            other => Ok(CallEvent::Unrecognized {
                event_type: other.to_string(),
            }),
        }
    }
}

/// Events about a call carry the meeting id in the call's custom metadata.
fn meeting_id_from_custom(payload: &Value) -> Result<String, ParleyError> {
    string_at(payload, &["call", "custom", "meeting_id"])
        .map_err(|_| ParleyError::Validation("missing meeting id".into()))
}

/// Other events carry a call cid of the form `<call_type>:<meeting_id>`.
fn meeting_id_from_cid(payload: &Value) -> Result<String, ParleyError> {
    let cid = string_at(payload, &["call_cid"]).or_else(|_| string_at(payload, &["cid"]))?;
    cid.split(':')
        .nth(1)
        .filter(|id| !id.is_empty())
        .map(str::to_string)
        .ok_or_else(|| ParleyError::Validation(format!("malformed call cid '{cid}'")))
}

fn string_at(payload: &Value, path: &[&str]) -> Result<String, ParleyError> {
    let mut cursor = payload;
    for key in path {
        cursor = cursor
            .get(key)
            .ok_or_else(|| ParleyError::Validation(format!("missing field '{}'", path.join("."))))?;
    }
    cursor
        .as_str()
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .ok_or_else(|| ParleyError::Validation(format!("missing field '{}'", path.join("."))))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_session_started() {
        let payload = json!({
            "type": "call.session_started",
            "call": { "custom": { "meeting_id": "m-1" } }
        });
        assert_eq!(
            CallEvent::parse(&payload).unwrap(),
            CallEvent::SessionStarted {
                meeting_id: "m-1".into()
            }
        );
    }

    #[test]
    fn test_parse_session_started_without_meeting_id() {
        let payload = json!({
            "type": "call.session_started",
            "call": { "custom": {} }
        });
        assert!(matches!(
            CallEvent::parse(&payload),
            Err(ParleyError::Validation(_))
        ));
    }

    #[test]
    fn test_parse_participant_left_from_cid() {
        let payload = json!({
            "type": "call.session_participant_left",
            "call_cid": "default:m-2",
            "participant": { "user": { "id": "agent-9" } }
        });
        assert_eq!(
            CallEvent::parse(&payload).unwrap(),
            CallEvent::ParticipantLeft {
                meeting_id: "m-2".into(),
                user_id: "agent-9".into()
            }
        );
    }

    #[test]
    fn test_parse_transcription_ready() {
        let payload = json!({
            "type": "call.transcription_ready",
            "call_cid": "default:m-3",
            "call_transcription": { "url": "https://cdn.example.com/t.jsonl" }
        });
        assert_eq!(
            CallEvent::parse(&payload).unwrap(),
            CallEvent::TranscriptionReady {
                meeting_id: "m-3".into(),
                url: "https://cdn.example.com/t.jsonl".into()
            }
        );
    }

    #[test]
    fn test_parse_chat_message() {
        let payload = json!({
            "type": "message.new",
            "cid": "messaging:m-4",
            "user": { "id": "user-7" },
            "message": { "text": "what did we decide?" }
        });
        assert_eq!(
            CallEvent::parse(&payload).unwrap(),
            CallEvent::ChatMessage {
                meeting_id: "m-4".into(),
                author_id: "user-7".into(),
                text: "what did we decide?".into()
            }
        );
    }

    #[test]
    fn test_unknown_type_is_unrecognized_not_error() {
        let payload = json!({ "type": "call.reaction_added" });
        assert_eq!(
            CallEvent::parse(&payload).unwrap(),
            CallEvent::Unrecognized {
                event_type: "call.reaction_added".into()
            }
        );
    }

    #[test]
    fn test_missing_type_is_validation_error() {
        let payload = json!({ "call_cid": "default:m-5" });
        assert!(matches!(
            CallEvent::parse(&payload),
            Err(ParleyError::Validation(_))
        ));
    }

    #[test]
    fn test_malformed_cid() {
        let payload = json!({
            "type": "call.recording_ready",
            "call_cid": "no-separator",
            "call_recording": { "url": "https://cdn.example.com/r.mp4" }
        });
        assert!(matches!(
            CallEvent::parse(&payload),
            Err(ParleyError::Validation(_))
        ));
    }
}
