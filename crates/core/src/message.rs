//! Render-channel message protocol.
//!
//! Pushed over WebSocket to clients subscribed to an identifier so they can
//! re-render outside the normal poll cycle.

use serde::{Deserialize, Serialize};

use crate::types::PrincipalId;

/// Messages pushed to subscribers of an identifier.
///
/// Serialized as JSON with an internally-tagged `"type"` discriminator so
/// that the frontend can route messages by type string.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type")]
pub enum PresenceMessage {
    /// Control moved to another viewer through an explicit request.
    #[serde(rename = "control.changed")]
    ControlChanged {
        identifier: String,
        controller_id: Option<PrincipalId>,
        controller_guard: Option<String>,
        controller_name: Option<String>,
    },

    /// The receiving viewer was granted control by a refresh and must
    /// re-render now.
    #[serde(rename = "presence.rerender")]
    Rerender { identifier: String, has_control: bool },
}

impl PresenceMessage {
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_control_changed_tag() {
        let msg = PresenceMessage::ControlChanged {
            identifier: "post:1".to_string(),
            controller_id: Some("7".to_string()),
            controller_guard: Some("web".to_string()),
            controller_name: Some("Ada".to_string()),
        };
        let json = msg.to_json().unwrap();
        assert!(json.contains(r#""type":"control.changed""#));

        let back: PresenceMessage = serde_json::from_str(&json).unwrap();
        assert_eq!(back, msg);
    }

    #[test]
    fn test_rerender_tag() {
        let msg = PresenceMessage::Rerender {
            identifier: "post".to_string(),
            has_control: true,
        };
        let json = msg.to_json().unwrap();
        assert!(json.contains(r#""type":"presence.rerender""#));
        assert!(json.contains(r#""has_control":true"#));
    }
}
