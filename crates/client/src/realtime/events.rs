//! Events of the `/dashboard` namespace.

use serde_json::Value;

use zhex_core::{CompanyId, ProductId};

use super::transport::{DisconnectReason, Frame};

pub const SUPPORT_EMAIL_VERIFIED: &str = "support_email_verified";
pub const EMAIL_CHANGED: &str = "email_changed";

pub const JOIN_PRODUCT_ROOM: &str = "join_product_room";
pub const LEAVE_PRODUCT_ROOM: &str = "leave_product_room";
pub const JOIN_COMPANY_ROOM: &str = "join_company_room";

/// A server-emitted event.
#[derive(Debug, Clone, PartialEq)]
pub enum ServerEvent {
    SupportEmailVerified { email: Option<String>, data: Value },
    EmailChanged { email: Option<String>, data: Value },
    Other { event: String, data: Value },
}

impl ServerEvent {
    pub fn name(&self) -> &str {
        match self {
            ServerEvent::SupportEmailVerified { .. } => SUPPORT_EMAIL_VERIFIED,
            ServerEvent::EmailChanged { .. } => EMAIL_CHANGED,
            ServerEvent::Other { event, .. } => event,
        }
    }
}

fn email_of(data: &Value) -> Option<String> {
    ["email", "newEmail"]
        .iter()
        .find_map(|key| data.get(*key).and_then(Value::as_str))
        .map(str::to_string)
}

impl From<Frame> for ServerEvent {
    fn from(frame: Frame) -> Self {
        match frame.event.as_str() {
            SUPPORT_EMAIL_VERIFIED => ServerEvent::SupportEmailVerified {
                email: email_of(&frame.data),
                data: frame.data,
            },
            EMAIL_CHANGED => ServerEvent::EmailChanged {
                email: email_of(&frame.data),
                data: frame.data,
            },
            _ => ServerEvent::Other {
                event: frame.event,
                data: frame.data,
            },
        }
    }
}

/// What subscribers of the channel observe.
#[derive(Debug, Clone, PartialEq)]
pub enum ChannelEvent {
    /// A (re)connect completed. Room memberships are not carried over, so
    /// subscribers re-join their rooms here.
    Connected,
    Disconnected(DisconnectReason),
    /// Automatic reconnects are exhausted (or there is no session to connect with).
    Failed,
    Server(ServerEvent),
}

pub(crate) fn product_room(event: &str, product_id: &ProductId) -> Frame {
    Frame::new(event, serde_json::json!({ "productId": product_id }))
}

pub(crate) fn company_room(company_id: &CompanyId) -> Frame {
    Frame::new(JOIN_COMPANY_ROOM, serde_json::json!({ "companyId": company_id }))
}
