//! Dispatch of frames from registered connections.

use metrics::counter;
use relay_core::{ClientFrame, ConnectionId, ServerFrame, notices};
use serde_json::Value;
use tracing::debug;

use super::fanout::Fanout;
use super::registry::Registry;
use crate::metrics::MESSAGES_ROUTED_TOTAL;

/// What the router did with one frame.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RouteOutcome {
    /// Public message queued on `recipients` connections.
    Broadcast {
        /// Connections the frame was queued on.
        recipients: usize,
    },
    /// Direct message delivered to `target` and echoed to the sender.
    Delivered {
        /// Recipient nickname.
        target: String,
    },
    /// No open connection holds the target; the sender was notified.
    TargetOffline {
        /// Requested nickname.
        target: String,
    },
    /// Nothing was sent.
    Ignored(IgnoreReason),
}

/// Why a frame produced no delivery.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum IgnoreReason {
    /// The sender holds no session.
    Unregistered,
    /// A `dm` whose `target` or `text` is missing or falsy.
    IncompleteDm,
    /// A second `register_nickname` from a registered connection.
    AlreadyRegistered,
    /// A `type` the relay does not handle.
    UnknownType,
}

/// Route one decoded frame from `sender`.
pub fn route(
    fanout: &Fanout,
    registry: &Registry,
    sender: ConnectionId,
    frame: ClientFrame,
) -> RouteOutcome {
    let Some(nickname) = registry.nickname_of(sender) else {
        return RouteOutcome::Ignored(IgnoreReason::Unregistered);
    };

    let outcome = match frame {
        ClientFrame::Message { text } => {
            let out = ServerFrame::Message {
                sender: nickname.to_owned(),
                text,
            };
            let recipients = fanout.broadcast(&out);
            debug!(conn_id = %sender, nickname, recipients, "broadcast message");
            RouteOutcome::Broadcast { recipients }
        }
        ClientFrame::DirectMessage { target, text } => {
            match (target.filter(is_truthy), text.filter(is_truthy)) {
                (Some(Value::String(target)), Some(text)) => {
                    direct(fanout, registry, sender, nickname, target, text)
                }
                // A non-string target never matches a nickname.
                (Some(target), Some(_)) => offline(fanout, sender, nickname, target.to_string()),
                _ => RouteOutcome::Ignored(IgnoreReason::IncompleteDm),
            }
        }
        ClientFrame::RegisterNickname { .. } => {
            RouteOutcome::Ignored(IgnoreReason::AlreadyRegistered)
        }
        ClientFrame::Unknown => RouteOutcome::Ignored(IgnoreReason::UnknownType),
    };

    counter!(MESSAGES_ROUTED_TOTAL, "kind" => outcome.label()).increment(1);
    outcome
}

fn direct(
    fanout: &Fanout,
    registry: &Registry,
    sender: ConnectionId,
    nickname: &str,
    target: String,
    text: Value,
) -> RouteOutcome {
    let recipient = registry
        .find_by_nickname(&target)
        .filter(|id| fanout.is_open(*id));

    let Some(recipient) = recipient else {
        return offline(fanout, sender, nickname, target);
    };

    let envelope = ServerFrame::DirectMessage {
        sender: nickname.to_owned(),
        target: target.clone(),
        text,
    };
    let _ = fanout.send_to(recipient, &envelope);
    let _ = fanout.send_to(sender, &envelope);
    debug!(conn_id = %sender, nickname, target = %target, "dm delivered");
    RouteOutcome::Delivered { target }
}

fn offline(fanout: &Fanout, sender: ConnectionId, nickname: &str, target: String) -> RouteOutcome {
    let _ = fanout.notify(sender, notices::not_online(&target));
    debug!(conn_id = %sender, nickname, target = %target, "dm target offline");
    RouteOutcome::TargetOffline { target }
}

/// JSON truthiness: `null`, `false`, `0` and `""` are falsy.
fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f.abs() > 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

impl RouteOutcome {
    fn label(&self) -> &'static str {
        match self {
            Self::Broadcast { .. } => "message",
            Self::Delivered { .. } => "dm",
            Self::TargetOffline { .. } => "dm_offline",
            Self::Ignored(_) => "ignored",
        }
    }
}
