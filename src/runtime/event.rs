use std::collections::BTreeMap;

use bollard::models::EventMessage;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

fn is_zero(val: &i64) -> bool {
    *val == 0
}

/// A lifecycle notification as handed to the handler.
///
/// Field names follow the Engine API. `id`, `status` and `from` are the
/// legacy top-level fields, filled from the actor so scripts written against
/// either shape keep working. Empty fields are omitted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerEvent {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub id: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub status: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub from: String,
    #[serde(rename = "Type", default, skip_serializing_if = "String::is_empty")]
    pub kind: String,
    #[serde(rename = "Action", default, skip_serializing_if = "String::is_empty")]
    pub action: String,
    #[serde(rename = "Actor", default, skip_serializing_if = "EventActor::is_empty")]
    pub actor: EventActor,
    #[serde(default, skip_serializing_if = "is_zero")]
    pub time: i64,
    #[serde(rename = "timeNano", default, skip_serializing_if = "is_zero")]
    pub time_nano: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventActor {
    #[serde(rename = "ID", default, skip_serializing_if = "String::is_empty")]
    pub id: String,
    #[serde(
        rename = "Attributes",
        default,
        skip_serializing_if = "BTreeMap::is_empty"
    )]
    pub attributes: BTreeMap<String, String>,
}

impl EventActor {
    pub fn is_empty(&self) -> bool {
        self.id.is_empty() && self.attributes.is_empty()
    }
}

impl ContainerEvent {
    /// When the engine emitted the event, preferring the nanosecond stamp.
    pub fn timestamp(&self) -> Option<DateTime<Utc>> {
        if self.time_nano != 0 {
            return Some(DateTime::from_timestamp_nanos(self.time_nano));
        }
        if self.time != 0 {
            return DateTime::from_timestamp(self.time, 0);
        }
        None
    }
}

impl From<bollard::models::EventActor> for EventActor {
    fn from(actor: bollard::models::EventActor) -> Self {
        Self {
            id: actor.id.unwrap_or_default(),
            attributes: actor.attributes.unwrap_or_default().into_iter().collect(),
        }
    }
}

impl From<EventMessage> for ContainerEvent {
    fn from(message: EventMessage) -> Self {
        let actor: EventActor = message.actor.map(Into::into).unwrap_or_default();
        let action = message.action.unwrap_or_default();
        let from = actor.attributes.get("image").cloned().unwrap_or_default();

        Self {
            id: actor.id.clone(),
            status: action.clone(),
            from,
            kind: message.typ.map(|t| t.to_string()).unwrap_or_default(),
            action,
            actor,
            time: message.time.unwrap_or_default(),
            time_nano: message.time_nano.unwrap_or_default(),
        }
    }
}

/// Container metadata fetched at dispatch time.
///
/// Held as a JSON document whose object keys are kept sorted, so the same
/// container always serializes to the same bytes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContainerSnapshot(serde_json::Value);

impl ContainerSnapshot {
    pub fn from_inspect<T: Serialize>(document: &T) -> Result<Self, serde_json::Error> {
        serde_json::to_value(document).map(Self)
    }

    pub fn name(&self) -> Option<&str> {
        self.0.get("Name").and_then(serde_json::Value::as_str)
    }
}

impl From<serde_json::Value> for ContainerSnapshot {
    fn from(value: serde_json::Value) -> Self {
        Self(value)
    }
}
