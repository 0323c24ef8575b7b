//! Push notification payloads delivered by a change feed.

use std::fmt;
use std::str::FromStr;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::errors::{GatewayError, GatewayResult};

/// Backend tables the client reads and subscribes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Table {
    Campaigns,
    Donations,
}

impl Table {
    pub fn as_str(&self) -> &'static str {
        match self {
            Table::Campaigns => "campaigns",
            Table::Donations => "donations",
        }
    }
}

impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Table {
    type Err = GatewayError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "campaigns" => Ok(Table::Campaigns),
            "donations" => Ok(Table::Donations),
            other => Err(GatewayError::Decode(format!("Unknown table '{}'", other))),
        }
    }
}

/// Row-level change kinds. `All` is only meaningful as a subscription
/// filter; delivered events always carry a concrete kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ChangeEventType {
    #[serde(rename = "INSERT")]
    Insert,
    #[serde(rename = "UPDATE")]
    Update,
    #[serde(rename = "DELETE")]
    Delete,
    #[serde(rename = "*")]
    All,
}

impl ChangeEventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChangeEventType::Insert => "INSERT",
            ChangeEventType::Update => "UPDATE",
            ChangeEventType::Delete => "DELETE",
            ChangeEventType::All => "*",
        }
    }

    /// Whether a subscription filter of this kind accepts `delivered`.
    pub fn accepts(&self, delivered: ChangeEventType) -> bool {
        *self == ChangeEventType::All || *self == delivered
    }
}

impl FromStr for ChangeEventType {
    type Err = GatewayError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "INSERT" => Ok(ChangeEventType::Insert),
            "UPDATE" => Ok(ChangeEventType::Update),
            "DELETE" => Ok(ChangeEventType::Delete),
            "*" => Ok(ChangeEventType::All),
            other => Err(GatewayError::Decode(format!(
                "Unknown change event type '{}'",
                other
            ))),
        }
    }
}

/// A pushed row change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeEvent {
    pub table: Table,
    pub event_type: ChangeEventType,
    pub new_record: Value,
}

impl ChangeEvent {
    pub fn new(table: Table, event_type: ChangeEventType, new_record: Value) -> Self {
        Self {
            table,
            event_type,
            new_record,
        }
    }

    /// Decodes the pushed row into a typed record.
    pub fn decode<T: DeserializeOwned>(&self) -> GatewayResult<T> {
        serde_json::from_value(self.new_record.clone()).map_err(|e| {
            GatewayError::Decode(format!(
                "{} {} payload: {}",
                self.table,
                self.event_type.as_str(),
                e
            ))
        })
    }
}
