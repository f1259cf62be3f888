//! Type-safe device identifier.
//!
//! [`DeviceId`] is a newtype wrapper around the string identifier a device
//! reports (e.g. `"ESP32_001"`), so device identifiers cannot be confused
//! with owner identifiers, stream keys, or other free-form strings.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::BridgeError;

/// Stable identifier of a physical device.
///
/// Used as the document key in the [`crate::store::DocumentStore`], the
/// event discriminator on the bus, and the WebSocket subscription target.
/// Deserialization goes through [`DeviceId::parse`], so stored documents
/// and request bodies obey the same rules as path parameters.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DeviceId(String);

impl DeviceId {
    /// Creates a `DeviceId` from a raw identifier, trimming whitespace.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::InvalidRequest`] if the identifier is empty
    /// after trimming.
    pub fn parse(raw: &str) -> Result<Self, BridgeError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(BridgeError::InvalidRequest(
                "device identifier must not be empty".to_string(),
            ));
        }
        Ok(Self(trimmed.to_string()))
    }

    /// Returns the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for DeviceId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for DeviceId {
    type Error = BridgeError;

    fn try_from(raw: String) -> Result<Self, Self::Error> {
        Self::parse(&raw)
    }
}

impl From<DeviceId> for String {
    fn from(id: DeviceId) -> Self {
        id.0
    }
}
