//! Control link state

use std::fmt;

use serde::{Deserialize, Serialize};

/// Whether remote commands may be attempted
///
/// There is no persisted "connecting" state: reconnection is a single
/// inline attempt on the slow cadence.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum LinkState {
    #[default]
    Disconnected = 0,
    Connected = 1,
}

impl LinkState {
    #[inline]
    pub fn is_connected(self) -> bool {
        matches!(self, LinkState::Connected)
    }

    #[inline]
    pub fn to_byte(self) -> u8 {
        self as u8
    }

    #[inline]
    pub fn from_byte(b: u8) -> Self {
        if b == LinkState::Connected as u8 {
            LinkState::Connected
        } else {
            LinkState::Disconnected
        }
    }
}

impl fmt::Display for LinkState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LinkState::Disconnected => f.write_str("disconnected"),
            LinkState::Connected => f.write_str("connected"),
        }
    }
}
