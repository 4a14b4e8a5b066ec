use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Server of personal chat addresses.
pub const DEFAULT_USER_SERVER: &str = "s.whatsapp.net";
const GROUP_SERVER: &str = "g.us";

/// WhatsApp address: `user@server`, or `user:device@server` for one linked device.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Jid {
    pub user: String,
    pub device: Option<u16>,
    pub server: String,
}

#[derive(Debug, thiserror::Error)]
#[error("malformed address {0:?}")]
pub struct JidParseError(String);

impl Jid {
    pub fn new(user: impl Into<String>, server: impl Into<String>) -> Self {
        Self {
            user: user.into(),
            device: None,
            server: server.into(),
        }
    }

    /// Personal chat address for a phone number as typed by a person.
    ///
    /// Everything except ASCII digits is dropped, so `"+1 555-000-1234"`
    /// becomes `15550001234@s.whatsapp.net`. Returns `None` when no digits remain.
    pub fn user_address(phone_number: &str) -> Option<Self> {
        let digits: String = phone_number
            .chars()
            .filter(char::is_ascii_digit)
            .collect();
        (!digits.is_empty()).then(|| Self::new(digits, DEFAULT_USER_SERVER))
    }

    pub fn is_user(&self) -> bool {
        self.server == DEFAULT_USER_SERVER && !self.user.is_empty()
    }

    pub fn is_group(&self) -> bool {
        self.server == GROUP_SERVER && !self.user.is_empty()
    }
}

impl FromStr for Jid {
    type Err = JidParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let malformed = || JidParseError(s.to_string());
        let (local, server) = s.split_once('@').ok_or_else(malformed)?;
        if local.is_empty() || server.is_empty() || server.contains('@') {
            return Err(malformed());
        }
        let (user, device) = match local.split_once(':') {
            Some((user, device)) => (user, Some(device.parse().map_err(|_| malformed())?)),
            None => (local, None),
        };
        Ok(Self {
            user: user.to_string(),
            device,
            server: server.to_string(),
        })
    }
}

impl TryFrom<String> for Jid {
    type Error = JidParseError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<Jid> for String {
    fn from(jid: Jid) -> Self {
        jid.to_string()
    }
}

impl fmt::Display for Jid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.device {
            Some(device) => write!(f, "{}:{}@{}", self.user, device, self.server),
            None => write!(f, "{}@{}", self.user, self.server),
        }
    }
}
