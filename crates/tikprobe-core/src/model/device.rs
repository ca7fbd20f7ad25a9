// ── Device identity and credentials ──

use secrecy::{ExposeSecret, SecretString};

/// Identity of a monitored router.
///
/// `name` is the registry key and stays stable across reloads. A change
/// of address or API port produces a new descriptor; descriptors are
/// never edited in place.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DeviceDescriptor {
    pub name: String,
    pub address: String,
    pub api_port: u16,
}

impl DeviceDescriptor {
    pub fn new(name: impl Into<String>, address: impl Into<String>, api_port: u16) -> Self {
        Self {
            name: name.into(),
            address: address.into(),
            api_port,
        }
    }

    /// `address:port` for logs and error messages.
    pub fn endpoint(&self) -> String {
        format!("{}:{}", self.address, self.api_port)
    }
}

/// Process-wide API login shared by every device.
#[derive(Debug, Clone)]
pub struct Credentials {
    pub username: String,
    pub password: SecretString,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: SecretString::from(password.into()),
        }
    }

    /// Compare username and secret. `SecretString` has no `PartialEq`.
    pub fn matches(&self, other: &Self) -> bool {
        self.username == other.username
            && self.password.expose_secret() == other.password.expose_secret()
    }
}
