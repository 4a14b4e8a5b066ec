use std::path::PathBuf;
use thiserror::Error;

/// Library result type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while running the relay agent.
#[derive(Error, Debug)]
pub enum Error {
    #[error("connection: {0}")]
    Connection(#[from] ConnectionError),

    #[error("pairing: {0}")]
    Pairing(#[from] PairingError),

    #[error("store: {0}")]
    Store(#[from] StoreError),

    #[error("send: {0}")]
    Send(#[from] SendError),

    #[error("media: {0}")]
    Media(#[from] MediaError),

    #[error("config: {0}")]
    Config(#[from] ConfigError),

    #[error("not connected")]
    NotConnected,

    #[error("owner number is not registered")]
    OwnerUnknown,
}

/// Connection-related errors.
#[derive(Error, Debug)]
pub enum ConnectionError {
    #[error("transport: {0}")]
    Transport(String),

    #[error("liveness server: {0}")]
    Liveness(#[source] std::io::Error),
}

/// Pairing-related errors.
#[derive(Error, Debug)]
pub enum PairingError {
    #[error("invalid device identity HMAC")]
    InvalidDeviceIdentityHmac,

    #[error("invalid device signature")]
    InvalidDeviceSignature,

    #[error("invalid phone number: {0:?}")]
    InvalidPhoneNumber(String),

    #[error("already registered")]
    AlreadyRegistered,

    #[error("prompt: {0}")]
    Prompt(String),

    #[error("protocol: {0}")]
    Protocol(String),
}

/// Credential and owner registry errors.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("save failed for {path}: {source}")]
    Save {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("load failed for {path}: {source}")]
    Load {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("corrupt data in {path}: {source}")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid value: {0}")]
    Value(#[source] serde_json::Error),

    #[error("lock poisoned: {0}")]
    Poisoned(String),
}

/// Send message errors.
#[derive(Error, Debug)]
pub enum SendError {
    #[error("invalid recipient {0:?}")]
    InvalidRecipient(String),

    #[error("empty payload")]
    EmptyPayload,

    #[error("encode: {0}")]
    Encode(#[source] serde_json::Error),

    #[error("server error: {0}")]
    Server(String),
}

/// Media download errors.
#[derive(Error, Debug)]
pub enum MediaError {
    #[error("message carries no downloadable media")]
    NoMedia,

    #[error("download failed: {0}")]
    Download(String),

    #[error("downloaded media is empty")]
    Empty,
}

/// Configuration errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("invalid value for {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}
