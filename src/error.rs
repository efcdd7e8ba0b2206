use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// The engine's last-error code, mapped to a kind.
///
/// Codes 0–9 are the ones the SDK documents. Anything else is preserved
/// in [`NativeErrorKind::Unknown`] so callers can still log it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NativeErrorKind {
    /// No error detected.
    Ok,
    /// Out of memory.
    Memory,
    /// The Everything search client is not running.
    Ipc,
    /// Unable to register the reply window class.
    RegisterClassEx,
    /// Unable to create the listening window.
    CreateWindow,
    /// Unable to create the listening thread.
    CreateThread,
    /// Invalid result index.
    InvalidIndex,
    /// Invalid call.
    InvalidCall,
    /// A result attribute was read without requesting it first.
    InvalidRequest,
    /// Bad parameter.
    InvalidParameter,
    /// Any code outside 0–9.
    Unknown(u32),
}

impl NativeErrorKind {
    /// Map a raw code from `Everything_GetLastError`. Never fails.
    pub fn from_code(code: u32) -> Self {
        match code {
            0 => Self::Ok,
            1 => Self::Memory,
            2 => Self::Ipc,
            3 => Self::RegisterClassEx,
            4 => Self::CreateWindow,
            5 => Self::CreateThread,
            6 => Self::InvalidIndex,
            7 => Self::InvalidCall,
            8 => Self::InvalidRequest,
            9 => Self::InvalidParameter,
            other => Self::Unknown(other),
        }
    }

    /// The raw code this kind was mapped from.
    pub fn code(&self) -> u32 {
        match self {
            Self::Ok               => 0,
            Self::Memory           => 1,
            Self::Ipc              => 2,
            Self::RegisterClassEx  => 3,
            Self::CreateWindow     => 4,
            Self::CreateThread     => 5,
            Self::InvalidIndex     => 6,
            Self::InvalidCall      => 7,
            Self::InvalidRequest   => 8,
            Self::InvalidParameter => 9,
            Self::Unknown(code)    => *code,
        }
    }

    pub fn is_ok(&self) -> bool {
        matches!(self, Self::Ok)
    }
}

impl std::fmt::Display for NativeErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Ok               => f.write_str("ok"),
            Self::Memory           => f.write_str("out of memory"),
            Self::Ipc              => f.write_str("ipc failure"),
            Self::RegisterClassEx  => f.write_str("unable to register window class"),
            Self::CreateWindow     => f.write_str("unable to create listening window"),
            Self::CreateThread     => f.write_str("unable to create listening thread"),
            Self::InvalidIndex     => f.write_str("invalid index"),
            Self::InvalidCall      => f.write_str("invalid call"),
            Self::InvalidRequest   => f.write_str("invalid request"),
            Self::InvalidParameter => f.write_str("invalid parameter"),
            Self::Unknown(code)    => write!(f, "unknown error code {code}"),
        }
    }
}

#[derive(Error, Debug)]
pub enum EverythingError {
    // Waiting
    #[error("index not loaded after {waited:?}")]
    Timeout { waited: Duration },

    #[error("wait cancelled")]
    Cancelled,

    // Native failures
    #[error("native call failed: {0}")]
    Native(NativeErrorKind),

    // Loading
    #[error("failed to load {path}")]
    Library {
        path: PathBuf,
        #[source]
        source: libloading::Error,
    },

    #[error("missing symbol {name}")]
    MissingSymbol {
        name: &'static str,
        #[source]
        source: libloading::Error,
    },

    #[error("an Everything session is already open in this process")]
    SessionActive,
}

impl EverythingError {
    /// The native kind carried by this error, if it came from the engine.
    pub fn native_kind(&self) -> Option<NativeErrorKind> {
        match self {
            Self::Native(kind) => Some(*kind),
            _ => None,
        }
    }

    /// A short, user-facing hint on how to resolve the error.
    pub fn hint(&self) -> String {
        match self {
            Self::Native(NativeErrorKind::Ipc) => {
                "Connection to the Everything service failed. \
                 Make sure the Everything application is running and try again."
                    .to_string()
            }
            Self::Native(NativeErrorKind::Memory) => {
                "Out of memory. The system might be low on resources.".to_string()
            }
            Self::Timeout { .. } => {
                "The Everything database is still loading or the service is busy. \
                 Try again later."
                    .to_string()
            }
            Self::Library { path, .. } => format!(
                "Could not load {}. Point EVERYTHING_SDK_DLL at the SDK library.",
                path.display()
            ),
            _ => self.to_string(),
        }
    }
}

pub type Result<T, E = EverythingError> = std::result::Result<T, E>;
