//! The coded error catalog shared by every revstore crate.
//!
//! Every failure raised by the storage layer carries a stable numeric
//! [`ErrorCode`] and a message rendered from that code's template. Codes are
//! partitioned by subsystem so callers can branch on [`StorError::code`]
//! instead of matching strings:
//!
//! - `10000xxx` -- generic storage I/O
//! - `100010xx` -- backend factory and mount configuration
//! - `1000110x` -- the save path
//! - `1000112x` -- the load path

use std::fmt;

use thiserror::Error;

/// Boxed error used for causes coming from backends, codecs and hooks.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Result alias used throughout revstore.
pub type StorResult<T> = Result<T, StorError>;

/// Stable numeric error codes.
///
/// The discriminant of each variant is its wire/log code and never changes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u32)]
pub enum ErrorCode {
    // Generic storage
    KeyNotFound = 10_000_000,
    FileIo = 10_000_002,
    Mkdir = 10_000_003,
    InvalidKey = 10_000_004,
    Compress = 10_000_005,
    Decompress = 10_000_006,
    NoIntactCopy = 10_000_007,
    Cancelled = 10_000_008,

    // Factory
    GeneratorLockWait = 10_001_000,
    StorageTypeNotFound = 10_001_001,
    MountNotFound = 10_001_002,
    ConfigRead = 10_001_010,
    ConfigParse = 10_001_011,

    // Save path
    SaveStorageMissing = 10_001_100,
    SaveStoreLock = 10_001_101,
    SaveDataReadLock = 10_001_102,
    SaveToBytes = 10_001_103,
    SaveBeforeGetData = 10_001_104,
    SaveBeforeSave = 10_001_105,
    SaveAfterSave = 10_001_106,
    SaveWrite = 10_001_107,

    // Load path
    LoadStorageMissing = 10_001_120,
    LoadKeyMissing = 10_001_121,
    LoadStoreLock = 10_001_122,
    LoadExists = 10_001_123,
    LoadGet = 10_001_124,
    LoadFromBytes = 10_001_125,
    LoadDataLock = 10_001_126,
    LoadFillCheck = 10_001_127,
}

impl ErrorCode {
    /// Every code in the catalog, in ascending numeric order.
    pub const ALL: [ErrorCode; 29] = [
        Self::KeyNotFound,
        Self::FileIo,
        Self::Mkdir,
        Self::InvalidKey,
        Self::Compress,
        Self::Decompress,
        Self::NoIntactCopy,
        Self::Cancelled,
        Self::GeneratorLockWait,
        Self::StorageTypeNotFound,
        Self::MountNotFound,
        Self::ConfigRead,
        Self::ConfigParse,
        Self::SaveStorageMissing,
        Self::SaveStoreLock,
        Self::SaveDataReadLock,
        Self::SaveToBytes,
        Self::SaveBeforeGetData,
        Self::SaveBeforeSave,
        Self::SaveAfterSave,
        Self::SaveWrite,
        Self::LoadStorageMissing,
        Self::LoadKeyMissing,
        Self::LoadStoreLock,
        Self::LoadExists,
        Self::LoadGet,
        Self::LoadFromBytes,
        Self::LoadDataLock,
        Self::LoadFillCheck,
    ];

    /// The stable numeric value of this code.
    pub const fn as_u32(self) -> u32 {
        self as u32
    }

    /// Message template; each `{}` is replaced by the next argument.
    pub const fn template(self) -> &'static str {
        match self {
            Self::KeyNotFound => "Storage: key `{}` not found",
            Self::FileIo => "File: error: `{}`",
            Self::Mkdir => "Mkdir error: path: `{}`",
            Self::InvalidKey => "Storage: invalid key `{}`",
            Self::Compress => "Compress: `{}` compression of `{}` fail",
            Self::Decompress => "Compress: `{}` decompression of `{}` fail",
            Self::NoIntactCopy => "DoubleSave: no intact copy of `{}`",
            Self::Cancelled => "Storage: `{}` of `{}` cancelled",

            Self::GeneratorLockWait => "Generator.Create: Lock mutex fail wait",
            Self::StorageTypeNotFound => "Generator.Create: storage type `{}` is not exists",
            Self::MountNotFound => "Generator.Create: mount `{}` is not exists",
            Self::ConfigRead => "Generator: read config `{}` fail",
            Self::ConfigParse => "Generator: parse config `{}` fail",

            Self::SaveStorageMissing => "SaveExtend: Storage is nil",
            Self::SaveStoreLock => "SaveExtend: Storable StorLock fail",
            Self::SaveDataReadLock => "SaveExtend: Storable DataRLock fail",
            Self::SaveToBytes => "SaveExtend: Storable ToBytes fail",
            Self::SaveBeforeGetData => "SaveExtend: doBeforeGetData fail",
            Self::SaveBeforeSave => "SaveExtend: doBeforeSave fail",
            Self::SaveAfterSave => "SaveExtend: doAfterSave fail",
            Self::SaveWrite => "SaveExtend: Storage Save to storage `{}` fail",

            Self::LoadStorageMissing => "LoadIfExists: Storage is nil",
            Self::LoadKeyMissing => "Load: File `{}` does not exists",
            Self::LoadStoreLock => "LoadIfExists: Storable StorLock fail",
            Self::LoadExists => "LoadIfExists: Storage check file `{}` exists fail",
            Self::LoadGet => "LoadIfExists: Storage get file `{}` fail",
            Self::LoadFromBytes => "LoadIfExists: Storable FromBytes from file `{}` fail",
            Self::LoadDataLock => "LoadIfExists: Storable DataLock fail",
            Self::LoadFillCheck => "LoadIfExists: doFill Check fail",
        }
    }

    /// Returns `true` for codes raised when a lock wait ran out of scope.
    pub const fn is_lock_wait(self) -> bool {
        matches!(
            self,
            Self::GeneratorLockWait
                | Self::SaveStoreLock
                | Self::SaveDataReadLock
                | Self::LoadStoreLock
                | Self::LoadDataLock
        )
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_u32())
    }
}

/// A numeric code that is not part of the catalog.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("unknown error code: {0}")]
pub struct UnknownErrorCode(pub u32);

impl TryFrom<u32> for ErrorCode {
    type Error = UnknownErrorCode;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        Self::ALL
            .iter()
            .copied()
            .find(|code| code.as_u32() == value)
            .ok_or(UnknownErrorCode(value))
    }
}

/// A coded storage error.
///
/// The message is rendered once, at construction, from the code's template.
/// When the error wraps an underlying failure (backend I/O, codec, hook) the
/// cause stays reachable through [`std::error::Error::source`].
#[derive(Debug, Error)]
#[error("[{code}] {message}")]
pub struct StorError {
    code: ErrorCode,
    message: String,
    #[source]
    source: Option<BoxError>,
}

impl StorError {
    /// Build an error from `code`, filling its template with `args`.
    pub fn new(code: ErrorCode, args: &[&dyn fmt::Display]) -> Self {
        Self {
            code,
            message: render(code.template(), args),
            source: None,
        }
    }

    /// Like [`StorError::new`], keeping `source` as the cause.
    pub fn wrap(code: ErrorCode, source: impl Into<BoxError>, args: &[&dyn fmt::Display]) -> Self {
        Self {
            code,
            message: render(code.template(), args),
            source: Some(source.into()),
        }
    }

    pub fn code(&self) -> ErrorCode {
        self.code
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// Returns `true` if this error carries `code`.
    pub fn is(&self, code: ErrorCode) -> bool {
        self.code == code
    }

    /// Returns `true` if the backend reported the key as absent.
    pub fn is_not_found(&self) -> bool {
        self.code == ErrorCode::KeyNotFound
    }

    /// Returns `true` if a lock could not be taken within the wait scope.
    pub fn is_lock_wait(&self) -> bool {
        self.code.is_lock_wait()
    }

    /// The wrapped cause, downcast to a [`StorError`] when it is one.
    pub fn inner(&self) -> Option<&StorError> {
        self.source.as_deref().and_then(|e| e.downcast_ref::<StorError>())
    }
}

/// Substitute `{}` placeholders left to right. Surplus placeholders render as
/// `?`; surplus arguments are ignored.
fn render(template: &str, args: &[&dyn fmt::Display]) -> String {
    let mut out = String::with_capacity(template.len() + 16);
    let mut args = args.iter();
    let mut rest = template;
    while let Some(pos) = rest.find("{}") {
        out.push_str(&rest[..pos]);
        match args.next() {
            Some(arg) => out.push_str(&arg.to_string()),
            None => out.push('?'),
        }
        rest = &rest[pos + 2..];
    }
    out.push_str(rest);
    out
}
