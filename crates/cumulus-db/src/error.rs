//! Error types for database operations

use std::error::Error;
use std::fmt;

/// Boxed error type for error sources
pub type BoxError = Box<dyn Error + Send + Sync + 'static>;

/// Result type alias for database operations
pub type Result<T> = std::result::Result<T, DbError>;

/// Database operation error with rich diagnostics
#[derive(Debug, thiserror::Error, miette::Diagnostic)]
pub struct DbError {
    kind: DbErrorKind,
    #[source]
    source: Option<BoxError>,
    #[help]
    help: Option<String>,
    context: Option<String>,
}

/// Error categories for database operations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DbErrorKind {
    /// Input neither a parseable IPv4/IPv6 address nor the `"info"` sentinel
    InvalidAddress,
    /// Header version field is not the supported version
    UnsupportedVersion,
    /// Encoded value is structurally invalid
    MalformedValue,
    /// Underlying reader ended before the required bytes
    TruncatedInput,
    /// Chosen pointer width cannot represent the file's largest pointer
    OffsetOverflow,
    /// Serializer wrote a page at an offset other than the one assigned to it
    LayoutCorruption,
    /// Dict would need more than 62 entries
    DictTooLarge,
    /// List would need more than 62 elements
    ListTooLarge,
    /// String longer than the 16-bit extended length field can hold
    StringTooLarge,
    /// I/O error
    Io,
    /// HTTP transport error
    #[cfg(feature = "remote")]
    Http,
}

impl DbError {
    /// Create a new error with the given kind and optional source
    pub fn new(kind: DbErrorKind, source: Option<BoxError>) -> Self {
        Self {
            kind,
            source,
            help: None,
            context: None,
        }
    }

    /// Add a help message to the error
    pub fn with_help(mut self, help: impl Into<String>) -> Self {
        self.help = Some(help.into());
        self
    }

    /// Add context information to the error
    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }

    /// Get the error kind
    pub fn kind(&self) -> &DbErrorKind {
        &self.kind
    }

    // Constructors for different error kinds

    /// Create an invalid address error
    pub fn invalid_address(text: impl fmt::Display) -> Self {
        Self::new(DbErrorKind::InvalidAddress, None)
            .with_help("expected an IPv4/IPv6 address, a CIDR, or the literal \"info\"")
            .with_context(format!("address: {}", text))
    }

    /// Create an unsupported version error
    pub fn unsupported_version(found: u16) -> Self {
        Self::new(DbErrorKind::UnsupportedVersion, None)
            .with_context(format!("database version {} (supported: 2)", found))
    }

    /// Create a malformed value error
    pub fn malformed_value(msg: impl Into<String>) -> Self {
        Self::new(DbErrorKind::MalformedValue, Some(msg.into().into()))
    }

    /// Create a truncated input error
    pub fn truncated(needed: usize, available: usize) -> Self {
        Self::new(DbErrorKind::TruncatedInput, None)
            .with_context(format!("needed {} bytes, only {} available", needed, available))
    }

    /// Create an offset overflow error, reporting the width that would suffice
    pub fn offset_overflow(field_size: u16, required: u16) -> Self {
        Self::new(DbErrorKind::OffsetOverflow, None)
            .with_context(format!(
                "field size {} cannot encode the largest pointer, {} bytes required",
                field_size, required
            ))
            .with_help("branch pages reserve 8 bytes, so pointer widths above 4 do not fit")
    }

    /// Create a layout corruption error
    pub fn layout_corruption(expected: u64, actual: u64) -> Self {
        Self::new(DbErrorKind::LayoutCorruption, None).with_context(format!(
            "page assigned offset {} written at offset {}",
            expected, actual
        ))
    }

    /// Create an I/O error
    pub fn io(source: impl Error + Send + Sync + 'static) -> Self {
        Self::new(DbErrorKind::Io, Some(Box::new(source)))
    }

    /// Create an HTTP transport error
    #[cfg(feature = "remote")]
    pub fn http(source: impl Error + Send + Sync + 'static) -> Self {
        Self::new(DbErrorKind::Http, Some(Box::new(source)))
    }

    /// Create an HTTP status error
    #[cfg(feature = "remote")]
    pub fn http_status(status: u16) -> Self {
        Self::new(DbErrorKind::Http, None)
            .with_context(format!("unexpected HTTP status {}", status))
            .with_help("the server must answer Range requests with 206 Partial Content")
    }
}

impl fmt::Display for DbError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.kind)?;

        if let Some(ctx) = &self.context {
            write!(f, ": {}", ctx)?;
        }

        if let Some(src) = &self.source {
            write!(f, ": {}", src)?;
        }

        Ok(())
    }
}

// Internal granular errors

/// Codec-specific errors
#[derive(Debug, thiserror::Error, miette::Diagnostic)]
pub enum ValueError {
    /// Tag bits `00` are not a valid type
    #[error("Invalid type tag at offset {offset}")]
    InvalidTag {
        /// Byte offset of the bad tag
        offset: usize,
    },

    /// Input ended inside a value
    #[error("Truncated value: needed {needed} bytes, {available} available")]
    Truncated {
        /// Bytes the decoder needed
        needed: usize,
        /// Bytes the input still held
        available: usize,
    },

    /// Dict with too many entries
    #[error("Dict too large: {len} entries (max {max})")]
    DictTooLarge {
        /// Actual entry count
        len: usize,
        /// Maximum allowed entries
        max: usize,
    },

    /// List with too many elements
    #[error("List too large: {len} elements (max {max})")]
    ListTooLarge {
        /// Actual element count
        len: usize,
        /// Maximum allowed elements
        max: usize,
    },

    /// String longer than the extended length field can hold
    #[error("String too large: {len} bytes (max {max})")]
    StringTooLarge {
        /// Actual byte length
        len: usize,
        /// Maximum allowed bytes
        max: usize,
    },

    /// Values nested deeper than the decoder allows
    #[error("Value nested deeper than {max} levels")]
    TooDeep {
        /// Maximum nesting depth
        max: usize,
    },

    /// String bytes are not valid UTF-8
    #[error("String is not valid UTF-8")]
    InvalidUtf8(#[source] std::str::Utf8Error),

    /// Dict key decoded to something other than a string
    #[error("Dict key is not a string")]
    NonStringKey,
}

impl From<ValueError> for DbError {
    fn from(e: ValueError) -> Self {
        match e {
            ValueError::Truncated { needed, available } => DbError::truncated(needed, available),
            ValueError::DictTooLarge { .. } => {
                DbError::new(DbErrorKind::DictTooLarge, Some(Box::new(e)))
                    .with_help("chunk the input so no dict carries more than 62 entries")
            }
            ValueError::ListTooLarge { .. } => {
                DbError::new(DbErrorKind::ListTooLarge, Some(Box::new(e)))
            }
            ValueError::StringTooLarge { .. } => {
                DbError::new(DbErrorKind::StringTooLarge, Some(Box::new(e)))
            }
            ValueError::InvalidTag { .. }
            | ValueError::TooDeep { .. }
            | ValueError::InvalidUtf8(_)
            | ValueError::NonStringKey => {
                DbError::new(DbErrorKind::MalformedValue, Some(Box::new(e)))
            }
        }
    }
}
