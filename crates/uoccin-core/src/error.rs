use std::fmt;

/// Machine-readable error codes shared by the library and the CLI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    DeviceNotConfigured,
    ConfigParseError,
    InvalidDeviceId,
    InvalidCommand,
    CorruptLog,
    UnsupportedLogVersion,
    StorageError,
    DiffLogWriteFailed,
    StoreWriteFailed,
    DeliveryFailed,
    LockContention,
    InternalUnexpected,
}

impl ErrorCode {
    /// Stable code identifier (`E####`) for machine parsing.
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::DeviceNotConfigured => "E1001",
            Self::ConfigParseError => "E1002",
            Self::InvalidDeviceId => "E1003",
            Self::InvalidCommand => "E2001",
            Self::CorruptLog => "E3001",
            Self::UnsupportedLogVersion => "E3002",
            Self::StorageError => "E3003",
            Self::DiffLogWriteFailed => "E5001",
            Self::StoreWriteFailed => "E5002",
            Self::DeliveryFailed => "E5003",
            Self::LockContention => "E5004",
            Self::InternalUnexpected => "E9001",
        }
    }

    /// Short human-facing summary for logs and terminal output.
    #[must_use]
    pub const fn message(self) -> &'static str {
        match self {
            Self::DeviceNotConfigured => "Device identity not configured",
            Self::ConfigParseError => "Config file parse error",
            Self::InvalidDeviceId => "Invalid device identifier",
            Self::InvalidCommand => "Invalid command",
            Self::CorruptLog => "Corrupt diff log line",
            Self::UnsupportedLogVersion => "Diff log written by a newer version",
            Self::StorageError => "State store unreadable",
            Self::DiffLogWriteFailed => "Diff log write failed",
            Self::StoreWriteFailed => "State store write failed",
            Self::DeliveryFailed => "Diff log delivery failed",
            Self::LockContention => "Lock contention",
            Self::InternalUnexpected => "Internal unexpected error",
        }
    }

    /// Optional remediation hint that can be surfaced to operators.
    #[must_use]
    pub const fn hint(self) -> Option<&'static str> {
        match self {
            Self::DeviceNotConfigured => {
                Some("Pass --device, set UOCCIN_DEVICE, or add `device` to the user config.")
            }
            Self::ConfigParseError => Some("Fix syntax in uoccin.toml and retry."),
            Self::InvalidDeviceId => Some("Use only ASCII letters, digits, '-' and '_'."),
            Self::InvalidCommand | Self::CorruptLog => None,
            Self::UnsupportedLogVersion => {
                Some("Upgrade uoccin on this device; the log is kept until then.")
            }
            Self::StorageError => Some(
                "Repair or restore uoccin.json; it is never overwritten while unreadable.",
            ),
            Self::DiffLogWriteFailed | Self::StoreWriteFailed => {
                Some("Check disk space and write permissions.")
            }
            Self::DeliveryFailed => Some("Run `uoccin sync` later to retry delivery."),
            Self::LockContention => Some("Retry after the other `uoccin` run on this device ends."),
            Self::InternalUnexpected => Some("Retry once. If persistent, report a bug with logs."),
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}
