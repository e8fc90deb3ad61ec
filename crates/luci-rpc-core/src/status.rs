use std::fmt;

/// Status code returned by ubus as the first element of a call result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UbusStatus {
    Ok,
    InvalidCommand,
    InvalidArgument,
    MethodNotFound,
    NotFound,
    NoData,
    PermissionDenied,
    Timeout,
    NotSupported,
    UnknownError,
    ConnectionFailed,
    Unknown(i64),
}

impl UbusStatus {
    /// Map a raw status code.
    pub fn from_code(code: i64) -> Self {
        match code {
            0 => UbusStatus::Ok,
            1 => UbusStatus::InvalidCommand,
            2 => UbusStatus::InvalidArgument,
            3 => UbusStatus::MethodNotFound,
            4 => UbusStatus::NotFound,
            5 => UbusStatus::NoData,
            6 => UbusStatus::PermissionDenied,
            7 => UbusStatus::Timeout,
            8 => UbusStatus::NotSupported,
            9 => UbusStatus::UnknownError,
            10 => UbusStatus::ConnectionFailed,
            other => UbusStatus::Unknown(other),
        }
    }

    /// The raw status code.
    pub fn code(&self) -> i64 {
        match self {
            UbusStatus::Ok => 0,
            UbusStatus::InvalidCommand => 1,
            UbusStatus::InvalidArgument => 2,
            UbusStatus::MethodNotFound => 3,
            UbusStatus::NotFound => 4,
            UbusStatus::NoData => 5,
            UbusStatus::PermissionDenied => 6,
            UbusStatus::Timeout => 7,
            UbusStatus::NotSupported => 8,
            UbusStatus::UnknownError => 9,
            UbusStatus::ConnectionFailed => 10,
            UbusStatus::Unknown(code) => *code,
        }
    }

    /// Human readable description.
    pub fn text(&self) -> &'static str {
        match self {
            UbusStatus::Ok => "Command OK",
            UbusStatus::InvalidCommand => "Invalid command",
            UbusStatus::InvalidArgument => "Invalid argument",
            UbusStatus::MethodNotFound => "Method not found",
            UbusStatus::NotFound => "Resource not found",
            UbusStatus::NoData => "No data received",
            UbusStatus::PermissionDenied => "Permission denied",
            UbusStatus::Timeout => "Request timeout",
            UbusStatus::NotSupported => "Not supported",
            UbusStatus::UnknownError => "Unspecified error",
            UbusStatus::ConnectionFailed => "Connection lost",
            UbusStatus::Unknown(_) => "Unknown error code",
        }
    }

    pub fn is_ok(&self) -> bool {
        matches!(self, UbusStatus::Ok)
    }
}

impl fmt::Display for UbusStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.text())
    }
}

/// Human readable description of a raw ubus status code.
pub fn status_text(code: i64) -> &'static str {
    UbusStatus::from_code(code).text()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_codes() {
        assert_eq!(status_text(0), "Command OK");
        assert_eq!(status_text(6), "Permission denied");
        assert_eq!(status_text(10), "Connection lost");
        assert!(UbusStatus::from_code(0).is_ok());
    }

    #[test]
    fn test_unknown_code_keeps_value() {
        let status = UbusStatus::from_code(42);
        assert_eq!(status, UbusStatus::Unknown(42));
        assert_eq!(status.code(), 42);
        assert_eq!(status.to_string(), "Unknown error code");
        assert_eq!(status_text(-1), "Unknown error code");
    }
}
