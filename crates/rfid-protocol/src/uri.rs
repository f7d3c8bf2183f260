//! Reader addresses derived from serial port names

/// Scheme used by the interrogator SDK for serial-attached readers
pub const READER_SCHEME: &str = "tmr://";

/// Build the SDK address for a reader on `port`
///
/// `/dev/ttyACM0` becomes `tmr:///dev/ttyACM0` and `COM4` becomes
/// `tmr:///COM4`.
pub fn reader_uri(port: &str) -> String {
    if port.starts_with('/') {
        format!("{}{}", READER_SCHEME, port)
    } else {
        format!("{}/{}", READER_SCHEME, port)
    }
}

/// Recover the port name from a reader address
pub fn port_from_uri(uri: &str) -> Option<&str> {
    let path = uri.strip_prefix(READER_SCHEME)?;
    if path.starts_with("/dev/") {
        return Some(path);
    }
    let port = path.strip_prefix('/')?;
    if port.is_empty() {
        None
    } else {
        Some(port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unix_port_uri() {
        assert_eq!(reader_uri("/dev/ttyACM0"), "tmr:///dev/ttyACM0");
        assert_eq!(port_from_uri("tmr:///dev/ttyACM0"), Some("/dev/ttyACM0"));
    }

    #[test]
    fn test_windows_port_uri() {
        assert_eq!(reader_uri("COM4"), "tmr:///COM4");
        assert_eq!(port_from_uri("tmr:///COM4"), Some("COM4"));
    }

    #[test]
    fn test_rejects_foreign_uri() {
        assert_eq!(port_from_uri("eapi:///COM4"), None);
        assert_eq!(port_from_uri("tmr:///"), None);
    }
}
