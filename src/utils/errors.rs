#![forbid(unsafe_code)]

use thiserror::Error;

/// Error enumerates the errors returned by this application.
#[derive(Error, Debug)]
pub enum Errors {
    /// Input parameter logging.
    #[error("cicd_demo_server input parameters:\n{}", .0)]
    InputParms(String),

    /// Represents all other cases of `std::io::Error`.
    #[error(transparent)]
    IOError(#[from] std::io::Error),

    /// Inaccessible logger configuration file.
    #[error("Unable to initialize Log4rs using: {}", .0)]
    Log4rsInitialization(String),

    #[error("Reading application configuration file: {}", .0)]
    ReadingConfigFile(String),

    #[error("Unable to parse TOML file: {}", .0)]
    TOMLParseError(String),

    /// A data directory that is missing, misplaced or has loose permissions.
    #[error("Invalid {} at {}: {}", .0, .1, .2)]
    InvalidDataDir(String, String, String),

    #[error("Unable to load TLS certificate material from {}", .0)]
    TlsCertificate(String),
}

// ***************************************************************************
//                                  Tests
// ***************************************************************************
#[cfg(test)]
mod tests {
    use super::Errors;

    #[test]
    fn invalid_dir_message() {
        let e = Errors::InvalidDataDir("logs directory".to_string(),
                                       "/tmp/x/logs".to_string(),
                                       "path must be a directory".to_string());
        assert_eq!(e.to_string(), "Invalid logs directory at /tmp/x/logs: path must be a directory");
    }

    #[test]
    fn io_error_is_transparent() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "no such file");
        let e: Errors = io.into();
        assert_eq!(e.to_string(), "no such file");
    }
}
