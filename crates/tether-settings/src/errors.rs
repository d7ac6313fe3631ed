use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("cannot read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("bad JSON in {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    /// Merged layers no longer fit the settings shape (wrong value types).
    #[error("settings do not match the expected shape: {0}")]
    Shape(#[from] serde_json::Error),
    #[error("invalid setting: {0}")]
    Invalid(String),
}

pub type Result<T> = std::result::Result<T, SettingsError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_name_the_file() {
        let source = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let err = SettingsError::Parse {
            path: PathBuf::from("/etc/tether.json"),
            source,
        };
        assert!(err.to_string().starts_with("bad JSON in /etc/tether.json"));

        let err = SettingsError::Read {
            path: PathBuf::from("/nope"),
            source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        };
        assert_eq!(err.to_string(), "cannot read /nope: denied");
    }

    #[test]
    fn invalid_display() {
        let err = SettingsError::Invalid("qualityStep must be > 0".into());
        assert_eq!(err.to_string(), "invalid setting: qualityStep must be > 0");
    }
}
