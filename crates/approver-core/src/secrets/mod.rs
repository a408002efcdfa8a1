//! Secret material access.
//!
//! Secrets are addressed by the name of an environment variable. The
//! variable either carries the secret value directly (SSM-parameter-envelope
//! deployments, selected with `SECRET_STORE_TYPE=AWS_SSM`) or a filesystem
//! path the secret is read from (the default, matching mounted secret
//! volumes).

use thiserror::Error;

/// Value of `SECRET_STORE_TYPE` selecting the env-value reader.
pub const SECRET_STORE_TYPE_AWS_SSM: &str = "AWS_SSM";

/// Errors raised while reading secret material.
#[derive(Debug, Error)]
pub enum SecretError {
    /// The addressing environment variable is not set.
    #[error("environment variable {0:?} is not set")]
    Unset(String),

    /// The referenced file could not be read.
    #[error("could not read secret file {path:?}: {source}")]
    Io {
        /// Path the variable pointed at.
        path: String,
        /// Underlying read failure.
        source: std::io::Error,
    },
}

/// Reads secret material addressed by environment-variable name.
pub trait SecretStore: Send + Sync {
    /// Returns the secret bytes for the given variable name.
    ///
    /// # Errors
    ///
    /// Returns an error when the variable is unset or the referenced file
    /// cannot be read.
    fn get(&self, env_variable: &str) -> Result<Vec<u8>, SecretError>;
}

/// Store whose environment variables carry the secret values themselves.
/// Escaped `\n` sequences are unfolded so multi-line secrets (private keys)
/// survive single-line parameter envelopes.
#[derive(Debug, Default, Clone, Copy)]
pub struct EnvSecretStore;

impl SecretStore for EnvSecretStore {
    fn get(&self, env_variable: &str) -> Result<Vec<u8>, SecretError> {
        let value = std::env::var(env_variable)
            .map_err(|_| SecretError::Unset(env_variable.to_owned()))?;
        Ok(value.replace("\\n", "\n").into_bytes())
    }
}

/// Store whose environment variables carry filesystem paths.
#[derive(Debug, Default, Clone, Copy)]
pub struct FileSecretStore;

impl SecretStore for FileSecretStore {
    fn get(&self, env_variable: &str) -> Result<Vec<u8>, SecretError> {
        let path = std::env::var(env_variable)
            .map_err(|_| SecretError::Unset(env_variable.to_owned()))?;
        std::fs::read(&path).map_err(|source| SecretError::Io { path, source })
    }
}

/// Selects the store implementation for a `SECRET_STORE_TYPE` value.
#[must_use]
pub fn store_for_type(store_type: &str) -> Box<dyn SecretStore> {
    if store_type == SECRET_STORE_TYPE_AWS_SSM {
        Box::new(EnvSecretStore)
    } else {
        Box::new(FileSecretStore)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Env-var mutation is process-global; each test uses its own variable
    // name to stay independent.

    #[test]
    fn env_store_returns_value_with_unfolded_newlines() {
        std::env::set_var("APPROVER_TEST_ENV_SECRET", "line one\\nline two");
        let value = EnvSecretStore.get("APPROVER_TEST_ENV_SECRET").unwrap();
        assert_eq!(value, b"line one\nline two");
    }

    #[test]
    fn env_store_reports_unset_variables() {
        assert!(matches!(
            EnvSecretStore.get("APPROVER_TEST_ENV_SECRET_UNSET"),
            Err(SecretError::Unset(_))
        ));
    }

    #[test]
    fn file_store_reads_the_referenced_path() {
        let dir = std::env::temp_dir().join("approver-secret-test");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("token");
        std::fs::write(&path, b"hunter2").unwrap();

        std::env::set_var("APPROVER_TEST_FILE_SECRET", &path);
        let value = FileSecretStore.get("APPROVER_TEST_FILE_SECRET").unwrap();
        assert_eq!(value, b"hunter2");
    }

    #[test]
    fn file_store_reports_missing_files() {
        std::env::set_var("APPROVER_TEST_FILE_SECRET_MISSING", "/does/not/exist");
        assert!(matches!(
            FileSecretStore.get("APPROVER_TEST_FILE_SECRET_MISSING"),
            Err(SecretError::Io { .. })
        ));
    }
}
