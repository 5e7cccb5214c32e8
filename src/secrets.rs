use anyhow::Context;
use std::path::PathBuf;

use crate::fs_util::{set_secure_dir_permissions, set_secure_file_permissions};

/// On-disk API key storage, one file per provider under
/// `<state dir>/credentials/{provider}.key`, chmod 0700/0600.
pub struct CredentialStore {
    root: PathBuf,
}

impl CredentialStore {
    /// The store under the active state directory (`~/.banter` or wherever
    /// `BANTER_CONFIG` points).
    pub fn open() -> Self {
        Self::at(crate::config::state_dir().join("credentials"))
    }

    pub fn at(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn store(&self, provider: &str, api_key: &str) -> anyhow::Result<PathBuf> {
        let api_key = api_key.trim();
        if api_key.is_empty() {
            anyhow::bail!("API key cannot be empty");
        }

        std::fs::create_dir_all(&self.root)
            .with_context(|| format!("failed to create {}", self.root.display()))?;
        set_secure_dir_permissions(&self.root)?;

        let path = self.key_path(provider)?;
        std::fs::write(&path, api_key)
            .with_context(|| format!("failed to write {}", path.display()))?;
        set_secure_file_permissions(&path)?;
        Ok(path)
    }

    pub fn load(&self, provider: &str) -> Option<String> {
        let path = self.key_path(provider).ok()?;
        let value = std::fs::read_to_string(path).ok()?;
        let value = value.trim();
        if value.is_empty() {
            None
        } else {
            Some(value.to_string())
        }
    }

    fn key_path(&self, provider: &str) -> anyhow::Result<PathBuf> {
        Ok(self.root.join(format!("{}.key", normalize_provider(provider)?)))
    }
}

/// Only the providers the gateway can actually drive get key files. This also
/// keeps arbitrary path segments out of the credentials directory.
fn normalize_provider(provider: &str) -> anyhow::Result<String> {
    let provider = provider.trim().to_ascii_lowercase();
    match provider.as_str() {
        "gemini" | "openai" => Ok(provider),
        _ => anyhow::bail!("unsupported provider for key store: {provider}"),
    }
}

#[cfg(test)]
mod tests {
    use super::CredentialStore;
    use std::path::{Path, PathBuf};

    struct Scratch(PathBuf);

    impl Scratch {
        fn new() -> Self {
            let root = std::env::temp_dir().join(format!("banter-keys-{}", uuid::Uuid::new_v4()));
            Self(root)
        }

        fn path(&self) -> &Path {
            &self.0
        }
    }

    impl Drop for Scratch {
        fn drop(&mut self) {
            std::fs::remove_dir_all(&self.0).ok();
        }
    }

    #[test]
    fn round_trips_a_key_per_provider() {
        let scratch = Scratch::new();
        let store = CredentialStore::at(scratch.path());

        store.store("gemini", "AIza-gemini-key").expect("store gemini");
        store.store("openai", "sk-openai-key").expect("store openai");

        assert_eq!(store.load("gemini").as_deref(), Some("AIza-gemini-key"));
        assert_eq!(store.load("openai").as_deref(), Some("sk-openai-key"));
    }

    #[test]
    fn keys_are_trimmed_and_blank_keys_rejected() {
        let scratch = Scratch::new();
        let store = CredentialStore::at(scratch.path());

        store.store("gemini", "  padded-key \n").expect("store");
        assert_eq!(store.load("gemini").as_deref(), Some("padded-key"));

        let err = store.store("gemini", "   ").expect_err("blank key");
        assert!(err.to_string().contains("cannot be empty"));
    }

    #[test]
    fn missing_key_loads_as_none() {
        let scratch = Scratch::new();
        let store = CredentialStore::at(scratch.path());
        assert_eq!(store.load("openai"), None);
    }

    #[test]
    fn provider_names_cannot_escape_the_store() {
        let scratch = Scratch::new();
        let store = CredentialStore::at(scratch.path());

        for provider in ["anthropic", "../../etc/cron.d/evil", "gemini/.."] {
            let err = store.store(provider, "x").expect_err("should reject");
            assert!(
                err.to_string().contains("unsupported provider"),
                "rejected {provider} for the wrong reason: {err}"
            );
            assert!(store.load(provider).is_none());
        }
    }
}
