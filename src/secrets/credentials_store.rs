use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};

use crate::config::Settings;

const USERNAME_ENV: &str = "CLOUDDNS_USERNAME";
const API_KEY_ENV: &str = "CLOUDDNS_API_KEY";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    pub username: String,
    pub api_key: String,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct CredentialsFile {
    #[serde(default)]
    profiles: HashMap<String, Credentials>,
}

fn credentials_path() -> PathBuf {
    Settings::config_dir().join("credentials.toml")
}

fn load_credentials_file(path: &Path) -> Result<CredentialsFile> {
    if !path.exists() {
        return Ok(CredentialsFile::default());
    }

    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read credentials file: {}", path.display()))?;

    toml::from_str(&content)
        .with_context(|| format!("Failed to parse credentials file: {}", path.display()))
}

fn save_credentials_file(path: &Path, creds: &CredentialsFile) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
    }

    let content = toml::to_string_pretty(creds).context("Failed to serialize credentials")?;

    fs::write(path, &content)
        .with_context(|| format!("Failed to write credentials file: {}", path.display()))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let perms = fs::Permissions::from_mode(0o600);
        fs::set_permissions(path, perms)
            .with_context(|| format!("Failed to set permissions on: {}", path.display()))?;
    }

    Ok(())
}

fn store_at(path: &Path, profile: &str, credentials: Credentials) -> Result<()> {
    let mut creds_file = load_credentials_file(path)?;
    creds_file.profiles.insert(profile.to_string(), credentials);
    save_credentials_file(path, &creds_file)
}

fn get_at(path: &Path, profile: &str) -> Result<Credentials> {
    let creds_file = load_credentials_file(path)?;

    creds_file.profiles.get(profile).cloned().ok_or_else(|| {
        anyhow!(
            "Credentials not found for profile: {}. Use 'clouddns --profile {} set-key' or set {} and {}.",
            profile,
            profile,
            USERNAME_ENV,
            API_KEY_ENV
        )
    })
}

fn delete_at(path: &Path, profile: &str) -> Result<()> {
    let mut creds_file = load_credentials_file(path)?;

    if creds_file.profiles.remove(profile).is_none() {
        return Err(anyhow!("No credentials found for profile: {}", profile));
    }

    save_credentials_file(path, &creds_file)
}

fn from_env() -> Option<Credentials> {
    let username = std::env::var(USERNAME_ENV).ok().filter(|v| !v.is_empty())?;
    let api_key = std::env::var(API_KEY_ENV).ok().filter(|v| !v.is_empty())?;
    Some(Credentials { username, api_key })
}

pub fn store_credentials(profile: &str, username: &str, api_key: &str) -> Result<()> {
    store_at(
        &credentials_path(),
        profile,
        Credentials {
            username: username.to_string(),
            api_key: api_key.to_string(),
        },
    )
}

/// Credentials from the environment if both variables are set, otherwise
/// from the stored profile.
pub fn get_credentials(profile: &str) -> Result<Credentials> {
    if let Some(creds) = from_env() {
        return Ok(creds);
    }
    get_at(&credentials_path(), profile)
}

pub fn delete_credentials(profile: &str) -> Result<()> {
    delete_at(&credentials_path(), profile)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn creds(username: &str) -> Credentials {
        Credentials {
            username: username.to_string(),
            api_key: "0123456789abcdef".to_string(),
        }
    }

    #[test]
    fn test_store_get_delete() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("credentials.toml");

        store_at(&path, "default", creds("jdoe")).unwrap();
        store_at(&path, "staging", creds("ops")).unwrap();

        assert_eq!(get_at(&path, "default").unwrap(), creds("jdoe"));
        assert_eq!(get_at(&path, "staging").unwrap().username, "ops");

        delete_at(&path, "default").unwrap();
        assert!(get_at(&path, "default").is_err());
        assert!(delete_at(&path, "default").is_err());
        assert!(get_at(&path, "staging").is_ok());
    }

    #[test]
    fn test_missing_file_has_no_profiles() {
        let dir = tempfile::tempdir().unwrap();
        let err = get_at(&dir.path().join("credentials.toml"), "default").unwrap_err();
        assert!(err.to_string().contains("set-key"));
    }

    #[cfg(unix)]
    #[test]
    fn test_file_is_private() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("credentials.toml");
        store_at(&path, "default", creds("jdoe")).unwrap();

        let mode = fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }
}
