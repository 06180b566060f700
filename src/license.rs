use crate::error::SectionError;
use anyhow::{Context, Result};
use std::fmt;
use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};

/// Environment variable consulted for the license key
pub const LICENSE_ENV_VAR: &str = "PDFTOOLS_LICENSE_KEY";

/// A license key as entered by the user: trimmed and never empty.
#[derive(Clone, PartialEq, Eq)]
pub struct LicenseKey(String);

impl LicenseKey {
    pub fn new(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(LicenseKey(trimmed.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for LicenseKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("LicenseKey(****)")
    }
}

/// One place a license key may come from
pub trait LicenseSource {
    /// Human-readable name used in diagnostics
    fn describe(&self) -> String;

    /// `Ok(None)` means this source has no key; the next one is tried.
    fn load(&mut self) -> Result<Option<LicenseKey>>;
}

/// A key given directly, e.g. on the command line
pub struct FromValue(pub Option<String>);

impl LicenseSource for FromValue {
    fn describe(&self) -> String {
        "--license-key".to_string()
    }

    fn load(&mut self) -> Result<Option<LicenseKey>> {
        Ok(self.0.as_deref().and_then(LicenseKey::new))
    }
}

pub struct FromEnvironment {
    pub var: String,
}

impl Default for FromEnvironment {
    fn default() -> Self {
        FromEnvironment {
            var: LICENSE_ENV_VAR.to_string(),
        }
    }
}

impl LicenseSource for FromEnvironment {
    fn describe(&self) -> String {
        format!("${}", self.var)
    }

    fn load(&mut self) -> Result<Option<LicenseKey>> {
        Ok(std::env::var(&self.var)
            .ok()
            .and_then(|value| LicenseKey::new(&value)))
    }
}

/// A key persisted in a file of its own
#[derive(Debug, Clone)]
pub struct FromSecretStore {
    pub path: PathBuf,
}

impl FromSecretStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        FromSecretStore { path: path.into() }
    }

    /// `$XDG_CONFIG_HOME/pdftools/license`, falling back to `~/.config`
    pub fn default_path() -> Option<PathBuf> {
        let config_home = std::env::var_os("XDG_CONFIG_HOME")
            .filter(|dir| !dir.is_empty())
            .map(PathBuf::from)
            .or_else(|| std::env::var_os("HOME").map(|home| Path::new(&home).join(".config")))?;
        Some(config_home.join("pdftools").join("license"))
    }

    pub fn save(&self, key: &LicenseKey) -> Result<()> {
        if let Some(dir) = self.path.parent() {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create directory: {}", dir.display()))?;
        }
        std::fs::write(&self.path, format!("{}\n", key.as_str()))
            .with_context(|| format!("Failed to write license file: {}", self.path.display()))?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&self.path, std::fs::Permissions::from_mode(0o600))
                .with_context(|| format!("Failed to restrict {}", self.path.display()))?;
        }
        Ok(())
    }
}

impl LicenseSource for FromSecretStore {
    fn describe(&self) -> String {
        self.path.display().to_string()
    }

    fn load(&mut self) -> Result<Option<LicenseKey>> {
        match std::fs::read_to_string(&self.path) {
            Ok(contents) => Ok(LicenseKey::new(&contents)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e)
                .with_context(|| format!("Failed to read license file: {}", self.path.display())),
        }
    }
}

/// Asks for the key interactively and remembers it in `store` for next time.
pub struct FromPrompt<R, W> {
    input: R,
    output: W,
    store: Option<FromSecretStore>,
}

impl<R: BufRead, W: Write> FromPrompt<R, W> {
    pub fn new(input: R, output: W, store: Option<FromSecretStore>) -> Self {
        FromPrompt {
            input,
            output,
            store,
        }
    }
}

impl<R: BufRead, W: Write> LicenseSource for FromPrompt<R, W> {
    fn describe(&self) -> String {
        "interactive prompt".to_string()
    }

    fn load(&mut self) -> Result<Option<LicenseKey>> {
        write!(self.output, "Paste your license key: ")?;
        self.output.flush()?;

        let mut line = String::new();
        self.input
            .read_line(&mut line)
            .context("Failed to read license key")?;
        let Some(key) = LicenseKey::new(&line) else {
            return Ok(None);
        };

        // Only keys that registration accepts are remembered
        if let Err(e) = check_key(&key) {
            log::warn!("Not saving license key: {}", e);
            return Ok(Some(key));
        }
        if let Some(store) = &self.store {
            match store.save(&key) {
                Ok(()) => log::info!("Saved license key to {}", store.path.display()),
                Err(e) => log::warn!("Could not persist license key: {:#}", e),
            }
        }
        Ok(Some(key))
    }
}

/// Walk the sources in order and return the first key found.
pub fn resolve(sources: &mut [Box<dyn LicenseSource>]) -> Result<LicenseKey, SectionError> {
    for source in sources.iter_mut() {
        match source.load() {
            Ok(Some(key)) => {
                log::debug!("Using license key from {}", source.describe());
                return Ok(key);
            }
            Ok(None) => {}
            Err(e) => log::warn!("Skipping license source {}: {:#}", source.describe(), e),
        }
    }

    let consulted: Vec<String> = sources.iter().map(|s| s.describe()).collect();
    Err(SectionError::LicenseMissing(format!(
        "no license key found (checked: {})",
        consulted.join(", ")
    )))
}

/// A key that has been registered and accepted. Extraction requires one.
#[derive(Debug, Clone)]
pub struct License {
    key: LicenseKey,
}

impl License {
    pub fn register(key: LicenseKey) -> Result<Self, SectionError> {
        check_key(&key)?;
        Ok(License { key })
    }

    pub fn key(&self) -> &LicenseKey {
        &self.key
    }
}

/// The format check `License::register` applies
fn check_key(key: &LicenseKey) -> Result<(), SectionError> {
    if key.as_str().chars().all(|c| c.is_ascii_graphic()) {
        Ok(())
    } else {
        Err(SectionError::LicenseMissing(
            "license key must be printable ASCII without whitespace".to_string(),
        ))
    }
}
