//! Scenario files for `charter run`.

use policy::{Address, Manifest, Word};
use runtime::Action;
use runtime::abi::Encoder;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;

/// Top-level scenario.
#[derive(Debug, Deserialize)]
pub struct Scenario {
    /// Account that bootstraps the organization and manages its roles.
    #[serde(default = "default_creator")]
    pub creator: Address,

    /// Extra named accounts usable anywhere a name is expected.
    #[serde(default)]
    pub accounts: BTreeMap<String, Address>,

    /// Names of counters to deploy before any script runs.
    #[serde(default)]
    pub counters: Vec<String>,

    /// Permissions to create after bootstrap (`[[permission]]` tables).
    #[serde(flatten)]
    pub manifest: Manifest,

    /// Scripts to run in order (`[[script]]` tables).
    #[serde(default, rename = "script")]
    pub scripts: Vec<ScriptConfig>,
}

/// One script run through the organization's script host.
#[derive(Debug, Deserialize)]
pub struct ScriptConfig {
    pub name: String,

    /// Account sending the transaction. Defaults to the creator.
    #[serde(default)]
    pub from: Option<String>,

    /// Seconds to advance the block clock before running.
    #[serde(default)]
    pub advance: u64,

    /// Accounts no action may target.
    #[serde(default)]
    pub ban: Vec<String>,

    #[serde(default, rename = "action")]
    pub actions: Vec<ActionConfig>,
}

/// One call within a script.
#[derive(Debug, Deserialize)]
pub struct ActionConfig {
    pub target: String,

    /// Function signature, e.g. `incrementBy(uint256)`.
    #[serde(default = "default_call")]
    pub call: String,

    /// Arguments, one word each, as decimal or `0x` hex strings.
    #[serde(default)]
    pub args: Vec<Word>,
}

fn default_creator() -> Address {
    Address::from_low_u64(0x100)
}

fn default_call() -> String {
    "increment()".to_string()
}

impl Scenario {
    /// Load a scenario from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::parse(&content)
    }

    /// Parse a scenario from a TOML string.
    pub fn parse(toml: &str) -> Result<Self, ConfigError> {
        toml::from_str(toml).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Names known before anything is deployed: `creator` and `[accounts]`.
    pub fn directory(&self) -> Result<Directory, ConfigError> {
        let mut names = Directory::default();
        names.insert("creator", self.creator)?;
        for (name, address) in &self.accounts {
            names.insert(name, *address)?;
        }
        Ok(names)
    }
}

impl ScriptConfig {
    pub fn sender(&self, names: &Directory, creator: Address) -> Result<Address, ConfigError> {
        match &self.from {
            Some(name) => names.resolve(name),
            None => Ok(creator),
        }
    }

    pub fn actions(&self, names: &Directory) -> Result<Vec<Action>, ConfigError> {
        self.actions
            .iter()
            .map(|action| {
                let payload = action
                    .args
                    .iter()
                    .fold(Encoder::call(&action.call), |enc, arg| enc.word(*arg))
                    .finish();
                Ok(Action::new(names.resolve(&action.target)?, payload))
            })
            .collect()
    }

    pub fn banned(&self, names: &Directory) -> Result<Vec<Address>, ConfigError> {
        self.ban.iter().map(|name| names.resolve(name)).collect()
    }
}

/// Name to address bindings for one run.
#[derive(Debug, Default)]
pub struct Directory {
    names: BTreeMap<String, Address>,
}

impl Directory {
    pub fn insert(&mut self, name: &str, address: Address) -> Result<(), ConfigError> {
        if self.names.contains_key(name) {
            return Err(ConfigError::DuplicateName(name.to_string()));
        }
        self.names.insert(name.to_string(), address);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<Address> {
        self.names.get(name).copied()
    }

    /// A `0x` address literal, or a bound name.
    pub fn resolve(&self, name: &str) -> Result<Address, ConfigError> {
        if name.starts_with("0x") {
            return name
                .parse()
                .map_err(|e: policy::Error| ConfigError::Parse(e.to_string()));
        }
        self.get(name)
            .ok_or_else(|| ConfigError::UnknownName(name.to_string()))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, Address)> {
        self.names.iter().map(|(name, address)| (name.as_str(), *address))
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read scenario: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse scenario: {0}")]
    Parse(String),

    #[error("unknown account name {0:?}")]
    UnknownName(String),

    #[error("name {0:?} is bound twice")]
    DuplicateName(String),
}
