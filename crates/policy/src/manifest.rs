//! Permission manifests loaded from TOML.
//!
//! A manifest lists permissions to create when an organization is
//! bootstrapped. Accounts are written either as `0x` addresses or as names
//! the host resolves (`"any"` always means the wildcard grantee).

use crate::{Address, Error, Predicate, Result, RoleId, Word, ANY_ENTITY};
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Manifest {
    #[serde(default, rename = "permission")]
    pub permissions: Vec<PermissionEntry>,
}

/// One `[[permission]]` table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PermissionEntry {
    pub grantee: String,
    pub target: String,
    /// Role name (`"EXECUTE_ROLE"`) or a raw `0x` role id.
    pub role: String,
    /// Defaults to the manager given to [`Manifest::resolve`].
    #[serde(default)]
    pub manager: Option<String>,
    #[serde(default)]
    pub predicates: Vec<Predicate>,
}

/// A manifest entry with every name resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PermissionSpec {
    pub grantee: Address,
    pub target: Address,
    pub role: RoleId,
    pub manager: Address,
    pub predicates: Vec<Predicate>,
}

impl Manifest {
    /// Load a manifest from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::parse(&content)
    }

    /// Parse a manifest from a TOML string.
    pub fn parse(toml: &str) -> Result<Self> {
        toml::from_str(toml).map_err(|e| Error::Parse(e.to_string()))
    }

    /// Resolve names to addresses through `lookup`.
    pub fn resolve(
        &self,
        default_manager: Address,
        lookup: impl Fn(&str) -> Option<Address>,
    ) -> Result<Vec<PermissionSpec>> {
        let account = |name: &str| -> Result<Address> {
            if name == "any" {
                return Ok(ANY_ENTITY);
            }
            if name.starts_with("0x") {
                return name.parse();
            }
            lookup(name).ok_or_else(|| Error::Invalid(format!("unknown account name {name:?}")))
        };

        self.permissions
            .iter()
            .map(|entry| {
                Ok(PermissionSpec {
                    grantee: account(&entry.grantee)?,
                    target: account(&entry.target)?,
                    role: role_id(&entry.role)?,
                    manager: match &entry.manager {
                        Some(name) => account(name)?,
                        None => default_manager,
                    },
                    predicates: entry.predicates.clone(),
                })
            })
            .collect()
    }
}

fn role_id(role: &str) -> Result<RoleId> {
    if role.starts_with("0x") {
        Ok(RoleId(role.parse::<Word>()?))
    } else {
        Ok(RoleId::named(role))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Arg, Op};
    use pretty_assertions::assert_eq;

    const TOML: &str = r#"
[[permission]]
grantee = "voting"
target = "host"
role = "EXECUTE_ROLE"

[[permission]]
grantee = "any"
target = "0x00000000000000000000000000000000000000aa"
role = "TRANSFER_ROLE"
manager = "voting"
predicates = [
    { kind = "compare", arg = { param = 0 }, op = "lte", value = "1000" },
    { kind = "compare", arg = "timestamp", op = "gt", value = "1700000000" },
    { kind = "oracle", oracle = "0x00000000000000000000000000000000000000bb" },
]
"#;

    fn lookup(name: &str) -> Option<Address> {
        match name {
            "voting" => Some(Address::from_low_u64(1000)),
            "host" => Some(Address::from_low_u64(2000)),
            _ => None,
        }
    }

    #[test]
    fn test_parse_and_resolve() {
        let manifest = Manifest::parse(TOML).unwrap();
        assert_eq!(manifest.permissions.len(), 2);

        let root = Address::from_low_u64(7);
        let specs = manifest.resolve(root, lookup).unwrap();

        assert_eq!(specs[0].grantee, Address::from_low_u64(1000));
        assert_eq!(specs[0].target, Address::from_low_u64(2000));
        assert_eq!(specs[0].role, RoleId::named("EXECUTE_ROLE"));
        assert_eq!(specs[0].manager, root);

        assert_eq!(specs[1].grantee, ANY_ENTITY);
        assert_eq!(specs[1].target, Address::from_low_u64(0xaa));
        assert_eq!(specs[1].manager, Address::from_low_u64(1000));
        assert_eq!(
            specs[1].predicates,
            vec![
                Predicate::param(0, Op::Lte, Word::from_u64(1000)),
                Predicate::Compare {
                    arg: Arg::Timestamp,
                    op: Op::Gt,
                    value: Word::from_u64(1_700_000_000),
                },
                Predicate::Oracle {
                    oracle: Address::from_low_u64(0xbb),
                },
            ]
        );
    }

    #[test]
    fn test_unknown_name() {
        let manifest = Manifest::parse(
            r#"
[[permission]]
grantee = "nobody"
target = "host"
role = "EXECUTE_ROLE"
"#,
        )
        .unwrap();
        assert!(manifest.resolve(Address::ZERO, lookup).is_err());
    }

    #[test]
    fn test_empty_manifest() {
        let manifest = Manifest::parse("").unwrap();
        assert!(manifest.permissions.is_empty());
    }
}
