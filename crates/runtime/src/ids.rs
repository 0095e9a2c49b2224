//! Well-known role and app identifiers, derived once per process.

use policy::{RoleId, Word};
use std::sync::LazyLock;

pub static CREATE_PERMISSIONS_ROLE: LazyLock<RoleId> =
    LazyLock::new(|| RoleId::named("CREATE_PERMISSIONS_ROLE"));
pub static APP_MANAGER_ROLE: LazyLock<RoleId> = LazyLock::new(|| RoleId::named("APP_MANAGER_ROLE"));
pub static REGISTRY_ADD_EXECUTOR_ROLE: LazyLock<RoleId> =
    LazyLock::new(|| RoleId::named("REGISTRY_ADD_EXECUTOR_ROLE"));
pub static REGISTRY_MANAGER_ROLE: LazyLock<RoleId> =
    LazyLock::new(|| RoleId::named("REGISTRY_MANAGER_ROLE"));
pub static EXECUTE_ROLE: LazyLock<RoleId> = LazyLock::new(|| RoleId::named("EXECUTE_ROLE"));

pub static KERNEL_APP_ID: LazyLock<Word> = LazyLock::new(|| Word::hash("charter.kernel"));
pub static ACL_APP_ID: LazyLock<Word> = LazyLock::new(|| Word::hash("charter.acl"));
pub static SCRIPT_REGISTRY_APP_ID: LazyLock<Word> =
    LazyLock::new(|| Word::hash("charter.script-registry"));
pub static SCRIPT_HOST_APP_ID: LazyLock<Word> = LazyLock::new(|| Word::hash("charter.script-host"));

