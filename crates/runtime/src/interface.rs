//! Method signatures of the built-in components.
//!
//! Selectors are derived from these strings, so they are the single source
//! for both dispatch tables and callers building payloads.

pub mod kernel {
    pub const INITIALIZE: &str = "initialize(address,address)";
    pub const SET_APP: &str = "setApp(bytes32,bytes32,address)";
    pub const GET_APP: &str = "getApp(bytes32,bytes32)";
    pub const CREATE_INSTANCE: &str = "createInstance(bytes32,bytes32,bytes)";
    pub const NEW_APP_INSTANCE: &str = "newAppInstance(bytes32,address,bytes,bool)";
    pub const NEW_PINNED_APP_INSTANCE: &str = "newPinnedAppInstance(bytes32,address,bytes,bool)";
    pub const ACL: &str = "acl()";
    pub const HAS_PERMISSION: &str = "hasPermission(address,address,bytes32,uint256[])";
}

pub mod acl {
    pub const INITIALIZE: &str = "initialize(address)";
    pub const CREATE_PERMISSION: &str =
        "createPermission(address,address,bytes32,address,uint256[])";
    pub const CREATE_BURNED_PERMISSION: &str = "createBurnedPermission(address,bytes32)";
    pub const GRANT_PERMISSION: &str = "grantPermission(address,address,bytes32,uint256[])";
    pub const REVOKE_PERMISSION: &str = "revokePermission(address,address,bytes32)";
    pub const SET_PERMISSION_MANAGER: &str = "setPermissionManager(address,address,bytes32)";
    pub const BURN_PERMISSION_MANAGER: &str = "burnPermissionManager(address,bytes32)";
    pub const GET_PERMISSION_MANAGER: &str = "getPermissionManager(address,bytes32)";
    pub const GET_PERMISSION: &str = "getPermission(address,address,bytes32)";
    pub const HAS_PERMISSION: &str = "hasPermission(address,address,bytes32,uint256[])";
}

pub mod oracle {
    pub const CAN_PERFORM: &str = "canPerform(address,address,bytes32,uint256[])";
}

pub mod registry {
    pub const INITIALIZE: &str = "initialize()";
    pub const ADD_EXECUTOR: &str = "addScriptExecutor(address)";
    pub const ENABLE_EXECUTOR: &str = "enableScriptExecutor(uint256)";
    pub const DISABLE_EXECUTOR: &str = "disableScriptExecutor(uint256)";
    pub const GET_SCRIPT_EXECUTOR: &str = "getScriptExecutor(bytes)";
    pub const EXECUTOR: &str = "executors(uint256)";
}

pub mod executor {
    pub const INITIALIZE: &str = "initialize()";
    pub const EXEC_SCRIPT: &str = "execScript(bytes,bytes,address[])";
    pub const EXECUTOR_TYPE: &str = "executorType()";
}

pub mod host {
    pub const INITIALIZE: &str = "initialize()";
    pub const EXECUTE: &str = "execute(bytes)";
    pub const EXECUTE_WITH_BAN: &str = "executeWithBan(bytes,address[])";
}

pub mod counter {
    pub const INCREMENT: &str = "increment()";
    pub const INCREMENT_BY: &str = "incrementBy(uint256)";
    pub const VALUE: &str = "value()";
    pub const FAIL: &str = "fail()";
}
