/// Application name
pub const APP_NAME: &str = "keel";

/// Kernel version
pub const KERNEL_VERSION: &str = "0.1.0";

/// Default directory scanned for module bundles
pub const DEFAULT_MODULES_DIR: &str = "modules";

/// Default directory holding per-module configuration documents
pub const DEFAULT_CONFIG_DIR: &str = "config";

/// File name of the kernel settings document inside the config directory
pub const KERNEL_SETTINGS_FILE: &str = "kernel.json";

/// File name of the optional per-module manifest inside a module directory
pub const MODULE_MANIFEST_FILE: &str = "manifest.json";

/// Symbol exported by a module shared library
pub const MODULE_CREATE_SYMBOL: &[u8] = b"_module_create\0";

/// Symbol exported by a manager-plugin shared library
pub const PLUGIN_CREATE_SYMBOL: &[u8] = b"_kernel_plugin_create\0";

/// Default priority assigned to modules that do not declare one
pub const DEFAULT_MODULE_PRIORITY: i32 = 50;

/// Name under which a policy module must register to be consulted for permissions
pub const AUTH_MODULE_NAME: &str = "auth";
