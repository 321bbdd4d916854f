//! Dynamic loading of module bundles and manager plugins.

use std::panic;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use libloading::{Library, Symbol};

use crate::kernel::constants;
use crate::kernel::error::{KernelError, Result};
use crate::manager::plugin::ManagerPlugin;
use crate::module::Module;

/// Entry file inside a module directory, e.g. `module.so` on Linux.
pub fn module_entry_path(module_dir: &Path) -> PathBuf {
    module_dir.join(format!("module.{}", std::env::consts::DLL_EXTENSION))
}

fn describe_panic(payload: Box<dyn std::any::Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&'static str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic reason".to_string()
    }
}

/// Load a module implementation from a shared library.
///
/// The library must export `_module_create` returning a raw `dyn Module`
/// pointer. A missing symbol means the bundle is not a kernel module; a
/// panicking constructor is caught rather than unwinding across the FFI
/// boundary.
///
/// Note: the library is intentionally leaked. Dropping it would unmap the
/// module's code while the instance is still referenced; proper unloading
/// would need lifetime management the kernel does not attempt (modules are
/// never hot-swapped).
pub fn load_module_library(path: &Path) -> Result<Arc<dyn Module>> {
    type ModuleCreateFn = unsafe extern "C" fn() -> *mut dyn Module;

    if !path.is_file() {
        return Err(KernelError::Load {
            path: path.to_path_buf(),
            message: "module entry file is missing".to_string(),
        });
    }

    let library = unsafe { Library::new(path) }.map_err(|e| KernelError::Load {
        path: path.to_path_buf(),
        message: format!("failed to load library: {}", e),
    })?;

    let create: Symbol<ModuleCreateFn> = unsafe { library.get(constants::MODULE_CREATE_SYMBOL) }
        .map_err(|e| KernelError::Load {
            path: path.to_path_buf(),
            message: format!("does not export a kernel module constructor: {}", e),
        })?;

    let instance_ptr = match panic::catch_unwind(|| unsafe { create() }) {
        Ok(ptr) => ptr,
        Err(payload) => {
            return Err(KernelError::Load {
                path: path.to_path_buf(),
                message: format!("module constructor panicked: {}", describe_panic(payload)),
            });
        }
    };

    if instance_ptr.is_null() {
        return Err(KernelError::Load {
            path: path.to_path_buf(),
            message: "module constructor returned null".to_string(),
        });
    }

    let module = unsafe { Box::from_raw(instance_ptr) };
    std::mem::forget(library);

    Ok(Arc::from(module))
}

/// Load a manager plugin from a shared library exporting `_kernel_plugin_create`.
pub fn load_plugin_library(path: &Path) -> Result<Arc<dyn ManagerPlugin>> {
    type PluginCreateFn = unsafe extern "C" fn() -> *mut dyn ManagerPlugin;

    let library = unsafe { Library::new(path) }.map_err(|e| KernelError::Load {
        path: path.to_path_buf(),
        message: format!("failed to load plugin library: {}", e),
    })?;

    let create: Symbol<PluginCreateFn> = unsafe { library.get(constants::PLUGIN_CREATE_SYMBOL) }
        .map_err(|e| KernelError::Load {
            path: path.to_path_buf(),
            message: format!("does not export a kernel plugin constructor: {}", e),
        })?;

    let instance_ptr = match panic::catch_unwind(|| unsafe { create() }) {
        Ok(ptr) => ptr,
        Err(payload) => {
            return Err(KernelError::Load {
                path: path.to_path_buf(),
                message: format!("plugin constructor panicked: {}", describe_panic(payload)),
            });
        }
    };

    if instance_ptr.is_null() {
        return Err(KernelError::Load {
            path: path.to_path_buf(),
            message: "plugin constructor returned null".to_string(),
        });
    }

    let plugin = unsafe { Box::from_raw(instance_ptr) };
    std::mem::forget(library);

    Ok(Arc::from(plugin))
}
