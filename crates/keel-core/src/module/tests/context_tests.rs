use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;

use super::ProbeModule;
use crate::kernel::error::Result;
use crate::manager::tests::test_options;
use crate::manager::Manager;
use crate::module::{Module, ModuleContext, ModuleHandle, ModuleMetadata};

fn test_manager() -> Manager {
    Manager::new(test_options())
}

/// Policy module registered under the `auth` name.
struct AuthModule;

#[async_trait]
impl Module for AuthModule {
    fn metadata(&self) -> ModuleMetadata {
        ModuleMetadata::new("auth", "1.0.0")
    }

    async fn on_initialize(&self, _ctx: &ModuleContext) -> Result<()> {
        Ok(())
    }

    async fn on_start(&self, _ctx: &ModuleContext) -> Result<()> {
        Ok(())
    }

    async fn on_stop(&self, _ctx: &ModuleContext) -> Result<()> {
        Ok(())
    }

    fn check_module_permission(&self, _module: &str, action: &str, _resource: &str) -> Option<bool> {
        Some(action != "write")
    }
}

#[tokio::test]
async fn test_exports_are_visible_to_peers() {
    let mgr = test_manager();
    mgr.register_module(Arc::new(ProbeModule::new("a"))).await.unwrap();
    mgr.register_module(Arc::new(ProbeModule::new("b"))).await.unwrap();

    let a = mgr.module("a").await.unwrap();
    let b = mgr.module("b").await.unwrap();

    a.context().set_export("answer", json!(42));
    a.context().set_export("greeting", json!("hello"));

    assert_eq!(
        b.context().exports_from("a", Some("answer")).await,
        Some(json!(42))
    );
    let all = b.context().exports_from("a", None).await.unwrap();
    assert_eq!(all["answer"], json!(42));
    assert_eq!(all["greeting"], json!("hello"));

    assert_eq!(b.context().exports_from("a", Some("missing")).await, None);
    assert_eq!(b.context().exports_from("ghost", None).await, None);

    a.context().remove_export("answer");
    assert_eq!(b.context().exports_from("a", Some("answer")).await, None);
}

#[tokio::test]
async fn test_module_instance_lookup() {
    let mgr = test_manager();
    mgr.register_module(Arc::new(ProbeModule::new("a"))).await.unwrap();
    mgr.register_module(Arc::new(ProbeModule::new("b"))).await.unwrap();

    let a = mgr.module("a").await.unwrap();
    let peer = a.context().module_instance("b").await.unwrap();
    assert_eq!(peer.metadata().name, "b");
    assert!(a.context().module_instance("ghost").await.is_none());
}

#[tokio::test]
async fn test_api_compatibility_check() {
    let mgr = test_manager();
    mgr.register_module(Arc::new(ProbeModule::new("a"))).await.unwrap();
    mgr.register_module(Arc::new(ProbeModule::with_metadata(
        ModuleMetadata::new("b", "1.2.0"),
    )))
    .await
    .unwrap();

    let a = mgr.module("a").await.unwrap();
    assert!(a.context().is_module_api_compatible("b", "1.0").await);
    assert!(a.context().is_module_api_compatible("b", "1.2.0").await);
    assert!(!a.context().is_module_api_compatible("b", "2.0").await);
    assert!(!a.context().is_module_api_compatible("ghost", "1.0").await);
}

#[tokio::test]
async fn test_local_permissions_take_precedence() {
    let mgr = test_manager();
    mgr.register_module(Arc::new(ProbeModule::new("a"))).await.unwrap();
    let a = mgr.module("a").await.unwrap();

    // No local entry, no auth module: allow.
    assert!(a.context().check_permission("write", "db").await);

    a.context().grant_permission("db", "read");
    assert!(a.context().check_permission("read", "db").await);
    assert!(!a.context().check_permission("write", "db").await);

    a.context().revoke_permission("db", "read");
    assert!(!a.context().check_permission("read", "db").await);
}

#[tokio::test]
async fn test_auth_module_is_consulted_when_no_local_entry() {
    let mgr = test_manager();
    mgr.register_module(Arc::new(AuthModule)).await.unwrap();
    mgr.register_module(Arc::new(ProbeModule::new("a"))).await.unwrap();

    let a = mgr.module("a").await.unwrap();
    assert!(a.context().check_permission("read", "db").await);
    assert!(!a.context().check_permission("write", "db").await);

    // A local grant bypasses the auth module entirely.
    a.context().grant_permission("db", "write");
    assert!(a.context().check_permission("write", "db").await);
}

#[tokio::test]
async fn test_helpers_degrade_when_manager_is_gone() {
    // A handle that was never registered has no manager back-reference.
    let handle = ModuleHandle::new(Arc::new(ProbeModule::new("orphan")));
    let ctx = handle.context();

    assert!(ctx.module_instance("anything").await.is_none());
    assert_eq!(ctx.exports_from("anything", None).await, None);
    assert!(!ctx.is_module_api_compatible("anything", "1.0").await);
    // Permission checks fall through to allow.
    assert!(ctx.check_permission("read", "db").await);
    // Broadcast is a warned no-op.
    ctx.broadcast("noop", json!(null)).await;
}
