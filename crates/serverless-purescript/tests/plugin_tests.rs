//! Integration tests for the build hooks against a real service directory
//!
//! The PureScript toolchain is replaced with small shell commands through the
//! `purescriptCompiler` setting.

#![cfg(unix)]

use std::fs;
use std::path::Path;
use std::time::Duration;

use serde_json::{Value, json};
use serverless_purescript::{Error, Plugin, Service};
use tempfile::TempDir;
use tokio::sync::oneshot;

/// Build a plugin for a temp service with the given functions and settings.
fn service_plugin(dir: &TempDir, functions: Value, custom: Value) -> Plugin {
    let config = json!({
        "service": "test-service",
        "provider": { "name": "aws", "runtime": "nodejs18.x" },
        "custom": custom,
        "functions": functions,
    });
    let service = Service::from_json(&config.to_string(), dir.path()).expect("invalid service");
    Plugin::new(service).expect("invalid settings")
}

fn compiler(script: &str) -> Value {
    json!(["sh", "-c", script])
}

fn read(path: &Path) -> String {
    fs::read_to_string(path).expect("missing file")
}

#[tokio::test]
async fn test_compile_writes_adapter_and_rewrites_handlers() {
    let dir = tempfile::tempdir().unwrap();
    let mut plugin = service_plugin(
        &dir,
        json!({
            "hello": { "purescript": "Foo.Bar.baz", "handler": "index.hello" },
            "legacy": { "handler": "legacy.handler" }
        }),
        // The compiler only succeeds if the entrypoint source exists.
        json!({ "purescriptCompiler": compiler("test -f {genDir}/handlers.purs") }),
    );

    let patch = plugin.compile().await.expect("compile failed");

    assert_eq!(patch.to_json(), json!({ "hello": "purescript.hello" }));
    assert_eq!(plugin.service().handler("hello"), Some("purescript.hello"));
    assert_eq!(plugin.service().handler("legacy"), Some("legacy.handler"));

    let source = read(&plugin.paths().entrypoint_source());
    assert!(source.contains("\nimport Foo.Bar as Foo.Bar\n"));
    assert!(source.contains("hello = exposeLambda $ runLambda Foo.Bar.baz\n"));

    let adapter = read(&plugin.paths().adapter());
    assert!(adapter.contains("exports.hello = function(data, context, callback) {"));
    assert!(adapter.contains("handlers.hello(context, callback, data)();"));
    assert!(!adapter.contains("exports.baz"));
}

#[tokio::test]
async fn test_generated_source_counts() {
    let dir = tempfile::tempdir().unwrap();
    let mut plugin = service_plugin(
        &dir,
        json!({
            "createUser": { "purescript": "Users.Api.create" },
            "charge": { "purescript": "Billing.Stripe.charge" },
            "deleteUser": { "purescript": "Users.Api.delete" },
            "report": { "purescript": "Billing.Stripe.report" },
            "static": { "handler": "static.serve" }
        }),
        json!({ "purescriptCompiler": ["true"] }),
    );

    plugin.compile().await.expect("compile failed");

    let source = read(&plugin.paths().entrypoint_source());
    let imports: Vec<_> = source
        .lines()
        .filter(|l| l.starts_with("import ") && l.contains(" as "))
        .collect();
    assert_eq!(
        imports,
        vec![
            "import Users.Api as Users.Api",
            "import Billing.Stripe as Billing.Stripe"
        ]
    );

    let bindings: Vec<_> = source
        .lines()
        .filter(|l| l.contains(" = exposeLambda $ runLambda "))
        .map(|l| l.split(' ').next().unwrap_or_default())
        .collect();
    assert_eq!(bindings, vec!["createUser", "charge", "deleteUser", "report"]);
}

#[tokio::test]
async fn test_no_purescript_functions_is_noop() {
    let dir = tempfile::tempdir().unwrap();
    let mut plugin = service_plugin(
        &dir,
        json!({ "plain": { "handler": "index.plain" } }),
        json!({ "purescriptCompiler": compiler("touch compiler-ran; exit 1") }),
    );

    let patch = plugin.compile().await.expect("compile should be a no-op");

    assert!(patch.is_empty());
    assert_eq!(plugin.service().handler("plain"), Some("index.plain"));
    assert!(!plugin.paths().work_dir().exists());
    assert!(!plugin.paths().adapter().exists());
    assert!(!dir.path().join("compiler-ran").exists());
}

#[tokio::test]
async fn test_compiler_failure_rejects_without_writing_adapter() {
    let dir = tempfile::tempdir().unwrap();
    let mut plugin = service_plugin(
        &dir,
        json!({ "hello": { "purescript": "Hello.handler" } }),
        json!({ "purescriptCompiler": compiler("echo 'Could not match type Int' >&2; exit 1") }),
    );

    let err = plugin.compile().await.unwrap_err();
    match err {
        Error::Compile { status, stderr } => {
            assert_eq!(status, Some(1));
            assert!(stderr.contains("Could not match type Int"));
        }
        other => panic!("expected compile error, got {other}"),
    }
    assert!(!plugin.paths().adapter().exists());
}

#[tokio::test]
async fn test_compiler_failure_leaves_previous_adapter_untouched() {
    let dir = tempfile::tempdir().unwrap();
    let mut plugin = service_plugin(
        &dir,
        json!({ "hello": { "purescript": "Hello.handler" } }),
        json!({ "purescriptCompiler": compiler("exit 2") }),
    );
    fs::write(plugin.paths().adapter(), "// previous build\n").unwrap();

    assert!(plugin.compile().await.is_err());
    assert_eq!(read(&plugin.paths().adapter()), "// previous build\n");
}

#[tokio::test]
async fn test_debug_mode_controls_payload_logging() {
    let functions = json!({
        "one": { "purescript": "A.one" },
        "two": { "purescript": "B.two" }
    });

    let dir = tempfile::tempdir().unwrap();
    let mut debug = service_plugin(
        &dir,
        functions.clone(),
        json!({ "purescriptDebug": true, "purescriptCompiler": ["true"] }),
    );
    debug.compile().await.unwrap();
    let adapter = read(&debug.paths().adapter());
    assert_eq!(adapter.matches("console.log(data);").count(), 2);

    let dir = tempfile::tempdir().unwrap();
    let mut quiet = service_plugin(&dir, functions, json!({ "purescriptCompiler": ["true"] }));
    quiet.compile().await.unwrap();
    assert!(!read(&quiet.paths().adapter()).contains("console.log"));
}

#[tokio::test]
async fn test_cleanup_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let plugin = service_plugin(&dir, json!({}), json!({}));

    plugin.cleanup().await.expect("cleanup without compile");
    plugin.cleanup().await.expect("second cleanup");
    assert!(!plugin.paths().adapter().exists());
}

#[tokio::test]
async fn test_packaging_hook_cycle() {
    let dir = tempfile::tempdir().unwrap();
    let mut plugin = service_plugin(
        &dir,
        json!({ "hello": { "purescript": "Hello.handler" } }),
        json!({ "purescriptCompiler": ["true"] }),
    );

    let patch = plugin
        .run_hook("before:deploy:createDeploymentArtifacts")
        .await
        .unwrap();
    assert_eq!(patch.entries().len(), 1);
    assert!(plugin.paths().adapter().exists());

    let patch = plugin
        .run_hook("after:deploy:createDeploymentArtifacts")
        .await
        .unwrap();
    assert!(patch.is_empty());
    assert!(!plugin.paths().adapter().exists());

    // The single-function pair behaves the same.
    plugin
        .run_hook("before:deploy:function:packageFunction")
        .await
        .unwrap();
    assert!(plugin.paths().adapter().exists());
    plugin
        .run_hook("after:deploy:function:packageFunction")
        .await
        .unwrap();
    assert!(!plugin.paths().adapter().exists());
}

#[tokio::test]
async fn test_interrupt_cancels_compile_and_cleans_up() {
    let dir = tempfile::tempdir().unwrap();
    let mut plugin = service_plugin(
        &dir,
        json!({ "hello": { "purescript": "Hello.handler" } }),
        json!({ "purescriptCompiler": ["sleep", "30"] }),
    );
    fs::write(plugin.paths().adapter(), "// stale\n").unwrap();

    let (tx, rx) = oneshot::channel::<()>();
    let guard = plugin.watch_interrupt(async move {
        let _ = rx.await;
    });

    let (result, _) = tokio::join!(plugin.compile(), async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        let _ = tx.send(());
    });

    assert!(matches!(result, Err(Error::Cancelled)));
    guard.finished().await;
    assert!(plugin.cancellation().is_cancelled());
    assert!(!plugin.paths().adapter().exists());
}

#[tokio::test]
async fn test_patched_service_serializes_new_handlers() {
    let dir = tempfile::tempdir().unwrap();
    let mut plugin = service_plugin(
        &dir,
        json!({ "hello": { "purescript": "Hello.handler", "memorySize": 256 } }),
        json!({ "purescriptCompiler": ["true"] }),
    );

    plugin.compile().await.unwrap();

    let service: Value = serde_json::from_str(&plugin.service().to_json_pretty().unwrap()).unwrap();
    assert_eq!(service["functions"]["hello"]["handler"], json!("purescript.hello"));
    assert_eq!(service["functions"]["hello"]["memorySize"], json!(256));
    assert_eq!(service["provider"]["name"], json!("aws"));
}

#[tokio::test]
async fn test_offline_hooks_compile_and_install_watcher() {
    let dir = tempfile::tempdir().unwrap();
    let mut plugin = service_plugin(
        &dir,
        json!({ "hello": { "purescript": "Hello.handler" } }),
        json!({ "purescriptCompiler": ["true"] }),
    );

    let patch = plugin.run_hook("before:offline:start").await.unwrap();
    assert_eq!(patch.to_json(), json!({ "hello": "purescript.hello" }));
    assert!(plugin.is_watching_interrupt());
    assert!(plugin.paths().adapter().exists());

    let patch = plugin.run_hook("before:offline:start:init").await.unwrap();
    assert_eq!(patch.entries().len(), 1);
    assert!(plugin.paths().adapter().exists());

    plugin.run_hook("before:offline:start:end").await.unwrap();
    assert!(!plugin.paths().adapter().exists());
}

#[tokio::test]
async fn test_offline_watcher_is_installed_once() {
    let dir = tempfile::tempdir().unwrap();
    let mut plugin = service_plugin(
        &dir,
        json!({ "hello": { "purescript": "Hello.handler" } }),
        json!({ "purescriptCompiler": ["true"] }),
    );

    let (first_tx, first_rx) = oneshot::channel::<()>();
    let (second_tx, second_rx) = oneshot::channel::<()>();
    plugin
        .offline_compile_on(async move {
            let _ = first_rx.await;
        })
        .await
        .unwrap();
    plugin
        .offline_compile_on(async move {
            let _ = second_rx.await;
        })
        .await
        .unwrap();

    // The second signal was never attached to anything.
    assert!(second_tx.send(()).is_err());
    assert!(plugin.paths().adapter().exists());
    assert!(!plugin.cancellation().is_cancelled());

    first_tx.send(()).unwrap();
    plugin.wait_for_interrupt().await;
    assert!(plugin.cancellation().is_cancelled());
    assert!(!plugin.paths().adapter().exists());
    assert!(!plugin.is_watching_interrupt());
}

#[tokio::test]
async fn test_wait_for_interrupt_outlasts_offline_hook() {
    let dir = tempfile::tempdir().unwrap();
    let mut plugin = service_plugin(
        &dir,
        json!({ "hello": { "purescript": "Hello.handler" } }),
        json!({ "purescriptCompiler": ["true"] }),
    );

    let (tx, rx) = oneshot::channel::<()>();
    plugin
        .offline_compile_on(async move {
            let _ = rx.await;
        })
        .await
        .unwrap();
    assert!(plugin.paths().adapter().exists());

    let adapter = plugin.paths().adapter();
    let interrupt = async move {
        // The adapter is still there while the dev session runs.
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(adapter.exists());
        tx.send(()).unwrap();
    };
    tokio::join!(plugin.wait_for_interrupt(), interrupt);

    assert!(!plugin.paths().adapter().exists());
}
