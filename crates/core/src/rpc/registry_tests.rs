use super::*;

fn noop_handler() -> Handler {
    Arc::new(|_env, _params| Box::pin(async { Ok(Value::Null) }))
}

#[tokio::test]
async fn register_then_lookup_is_case_insensitive() {
    let registry = MethodRegistry::new();
    registry.register("Version", noop_handler()).await.unwrap();
    assert!(registry.get("version").await.is_some());
    assert!(registry.get("VERSION").await.is_some());
}

#[tokio::test]
async fn duplicate_registration_fails() {
    let registry = MethodRegistry::new();
    registry.register("version", noop_handler()).await.unwrap();
    let second = registry.register("Version", noop_handler()).await;
    assert_eq!(second.unwrap_err(), RegisterError::Duplicate);
    assert_eq!(registry.len().await, 1);
}

#[tokio::test]
async fn invalid_names_are_rejected() {
    let registry = MethodRegistry::new();
    for bad in ["", "Run_Now", "run1", "run now"] {
        assert_eq!(registry.register(bad, noop_handler()).await.unwrap_err(), RegisterError::InvalidName);
    }
}

#[tokio::test]
async fn unregistered_lookup_is_none() {
    let registry = MethodRegistry::new();
    assert!(registry.get("no.such").await.is_none());
}

#[tokio::test]
async fn insertion_order_is_preserved() {
    let registry = MethodRegistry::new();
    registry.register("systems", noop_handler()).await.unwrap();
    registry.register("mappings", noop_handler()).await.unwrap();
    registry.register("run", noop_handler()).await.unwrap();
    let handlers = registry.handlers.read().await;
    let names: Vec<&str> = handlers.keys().map(String::as_str).collect();
    assert_eq!(names, vec!["systems", "mappings", "run"]);
}
