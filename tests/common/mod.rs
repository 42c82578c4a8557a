#![allow(dead_code)]

use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use corems_console::auth::{MemoryStorage, SecureStorage};
use corems_console::config::ServiceUrls;
use corems_console::{CoreMsContext, InMemoryNavigator, Navigator, RuntimeConfig, api_clients::create_transport};
use serde_json::{Value, json};
use std::sync::Arc;
use url::Url;

pub const CONSOLE_URL: &str = "https://console.example.com/dashboard";

pub fn now_secs() -> i64 {
    chrono::Utc::now().timestamp()
}

/// Unsigned JWT for `ada@example.com`, expiring `expires_in` seconds from now
pub fn token(expires_in: i64, roles: &[&str]) -> String {
    let claims = json!({
        "sub": "7",
        "email": "ada@example.com",
        "user_uuid": "6f1c2d7e-user",
        "first_name": "Ada",
        "last_name": "Lovelace",
        "roles": roles,
        "exp": now_secs() + expires_in,
        "iat": now_secs()
    });
    let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"HS256","typ":"JWT"}"#);
    let payload = URL_SAFE_NO_PAD.encode(claims.to_string());
    format!("{}.{}.c2lnbmF0dXJl", header, payload)
}

pub fn envelope(response: Value) -> String {
    json!({"result": true, "response": response, "errors": []}).to_string()
}

pub fn failure(reason_code: &str, description: &str) -> String {
    json!({
        "result": false,
        "response": null,
        "errors": [{"reasonCode": reason_code, "description": description}]
    })
    .to_string()
}

pub struct Console {
    pub ctx: CoreMsContext,
    pub storage: Arc<MemoryStorage>,
    pub navigator: Arc<InMemoryNavigator>,
}

pub fn console(server_url: &str, storage: MemoryStorage, location: Option<&str>) -> Console {
    let config = RuntimeConfig {
        services: ServiceUrls::uniform(server_url),
        ..RuntimeConfig::default()
    };
    let storage = Arc::new(storage);
    let navigator = Arc::new(InMemoryNavigator::new(location.map(|l| Url::parse(l).unwrap())));
    let transport = create_transport(&config).unwrap();
    let ctx = CoreMsContext::new(
        config,
        Arc::clone(&storage) as Arc<dyn SecureStorage>,
        transport,
        Arc::clone(&navigator) as Arc<dyn Navigator>,
    )
    .unwrap();

    Console { ctx, storage, navigator }
}
