use signwire::apis::types::NewsParams;
use signwire::apis::{NewsApi, ScriptApi, UserApi};
use signwire::core::kernel::stream::StreamEvent;
use signwire::core::session::MemorySessionStore;
use signwire::{ClientConfig, SignedClient};
use serde_json::json;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    // SIGNWIRE_ENV, SIGNWIRE_TEST_URL / SIGNWIRE_PRO_URL, optional .env file
    #[cfg(feature = "env-file")]
    let config = ClientConfig::from_env_auto("SIGNWIRE")?;
    #[cfg(not(feature = "env-file"))]
    let config = ClientConfig::from_env("SIGNWIRE")?;
    info!(base_url = %config.base_url, scope = ?config.signature_scope, "starting");

    let session = Arc::new(
        MemorySessionStore::new().with_logout_hook(|| warn!("session expired, log in again")),
    );
    let client = SignedClient::builder(config)
        .with_session_store(session.clone())
        .build()?;

    let news = NewsApi::new(client.clone());
    match news
        .news_list(&NewsParams {
            limit: Some(5),
            category: None,
        })
        .await
    {
        Ok(page) => {
            println!("Found {} headlines", page.pagination.total);
            for item in page.data.iter().take(5) {
                println!("{} ({})", item.title, item.source);
            }
        }
        Err(e) => println!("Error fetching news: {}", e),
    }

    // Log in only when credentials are provided
    if let (Ok(phone), Ok(code)) = (
        std::env::var("SIGNWIRE_DEMO_PHONE"),
        std::env::var("SIGNWIRE_DEMO_CODE"),
    ) {
        let users = UserApi::new(client.clone()).with_session_writer(session.clone());
        match users.phone_login(&phone, &code).await {
            Ok(login) => println!("Logged in as {}", login.username),
            Err(e) => println!("Login failed: {}", e),
        }
    }

    if let Ok(endpoint) = std::env::var("SIGNWIRE_DEMO_STREAM") {
        let cancel = CancellationToken::new();
        let (task, mut events) =
            ScriptApi::new(client).spawn_stream(endpoint, json!({"topic": "demo"}), cancel.clone());

        let ctrl_c = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                ctrl_c.cancel();
            }
        });

        while let Some(event) = events.recv().await {
            match event {
                StreamEvent::Chunk(chunk) => print!("{}", chunk),
                StreamEvent::Complete => println!("\n[done]"),
                StreamEvent::Error(e) => println!("\n[stream ended: {}]", e),
            }
        }
        let state = task.await?;
        info!(%state, "stream finished");
    }

    Ok(())
}
