use mock_server::Store;
use tokio::net::TcpListener;

#[tokio::main]
async fn main() -> Result<(), std::io::Error> {
    env_logger::init();

    let port = std::env::var("PORT").unwrap_or_else(|_| "3000".to_string());
    let token = std::env::var("MOCK_AUTHTOKEN").unwrap_or_else(|_| "test-token".to_string());
    let tables = std::env::var("MOCK_TABLES").unwrap_or_default();

    let store = tables
        .split(',')
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .fold(Store::new(token), |store, table| store.with_table(table));

    let addr = format!("127.0.0.1:{port}");
    let listener = TcpListener::bind(&addr).await?;
    log::info!("listening on {addr}");
    mock_server::run(listener, store.into_db()).await
}
