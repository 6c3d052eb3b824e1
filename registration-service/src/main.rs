use log::info;

mod error;
mod handlers;
mod models;
mod routes;

#[cfg(test)]
mod tests;

#[tokio::main]
async fn main() -> Result<(), lambda_http::Error> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    info!("Starting registration service");

    let app = routes::create_router().await;

    if std::env::var("AWS_LAMBDA_RUNTIME_API").is_ok() {
        info!("Running inside Lambda");
        return lambda_http::run(app).await;
    }

    let port = std::env::var("PORT").unwrap_or_else(|_| "3000".to_string());
    let addr = format!("0.0.0.0:{}", port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Listening on {}", addr);

    axum::serve(listener, app).await?;
    Ok(())
}
