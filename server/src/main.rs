mod db;
mod frame;
mod routes;
mod services;
mod state;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt::init();

    let database_url = std::env::var("DATABASE_URL").expect("DATABASE_URL required");
    let port: u16 = std::env::var("PORT")
        .unwrap_or_else(|_| "3000".into())
        .parse()
        .expect("invalid PORT");

    let pool = db::init_pool(&database_url)
        .await
        .expect("database init failed");

    services::staff::bootstrap_manager(&pool)
        .await
        .expect("staff bootstrap failed");

    let frame_tx = services::persistence::spawn_frame_persistence_worker(pool.clone());
    let state = state::AppState::new(pool).with_frame_persistence(frame_tx);

    // Spawn background persistence task.
    let _persistence = services::persistence::spawn_persistence_task(state.clone());

    let app = routes::app(state);
    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{port}"))
        .await
        .expect("failed to bind");

    tracing::info!(%port, "seatmap listening");
    axum::serve(listener, app).await.expect("server failed");
}
