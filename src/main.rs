use std::sync::Arc;

pub mod api;
pub mod core;
pub mod error;
pub mod models;
pub mod runtime;
pub mod tui;

fn main() {
    tracing_subscriber::fmt::init();

    let serve = std::env::args().nth(1).map(|a| a == "serve").unwrap_or(false);
    if serve {
        if let Err(e) = run_server() {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
        return;
    }

    let mut app = match tui::App::new() {
        Ok(app) => app,
        Err(e) => {
            eprintln!("Failed to initialize: {}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = app.run() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

/// 启动服务端渲染服务：每次请求构建快照并嵌入载荷
fn run_server() -> error::Result<()> {
    let state = Arc::new(api::ServerContext::with_default_keys());
    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(async {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:3000").await?;
        tracing::info!("serving on http://127.0.0.1:3000");
        axum::serve(listener, api::create_router(state)).await?;
        Ok(())
    })
}
