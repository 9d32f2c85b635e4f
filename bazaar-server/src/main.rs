use bazaar_server::{Config, Server, init_logger};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 1. 加载 .env (可选)
    dotenv::dotenv().ok();

    // 2. 加载配置
    let config = Config::from_env()?;

    // 3. 初始化日志
    let sink = init_logger(&config)?;

    tracing::info!(
        environment = ?config.environment,
        tls = config.tls.is_some(),
        "🦀 Bazaar server starting..."
    );

    // 4. 运行直到收到关闭信号
    let result = Server::new(config).run().await;

    // 5. 刷新剩余日志
    let closed = sink.close();

    result?;
    closed?;
    Ok(())
}
