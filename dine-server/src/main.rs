use dine_server::{Config, ServerState, init_logger, print_banner};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 1. 环境 (dotenv + 日志)
    dotenv::dotenv().ok();
    init_logger();

    print_banner();
    tracing::info!("Dine Server starting...");

    // 2. 配置
    let config = Config::from_env();

    // 3. 装配服务状态
    let state = ServerState::initialize(&config).await;

    // 4. 启动后台任务 (accept 循环、心跳巡检、清理调度器)
    let tasks = state.start_background_tasks().await?;

    // 5. 等待退出信号
    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutdown signal received");

    state.shutdown().await;
    tasks.shutdown().await;

    Ok(())
}
