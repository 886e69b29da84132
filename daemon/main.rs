use anyhow::Result;
use batchq_daemon_lib::init_logger;
use batchq_lib::settings::Settings;

#[tokio::main(flavor = "multi_thread", worker_threads = 4)]
async fn main() -> Result<()> {
    init_logger(&Settings::default())?;
    let settings = Settings::from_env();
    batchq_daemon_lib::run(settings, false).await
}
