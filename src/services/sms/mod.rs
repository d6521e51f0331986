pub mod twilio;

use async_trait::async_trait;

#[async_trait]
pub trait SmsSender: Send + Sync {
    async fn send_code(&self, to: &str, code: &str) -> anyhow::Result<()>;
}

/// Development sender: nothing leaves the machine, the code lands in the log.
pub struct ConsoleSmsSender;

#[async_trait]
impl SmsSender for ConsoleSmsSender {
    async fn send_code(&self, to: &str, code: &str) -> anyhow::Result<()> {
        tracing::info!(to = %to, code = %code, "SMS (console sender)");
        Ok(())
    }
}
