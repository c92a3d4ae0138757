pub(crate) mod command;

pub use command::Cli;

use tokio_util::sync::CancellationToken;

impl Cli {
    pub async fn run(
        &self,
        cancellation_token: CancellationToken,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        command::execute_command(&self.command, cancellation_token).await
    }
}
