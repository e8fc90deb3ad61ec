use anyhow::Result;
use clap::Parser;
use console::style;
use luci_rpc::UbusStatus;

/// Describe a ubus status code.
#[derive(Parser, Debug)]
pub struct StatusCommand {
    /// Numeric status code.
    #[arg(allow_negative_numbers = true)]
    pub code: i64,
}

impl StatusCommand {
    pub fn execute(self) -> Result<()> {
        let status = UbusStatus::from_code(self.code);
        let code = if status.is_ok() {
            style(self.code).green()
        } else {
            style(self.code).red()
        };
        println!("{} {}", code, status);
        Ok(())
    }
}
