use anyhow::Result;
use clap::Parser;

use super::ConnectionArgs;

/// List ubus objects or their signatures.
#[derive(Parser, Debug)]
pub struct ListCommand {
    /// Restrict the listing to these objects.
    pub objects: Vec<String>,
}

impl ListCommand {
    pub async fn execute(self, connection: &ConnectionArgs) -> Result<()> {
        let client = connection.client()?;
        let filters: Vec<&str> = self.objects.iter().map(String::as_str).collect();

        for name in client.list(&filters).await? {
            println!("{}", name);
        }

        Ok(())
    }
}
