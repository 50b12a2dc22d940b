//! Application bundle and builder

use crate::config::Config;
use crate::database::Database;
use crate::error::{Error, Result};

/// Shared handles every command needs
#[derive(Clone)]
pub struct Clonechat {
    pub config: Config,
    pub database: Database,
}

/// Builder for [`Clonechat`]
pub struct ClonechatBuilder {
    config: Option<Config>,
}

impl ClonechatBuilder {
    pub fn new() -> Self {
        Self { config: None }
    }

    pub fn config(mut self, config: Config) -> Self {
        self.config = Some(config);
        self
    }

    /// Open the task store and bring its schema up to date.
    pub async fn build(self) -> Result<Clonechat> {
        let config = self
            .config
            .ok_or_else(|| Error::Configuration("builder needs a config".into()))?;

        let database = Database::connect(&config.database_path()).await?;
        database.ensure_schema().await?;

        Ok(Clonechat { config, database })
    }
}

impl Default for ClonechatBuilder {
    fn default() -> Self {
        Self::new()
    }
}
