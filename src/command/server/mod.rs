use crate::command;
use crate::configuration::Configuration;
use argh::FromArgs;

mod error;
mod http_server;
mod listener;
mod server_context;

pub use error::Error;
use listener::Listener;
pub use server_context::{canonical_path, ServerContext};

#[derive(FromArgs, PartialEq, Debug)]
#[argh(
    subcommand,
    name = "serve",
    description = "Serve the configured applications behind their authentication gates"
)]
pub struct Options {}

pub struct Command {
    listener: Listener,
}

impl Command {
    pub fn new(config: &Configuration) -> Self {
        let context = ServerContext::new(config);

        Command {
            listener: Listener::new(&config.server, context),
        }
    }

    pub fn notify_config_change(&self, config: &Configuration) {
        let context = ServerContext::new(config);
        self.listener.notify_config_change(&config.server, context);
    }

    pub async fn run(&self) -> Result<(), command::Error> {
        self.listener.serve().await?;
        Ok(())
    }
}
