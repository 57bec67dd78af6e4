//! Обработчики админских команд.

#[path = "handlers/actions.rs"]
mod actions;
#[path = "handlers/args.rs"]
mod args;
#[path = "handlers/commands/mod.rs"]
mod commands;
#[path = "handlers/error.rs"]
mod error;
#[path = "handlers/format.rs"]
mod format;
#[path = "handlers/shared.rs"]
mod shared;
#[path = "handlers/state.rs"]
mod state;

pub use state::BotState;

use teloxide::dispatching::DpHandlerDescription;
use teloxide::dptree;
use teloxide::prelude::*;

pub fn schema() -> dptree::Handler<
    'static,
    Result<(), Box<dyn std::error::Error + Send + Sync + 'static>>,
    DpHandlerDescription,
> {
    let message_handler = Update::filter_message().branch(commands::handler());

    dptree::entry().branch(message_handler)
}
