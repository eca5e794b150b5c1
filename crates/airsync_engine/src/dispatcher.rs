//! Command lookup table.

use crate::commands;
use crate::context::RequestContext;
use crate::error::{EngineError, EngineResult};
use airsync_protocol::Command;
use std::collections::HashMap;
use tracing::debug;

/// A command handler.
///
/// A handler reads one request tree from the context decoder and writes
/// one reply tree to its encoder, or fails before writing anything.
pub type CommandHandler = fn(&mut RequestContext<'_>) -> EngineResult<()>;

/// Maps commands to their handlers.
#[derive(Clone, Default)]
pub struct Dispatcher {
    handlers: HashMap<Command, CommandHandler>,
}

impl Dispatcher {
    /// Creates a dispatcher with no handlers.
    pub fn new() -> Self {
        Self::default()
    }

    /// Dispatcher with every built-in handler registered.
    pub fn standard() -> Self {
        let mut dispatcher = Self::new();
        dispatcher
            .register(Command::Sync, commands::sync::handle)
            .register(Command::FolderSync, commands::folder::handle_folder_sync)
            .register(Command::FolderCreate, commands::folder::handle_folder_change)
            .register(Command::FolderUpdate, commands::folder::handle_folder_change)
            .register(Command::FolderDelete, commands::folder::handle_folder_change)
            .register(Command::GetHierarchy, commands::folder::handle_get_hierarchy)
            .register(Command::Ping, commands::ping::handle)
            .register(Command::Provision, commands::provision::handle)
            .register(Command::MoveItems, commands::moves::handle)
            .register(Command::GetItemEstimate, commands::estimate::handle)
            .register(Command::SendMail, commands::mail::handle)
            .register(Command::SmartForward, commands::mail::handle)
            .register(Command::SmartReply, commands::mail::handle)
            .register(Command::MeetingResponse, commands::meeting::handle)
            .register(Command::Search, commands::search::handle)
            .register(Command::ItemOperations, commands::item_operations::handle)
            .register(Command::Settings, commands::settings::handle)
            .register(Command::Notify, commands::notify::handle)
            .register(Command::GetAttachment, commands::attachment::handle);
        dispatcher
    }

    /// Registers or replaces the handler of a command.
    pub fn register(&mut self, command: Command, handler: CommandHandler) -> &mut Self {
        self.handlers.insert(command, handler);
        self
    }

    /// Returns true if a handler is registered for the command.
    pub fn handles(&self, command: Command) -> bool {
        self.handlers.contains_key(&command)
    }

    /// Runs the handler of the request's command.
    pub fn dispatch(&self, ctx: &mut RequestContext<'_>) -> EngineResult<()> {
        let command = ctx.request.command;
        let handler = self
            .handlers
            .get(&command)
            .ok_or_else(|| EngineError::NotImplemented(command.to_string()))?;
        debug!(%command, device = ctx.states.device(), "dispatching");
        handler(ctx)
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut commands: Vec<_> = self.handlers.keys().collect();
        commands.sort();
        f.debug_struct("Dispatcher")
            .field("commands", &commands)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standard_table_leaves_legacy_commands_out() {
        let dispatcher = Dispatcher::standard();
        assert!(dispatcher.handles(Command::Sync));
        assert!(dispatcher.handles(Command::GetHierarchy));
        assert!(dispatcher.handles(Command::Notify));
        for command in [
            Command::ResolveRecipients,
            Command::ValidateCert,
            Command::CreateCollection,
            Command::DeleteCollection,
            Command::MoveCollection,
        ] {
            assert!(!dispatcher.handles(command), "{command} should not be handled");
        }
    }

    #[test]
    fn register_replaces_handler() {
        fn noop(_: &mut RequestContext<'_>) -> EngineResult<()> {
            Ok(())
        }
        let mut dispatcher = Dispatcher::new();
        assert!(!dispatcher.handles(Command::ValidateCert));
        dispatcher.register(Command::ValidateCert, noop);
        assert!(dispatcher.handles(Command::ValidateCert));
    }
}
