//! Command dispatch.
//!
//! Every inbound interaction names one command. The matching handler pulls
//! its options, calls at most one store operation and turns the outcome
//! into a [`Reply`]. Handlers are plain synchronous functions; callers on an
//! async runtime are expected to run [`Dispatcher::dispatch`] off the
//! reactor.

use std::{collections::HashMap, fmt, sync::Arc};

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::{
    config::Requester,
    core::error::StoreError,
    store::RequestStore,
};

pub mod link;

pub use link::ValidationError;

pub const HELP: &str = "help";
pub const LIST: &str = "list";
pub const REQUEST: &str = "request";
pub const DROP: &str = "drop";
pub const MARK_DONE: &str = "mark-done";

const LINK_OPTION: &str = "link";
const ORDINAL_OPTION: &str = "request";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub id: String,
}

/// One inbound command invocation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Interaction {
    #[serde(default)]
    pub id: Option<String>,
    pub command: String,
    #[serde(default)]
    pub user: User,
    #[serde(default)]
    pub options: HashMap<String, JsonValue>,
}

impl Interaction {
    fn string_option(&self, name: &'static str) -> CommandResult<&str> {
        self.options
            .get(name)
            .and_then(JsonValue::as_str)
            .ok_or(CommandError::MissingOption(name))
    }

    fn integer_option(&self, name: &'static str) -> CommandResult<i64> {
        self.options
            .get(name)
            .and_then(JsonValue::as_i64)
            .ok_or(CommandError::MissingOption(name))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reply {
    pub content: String,
    /// Only visible to the invoking user.
    pub ephemeral: bool,
}

impl Reply {
    pub fn public(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            ephemeral: false,
        }
    }

    pub fn ephemeral(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            ephemeral: true,
        }
    }
}

#[derive(Debug)]
pub enum CommandError {
    UnknownCommand(String),
    MissingOption(&'static str),
    Validation(ValidationError),
    Store(StoreError),
}

impl fmt::Display for CommandError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CommandError::UnknownCommand(name) => write!(f, "Unknown command: {name}"),
            CommandError::MissingOption(name) => write!(f, "Missing option: {name}"),
            CommandError::Validation(err) => write!(f, "{err}"),
            CommandError::Store(err) => write!(f, "{err}"),
        }
    }
}

impl std::error::Error for CommandError {}

impl From<ValidationError> for CommandError {
    fn from(err: ValidationError) -> Self {
        CommandError::Validation(err)
    }
}

impl From<StoreError> for CommandError {
    fn from(err: StoreError) -> Self {
        CommandError::Store(err)
    }
}

pub type CommandResult<T> = std::result::Result<T, CommandError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OptionKind {
    String,
    Integer,
}

#[derive(Debug, Clone, Serialize)]
pub struct CommandOption {
    pub kind: OptionKind,
    pub name: &'static str,
    pub description: &'static str,
    pub required: bool,
}

/// Registration entry for one command.
#[derive(Debug, Clone, Serialize)]
pub struct CommandSpec {
    pub name: &'static str,
    pub description: &'static str,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<CommandOption>,
}

pub fn commands() -> Vec<CommandSpec> {
    let ordinal_option = CommandOption {
        kind: OptionKind::Integer,
        name: ORDINAL_OPTION,
        description: "Index to a pending request",
        required: true,
    };

    vec![
        CommandSpec {
            name: HELP,
            description: "Let me help you",
            options: vec![],
        },
        CommandSpec {
            name: LIST,
            description: "Show currently pending requests",
            options: vec![],
        },
        CommandSpec {
            name: REQUEST,
            description: "Request a piece of media - a movie, show or piece of music",
            options: vec![CommandOption {
                kind: OptionKind::String,
                name: LINK_OPTION,
                description: "Link to movie, show or music",
                required: true,
            }],
        },
        CommandSpec {
            name: DROP,
            description: "Pull back a pending request",
            options: vec![ordinal_option.clone()],
        },
        CommandSpec {
            name: MARK_DONE,
            description: "Assert that media has been added",
            options: vec![ordinal_option],
        },
    ]
}

/// What every handler gets to work with.
pub struct HandlerContext {
    pub store: Arc<RequestStore>,
    pub requester: Requester,
}

trait Handler {
    fn handle(&self, ctx: &HandlerContext, interaction: &Interaction) -> CommandResult<Reply>;
}

struct HelpHandler;

impl Handler for HelpHandler {
    fn handle(&self, _ctx: &HandlerContext, _interaction: &Interaction) -> CommandResult<Reply> {
        Ok(Reply::public("You do not need help"))
    }
}

struct ListHandler;

impl Handler for ListHandler {
    fn handle(&self, ctx: &HandlerContext, _interaction: &Interaction) -> CommandResult<Reply> {
        let pending = ctx.store.list()?;
        if pending.is_empty() {
            return Ok(Reply::public("No pending media"));
        }

        let lines: String = pending
            .iter()
            .map(|p| format!("{}. <{}>\n", p.ordinal, p.identifier))
            .collect();
        Ok(Reply::public(format!("Pending media:\n{lines}")))
    }
}

struct RequestHandler;

impl Handler for RequestHandler {
    fn handle(&self, ctx: &HandlerContext, interaction: &Interaction) -> CommandResult<Reply> {
        let raw = interaction.string_option(LINK_OPTION)?;
        let link = link::normalize(raw, &ctx.requester.allowed_domains)?;

        log::info!(
            "{}#{} requested {}",
            interaction.user.name,
            interaction.user.id,
            link
        );
        ctx.store.add(link.as_str())?;
        Ok(Reply::public(format!(
            "Accepted {link}, I will get right to it 🫡"
        )))
    }
}

struct DropHandler;

impl Handler for DropHandler {
    fn handle(&self, ctx: &HandlerContext, interaction: &Interaction) -> CommandResult<Reply> {
        let ordinal = interaction.integer_option(ORDINAL_OPTION)?;
        let identifier = ctx.store.remove(ordinal)?;
        Ok(Reply::public(format!("<{identifier}> dropped")))
    }
}

struct MarkDoneHandler;

impl Handler for MarkDoneHandler {
    fn handle(&self, ctx: &HandlerContext, interaction: &Interaction) -> CommandResult<Reply> {
        let ordinal = interaction.integer_option(ORDINAL_OPTION)?;
        let identifier = ctx.store.complete(ordinal)?;
        Ok(Reply::public(format!("<{identifier}> marked done")))
    }
}

pub struct Dispatcher {
    ctx: HandlerContext,
    handlers: HashMap<&'static str, Box<dyn Handler + Send + Sync>>,
}

impl Dispatcher {
    pub fn new(store: Arc<RequestStore>, requester: Requester) -> Self {
        let mut this = Self {
            ctx: HandlerContext { store, requester },
            handlers: HashMap::new(),
        };

        this.route(HELP, Box::new(HelpHandler))
            .route(LIST, Box::new(ListHandler))
            .route(REQUEST, Box::new(RequestHandler))
            .route(DROP, Box::new(DropHandler))
            .route(MARK_DONE, Box::new(MarkDoneHandler));

        this
    }

    fn route(&mut self, name: &'static str, handler: Box<dyn Handler + Send + Sync>) -> &mut Self {
        self.handlers.insert(name, handler);
        self
    }

    pub fn store(&self) -> &Arc<RequestStore> {
        &self.ctx.store
    }

    /// Runs the handler for `interaction` and renders any failure.
    pub fn dispatch(&self, interaction: &Interaction) -> Reply {
        let result = match self.handlers.get(interaction.command.as_str()) {
            Some(handler) => handler.handle(&self.ctx, interaction),
            None => Err(CommandError::UnknownCommand(interaction.command.clone())),
        };

        match result {
            Ok(reply) => reply,
            Err(CommandError::Store(StoreError::NotFound(ordinal))) => {
                log::debug!("{}: nothing pending at {}", interaction.command, ordinal);
                Reply::ephemeral("No media found")
            }
            Err(CommandError::Store(err)) => {
                log::error!("{} failed: {}", interaction.command, err);
                Reply::public("Internal server error")
            }
            Err(err) => {
                log::warn!("{} rejected: {}", interaction.command, err);
                Reply::ephemeral(err.to_string())
            }
        }
    }
}
