//! rxplain CLI: Chat with the Rxplain medical assistant from a terminal

use std::error::Error;
use std::io::{self, IsTerminal, Write};
use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use rxplain_engine::{
    masked, ClientConfig, ConversationId, CredentialStore, HttpBackend, ImageFile,
    RequestCoordinator, SubmitIgnored, SubmitOutcome, OPENAI_API_KEY,
};
use rxplain_tui::ratatui::text::Line;
use rxplain_tui::{
    lines_to_plain, render_attachment, render_markdown, render_transcript, render_typing,
    terminal_width, write_lines, Theme, TranscriptView,
};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::warn;
use tracing_subscriber::EnvFilter;

type CliResult<T = ()> = Result<T, Box<dyn Error>>;
type Session = RequestCoordinator<HttpBackend>;

/// Terminal client for the Rxplain medical assistant
#[derive(Parser)]
#[command(name = "rxplain")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Config file path
    #[arg(long, global = true, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Override the backend base URL
    #[arg(long, global = true)]
    base_url: Option<String>,

    /// Override the model identifier
    #[arg(long, global = true)]
    model: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Interactive chat (default when no command specified)
    Chat,

    /// Send one message and print the reply
    Send {
        /// Message text
        text: String,

        /// Attach a prescription image
        #[arg(long)]
        image: Option<PathBuf>,

        /// Continue an existing conversation
        #[arg(long)]
        conversation: Option<String>,
    },

    /// List stored conversations
    History {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print a stored conversation
    Show {
        /// Conversation id
        id: String,
    },

    /// Delete a stored conversation
    Delete {
        /// Conversation id
        id: String,
    },

    /// Initialize .rxplain/ directory and config
    Init,

    /// Manage the cached API key
    Key {
        #[command(subcommand)]
        action: KeyAction,
    },
}

#[derive(Subcommand)]
enum KeyAction {
    /// Store an API key
    Set {
        /// Key value
        value: String,
    },
    /// Print the stored key, masked
    Show,
    /// Remove the stored key
    Clear,
}

const RXPLAIN_DIR: &str = ".rxplain";
const DEFAULT_CONFIG_PATH: &str = ".rxplain/config.json";
const CREDENTIALS_FILE: &str = "credentials.json";

const HELP: &str = "\
Commands:
  /new             start a new conversation
  /history         list stored conversations
  /open <id>       open a stored conversation
  /delete <id>     delete a stored conversation
  /attach <path>   attach a prescription image
  /detach          remove the attached image
  /regen           restore the last prompt (press enter to resend)
  /model <name>    switch model
  /key <value>     store your API key
  /help            show this help
  /quit            exit";

fn main() {
    let cli = Cli::parse();
    init_tracing();

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(runtime) => runtime,
        Err(e) => {
            eprintln!("Error: failed to create tokio runtime: {e}");
            std::process::exit(1);
        }
    };
    if let Err(e) = runtime.block_on(run(cli)) {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(io::stderr)
        .init();
}

async fn run(cli: Cli) -> CliResult {
    match &cli.command {
        None | Some(Commands::Chat) => cmd_chat(&cli).await,
        Some(Commands::Send {
            text,
            image,
            conversation,
        }) => cmd_send(&cli, text, image.as_deref(), conversation.as_deref()).await,
        Some(Commands::History { json }) => cmd_history(&cli, *json).await,
        Some(Commands::Show { id }) => cmd_show(&cli, id).await,
        Some(Commands::Delete { id }) => cmd_delete(&cli, id).await,
        Some(Commands::Init) => cmd_init(&cli),
        Some(Commands::Key { action }) => cmd_key(&cli, action),
    }
}

fn load_config(cli: &Cli) -> CliResult<ClientConfig> {
    let mut config = ClientConfig::load_or_default(&cli.config)?;
    if let Some(base_url) = &cli.base_url {
        config = config.with_base_url(base_url.clone());
    }
    if let Some(model) = &cli.model {
        config = config.with_model(model.clone());
    }
    Ok(config)
}

fn credential_store(cli: &Cli) -> CredentialStore {
    CredentialStore::new(cli.config.with_file_name(CREDENTIALS_FILE))
}

fn open_session(cli: &Cli) -> CliResult<(Session, TranscriptView)> {
    let config = load_config(cli)?;
    let backend = HttpBackend::new(config.clone())?;
    let view = TranscriptView::new();
    let mut session = RequestCoordinator::new(config, backend).with_credentials(credential_store(cli));
    session.add_observer(Box::new(view.clone()));
    Ok((session, view))
}

fn print_lines(lines: &[Line<'_>]) -> io::Result<()> {
    let mut out = io::stdout().lock();
    if out.is_terminal() {
        write_lines(&mut out, lines)
    } else {
        writeln!(out, "{}", lines_to_plain(lines))
    }
}

fn print_credential_hint(view: &TranscriptView) {
    if view.take_credential_request() {
        println!("Set your API key with /key <value> or `rxplain key set <value>`.");
    }
}

async fn cmd_chat(cli: &Cli) -> CliResult {
    let (mut session, view) = open_session(cli)?;
    let theme = Theme::default();

    if let Err(e) = session.refresh_history().await {
        warn!(error = %e, "Could not load conversation history");
    }
    println!(
        "Rxplain ({} via {}). Type /help for commands.",
        session.model(),
        session.config().base_url
    );

    let mut input = BufReader::new(tokio::io::stdin()).lines();
    let mut shown = 0usize;
    loop {
        print!("> ");
        io::stdout().flush()?;
        let Some(line) = input.next_line().await? else {
            break;
        };
        let line = line.trim();

        if let Some(command) = line.strip_prefix('/') {
            match run_slash_command(command, &mut session, &theme).await {
                Ok(Flow::Quit) => break,
                Ok(Flow::Continue) => {}
                Err(e) => eprintln!("Error: {e}"),
            }
            shown = shown.min(session.messages().len());
            if matches!(command.split_whitespace().next(), Some("open")) {
                shown = session.messages().len();
            }
            continue;
        }

        // An empty line resends a prompt restored by /regen
        if !line.is_empty() {
            session.set_input(line);
        }
        if session.input().trim().is_empty() {
            continue;
        }

        print_lines(&render_typing(&theme))?;
        let outcome = session.submit().await;
        if let SubmitOutcome::Ignored(reason) = outcome {
            if reason == SubmitIgnored::AlreadySending {
                eprintln!("A request is already in flight.");
            }
            continue;
        }

        let messages = session.messages();
        let fresh: Vec<_> = messages[shown.min(messages.len())..]
            .iter()
            .filter(|m| !m.is_user)
            .cloned()
            .collect();
        shown = messages.len();
        let width = terminal_width().saturating_sub(2);
        for message in &fresh {
            print_lines(&render_markdown(&message.text, width, &theme))?;
        }
        print_credential_hint(&view);
    }

    Ok(())
}

enum Flow {
    Continue,
    Quit,
}

async fn run_slash_command(command: &str, session: &mut Session, theme: &Theme) -> CliResult<Flow> {
    let (name, arg) = match command.split_once(char::is_whitespace) {
        Some((name, arg)) => (name, arg.trim()),
        None => (command, ""),
    };

    match name {
        "quit" | "exit" | "q" => return Ok(Flow::Quit),
        "help" | "?" => println!("{HELP}"),
        "new" => {
            session.new_chat()?;
            println!("Started a new conversation.");
        }
        "history" => {
            if let Err(e) = session.refresh_history().await {
                eprintln!("Could not refresh history: {e}");
            }
            print_history(session);
        }
        "open" => {
            let id = required(arg, "/open <id>")?;
            session.select_conversation(&ConversationId::new(id)).await?;
            let lines = render_transcript(session.messages(), false, terminal_width(), theme);
            print_lines(&lines)?;
        }
        "delete" => {
            let id = required(arg, "/delete <id>")?;
            session.delete_conversation(&ConversationId::new(id)).await?;
            println!("Deleted conversation {id}.");
        }
        "attach" => {
            let path = required(arg, "/attach <path>")?;
            let file = ImageFile::from_path(Path::new(path)).await?;
            session
                .stage_attachment(file)
                .await?;
            if let Some(line) = render_attachment(session.attachment(), theme) {
                print_lines(&[line])?;
            }
        }
        "detach" => {
            session.remove_attachment();
            println!("Attachment removed.");
        }
        "regen" => {
            if session.regenerate()? {
                println!("Restored: {}", session.input());
                println!("Press enter to resend, or type a new message.");
            } else {
                println!("Nothing to regenerate.");
            }
        }
        "model" => {
            let model = required(arg, "/model <name>")?;
            session.set_model(model);
            println!("Model set to {model}.");
        }
        "key" => {
            let key = required(arg, "/key <value>")?;
            session.provide_credential(key)?;
            println!("API key saved ({}).", masked(key));
        }
        other => println!("Unknown command /{other}. Type /help for commands."),
    }
    Ok(Flow::Continue)
}

fn required<'a>(arg: &'a str, usage: &str) -> CliResult<&'a str> {
    if arg.is_empty() {
        return Err(format!("usage: {usage}").into());
    }
    Ok(arg)
}

fn print_history(session: &Session) {
    let history = session.history();
    if history.is_empty() {
        println!("No conversations yet.");
        return;
    }
    for summary in history {
        let when = summary.timestamp.format("%Y-%m-%d %H:%M");
        let title = if summary.title.is_empty() {
            "(untitled)"
        } else {
            summary.title.as_str()
        };
        println!("  {}  {when}  {title}", summary.id);
    }
}

async fn cmd_send(
    cli: &Cli,
    text: &str,
    image: Option<&Path>,
    conversation: Option<&str>,
) -> CliResult {
    let (mut session, view) = open_session(cli)?;

    if let Some(id) = conversation {
        session.select_conversation(&ConversationId::new(id)).await?;
    }
    if let Some(path) = image {
        let file = ImageFile::from_path(path).await?;
        session.stage_attachment(file).await?;
    }

    session.set_input(text);
    let outcome = session.submit().await;
    let reply = session
        .messages()
        .last()
        .filter(|m| !m.is_user)
        .map(|m| m.text.clone());

    match outcome {
        SubmitOutcome::Ignored(SubmitIgnored::EmptyInput) => Err("nothing to send".into()),
        SubmitOutcome::Ignored(reason) => Err(format!("request not sent: {reason:?}").into()),
        SubmitOutcome::Committed => {
            if let Some(reply) = reply {
                print_lines(&render_markdown(&reply, terminal_width(), &Theme::default()))?;
            }
            if let Some(id) = session.conversation_id() {
                eprintln!("conversation: {id}");
            }
            Ok(())
        }
        SubmitOutcome::Failed(err) => {
            if let Some(reply) = reply {
                println!("{reply}");
            }
            print_credential_hint(&view);
            Err(err.into())
        }
    }
}

async fn cmd_history(cli: &Cli, json: bool) -> CliResult {
    let (mut session, _view) = open_session(cli)?;
    session.refresh_history().await?;

    if json {
        println!("{}", serde_json::to_string_pretty(session.history())?);
        return Ok(());
    }
    print_history(&session);
    Ok(())
}

async fn cmd_show(cli: &Cli, id: &str) -> CliResult {
    let (mut session, _view) = open_session(cli)?;
    session.select_conversation(&ConversationId::new(id)).await?;

    let lines = render_transcript(session.messages(), false, terminal_width(), &Theme::default());
    print_lines(&lines)?;
    Ok(())
}

async fn cmd_delete(cli: &Cli, id: &str) -> CliResult {
    let (mut session, _view) = open_session(cli)?;
    session.delete_conversation(&ConversationId::new(id)).await?;
    println!("Deleted conversation {id}.");
    Ok(())
}

fn cmd_init(cli: &Cli) -> CliResult {
    let dir = cli
        .config
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new(RXPLAIN_DIR));
    std::fs::create_dir_all(dir)?;

    if cli.config.exists() {
        println!("Config already exists at {}", cli.config.display());
        return Ok(());
    }

    let config = load_config(cli)?;
    config.save(&cli.config)?;
    println!("Created {}", cli.config.display());
    println!("  base_url: {}", config.base_url);
    println!("  default_model: {}", config.default_model);
    Ok(())
}

fn cmd_key(cli: &Cli, action: &KeyAction) -> CliResult {
    let store = credential_store(cli);
    match action {
        KeyAction::Set { value } => {
            let value = value.trim();
            if value.is_empty() {
                return Err("API key must not be empty".into());
            }
            store.set(OPENAI_API_KEY, value)?;
            println!("API key saved to {}", store.path().display());
        }
        KeyAction::Show => match store.get(OPENAI_API_KEY)? {
            Some(key) => println!("{}", masked(&key)),
            None => println!("No API key set"),
        },
        KeyAction::Clear => {
            store.remove(OPENAI_API_KEY)?;
            println!("API key removed");
        }
    }
    Ok(())
}
