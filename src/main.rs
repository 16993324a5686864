use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

use pitbox::auth::persist::FileSessionPersistence;
use pitbox::auth::refresh::{DEFAULT_REFRESH_TICK_SECS, spawn_auto_refresh};
use pitbox::auth::{AuthClient, AuthError, SignUpOutcome};
use pitbox::config::{BackendConfig, ConfigError};
use pitbox::data::types::{DocumentType, ProfileUpdate, TeamStatus, TeamUpdate};
use pitbox::data::{ApiError, DocumentStatus, RegistrationApi, RegistrationForm};
use pitbox::guard::{MemoryNavigator, Navigator, RouteLocation, RouteTable, spawn_route_guard};
use pitbox::session::{SessionHandle, SessionStore};

const CONFIRM_EMAIL: &str = "Please check your inbox for email verification!";

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("auth failed [{code}]: {0}", code = .0.error_code())]
    Auth(#[from] AuthError),
    #[error("request failed [{code}]: {0}", code = .0.error_code())]
    Api(#[from] ApiError),
    #[error("invalid JSON payload: {0}")]
    InvalidJson(#[from] serde_json::Error),
    #[error("io failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("not signed in; run `pitbox login` first")]
    NotSignedIn,
}

#[derive(Parser, Debug)]
#[command(name = "pitbox", about = "Event registration client")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Sign in with email and password.
    Login(Credentials),
    /// Create an account.
    Signup(Credentials),
    /// Sign out and forget the stored session.
    Logout,
    /// Show the signed-in user.
    Whoami,
    /// Profile, entries and teams in one view.
    Home,
    Events(EventsCommand),
    /// List the caller's entries.
    Entries,
    /// Register for an event class.
    Register(RegisterArgs),
    Teams(TeamsCommand),
    Profile(ProfileCommand),
    Documents(DocumentsCommand),
    /// Run the session store and route guard against an in-memory navigator.
    /// Reads paths from stdin (`back` and `logout` are also accepted).
    Watch {
        #[arg(long, default_value = "/")]
        start: String,
    },
}

#[derive(Args, Debug)]
struct Credentials {
    #[arg(long)]
    email: String,
    #[arg(long, env = "PITBOX_PASSWORD")]
    password: String,
}

#[derive(Args, Debug)]
struct EventsCommand {
    #[command(subcommand)]
    command: EventsSubcommand,
}

#[derive(Subcommand, Debug)]
enum EventsSubcommand {
    List,
    Show { event_id: Uuid },
}

#[derive(Args, Debug)]
struct RegisterArgs {
    event_id: Uuid,
    #[arg(long)]
    class_id: Option<Uuid>,
    /// Defaults to the profile's name.
    #[arg(long)]
    driver_name: Option<String>,
    /// Defaults to the profile's email.
    #[arg(long)]
    driver_email: Option<String>,
    #[arg(long)]
    kart_number: Option<String>,
}

#[derive(Args, Debug)]
struct TeamsCommand {
    #[command(subcommand)]
    command: TeamsSubcommand,
}

#[derive(Subcommand, Debug)]
enum TeamsSubcommand {
    List,
    Show {
        team_id: Uuid,
    },
    Update {
        team_id: Uuid,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        logo: Option<String>,
        #[arg(long, value_parser = parse_team_status)]
        status: Option<TeamStatus>,
    },
}

#[derive(Args, Debug)]
struct ProfileCommand {
    #[command(subcommand)]
    command: ProfileSubcommand,
}

#[derive(Subcommand, Debug)]
enum ProfileSubcommand {
    Show,
    Update {
        #[arg(long)]
        first_name: Option<String>,
        #[arg(long)]
        last_name: Option<String>,
        #[arg(long)]
        email: Option<String>,
        #[arg(long)]
        phone: Option<String>,
        #[arg(long)]
        team_name: Option<String>,
        #[arg(long)]
        avatar_url: Option<String>,
    },
}

#[derive(Args, Debug)]
struct DocumentsCommand {
    #[command(subcommand)]
    command: DocumentsSubcommand,
}

#[derive(Subcommand, Debug)]
enum DocumentsSubcommand {
    List,
    /// Required document types and whether each is uploaded.
    Status,
    Upload {
        #[arg(value_parser = parse_document_type)]
        document_type: DocumentType,
        file: PathBuf,
    },
    /// Print a viewing link for a stored document path.
    Url { path: String },
}

/// Everything a command may need, built once per run.
struct CliContext {
    config: BackendConfig,
    auth: Arc<AuthClient>,
    store: SessionStore,
    api: RegistrationApi,
}

impl CliContext {
    async fn build() -> Result<Self, CliError> {
        let config = BackendConfig::from_env()?;
        let http = config.http_client()?;
        let persistence = Arc::new(FileSessionPersistence::new(config.session_path.clone()));
        let auth = Arc::new(AuthClient::new(&config, http.clone(), persistence));
        let store = SessionStore::init(auth.clone());
        let mut handle = store.handle();
        handle.loaded().await;
        let api = RegistrationApi::new(&config, http, handle);
        Ok(Self { config, auth, store, api })
    }

    fn session(&self) -> SessionHandle {
        self.store.handle()
    }

    fn require_signed_in(&self) -> Result<(), CliError> {
        if self.session().is_authenticated() { Ok(()) } else { Err(CliError::NotSignedIn) }
    }
}

#[tokio::main]
async fn main() -> Result<(), CliError> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn,pitbox=info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let ctx = CliContext::build().await?;
    let result = run(&ctx, cli.command).await;
    ctx.store.teardown();
    result
}

async fn run(ctx: &CliContext, command: Command) -> Result<(), CliError> {
    match command {
        Command::Login(creds) => {
            let session = ctx.auth.sign_in_with_password(&creds.email, &creds.password).await?;
            println!("signed in as {}", session.user.email.as_deref().unwrap_or("unknown"));
            Ok(())
        }
        Command::Signup(creds) => {
            match ctx.auth.sign_up(&creds.email, &creds.password).await? {
                SignUpOutcome::SignedIn(session) => {
                    println!("signed in as {}", session.user.email.as_deref().unwrap_or("unknown"));
                }
                SignUpOutcome::ConfirmationRequired { .. } => println!("{CONFIRM_EMAIL}"),
            }
            Ok(())
        }
        Command::Logout => {
            ctx.auth.sign_out().await?;
            println!("signed out");
            Ok(())
        }
        Command::Whoami => {
            let session = ctx.session().session().ok_or(CliError::NotSignedIn)?;
            print_json(&session.user)
        }
        Command::Home => run_home(ctx).await,
        Command::Events(events) => match events.command {
            EventsSubcommand::List => print_json(&*ctx.api.events().await?),
            EventsSubcommand::Show { event_id } => print_json(&*ctx.api.event(event_id).await?),
        },
        Command::Entries => print_json(&*ctx.api.my_entries().await?),
        Command::Register(args) => run_register(ctx, args).await,
        Command::Teams(teams) => run_teams(ctx, teams).await,
        Command::Profile(profile) => run_profile(ctx, profile).await,
        Command::Documents(documents) => run_documents(ctx, documents).await,
        Command::Watch { start } => run_watch(ctx, &start).await,
    }
}

async fn run_home(ctx: &CliContext) -> Result<(), CliError> {
    #[derive(Serialize)]
    struct Home<'a> {
        profile: &'a pitbox::data::types::Profile,
        entries: &'a [pitbox::data::types::EntryWithEvent],
        teams: &'a [pitbox::data::types::Membership],
    }

    ctx.require_signed_in()?;
    let (profile, entries, teams) =
        futures::try_join!(ctx.api.profile(), ctx.api.my_entries(), ctx.api.my_teams())?;
    print_json(&Home { profile: &profile, entries: &entries, teams: &teams })
}

async fn run_register(ctx: &CliContext, args: RegisterArgs) -> Result<(), CliError> {
    ctx.require_signed_in()?;
    let profile = ctx.api.profile().await.ok();
    let mut form = RegistrationForm::prefilled(args.event_id, profile.as_deref());
    form.class_id = args.class_id;
    if let Some(name) = args.driver_name {
        form.driver_name = name;
    }
    if let Some(email) = args.driver_email {
        form.driver_email = email;
    }
    form.kart_number = args.kart_number.unwrap_or_default();

    let entry = ctx.api.register_for_event(form).await?;
    print_json(&entry)
}

async fn run_teams(ctx: &CliContext, teams: TeamsCommand) -> Result<(), CliError> {
    match teams.command {
        TeamsSubcommand::List => print_json(&*ctx.api.my_teams().await?),
        TeamsSubcommand::Show { team_id } => print_json(&*ctx.api.team(team_id).await?),
        TeamsSubcommand::Update { team_id, name, logo, status } => {
            let update = TeamUpdate { name, logo, status, updated_by: None };
            print_json(&ctx.api.update_team(team_id, update).await?)
        }
    }
}

async fn run_profile(ctx: &CliContext, profile: ProfileCommand) -> Result<(), CliError> {
    match profile.command {
        ProfileSubcommand::Show => print_json(&*ctx.api.profile().await?),
        ProfileSubcommand::Update { first_name, last_name, email, phone, team_name, avatar_url } => {
            let update = ProfileUpdate { first_name, last_name, email, phone, team_name, avatar_url };
            print_json(&*ctx.api.update_profile(update).await?)
        }
    }
}

async fn run_documents(ctx: &CliContext, documents: DocumentsCommand) -> Result<(), CliError> {
    match documents.command {
        DocumentsSubcommand::List => print_json(&*ctx.api.documents().await?),
        DocumentsSubcommand::Status => {
            let documents = ctx.api.documents().await?;
            let checklist = DocumentStatus::checklist(&documents);
            let uploaded = checklist.iter().filter(|s| s.is_uploaded()).count();
            println!("{uploaded} of {} required documents uploaded", checklist.len());
            for status in &checklist {
                let mark = if status.is_uploaded() { "x" } else { " " };
                println!("[{mark}] {}", status.document_type.label());
            }
            Ok(())
        }
        DocumentsSubcommand::Upload { document_type, file } => {
            let document = ctx.api.upload_document_file(&file, document_type).await?;
            print_json(&document)
        }
        DocumentsSubcommand::Url { path } => {
            println!("{}", ctx.api.document_url(&path).await?);
            Ok(())
        }
    }
}

async fn run_watch(ctx: &CliContext, start: &str) -> Result<(), CliError> {
    let navigator = Arc::new(MemoryNavigator::new(RouteLocation::parse(start)));
    let guard = spawn_route_guard(ctx.session(), navigator.clone(), RouteTable::default());
    let refresh = spawn_auto_refresh(ctx.auth.clone(), Duration::from_secs(DEFAULT_REFRESH_TICK_SECS));
    let mut locations = navigator.subscribe();

    tracing::info!(
        url = %ctx.config.url,
        location = %navigator.location(),
        authenticated = ctx.session().is_authenticated(),
        "watching session and navigation"
    );

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                match line.trim() {
                    "" => {}
                    "back" => {
                        if !navigator.back() {
                            tracing::debug!("already at the first history entry");
                        }
                    }
                    "logout" => {
                        if let Err(e) = ctx.auth.sign_out().await {
                            tracing::warn!(error = %e, "sign out failed");
                        }
                    }
                    path => navigator.push(&RouteLocation::parse(path)),
                }
            }
            changed = locations.changed() => {
                if changed.is_err() {
                    break;
                }
                println!("{}", *locations.borrow_and_update());
            }
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    guard.abort();
    refresh.abort();
    Ok(())
}

fn parse_document_type(raw: &str) -> Result<DocumentType, String> {
    raw.parse()
}

fn parse_team_status(raw: &str) -> Result<TeamStatus, String> {
    match raw {
        "active" => Ok(TeamStatus::Active),
        "inactive" => Ok(TeamStatus::Inactive),
        other => Err(format!("unknown team status: {other}")),
    }
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<(), CliError> {
    let rendered = serde_json::to_string_pretty(value)?;
    println!("{rendered}");
    Ok(())
}

#[cfg(test)]
#[path = "main_test.rs"]
mod tests;
