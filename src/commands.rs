//! Command definitions and their mapping onto API calls.
//!
//! Output is pretty-printed JSON of the decoded records on stdout.

use clap::{Args, Subcommand};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::api::types::{
  DomainCreate, DomainSettingsUpdate, Resource, SenderCreate, SenderUpdate, SmtpUserInput,
  TokenCreate, TokenStatus, TokenUpdate,
};
use crate::api::{Attachment, EmailMessage, MailClient, Recipient, ResourceClient};
use crate::cache::{CacheStore, SqliteStore, SystemClock};
use crate::config::{CacheBackend, Config};
use crate::error::{Error, Result};

/// How a command finished when it did not fail outright.
#[derive(Debug, PartialEq, Eq)]
pub enum Outcome {
  Done,
  /// Reported to the user, exits non-zero
  Failed(String),
}

#[derive(Subcommand, Debug)]
pub enum Command {
  /// Manage sending domains
  #[command(visible_alias = "d")]
  Domains {
    #[command(subcommand)]
    action: DomainAction,
  },
  /// Manage sender identities
  #[command(visible_alias = "s")]
  Senders {
    #[command(subcommand)]
    action: SenderAction,
  },
  /// Manage API tokens
  #[command(visible_alias = "t")]
  Tokens {
    #[command(subcommand)]
    action: TokenAction,
  },
  /// Browse and delete templates
  Templates {
    #[command(subcommand)]
    action: TemplateAction,
  },
  /// Manage SMTP users of a domain
  SmtpUsers {
    /// Domain the SMTP users belong to
    #[arg(long)]
    domain: String,
    #[command(subcommand)]
    action: SmtpUserAction,
  },
  /// Send email
  #[command(visible_alias = "e")]
  Email {
    #[command(subcommand)]
    action: EmailAction,
  },
  /// Reset the local list cache
  Cache {
    #[command(subcommand)]
    action: CacheAction,
  },
}

#[derive(Args, Debug, Clone, Copy)]
pub struct PageArgs {
  /// Records per page (1-100)
  #[arg(long, default_value_t = 25, allow_negative_numbers = true)]
  pub limit: i64,
  /// Page to start from (defaults to the resource's first page)
  #[arg(long, allow_negative_numbers = true)]
  pub page: Option<i64>,
}

#[derive(Subcommand, Debug)]
pub enum DomainAction {
  /// List domains
  List(PageArgs),
  /// Show one domain
  Get { id: String },
  /// Add a domain
  Create {
    name: String,
    #[arg(long)]
    return_path_subdomain: Option<String>,
    #[arg(long)]
    custom_tracking_subdomain: Option<String>,
    #[arg(long)]
    inbound_routing_subdomain: Option<String>,
  },
  /// Change domain settings
  Update {
    id: String,
    #[arg(long)]
    send_paused: Option<bool>,
    #[arg(long)]
    track_clicks: Option<bool>,
    #[arg(long)]
    track_opens: Option<bool>,
    #[arg(long)]
    track_unsubscribe: Option<bool>,
    #[arg(long)]
    track_content: Option<bool>,
    #[arg(long)]
    custom_tracking_enabled: Option<bool>,
    #[arg(long)]
    custom_tracking_subdomain: Option<String>,
    #[arg(long)]
    precedence_bulk: Option<bool>,
    #[arg(long)]
    ignore_duplicated_recipients: Option<bool>,
  },
  /// Delete a domain
  Delete { id: String },
}

#[derive(Subcommand, Debug)]
pub enum SenderAction {
  /// List sender identities
  List(PageArgs),
  /// Show one sender identity
  Get { id: String },
  /// Add a sender identity
  Create {
    #[arg(long)]
    domain_id: String,
    #[arg(long)]
    name: String,
    #[arg(long)]
    email: String,
    #[arg(long)]
    reply_to_email: Option<String>,
    #[arg(long)]
    reply_to_name: Option<String>,
    #[arg(long)]
    add_note: Option<bool>,
    #[arg(long)]
    personal_note: Option<String>,
  },
  /// Change a sender identity
  Update {
    id: String,
    #[arg(long)]
    name: Option<String>,
    #[arg(long)]
    reply_to_email: Option<String>,
    #[arg(long)]
    reply_to_name: Option<String>,
    #[arg(long)]
    add_note: Option<bool>,
    #[arg(long)]
    personal_note: Option<String>,
  },
  /// Delete a sender identity
  Delete { id: String },
}

#[derive(Subcommand, Debug)]
pub enum TokenAction {
  /// List API tokens
  List(PageArgs),
  /// Show one API token
  Get { id: String },
  /// Create an API token; the secret is printed once
  Create {
    #[arg(long)]
    name: String,
    #[arg(long)]
    domain_id: String,
    /// Permission scope, repeatable (e.g. email_full)
    #[arg(long = "scope", required = true)]
    scopes: Vec<String>,
  },
  /// Pause an API token
  Pause { id: String },
  /// Resume a paused API token
  Unpause { id: String },
  /// Delete an API token
  Delete { id: String },
}

#[derive(Subcommand, Debug)]
pub enum TemplateAction {
  /// List templates
  List(PageArgs),
  /// Show one template
  Get { id: String },
  /// Delete a template
  Delete { id: String },
}

#[derive(Subcommand, Debug)]
pub enum SmtpUserAction {
  /// List SMTP users
  List(PageArgs),
  /// Show one SMTP user
  Get { id: String },
  /// Add an SMTP user; the password is printed once
  Create {
    #[arg(long)]
    name: String,
    #[arg(long)]
    enabled: Option<bool>,
  },
  /// Change an SMTP user
  Update {
    id: String,
    #[arg(long)]
    name: String,
    #[arg(long)]
    enabled: Option<bool>,
  },
  /// Delete an SMTP user
  Delete { id: String },
}

#[derive(Subcommand, Debug)]
pub enum EmailAction {
  /// Send a single message
  Send(SendArgs),
  /// Send every message of a JSON file (an array of messages), in order
  Bulk { file: PathBuf },
}

#[derive(Args, Debug)]
pub struct SendArgs {
  #[arg(long)]
  pub from: String,
  #[arg(long)]
  pub from_name: Option<String>,
  /// Recipient, repeatable
  #[arg(long, required = true)]
  pub to: Vec<String>,
  #[arg(long)]
  pub cc: Vec<String>,
  #[arg(long)]
  pub bcc: Vec<String>,
  #[arg(long)]
  pub reply_to: Option<String>,
  #[arg(long)]
  pub subject: Option<String>,
  #[arg(long)]
  pub text: Option<String>,
  #[arg(long)]
  pub html: Option<String>,
  #[arg(long)]
  pub template_id: Option<String>,
  #[arg(long = "tag")]
  pub tags: Vec<String>,
  /// File to attach, repeatable
  #[arg(long = "attach")]
  pub attachments: Vec<PathBuf>,
  /// Unix timestamp to schedule delivery at
  #[arg(long)]
  pub send_at: Option<i64>,
}

impl SendArgs {
  fn into_message(self) -> Result<EmailMessage> {
    let attachments = self
      .attachments
      .iter()
      .map(|path| Attachment::from_path(path))
      .collect::<Result<Vec<_>>>()?;

    Ok(EmailMessage {
      from: Recipient {
        email: self.from,
        name: self.from_name,
      },
      to: self.to.into_iter().map(Recipient::new).collect(),
      cc: self.cc.into_iter().map(Recipient::new).collect(),
      bcc: self.bcc.into_iter().map(Recipient::new).collect(),
      reply_to: self.reply_to.map(Recipient::new),
      subject: self.subject,
      text: self.text,
      html: self.html,
      template_id: self.template_id,
      tags: self.tags,
      attachments,
      send_at: self.send_at,
      ..Default::default()
    })
  }
}

#[derive(Subcommand, Debug)]
pub enum CacheAction {
  /// Drop every cached list
  Clear,
}

pub async fn run(command: Command, config: &Config) -> Result<Outcome> {
  match command {
    Command::Domains { action } => run_domains(&connect(config)?, action).await,
    Command::Senders { action } => run_senders(&connect(config)?, action).await,
    Command::Tokens { action } => run_tokens(&connect(config)?, action).await,
    Command::Templates { action } => run_templates(&connect(config)?, action).await,
    Command::SmtpUsers { domain, action } => {
      run_smtp_users(&connect(config)?, &domain, action).await
    }
    Command::Email { action } => run_email(&connect(config)?, action).await,
    Command::Cache { action } => run_cache(config, action),
  }
}

fn connect(config: &Config) -> Result<MailClient> {
  MailClient::from_config(config, Config::get_api_key())
}

fn run_cache(config: &Config, action: CacheAction) -> Result<Outcome> {
  match action {
    CacheAction::Clear => {
      match config.cache.backend {
        CacheBackend::Sqlite => {
          let path = SqliteStore::default_path()?;
          clear_sqlite_cache(&path)?;
          eprintln!("Cache cleared: {}", path.display());
        }
        CacheBackend::Memory | CacheBackend::None => {
          eprintln!("Cache is not persisted, nothing to clear");
        }
      }
      Ok(Outcome::Done)
    }
  }
}

/// Opens the file directly so a cache that cannot be opened is reported,
/// not silently swapped for an empty one.
fn clear_sqlite_cache(path: &Path) -> Result<()> {
  SqliteStore::open_at(path, Arc::new(SystemClock))?.clear()
}

async fn run_domains(client: &MailClient, action: DomainAction) -> Result<Outcome> {
  let domains = client.domains();
  match action {
    DomainAction::List(args) => list(domains, args).await,
    DomainAction::Get { id } => print_json(&domains.find(&id).await?),
    DomainAction::Create {
      name,
      return_path_subdomain,
      custom_tracking_subdomain,
      inbound_routing_subdomain,
    } => {
      let payload = DomainCreate {
        name,
        return_path_subdomain,
        custom_tracking_subdomain,
        inbound_routing_subdomain,
      };
      print_json(&domains.create(&payload).await?)
    }
    DomainAction::Update {
      id,
      send_paused,
      track_clicks,
      track_opens,
      track_unsubscribe,
      track_content,
      custom_tracking_enabled,
      custom_tracking_subdomain,
      precedence_bulk,
      ignore_duplicated_recipients,
    } => {
      let payload = DomainSettingsUpdate {
        send_paused,
        track_clicks,
        track_opens,
        track_unsubscribe,
        track_content,
        custom_tracking_enabled,
        custom_tracking_subdomain,
        precedence_bulk,
        ignore_duplicated_recipients,
      };
      print_json(&domains.update(&id, &payload).await?)
    }
    DomainAction::Delete { id } => delete(domains, &id).await,
  }
}

async fn run_senders(client: &MailClient, action: SenderAction) -> Result<Outcome> {
  let senders = client.senders();
  match action {
    SenderAction::List(args) => list(senders, args).await,
    SenderAction::Get { id } => print_json(&senders.find(&id).await?),
    SenderAction::Create {
      domain_id,
      name,
      email,
      reply_to_email,
      reply_to_name,
      add_note,
      personal_note,
    } => {
      let payload = SenderCreate {
        domain_id,
        name,
        email,
        reply_to_email,
        reply_to_name,
        add_note,
        personal_note,
      };
      print_json(&senders.create(&payload).await?)
    }
    SenderAction::Update {
      id,
      name,
      reply_to_email,
      reply_to_name,
      add_note,
      personal_note,
    } => {
      let payload = SenderUpdate {
        name,
        reply_to_email,
        reply_to_name,
        add_note,
        personal_note,
      };
      print_json(&senders.update(&id, &payload).await?)
    }
    SenderAction::Delete { id } => delete(senders, &id).await,
  }
}

async fn run_tokens(client: &MailClient, action: TokenAction) -> Result<Outcome> {
  let tokens = client.tokens();
  match action {
    TokenAction::List(args) => list(tokens, args).await,
    TokenAction::Get { id } => print_json(&tokens.find(&id).await?),
    TokenAction::Create {
      name,
      domain_id,
      scopes,
    } => {
      let payload = TokenCreate {
        name,
        domain_id,
        scopes,
      };
      print_json(&tokens.create(&payload).await?)
    }
    TokenAction::Pause { id } => {
      let payload = TokenUpdate {
        status: TokenStatus::Pause,
      };
      print_json(&tokens.update(&id, &payload).await?)
    }
    TokenAction::Unpause { id } => {
      let payload = TokenUpdate {
        status: TokenStatus::Unpause,
      };
      print_json(&tokens.update(&id, &payload).await?)
    }
    TokenAction::Delete { id } => delete(tokens, &id).await,
  }
}

async fn run_templates(client: &MailClient, action: TemplateAction) -> Result<Outcome> {
  let templates = client.templates();
  match action {
    TemplateAction::List(args) => list(templates, args).await,
    TemplateAction::Get { id } => print_json(&templates.find(&id).await?),
    TemplateAction::Delete { id } => delete(templates, &id).await,
  }
}

async fn run_smtp_users(
  client: &MailClient,
  domain_id: &str,
  action: SmtpUserAction,
) -> Result<Outcome> {
  let smtp_users = client.smtp_users(domain_id)?;
  match action {
    SmtpUserAction::List(args) => list(&smtp_users, args).await,
    SmtpUserAction::Get { id } => print_json(&smtp_users.find(&id).await?),
    SmtpUserAction::Create { name, enabled } => {
      print_json(&smtp_users.create(&SmtpUserInput { name, enabled }).await?)
    }
    SmtpUserAction::Update { id, name, enabled } => {
      print_json(&smtp_users.update(&id, &SmtpUserInput { name, enabled }).await?)
    }
    SmtpUserAction::Delete { id } => delete(&smtp_users, &id).await,
  }
}

async fn run_email(client: &MailClient, action: EmailAction) -> Result<Outcome> {
  match action {
    EmailAction::Send(args) => {
      let message = args.into_message()?;
      print_json(&client.email().send(&message).await?)
    }
    EmailAction::Bulk { file } => {
      let messages = read_bulk_file(&file)?;
      print_json(&client.email().bulk_send(&messages).await?)
    }
  }
}

async fn list<T: Resource>(client: &ResourceClient<T>, args: PageArgs) -> Result<Outcome> {
  let page = args.page.unwrap_or_else(|| client.first_page());
  print_json(&client.all(args.limit, page).await?)
}

async fn delete<T: Resource>(client: &ResourceClient<T>, id: &str) -> Result<Outcome> {
  if client.delete(id).await? {
    eprintln!("Deleted {} {}", singular(T::NAME), id);
    Ok(Outcome::Done)
  } else {
    Ok(Outcome::Failed(format!(
      "Could not delete {} {}",
      singular(T::NAME),
      id
    )))
  }
}

fn singular(name: &str) -> &str {
  name.strip_suffix('s').unwrap_or(name)
}

fn read_bulk_file(path: &Path) -> Result<Vec<EmailMessage>> {
  let contents = std::fs::read_to_string(path)
    .map_err(|e| Error::invalid(format!("Failed to read {}: {}", path.display(), e)))?;

  let messages: Vec<EmailMessage> = serde_json::from_str(&contents)
    .map_err(|e| Error::invalid(format!("Failed to parse {}: {}", path.display(), e)))?;

  if messages.is_empty() {
    return Err(Error::invalid(format!("{} contains no messages", path.display())));
  }
  Ok(messages)
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<Outcome> {
  let out = serde_json::to_string_pretty(value)
    .map_err(|e| Error::unexpected("Failed to render output", e))?;
  println!("{}", out);
  Ok(Outcome::Done)
}
