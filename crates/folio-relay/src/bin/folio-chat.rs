//! Command-line front end for the folio relays.
//!
//! ```bash
//! # Talk to the chat relay, one line per message
//! FOLIO_FUNCTIONS_URL=https://<project>.example.co/functions/v1 FOLIO_API_KEY=... folio-chat chat
//!
//! # Send a contact form
//! folio-chat contact --name Ada --email ada@example.org --message "Hello!"
//! ```

use anyhow::Context;
use clap::{Parser, Subcommand};
use folio_relay::{ChatSession, ContactForm, FolioRelay};
use std::io::{self, Write};
use tokio::io::{AsyncBufReadExt, BufReader};

#[derive(Parser)]
#[command(name = "folio-chat")]
#[command(about = "Chat with the portfolio assistant or send a contact message")]
struct Args {
    /// Base URL of the functions gateway
    #[arg(long, env = "FOLIO_FUNCTIONS_URL")]
    base_url: String,

    /// Public project key
    #[arg(long, env = "FOLIO_API_KEY", hide_env_values = true)]
    api_key: String,

    /// Session token of a signed-in user
    #[arg(long, env = "FOLIO_ACCESS_TOKEN", hide_env_values = true)]
    access_token: Option<String>,

    /// Fail a reply once this many bytes pile up behind a line that failed to parse
    #[arg(long, env = "FOLIO_PENDING_LIMIT")]
    pending_limit: Option<usize>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Interactive chat over stdin
    Chat,
    /// Submit the contact form
    Contact {
        #[arg(long)]
        name: String,
        #[arg(long)]
        email: String,
        #[arg(long)]
        subject: Option<String>,
        #[arg(long)]
        message: String,
    },
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    pretty_env_logger::init();

    let args = Args::parse();
    let relay = FolioRelay::builder()
        .base_url(args.base_url)
        .api_key(args.api_key)
        .maybe_access_token(args.access_token)
        .maybe_pending_limit(args.pending_limit)
        .build();

    match args.command {
        Command::Chat => chat(relay).await,
        Command::Contact {
            name,
            email,
            subject,
            message,
        } => {
            let form = ContactForm::builder()
                .name(name)
                .email(email)
                .maybe_subject(subject)
                .message(message)
                .build();
            let ack = relay
                .submit_contact(&form)
                .await
                .context("contact form was not accepted")?;
            match ack.message {
                Some(message) => println!("{message}"),
                None if ack.success => println!("Message sent."),
                None => println!("The relay did not confirm delivery."),
            }
            Ok(())
        }
    }
}

async fn chat(relay: FolioRelay) -> anyhow::Result<()> {
    let mut session = ChatSession::new(relay);
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    print_prompt()?;
    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            print_prompt()?;
            continue;
        }

        // Print only the part of the reply not yet on screen
        let reply_index = session.messages().len() + 1;
        let mut printed = 0usize;
        let result = session
            .send(&line, |messages| {
                if let Some(reply) = messages.get(reply_index).filter(|m| m.is_assistant()) {
                    print!("{}", &reply.content[printed..]);
                    let _ = io::stdout().flush();
                    printed = reply.content.len();
                }
            })
            .await;
        println!();

        if let Err(err) = result {
            eprintln!("error: {}", err.api_message().map_or_else(|| err.to_string(), str::to_string));
        }
        print_prompt()?;
    }

    Ok(())
}

fn print_prompt() -> io::Result<()> {
    print!("> ");
    io::stdout().flush()
}
