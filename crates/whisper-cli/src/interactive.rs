//! The `client` subcommand's interactive session.
//!
//! One command per line, space-separated. `notes/create` and `msg/send`
//! then read a multi-line text block terminated by a line containing a
//! single `.` — the line-based equivalent of the raw-mode terminal's EOT
//! keystroke, since this binary deliberately does not implement a raw-mode
//! line editor (out of scope; see the design notes).

use std::io::Write as _;

use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};
use whisper_client::Client;

use crate::error::CliError;

const BODY_TERMINATOR: &str = ".";

/// Run the interactive command loop against an authenticated connection
/// until stdin closes.
pub async fn run(client: &Client) -> Result<(), CliError> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    print_help();
    prompt(client.nick());

    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            prompt(client.nick());
            continue;
        }
        if let Err(e) = dispatch(client, line, &mut lines).await {
            eprintln_error(&e);
        }
        prompt(client.nick());
    }
    Ok(())
}

async fn dispatch(
    client: &Client,
    line: &str,
    lines: &mut Lines<BufReader<Stdin>>,
) -> Result<(), CliError> {
    let (verb, rest) = line.split_once(' ').unwrap_or((line, ""));
    match verb {
        "notes/create" => {
            let title = rest.trim();
            let body = read_block(lines).await?;
            client.create_note(title, &body).await?;
            println_out("note stored");
        },
        "notes/get" => {
            let id = parse_id(rest)?;
            let (title, body) = client.get_note(id).await?;
            println_out(&format!("{title}\n{body}"));
        },
        "notes/list" => {
            let notes = client.list_notes().await?;
            for note in notes {
                println_out(&format!("{}: {}", note.id, note.title));
            }
        },
        "keys/get" => {
            let nick = rest.trim();
            let key = client.get_key(nick).await?;
            println_out(&format!("n={} e={}", key.n, key.e));
        },
        "msg/send" => {
            let to = rest.trim();
            let body = read_block(lines).await?;
            client.send_message(to, &body).await?;
            println_out("message sent");
        },
        "msg/list" => {
            let messages = client.list_messages().await?;
            for message in messages {
                println_out(&format!("{}: {}", message.id, message.from));
            }
        },
        "msg/get" => {
            let id = parse_id(rest)?;
            let (from, text) = client.get_message(id).await?;
            println_out(&format!("{from}: {text}"));
        },
        other => {
            println_out(&format!("unrecognized command: {other}"));
        },
    }
    Ok(())
}

fn parse_id(rest: &str) -> Result<u64, CliError> {
    rest.trim()
        .parse()
        .map_err(|_| CliError::MissingFlag(format!("expected a numeric id, got {rest:?}")))
}

async fn read_block(lines: &mut Lines<BufReader<Stdin>>) -> Result<String, CliError> {
    let mut body = String::new();
    while let Some(line) = lines.next_line().await? {
        if line == BODY_TERMINATOR {
            break;
        }
        if !body.is_empty() {
            body.push('\n');
        }
        body.push_str(&line);
    }
    Ok(body)
}

fn print_help() {
    println_out(
        "commands: notes/create <title>, notes/get <id>, notes/list, keys/get <nick>, \
         msg/send <nick>, msg/list, msg/get <id> (text blocks end with a line containing only \".\")",
    );
}

fn prompt(nick: &str) {
    let mut stdout = std::io::stdout();
    let _ = write!(stdout, "{nick}> ");
    let _ = stdout.flush();
}

fn println_out(message: &str) {
    let mut stdout = std::io::stdout();
    let _ = writeln!(stdout, "{message}");
}

fn eprintln_error(err: &CliError) {
    let mut stderr = std::io::stderr();
    let _ = writeln!(stderr, "error: {err}");
}
