//! A line-driven month view.
//!
//! The remote store is fetched in the background while the user works; its result is applied,
//! according to the hydration policy, whenever it arrives.

use crate::api::Mode;
use crate::calendar::Clock;
use crate::commands::{open_store, Out};
use crate::render;
use crate::store::{CalendarStore, SaveOutcome};
use crate::{Config, Result};
use anyhow::Context;
use std::io::Write;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing::trace;

const HELP: &str = "Commands: n (next month), p (previous month), t (today), e <day> (edit a day), \
                    q (quit)";

/// Runs the interactive month view on stdin and stdout.
pub async fn interactive(config: Config, mode: Mode, clock: Clock) -> Result<Out<()>> {
    let store = open_store(&config, mode, clock)?;
    let input = BufReader::new(tokio::io::stdin());
    let mut output = std::io::stdout();
    let store = run_session(store, input, &mut output).await?;
    Ok(format!("Total saved: {}", store.total_for_all_entries()).into())
}

/// What a line typed at the month view asks for.
#[derive(Debug, Clone, Eq, PartialEq)]
enum Action {
    Next,
    Previous,
    Today,
    Edit(u32),
    Quit,
    Redraw,
    Unknown(String),
}

impl Action {
    fn parse(line: &str) -> Self {
        let mut words = line.split_whitespace();
        let first = words.next().unwrap_or_default();
        let second = words.next();
        match (first, second) {
            ("", None) => Action::Redraw,
            ("n" | "next", None) => Action::Next,
            ("p" | "prev", None) => Action::Previous,
            ("t" | "today", None) => Action::Today,
            ("q" | "quit", None) => Action::Quit,
            ("e" | "edit", Some(day)) => match day.parse() {
                Ok(day) => Action::Edit(day),
                Err(_) => Action::Unknown(line.to_string()),
            },
            _ => Action::Unknown(line.to_string()),
        }
    }
}

/// Drives `store` from the lines of `input`, drawing to `output`, until `q` or end of input.
/// Returns the store so its final state can be inspected.
pub(crate) async fn run_session<R, W>(
    mut store: CalendarStore,
    input: R,
    output: &mut W,
) -> Result<CalendarStore>
where
    R: AsyncBufRead + Unpin,
    W: Write,
{
    let (tx, mut rx) = mpsc::channel(1);
    let remote = store.remote();
    let mut ticket = Some(store.begin_hydration());
    tokio::spawn(async move {
        let _ = tx.send(remote.fetch_all().await).await;
    });

    let mut lines = input.lines();
    draw(&mut store, output)?;
    loop {
        tokio::select! {
            biased;
            Some(result) = rx.recv(), if ticket.is_some() => {
                if let Some(ticket) = ticket.take() {
                    if store.finish_hydration(ticket, result) {
                        draw(&mut store, output)?;
                    }
                }
            }
            line = lines.next_line() => {
                let Some(line) = line.context("Unable to read input")? else {
                    break;
                };
                if !handle_line(&mut store, &line, output).await? {
                    break;
                }
                draw(&mut store, output)?;
            }
        }
    }
    Ok(store)
}

/// Returns false when the session should end.
async fn handle_line<W: Write>(store: &mut CalendarStore, line: &str, output: &mut W) -> Result<bool> {
    if store.editor().is_some() {
        if line.trim() == "c" {
            store.cancel_editor();
            return Ok(true);
        }
        store.set_candidate(line.trim());
        let message = match store.save().await? {
            SaveOutcome::Saved { date, amount } => format!("Saved {amount} for {date}"),
            SaveOutcome::Deleted { date } => format!("Removed the entry for {date}"),
        };
        writeln!(output, "{message}").context("Unable to write output")?;
        return Ok(true);
    }

    match Action::parse(line) {
        Action::Next => store.change_month(1),
        Action::Previous => store.change_month(-1),
        Action::Today => store.go_to_today(),
        Action::Edit(day) => {
            if let Err(e) = store.open_editor(day) {
                writeln!(output, "{e}").context("Unable to write output")?;
            }
        }
        Action::Quit => return Ok(false),
        Action::Redraw => {}
        Action::Unknown(text) => {
            writeln!(output, "Unknown command '{text}'. {HELP}").context("Unable to write output")?
        }
    }
    Ok(true)
}

/// Draws the month, then the editor prompt if one is open. Input focus moves to the prompt only
/// after it has been drawn.
fn draw<W: Write>(store: &mut CalendarStore, output: &mut W) -> Result<()> {
    writeln!(output, "\n{}", render::month_view(store)).context("Unable to write output")?;
    let prompt = render::editor_prompt(store).unwrap_or_else(|| "> ".to_string());
    write!(output, "{prompt}").context("Unable to write output")?;
    if let Some(key) = store.take_focus_request() {
        trace!("Input focused on the amount for {key}");
    }
    output.flush().context("Unable to flush output")
}
