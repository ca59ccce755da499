use crate::events::{Channel, ModelKind, Turn};
use crate::llm::ChatBackend;
use crate::prompts::{CHECK_SYSTEM_PROMPT, CHECK_USER_MESSAGE};
use crate::session::{ConversationHistory, ConversationManager, Reply, Session};
use anyhow::{Context, Result};
use std::future::Future;
use std::io::{self, Write};
use std::sync::Arc;
use tokio::sync::mpsc;

const REASONING_HEADER: &str = "Assistant's thought process (reasoning_content):";
const ANSWER_HEADER: &str = "Assistant's final answer (content):";

/// Options for the interactive chat loop
#[derive(Debug, Clone)]
pub struct ChatOptions {
    pub model: ModelKind,
    pub system_prompt: Option<String>,
    pub streaming: bool,
}

/// Whether a line ends the chat loop
pub fn is_exit_command(input: &str) -> bool {
    let input = input.trim();
    input.eq_ignore_ascii_case("exit") || input.eq_ignore_ascii_case("quit")
}

/// Interactive chat on stdin/stdout
pub async fn run_chat(backend: Arc<dyn ChatBackend>, options: ChatOptions) -> Result<()> {
    let manager = ConversationManager::new(backend, options.model).with_streaming(options.streaming);
    let history = options
        .system_prompt
        .map(ConversationHistory::with_system)
        .unwrap_or_default();
    let mut session = Session::with_history(manager, history);

    chat_loop(&mut session, stdin_lines(), std::io::stdout(), interrupted).await
}

/// Lines typed on stdin.
///
/// A blocking read cannot be cancelled, so it runs on its own thread; leaving
/// the chat never waits for the user to press Enter.
pub fn stdin_lines() -> mpsc::Receiver<io::Result<String>> {
    let (tx, rx) = mpsc::channel(1);
    std::thread::spawn(move || {
        for line in io::stdin().lines() {
            if tx.blocking_send(line).is_err() {
                break;
            }
        }
    });
    rx
}

/// Resolves on Ctrl-C
pub async fn interrupted() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "failed to listen for Ctrl-C");
        std::future::pending::<()>().await;
    }
}

/// Read-eval-print loop over a line channel and arbitrary output.
///
/// One exchange is fully consumed before the next line is read. `interrupt`
/// is polled while waiting for input and while an answer streams: during an
/// exchange it abandons that exchange and returns to the prompt, at the
/// prompt it ends the loop. A closed channel also ends the loop.
pub async fn chat_loop<W, I, F>(
    session: &mut Session,
    mut lines: mpsc::Receiver<io::Result<String>>,
    mut out: W,
    mut interrupt: I,
) -> Result<()>
where
    W: Write,
    I: FnMut() -> F,
    F: Future<Output = ()>,
{
    let model = session.manager().model();
    writeln!(out, "Welcome to the interactive chat with {}!", model.display_name())?;
    writeln!(out, "Type your message and press Enter. Type 'exit' or 'quit' to end.")?;
    writeln!(out, "{}", "-".repeat(50))?;

    loop {
        write!(out, "You: ")?;
        out.flush()?;

        let line = tokio::select! {
            line = lines.recv() => line.transpose().context("Failed to read user input")?,
            _ = interrupt() => None,
        };

        let Some(line) = line else {
            writeln!(out, "\nExiting chat...")?;
            return Ok(());
        };

        let input = line.trim();
        if input.is_empty() {
            continue;
        }
        if is_exit_command(input) {
            writeln!(out, "Exiting chat...")?;
            return Ok(());
        }

        writeln!(out)?;

        let mut printer = TranscriptPrinter::new(&mut out);
        let outcome = tokio::select! {
            reply = session.send(input, |channel, text| printer.fragment(channel, text)) => Some(reply),
            _ = interrupt() => None,
        };

        match outcome {
            Some(Ok(reply)) => printer.finish(&reply)?,
            Some(Err(e)) => {
                tracing::warn!(error = %e, "chat turn failed");
                writeln!(out, "\nAn error occurred: {e}")?;
                writeln!(out, "An error occurred, the last message was not processed.\n")?;
            }
            None => {
                writeln!(out, "\n\n[interrupted] The last message was not processed.\n")?;
            }
        }
    }
}

/// Writes streamed fragments as they arrive, with a header before each phase
struct TranscriptPrinter<'a, W: Write> {
    out: &'a mut W,
    reasoning_started: bool,
    answer_started: bool,
}

impl<'a, W: Write> TranscriptPrinter<'a, W> {
    fn new(out: &'a mut W) -> Self {
        Self {
            out,
            reasoning_started: false,
            answer_started: false,
        }
    }

    // observer errors cannot propagate out of the stream; a broken stdout shows up on the next prompt
    fn fragment(&mut self, channel: Channel, text: &str) {
        match channel {
            Channel::Reasoning => {
                if !self.reasoning_started {
                    let _ = writeln!(self.out, "{REASONING_HEADER}");
                    self.reasoning_started = true;
                }
            }
            Channel::Final => {
                if !self.answer_started {
                    let _ = self.answer_header();
                }
            }
        }
        let _ = write!(self.out, "{text}");
        let _ = self.out.flush();
    }

    fn answer_header(&mut self) -> std::io::Result<()> {
        self.answer_started = true;
        if self.reasoning_started {
            write!(self.out, "\n\n")?;
        }
        writeln!(self.out, "{ANSWER_HEADER}")
    }

    /// Print whatever did not stream (non-streaming mode) and close the turn
    fn finish(mut self, reply: &Reply) -> std::io::Result<()> {
        if !self.answer_started {
            self.answer_header()?;
            write!(self.out, "{}", reply.content)?;
        }
        write!(self.out, "\n\n")?;
        self.out.flush()
    }
}

/// Send a minimal exchange to verify credentials and connectivity
pub async fn check_connection<W: Write>(backend: &dyn ChatBackend, model: ModelKind, out: &mut W) -> Result<bool> {
    let turns = [Turn::system(CHECK_SYSTEM_PROMPT), Turn::user(CHECK_USER_MESSAGE)];

    match backend.complete(&turns, model).await {
        Ok(_) => {
            writeln!(out, "API connection successful ({})", model.api_id())?;
            Ok(true)
        }
        Err(e) => {
            tracing::warn!(error = %e, "connectivity check failed");
            writeln!(out, "API connection failed: {e}")?;
            Ok(false)
        }
    }
}
