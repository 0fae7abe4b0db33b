//! Interactive console client: reads queries, shows answers and relays the
//! human's feedback to suspended threads.

use crate::graph::{ConversationGraph, ConversationState, InterruptRequest, RunOutcome};
use anyhow::{Context, Result};
use console::style;
use dialoguer::theme::ColorfulTheme;
use dialoguer::Input;

/// Consecutive failed reads after which the chat loop stops.
const MAX_CONSECUTIVE_READ_FAILURES: usize = 3;

/// Terminal side of a conversation. Blocking by nature.
pub trait ChatIo {
    /// Next user query, `None` at end of input.
    fn read_query(&mut self) -> Result<Option<String>>;

    /// Ask the question carried by an interrupt and return the raw answer.
    fn ask(&mut self, request: &InterruptRequest) -> Result<String>;

    fn show_response(&mut self, text: &str);

    fn show_notice(&mut self, text: &str);

    fn show_error(&mut self, text: &str);
}

/// [`ChatIo`] over stdin/stdout using `dialoguer` prompts.
pub struct ConsoleIo {
    theme: ColorfulTheme,
}

impl ConsoleIo {
    pub fn new() -> Self {
        Self {
            theme: ColorfulTheme::default(),
        }
    }

    fn prompt(&self, label: &str) -> Result<Option<String>> {
        match Input::<String>::with_theme(&self.theme)
            .with_prompt(label)
            .allow_empty(true)
            .interact_text()
        {
            Ok(line) => Ok(Some(line.trim().to_string())),
            Err(dialoguer::Error::IO(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                Ok(None)
            }
            Err(e) => Err(e).context("Failed to read from terminal"),
        }
    }
}

impl Default for ConsoleIo {
    fn default() -> Self {
        Self::new()
    }
}

impl ChatIo for ConsoleIo {
    fn read_query(&mut self) -> Result<Option<String>> {
        self.prompt("You")
    }

    fn ask(&mut self, request: &InterruptRequest) -> Result<String> {
        println!();
        let label = match request {
            InterruptRequest::SatisfactionCheck { message, .. } => {
                println!("{}", style(format!("🙏 {message}")).magenta().bold());
                "Feedback (yes/no)"
            }
            InterruptRequest::ClarificationRequest { message } => {
                println!("{}", style(format!("📝 {message}")).yellow().bold());
                "Your clarification"
            }
        };
        Ok(self.prompt(label)?.unwrap_or_default())
    }

    fn show_response(&mut self, text: &str) {
        println!("\n{}", style("🤖 Bot").cyan().bold());
        println!("{text}\n");
    }

    fn show_notice(&mut self, text: &str) {
        println!("{}", style(text).green().bold());
    }

    fn show_error(&mut self, text: &str) {
        eprintln!("{} {text}", style("❌ Error:").red().bold());
    }
}

/// Drives one thread of the conversation graph from a [`ChatIo`].
pub struct ChatClient {
    graph: ConversationGraph,
    thread_id: String,
}

impl ChatClient {
    pub fn new(graph: ConversationGraph, thread_id: &str) -> Self {
        Self {
            graph,
            thread_id: thread_id.to_string(),
        }
    }

    /// Transcript of the thread's last checkpoint, empty for a new thread.
    async fn previous_history(&self) -> Result<Vec<crate::graph::ChatTurn>> {
        Ok(self
            .graph
            .state(&self.thread_id)
            .await?
            .map(|cp| cp.state.chat_history)
            .unwrap_or_default())
    }

    /// Run one query through the graph, answering interrupts until it completes.
    pub async fn process_query(
        &self,
        query: &str,
        io: &mut dyn ChatIo,
    ) -> Result<ConversationState> {
        tracing::debug!(thread_id = %self.thread_id, query, "Processing query");
        let state = ConversationState::new(query).with_history(self.previous_history().await?);
        let mut outcome = self.graph.start(&self.thread_id, state).await?;

        loop {
            match outcome {
                RunOutcome::Interrupted { request, .. } => {
                    if let InterruptRequest::SatisfactionCheck { response, .. } = &request {
                        io.show_response(response);
                    }
                    let answer = io.ask(&request)?;
                    tracing::info!(thread_id = %self.thread_id, "Resuming with feedback");
                    outcome = self.graph.resume(&self.thread_id, &answer).await?;
                }
                RunOutcome::Completed(state) => {
                    io.show_response(&state.response);
                    return Ok(state);
                }
            }
        }
    }

    /// Read-eval loop until `exit` or end of input. A failed turn or a failed
    /// read is reported and the loop continues; only repeated read failures end it.
    pub async fn run(&self, io: &mut dyn ChatIo) -> Result<()> {
        io.show_notice(&format!(
            "🤖 Multi-agent chatbot ready (thread {}). Type 'exit' to quit.",
            self.thread_id
        ));

        let mut read_failures = 0;
        loop {
            let line = match io.read_query() {
                Ok(Some(line)) => {
                    read_failures = 0;
                    line
                }
                Ok(None) => break,
                Err(e) => {
                    read_failures += 1;
                    tracing::warn!(attempt = read_failures, "Failed to read query: {e:#}");
                    if read_failures >= MAX_CONSECUTIVE_READ_FAILURES {
                        return Err(e).context("Giving up after repeated terminal read errors");
                    }
                    io.show_error(&format!("{e:#}"));
                    continue;
                }
            };
            let query = line.trim();
            if query.is_empty() {
                continue;
            }
            if query.eq_ignore_ascii_case("exit") {
                io.show_notice("Exiting... Goodbye! 👋");
                break;
            }
            if let Err(e) = self.process_query(query, io).await {
                tracing::error!(thread_id = %self.thread_id, "Turn failed: {e:#}");
                io.show_error(&format!("{e:#}"));
            }
        }
        Ok(())
    }
}
