use super::runner::{CommandOutput, CommandRunner};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::io;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

#[derive(Debug, Clone)]
enum Scripted {
    Output(CommandOutput),
    Failure(io::ErrorKind),
}

#[derive(Debug, Clone)]
struct Script {
    /// Each response may carry its own delay, overriding `delay`
    responses: VecDeque<(Scripted, Option<Duration>)>,
    delay: Option<Duration>,
}

/// Scripted command runner for testing without the real host tools.
///
/// Responses are keyed by the full command line (`"adb devices"`). Queued
/// responses are consumed in order; the last one is sticky. Unscripted
/// commands fail with `NotFound`, like a missing binary.
#[derive(Debug, Clone, Default)]
pub struct MockCommandRunner {
    scripts: Arc<Mutex<HashMap<String, Script>>>,
    calls: Arc<Mutex<Vec<String>>>,
}

impl MockCommandRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue an exit code and stdout for a command line
    pub fn respond(&self, command_line: &str, code: i32, stdout: &str) -> &Self {
        self.push(
            command_line,
            Scripted::Output(CommandOutput::new(code, stdout)),
            None,
        );
        self
    }

    /// Queue a response that takes `delay` before answering
    pub fn respond_after(
        &self,
        command_line: &str,
        code: i32,
        stdout: &str,
        delay: Duration,
    ) -> &Self {
        self.push(
            command_line,
            Scripted::Output(CommandOutput::new(code, stdout)),
            Some(delay),
        );
        self
    }

    /// Queue an invocation failure for a command line
    pub fn fail(&self, command_line: &str, kind: io::ErrorKind) -> &Self {
        self.push(command_line, Scripted::Failure(kind), None);
        self
    }

    /// Make a command line take `delay` before answering
    pub fn delay(&self, command_line: &str, delay: Duration) -> &Self {
        self.scripts
            .lock()
            .entry(command_line.to_string())
            .or_insert_with(|| Script {
                responses: VecDeque::new(),
                delay: None,
            })
            .delay = Some(delay);
        self
    }

    /// Drop every queued response for a command line
    pub fn reset(&self, command_line: &str) {
        self.scripts.lock().remove(command_line);
    }

    /// Every command line run so far, in order
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }

    pub fn call_count(&self, command_line: &str) -> usize {
        self.calls
            .lock()
            .iter()
            .filter(|call| call.as_str() == command_line)
            .count()
    }

    fn push(&self, command_line: &str, response: Scripted, delay: Option<Duration>) {
        self.scripts
            .lock()
            .entry(command_line.to_string())
            .or_insert_with(|| Script {
                responses: VecDeque::new(),
                delay: None,
            })
            .responses
            .push_back((response, delay));
    }

    fn next(&self, command_line: &str) -> (Option<Scripted>, Option<Duration>) {
        let mut scripts = self.scripts.lock();
        match scripts.get_mut(command_line) {
            Some(script) => {
                let entry = if script.responses.len() > 1 {
                    script.responses.pop_front()
                } else {
                    script.responses.front().cloned()
                };
                match entry {
                    Some((response, delay)) => (Some(response), delay.or(script.delay)),
                    None => (None, script.delay),
                }
            }
            None => (None, None),
        }
    }
}

#[async_trait]
impl CommandRunner for MockCommandRunner {
    async fn run(&self, program: &str, args: &[&str]) -> io::Result<CommandOutput> {
        let command_line = std::iter::once(program)
            .chain(args.iter().copied())
            .collect::<Vec<_>>()
            .join(" ");

        debug!("Mock command: {}", command_line);
        self.calls.lock().push(command_line.clone());

        let (response, delay) = self.next(&command_line);
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        match response {
            Some(Scripted::Output(output)) => Ok(output),
            Some(Scripted::Failure(kind)) => Err(io::Error::new(kind, "scripted failure")),
            None => Err(io::Error::new(
                io::ErrorKind::NotFound,
                format!("no script for '{}'", command_line),
            )),
        }
    }
}
