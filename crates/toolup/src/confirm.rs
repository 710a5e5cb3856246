use std::io::{BufRead, IsTerminal, Write};

use async_trait::async_trait;
use toolup_core::{Confirm, GateMode};

/// Prompts on the terminal. `--yes` answers every prompt up front.
#[derive(Debug, Clone, Copy)]
pub struct TerminalConfirm {
    assume_yes: bool,
    interactive: bool,
}

impl TerminalConfirm {
    pub fn new(assume_yes: bool) -> Self {
        Self {
            assume_yes,
            interactive: std::io::stdin().is_terminal() && std::io::stderr().is_terminal(),
        }
    }
}

fn is_yes(answer: &str) -> bool {
    matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes")
}

fn ask(prompt: &str, details: &[String]) -> bool {
    let mut stderr = std::io::stderr().lock();
    let _ = writeln!(stderr, "{prompt}");
    for detail in details {
        let _ = writeln!(stderr, "  - {detail}");
    }
    let _ = write!(stderr, "Continue? [y/N] ");
    let _ = stderr.flush();
    drop(stderr);

    let mut answer = String::new();
    match std::io::stdin().lock().read_line(&mut answer) {
        Ok(_) => is_yes(&answer),
        Err(_) => false,
    }
}

#[async_trait]
impl Confirm for TerminalConfirm {
    fn mode(&self) -> GateMode {
        if self.assume_yes || self.interactive {
            GateMode::Interactive
        } else {
            GateMode::NonInteractive
        }
    }

    async fn confirm(&self, prompt: &str, details: &[String]) -> bool {
        if self.assume_yes {
            log::info!("Assuming yes: {prompt}");
            return true;
        }
        if !self.interactive {
            return false;
        }

        // Blocking read; keep it off the runtime thread so Ctrl-C is seen.
        let prompt = prompt.to_string();
        let details = details.to_vec();
        tokio::task::spawn_blocking(move || ask(&prompt, &details))
            .await
            .unwrap_or(false)
    }
}
