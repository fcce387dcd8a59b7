//! Interactive console: credential prompts and conflict resolution

use crate::diff_utils;
use broker::CredentialPrompt;
use dialoguer::{Input, Password, Select};
use journal::JsonFormat;
use owo_colors::OwoColorize;
use std::io::IsTerminal;
use tracing::warn;
use tracking::ops::render;
use tracking::{Conflict, ConflictResolver, Resolution};

fn interactive() -> bool {
    std::io::stdin().is_terminal() && std::io::stderr().is_terminal()
}

/// Asks on the terminal; yields nothing when stdin is not one
#[derive(Debug, Clone, Copy, Default)]
pub struct ConsolePrompt;

impl CredentialPrompt for ConsolePrompt {
    fn user_name(&self) -> Option<String> {
        if !interactive() {
            return None;
        }
        Input::<String>::new()
            .with_prompt("User name")
            .interact_text()
            .ok()
    }

    fn password(&self) -> Option<String> {
        if !interactive() {
            return None;
        }
        Password::new().with_prompt("Password").interact().ok()
    }

    fn access_token(&self, authority: &str) -> Option<String> {
        if !interactive() {
            return None;
        }
        eprintln!("Sign in at {} and paste the access token.", authority.cyan());
        Password::new().with_prompt("Access token").interact().ok()
    }

    fn message(&self, text: &str) {
        eprintln!("{text}");
    }
}

const CHOICES: [(&str, Resolution); 4] = [
    ("Keep the local copy", Resolution::KeepLocal),
    ("Take the broker copy", Resolution::AcceptBroker),
    ("Save the broker copy next to the local one", Resolution::SaveSideFile),
    ("Show differences", Resolution::ShowDiff),
];

/// Menu-driven resolver
///
/// Without a terminal every conflict is parked in a side file.
#[derive(Debug, Clone)]
pub struct ConsoleResolver {
    format: JsonFormat,
    context_lines: usize,
}

impl ConsoleResolver {
    pub fn new(format: JsonFormat) -> Self {
        Self {
            format,
            context_lines: 3,
        }
    }
}

impl ConflictResolver for ConsoleResolver {
    fn resolve(&mut self, conflict: &Conflict) -> Resolution {
        if !interactive() {
            warn!(grain = %conflict.id(), "No terminal, saving broker version to a side file");
            return Resolution::SaveSideFile;
        }
        println!(
            "{} {} was modified locally and on the broker",
            "Conflict:".red().bold(),
            conflict.path().yellow()
        );
        let labels: Vec<&str> = CHOICES.iter().map(|(label, _)| *label).collect();
        match Select::new()
            .with_prompt("Resolve")
            .items(&labels)
            .default(2)
            .interact()
        {
            Ok(index) => CHOICES[index].1,
            Err(e) => {
                warn!(error = %e, "Prompt failed, saving broker version to a side file");
                Resolution::SaveSideFile
            }
        }
    }

    fn show_diff(&mut self, conflict: &Conflict) {
        let local = render(&conflict.local, self.format);
        let broker = render(&conflict.broker, self.format);
        match (local, broker) {
            (Ok(local), Ok(broker)) => print!(
                "{}",
                diff_utils::unified_diff(
                    Some(&local),
                    Some(&broker),
                    "snapshot",
                    "broker",
                    self.context_lines,
                )
            ),
            (Err(e), _) | (_, Err(e)) => warn!(error = %e, "Cannot render conflict"),
        }
    }
}
