//! User interface module - interaction (prompts) and formatting.
//!
//! Separates concerns:
//! - `formatter` - Pure formatting functions
//! - This module - Interactive prompts and dispatch progress output

use std::io::{self, BufRead, Write};

use anyhow::Result;

use crate::domain::Service;
use crate::pipeline::{DispatchObserver, PipelineHandle, PipelineRun};

pub mod formatter;

// Re-export formatter functions for convenience
pub use formatter::{
    display_diff, display_dispatch_summary, display_error, display_manual_push_instruction,
    display_notes_summary, display_phase, display_status, display_success, display_warning,
};

fn read_answer(input: &mut impl BufRead) -> Result<String> {
    let mut line = String::new();
    input.read_line(&mut line)?;
    Ok(line.trim().to_lowercase())
}

/// Interpret a y/N answer; anything but "y" or "yes" declines
pub fn is_affirmative(answer: &str) -> bool {
    let answer = answer.trim().to_lowercase();
    answer == "y" || answer == "yes"
}

/// Prompts user to confirm an action with a yes/no prompt.
///
/// Displays the given prompt and accepts "y" or "yes" (case-insensitive) as confirmation.
/// Default is "no" if user presses Enter.
pub fn confirm_action(prompt: &str) -> Result<bool> {
    print!("\n{} (y/N): ", prompt);
    io::stdout().flush()?;

    let answer = read_answer(&mut io::stdin().lock())?;
    Ok(is_affirmative(&answer))
}

/// Block until the user presses Enter.
pub fn wait_for_enter(prompt: &str) -> Result<()> {
    print!("\n{} ", prompt);
    io::stdout().flush()?;
    read_answer(&mut io::stdin().lock())?;
    Ok(())
}

/// Prints pipeline progress as the dispatcher reports it
pub struct ConsoleProgress;

impl DispatchObserver for ConsoleProgress {
    fn group_started(&self, group: &str, members: &[Service]) {
        let names: Vec<&str> = members.iter().map(|s| s.name.as_str()).collect();
        display_status(&format!("Group '{}': {}", group, names.join(", ")));
    }

    fn triggered(&self, service: &Service, handle: &PipelineHandle) {
        display_status(&format!(
            "{}: pipeline {} created {}",
            service.name, handle.id, handle.web_url
        ));
    }

    fn finished(&self, run: &PipelineRun) {
        if run.status.is_success() {
            display_success(&format!("{}: pipeline {} succeeded", run.service, run.pipeline_id));
        } else {
            display_error(&format!(
                "{}: pipeline {} {}",
                run.service, run.pipeline_id, run.status
            ));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_affirmative() {
        assert!(is_affirmative("y"));
        assert!(is_affirmative(" YES "));
        assert!(!is_affirmative(""));
        assert!(!is_affirmative("n"));
        assert!(!is_affirmative("yep"));
    }

    #[test]
    fn test_read_answer_trims_and_lowercases() {
        let mut input = io::Cursor::new("  Yes\n");
        assert_eq!(read_answer(&mut input).unwrap(), "yes");
    }
}
