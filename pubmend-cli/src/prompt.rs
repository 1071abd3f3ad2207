//! Interactive prompts on the terminal
//!
//! Questions go to stderr so stdout stays clean for results.

use async_trait::async_trait;
use std::io::{self, BufRead, Write};

use pubmend_core::assist::UserPrompt;
use pubmend_core::catalog::LookupError;
use pubmend_core::manifest::DependencyType;

pub struct TerminalPrompt;

/// Print a question and read one trimmed line; `None` on EOF or empty input
fn ask(question: &str) -> Option<String> {
    let mut stderr = io::stderr();
    let _ = write!(stderr, "{question}");
    let _ = stderr.flush();

    let mut answer = String::new();
    match io::stdin().lock().read_line(&mut answer) {
        Ok(0) | Err(_) => None,
        Ok(_) => {
            let answer = answer.trim();
            (!answer.is_empty()).then(|| answer.to_string())
        }
    }
}

/// Map an answer to one of the options, by number or by exact name
fn pick(answer: &str, options: &[String]) -> Option<String> {
    if let Ok(number) = answer.parse::<usize>() {
        return number
            .checked_sub(1)
            .and_then(|index| options.get(index))
            .cloned();
    }
    options.iter().find(|option| option.as_str() == answer).cloned()
}

#[async_trait]
impl UserPrompt for TerminalPrompt {
    async fn ask_query(&self, block: DependencyType) -> Option<String> {
        ask(&format!(
            "Package(s) to add to {block} (comma-separated, e.g. http, provider): "
        ))
    }

    async fn choose(&self, query: &str, options: &[String]) -> Option<String> {
        eprintln!("Several packages match '{query}':");
        for (index, option) in options.iter().enumerate() {
            eprintln!("  {:>2}) {}", index + 1, option);
        }

        loop {
            let answer = ask(&format!("Select 1-{} (empty to skip): ", options.len()))?;
            match pick(&answer, options) {
                Some(choice) => return Some(choice),
                None => eprintln!("'{answer}' is not one of the listed packages."),
            }
        }
    }

    async fn offer_retry(&self, error: &LookupError) -> bool {
        eprintln!("{error}");
        ask("Retry? [y/N]: ").is_some_and(|answer| answer.eq_ignore_ascii_case("y"))
    }
}
