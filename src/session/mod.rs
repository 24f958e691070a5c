// Interactive question session
// Reads questions line by line and prints grounded answers

#[cfg(test)]
mod tests;

use std::io::{BufRead, Write};

use anyhow::{Context, Result};
use console::style;
use tracing::info;

use crate::rag::RagSystem;

/// Questions suggested by the `help` command
pub const SAMPLE_QUESTIONS: [&str; 5] = [
    "What is ChatGPT?",
    "Tell me about AI investments",
    "What companies are working on AI?",
    "What are the main AI trends mentioned?",
    "How is AI affecting different industries?",
];

/// One line of session input, interpreted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionCommand<'a> {
    Quit,
    Help,
    Empty,
    Question(&'a str),
}

#[inline]
pub fn parse_command(line: &str) -> SessionCommand<'_> {
    let line = line.trim();

    if line.is_empty() {
        return SessionCommand::Empty;
    }

    match line.to_lowercase().as_str() {
        "quit" | "exit" | "q" => SessionCommand::Quit,
        "help" => SessionCommand::Help,
        _ => SessionCommand::Question(line),
    }
}

/// Answer questions read from `input` until `quit` or end of input
#[inline]
pub async fn run<R: BufRead + Send, W: Write + Send>(
    system: &RagSystem,
    mut input: R,
    mut output: W,
) -> Result<()> {
    writeln!(output)?;
    writeln!(output, "{}", "=".repeat(60))?;
    writeln!(
        output,
        "{}",
        style("🚀 RAG System Ready! Ask questions about the documents.")
            .bold()
            .green()
    )?;
    writeln!(output, "Commands: 'quit' or 'exit' to stop, 'help' for examples")?;
    writeln!(output, "{}", "=".repeat(60))?;

    let mut line = String::new();
    loop {
        write!(output, "\n💬 Your question: ")?;
        output.flush()?;

        line.clear();
        let read = input
            .read_line(&mut line)
            .context("Failed to read question")?;
        if read == 0 {
            writeln!(output)?;
            writeln!(output, "👋 Goodbye!")?;
            break;
        }

        match parse_command(&line) {
            SessionCommand::Quit => {
                writeln!(output, "👋 Goodbye!")?;
                break;
            }
            SessionCommand::Help => {
                writeln!(output)?;
                writeln!(output, "{}", style("📝 Sample questions you can ask:").yellow())?;
                for (i, question) in SAMPLE_QUESTIONS.iter().enumerate() {
                    writeln!(output, "   {}. {}", i + 1, question)?;
                }
            }
            SessionCommand::Empty => {
                writeln!(output, "{}", style("❌ Please enter a valid question.").red())?;
            }
            SessionCommand::Question(question) => {
                info!("Processing question: {}", question);
                writeln!(output, "🔍 Processing your question...")?;

                let answer = system.answer_question(question).await;

                writeln!(output)?;
                writeln!(output, "{}", style("🤖 Answer:").bold().cyan())?;
                writeln!(output, "{}", "-".repeat(40))?;
                writeln!(output, "{answer}")?;
                writeln!(output, "{}", "-".repeat(40))?;
            }
        }
    }

    Ok(())
}
