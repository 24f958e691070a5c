use std::io::Cursor;
use std::sync::Arc;

use super::*;
use crate::config::Config;
use crate::documents::Document;
use crate::embeddings::testing::HashEmbedder;
use crate::generation::testing::RecordingGenerator;
use crate::rag::NO_RESULTS_ANSWER;
use tempfile::TempDir;

async fn test_system(dir: &TempDir, model: Arc<RecordingGenerator>) -> RagSystem {
    let config = Config {
        base_dir: dir.path().to_path_buf(),
        ..Config::default()
    };
    RagSystem::new(&config, Arc::new(HashEmbedder::default()), model)
        .await
        .expect("should build system")
}

async fn run_session(system: &RagSystem, input: &str) -> String {
    let mut output = Vec::new();
    run(system, Cursor::new(input.to_string()), &mut output)
        .await
        .expect("session should finish");
    String::from_utf8(output).expect("output is utf-8")
}

#[test]
fn parse_quit_commands() {
    for line in ["quit", "exit", "q", "QUIT", "Exit", " q \n"] {
        assert_eq!(parse_command(line), SessionCommand::Quit, "{line:?}");
    }
}

#[test]
fn parse_help_and_empty() {
    assert_eq!(parse_command("help"), SessionCommand::Help);
    assert_eq!(parse_command("HELP\n"), SessionCommand::Help);
    assert_eq!(parse_command(""), SessionCommand::Empty);
    assert_eq!(parse_command("   \n"), SessionCommand::Empty);
}

#[test]
fn parse_question_is_trimmed() {
    assert_eq!(
        parse_command("  What is ChatGPT?\n"),
        SessionCommand::Question("What is ChatGPT?")
    );
    assert_eq!(
        parse_command("quitting time?"),
        SessionCommand::Question("quitting time?")
    );
}

#[tokio::test]
async fn help_lists_sample_questions() {
    let dir = TempDir::new().expect("should create temp dir");
    let model = Arc::new(RecordingGenerator::new("unused"));
    let system = test_system(&dir, model.clone()).await;

    let output = run_session(&system, "help\nquit\n").await;

    for (i, question) in SAMPLE_QUESTIONS.iter().enumerate() {
        assert!(output.contains(&format!("{}. {}", i + 1, question)));
    }
    assert!(output.contains("Goodbye!"));
    assert_eq!(model.calls(), 0);
}

#[tokio::test]
async fn empty_line_asks_for_valid_question() {
    let dir = TempDir::new().expect("should create temp dir");
    let system = test_system(&dir, Arc::new(RecordingGenerator::new("unused"))).await;

    let output = run_session(&system, "\n   \nexit\n").await;

    assert_eq!(output.matches("Please enter a valid question.").count(), 2);
}

#[tokio::test]
async fn questions_are_answered_until_end_of_input() {
    let dir = TempDir::new().expect("should create temp dir");
    let model = Arc::new(RecordingGenerator::new("ChatGPT is a chatbot."));
    let mut system = test_system(&dir, model.clone()).await;
    system
        .ingest(&[Document::new("a.txt", "ChatGPT is a chatbot made by OpenAI.")])
        .await
        .expect("should ingest");

    let output = run_session(&system, "What is ChatGPT?\n").await;

    assert!(output.contains("Processing your question..."));
    assert!(output.contains("ChatGPT is a chatbot."));
    assert!(output.contains("Goodbye!"));
    assert_eq!(model.calls(), 1);
}

#[tokio::test]
async fn empty_collection_answers_without_model() {
    let dir = TempDir::new().expect("should create temp dir");
    let model = Arc::new(RecordingGenerator::new("unused"));
    let system = test_system(&dir, model.clone()).await;

    let output = run_session(&system, "What is AI?\nq\nnever asked\n").await;

    assert!(output.contains(NO_RESULTS_ANSWER));
    assert!(!output.contains("never asked"));
    assert_eq!(model.calls(), 0);
}
