use anyhow::{bail, Context, Result};
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};

use crate::ai::ChatRelay;
use crate::app::App;
use crate::config::{ApiConfig, Settings};
use crate::document::{Catalog, DocumentStore, PdfTextExtractor, UploadLimits};
use crate::model::{Question, Review};

pub enum Source {
    Material(String),
    Pdf(PathBuf),
}

enum Command {
    Harder,
    New,
    Submit(PathBuf),
    Again,
    Status,
    Help,
    Quit,
}

fn parse_command(line: &str) -> Option<Command> {
    let mut parts = line.trim().splitn(2, char::is_whitespace);
    let command = match parts.next()? {
        "harder" | "h" => Command::Harder,
        "new" | "n" => Command::New,
        "submit" | "s" => Command::Submit(PathBuf::from(parts.next()?.trim())),
        "again" | "a" => Command::Again,
        "status" => Command::Status,
        "help" | "?" => Command::Help,
        "quit" | "q" | "exit" => Command::Quit,
        _ => return None,
    };
    Some(command)
}

pub async fn run(settings: &Settings, source: Source) -> Result<()> {
    let (config, origin) = ApiConfig::load(&settings.secret_file).await?;
    tracing::info!("API configuration loaded from {:?}: {:?}", origin, config);

    let relay = ChatRelay::new(Arc::new(config), settings)?;
    let catalog = Catalog::load(&settings.materials_file).await?;
    let documents = DocumentStore::new(catalog, Arc::new(PdfTextExtractor), UploadLimits::from(settings));
    let app = App::new(Arc::new(relay), documents, settings);

    let metadata = match source {
        Source::Material(id) => app.load_material(&id).await?,
        Source::Pdf(path) => {
            let bytes = tokio::fs::read(&path)
                .await
                .with_context(|| format!("Failed to read {}", path.display()))?;
            let mime = mime_guess::from_path(&path).first_or_octet_stream();
            app.load_upload(&display_name(&path), &bytes, mime.essence_str()).await?
        }
    };

    match &metadata.title {
        Some(title) => println!("📄 Loaded {} from {} ({} characters)", title, metadata.filename, metadata.content_length),
        None => println!("📄 Loaded {} ({} characters)", metadata.filename, metadata.content_length),
    }
    println!(
        "   {} chunks of up to {} characters",
        app.document_chunks(settings.chunk_size).await.len(),
        settings.chunk_size
    );

    new_question(&app, false).await;
    println!("{}", help_text());

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }

        match parse_command(&line) {
            Some(Command::Harder) => new_question(&app, true).await,
            Some(Command::New) => new_question(&app, false).await,
            Some(Command::Submit(path)) => {
                if let Err(e) = submit(&app, &path).await {
                    println!("❌ {:#}", e);
                }
            }
            Some(Command::Again) => match app.try_again().await {
                Ok(()) => new_question(&app, false).await,
                Err(e) => println!("❌ {}", e),
            },
            Some(Command::Status) => {
                let metadata = app.document_metadata().await;
                println!("📊 Phase: {:?}", app.phase().await);
                println!(
                    "   Document: {} ({} bytes, {} characters)",
                    metadata.filename, metadata.size, metadata.content_length
                );
                if let Some(loaded_at) = metadata.loaded_at {
                    println!("   Loaded at: {}", loaded_at.format("%Y-%m-%d %H:%M"));
                }
                if let Some(question) = app.current_question().await {
                    println!("   Question: {}", question.question);
                }
                if let Some(review) = app.last_review().await {
                    println!("   Last score: {}/100", review.score);
                }
            }
            Some(Command::Help) => println!("{}", help_text()),
            Some(Command::Quit) => break,
            None => println!("Unknown command. Type 'help' for the list."),
        }
    }

    println!("👋 Bye");
    Ok(())
}

async fn new_question(app: &App, harder: bool) {
    println!("{}", if harder { "🔥 Generating a harder question..." } else { "🤔 Generating a question..." });

    match app.generate_question(harder, |text| tracing::debug!("Model reply: {}", text)).await {
        Ok(question) => println!("{}", render_question(&question)),
        Err(e) => println!("❌ {}", e),
    }
}

async fn submit(app: &App, path: &Path) -> Result<()> {
    if path.as_os_str().is_empty() {
        bail!("Usage: submit <file>");
    }

    let raw = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let code = raw.trim();
    let (lines, chars) = code_stats(code);
    println!("📝 Submitting {} lines, {} characters...", lines, chars);

    let review = app.submit_code(code).await?;
    println!("{}", render_review(&review, code));
    Ok(())
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

fn help_text() -> &'static str {
    "Commands:\n  \
     harder         harder follow-up question\n  \
     new            new question from the same material\n  \
     submit <file>  send your code for review\n  \
     again          discard the question and start over\n  \
     status         show the session state\n  \
     quit           leave"
}

fn code_stats(code: &str) -> (usize, usize) {
    (code.lines().count(), code.chars().count())
}

fn render_question(question: &Question) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "\n📘 {} [{}]", question.topic, question.difficulty.as_str());
    let _ = writeln!(out, "{}", question.question);
    if !question.hints.is_empty() {
        let _ = writeln!(out, "\n💡 Hints:");
        for hint in &question.hints {
            let _ = writeln!(out, "   - {}", hint);
        }
    }
    out
}

fn render_review(review: &Review, code: &str) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "\n🎯 Score: {}/100 ({}), {} error(s)",
        review.score,
        review.quality.as_str(),
        review.errors.len()
    );
    if !review.feedback.summary.is_empty() {
        let _ = writeln!(out, "{}", review.feedback.summary);
    }

    for (heading, items) in [("✅ Strengths", &review.feedback.strengths), ("⚠️  Weaknesses", &review.feedback.weaknesses)] {
        if !items.is_empty() {
            let _ = writeln!(out, "\n{}:", heading);
            for item in items {
                let _ = writeln!(out, "   - {}", item);
            }
        }
    }

    if !review.errors.is_empty() {
        let _ = writeln!(out, "\n🐛 Errors:");
        for issue in &review.errors {
            let _ = writeln!(out, "   line {} [{}] {}", issue.line, issue.kind.as_str(), issue.description);
            if !issue.suggestion.is_empty() {
                let _ = writeln!(out, "      → {}", issue.suggestion);
            }
        }
    }

    if !review.notes.is_empty() {
        let _ = writeln!(out, "\n📝 {}", review.notes);
    }

    // Line numbers in the review refer to the trimmed submission.
    let _ = writeln!(out, "\n{}", annotate_code(code.trim(), review));
    out
}

/// Numbers each line and flags the ones the review reported errors on.
fn annotate_code(code: &str, review: &Review) -> String {
    let error_lines = review.error_lines();
    code.lines()
        .enumerate()
        .map(|(index, line)| {
            let number = index as u32 + 1;
            let marker = if error_lines.contains(&number) { ">>" } else { "  " };
            format!("{} {:>4} | {}", marker, number, line)
        })
        .collect::<Vec<_>>()
        .join("\n")
}
