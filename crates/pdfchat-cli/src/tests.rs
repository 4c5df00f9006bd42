//! Terminal shell tests

use std::path::PathBuf;
use std::sync::Arc;

use pdfchat_rag::KnowledgeBase;
use pdfchat_rag::memory::{MemoryBackends, PlainTextExtractor};

use crate::{ChatShell, ShellCommand, ShellReply};

fn shell(reply: &str) -> ChatShell {
    let backends = Arc::new(MemoryBackends::new("pdfs", reply));
    let kb = KnowledgeBase::new(backends)
        .unwrap()
        .with_extractor(Arc::new(PlainTextExtractor));
    ChatShell::new(kb)
}

#[test]
fn test_parse_commands() {
    assert_eq!(
        ShellCommand::parse("/index \"My Notes.pdf\""),
        ShellCommand::Index(PathBuf::from("My Notes.pdf"))
    );
    assert_eq!(ShellCommand::parse("/DELETE"), ShellCommand::Delete);
    assert_eq!(ShellCommand::parse("/history"), ShellCommand::History);
    assert_eq!(ShellCommand::parse("quit"), ShellCommand::Exit);
    assert_eq!(ShellCommand::parse("  "), ShellCommand::Empty);
    assert_eq!(
        ShellCommand::parse("what is the thesis?"),
        ShellCommand::Ask("what is the thesis?".to_string())
    );
    // without a path it is just a question
    assert_eq!(
        ShellCommand::parse("/index"),
        ShellCommand::Ask("/index".to_string())
    );
}

#[tokio::test]
async fn test_shell_session_flow() {
    let mut shell = shell("A clear thesis.");
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("guide.pdf");
    std::fs::write(&path, "Every essay needs a clear thesis.").unwrap();

    assert!(shell.handle("what does an essay need?").await.is_err());

    let reply = shell
        .handle(&format!("/index {}", path.display()))
        .await
        .unwrap();
    assert!(matches!(reply, ShellReply::Indexed(ref record) if record.id == "guide"));
    assert!(shell.session().is_ready());

    let reply = shell.handle("what does an essay need?").await.unwrap();
    let ShellReply::Answer(answer) = reply else {
        panic!("expected an answer");
    };
    assert_eq!(answer.message.content, "A clear thesis.");

    let ShellReply::History(text) = shell.handle("/history").await.unwrap() else {
        panic!("expected history");
    };
    insta::assert_snapshot!(text, @r###"
    You: what does an essay need?
    Assistant: A clear thesis.
    "###);

    assert!(matches!(shell.handle("/delete").await.unwrap(), ShellReply::Deleted));
    assert!(!shell.session().is_ready());
    assert!(matches!(shell.handle("exit").await.unwrap(), ShellReply::Exit));
}
