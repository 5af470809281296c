//! Assistant command

use anyhow::Result;
use saldo_core::assistant::{ScriptedAssistant, GREETING};

/// Resolve a suggestion number to its question text
pub fn resolve_question<'a>(assistant: &ScriptedAssistant, input: &'a str) -> Option<&'a str> {
    let input = input.trim();
    if input.is_empty() {
        return None;
    }
    match input.parse::<usize>() {
        Ok(n) => assistant.suggestions().get(n.checked_sub(1)?).copied(),
        Err(_) => Some(input),
    }
}

pub async fn cmd_ask(assistant: &ScriptedAssistant, question: Option<&str>) -> Result<()> {
    let question = question.and_then(|q| resolve_question(assistant, q));

    let Some(question) = question else {
        println!("🤖 {}", GREETING);
        println!();
        println!("Suggested questions:");
        for (i, suggestion) in assistant.suggestions().iter().enumerate() {
            println!("  {}. {}", i + 1, suggestion);
        }
        println!();
        println!("Ask with: saldo ask \"<question>\" or saldo ask <number>");
        return Ok(());
    };

    println!("🙋 {}", question);
    println!("   Thinking...");
    let answer = assistant.reply(question).await?;
    println!();
    println!("🤖 {}", answer);
    Ok(())
}
