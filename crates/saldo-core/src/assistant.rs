//! Scripted financial assistant
//!
//! Answers a handful of suggested questions with canned replies after a short
//! "thinking" pause. Anything else gets a general overview.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Error, Result};

pub const GREETING: &str = "Hello! I'm your AI financial assistant. I have access to your financial data and I'm here to help you make smarter decisions with your money. What would you like to know?";

/// Questions offered as shortcuts
pub const SUGGESTED_QUESTIONS: &[&str] = &[
    "How can I save more money this month?",
    "Where am I spending too much?",
    "What investment options should I consider?",
    "How to reduce my credit card debt?",
    "Can you analyze my spending patterns?",
    "What's my financial health score?",
    "How much should I save for retirement?",
    "Should I pay off debt or invest?",
];

const SCRIPTED: &[(&str, &str)] = &[
    (
        "How can I save more money this month?",
        "Based on your spending data, I see several opportunities to save money this month:\n\n\
         1. Your subscription services cost $87 monthly. Consider reviewing and canceling unused ones.\n\n\
         2. You spent $420 on dining out last month, which is 30% higher than your average. Try cooking at home more.\n\n\
         3. Your utility bills seem high - you might save $40-60 monthly by adjusting your thermostat by 2-3 degrees.\n\n\
         Implementing these changes could save you approximately $150-200 this month.",
    ),
    (
        "Where am I spending too much?",
        "Looking at your spending patterns, a few categories stand out:\n\n\
         1. Entertainment: You're spending 22% more than your budgeted amount\n\n\
         2. Food delivery: This has increased 35% over the last three months\n\n\
         3. Subscription services: You have 12 active subscriptions totaling $114/month\n\n\
         I recommend setting spending alerts for these categories and reviewing your subscriptions to identify ones you rarely use.",
    ),
    (
        "What investment options should I consider?",
        "Based on your financial profile (age: 34, risk tolerance: moderate, income: $85K), here are some investment options to consider:\n\n\
         1. Increase your 401(k) contributions to at least get your employer's full match (currently at 4%, employer offers 6%)\n\n\
         2. Consider a Roth IRA for tax diversification\n\n\
         3. For your medium-term goals (5-10 years), a mix of index funds with 70% stocks/30% bonds aligns with your risk profile\n\n\
         Would you like me to explain any of these options in more detail?",
    ),
    (
        "How to reduce my credit card debt?",
        "You currently have $4,850 in credit card debt across 3 cards, with interest rates ranging from 16.99% to 24.99%. Here's a plan to reduce it:\n\n\
         1. Focus on paying off the highest interest card first (Card #2 at 24.99%)\n\n\
         2. Based on your cash flow, you could allocate an extra $300/month toward debt repayment\n\n\
         3. Consider a balance transfer to a 0% APR card - this could save you approximately $450 in interest\n\n\
         Following this plan, you could be debt-free in approximately 14 months instead of 26+ months.",
    ),
];

pub const DEFAULT_ANSWER: &str = "Based on your financial data, I can see that you've been managing your money fairly well. Your income is stable and your expenses are generally within reasonable limits. However, I notice a few areas where you might be able to optimize your finances.\n\n\
Your monthly subscriptions total to about $120, which is a bit high. You might want to review these and cancel any services you don't use regularly. Additionally, your dining out expenses have been increasing over the past few months, and now represent about 15% of your monthly spending.\n\n\
In terms of savings, you're doing well with your emergency fund, but your retirement contributions could be increased. Given your age and income level, I'd recommend trying to contribute at least 15% of your income to retirement accounts.\n\n\
Would you like me to provide more specific recommendations for any of these areas?";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sender {
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    pub id: u32,
    pub content: String,
    pub sender: Sender,
    pub timestamp: DateTime<Utc>,
}

/// Look up the scripted answer for a question
pub fn answer_for(question: &str) -> &'static str {
    let question = question.trim();
    SCRIPTED
        .iter()
        .find(|(q, _)| q.eq_ignore_ascii_case(question))
        .map(|(_, a)| *a)
        .unwrap_or(DEFAULT_ANSWER)
}

#[derive(Debug, Clone)]
pub struct ScriptedAssistant {
    delay: Duration,
}

impl Default for ScriptedAssistant {
    fn default() -> Self {
        Self::new(Duration::from_secs(2))
    }
}

impl ScriptedAssistant {
    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }

    pub fn suggestions(&self) -> &'static [&'static str] {
        SUGGESTED_QUESTIONS
    }

    /// Answer a question after the thinking pause
    pub async fn reply(&self, question: &str) -> Result<&'static str> {
        if question.trim().is_empty() {
            return Err(Error::InvalidData("Message must not be empty".into()));
        }
        debug!(delay_ms = self.delay.as_millis() as u64, "Assistant thinking");
        tokio::time::sleep(self.delay).await;
        Ok(answer_for(question))
    }
}

/// A running chat, starting with the greeting
#[derive(Debug, Clone)]
pub struct Conversation {
    assistant: ScriptedAssistant,
    messages: Vec<ChatMessage>,
}

impl Conversation {
    pub fn new(assistant: ScriptedAssistant) -> Self {
        Self {
            assistant,
            messages: vec![ChatMessage {
                id: 1,
                content: GREETING.to_string(),
                sender: Sender::Assistant,
                timestamp: Utc::now(),
            }],
        }
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    fn push(&mut self, content: String, sender: Sender) -> ChatMessage {
        let message = ChatMessage {
            id: self.messages.len() as u32 + 1,
            content,
            sender,
            timestamp: Utc::now(),
        };
        self.messages.push(message.clone());
        message
    }

    /// Send a message and wait for the reply
    pub async fn ask(&mut self, question: &str) -> Result<ChatMessage> {
        let answer = self.assistant.reply(question).await?;
        self.push(question.to_string(), Sender::User);
        Ok(self.push(answer.to_string(), Sender::Assistant))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_questions_have_scripted_answers() {
        assert!(answer_for("How can I save more money this month?").contains("$150-200"));
        assert!(answer_for("  where am i spending too much?  ").contains("Entertainment"));
        assert!(answer_for("How to reduce my credit card debt?").contains("14 months"));
    }

    #[test]
    fn test_unknown_question_gets_default() {
        assert_eq!(answer_for("What's my financial health score?"), DEFAULT_ANSWER);
        assert_eq!(answer_for("tell me a joke"), DEFAULT_ANSWER);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reply_waits_for_delay() {
        let assistant = ScriptedAssistant::default();
        let started = tokio::time::Instant::now();
        let answer = assistant
            .reply("What investment options should I consider?")
            .await
            .unwrap();
        assert!(started.elapsed() >= Duration::from_secs(2));
        assert!(answer.contains("Roth IRA"));
    }

    #[tokio::test]
    async fn test_conversation_numbers_messages() {
        let mut chat = Conversation::new(ScriptedAssistant::new(Duration::ZERO));
        let reply = chat.ask("Should I pay off debt or invest?").await.unwrap();

        assert_eq!(reply.id, 3);
        assert_eq!(reply.sender, Sender::Assistant);
        assert_eq!(chat.messages().len(), 3);
        assert_eq!(chat.messages()[1].sender, Sender::User);

        assert!(chat.ask("   ").await.is_err());
        assert_eq!(chat.messages().len(), 3);
    }
}
