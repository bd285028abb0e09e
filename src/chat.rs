//! UI-agnostic chat state
//!
//! The transcript, the input buffer and the rules for turning a network
//! outcome into a transcript line. Both the TUI and the one-shot `send`
//! command drive a [`ChatSession`].

use std::fmt;

use tracing::debug;

use crate::agent::{parse_reply, AgentClient, AgentError, CONNECT_FAILED};

/// Who a transcript line belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sender {
    You,
    Agent,
}

impl Sender {
    pub fn as_str(&self) -> &'static str {
        match self {
            Sender::You => "You",
            Sender::Agent => "Agent",
        }
    }
}

impl fmt::Display for Sender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One displayed line of the conversation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatLine {
    pub sender: Sender,
    pub message: String,
}

impl ChatLine {
    pub fn new(sender: Sender, message: impl Into<String>) -> Self {
        Self {
            sender,
            message: message.into(),
        }
    }
}

impl fmt::Display for ChatLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.sender, self.message)
    }
}

/// Convert a character index to a byte index for UTF-8 safe string operations
fn char_to_byte_index(s: &str, char_idx: usize) -> usize {
    s.char_indices()
        .nth(char_idx)
        .map(|(i, _)| i)
        .unwrap_or(s.len())
}

#[derive(Debug, Default)]
pub struct ChatSession {
    transcript: Vec<ChatLine>,
    input: String,
    cursor: usize, // in chars, not bytes
}

impl ChatSession {
    pub fn new() -> Self {
        Self::default()
    }

    /// Lines in the order they were appended.
    pub fn transcript(&self) -> &[ChatLine] {
        &self.transcript
    }

    pub fn input(&self) -> &str {
        &self.input
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    fn append(&mut self, sender: Sender, message: impl Into<String>) {
        self.transcript.push(ChatLine::new(sender, message));
    }

    /// Record a user query.
    ///
    /// Whitespace-only input is ignored and `None` is returned; nothing is
    /// appended and the input is left alone. Otherwise the trimmed query is
    /// appended as a `You` line, the input is cleared and the query is
    /// returned for exactly one network call.
    pub fn submit(&mut self, query: &str) -> Option<String> {
        let query = query.trim();
        if query.is_empty() {
            return None;
        }

        let query = query.to_string();
        self.append(Sender::You, query.clone());
        self.clear_input();
        Some(query)
    }

    /// Submit whatever is currently in the input buffer.
    pub fn submit_input(&mut self) -> Option<String> {
        let query = self.input.clone();
        self.submit(&query)
    }

    pub fn on_network_success(&mut self, body: &str) {
        let reply = parse_reply(body);
        debug!("agent response: {}", reply);
        self.append(Sender::Agent, reply);
    }

    pub fn on_network_failure(&mut self, error: impl fmt::Display) {
        debug!("connection failure: {}", error);
        self.append(Sender::Agent, CONNECT_FAILED);
    }

    pub fn on_network_http_error(&mut self, status: u16, body: &str) {
        self.append(
            Sender::Agent,
            AgentError::Status {
                status,
                body: body.to_string(),
            }
            .transcript_message(),
        );
    }

    /// Route a finished call to the matching handler.
    pub fn on_outcome(&mut self, outcome: Result<String, AgentError>) {
        match outcome {
            Ok(body) => self.on_network_success(&body),
            Err(AgentError::Status { status, body }) => self.on_network_http_error(status, &body),
            Err(err @ AgentError::Connect(_)) => self.on_network_failure(err),
        }
    }

    /// Submit `query` and wait for its reply in place.
    ///
    /// Returns `false` when the query was empty and nothing was sent.
    pub async fn exchange(&mut self, client: &AgentClient, query: &str) -> bool {
        let Some(query) = self.submit(query) else {
            return false;
        };
        let outcome = client.send(&query).await;
        self.on_outcome(outcome);
        true
    }

    // Input editing

    pub fn insert_char(&mut self, c: char) {
        let byte_pos = char_to_byte_index(&self.input, self.cursor);
        self.input.insert(byte_pos, c);
        self.cursor += 1;
    }

    pub fn backspace(&mut self) {
        if self.cursor > 0 {
            self.cursor -= 1;
            let byte_pos = char_to_byte_index(&self.input, self.cursor);
            self.input.remove(byte_pos);
        }
    }

    pub fn delete(&mut self) {
        if self.cursor < self.input.chars().count() {
            let byte_pos = char_to_byte_index(&self.input, self.cursor);
            self.input.remove(byte_pos);
        }
    }

    pub fn move_left(&mut self) {
        self.cursor = self.cursor.saturating_sub(1);
    }

    pub fn move_right(&mut self) {
        self.cursor = (self.cursor + 1).min(self.input.chars().count());
    }

    pub fn move_home(&mut self) {
        self.cursor = 0;
    }

    pub fn move_end(&mut self) {
        self.cursor = self.input.chars().count();
    }

    pub fn set_input(&mut self, text: &str) {
        self.input = text.to_string();
        self.move_end();
    }

    pub fn clear_input(&mut self) {
        self.input.clear();
        self.cursor = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::test_support::{client_for, unreachable_client};
    use crate::agent::NO_RESPONSE;

    fn agent(message: &str) -> ChatLine {
        ChatLine::new(Sender::Agent, message)
    }

    #[test]
    fn test_submit_whitespace_is_noop() {
        let mut session = ChatSession::new();
        session.set_input("   \t ");

        assert_eq!(session.submit_input(), None);
        assert_eq!(session.submit(""), None);
        assert!(session.transcript().is_empty());
        assert_eq!(session.input(), "   \t ");
    }

    #[test]
    fn test_submit_appends_and_clears_input() {
        let mut session = ChatSession::new();
        session.set_input("hello");

        assert_eq!(session.submit_input().as_deref(), Some("hello"));
        assert_eq!(session.transcript(), &[ChatLine::new(Sender::You, "hello")]);
        assert_eq!(session.input(), "");
        assert_eq!(session.cursor(), 0);
    }

    #[test]
    fn test_submit_trims_query() {
        let mut session = ChatSession::new();

        assert_eq!(session.submit("  hello  ").as_deref(), Some("hello"));
        assert_eq!(session.transcript()[0].message, "hello");
    }

    #[test]
    fn test_success_appends_response_field() {
        let mut session = ChatSession::new();
        session.on_network_success(r#"{"response":"hi there"}"#);
        assert_eq!(session.transcript(), &[agent("hi there")]);
    }

    #[test]
    fn test_success_without_response_uses_placeholder() {
        let mut session = ChatSession::new();
        session.on_network_success("{}");
        assert_eq!(session.transcript(), &[agent(NO_RESPONSE)]);
        assert_eq!(session.transcript()[0].message, "No response from agent.");
    }

    #[test]
    fn test_http_error_line() {
        let mut session = ChatSession::new();
        session.on_network_http_error(500, "oops");
        assert_eq!(session.transcript(), &[agent("Error from server: 500 - oops")]);
    }

    #[test]
    fn test_failure_line() {
        let mut session = ChatSession::new();
        session.on_network_failure("connection refused");
        assert_eq!(
            session.transcript(),
            &[agent("Sorry, I couldn't connect. Please try again.")]
        );
    }

    #[test]
    fn test_outcome_routes_status_error() {
        let mut session = ChatSession::new();
        session.on_outcome(Err(AgentError::Status {
            status: 404,
            body: "not found".to_string(),
        }));
        session.on_outcome(Ok(r#"{"response":"ok"}"#.to_string()));
        assert_eq!(
            session.transcript(),
            &[agent("Error from server: 404 - not found"), agent("ok")]
        );
    }

    #[test]
    fn test_transcript_keeps_append_order() {
        let mut session = ChatSession::new();
        session.submit("one");
        session.submit("two");
        session.on_network_success(r#"{"response":"first"}"#);
        session.on_network_success(r#"{"response":"second"}"#);

        let rendered: Vec<String> = session.transcript().iter().map(|l| l.to_string()).collect();
        assert_eq!(
            rendered,
            vec!["You: one", "You: two", "Agent: first", "Agent: second"]
        );
    }

    #[test]
    fn test_input_editing_is_utf8_safe() {
        let mut session = ChatSession::new();
        for c in "héllo".chars() {
            session.insert_char(c);
        }
        session.move_left();
        session.move_left();
        session.move_left();
        session.backspace(); // removes 'é'
        assert_eq!(session.input(), "hllo");
        assert_eq!(session.cursor(), 1);

        session.delete();
        assert_eq!(session.input(), "hlo");

        session.move_home();
        session.insert_char('¡');
        session.move_end();
        session.insert_char('!');
        assert_eq!(session.input(), "¡hlo!");
        assert_eq!(session.cursor(), 5);

        session.move_right();
        assert_eq!(session.cursor(), 5);
    }

    #[tokio::test]
    async fn test_exchange_round_trip() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/exec")
            .with_status(200)
            .with_body(r#"{"response":"hi there"}"#)
            .create_async()
            .await;

        let mut session = ChatSession::new();
        assert!(session.exchange(&client_for(&server), "hello").await);
        assert_eq!(
            session.transcript(),
            &[ChatLine::new(Sender::You, "hello"), agent("hi there")]
        );
    }

    #[tokio::test]
    async fn test_exchange_empty_query_makes_no_call() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/exec")
            .expect(0)
            .create_async()
            .await;

        let mut session = ChatSession::new();
        assert!(!session.exchange(&client_for(&server), "   ").await);
        assert!(session.transcript().is_empty());
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_exchange_connection_failure() {
        let mut session = ChatSession::new();
        assert!(session.exchange(&unreachable_client(), "hello").await);
        assert_eq!(session.transcript()[1], agent(CONNECT_FAILED));
    }
}
