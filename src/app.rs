use ratatui::layout::Rect;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::agent::{AgentClient, AgentError};
use crate::chat::ChatSession;
use crate::tui::AppEvent;
use crate::ui;

pub struct App {
    pub should_quit: bool,

    // Conversation
    pub session: ChatSession,
    pub client: AgentClient,
    pub in_flight: usize,
    events: mpsc::UnboundedSender<AppEvent>,

    // Transcript scroll state
    pub scroll: u16,
    pub follow: bool, // stick to the newest line
    pub chat_height: u16, // inner size of the transcript pane, set during render
    pub chat_width: u16,

    // Animation state
    pub animation_frame: u8, // 0-2 for ellipsis animation

    // Panel areas for mouse hit-testing (updated during render)
    pub chat_area: Option<Rect>,
    pub send_area: Option<Rect>,
}

impl App {
    pub fn new(client: AgentClient, events: mpsc::UnboundedSender<AppEvent>) -> Self {
        Self {
            should_quit: false,

            session: ChatSession::new(),
            client,
            in_flight: 0,
            events,

            scroll: 0,
            follow: true,
            chat_height: 0,
            chat_width: 0,

            animation_frame: 0,

            chat_area: None,
            send_area: None,
        }
    }

    pub fn is_waiting(&self) -> bool {
        self.in_flight > 0
    }

    /// Send button / Enter: submit the input and start one agent call.
    pub fn submit(&mut self) {
        let Some(query) = self.session.submit_input() else {
            return;
        };

        self.in_flight += 1;
        self.scroll_to_bottom();

        let client = self.client.clone();
        let events = self.events.clone();
        tokio::spawn(async move {
            let outcome = client.send(&query).await;
            if events.send(AppEvent::Reply(outcome)).is_err() {
                debug!("reply arrived after the UI loop closed");
            }
        });
    }

    /// Apply a finished call to the transcript.
    pub fn receive(&mut self, outcome: Result<String, AgentError>) {
        match self.in_flight.checked_sub(1) {
            Some(remaining) => self.in_flight = remaining,
            None => warn!("received a reply with no request in flight"),
        }
        self.session.on_outcome(outcome);
        self.scroll_to_bottom();
    }

    /// Tick animation frame (called by Tick event)
    pub fn tick_animation(&mut self) {
        if self.is_waiting() {
            self.animation_frame = (self.animation_frame + 1) % 3;
        }
    }

    /// Rendered height of the transcript, including the typing indicator.
    pub fn content_height(&self) -> u16 {
        // Use actual chat width for wrap calculation, default to 50 if not set
        let wrap_width = if self.chat_width > 0 { self.chat_width } else { 50 };

        let lines = ui::transcript_paragraph(self).line_count(wrap_width);
        lines.min(u16::MAX as usize) as u16
    }

    pub fn max_scroll(&self) -> u16 {
        let visible_height = if self.chat_height > 0 {
            self.chat_height
        } else {
            20
        };
        self.content_height().saturating_sub(visible_height)
    }

    pub fn scroll_to_bottom(&mut self) {
        self.follow = true;
        self.scroll = self.max_scroll();
    }

    pub fn scroll_up(&mut self, lines: u16) {
        self.follow = false;
        self.scroll = self.scroll.saturating_sub(lines);
    }

    pub fn scroll_down(&mut self, lines: u16) {
        let max = self.max_scroll();
        self.scroll = self.scroll.saturating_add(lines).min(max);
        self.follow = self.scroll >= max;
    }

    pub fn page_size(&self) -> u16 {
        self.chat_height.saturating_sub(1).max(1)
    }
}
