use ratatui::layout::Rect;
use shopchat_core::{ChatController, Config, ConversationState, CycleOutcome};
use tokio::task::JoinHandle;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputMode {
    Normal,
    Editing,
}

/// Convert a character index to a byte index for UTF-8 safe string operations
fn char_to_byte_index(s: &str, char_idx: usize) -> usize {
    s.char_indices()
        .nth(char_idx)
        .map(|(i, _)| i)
        .unwrap_or(s.len())
}

pub struct App {
    pub should_quit: bool,
    pub input_mode: InputMode,

    // Input box
    pub input: String,
    pub cursor: usize, // cursor position in input, in chars

    // Latest conversation state from the store
    pub conversation: ConversationState,

    // Chat scrolling
    pub scroll: u16,
    pub follow: bool, // stick to the newest message
    pub chat_height: u16,
    pub chat_total_lines: u16,
    pub chat_area: Option<Rect>,

    // Animation state
    pub animation_frame: u8, // 0-2 for ellipsis animation

    // In-flight submission
    pub pending: Option<JoinHandle<CycleOutcome>>,

    // Display settings
    pub title: String,
    pub placeholder: String,
    pub backend_url: String,

    pub controller: ChatController,
}

impl App {
    pub fn new(controller: ChatController, config: &Config, backend_url: &str) -> Self {
        let conversation = controller.store().snapshot();

        Self {
            should_quit: false,
            input_mode: InputMode::Editing,

            input: String::new(),
            cursor: 0,

            conversation,

            scroll: 0,
            follow: true,
            chat_height: 0,
            chat_total_lines: 0,
            chat_area: None,

            animation_frame: 0,

            pending: None,

            title: config.title().to_string(),
            placeholder: config.placeholder().to_string(),
            backend_url: backend_url.to_string(),

            controller,
        }
    }

    pub fn is_busy(&self) -> bool {
        self.conversation.busy()
    }

    /// Send the input box contents
    ///
    /// The input is cleared as soon as the controller accepts the message;
    /// blank input or a pending reply leaves it untouched.
    pub fn submit(&mut self) {
        let Some(submission) = self.controller.submit(&self.input) else {
            return;
        };

        self.input.clear();
        self.cursor = 0;
        self.follow = true;
        self.pending = Some(tokio::spawn(submission.run()));
    }

    pub fn on_conversation_changed(&mut self, state: ConversationState) {
        if !state.busy() {
            self.animation_frame = 0;
        }
        self.conversation = state;
    }

    /// Drop the handle of a finished submission
    pub fn reap_pending(&mut self) {
        if self.pending.as_ref().is_some_and(|task| task.is_finished()) {
            self.pending = None;
        }
    }

    /// Abandon any in-flight request; its busy flag is released on drop
    pub fn shutdown(&mut self) {
        if let Some(task) = self.pending.take() {
            task.abort();
        }
    }

    /// Tick animation frame (called by Tick event)
    pub fn tick_animation(&mut self) {
        if self.is_busy() {
            self.animation_frame = (self.animation_frame + 1) % 3;
        }
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

    pub fn cursor_left(&mut self) {
        self.cursor = self.cursor.saturating_sub(1);
    }

    pub fn cursor_right(&mut self) {
        self.cursor = (self.cursor + 1).min(self.input.chars().count());
    }

    pub fn cursor_home(&mut self) {
        self.cursor = 0;
    }

    pub fn cursor_end(&mut self) {
        self.cursor = self.input.chars().count();
    }

    // Chat scrolling

    fn max_scroll(&self) -> u16 {
        self.chat_total_lines.saturating_sub(self.chat_height)
    }

    pub fn scroll_up(&mut self, lines: u16) {
        self.scroll = self.scroll.min(self.max_scroll()).saturating_sub(lines);
        self.follow = false;
    }

    pub fn scroll_down(&mut self, lines: u16) {
        self.scroll = self.scroll.saturating_add(lines).min(self.max_scroll());
        self.follow = self.scroll >= self.max_scroll();
    }

    pub fn page_up(&mut self) {
        self.scroll_up((self.chat_height / 2).max(1));
    }

    pub fn page_down(&mut self) {
        self.scroll_down((self.chat_height / 2).max(1));
    }

    pub fn scroll_to_top(&mut self) {
        self.scroll = 0;
        self.follow = false;
    }

    pub fn scroll_to_bottom(&mut self) {
        self.follow = true;
        self.scroll = self.max_scroll();
    }

    /// Record the rendered chat size; keeps the newest line visible when
    /// following
    pub fn update_chat_metrics(&mut self, height: u16, total_lines: u16) {
        self.chat_height = height;
        self.chat_total_lines = total_lines;
        if self.follow {
            self.scroll = self.max_scroll();
        } else {
            self.scroll = self.scroll.min(self.max_scroll());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use shopchat_core::{AssistantReply, BackendClient, ClientError, MessageStore};

    struct Canned;

    #[async_trait]
    impl BackendClient for Canned {
        async fn send(&self, _utterance: &str) -> Result<AssistantReply, ClientError> {
            Ok(AssistantReply {
                text: "Hi there!".to_string(),
                products: Vec::new(),
            })
        }
    }

    fn app() -> App {
        let controller = ChatController::new(MessageStore::new(), Canned);
        App::new(controller, &Config::new(), "http://127.0.0.1:5000")
    }

    #[test]
    fn editing_is_utf8_safe() {
        let mut app = app();
        for c in "héllo".chars() {
            app.insert_char(c);
        }
        app.cursor_left();
        app.cursor_left();
        app.backspace();
        assert_eq!(app.input, "hélo");
        assert_eq!(app.cursor, 2);

        app.cursor_home();
        app.delete();
        assert_eq!(app.input, "élo");

        app.cursor_end();
        app.cursor_right();
        assert_eq!(app.cursor, 3);
    }

    #[tokio::test]
    async fn accepted_submission_clears_input() {
        let mut app = app();
        app.input = "  hello ".to_string();
        app.cursor = 8;

        app.submit();

        assert!(app.input.is_empty());
        assert_eq!(app.cursor, 0);
        let outcome = app.pending.take().unwrap().await.unwrap();
        assert_eq!(outcome, CycleOutcome::Replied { products: 0 });
        assert_eq!(app.controller.store().len(), 2);
    }

    #[tokio::test]
    async fn submission_while_busy_keeps_typed_text() {
        let mut app = app();
        let in_flight = app.controller.submit("first").unwrap();

        app.input = "second".to_string();
        app.submit();

        assert_eq!(app.input, "second");
        assert!(app.pending.is_none());
        drop(in_flight);
    }

    #[test]
    fn blank_submission_keeps_input() {
        let mut app = app();
        app.input = "   ".to_string();
        app.submit();
        assert_eq!(app.input, "   ");
        assert!(app.controller.store().is_empty());
    }

    #[test]
    fn follow_mode_tracks_the_bottom() {
        let mut app = app();
        app.update_chat_metrics(10, 30);
        assert_eq!(app.scroll, 20);

        app.scroll_up(5);
        assert_eq!(app.scroll, 15);
        assert!(!app.follow);

        // New content does not yank the view while scrolled up
        app.update_chat_metrics(10, 40);
        assert_eq!(app.scroll, 15);

        app.scroll_down(100);
        assert!(app.follow);
        app.update_chat_metrics(10, 50);
        assert_eq!(app.scroll, 40);
    }
}
