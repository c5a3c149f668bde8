use anyhow::Result;
use crossterm::event::{Event, EventStream, KeyCode, KeyEventKind};
use futures_util::StreamExt;
use ratatui::DefaultTerminal;
use ratatui::Frame;
use ratatui::layout::{Constraint, Layout};
use ratatui::style::Stylize;
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, List, ListItem, Paragraph};
use shared::types::event::RealtimeEvent;
use tracing::info;
use tui::RealtimeSubscriber;

/// One-line summary of an event for the feed.
pub fn describe(event: &RealtimeEvent) -> String {
    match event {
        RealtimeEvent::Connected { data, .. } => format!("connected as {}", data.client_id),
        RealtimeEvent::DashboardUpdate { data, .. } => {
            let Some(stats) = &data.stats else {
                return "stats refreshed".to_string();
            };
            let mut parts = Vec::new();
            if let Some(n) = stats.total_members {
                parts.push(format!("members {}", n));
            }
            if let Some(n) = stats.active_members {
                parts.push(format!("active {}", n));
            }
            if let Some(n) = stats.today_check_ins {
                parts.push(format!("check-ins today {}", n));
            }
            if let Some(n) = stats.active_memberships {
                parts.push(format!("memberships {}", n));
            }
            if let Some(r) = stats.monthly_revenue {
                parts.push(format!("revenue {:.2}", r));
            }
            if parts.is_empty() {
                "stats refreshed".to_string()
            } else {
                parts.join(", ")
            }
        }
        RealtimeEvent::AttendanceCheckin { data, .. } => match &data.checkin {
            Some(c) => format!("{} ({}, {}) checked in", c.member_name, c.member_id, c.membership_type),
            None => "check-in".to_string(),
        },
        RealtimeEvent::MemberUpdate { data, .. } => {
            let name = data
                .member
                .as_ref()
                .and_then(|m| m.get("name"))
                .and_then(|n| n.as_str());
            match name {
                Some(name) => format!("member {} updated", name),
                None => "member updated".to_string(),
            }
        }
        RealtimeEvent::Notification { data, .. } => {
            let message = data.message.as_deref().unwrap_or("");
            match data.kind.as_deref() {
                Some(kind) => format!("[{}] {}", kind, message),
                None => message.to_string(),
            }
        }
    }
}

pub struct App {
    subscriber: RealtimeSubscriber,
    status: String,
    should_quit: bool,
}

impl App {
    pub fn new(subscriber: RealtimeSubscriber) -> Self {
        Self {
            subscriber,
            status: "t: send test notification   q: quit".to_string(),
            should_quit: false,
        }
    }

    /// Redraw on every key press and every state change until `q`.
    pub async fn run(mut self, terminal: &mut DefaultTerminal) -> Result<()> {
        let mut keys = EventStream::new();
        let mut changes = self.subscriber.watch();

        while !self.should_quit {
            terminal.draw(|frame| self.render(frame))?;

            tokio::select! {
                key = keys.next() => match key {
                    Some(Ok(Event::Key(key))) if key.kind == KeyEventKind::Press => {
                        self.on_key(key.code).await;
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => return Err(e.into()),
                    None => break,
                },
                changed = changes.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }

        self.subscriber.close();
        Ok(())
    }

    async fn on_key(&mut self, code: KeyCode) {
        match code {
            KeyCode::Char('q') | KeyCode::Esc => self.should_quit = true,
            KeyCode::Char('t') => {
                let data = serde_json::json!({
                    "message": "Test notification from the terminal",
                    "type": "info",
                });
                self.status = match self.subscriber.send_test_event("notification", data).await {
                    Ok(ack) => ack.message,
                    Err(e) => format!("Trigger failed: {}", e),
                };
                info!("Test event: {}", self.status);
            }
            _ => {}
        }
    }

    fn render(&self, frame: &mut Frame) {
        let [header, feed, footer] = Layout::vertical([
            Constraint::Length(3),
            Constraint::Min(1),
            Constraint::Length(1),
        ])
        .areas(frame.area());

        let state = self.subscriber.watch().borrow().clone();

        let indicator = if state.is_connected {
            Span::from("● Connected").green().bold()
        } else {
            Span::from("○ Disconnected").red().bold()
        };
        let summary = Line::from(vec![
            indicator,
            Span::from(format!(
                "   {}   {} events",
                self.subscriber.client().authority(),
                state.events.len()
            )),
        ]);
        frame.render_widget(
            Paragraph::new(summary).block(Block::bordered().title(" Gym live feed ")),
            header,
        );

        let visible = feed.height.saturating_sub(2) as usize;
        let items: Vec<ListItem> = state
            .events
            .iter()
            .rev()
            .take(visible)
            .rev()
            .map(|event| {
                ListItem::new(Line::from(vec![
                    Span::from(short_time(event.timestamp())).dark_gray(),
                    Span::from(format!(" {:<18} ", event.event_type())).cyan(),
                    Span::from(describe(event)),
                ]))
            })
            .collect();
        frame.render_widget(List::new(items).block(Block::bordered().title(" Events ")), feed);

        frame.render_widget(Paragraph::new(self.status.as_str()).dark_gray(), footer);
    }
}

/// `HH:MM:SS` out of an ISO-8601 stamp; anything else is shown as-is.
fn short_time(timestamp: &str) -> &str {
    timestamp.get(11..19).unwrap_or(timestamp)
}
