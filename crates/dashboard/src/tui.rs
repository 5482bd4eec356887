//! Terminal renderer for the dashboard view

use crossterm::{
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::{Backend, CrosstermBackend},
    layout::{Alignment, Constraint, Direction, Layout},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph, Wrap},
    Frame, Terminal,
};
use std::io::{self, Stdout};

use crate::view::{DashboardView, LineStyle, Tone};

fn color(tone: Tone) -> Color {
    match tone {
        Tone::Green => Color::Green,
        Tone::Red => Color::Red,
        Tone::Yellow => Color::Yellow,
        Tone::Gray => Color::Gray,
    }
}

fn line_style(style: LineStyle) -> Style {
    let base = Style::default().fg(color(style.tone));
    if style.bold {
        base.add_modifier(Modifier::BOLD)
    } else {
        base
    }
}

/// Draw the whole dashboard into a frame
pub fn draw_ui(f: &mut Frame, view: &DashboardView) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints(
            [
                Constraint::Length(3),
                Constraint::Length(4),
                Constraint::Length(4),
                Constraint::Min(5),
                Constraint::Length(1),
            ]
            .as_ref(),
        )
        .split(f.size());

    // Header: title and status badge
    let status_style = Style::default()
        .fg(color(view.status.tone))
        .add_modifier(Modifier::BOLD);
    let badge = if view.status.connected { "● " } else { "○ " };
    let header = Paragraph::new(Line::from(vec![
        Span::styled(
            view.title,
            Style::default()
                .fg(Color::Green)
                .add_modifier(Modifier::BOLD),
        ),
        Span::raw("    "),
        Span::styled(badge, status_style),
        Span::styled(view.status.text.as_str(), status_style),
    ]))
    .block(Block::default().borders(Borders::ALL));
    f.render_widget(header, chunks[0]);

    // Wallet cards
    let cards = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(50), Constraint::Percentage(50)].as_ref())
        .split(chunks[1]);

    let usdt = Paragraph::new(Line::from(vec![
        Span::styled(
            view.usdt.as_str(),
            Style::default()
                .fg(Color::White)
                .add_modifier(Modifier::BOLD),
        ),
        Span::styled(" USDT", Style::default().fg(Color::DarkGray)),
    ]))
    .block(Block::default().title("USDT BALANCE").borders(Borders::ALL));
    f.render_widget(usdt, cards[0]);

    let btc = Paragraph::new(Line::from(vec![
        Span::styled(
            view.btc.as_str(),
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::BOLD),
        ),
        Span::styled(" BTC", Style::default().fg(Color::DarkGray)),
    ]))
    .block(Block::default().title("CRYPTO ASSET").borders(Borders::ALL));
    f.render_widget(btc, cards[1]);

    // Price
    let price = Paragraph::new(Line::from(Span::styled(
        format!("${}", view.price),
        Style::default()
            .fg(Color::Yellow)
            .add_modifier(Modifier::BOLD),
    )))
    .alignment(Alignment::Center)
    .block(Block::default().title("BTC / USDT PRICE").borders(Borders::ALL));
    f.render_widget(price, chunks[2]);

    // Log panel
    let lines: Vec<Line> = match view.empty_hint {
        Some(hint) => vec![Line::from(Span::styled(
            hint,
            Style::default().fg(Color::DarkGray),
        ))],
        None => view
            .logs
            .iter()
            .map(|log| {
                Line::from(vec![
                    Span::styled(
                        format!("[{}] ", log.time),
                        Style::default().fg(Color::DarkGray),
                    ),
                    Span::styled(log.prefix, line_style(log.style)),
                    Span::styled(log.message.as_str(), line_style(log.style)),
                ])
            })
            .collect(),
    };
    let logs = Paragraph::new(lines)
        .block(
            Block::default()
                .title(Span::styled(
                    "system_logs.log",
                    Style::default().fg(Color::Gray),
                ))
                .title_alignment(Alignment::Left)
                .borders(Borders::ALL),
        )
        .wrap(Wrap { trim: true });
    f.render_widget(logs, chunks[3]);

    let footer = Paragraph::new(Span::styled(
        view.footer.as_str(),
        Style::default().fg(Color::DarkGray),
    ));
    f.render_widget(footer, chunks[4]);
}

/// Terminal in raw mode on the alternate screen; restored on drop
pub struct Tui {
    terminal: Terminal<CrosstermBackend<Stdout>>,
    active: bool,
}

impl Tui {
    pub fn enter() -> anyhow::Result<Self> {
        enable_raw_mode()?;
        let mut stdout = io::stdout();
        execute!(stdout, EnterAlternateScreen)?;
        let backend = CrosstermBackend::new(stdout);
        let mut terminal = Terminal::new(backend)?;
        terminal.clear()?;

        Ok(Self {
            terminal,
            active: true,
        })
    }

    pub fn draw(&mut self, view: &DashboardView) -> anyhow::Result<()> {
        render(&mut self.terminal, view)
    }

    pub fn exit(&mut self) -> anyhow::Result<()> {
        if !self.active {
            return Ok(());
        }
        self.active = false;
        disable_raw_mode()?;
        execute!(self.terminal.backend_mut(), LeaveAlternateScreen)?;
        self.terminal.show_cursor()?;
        Ok(())
    }
}

impl Drop for Tui {
    fn drop(&mut self) {
        let _ = self.exit();
    }
}

/// Draw a view on any backend
pub fn render<B: Backend>(terminal: &mut Terminal<B>, view: &DashboardView) -> anyhow::Result<()> {
    terminal.draw(|f| draw_ui(f, view))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::view::project;
    use monitor_core::{LogCategory, LogEntry, PriceTick, WalletSnapshot};
    use monitor_feed::StateSnapshot;
    use ratatui::backend::TestBackend;
    use rust_decimal::Decimal;
    use std::str::FromStr;

    fn screen_text(terminal: &Terminal<TestBackend>) -> String {
        terminal
            .backend()
            .buffer()
            .content
            .iter()
            .map(|cell| cell.symbol())
            .collect()
    }

    #[test]
    fn test_renders_prices_and_logs() {
        let snapshot = StateSnapshot {
            price: Some(PriceTick::new(Decimal::from_str("96012.57").unwrap())),
            wallet: WalletSnapshot::new(
                Decimal::from_str("123.456").unwrap(),
                Decimal::from_str("0.00123").unwrap(),
            ),
            logs: vec![LogEntry::new(1, "Connected to server", LogCategory::Success)],
            ..Default::default()
        };

        let mut terminal = Terminal::new(TestBackend::new(100, 30)).unwrap();
        render(&mut terminal, &project(&snapshot)).unwrap();

        let text = screen_text(&terminal);
        assert!(text.contains("$96012.57"));
        assert!(text.contains("123.46"));
        assert!(text.contains("0.00123"));
        assert!(text.contains("Connected to server"));
        assert!(text.contains("CONNECTING"));
    }

    #[test]
    fn test_renders_waiting_hint() {
        let mut terminal = Terminal::new(TestBackend::new(100, 30)).unwrap();
        render(&mut terminal, &project(&StateSnapshot::default())).unwrap();

        let text = screen_text(&terminal);
        assert!(text.contains("$---"));
        assert!(text.contains("Waiting for data"));
    }
}
