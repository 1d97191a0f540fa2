use ratatui::layout::{Alignment, Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span, Text};
use ratatui::widgets::{Block, Borders, List, ListItem, ListState, Paragraph, Wrap};
use ratatui::Frame;
use unicode_segmentation::UnicodeSegmentation;
use unicode_width::UnicodeWidthStr;

use crate::app::{AdminInput, AdminPhase, AdminView, FeedCard, FeedPhase, FeedView, SaveState, Screen};
use crate::config::DisplayOptions;
use crate::timefmt::TimeFormatter;

const ACCENT: (u8, u8, u8) = (231, 84, 128);

pub fn draw_app(
    frame: &mut Frame,
    screen: &Screen,
    formatter: &TimeFormatter,
    display: &DisplayOptions,
    list_state: &mut ListState,
) {
    let vertical = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Min(3),
            Constraint::Length(2),
        ])
        .split(frame.size());

    let (subtitle, hints) = match screen {
        Screen::Feed(_) => ("", "j/k scroll • Tab admin panel • q quit"),
        Screen::Admin(view) => (
            "  · Admin Panel",
            if matches!(view.input(), AdminInput::Browse) {
                "n new • e edit • d delete • s save • Tab main page • q quit"
            } else {
                "Enter commit • Esc cancel • Ctrl-s save"
            },
        ),
    };
    let header = Paragraph::new(Line::from(vec![
        Span::styled(
            display.board_title.clone(),
            Style::default()
                .fg(accent(1.0))
                .add_modifier(Modifier::BOLD),
        ),
        Span::styled(subtitle, Style::default().fg(Color::Gray)),
    ]))
    .alignment(Alignment::Center)
    .block(Block::default().borders(Borders::BOTTOM));
    frame.render_widget(header, vertical[0]);

    match screen {
        Screen::Feed(view) => draw_feed(frame, vertical[1], view, formatter),
        Screen::Admin(view) => draw_admin(frame, vertical[1], view, formatter, list_state),
    }

    let footer = Paragraph::new(Span::styled(hints, Style::default().fg(Color::DarkGray)))
        .alignment(Alignment::Center);
    frame.render_widget(footer, vertical[2]);
}

/// Accent colour scaled toward black by `weight`.
pub fn accent(weight: f32) -> Color {
    let weight = weight.clamp(0.0, 1.0);
    let scale = |c: u8| (c as f32 * weight).round() as u8;
    Color::Rgb(scale(ACCENT.0), scale(ACCENT.1), scale(ACCENT.2))
}

fn draw_feed(frame: &mut Frame, area: Rect, view: &FeedView, formatter: &TimeFormatter) {
    match view.phase() {
        FeedPhase::Loading => {
            frame.render_widget(Paragraph::new("Loading statuses..."), area);
        }
        FeedPhase::Errored(message) => {
            frame.render_widget(
                Paragraph::new(message.as_str())
                    .style(Style::default().fg(Color::Red))
                    .wrap(Wrap { trim: true }),
                area,
            );
        }
        FeedPhase::Loaded { entries, skipped } => {
            if entries.is_empty() {
                frame.render_widget(
                    Paragraph::new("No statuses yet.").style(Style::default().fg(Color::Gray)),
                    area,
                );
                return;
            }
            let mut cards_area = area;
            if *skipped > 0 {
                let note = Paragraph::new(format!(
                    "{skipped} status{} with an unreadable time hidden",
                    if *skipped == 1 { "" } else { "es" }
                ))
                .style(Style::default().fg(Color::Yellow));
                frame.render_widget(note, Rect::new(area.x, area.y, area.width, 1));
                cards_area = Rect::new(
                    area.x,
                    area.y.saturating_add(1),
                    area.width,
                    area.height.saturating_sub(1),
                );
            }
            let cards = view.cards(formatter);
            draw_cards(frame, cards_area, &cards[view.scroll().min(cards.len())..]);
        }
    }
}

fn draw_cards(frame: &mut Frame, area: Rect, cards: &[FeedCard]) {
    let bottom = area.y + area.height;
    let inner_width = area.width.saturating_sub(2).max(1);
    let mut y = area.y;
    for card in cards {
        let remaining = bottom.saturating_sub(y);
        let height = card_height(card, inner_width).min(remaining);
        if height < 3 {
            break;
        }
        let block = Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(accent(card.weight)));
        let mut lines = vec![card_header(card)];
        lines.extend(card.text.lines().map(|line| Line::from(line.to_string())));
        let paragraph = Paragraph::new(Text::from(lines))
            .block(block)
            .wrap(Wrap { trim: false });
        frame.render_widget(paragraph, Rect::new(area.x, y, area.width, height));
        y += height;
    }
}

fn card_header(card: &FeedCard) -> Line<'static> {
    let meta = Style::default()
        .fg(Color::Gray)
        .add_modifier(Modifier::ITALIC);
    Line::from(vec![
        Span::styled(
            card.time.clock_time.clone(),
            Style::default().add_modifier(Modifier::BOLD),
        ),
        Span::styled(format!("  {}", card.time.long_date), meta),
        Span::styled(format!("  ({})", card.time.relative), meta),
    ])
}

fn card_height(card: &FeedCard, inner_width: u16) -> u16 {
    let width = inner_width.max(1) as usize;
    let header = format!(
        "{}  {}  ({})",
        card.time.clock_time, card.time.long_date, card.time.relative
    );
    let mut rows = wrapped_rows(&header, width);
    let mut body_lines = 0;
    for line in card.text.lines() {
        rows += wrapped_rows(line, width);
        body_lines += 1;
    }
    if body_lines == 0 {
        rows += 1;
    }
    (rows + 2).min(u16::MAX as usize) as u16
}

/// Rows `line` takes under `Wrap { trim: false }`: words are packed greedily,
/// the space at a break is dropped and a word wider than a row is split.
fn wrapped_rows(line: &str, width: usize) -> usize {
    let mut rows = 1;
    let mut used = 0;
    for (idx, word) in line.split(' ').enumerate() {
        let gap = usize::from(idx > 0);
        let word_width = UnicodeWidthStr::width(word);
        if used + gap + word_width <= width {
            used += gap + word_width;
            continue;
        }
        if used > 0 {
            rows += 1;
            used = 0;
        }
        for grapheme in word.graphemes(true) {
            let cols = UnicodeWidthStr::width(grapheme);
            if used + cols > width {
                rows += 1;
                used = 0;
            }
            used += cols;
        }
    }
    rows
}

fn draw_admin(
    frame: &mut Frame,
    area: Rect,
    view: &AdminView,
    formatter: &TimeFormatter,
    list_state: &mut ListState,
) {
    let sections = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Min(3),
            Constraint::Length(1),
        ])
        .split(area);

    match view.phase() {
        AdminPhase::Loading => {
            frame.render_widget(Paragraph::new("Loading statuses..."), area);
            return;
        }
        AdminPhase::LoadFailed(message) => {
            frame.render_widget(
                Paragraph::new(format!("Failed to load statuses: {message}"))
                    .style(Style::default().fg(Color::Red))
                    .wrap(Wrap { trim: true }),
                area,
            );
            return;
        }
        AdminPhase::Ready => {}
    }

    let composing = matches!(view.input(), AdminInput::Compose(_));
    let compose_text = match view.input() {
        AdminInput::Compose(buffer) => Span::raw(buffer.clone()),
        _ => Span::styled(
            "press n to add a status",
            Style::default().fg(Color::DarkGray),
        ),
    };
    let compose_style = if composing {
        Style::default().fg(Color::Cyan)
    } else {
        Style::default()
    };
    let compose = Paragraph::new(Line::from(compose_text)).block(
        Block::default()
            .title("Add New Status")
            .borders(Borders::ALL)
            .border_style(compose_style),
    );
    frame.render_widget(compose, sections[0]);
    if let AdminInput::Compose(buffer) = view.input() {
        let max_x = sections[0].x + sections[0].width.saturating_sub(2);
        let x = (sections[0].x + 1 + UnicodeWidthStr::width(buffer.as_str()) as u16).min(max_x);
        frame.set_cursor(x, sections[0].y + 1);
    }

    let editing = match view.input() {
        AdminInput::Edit { id, buffer } => Some((*id, buffer.as_str())),
        _ => None,
    };
    let mut items = Vec::with_capacity(view.store().len());
    for entry in view.store().iter() {
        let text_line = match editing {
            Some((id, buffer)) if id == entry.id => Line::from(vec![
                Span::styled(
                    "✎ ",
                    Style::default()
                        .fg(Color::Magenta)
                        .add_modifier(Modifier::BOLD),
                ),
                Span::raw(buffer.to_string()),
            ]),
            _ => Line::from(entry.text.clone()),
        };
        let stamp = Line::from(Span::styled(
            format!(
                "Timestamp: {}, {}",
                formatter.long_date(entry.time),
                formatter.clock_time(entry.time)
            ),
            Style::default().fg(Color::Gray),
        ));
        items.push(ListItem::new(vec![text_line, stamp]));
    }
    if items.is_empty() {
        items.push(ListItem::new("No statuses yet."));
    }
    let list = List::new(items)
        .block(
            Block::default()
                .title("Edit Existing Posts")
                .borders(Borders::ALL),
        )
        .highlight_style(
            Style::default()
                .bg(Color::Blue)
                .fg(Color::Black)
                .add_modifier(Modifier::BOLD),
        )
        .highlight_symbol("▸ ");
    frame.render_stateful_widget(list, sections[1], list_state);

    frame.render_widget(Paragraph::new(build_status_line(view)), sections[2]);
}

fn build_status_line(view: &AdminView) -> Line<'static> {
    let mut spans = vec![Span::raw(format!("Total: {} ", view.store().len()))];
    if let Some(message) = view.status_message() {
        let style = match view.save_state() {
            SaveState::Succeeded => Style::default().fg(Color::Green),
            SaveState::Failed(_) => Style::default().fg(Color::Red).add_modifier(Modifier::BOLD),
            _ => Style::default().fg(Color::Yellow),
        };
        spans.push(Span::raw(" | "));
        spans.push(Span::styled(message, style));
    }
    if view.skipped() > 0 {
        spans.push(Span::raw(" | "));
        spans.push(Span::styled(
            format!("{} unreadable dropped on save", view.skipped()),
            Style::default().fg(Color::Yellow),
        ));
    }
    Line::from(spans)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::{FetchFailure, LoadedStatuses, SaveFailure};
    use crate::store::StatusEntry;
    use crate::timefmt::ManualClock;
    use ratatui::backend::TestBackend;
    use ratatui::Terminal;
    use time::macros::datetime;
    use time::Duration;

    const WIDTH: u16 = 80;
    const HEIGHT: u16 = 24;

    fn render(screen: &Screen) -> Terminal<TestBackend> {
        let mut terminal = Terminal::new(TestBackend::new(WIDTH, HEIGHT)).expect("terminal");
        let mut list_state = ListState::default();
        terminal
            .draw(|frame| {
                draw_app(
                    frame,
                    screen,
                    &TimeFormatter::default(),
                    &DisplayOptions::default(),
                    &mut list_state,
                )
            })
            .expect("draw");
        terminal
    }

    fn screen_text(terminal: &Terminal<TestBackend>) -> String {
        let buffer = terminal.backend().buffer();
        buffer
            .content()
            .chunks(buffer.area.width as usize)
            .map(|row| row.iter().map(|cell| cell.symbol()).collect::<String>())
            .collect::<Vec<_>>()
            .join("\n")
    }

    fn loaded_feed(entries: Vec<StatusEntry>) -> Screen {
        let clock = ManualClock::new(datetime!(2025-06-03 20:00 UTC));
        let mut view = FeedView::mount(&clock, Duration::seconds(60));
        view.apply_load(Ok(LoadedStatuses {
            entries,
            skipped: 0,
            etag: None,
        }));
        Screen::Feed(view)
    }

    #[test]
    fn accent_scales_toward_black() {
        assert_eq!(accent(1.0), Color::Rgb(231, 84, 128));
        assert_eq!(accent(0.5), Color::Rgb(116, 42, 64));
        assert_eq!(accent(0.0), Color::Rgb(0, 0, 0));
    }

    #[test]
    fn feed_cards_show_time_labels_and_fade() {
        let screen = loaded_feed(vec![
            StatusEntry::new("older news", datetime!(2025-06-03 17:30 UTC)),
            StatusEntry::new("cake is out", datetime!(2025-06-03 19:05 UTC)),
        ]);
        let terminal = render(&screen);
        let text = screen_text(&terminal);
        assert!(text.contains("Status Updates"));
        assert!(text.contains("3:05 PM  Tuesday, June 3rd  (55 mins ago)"));
        assert!(text.contains("cake is out"));
        assert!(text.contains("(2 hrs 30 mins ago)"));
        assert!(text.find("cake is out") < text.find("older news"));

        let buffer = terminal.backend().buffer();
        // first card's top-left corner sits right under the 3-row header
        assert_eq!(buffer.get(0, 3).style().fg, Some(accent(1.0)));
        let second_top = 3 + card_height(
            &FeedCard {
                text: "cake is out".into(),
                time: TimeFormatter::default()
                    .format(datetime!(2025-06-03 19:05 UTC), datetime!(2025-06-03 20:00 UTC)),
                weight: 1.0,
            },
            WIDTH - 2,
        );
        assert_eq!(buffer.get(0, second_top).style().fg, Some(accent(0.2)));
    }

    #[test]
    fn wrapping_estimate_breaks_at_words() {
        assert_eq!(wrapped_rows("", 10), 1);
        assert_eq!(wrapped_rows("hello world", 11), 1);
        assert_eq!(wrapped_rows("hello world", 10), 2);
        assert_eq!(wrapped_rows(&"x".repeat(25), 10), 3);
        assert_eq!(wrapped_rows("ab cdefghijkl", 10), 2);
        assert_eq!(wrapped_rows("ab cdefghijklm", 10), 3);
    }

    #[test]
    fn long_multi_word_status_is_not_clipped() {
        let text = ["a", "b", "c", "d"]
            .iter()
            .map(|letter| letter.repeat(40))
            .collect::<Vec<_>>()
            .join(" ");
        assert_eq!(wrapped_rows(&text, (WIDTH - 2) as usize), 4);

        let screen = loaded_feed(vec![StatusEntry::new(
            text,
            datetime!(2025-06-03 19:05 UTC),
        )]);
        let rendered = screen_text(&render(&screen));
        assert!(rendered.contains(&"c".repeat(40)));
        assert!(rendered.contains(&"d".repeat(40)));
    }

    #[test]
    fn feed_shows_loading_and_errors() {
        let clock = ManualClock::new(datetime!(2025-06-03 20:00 UTC));
        let mut view = FeedView::mount(&clock, Duration::seconds(60));
        let text = screen_text(&render(&Screen::Feed(view.clone())));
        assert!(text.contains("Loading statuses..."));

        view.apply_load(Err(FetchFailure::Status(404)));
        let text = screen_text(&render(&Screen::Feed(view)));
        assert!(text.contains("server responded with status 404"));
    }

    #[test]
    fn admin_lists_entries_and_save_outcome() {
        let mut view = AdminView::mount();
        view.apply_load(Ok(LoadedStatuses {
            entries: vec![StatusEntry::new("guests arriving", datetime!(2025-06-03 17:00 UTC))],
            skipped: 0,
            etag: None,
        }));
        view.begin_save();
        view.apply_save(Err(SaveFailure::Status(403)));

        let text = screen_text(&render(&Screen::Admin(view)));
        assert!(text.contains("Admin Panel"));
        assert!(text.contains("guests arriving"));
        assert!(text.contains("Timestamp: Tuesday, June 3rd, 1:00 PM"));
        assert!(text.contains("Failed to upload statuses: server responded with status 403"));
    }

    #[test]
    fn admin_edit_marks_the_row_being_edited() {
        let mut view = AdminView::mount();
        view.apply_load(Ok(LoadedStatuses {
            entries: vec![StatusEntry::new("draft", datetime!(2025-06-03 17:00 UTC))],
            skipped: 0,
            etag: None,
        }));
        view.begin_edit_selected();
        view.push_char('!');
        let text = screen_text(&render(&Screen::Admin(view)));
        assert!(text.contains("✎ draft!"));
        assert!(text.contains("Enter commit"));
    }
}
