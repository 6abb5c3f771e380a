//! Rendering.

use crate::app::App;
use ratatui::{
    layout::{Constraint, Layout, Margin, Rect},
    style::{Color, Style, Stylize},
    text::{Line, Span},
    widgets::{Block, BorderType, Cell, Clear, Padding, Paragraph, Row, Table, TableState},
    Frame,
};

const KEY_HINTS: &str =
    " j/k move | enter toggle | c create | e edit | d delete | s sync | q quit ";

pub fn draw(frame: &mut Frame, app: &App) {
    let [list_area, status_area] =
        Layout::vertical([Constraint::Min(3), Constraint::Length(1)]).areas(frame.area());

    draw_table(frame, app, list_area);
    draw_status(frame, app, status_area);
    draw_prompt(frame, app, list_area);
}

fn draw_table(frame: &mut Frame, app: &App, area: Rect) {
    let header = Row::new(["Done".bold(), "Title".bold()]);
    let rows = app.tasks().iter().map(|task| {
        let done = if task.done { " [x] " } else { " [ ] " };
        Row::new([Cell::from(done), Cell::from(task.title.as_str())])
    });

    let sync = if app.sync_active() {
        Span::styled(" sync on ", Style::new().fg(Color::Green))
    } else {
        Span::styled(" sync off ", Style::new().fg(Color::DarkGray))
    };

    let table = Table::new(rows, [Constraint::Length(6), Constraint::Fill(1)])
        .header(header)
        .highlight_symbol(">> ")
        .highlight_style(Style::new().bold().fg(Color::Blue))
        .block(
            Block::bordered()
                .border_type(BorderType::Rounded)
                .title(Line::from(vec![" Tasks ".bold(), sync]))
                .title_bottom(KEY_HINTS),
        );

    let mut state = TableState::default().with_selected(app.selected());
    frame.render_stateful_widget(table, area, &mut state);
}

fn draw_status(frame: &mut Frame, app: &App, area: Rect) {
    let line = match app.status() {
        Some(message) => Line::from(Span::styled(message, Style::new().fg(Color::Red))),
        None => Line::from(format!(" {} tasks", app.tasks().len())).dark_gray(),
    };
    frame.render_widget(Paragraph::new(line), area);
}

fn draw_prompt(frame: &mut Frame, app: &App, area: Rect) {
    let Some(prompt) = app.prompt() else {
        return;
    };

    let [_, popup, _] = Layout::vertical([
        Constraint::Fill(1),
        Constraint::Length(5),
        Constraint::Fill(1),
    ])
    .areas(area.inner(Margin::new(4, 0)));

    frame.render_widget(Clear, popup);
    let input = Paragraph::new(Line::from(vec![
        Span::raw(prompt.buffer()),
        Span::raw("_").slow_blink(),
    ]))
    .block(
        Block::bordered()
            .border_type(BorderType::Rounded)
            .title(prompt.heading())
            .title_bottom(" enter save | esc cancel ")
            .padding(Padding::horizontal(1)),
    );
    frame.render_widget(input, popup);
}
