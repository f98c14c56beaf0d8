use anyhow::Result;
use crossterm::{
    event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use finance_ledger::{format_money, Kind, LedgerError, LedgerStore, Movement, Totals};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Cell, Paragraph, Row, Table, TableState},
    Frame, Terminal,
};
use std::io;
use tracing::error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Focus {
    Kind,
    Description,
    Amount,
    Table,
}

impl Focus {
    pub fn next(&self) -> Self {
        match self {
            Focus::Kind => Focus::Description,
            Focus::Description => Focus::Amount,
            Focus::Amount => Focus::Table,
            Focus::Table => Focus::Kind,
        }
    }

    pub fn previous(&self) -> Self {
        match self {
            Focus::Kind => Focus::Table,
            Focus::Description => Focus::Kind,
            Focus::Amount => Focus::Description,
            Focus::Table => Focus::Amount,
        }
    }
}

/// One-line message shown in the status bar (the dialog boxes of a
/// desktop form)
#[derive(Debug, Clone, PartialEq)]
pub enum Notice {
    Info(String),
    Warning(String),
    Error(String),
}

impl Notice {
    fn text(&self) -> &str {
        match self {
            Notice::Info(s) | Notice::Warning(s) | Notice::Error(s) => s,
        }
    }

    fn color(&self) -> Color {
        match self {
            Notice::Info(_) => Color::Green,
            Notice::Warning(_) => Color::Yellow,
            Notice::Error(_) => Color::Red,
        }
    }
}

pub struct App {
    store: LedgerStore,
    pub kind: Kind,
    pub description: String,
    pub amount: String,
    pub focus: Focus,
    pub movements: Vec<Movement>,
    pub totals: Totals,
    pub total_count: i64,
    pub state: TableState,
    pub notice: Option<Notice>,
    pub pending_delete: Option<i64>,
}

impl App {
    pub fn new(store: LedgerStore) -> Result<Self, LedgerError> {
        let mut app = Self {
            store,
            kind: Kind::Income,
            description: String::new(),
            amount: String::new(),
            focus: Focus::Description,
            movements: Vec::new(),
            totals: Totals::default(),
            total_count: 0,
            state: TableState::default(),
            notice: None,
            pending_delete: None,
        };
        app.refresh()?;
        Ok(app)
    }

    /// Reload rows and totals from the store, keeping the selection in range
    pub fn refresh(&mut self) -> Result<(), LedgerError> {
        self.movements = self.store.list_all()?;
        self.totals = self.store.totals()?;
        self.total_count = self.store.count()?;

        let selected = match (self.state.selected(), self.movements.len()) {
            (_, 0) => None,
            (Some(i), len) => Some(i.min(len - 1)),
            (None, _) => Some(0),
        };
        self.state.select(selected);
        Ok(())
    }

    fn refresh_or_report(&mut self) {
        if let Err(err) = self.refresh() {
            error!(error = %err, "refresh failed");
            self.notice = Some(Notice::Error(format!("Could not load movements: {}", err)));
        }
    }

    pub fn selected_movement(&self) -> Option<&Movement> {
        self.state.selected().and_then(|i| self.movements.get(i))
    }

    // ========================================================================
    // FORM
    // ========================================================================

    /// Save the form as a new movement. Inputs are cleared only after the
    /// store accepted the row.
    pub fn submit(&mut self) {
        if self.description.trim().is_empty() || self.amount.trim().is_empty() {
            self.notice = Some(Notice::Warning("All fields are required".to_string()));
            return;
        }
        if self.amount.trim().parse::<f64>().is_err() {
            self.notice = Some(Notice::Error("Amount must be numeric".to_string()));
            return;
        }

        match self.store.append_raw(self.kind.as_str(), &self.description, &self.amount) {
            Ok(_) => {
                self.description.clear();
                self.amount.clear();
                self.focus = Focus::Description;
                self.notice = Some(Notice::Info(format!("{} saved", self.kind)));
                self.refresh_or_report();
                // Follow the new row
                if !self.movements.is_empty() {
                    self.state.select(Some(self.movements.len() - 1));
                }
            }
            Err(LedgerError::Validation(err)) => {
                self.notice = Some(Notice::Warning(format!("Invalid {}", err)));
            }
            Err(err) => {
                error!(error = %err, "save failed");
                self.notice = Some(Notice::Error(format!("Could not save: {}", err)));
            }
        }
    }

    fn active_input(&mut self) -> Option<&mut String> {
        match self.focus {
            Focus::Description => Some(&mut self.description),
            Focus::Amount => Some(&mut self.amount),
            Focus::Kind | Focus::Table => None,
        }
    }

    // ========================================================================
    // DELETE
    // ========================================================================

    /// Ask for confirmation before deleting the selected row
    pub fn request_delete(&mut self) {
        let target = self
            .selected_movement()
            .map(|m| (m.id, m.description.clone()));

        match target {
            Some((id, description)) => {
                self.notice = Some(Notice::Warning(format!(
                    "Delete movement #{} \"{}\"? (y/n)",
                    id, description
                )));
                self.pending_delete = Some(id);
            }
            None => {
                self.notice = Some(Notice::Warning("Select a movement to delete".to_string()));
            }
        }
    }

    pub fn confirm_delete(&mut self) {
        let Some(id) = self.pending_delete.take() else {
            return;
        };

        match self.store.delete(id) {
            Ok(true) => self.notice = Some(Notice::Info(format!("Movement #{} deleted", id))),
            Ok(false) => {
                self.notice = Some(Notice::Warning(format!("Movement #{} no longer exists", id)))
            }
            Err(err) => {
                error!(error = %err, id, "delete failed");
                self.notice = Some(Notice::Error(format!("Could not delete: {}", err)));
                return;
            }
        }
        self.refresh_or_report();
    }

    pub fn cancel_delete(&mut self) {
        if self.pending_delete.take().is_some() {
            self.notice = None;
        }
    }

    // ========================================================================
    // NAVIGATION
    // ========================================================================

    pub fn next(&mut self) {
        let len = self.movements.len();
        if len == 0 {
            return;
        }
        let i = match self.state.selected() {
            Some(i) if i < len - 1 => i + 1,
            _ => 0,
        };
        self.state.select(Some(i));
    }

    pub fn previous(&mut self) {
        let len = self.movements.len();
        if len == 0 {
            return;
        }
        let i = match self.state.selected() {
            Some(0) | None => len - 1,
            Some(i) => i - 1,
        };
        self.state.select(Some(i));
    }

    pub fn page_down(&mut self) {
        let len = self.movements.len();
        if len == 0 {
            return;
        }
        let i = self.state.selected().map_or(0, |i| (i + 20).min(len - 1));
        self.state.select(Some(i));
    }

    pub fn page_up(&mut self) {
        if self.movements.is_empty() {
            return;
        }
        let i = self.state.selected().map_or(0, |i| i.saturating_sub(20));
        self.state.select(Some(i));
    }

    /// Apply one key press. Returns true when the app should quit.
    pub fn handle_key(&mut self, key: KeyEvent) -> bool {
        if self.pending_delete.is_some() {
            match key.code {
                KeyCode::Char('y') | KeyCode::Char('Y') => self.confirm_delete(),
                _ => self.cancel_delete(),
            }
            return false;
        }

        if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
            return true;
        }

        match key.code {
            KeyCode::Esc => return true,
            KeyCode::Tab => self.focus = self.focus.next(),
            KeyCode::BackTab => self.focus = self.focus.previous(),
            KeyCode::Up => self.previous(),
            KeyCode::Down => self.next(),
            KeyCode::PageDown => self.page_down(),
            KeyCode::PageUp => self.page_up(),
            _ => match self.focus {
                Focus::Kind => match key.code {
                    KeyCode::Left | KeyCode::Right | KeyCode::Char(' ') => self.kind = self.kind.toggle(),
                    KeyCode::Char('i') | KeyCode::Char('I') => self.kind = Kind::Income,
                    KeyCode::Char('e') | KeyCode::Char('E') => self.kind = Kind::Expense,
                    KeyCode::Enter => self.submit(),
                    _ => {}
                },
                Focus::Description | Focus::Amount => match key.code {
                    KeyCode::Enter => self.submit(),
                    KeyCode::Backspace => {
                        if let Some(input) = self.active_input() {
                            input.pop();
                        }
                    }
                    KeyCode::Char(c) => {
                        if let Some(input) = self.active_input() {
                            input.push(c);
                        }
                    }
                    _ => {}
                },
                Focus::Table => match key.code {
                    KeyCode::Char('q') => return true,
                    KeyCode::Char('j') => self.next(),
                    KeyCode::Char('k') => self.previous(),
                    KeyCode::Char('d') | KeyCode::Delete => self.request_delete(),
                    KeyCode::Char('r') => self.refresh_or_report(),
                    KeyCode::Home if !self.movements.is_empty() => self.state.select(Some(0)),
                    KeyCode::End if !self.movements.is_empty() => {
                        self.state.select(Some(self.movements.len() - 1))
                    }
                    _ => {}
                },
            },
        }

        false
    }
}

pub fn run_ui(app: &mut App) -> Result<()> {
    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let res = run_app(&mut terminal, app);

    // Restore terminal
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    res?;
    Ok(())
}

fn run_app<B: ratatui::backend::Backend>(
    terminal: &mut Terminal<B>,
    app: &mut App,
) -> io::Result<()> {
    loop {
        terminal.draw(|f| ui(f, app))?;

        if let Event::Key(key) = event::read()? {
            if key.kind == KeyEventKind::Press && app.handle_key(key) {
                return Ok(());
            }
        }
    }
}

fn ui(f: &mut Frame, app: &mut App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // Header
            Constraint::Length(5), // Entry form
            Constraint::Min(0),    // Movements
            Constraint::Length(3), // Totals
            Constraint::Length(3), // Status bar
        ])
        .split(f.size());

    render_header(f, chunks[0], app);
    render_form(f, chunks[1], app);
    render_table(f, chunks[2], app);
    render_totals(f, chunks[3], app);
    render_status_bar(f, chunks[4], app);
}

fn render_header(f: &mut Frame, area: Rect, app: &App) {
    let header = Paragraph::new(Line::from(vec![
        Span::styled(
            "Income & Expense Ledger",
            Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD),
        ),
        Span::raw("  |  "),
        Span::styled(
            format!("Movements: {}", app.total_count),
            Style::default().fg(Color::White),
        ),
    ]))
    .block(Block::default().borders(Borders::ALL).border_style(Style::default().fg(Color::Cyan)));

    f.render_widget(header, area);
}

fn field_label(label: &str, focused: bool) -> Span<'static> {
    let style = if focused {
        Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD)
    } else {
        Style::default().fg(Color::Cyan)
    };
    Span::styled(format!("  {:<13}", label), style)
}

fn input_value(value: &str, focused: bool) -> Span<'static> {
    let text = if focused { format!("{}_", value) } else { value.to_string() };
    let style = if focused {
        Style::default().add_modifier(Modifier::UNDERLINED)
    } else {
        Style::default()
    };
    Span::styled(text, style)
}

fn render_form(f: &mut Frame, area: Rect, app: &App) {
    let kind_spans: Vec<Span> = [Kind::Income, Kind::Expense]
        .iter()
        .map(|kind| {
            let marker = if *kind == app.kind { "(•) " } else { "( ) " };
            let style = if *kind == app.kind {
                Style::default().fg(kind_color(*kind)).add_modifier(Modifier::BOLD)
            } else {
                Style::default().fg(Color::DarkGray)
            };
            Span::styled(format!("{}{}   ", marker, kind), style)
        })
        .collect();

    let mut kind_line = vec![field_label("Kind:", app.focus == Focus::Kind)];
    kind_line.extend(kind_spans);

    let content = vec![
        Line::from(kind_line),
        Line::from(vec![
            field_label("Description:", app.focus == Focus::Description),
            input_value(&app.description, app.focus == Focus::Description),
        ]),
        Line::from(vec![
            field_label("Amount:", app.focus == Focus::Amount),
            input_value(&app.amount, app.focus == Focus::Amount),
        ]),
    ];

    let form = Paragraph::new(content).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::White))
            .title(" New Movement (Enter to save) "),
    );

    f.render_widget(form, area);
}

fn kind_color(kind: Kind) -> Color {
    match kind {
        Kind::Income => Color::Green,
        Kind::Expense => Color::Red,
    }
}

fn render_table(f: &mut Frame, area: Rect, app: &mut App) {
    let header_cells = ["ID", "Kind", "Description", "Amount", "Date"]
        .iter()
        .map(|h| {
            Cell::from(*h).style(
                Style::default()
                    .fg(Color::Yellow)
                    .add_modifier(Modifier::BOLD),
            )
        });

    let header = Row::new(header_cells)
        .style(Style::default().bg(Color::DarkGray))
        .height(1);

    let rows = app.movements.iter().map(|m| {
        let color = kind_color(m.kind);

        let cells = vec![
            Cell::from(m.id.to_string()),
            Cell::from(m.kind.to_string()).style(Style::default().fg(color)),
            Cell::from(truncate(&m.description, 40)),
            Cell::from(format_money(m.signed_amount())).style(Style::default().fg(color)),
            Cell::from(m.timestamp.clone()),
        ];

        Row::new(cells).height(1)
    });

    let border_color = if app.focus == Focus::Table { Color::Yellow } else { Color::White };

    let table = Table::new(
        rows,
        [
            Constraint::Length(6),
            Constraint::Length(9),
            Constraint::Length(42),
            Constraint::Length(16),
            Constraint::Length(20),
        ],
    )
    .header(header)
    .block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(border_color))
            .title(" Movements "),
    )
    .highlight_style(
        Style::default()
            .bg(Color::DarkGray)
            .add_modifier(Modifier::BOLD),
    )
    .highlight_symbol("→ ");

    f.render_stateful_widget(table, area, &mut app.state);
}

fn render_totals(f: &mut Frame, area: Rect, app: &App) {
    let balance_color = if app.totals.balance < 0.0 { Color::Red } else { Color::White };

    let totals = Paragraph::new(Line::from(vec![
        Span::styled(
            format!("  Income: {}", format_money(app.totals.income)),
            Style::default().fg(Color::Green),
        ),
        Span::raw("     "),
        Span::styled(
            format!("Expenses: {}", format_money(app.totals.expense)),
            Style::default().fg(Color::Red),
        ),
        Span::raw("     "),
        Span::styled(
            format!("Balance: {}", format_money(app.totals.balance)),
            Style::default().fg(balance_color).add_modifier(Modifier::BOLD),
        ),
    ]))
    .block(Block::default().borders(Borders::ALL).title(" Summary "));

    f.render_widget(totals, area);
}

fn render_status_bar(f: &mut Frame, area: Rect, app: &App) {
    let mut status_spans = vec![];

    if let Some(notice) = &app.notice {
        status_spans.push(Span::styled(
            format!(" {} ", notice.text()),
            Style::default().fg(notice.color()).add_modifier(Modifier::BOLD),
        ));
        status_spans.push(Span::raw(" | "));
    }

    status_spans.push(Span::styled("Tab", Style::default().fg(Color::Yellow)));
    status_spans.push(Span::raw(" Field | "));
    status_spans.push(Span::styled("←/→", Style::default().fg(Color::Yellow)));
    status_spans.push(Span::raw(" Kind | "));
    status_spans.push(Span::styled("↑/↓", Style::default().fg(Color::Yellow)));
    status_spans.push(Span::raw(" Select | "));
    status_spans.push(Span::styled("d", Style::default().fg(Color::Yellow)));
    status_spans.push(Span::raw(" Delete (table) | "));
    status_spans.push(Span::styled("Esc", Style::default().fg(Color::Red)));
    status_spans.push(Span::raw(" Quit"));

    let status_bar = Paragraph::new(Line::from(status_spans)).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::White)),
    );

    f.render_widget(status_bar, area);
}

fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let head: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", head)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn test_app() -> (TempDir, App) {
        let dir = TempDir::new().unwrap();
        let store = LedgerStore::open(dir.path().join("ledger.db")).unwrap();
        let app = App::new(store).unwrap();
        (dir, app)
    }

    fn press(app: &mut App, code: KeyCode) -> bool {
        app.handle_key(KeyEvent::new(code, KeyModifiers::NONE))
    }

    fn type_text(app: &mut App, text: &str) {
        for c in text.chars() {
            press(app, KeyCode::Char(c));
        }
    }

    #[test]
    fn test_submit_clears_form_and_refreshes() {
        let (_dir, mut app) = test_app();

        app.description = "Salary".to_string();
        app.amount = "1000".to_string();
        app.submit();

        assert_eq!(app.notice, Some(Notice::Info("Income saved".to_string())));
        assert!(app.description.is_empty());
        assert!(app.amount.is_empty());
        assert_eq!(app.movements.len(), 1);
        assert_eq!(app.total_count, 1);
        assert_eq!(app.totals, Totals::new(1000.0, 0.0));
        assert_eq!(app.state.selected(), Some(0));
    }

    #[test]
    fn test_submit_requires_all_fields() {
        let (_dir, mut app) = test_app();

        app.description = "Rent".to_string();
        app.submit();

        assert_eq!(app.notice, Some(Notice::Warning("All fields are required".to_string())));
        assert_eq!(app.description, "Rent");
        assert!(app.movements.is_empty());
    }

    #[test]
    fn test_non_numeric_amount_keeps_inputs() {
        let (_dir, mut app) = test_app();

        app.description = "Rent".to_string();
        app.amount = "four hundred".to_string();
        app.submit();

        assert_eq!(app.notice, Some(Notice::Error("Amount must be numeric".to_string())));
        assert_eq!(app.description, "Rent");
        assert_eq!(app.amount, "four hundred");
        assert!(app.movements.is_empty());
    }

    #[test]
    fn test_negative_amount_rejected_by_store() {
        let (_dir, mut app) = test_app();

        app.description = "Rent".to_string();
        app.amount = "-400".to_string();
        app.submit();

        assert!(matches!(app.notice, Some(Notice::Warning(_))));
        assert_eq!(app.amount, "-400");
        assert!(app.movements.is_empty());
    }

    #[test]
    fn test_typing_through_keys() {
        let (_dir, mut app) = test_app();

        // Switch kind to Expense
        press(&mut app, KeyCode::BackTab);
        assert_eq!(app.focus, Focus::Kind);
        press(&mut app, KeyCode::Right);
        assert_eq!(app.kind, Kind::Expense);

        press(&mut app, KeyCode::Tab);
        type_text(&mut app, "Rentx");
        press(&mut app, KeyCode::Backspace);
        press(&mut app, KeyCode::Tab);
        type_text(&mut app, "400");
        press(&mut app, KeyCode::Enter);

        assert_eq!(app.movements.len(), 1);
        assert_eq!(app.movements[0].description, "Rent");
        assert_eq!(app.movements[0].kind, Kind::Expense);
        assert_eq!(app.totals.balance, -400.0);
    }

    #[test]
    fn test_delete_requires_selection() {
        let (_dir, mut app) = test_app();

        app.request_delete();

        assert_eq!(app.notice, Some(Notice::Warning("Select a movement to delete".to_string())));
        assert_eq!(app.pending_delete, None);
    }

    #[test]
    fn test_delete_with_confirmation() {
        let (_dir, mut app) = test_app();
        app.description = "Salary".to_string();
        app.amount = "1000".to_string();
        app.submit();
        app.description = "Rent".to_string();
        app.amount = "400".to_string();
        app.kind = Kind::Expense;
        app.submit();

        app.focus = Focus::Table;
        press(&mut app, KeyCode::Home);
        press(&mut app, KeyCode::Char('d'));
        assert_eq!(app.pending_delete, Some(1));

        // Anything but 'y' cancels
        press(&mut app, KeyCode::Char('n'));
        assert_eq!(app.pending_delete, None);
        assert_eq!(app.movements.len(), 2);

        press(&mut app, KeyCode::Char('d'));
        press(&mut app, KeyCode::Char('y'));

        assert_eq!(app.notice, Some(Notice::Info("Movement #1 deleted".to_string())));
        assert_eq!(app.movements.len(), 1);
        assert_eq!(app.movements[0].id, 2);
        assert_eq!(app.totals, Totals::new(0.0, 400.0));
        assert_eq!(app.state.selected(), Some(0));
    }

    #[test]
    fn test_navigation_wraps() {
        let (_dir, mut app) = test_app();
        for (desc, amount) in [("a", "1"), ("b", "2"), ("c", "3")] {
            app.description = desc.to_string();
            app.amount = amount.to_string();
            app.submit();
        }

        app.state.select(Some(2));
        app.next();
        assert_eq!(app.state.selected(), Some(0));
        app.previous();
        assert_eq!(app.state.selected(), Some(2));
        app.page_up();
        assert_eq!(app.state.selected(), Some(0));
        app.page_down();
        assert_eq!(app.state.selected(), Some(2));
    }

    #[test]
    fn test_quit_keys() {
        let (_dir, mut app) = test_app();

        // 'q' is text while typing a description
        assert!(!press(&mut app, KeyCode::Char('q')));
        assert_eq!(app.description, "q");

        assert!(press(&mut app, KeyCode::Esc));
        assert!(app.handle_key(KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL)));
    }

    #[test]
    fn test_truncate_multibyte() {
        assert_eq!(truncate("Renta", 10), "Renta");
        assert_eq!(truncate("Café con leche y pan", 10), "Café co...");
    }
}
