use anyhow::Result;
use chrono::Utc;
use crossterm::{
    event::{self, Event, KeyCode, KeyEvent, KeyEventKind},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::{Backend, CrosstermBackend},
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    symbols,
    text::{Line, Span},
    widgets::{
        Axis, Block, Borders, Cell, Chart, Clear, Dataset, GraphType, Paragraph, Row, Table,
        TableState, Wrap,
    },
    Frame, Terminal,
};
use std::io;
use std::time::Duration;
use tracing::warn;

use finance_tracker::history::{Granularity, SeriesPoint, Slice};
use finance_tracker::screens::balance_sheet::BalanceSheetViewModel;
use finance_tracker::screens::budget::BudgetViewModel;
use finance_tracker::screens::{
    Dialog, DashboardViewModel, HistorySubject, ItemHistoryViewModel, SettingsViewModel,
};
use finance_tracker::{BalanceSheetType, BudgetType, Settings, Store, ThemeMode};

/// How long to wait for a key before polling the view models again
const TICK: Duration = Duration::from_millis(250);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Page {
    Dashboard,
    Assets,
    Liabilities,
    Income,
    Expenses,
    Settings,
}

impl Page {
    const ALL: [Page; 6] = [
        Page::Dashboard,
        Page::Assets,
        Page::Liabilities,
        Page::Income,
        Page::Expenses,
        Page::Settings,
    ];

    fn index(&self) -> usize {
        Page::ALL.iter().position(|p| p == self).unwrap_or(0)
    }

    pub fn next(&self) -> Self {
        Page::ALL[(self.index() + 1) % Page::ALL.len()]
    }

    pub fn previous(&self) -> Self {
        Page::ALL[(self.index() + Page::ALL.len() - 1) % Page::ALL.len()]
    }

    pub fn title(&self) -> &str {
        match self {
            Page::Dashboard => "Dashboard",
            Page::Assets => "Assets",
            Page::Liabilities => "Liabilities",
            Page::Income => "Income",
            Page::Expenses => "Expenses",
            Page::Settings => "Settings",
        }
    }
}

// ============================================================================
// LIST SCREENS
// ============================================================================

/// Key handling shared by the four item list screens
trait ListScreen {
    fn dialog(&self) -> &Dialog;
    fn dialog_mut(&mut self) -> &mut Dialog;
    fn select_next(&mut self);
    fn select_previous(&mut self);
    fn open_add(&mut self);
    fn open_edit(&mut self);
    fn open_add_value(&mut self);
    fn open_delete(&mut self);
    fn close_dialog(&mut self);
    fn submit_dialog(&mut self, store: &Store) -> Result<()>;
    fn history_subject(&self) -> Option<HistorySubject>;
}

impl ListScreen for BalanceSheetViewModel {
    fn dialog(&self) -> &Dialog {
        &self.dialog
    }
    fn dialog_mut(&mut self) -> &mut Dialog {
        &mut self.dialog
    }
    fn select_next(&mut self) {
        BalanceSheetViewModel::select_next(self)
    }
    fn select_previous(&mut self) {
        BalanceSheetViewModel::select_previous(self)
    }
    fn open_add(&mut self) {
        BalanceSheetViewModel::open_add(self)
    }
    fn open_edit(&mut self) {
        BalanceSheetViewModel::open_edit(self)
    }
    fn open_add_value(&mut self) {
        BalanceSheetViewModel::open_add_value(self)
    }
    fn open_delete(&mut self) {
        BalanceSheetViewModel::open_delete(self)
    }
    fn close_dialog(&mut self) {
        BalanceSheetViewModel::close_dialog(self)
    }
    fn submit_dialog(&mut self, store: &Store) -> Result<()> {
        BalanceSheetViewModel::submit_dialog(self, store, Utc::now())
    }
    fn history_subject(&self) -> Option<HistorySubject> {
        self.selected().map(|s| HistorySubject::BalanceSheet(s.item.id))
    }
}

impl ListScreen for BudgetViewModel {
    fn dialog(&self) -> &Dialog {
        &self.dialog
    }
    fn dialog_mut(&mut self) -> &mut Dialog {
        &mut self.dialog
    }
    fn select_next(&mut self) {
        BudgetViewModel::select_next(self)
    }
    fn select_previous(&mut self) {
        BudgetViewModel::select_previous(self)
    }
    fn open_add(&mut self) {
        BudgetViewModel::open_add(self)
    }
    fn open_edit(&mut self) {
        BudgetViewModel::open_edit(self)
    }
    fn open_add_value(&mut self) {
        BudgetViewModel::open_add_value(self)
    }
    fn open_delete(&mut self) {
        BudgetViewModel::open_delete(self)
    }
    fn close_dialog(&mut self) {
        BudgetViewModel::close_dialog(self)
    }
    fn submit_dialog(&mut self, store: &Store) -> Result<()> {
        BudgetViewModel::submit_dialog(self, store, Utc::now())
    }
    fn history_subject(&self) -> Option<HistorySubject> {
        self.selected().map(|s| HistorySubject::Budget(s.item.id))
    }
}

/// Returns the item to open a history view for, if Enter asked for one
fn handle_list_key<S: ListScreen>(
    screen: &mut S,
    store: &Store,
    key: KeyEvent,
) -> Result<Option<HistorySubject>> {
    if matches!(screen.dialog(), Dialog::ConfirmDelete { .. }) {
        match key.code {
            KeyCode::Char('y') | KeyCode::Enter => screen.submit_dialog(store)?,
            KeyCode::Char('n') | KeyCode::Esc => screen.close_dialog(),
            _ => {}
        }
        return Ok(None);
    }

    if screen.dialog().is_open() {
        match key.code {
            KeyCode::Esc => screen.close_dialog(),
            KeyCode::Enter => screen.submit_dialog(store)?,
            KeyCode::Tab | KeyCode::Down => screen.dialog_mut().next_field(),
            KeyCode::BackTab | KeyCode::Up => screen.dialog_mut().previous_field(),
            KeyCode::Backspace => screen.dialog_mut().pop_char(),
            KeyCode::Char(c) => screen.dialog_mut().push_char(c),
            _ => {}
        }
        return Ok(None);
    }

    match key.code {
        KeyCode::Down | KeyCode::Char('j') => screen.select_next(),
        KeyCode::Up | KeyCode::Char('k') => screen.select_previous(),
        KeyCode::Char('a') => screen.open_add(),
        KeyCode::Char('e') => screen.open_edit(),
        KeyCode::Char('v') => screen.open_add_value(),
        KeyCode::Char('d') => screen.open_delete(),
        KeyCode::Enter => return Ok(screen.history_subject()),
        _ => {}
    }
    Ok(None)
}

// ============================================================================
// APP
// ============================================================================

pub struct App {
    pub page: Page,
    pub dashboard: DashboardViewModel,
    pub assets: BalanceSheetViewModel,
    pub liabilities: BalanceSheetViewModel,
    pub income: BudgetViewModel,
    pub expenses: BudgetViewModel,
    pub settings: SettingsViewModel,
    /// Drill-down into one item, shown over the current page
    pub history: Option<ItemHistoryViewModel>,
    /// Last error, shown in the status bar
    pub status: Option<String>,
}

impl App {
    pub fn new(store: &Store) -> Result<Self> {
        Ok(Self {
            page: Page::Dashboard,
            dashboard: DashboardViewModel::new(store)?,
            assets: BalanceSheetViewModel::new(store, BalanceSheetType::Asset)?,
            liabilities: BalanceSheetViewModel::new(store, BalanceSheetType::Liability)?,
            income: BudgetViewModel::new(store, BudgetType::Income)?,
            expenses: BudgetViewModel::new(store, BudgetType::Expense)?,
            settings: SettingsViewModel::new(store),
            history: None,
            status: None,
        })
    }

    /// Let every screen pick up writes made since the last tick
    pub fn poll(&mut self, store: &Store) -> Result<()> {
        self.dashboard.poll(store)?;
        self.assets.poll(store)?;
        self.liabilities.poll(store)?;
        self.income.poll(store)?;
        self.expenses.poll(store)?;
        self.settings.poll(store);
        if let Some(history) = self.history.as_mut() {
            history.poll(store)?;
        }
        Ok(())
    }

    fn report(&mut self, err: anyhow::Error) {
        warn!(error = %err, "action failed");
        self.status = Some(format!("{:#}", err));
    }

    fn dialog_open(&self) -> bool {
        match self.page {
            Page::Assets => self.assets.dialog.is_open(),
            Page::Liabilities => self.liabilities.dialog.is_open(),
            Page::Income => self.income.dialog.is_open(),
            Page::Expenses => self.expenses.dialog.is_open(),
            Page::Dashboard | Page::Settings => false,
        }
    }

    /// Returns false when the app should exit
    pub fn handle_key(&mut self, store: &Store, key: KeyEvent) -> Result<bool> {
        if key.kind != KeyEventKind::Press {
            return Ok(true);
        }
        self.status = None;

        if let Some(history) = self.history.as_mut() {
            if handle_history_key(history, store, key)? {
                self.history = None;
            }
            return Ok(true);
        }

        if !self.dialog_open() {
            match key.code {
                KeyCode::Char('q') | KeyCode::Esc => return Ok(false),
                KeyCode::Tab => {
                    self.page = self.page.next();
                    return Ok(true);
                }
                KeyCode::BackTab => {
                    self.page = self.page.previous();
                    return Ok(true);
                }
                _ => {}
            }
        }

        let open = match self.page {
            Page::Dashboard => {
                if key.code == KeyCode::Char('g') {
                    self.dashboard.toggle_granularity(store)?;
                }
                None
            }
            Page::Assets => handle_list_key(&mut self.assets, store, key)?,
            Page::Liabilities => handle_list_key(&mut self.liabilities, store, key)?,
            Page::Income => handle_list_key(&mut self.income, store, key)?,
            Page::Expenses => handle_list_key(&mut self.expenses, store, key)?,
            Page::Settings => {
                match key.code {
                    KeyCode::Char('d') => {
                        self.settings.toggle_dynamic_color(store)?;
                    }
                    KeyCode::Char('t') => {
                        self.settings.cycle_theme_mode(store)?;
                    }
                    KeyCode::Char('1') => {
                        self.settings.set_theme_mode(store, ThemeMode::System)?;
                    }
                    KeyCode::Char('2') => {
                        self.settings.set_theme_mode(store, ThemeMode::Light)?;
                    }
                    KeyCode::Char('3') => {
                        self.settings.set_theme_mode(store, ThemeMode::Dark)?;
                    }
                    _ => {}
                }
                None
            }
        };

        if let Some(subject) = open {
            self.history = Some(ItemHistoryViewModel::new(store, subject)?);
        }
        Ok(true)
    }
}

/// Returns true when the history view should close
fn handle_history_key(
    history: &mut ItemHistoryViewModel,
    store: &Store,
    key: KeyEvent,
) -> Result<bool> {
    if history.value_form.is_some() {
        match key.code {
            KeyCode::Esc => history.close_value_form(),
            KeyCode::Enter => history.submit_value_form(store, Utc::now())?,
            KeyCode::Backspace => history.value_form.iter_mut().for_each(|f| f.pop_char()),
            KeyCode::Char(c) => history.value_form.iter_mut().for_each(|f| f.push_char(c)),
            _ => {}
        }
        return Ok(false);
    }

    match key.code {
        KeyCode::Esc | KeyCode::Char('q') => return Ok(true),
        KeyCode::Down | KeyCode::Char('j') => history.select_next(),
        KeyCode::Up | KeyCode::Char('k') => history.select_previous(),
        KeyCode::Char('v') => history.open_value_form(),
        KeyCode::Char('d') => {
            history.delete_selected_value(store)?;
        }
        KeyCode::Char('g') => history.toggle_granularity(store)?,
        _ => {}
    }
    Ok(false)
}

pub fn run_ui(app: &mut App, store: &Store) -> Result<()> {
    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    // Run the app
    let res = run_app(&mut terminal, app, store);

    // Restore terminal
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    res
}

fn run_app<B: Backend>(terminal: &mut Terminal<B>, app: &mut App, store: &Store) -> Result<()> {
    loop {
        if let Err(err) = app.poll(store) {
            app.report(err);
        }

        terminal.draw(|f| ui(f, app))?;

        if !event::poll(TICK)? {
            continue;
        }
        if let Event::Key(key) = event::read()? {
            match app.handle_key(store, key) {
                Ok(true) => {}
                Ok(false) => return Ok(()),
                Err(err) => app.report(err),
            }
        }
    }
}

// ============================================================================
// PALETTE
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq)]
struct Palette {
    text: Color,
    background: Color,
    accent: Color,
    muted: Color,
    positive: Color,
    negative: Color,
    highlight: Color,
}

/// Dynamic color follows the terminal's own ANSI palette; otherwise a fixed
/// RGB palette is used. The theme mode picks the base colors.
fn palette(settings: &Settings) -> Palette {
    let (text, background, highlight) = match settings.theme_mode {
        ThemeMode::System => (Color::Reset, Color::Reset, Color::DarkGray),
        ThemeMode::Light => (Color::Black, Color::White, Color::Gray),
        ThemeMode::Dark => (Color::White, Color::Black, Color::DarkGray),
    };

    if settings.dynamic_color {
        Palette {
            text,
            background,
            accent: Color::Cyan,
            muted: Color::DarkGray,
            positive: Color::Green,
            negative: Color::Red,
            highlight,
        }
    } else {
        Palette {
            text,
            background,
            accent: Color::Rgb(0x3d, 0x7e, 0xc4),
            muted: Color::Rgb(0x80, 0x80, 0x80),
            positive: Color::Rgb(0x2e, 0x9e, 0x5b),
            negative: Color::Rgb(0xd6, 0x45, 0x45),
            highlight,
        }
    }
}

// ============================================================================
// RENDERING
// ============================================================================

fn ui(f: &mut Frame, app: &mut App) {
    let p = palette(&app.settings.settings);

    f.render_widget(
        Block::default().style(Style::default().fg(p.text).bg(p.background)),
        f.size(),
    );

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // Header with navigation
            Constraint::Min(0),    // Content area
            Constraint::Length(3), // Status bar
        ])
        .split(f.size());

    render_header(f, chunks[0], app, &p);

    if let Some(history) = app.history.as_ref() {
        render_history(f, chunks[1], history, &p);
    } else {
        match app.page {
            Page::Dashboard => render_dashboard(f, chunks[1], &app.dashboard, &p),
            Page::Assets => render_balance_sheet(f, chunks[1], &app.assets, p.positive, &p),
            Page::Liabilities => {
                render_balance_sheet(f, chunks[1], &app.liabilities, p.negative, &p)
            }
            Page::Income => render_budget(f, chunks[1], &app.income, p.positive, &p),
            Page::Expenses => render_budget(f, chunks[1], &app.expenses, p.negative, &p),
            Page::Settings => render_settings(f, chunks[1], &app.settings, &p),
        }
    }

    render_status_bar(f, chunks[2], app, &p);

    // Popups go last so they draw over the page
    if let Some(history) = app.history.as_ref() {
        if let Some(form) = history.value_form.as_ref() {
            render_value_popup(f, &form.amount, history.form_error.as_deref(), &p);
        }
    } else {
        let (dialog, error) = match app.page {
            Page::Assets => (&app.assets.dialog, app.assets.form_error.as_deref()),
            Page::Liabilities => (&app.liabilities.dialog, app.liabilities.form_error.as_deref()),
            Page::Income => (&app.income.dialog, app.income.form_error.as_deref()),
            Page::Expenses => (&app.expenses.dialog, app.expenses.form_error.as_deref()),
            Page::Dashboard | Page::Settings => return,
        };
        render_dialog(f, dialog, error, &p);
    }
}

fn render_header(f: &mut Frame, area: Rect, app: &App, p: &Palette) {
    let mut tab_spans = vec![];
    for (i, page) in Page::ALL.iter().enumerate() {
        if i > 0 {
            tab_spans.push(Span::raw(" │ "));
        }
        let style = if *page == app.page {
            Style::default()
                .fg(p.accent)
                .add_modifier(Modifier::BOLD | Modifier::UNDERLINED)
        } else {
            Style::default().fg(p.muted)
        };
        tab_spans.push(Span::styled(page.title(), style));
    }

    let net_worth = app.dashboard.state.net_worth;
    tab_spans.push(Span::raw("  |  "));
    tab_spans.push(Span::styled(
        format!("Net worth {}", money(net_worth)),
        Style::default().fg(if net_worth < 0.0 { p.negative } else { p.positive }),
    ));

    let header = Paragraph::new(vec![Line::from(tab_spans)])
        .block(Block::default().borders(Borders::ALL).border_style(Style::default().fg(p.accent)));

    f.render_widget(header, area);
}

fn render_status_bar(f: &mut Frame, area: Rect, app: &App, p: &Palette) {
    let key = |k: &'static str| Span::styled(k, Style::default().fg(p.accent));

    let mut spans = vec![];
    if let Some(status) = &app.status {
        spans.push(Span::styled(format!(" {} ", status), Style::default().fg(p.negative)));
        spans.push(Span::raw("| "));
    }

    if app.history.is_some() {
        spans.extend([
            key("v"),
            Span::raw(" Record | "),
            key("d"),
            Span::raw(" Delete value | "),
            key("g"),
            Span::raw(" Day/Month | "),
            key("Esc"),
            Span::raw(" Back"),
        ]);
    } else {
        match app.page {
            Page::Dashboard => spans.extend([key("g"), Span::raw(" Day/Month | ")]),
            Page::Settings => spans.extend([
                key("d"),
                Span::raw(" Dynamic color | "),
                key("t"),
                Span::raw(" Theme | "),
            ]),
            _ => spans.extend([
                key("a"),
                Span::raw(" Add | "),
                key("e"),
                Span::raw(" Edit | "),
                key("v"),
                Span::raw(" Value | "),
                key("d"),
                Span::raw(" Delete | "),
                key("Enter"),
                Span::raw(" History | "),
            ]),
        }
        spans.extend([
            key("Tab"),
            Span::raw(" Page | "),
            Span::styled("q", Style::default().fg(p.negative)),
            Span::raw(" Quit"),
        ]);
    }

    let status_bar = Paragraph::new(vec![Line::from(spans)])
        .block(Block::default().borders(Borders::ALL).border_style(Style::default().fg(p.muted)));

    f.render_widget(status_bar, area);
}

fn render_dashboard(f: &mut Frame, area: Rect, vm: &DashboardViewModel, p: &Palette) {
    let s = &vm.state;
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(7),
            Constraint::Length(8),
            Constraint::Min(6),
        ])
        .split(area);

    let top = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage(30),
            Constraint::Percentage(30),
            Constraint::Percentage(40),
        ])
        .split(rows[0]);

    let balance = vec![
        amount_line("Assets", s.assets_total, p.positive),
        amount_line("Liabilities", s.liabilities_total, p.negative),
        amount_line(
            "Net worth",
            s.net_worth,
            if s.net_worth < 0.0 { p.negative } else { p.positive },
        ),
    ];
    f.render_widget(
        Paragraph::new(balance).block(titled(" Balance sheet ", p)),
        top[0],
    );

    let budget = vec![
        amount_line("Income", s.budget.income, p.positive),
        amount_line("Expense", s.budget.expense, p.negative),
        amount_line("Net", s.budget.net, p.text),
        Line::from(vec![
            Span::styled(format!("{:<12}", "DTI"), Style::default().fg(p.muted)),
            Span::raw(format!("{:>13.1}%", s.budget.dti)),
        ]),
    ];
    f.render_widget(Paragraph::new(budget).block(titled(" Budget ", p)), top[1]);

    let upcoming: Vec<Line> = if s.upcoming.is_empty() {
        vec![Line::from(Span::styled("Nothing due", Style::default().fg(p.muted)))]
    } else {
        s.upcoming
            .iter()
            .map(|u| {
                let due = u
                    .item
                    .due_date
                    .map(|d| d.format("%Y-%m-%d").to_string())
                    .unwrap_or_default();
                Line::from(vec![
                    Span::styled(due, Style::default().fg(p.accent)),
                    Span::raw(format!("  {:<20} {:>10}", truncate(&u.item.name, 20), money(u.current_value()))),
                ])
            })
            .collect()
    };
    f.render_widget(Paragraph::new(upcoming).block(titled(" Coming up ", p)), top[2]);

    let middle = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
        .split(rows[1]);
    render_slices(f, middle[0], " Assets by category ", &s.asset_slices, p.positive, p);
    render_slices(f, middle[1], " Liabilities by category ", &s.liability_slices, p.negative, p);

    render_series_chart(
        f,
        rows[2],
        " Net worth history ",
        &s.net_worth_history,
        vm.granularity,
        p,
    );
}

/// Proportion bars standing in for a donut chart
fn render_slices(f: &mut Frame, area: Rect, title: &str, slices: &[Slice], color: Color, p: &Palette) {
    let bar_room = (area.width as usize).saturating_sub(32);

    let lines: Vec<Line> = if slices.is_empty() {
        vec![Line::from(Span::styled("No values yet", Style::default().fg(p.muted)))]
    } else {
        slices
            .iter()
            .map(|slice| {
                let width = (bar_room as f64 * slice.fraction).round() as usize;
                Line::from(vec![
                    Span::raw(format!("{:<16} ", truncate(&slice.label, 16))),
                    Span::styled("█".repeat(width), Style::default().fg(color)),
                    Span::raw(format!(" {:>5.1}%", slice.fraction * 100.0)),
                ])
            })
            .collect()
    };

    f.render_widget(Paragraph::new(lines).block(titled(title, p)), area);
}

fn render_series_chart(
    f: &mut Frame,
    area: Rect,
    title: &str,
    series: &[SeriesPoint],
    granularity: Granularity,
    p: &Palette,
) {
    let title = format!("{}({}) ", title, match granularity {
        Granularity::Day => "daily",
        Granularity::Month => "monthly",
    });

    let (first, last) = match (series.first(), series.last()) {
        (Some(first), Some(last)) => (first, last),
        _ => {
            let empty = Paragraph::new(Span::styled("No snapshots yet", Style::default().fg(p.muted)))
                .block(titled(&title, p));
            f.render_widget(empty, area);
            return;
        }
    };

    let points: Vec<(f64, f64)> = series
        .iter()
        .enumerate()
        .map(|(i, point)| (i as f64, point.value))
        .collect();

    let low = series.iter().map(|pt| pt.value).fold(0.0_f64, f64::min);
    let high = series.iter().map(|pt| pt.value).fold(0.0_f64, f64::max);
    let high = if high <= low { low + 1.0 } else { high };
    let x_max = (points.len().saturating_sub(1)).max(1) as f64;

    let datasets = vec![Dataset::default()
        .marker(symbols::Marker::Braille)
        .graph_type(GraphType::Line)
        .style(Style::default().fg(p.accent))
        .data(&points)];

    let chart = Chart::new(datasets)
        .block(titled(&title, p))
        .x_axis(
            Axis::default()
                .style(Style::default().fg(p.muted))
                .bounds([0.0, x_max])
                .labels(vec![
                    Span::raw(granularity.label(first.bucket)),
                    Span::raw(granularity.label(last.bucket)),
                ]),
        )
        .y_axis(
            Axis::default()
                .style(Style::default().fg(p.muted))
                .bounds([low, high])
                .labels(vec![Span::raw(money(low)), Span::raw(money(high))]),
        );

    f.render_widget(chart, area);
}

fn render_balance_sheet(
    f: &mut Frame,
    area: Rect,
    vm: &BalanceSheetViewModel,
    color: Color,
    p: &Palette,
) {
    let rows = vm.state.items.iter().map(|row| {
        let updated = row
            .latest_value
            .as_ref()
            .map(|v| v.timestamp.format("%Y-%m-%d").to_string())
            .unwrap_or_else(|| "-".to_string());
        Row::new(vec![
            Cell::from(truncate(&row.item.name, 30)),
            Cell::from(truncate(&row.item.category, 20)),
            Cell::from(money(row.current_value())).style(Style::default().fg(color)),
            Cell::from(updated),
        ])
    });

    let title = format!(" {} · total {} ", vm.item_type.label(), money(vm.state.total));
    render_item_table(
        f,
        area,
        rows,
        ["Name", "Category", "Value", "Updated"],
        &title,
        vm.selection.index,
        p,
    );
}

fn render_budget(f: &mut Frame, area: Rect, vm: &BudgetViewModel, color: Color, p: &Palette) {
    let rows = vm.state.items.iter().map(|row| {
        let due = row
            .item
            .due_date
            .map(|d| d.format("%Y-%m-%d").to_string())
            .unwrap_or_else(|| "-".to_string());
        Row::new(vec![
            Cell::from(truncate(&row.item.name, 30)),
            Cell::from(truncate(&row.item.category, 20)),
            Cell::from(money(row.current_value())).style(Style::default().fg(color)),
            Cell::from(due),
        ])
    });

    let summary = &vm.state.summary;
    let title = format!(
        " {} · total {} · DTI {:.1}% ",
        vm.item_type.label(),
        money(vm.state.total),
        summary.dti
    );
    render_item_table(
        f,
        area,
        rows,
        ["Name", "Category", "Amount", "Due"],
        &title,
        vm.selection.index,
        p,
    );
}

fn render_item_table<'a>(
    f: &mut Frame,
    area: Rect,
    rows: impl Iterator<Item = Row<'a>>,
    headers: [&'a str; 4],
    title: &str,
    selected: Option<usize>,
    p: &Palette,
) {
    let header_cells = headers
        .iter()
        .map(|h| Cell::from(*h).style(Style::default().fg(p.accent).add_modifier(Modifier::BOLD)));
    let header = Row::new(header_cells)
        .style(Style::default().bg(p.highlight))
        .height(1);

    let table = Table::new(
        rows,
        [
            Constraint::Length(32),
            Constraint::Length(22),
            Constraint::Length(16),
            Constraint::Length(12),
        ],
    )
    .header(header)
    .block(titled(title, p))
    .highlight_style(Style::default().bg(p.highlight).add_modifier(Modifier::BOLD))
    .highlight_symbol("→ ");

    let mut state = TableState::default();
    state.select(selected);
    f.render_stateful_widget(table, area, &mut state);
}

fn render_history(f: &mut Frame, area: Rect, vm: &ItemHistoryViewModel, p: &Palette) {
    if vm.state.missing {
        let gone = Paragraph::new("This item no longer exists. Press Esc to go back.")
            .style(Style::default().fg(p.muted))
            .block(titled(" History ", p));
        f.render_widget(gone, area);
        return;
    }

    let chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(40), Constraint::Percentage(60)])
        .split(area);

    let rows = vm.state.values.iter().map(|v| {
        Row::new(vec![
            Cell::from(v.timestamp.format("%Y-%m-%d %H:%M").to_string()),
            Cell::from(money(v.value)),
        ])
    });
    let header = Row::new(vec![
        Cell::from("Recorded").style(Style::default().fg(p.accent).add_modifier(Modifier::BOLD)),
        Cell::from("Value").style(Style::default().fg(p.accent).add_modifier(Modifier::BOLD)),
    ])
    .style(Style::default().bg(p.highlight));

    let table = Table::new(rows, [Constraint::Length(18), Constraint::Length(16)])
        .header(header)
        .block(titled(&format!(" {} ", vm.state.name), p))
        .highlight_style(Style::default().bg(p.highlight).add_modifier(Modifier::BOLD))
        .highlight_symbol("→ ");

    let mut state = TableState::default();
    state.select(vm.selection.index);
    f.render_stateful_widget(table, chunks[0], &mut state);

    let chart_title = match vm.subject {
        HistorySubject::BalanceSheet(_) => " Value ",
        HistorySubject::Budget(_) => " Total per period ",
    };
    render_series_chart(f, chunks[1], chart_title, &vm.state.series, vm.granularity, p);
}

fn render_settings(f: &mut Frame, area: Rect, vm: &SettingsViewModel, p: &Palette) {
    let on_off = |on: bool| if on { "on" } else { "off" };
    let theme = |mode: ThemeMode| {
        let marker = if vm.settings.theme_mode == mode { "●" } else { "○" };
        format!("{} {}", marker, mode.label())
    };

    let lines = vec![
        Line::from(""),
        Line::from(vec![
            Span::styled("  d ", Style::default().fg(p.accent)),
            Span::raw(format!("Dynamic color: {}", on_off(vm.settings.dynamic_color))),
        ]),
        Line::from(""),
        Line::from(vec![
            Span::styled("  t ", Style::default().fg(p.accent)),
            Span::raw("Theme:"),
        ]),
        Line::from(format!("      1 {}", theme(ThemeMode::System))),
        Line::from(format!("      2 {}", theme(ThemeMode::Light))),
        Line::from(format!("      3 {}", theme(ThemeMode::Dark))),
    ];

    f.render_widget(Paragraph::new(lines).block(titled(" Settings ", p)), area);
}

fn render_dialog(f: &mut Frame, dialog: &Dialog, error: Option<&str>, p: &Palette) {
    let (title, mut lines) = match dialog {
        Dialog::None => return,
        Dialog::AddItem(form) | Dialog::EditItem { form, .. } => {
            let title = if matches!(dialog, Dialog::AddItem(_)) { " Add item " } else { " Edit item " };
            let focused = form.focused();
            let lines: Vec<Line> = form
                .fields()
                .into_iter()
                .map(|field| {
                    let active = field == focused;
                    let style = if active {
                        Style::default().fg(p.accent).add_modifier(Modifier::BOLD)
                    } else {
                        Style::default().fg(p.muted)
                    };
                    Line::from(vec![
                        Span::styled(format!("{:<10}", field.label()), style),
                        Span::raw(form.value(field).to_string()),
                        Span::styled(if active { "▏" } else { "" }, style),
                    ])
                })
                .collect();
            (title, lines)
        }
        Dialog::AddValue { form, .. } => (
            " Record value ",
            vec![Line::from(vec![
                Span::styled("Amount    ", Style::default().fg(p.accent)),
                Span::raw(form.amount.clone()),
                Span::styled("▏", Style::default().fg(p.accent)),
            ])],
        ),
        Dialog::ConfirmDelete { name, .. } => (
            " Delete ",
            vec![
                Line::from(format!("Delete '{}' and all of its values?", name)),
                Line::from(""),
                Line::from(vec![
                    Span::styled("y", Style::default().fg(p.negative)),
                    Span::raw(" delete   "),
                    Span::styled("n", Style::default().fg(p.accent)),
                    Span::raw(" cancel"),
                ]),
            ],
        ),
    };

    if !matches!(dialog, Dialog::ConfirmDelete { .. }) {
        lines.push(Line::from(""));
        if let Some(error) = error {
            lines.push(Line::from(Span::styled(error.to_string(), Style::default().fg(p.negative))));
        }
        lines.push(Line::from(Span::styled(
            "Enter save · Tab next field · Esc cancel",
            Style::default().fg(p.muted),
        )));
    }

    render_popup(f, title, lines, p);
}

fn render_value_popup(f: &mut Frame, amount: &str, error: Option<&str>, p: &Palette) {
    let mut lines = vec![Line::from(vec![
        Span::styled("Amount    ", Style::default().fg(p.accent)),
        Span::raw(amount.to_string()),
        Span::styled("▏", Style::default().fg(p.accent)),
    ])];
    lines.push(Line::from(""));
    if let Some(error) = error {
        lines.push(Line::from(Span::styled(error.to_string(), Style::default().fg(p.negative))));
    }
    lines.push(Line::from(Span::styled("Enter save · Esc cancel", Style::default().fg(p.muted))));

    render_popup(f, " Record value ", lines, p);
}

fn render_popup(f: &mut Frame, title: &str, lines: Vec<Line>, p: &Palette) {
    let area = centered_rect(60, 40, f.size());
    f.render_widget(Clear, area);
    let popup = Paragraph::new(lines)
        .wrap(Wrap { trim: false })
        .style(Style::default().fg(p.text).bg(p.background))
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(p.accent))
                .title(title.to_string()),
        );
    f.render_widget(popup, area);
}

// ============================================================================
// HELPERS
// ============================================================================

fn titled<'a>(title: &str, p: &Palette) -> Block<'a> {
    Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(p.muted))
        .title(title.to_string())
}

fn amount_line(label: &str, value: f64, color: Color) -> Line<'static> {
    Line::from(vec![
        Span::raw(format!("{:<12}", label)),
        Span::styled(format!("{:>14}", money(value)), Style::default().fg(color)),
    ])
}

fn money(value: f64) -> String {
    format!("{:.2}", value)
}

fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let head: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", head)
    }
}

fn centered_rect(percent_x: u16, percent_y: u16, r: Rect) -> Rect {
    let vertical = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(r);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(vertical[1])[1]
}
