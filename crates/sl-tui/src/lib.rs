use anyhow::Result;
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::execute;
use crossterm::terminal::{
    disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Clear, List, ListItem, ListState, Paragraph, Wrap};
use ratatui::{Frame, Terminal};
use std::io::{self, Stdout};
use std::sync::mpsc::{self, Receiver, Sender};
use std::time::{Duration, Instant};

use chrono::Utc;
use uuid::Uuid;

use sl_ai::Advisor;
use sl_core::{
    expiry_badge, filter_items, stock_stats, ExpiryBadge, FormSession, Inventory, Item,
    LOW_STOCK_THRESHOLD,
};
use sl_fs::{resolve_store_path, FsStore};
use sl_utils::{short_id, truncate_text};

const TICK_RATE: Duration = Duration::from_millis(200);

#[derive(Debug, Clone, PartialEq, Eq)]
enum InputMode {
    None,
    Search,
    Form,
    ConfirmDelete,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FormStep {
    Barcode,
    Name,
    Expiration,
    Category,
    Quantity,
    Location,
}

impl FormStep {
    fn label(self) -> &'static str {
        match self {
            FormStep::Barcode => "Barcode",
            FormStep::Name => "Product Name",
            FormStep::Expiration => "Expiration Date (YYYY-MM-DD)",
            FormStep::Category => "Category (Ctrl-G: AI suggestion)",
            FormStep::Quantity => "Quantity",
            FormStep::Location => "Location",
        }
    }

    fn next(self) -> Option<FormStep> {
        match self {
            FormStep::Barcode => Some(FormStep::Name),
            FormStep::Name => Some(FormStep::Expiration),
            FormStep::Expiration => Some(FormStep::Category),
            FormStep::Category => Some(FormStep::Quantity),
            FormStep::Quantity => Some(FormStep::Location),
            FormStep::Location => None,
        }
    }
}

#[derive(Debug, Clone)]
struct ItemForm {
    step: FormStep,
    session: FormSession,
}

/// Results delivered by background AI calls.
#[derive(Debug)]
enum AiEvent {
    Insights(String),
    Category(String),
}

#[derive(Debug, Default, Clone)]
struct TextInput {
    content: String,
    cursor: usize,
}

impl TextInput {
    fn from(content: String) -> Self {
        let cursor = content.len();
        Self { content, cursor }
    }

    fn insert(&mut self, c: char) {
        if self.cursor <= self.content.len() {
            self.content.insert(self.cursor, c);
            self.cursor += 1;
        }
    }

    fn delete_back(&mut self) {
        if self.cursor > 0 && self.cursor <= self.content.len() {
            self.content.remove(self.cursor - 1);
            self.cursor -= 1;
        }
    }

    fn move_left(&mut self) {
        if self.cursor > 0 {
            self.cursor -= 1;
        }
    }

    fn move_right(&mut self) {
        if self.cursor < self.content.len() {
            self.cursor += 1;
        }
    }

    fn move_home(&mut self) {
        self.cursor = 0;
    }

    fn move_end(&mut self) {
        self.cursor = self.content.len();
    }

    fn reset(&mut self) {
        self.content.clear();
        self.cursor = 0;
    }
}

struct App {
    table_state: ListState,
    input_mode: InputMode,
    input: TextInput,
    search_input: TextInput,
    active_filter: Option<String>,
    form: Option<ItemForm>,
    pending_delete: Option<Uuid>,
    insights: Option<String>,
    loading_insights: bool,
    show_help: bool,
    status: Option<String>,
    advisor: Advisor,
    ai_tx: Sender<AiEvent>,
    ai_rx: Receiver<AiEvent>,
}

impl App {
    fn new() -> Self {
        let mut table_state = ListState::default();
        table_state.select(Some(0));
        let (ai_tx, ai_rx) = mpsc::channel();
        Self {
            table_state,
            input_mode: InputMode::None,
            input: TextInput::default(),
            search_input: TextInput::default(),
            active_filter: None,
            form: None,
            pending_delete: None,
            insights: None,
            loading_insights: false,
            show_help: false,
            status: None,
            advisor: Advisor::from_env(),
            ai_tx,
            ai_rx,
        }
    }

    fn select_next(list_state: &mut ListState, len: usize) {
        let i = match list_state.selected() {
            Some(i) => {
                if i + 1 >= len {
                    0
                } else {
                    i + 1
                }
            }
            None => 0,
        };
        list_state.select(Some(i));
    }

    fn select_prev(list_state: &mut ListState, len: usize) {
        let i = match list_state.selected() {
            Some(i) => {
                if i == 0 {
                    len.saturating_sub(1)
                } else {
                    i - 1
                }
            }
            None => 0,
        };
        list_state.select(Some(i));
    }

    fn select_first(list_state: &mut ListState) {
        list_state.select(Some(0));
    }

    fn select_last(list_state: &mut ListState, len: usize) {
        if len > 0 {
            list_state.select(Some(len - 1));
        }
    }

    fn select_page_down(list_state: &mut ListState, len: usize) {
        if len == 0 {
            return;
        }
        let i = list_state.selected().unwrap_or(0);
        let next = (i + 5).min(len - 1);
        list_state.select(Some(next));
    }

    fn select_page_up(list_state: &mut ListState) {
        let i = list_state.selected().unwrap_or(0);
        let next = i.saturating_sub(5);
        list_state.select(Some(next));
    }
}

#[derive(Debug, Clone, Copy)]
enum Move {
    Up,
    Down,
    PageUp,
    PageDown,
    First,
    Last,
}

fn move_list(state: &mut ListState, len: usize, movement: Move) {
    match movement {
        Move::Up => App::select_prev(state, len),
        Move::Down => App::select_next(state, len),
        Move::PageUp => App::select_page_up(state),
        Move::PageDown => App::select_page_down(state, len),
        Move::First => App::select_first(state),
        Move::Last => App::select_last(state, len),
    }
}

pub fn run() -> Result<()> {
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = ratatui::backend::CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let store = FsStore::new(resolve_store_path()?);
    let mut inventory = Inventory::open(store)?;
    let mut app = App::new();

    let mut last_tick = Instant::now();

    loop {
        terminal.draw(|frame| render_app(frame, inventory.items(), &app))?;

        while let Ok(ai_event) = app.ai_rx.try_recv() {
            apply_ai_event(&mut app, ai_event);
        }

        let timeout = TICK_RATE.saturating_sub(last_tick.elapsed());
        if event::poll(timeout)? {
            if let Event::Key(key) = event::read()? {
                if key.kind == KeyEventKind::Press && handle_key(&mut inventory, &mut app, key)? {
                    break;
                }
            }
        }

        if last_tick.elapsed() >= TICK_RATE {
            last_tick = Instant::now();
        }
    }

    restore_terminal(terminal)?;
    Ok(())
}

fn restore_terminal(mut terminal: Terminal<ratatui::backend::CrosstermBackend<Stdout>>) -> Result<()> {
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;
    Ok(())
}

fn visible<'a>(items: &'a [Item], app: &App) -> Vec<&'a Item> {
    filter_items(items, app.active_filter.as_deref().unwrap_or(""))
}

fn current_item_id(items: &[Item], app: &App) -> Option<Uuid> {
    let index = app.table_state.selected()?;
    visible(items, app).get(index).map(|item| item.id)
}

fn clamp_selection(items: &[Item], app: &mut App) {
    let len = visible(items, app).len();
    if let Some(selected) = app.table_state.selected() {
        if len == 0 {
            app.table_state.select(None);
        } else if selected >= len {
            app.table_state.select(Some(len - 1));
        }
    } else if len > 0 {
        app.table_state.select(Some(0));
    }
}

fn apply_ai_event(app: &mut App, ai_event: AiEvent) {
    match ai_event {
        AiEvent::Insights(text) => {
            app.loading_insights = false;
            app.insights = Some(text);
        }
        AiEvent::Category(text) => {
            app.status = Some(format!("Suggested category: {text}"));
            if let Some(form) = app.form.as_mut() {
                form.session.draft.category = text.clone();
                if form.step == FormStep::Category {
                    app.input = TextInput::from(text);
                }
            }
        }
    }
}

fn handle_key(inventory: &mut Inventory<FsStore>, app: &mut App, key: KeyEvent) -> Result<bool> {
    if matches!(app.input_mode, InputMode::Search) {
        return handle_search_input(app, key);
    }
    if matches!(app.input_mode, InputMode::Form) {
        return handle_form_input(inventory, app, key);
    }
    if matches!(app.input_mode, InputMode::ConfirmDelete) {
        return handle_confirm_input(inventory, app, key);
    }

    if key.modifiers.contains(KeyModifiers::CONTROL) {
        match key.code {
            KeyCode::Char('u') => {
                let len = visible(inventory.items(), app).len();
                move_list(&mut app.table_state, len, Move::PageUp);
                return Ok(false);
            }
            KeyCode::Char('d') => {
                let len = visible(inventory.items(), app).len();
                move_list(&mut app.table_state, len, Move::PageDown);
                return Ok(false);
            }
            _ => {}
        }
    }

    match key.code {
        KeyCode::Char('q') => return Ok(true),
        KeyCode::Char('?') => {
            app.show_help = !app.show_help;
        }
        KeyCode::Char('/') => {
            app.input_mode = InputMode::Search;
            app.search_input.reset();
            if let Some(current) = &app.active_filter {
                app.search_input = TextInput::from(current.clone());
            }
        }
        KeyCode::Esc => {
            app.active_filter = None;
            app.search_input.reset();
        }
        KeyCode::Char('j') | KeyCode::Down => {
            let len = visible(inventory.items(), app).len();
            move_list(&mut app.table_state, len, Move::Down);
        }
        KeyCode::Char('k') | KeyCode::Up => {
            let len = visible(inventory.items(), app).len();
            move_list(&mut app.table_state, len, Move::Up);
        }
        KeyCode::PageDown => {
            let len = visible(inventory.items(), app).len();
            move_list(&mut app.table_state, len, Move::PageDown);
        }
        KeyCode::PageUp => {
            let len = visible(inventory.items(), app).len();
            move_list(&mut app.table_state, len, Move::PageUp);
        }
        KeyCode::Home | KeyCode::Char('g') => move_list(&mut app.table_state, 0, Move::First),
        KeyCode::End | KeyCode::Char('G') => {
            let len = visible(inventory.items(), app).len();
            move_list(&mut app.table_state, len, Move::Last);
        }
        KeyCode::Char('a') => open_form(app, FormSession::create()),
        KeyCode::Char('e') => {
            if let Some(id) = current_item_id(inventory.items(), app) {
                if let Some(item) = inventory.get(id) {
                    let session = FormSession::edit(item);
                    open_form(app, session);
                }
            }
        }
        KeyCode::Char('d') => {
            if let Some(id) = current_item_id(inventory.items(), app) {
                app.pending_delete = Some(id);
                app.input_mode = InputMode::ConfirmDelete;
            }
        }
        KeyCode::Char('i') => request_insights(inventory, app),
        KeyCode::Char('x') => {
            app.insights = None;
        }
        _ => {}
    }

    Ok(false)
}

fn open_form(app: &mut App, session: FormSession) {
    app.input = TextInput::from(session.draft.barcode.clone());
    app.form = Some(ItemForm {
        step: FormStep::Barcode,
        session,
    });
    app.input_mode = InputMode::Form;
    app.status = None;
}

fn handle_search_input(app: &mut App, key: KeyEvent) -> Result<bool> {
    match key.code {
        KeyCode::Esc => {
            app.input_mode = InputMode::None;
            app.active_filter = None;
            app.search_input.reset();
        }
        KeyCode::Enter => {
            app.input_mode = InputMode::None;
            if app.search_input.content.is_empty() {
                app.active_filter = None;
            } else {
                app.active_filter = Some(app.search_input.content.clone());
            }
        }
        KeyCode::Char(c) => {
            app.search_input.insert(c);
            app.active_filter = Some(app.search_input.content.clone());
            app.table_state.select(Some(0));
        }
        KeyCode::Backspace => {
            app.search_input.delete_back();
            if app.search_input.content.is_empty() {
                app.active_filter = None;
            } else {
                app.active_filter = Some(app.search_input.content.clone());
            }
            app.table_state.select(Some(0));
        }
        KeyCode::Left => app.search_input.move_left(),
        KeyCode::Right => app.search_input.move_right(),
        KeyCode::Home => app.search_input.move_home(),
        KeyCode::End => app.search_input.move_end(),
        _ => {
            if key.modifiers.contains(KeyModifiers::CONTROL) {
                match key.code {
                    KeyCode::Char('a') => app.search_input.move_home(),
                    KeyCode::Char('e') => app.search_input.move_end(),
                    _ => {}
                }
            }
        }
    }
    Ok(false)
}

fn handle_form_input(
    inventory: &mut Inventory<FsStore>,
    app: &mut App,
    key: KeyEvent,
) -> Result<bool> {
    if app.form.is_none() {
        app.input_mode = InputMode::None;
        return Ok(false);
    }

    if key.modifiers.contains(KeyModifiers::CONTROL) {
        match key.code {
            KeyCode::Char('g') => {
                request_category_suggestion(app);
                return Ok(false);
            }
            KeyCode::Char('a') => {
                app.input.move_home();
                return Ok(false);
            }
            KeyCode::Char('e') => {
                app.input.move_end();
                return Ok(false);
            }
            _ => {}
        }
    }

    match key.code {
        KeyCode::Esc => {
            app.form = None;
            app.input_mode = InputMode::None;
            app.input.reset();
            app.status = Some("Cancelled".into());
        }
        KeyCode::Enter => {
            let value = app.input.content.clone();
            let mut completed = None;
            if let Some(form) = app.form.as_mut() {
                set_draft_field(&mut form.session, form.step, value);
                match form.step.next() {
                    Some(next) => {
                        form.step = next;
                        app.input = TextInput::from(draft_field(&form.session, next).to_string());
                    }
                    None => completed = Some(form.session.clone()),
                }
            }
            if let Some(session) = completed {
                match session.submit(inventory, Utc::now()) {
                    Ok(item) => {
                        app.status = Some(format!("Saved {} ({})", item.product_name, short_id(item.id)));
                        app.form = None;
                        app.input_mode = InputMode::None;
                        app.input.reset();
                        clamp_selection(inventory.items(), app);
                    }
                    Err(err) => {
                        // Keep the session so the draft can be fixed.
                        app.status = Some(err.to_string());
                        if let Some(form) = app.form.as_mut() {
                            form.step = FormStep::Barcode;
                            app.input = TextInput::from(form.session.draft.barcode.clone());
                        }
                    }
                }
            }
        }
        KeyCode::Char(c) => app.input.insert(c),
        KeyCode::Backspace => app.input.delete_back(),
        KeyCode::Left => app.input.move_left(),
        KeyCode::Right => app.input.move_right(),
        KeyCode::Home => app.input.move_home(),
        KeyCode::End => app.input.move_end(),
        _ => {}
    }
    Ok(false)
}

fn handle_confirm_input(
    inventory: &mut Inventory<FsStore>,
    app: &mut App,
    key: KeyEvent,
) -> Result<bool> {
    match key.code {
        KeyCode::Char('y') | KeyCode::Char('Y') => {
            if let Some(id) = app.pending_delete.take() {
                match inventory.remove(id) {
                    Ok(()) => app.status = Some("Item removed".into()),
                    Err(err) => app.status = Some(err.to_string()),
                }
                clamp_selection(inventory.items(), app);
            }
            app.input_mode = InputMode::None;
        }
        KeyCode::Char('n') | KeyCode::Char('N') | KeyCode::Esc => {
            app.pending_delete = None;
            app.input_mode = InputMode::None;
            app.status = Some("Cancelled".into());
        }
        _ => {}
    }
    Ok(false)
}

fn draft_field(session: &FormSession, step: FormStep) -> &str {
    let draft = &session.draft;
    match step {
        FormStep::Barcode => &draft.barcode,
        FormStep::Name => &draft.product_name,
        FormStep::Expiration => &draft.expiration_date,
        FormStep::Category => &draft.category,
        FormStep::Quantity => &draft.quantity,
        FormStep::Location => &draft.location,
    }
}

fn set_draft_field(session: &mut FormSession, step: FormStep, value: String) {
    let draft = &mut session.draft;
    match step {
        FormStep::Barcode => draft.barcode = value,
        FormStep::Name => draft.product_name = value,
        FormStep::Expiration => draft.expiration_date = value,
        FormStep::Category => draft.category = value,
        FormStep::Quantity => draft.quantity = value,
        FormStep::Location => draft.location = value,
    }
}

/// Fetch insights on a background thread; the result arrives through the
/// channel and only flips this call's own loading flag.
fn request_insights(inventory: &Inventory<FsStore>, app: &mut App) {
    if inventory.items().is_empty() {
        app.status = Some("No items to analyze".into());
        return;
    }
    if app.loading_insights {
        return;
    }
    app.loading_insights = true;
    let advisor = app.advisor.clone();
    let items = inventory.items().to_vec();
    let tx = app.ai_tx.clone();
    std::thread::spawn(move || {
        let text = match tokio::runtime::Builder::new_multi_thread().enable_all().build() {
            Ok(runtime) => runtime.block_on(advisor.inventory_insights(&items)),
            Err(_) => sl_ai::INSIGHTS_FALLBACK.to_string(),
        };
        let _ = tx.send(AiEvent::Insights(text));
    });
}

fn request_category_suggestion(app: &mut App) {
    let Some(form) = app.form.as_ref() else {
        return;
    };
    let product_name = form.session.draft.product_name.clone();
    if product_name.trim().is_empty() {
        app.status = Some("Enter a product name first".into());
        return;
    }
    app.status = Some("Suggesting category…".into());
    let advisor = app.advisor.clone();
    let tx = app.ai_tx.clone();
    std::thread::spawn(move || {
        let text = match tokio::runtime::Builder::new_multi_thread().enable_all().build() {
            Ok(runtime) => runtime.block_on(advisor.suggest_category(&product_name)),
            Err(_) => sl_ai::DEFAULT_CATEGORY.to_string(),
        };
        let _ = tx.send(AiEvent::Category(text));
    });
}

fn render_app(frame: &mut Frame, items: &[Item], app: &App) {
    let size = frame.size();
    let insights_open = app.insights.is_some() || app.loading_insights;

    let mut constraints = vec![Constraint::Length(3), Constraint::Length(5)];
    if insights_open {
        constraints.push(Constraint::Length(8));
    }
    constraints.push(Constraint::Min(0));
    constraints.push(Constraint::Length(3));

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints(constraints)
        .split(size);

    let header = Paragraph::new("Perishable stock, expiration watch, AI suggestions")
        .block(Block::default().borders(Borders::ALL).title("ShelfLife"));
    frame.render_widget(header, chunks[0]);

    render_stats(frame, chunks[1], items);

    let mut next = 2;
    if insights_open {
        render_insights(frame, chunks[next], app);
        next += 1;
    }

    render_table(frame, chunks[next], items, app);
    render_guide_bar(frame, chunks[next + 1], app);

    if matches!(app.input_mode, InputMode::Search) {
        render_search_popup(frame, app);
    }
    if matches!(app.input_mode, InputMode::Form) {
        render_form_popup(frame, size, app);
    }
    if matches!(app.input_mode, InputMode::ConfirmDelete) {
        render_confirm_popup(frame, size, items, app);
    }
    if app.show_help {
        render_help_popup(frame, size);
    }
}

fn render_stats(frame: &mut Frame, area: Rect, items: &[Item]) {
    let stats = stock_stats(items, Utc::now());

    let chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage(33),
            Constraint::Percentage(33),
            Constraint::Percentage(34),
        ])
        .split(area);

    let total = Paragraph::new(format!("\n{}", stats.total))
        .alignment(ratatui::layout::Alignment::Center)
        .block(Block::default().borders(Borders::ALL).title("Total Items"))
        .style(Style::default().fg(Color::Cyan));

    let low = Paragraph::new(format!("\n{}", stats.low_stock))
        .alignment(ratatui::layout::Alignment::Center)
        .block(Block::default().borders(Borders::ALL).title("Low Stock"))
        .style(Style::default().fg(if stats.low_stock > 0 {
            Color::Red
        } else {
            Color::Green
        }));

    let expiring = Paragraph::new(format!("\n{}", stats.expiring_soon))
        .alignment(ratatui::layout::Alignment::Center)
        .block(Block::default().borders(Borders::ALL).title("Expiring Soon"))
        .style(Style::default().fg(if stats.expiring_soon > 0 {
            Color::Yellow
        } else {
            Color::Green
        }));

    frame.render_widget(total, chunks[0]);
    frame.render_widget(low, chunks[1]);
    frame.render_widget(expiring, chunks[2]);
}

fn render_insights(frame: &mut Frame, area: Rect, app: &App) {
    let text = if app.loading_insights {
        "Generating insights…"
    } else {
        app.insights.as_deref().unwrap_or_default()
    };
    let panel = Paragraph::new(text)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title("AI Insights (x: dismiss)"),
        )
        .style(Style::default().fg(Color::Blue))
        .wrap(Wrap { trim: true });
    frame.render_widget(panel, area);
}

fn render_table(frame: &mut Frame, area: Rect, items: &[Item], app: &App) {
    let now = Utc::now();
    let rows = visible(items, app)
        .iter()
        .map(|item| {
            let badge = expiry_badge(item.expiration_date, now);
            let badge_style = match badge {
                ExpiryBadge::Expired => Style::default().fg(Color::Red),
                ExpiryBadge::ExpiringSoon => Style::default().fg(Color::Yellow),
                ExpiryBadge::Ok => Style::default().fg(Color::Green),
            };
            let quantity_style = if item.quantity < LOW_STOCK_THRESHOLD {
                Style::default().fg(Color::Red)
            } else {
                Style::default()
            };
            ListItem::new(Line::from(vec![
                Span::styled(
                    format!("{}  ", short_id(item.id)),
                    Style::default().fg(Color::DarkGray),
                ),
                Span::styled(
                    format!("{:<22}", truncate_text(&item.product_name, 20)),
                    Style::default().add_modifier(Modifier::BOLD),
                ),
                Span::raw(format!("{:<14}", truncate_text(&item.category, 12))),
                Span::styled(format!("{:>4}  ", item.quantity), quantity_style),
                Span::styled(format!("{}  ", item.expiration_date), badge_style),
                Span::styled(
                    truncate_text(&item.location, 18),
                    Style::default().add_modifier(Modifier::ITALIC),
                ),
            ]))
        })
        .collect::<Vec<_>>();

    let block = Block::default()
        .borders(Borders::ALL)
        .title(if let Some(filter) = &app.active_filter {
            format!("Items (Filtered: {filter})")
        } else {
            "Items".into()
        });

    if rows.is_empty() {
        let empty = Paragraph::new("No items in stock.")
            .block(block)
            .style(Style::default().fg(Color::DarkGray));
        frame.render_widget(empty, area);
        return;
    }

    let list = List::new(rows)
        .block(block)
        .highlight_style(Style::default().bg(Color::DarkGray));
    frame.render_stateful_widget(list, area, &mut app.table_state.clone());
}

fn render_guide_bar(frame: &mut Frame, area: Rect, app: &App) {
    let hints = get_key_hints(app);
    let spans: Vec<Span> = hints
        .iter()
        .flat_map(|(key, desc)| {
            vec![
                Span::styled(
                    format!(" [{key}] "),
                    Style::default().add_modifier(Modifier::BOLD).fg(Color::Cyan),
                ),
                Span::raw(format!("{desc}  ")),
            ]
        })
        .collect();

    let guide = Paragraph::new(Line::from(spans))
        .block(Block::default().borders(Borders::ALL).title("Guide"));
    frame.render_widget(guide, area);
}

fn get_key_hints(app: &App) -> Vec<(&'static str, &'static str)> {
    if matches!(app.input_mode, InputMode::Search) {
        return vec![("Enter", "Apply"), ("Esc", "Clear")];
    }
    if matches!(app.input_mode, InputMode::Form) {
        return vec![("Enter", "Next"), ("Ctrl-G", "AI Category"), ("Esc", "Cancel")];
    }
    if matches!(app.input_mode, InputMode::ConfirmDelete) {
        return vec![("y", "Delete"), ("n", "Cancel")];
    }
    if app.show_help {
        return vec![("?", "Close Help")];
    }
    vec![
        ("q", "Quit"),
        ("?", "Help"),
        ("/", "Search"),
        ("↑/↓", "Nav"),
        ("a", "Add"),
        ("e", "Edit"),
        ("d", "Delete"),
        ("i", "Insights"),
    ]
}

fn render_search_popup(frame: &mut Frame, app: &App) {
    let area = centered_rect(60, 20, frame.size());
    let r = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(3), Constraint::Min(1)].as_ref())
        .split(area);

    frame.render_widget(Clear, area);

    let input_block = Block::default()
        .borders(Borders::ALL)
        .title("Search (product, category or barcode)")
        .style(Style::default().fg(Color::Yellow));

    let input = Paragraph::new(app.search_input.content.as_str())
        .style(Style::default().fg(Color::Yellow))
        .block(input_block);

    frame.render_widget(input, r[0]);

    let cx = r[0].x + 1 + (app.search_input.cursor as u16).min(r[0].width - 3);
    frame.set_cursor(cx, r[0].y + 1);
}

fn render_form_popup(frame: &mut Frame, area: Rect, app: &App) {
    let popup_area = centered_rect(70, 22, area);
    frame.render_widget(Clear, popup_area);

    let title = match app.form.as_ref() {
        Some(form) if form.session.is_edit() => "Edit Item",
        _ => "Add Item",
    };
    let block = Block::default().borders(Borders::ALL).title(title);

    let label = app
        .form
        .as_ref()
        .map(|form| form.step.label())
        .unwrap_or(FormStep::Barcode.label());

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints(
            [
                Constraint::Length(2),
                Constraint::Length(3),
                Constraint::Length(2),
            ]
            .as_ref(),
        )
        .margin(1)
        .split(popup_area);

    let text = Paragraph::new(label).wrap(Wrap { trim: true });
    frame.render_widget(text, chunks[0]);

    let input_widget = Paragraph::new(app.input.content.as_str())
        .block(Block::default().borders(Borders::ALL).title(label));
    frame.render_widget(input_widget, chunks[1]);

    let cx = chunks[1].x + 1 + (app.input.cursor as u16).min(chunks[1].width - 3);
    frame.set_cursor(cx, chunks[1].y + 1);

    let help = Paragraph::new("Enter: Next | Esc: Cancel")
        .style(Style::default().fg(Color::DarkGray));
    frame.render_widget(help, chunks[2]);

    frame.render_widget(block, popup_area);
}

fn render_confirm_popup(frame: &mut Frame, area: Rect, items: &[Item], app: &App) {
    let popup_area = centered_rect(60, 18, area);
    frame.render_widget(Clear, popup_area);
    let block = Block::default().borders(Borders::ALL).title("Confirm Delete");

    let message = app
        .pending_delete
        .and_then(|id| items.iter().find(|item| item.id == id))
        .map(|item| {
            format!(
                "Remove {} ({} units, expires {})?\n\nThis cannot be undone.",
                item.product_name, item.quantity, item.expiration_date
            )
        })
        .unwrap_or_else(|| "No item selected.".to_string());

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(4), Constraint::Length(2)].as_ref())
        .margin(1)
        .split(popup_area);

    let text = Paragraph::new(message).wrap(Wrap { trim: true });
    frame.render_widget(text, chunks[0]);

    let help = Paragraph::new("y: Delete | n/Esc: Cancel")
        .style(Style::default().fg(Color::DarkGray));
    frame.render_widget(help, chunks[1]);

    frame.render_widget(block, popup_area);
}

fn render_help_popup(frame: &mut Frame, area: Rect) {
    let popup_area = centered_rect(70, 30, area);
    frame.render_widget(Clear, popup_area);
    let block = Block::default().borders(Borders::ALL).title("Help");
    let content = "a: add item\ne: edit selected item\nd: delete selected item (asks first)\n/: search by product, category or barcode\ni: AI insights over the whole stock\nx: dismiss insights\nCtrl-G (in form): AI category suggestion\n↑/↓ j/k: navigate\nq: quit";
    let help = Paragraph::new(content).block(block).wrap(Wrap { trim: true });
    frame.render_widget(help, popup_area);
}

fn centered_rect(percent_x: u16, percent_y: u16, r: Rect) -> Rect {
    let popup_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints(
            [
                Constraint::Percentage((100 - percent_y) / 2),
                Constraint::Percentage(percent_y),
                Constraint::Percentage((100 - percent_y) / 2),
            ]
            .as_ref(),
        )
        .split(r);
    Layout::default()
        .direction(Direction::Horizontal)
        .constraints(
            [
                Constraint::Percentage((100 - percent_x) / 2),
                Constraint::Percentage(percent_x),
                Constraint::Percentage((100 - percent_x) / 2),
            ]
            .as_ref(),
        )
        .split(popup_layout[1])[1]
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use ratatui::backend::TestBackend;
    use sl_core::ItemFields;

    fn sample_items() -> Vec<Item> {
        let fields = ItemFields::new(
            "7891234567",
            "Whole Milk",
            NaiveDate::parse_from_str("2024-02-01", "%Y-%m-%d").expect("date"),
            "Dairy",
            2,
            "Fridge A",
        )
        .expect("fields");
        vec![Item::new(Uuid::new_v4(), fields, Utc::now())]
    }

    fn buffer_to_string(buffer: &ratatui::buffer::Buffer) -> String {
        let mut lines = Vec::new();
        for y in 0..buffer.area.height {
            let mut line = String::new();
            for x in 0..buffer.area.width {
                let cell = buffer.get(x, y);
                line.push_str(cell.symbol());
            }
            lines.push(line.trim_end().to_string());
        }
        lines.join("\n")
    }

    #[test]
    fn render_shows_stats_and_rows() {
        let backend = TestBackend::new(100, 30);
        let mut terminal = Terminal::new(backend).expect("terminal");
        let app = App::new();
        let items = sample_items();

        terminal
            .draw(|frame| render_app(frame, &items, &app))
            .expect("render");

        let content = buffer_to_string(terminal.backend().buffer());
        assert!(content.contains("ShelfLife"));
        assert!(content.contains("Total Items"));
        assert!(content.contains("Low Stock"));
        assert!(content.contains("Expiring Soon"));
        assert!(content.contains("Whole Milk"));
    }

    #[test]
    fn render_shows_filtered_title_and_empty_state() {
        let backend = TestBackend::new(100, 30);
        let mut terminal = Terminal::new(backend).expect("terminal");
        let mut app = App::new();
        app.active_filter = Some("zucchini".into());
        let items = sample_items();

        terminal
            .draw(|frame| render_app(frame, &items, &app))
            .expect("render");

        let content = buffer_to_string(terminal.backend().buffer());
        assert!(content.contains("Filtered: zucchini"));
        assert!(content.contains("No items in stock."));
    }

    #[test]
    fn form_steps_walk_every_field() {
        let mut step = FormStep::Barcode;
        let mut labels = vec![step.label()];
        while let Some(next) = step.next() {
            step = next;
            labels.push(step.label());
        }
        assert_eq!(labels.len(), 6);
        assert_eq!(step, FormStep::Location);
    }

    #[test]
    fn category_event_fills_open_form_draft() {
        let mut app = App::new();
        open_form(&mut app, FormSession::create());
        if let Some(form) = app.form.as_mut() {
            form.step = FormStep::Category;
        }

        apply_ai_event(&mut app, AiEvent::Category("Dairy".into()));

        let form = app.form.as_ref().expect("form");
        assert_eq!(form.session.draft.category, "Dairy");
        assert_eq!(app.input.content, "Dairy");
    }

    #[test]
    fn insights_event_clears_loading_flag() {
        let mut app = App::new();
        app.loading_insights = true;

        apply_ai_event(&mut app, AiEvent::Insights("Restock milk.".into()));

        assert!(!app.loading_insights);
        assert_eq!(app.insights.as_deref(), Some("Restock milk."));
    }
}
