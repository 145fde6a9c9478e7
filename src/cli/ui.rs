use ratatui::{
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Bar, BarChart, BarGroup, Block, Borders, Cell, Clear, List, ListItem, Paragraph, Row, Table, Tabs, Wrap},
    Frame,
};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;

use crate::cli::input::LineEdit;
use crate::cli::state::{App, FormField, LoginField, NoticeKind, Tab};
use crate::cli::util::{fmt_currency, fmt_date};
use crate::models::TransactionType;

const INCOME: Color = Color::Green;
const EXPENSE: Color = Color::Red;
const EMPTY_PERIOD: &str = "No expenses recorded in this period";

pub fn draw(f: &mut Frame, app: &mut App) {
    let size = f.area();

    // top tabs | main content | status bar
    let root = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(3), Constraint::Min(10), Constraint::Length(1)])
        .split(size);

    draw_tabs(f, root[0], app);

    match app.tab {
        Tab::Login => draw_login(f, root[1], app),
        Tab::Dashboard => draw_dashboard(f, root[1], app),
        Tab::Transactions => draw_txns(f, root[1], app),
        Tab::NewTxn => draw_form(f, root[1], app),
        Tab::Help => draw_help(f, root[1]),
    }

    if app.tab == Tab::Transactions && app.txn.confirm_delete.is_some() {
        let area = center_rect(root[1], 48, 5);
        f.render_widget(Clear, area);
        let p = Paragraph::new("Delete this transaction?\n\n  y: delete   n/Esc: keep")
            .block(Block::default().borders(Borders::ALL).title("Confirm"))
            .style(Style::default().fg(Color::Yellow));
        f.render_widget(p, area);
    }

    draw_status(f, root[2], app);
}

fn draw_tabs(f: &mut Frame, area: Rect, app: &App) {
    let user = app.auth.user.as_ref().map(|u| u.label().to_string());
    let title = match &user {
        Some(name) => format!("DevBills | {name}"),
        None => "DevBills".to_string(),
    };

    let (titles, selected) = if user.is_some() {
        let sel = match app.tab {
            Tab::Dashboard | Tab::Login => 0,
            Tab::Transactions => 1,
            Tab::NewTxn => 2,
            Tab::Help => 3,
        };
        (vec!["1 Dashboard", "2 Transactions", "3 New Transaction", "? Help"], sel)
    } else {
        (vec!["Sign in"], 0)
    };

    let tabs = Tabs::new(titles.into_iter().map(|t| Line::from(Span::raw(t))).collect::<Vec<_>>())
        .select(selected)
        .block(Block::default().borders(Borders::ALL).title(title))
        .highlight_style(Style::default().add_modifier(Modifier::BOLD).fg(Color::Cyan));
    f.render_widget(tabs, area);
}

fn draw_status(f: &mut Frame, area: Rect, app: &App) {
    let line = if let Some(n) = &app.notice {
        let color = match n.kind { NoticeKind::Success => INCOME, NoticeKind::Error => EXPENSE };
        Line::from(Span::styled(n.text.clone(), Style::default().fg(color).add_modifier(Modifier::BOLD)))
    } else {
        let hint = match app.tab {
            Tab::Login => "Tab: switch field | Enter: sign in | Esc: quit",
            Tab::Dashboard => "←/→ month | [/] year | r reload | n new | L sign out | q quit",
            Tab::Transactions if app.txn.searching => "type to filter | Enter/Esc: done",
            Tab::Transactions => "↑/↓ select | ←/→ month | [/] year | t type | / search | d delete | n new | r reload",
            Tab::NewTxn => "Tab/↑/↓ field | ←/→ type | Enter save | Esc cancel",
            Tab::Help => "Esc: back",
        };
        Line::from(Span::styled(hint, Style::default().fg(Color::DarkGray)))
    };
    f.render_widget(Paragraph::new(line), area);
}

// Login

fn draw_login(f: &mut Frame, area: Rect, app: &App) {
    let area = center_rect(area, 60, 14);
    let form = &app.login;

    let field = |label: &str, edit: &LineEdit, focused: bool| {
        let marker = if focused { "> " } else { "  " };
        let style = if focused { Style::default().fg(Color::Cyan) } else { Style::default() };
        Line::from(vec![Span::styled(format!("{marker}{label:<9}"), style), Span::raw(edit.rendered())])
    };

    let mut lines = vec![
        Line::from(Span::styled("Manage your finances simply and efficiently", Style::default().fg(Color::DarkGray))),
        Line::from(""),
        Line::from("Sign in to continue"),
        Line::from(""),
        field("Email", &form.email, form.focus == LoginField::Email),
        field("Password", &form.password, form.focus == LoginField::Password),
        Line::from(""),
    ];
    if app.auth.loading {
        lines.push(Line::from(Span::styled("Signing in…", Style::default().fg(Color::Yellow))));
    } else if let Some(err) = &app.auth.error {
        lines.push(Line::from(Span::styled(err.clone(), Style::default().fg(EXPENSE))));
    }

    let p = Paragraph::new(lines)
        .block(Block::default().borders(Borders::ALL).title("DevBills"))
        .alignment(Alignment::Left)
        .wrap(Wrap { trim: false });
    f.render_widget(p, area);
}

// Dashboard

fn draw_dashboard(f: &mut Frame, area: Rect, app: &App) {
    let d = &app.dashboard;
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(1), Constraint::Length(4), Constraint::Min(8)])
        .split(area);

    let mut header = vec![Span::styled(format!(" {} ", d.period.label()), Style::default().add_modifier(Modifier::BOLD))];
    if d.loading_summary || d.loading_history {
        header.push(Span::styled(" loading…", Style::default().fg(Color::Yellow)));
    }
    if let Some(err) = d.summary_error.as_ref().or(d.history_error.as_ref()) {
        header.push(Span::styled(format!(" {err} (r to retry)"), Style::default().fg(EXPENSE)));
    }
    f.render_widget(Paragraph::new(Line::from(header)), rows[0]);

    let cards = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Ratio(1, 3), Constraint::Ratio(1, 3), Constraint::Ratio(1, 3)])
        .split(rows[1]);
    let s = &d.summary;
    let balance_color = if s.balance > Decimal::ZERO { INCOME } else { EXPENSE };
    draw_card(f, cards[0], "Balance", &s.balance, balance_color);
    draw_card(f, cards[1], "Incomes", &s.total_incomes, INCOME);
    draw_card(f, cards[2], "Expenses", &s.total_expenses, EXPENSE);

    let charts = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
        .split(rows[2]);
    draw_categories(f, charts[0], app);
    draw_history(f, charts[1], app);
}

fn draw_card(f: &mut Frame, area: Rect, title: &str, value: &Decimal, color: Color) {
    let p = Paragraph::new(Line::from(Span::styled(
        fmt_currency(value),
        Style::default().fg(color).add_modifier(Modifier::BOLD),
    )))
    .block(Block::default().borders(Borders::ALL).title(title.to_string()));
    f.render_widget(p, area);
}

fn draw_categories(f: &mut Frame, area: Rect, app: &App) {
    let block = Block::default().borders(Borders::ALL).title("Expenses by category");
    let summary = &app.dashboard.summary;
    if summary.expense_category.is_empty() {
        f.render_widget(placeholder(EMPTY_PERIOD).block(block), area);
        return;
    }

    let bar_room = area.width.saturating_sub(4) / 3;
    let items: Vec<ListItem> = summary
        .expense_category
        .iter()
        .zip(summary.category_shares())
        .map(|(c, share)| {
            let color = hex_color(&c.category_color).unwrap_or(Color::Magenta);
            let filled = bar_cells(share, bar_room);
            ListItem::new(vec![
                Line::from(vec![
                    Span::styled("● ", Style::default().fg(color)),
                    Span::raw(format!("{}: {:.1}%", c.category_name, share)),
                    Span::styled(format!("  {}", fmt_currency(&c.amount)), Style::default().fg(Color::DarkGray)),
                ]),
                Line::from(Span::styled("█".repeat(filled), Style::default().fg(color))),
            ])
        })
        .collect();
    f.render_widget(List::new(items).block(block), area);
}

/// Bar length for a category share. The share comes from the server and is
/// clamped to 0..=100 (non-finite counts as 0); at least one cell is drawn.
fn bar_cells(share: f64, room: u16) -> usize {
    let share = if share.is_finite() { share.clamp(0.0, 100.0) } else { 0.0 };
    ((share / 100.0) * f64::from(room)).round().max(1.0) as usize
}

fn draw_history(f: &mut Frame, area: Rect, app: &App) {
    let block = Block::default().borders(Borders::ALL).title("Monthly history (red: expenses, green: incomes)");
    let history = &app.dashboard.history;
    if history.is_empty() {
        f.render_widget(placeholder(EMPTY_PERIOD).block(block), area);
        return;
    }

    let mut chart = BarChart::default().block(block).bar_width(6).bar_gap(1).group_gap(3);
    for item in history {
        let bars = [
            Bar::default().value(whole(&item.expenses)).style(Style::default().fg(EXPENSE)),
            Bar::default().value(whole(&item.income)).style(Style::default().fg(INCOME)),
        ];
        chart = chart.data(BarGroup::default().label(Line::from(item.name.clone())).bars(&bars));
    }
    f.render_widget(chart, area);
}

// Transactions

fn draw_txns(f: &mut Frame, area: Rect, app: &mut App) {
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(3), Constraint::Min(5)])
        .split(area);

    let txn = &app.txn;
    let type_label = txn.type_filter.map(|t| t.label()).unwrap_or("All");
    let search_style = if txn.searching { Style::default().fg(Color::Cyan) } else { Style::default() };
    let filters = Paragraph::new(Line::from(vec![
        Span::styled(txn.period.label(), Style::default().add_modifier(Modifier::BOLD)),
        Span::raw(format!("   Type: {type_label}   ")),
        Span::styled(format!("Search: {}", txn.search.rendered()), search_style),
        Span::raw(if txn.searching { "▏" } else { "" }),
    ]))
    .block(Block::default().borders(Borders::ALL).title("Filters"));
    f.render_widget(filters, rows[0]);

    let block = Block::default().borders(Borders::ALL).title("Transactions");
    if txn.loading {
        f.render_widget(placeholder("Loading transactions…").block(block), rows[1]);
        return;
    }
    if let Some(err) = &txn.error {
        let p = Paragraph::new(vec![
            Line::from(Span::styled(err.clone(), Style::default().fg(EXPENSE))),
            Line::from(""),
            Line::from("Press r to try again"),
        ])
        .alignment(Alignment::Center)
        .block(block);
        f.render_widget(p, rows[1]);
        return;
    }

    let visible = txn.visible();
    if visible.is_empty() {
        f.render_widget(placeholder("No transactions found.\n\nPress n to add one").block(block), rows[1]);
        return;
    }

    let header = Row::new(vec!["Description", "Date", "Category", "Amount", ""])
        .style(Style::default().fg(Color::DarkGray))
        .height(1);

    let body: Vec<Row> = visible
        .iter()
        .map(|t| {
            let (arrow, color) = match t.r#type {
                TransactionType::Income => ("↑ ", INCOME),
                TransactionType::Expense => ("↓ ", EXPENSE),
            };
            let cat_color = hex_color(&t.category.color).unwrap_or(Color::Gray);
            let busy = txn.deleting_id.as_deref() == Some(t.id.as_str());
            Row::new(vec![
                Cell::from(Line::from(vec![Span::styled(arrow, Style::default().fg(color)), Span::raw(t.description.clone())])),
                Cell::from(fmt_date(&t.date)),
                Cell::from(Line::from(vec![
                    Span::styled("● ", Style::default().fg(cat_color)),
                    Span::raw(t.category.name.clone()),
                ])),
                Cell::from(Span::styled(fmt_currency(&t.amount), Style::default().fg(color))),
                Cell::from(if busy { "deleting…" } else { "" }),
            ])
        })
        .collect();

    let widths = [
        Constraint::Percentage(40),
        Constraint::Length(12),
        Constraint::Percentage(25),
        Constraint::Length(18),
        Constraint::Length(10),
    ];

    let table = Table::new(body, widths)
        .header(header)
        .block(block)
        .row_highlight_style(Style::default().add_modifier(Modifier::REVERSED));

    let mut tsel = app.txn.tsel.clone();
    f.render_stateful_widget(table, rows[1], &mut tsel);
    app.txn.tsel = tsel;
}

// New transaction

fn draw_form(f: &mut Frame, area: Rect, app: &mut App) {
    let cols = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(55), Constraint::Percentage(45)])
        .split(area);

    let form = &app.form;
    let label = |field: FormField, name: &str| {
        let focused = form.focus == field;
        let style = if focused { Style::default().fg(Color::Cyan) } else { Style::default() };
        Span::styled(format!("{}{name:<12}", if focused { "> " } else { "  " }), style)
    };

    let type_line = Line::from(vec![
        label(FormField::Type, "Type"),
        type_choice(TransactionType::Expense, form.r#type, EXPENSE),
        Span::raw("  "),
        type_choice(TransactionType::Income, form.r#type, INCOME),
    ]);
    let category = form.selected_category().map(|c| c.name.clone()).unwrap_or_else(|| "Select a category".into());

    let mut lines = vec![
        type_line,
        Line::from(vec![label(FormField::Description, "Description"), Span::raw(form.description.rendered())]),
        Line::from(vec![label(FormField::Amount, "Amount (R$)"), Span::raw(form.amount.rendered())]),
        Line::from(vec![label(FormField::Date, "Date"), Span::raw(form.date.rendered())]),
        Line::from(vec![label(FormField::Category, "Category"), Span::raw(category)]),
        Line::from(""),
    ];
    if form.loading {
        lines.push(Line::from(Span::styled("Saving…", Style::default().fg(Color::Yellow))));
    } else if let Some(err) = &form.error {
        lines.push(Line::from(Span::styled(err.clone(), Style::default().fg(EXPENSE))));
    }

    let p = Paragraph::new(lines)
        .block(Block::default().borders(Borders::ALL).title("New Transaction"))
        .wrap(Wrap { trim: false });
    f.render_widget(p, cols[0]);

    let items: Vec<ListItem> = form
        .filtered_categories()
        .into_iter()
        .map(|c| {
            let color = hex_color(&c.color).unwrap_or(Color::Gray);
            ListItem::new(Line::from(vec![Span::styled("● ", Style::default().fg(color)), Span::raw(c.name.clone())]))
        })
        .collect();
    let title = if form.focus == FormField::Category { "Categories (↑/↓)" } else { "Categories" };
    let list = List::new(items)
        .block(Block::default().borders(Borders::ALL).title(title))
        .highlight_style(Style::default().add_modifier(Modifier::REVERSED));

    f.render_stateful_widget(list, cols[1], &mut app.form.cat_sel);
}

fn type_choice(t: TransactionType, selected: TransactionType, color: Color) -> Span<'static> {
    if t == selected {
        Span::styled(format!("[{}]", t.label()), Style::default().fg(color).add_modifier(Modifier::BOLD))
    } else {
        Span::styled(format!(" {} ", t.label()), Style::default().fg(Color::DarkGray))
    }
}

fn draw_help(f: &mut Frame, area: Rect) {
    let help_text = [
        "Global Keys:",
        "  1 / 2 / 3 : Dashboard / Transactions / New transaction",
        "  ?         : Toggle this Help tab",
        "  L         : Sign out",
        "  q         : Quit (Ctrl+C anywhere)",
        "",
        "Dashboard and Transactions:",
        "  ←/→       : Previous / next month",
        "  [ / ]     : Previous / next year",
        "  r         : Reload",
        "  n         : New transaction",
        "",
        "Transactions:",
        "  ↑/↓, j/k  : Select row",
        "  t         : Cycle type filter (all, expense, income)",
        "  /         : Search descriptions",
        "  d / Del   : Delete selected (asks for confirmation)",
        "",
        "New Transaction:",
        "  Tab, ↑/↓  : Move between fields",
        "  ←/→ Space : Toggle expense / income (on Type)",
        "  ↑/↓       : Choose category (on Category)",
        "  Enter     : Save",
        "  Esc       : Cancel",
    ]
    .join("\n");

    let p = Paragraph::new(help_text)
        .block(Block::default().borders(Borders::ALL).title("Help & Keybindings"));
    f.render_widget(p, area);
}

fn placeholder(text: &str) -> Paragraph<'static> {
    Paragraph::new(text.to_string())
        .alignment(Alignment::Center)
        .style(Style::default().fg(Color::DarkGray))
}

fn whole(d: &Decimal) -> u64 {
    d.round().to_u64().unwrap_or(0)
}

/// `#RRGGBB` to a terminal colour.
fn hex_color(s: &str) -> Option<Color> {
    let hex = s.trim().strip_prefix('#')?;
    if hex.len() != 6 {
        return None;
    }
    let v = u32::from_str_radix(hex, 16).ok()?;
    Some(Color::Rgb((v >> 16) as u8, (v >> 8) as u8, v as u8))
}

fn center_rect(rect: Rect, w: u16, h: u16) -> Rect {
    let x = rect.x + rect.width.saturating_sub(w) / 2;
    let y = rect.y + rect.height.saturating_sub(h) / 2;
    Rect { x, y, width: w.min(rect.width), height: h.min(rect.height) }
}
