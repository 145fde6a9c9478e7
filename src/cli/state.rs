// src/cli/state.rs
use std::collections::VecDeque;
use std::time::{Duration, Instant};

use chrono::Utc;
use crossterm::event::{KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use ratatui::widgets::{ListState, TableState};
use rust_decimal::Decimal;
use tracing::{info, warn};

use crate::auth::{IdentityClient, Session, SessionStore};
use crate::cli::api::Client;
use crate::cli::input::LineEdit;
use crate::cli::util::{self, Period};
use crate::error::ApiError;
use crate::models::{
    AuthState, Category, CreateTransaction, MonthlyItem, Transaction, TransactionFilter,
    TransactionSummary, TransactionType,
};

/// Months of history shown on the dashboard chart.
pub const HISTORY_MONTHS: u32 = 4;
pub const NOTICE_TTL: Duration = Duration::from_secs(4);

pub const MSG_LOAD_FAILED: &str = "Could not load transactions. Try again.";
pub const MSG_DELETED: &str = "Transaction deleted";
pub const MSG_DELETE_FAILED: &str = "Failed to delete transaction. Try again.";
pub const MSG_ADDED: &str = "Transaction added";
pub const MSG_ADD_FAILED: &str = "Failed to add transaction.";
pub const MSG_REQUIRED: &str = "All fields are required.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tab {
    Login,
    Dashboard,
    Transactions,
    NewTxn,
    Help,
}

/// Work queued by key handling and executed by the run loop after a redraw.
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    RestoreSession(Session),
    SignIn { email: String, password: String },
    SignOut,
    LoadSummary,
    LoadHistory,
    LoadTransactions,
    LoadCategories,
    DeleteTransaction(String),
    CreateTransaction(CreateTransaction),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeKind {
    Success,
    Error,
}

#[derive(Debug, Clone)]
pub struct Notice {
    pub kind: NoticeKind,
    pub text: String,
    pub shown_at: Instant,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LoginField {
    #[default]
    Email,
    Password,
}

#[derive(Debug, Clone)]
pub struct LoginForm {
    pub email: LineEdit,
    pub password: LineEdit,
    pub focus: LoginField,
}

impl Default for LoginForm {
    fn default() -> Self {
        Self { email: LineEdit::default(), password: LineEdit::masked(), focus: LoginField::Email }
    }
}

pub struct DashboardPage {
    pub period: Period,
    pub summary: TransactionSummary,
    pub history: Vec<MonthlyItem>,
    pub loading_summary: bool,
    pub loading_history: bool,
    pub summary_error: Option<String>,
    pub history_error: Option<String>,
}

impl DashboardPage {
    fn new(period: Period) -> Self {
        Self {
            period,
            summary: TransactionSummary::default(),
            history: Vec::new(),
            loading_summary: false,
            loading_history: false,
            summary_error: None,
            history_error: None,
        }
    }
}

pub struct TxnPage {
    pub period: Period,
    pub type_filter: Option<TransactionType>,
    pub list: Vec<Transaction>,
    pub tsel: TableState,
    pub loading: bool,
    pub error: Option<String>,
    pub search: LineEdit,
    pub searching: bool,
    pub confirm_delete: Option<String>,
    pub deleting_id: Option<String>,
}

impl TxnPage {
    fn new(period: Period) -> Self {
        Self {
            period,
            type_filter: None,
            list: Vec::new(),
            tsel: TableState::default(),
            loading: false,
            error: None,
            search: LineEdit::default(),
            searching: false,
            confirm_delete: None,
            deleting_id: None,
        }
    }

    pub fn filter(&self) -> TransactionFilter {
        TransactionFilter {
            r#type: self.type_filter,
            ..TransactionFilter::new(self.period.month, self.period.year)
        }
    }

    /// Rows matching the local search box, in server order.
    pub fn visible(&self) -> Vec<&Transaction> {
        let needle = self.search.value.trim().to_lowercase();
        self.list
            .iter()
            .filter(|t| needle.is_empty() || t.description.to_lowercase().contains(&needle))
            .collect()
    }

    pub fn selected(&self) -> Option<&Transaction> {
        let idx = self.tsel.selected()?;
        self.visible().get(idx).copied()
    }

    fn clamp_selection(&mut self) {
        let n = self.visible().len();
        match (n, self.tsel.selected()) {
            (0, _) => self.tsel.select(None),
            (n, Some(i)) if i >= n => self.tsel.select(Some(n - 1)),
            (_, None) => self.tsel.select(Some(0)),
            _ => {}
        }
    }

    fn move_sel(&mut self, delta: isize) {
        let n = self.visible().len();
        if n == 0 { self.tsel.select(None); return; }
        let cur = self.tsel.selected().unwrap_or(0) as isize;
        let next = (cur + delta).rem_euclid(n as isize) as usize;
        self.tsel.select(Some(next));
    }

    fn cycle_type_filter(&mut self) {
        self.type_filter = match self.type_filter {
            None => Some(TransactionType::Expense),
            Some(TransactionType::Expense) => Some(TransactionType::Income),
            Some(TransactionType::Income) => None,
        };
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormField {
    Type,
    Description,
    Amount,
    Date,
    Category,
}

impl FormField {
    /// Fields backed by a `LineEdit`; every printable key is typed into them.
    pub fn takes_text(self) -> bool {
        matches!(self, FormField::Description | FormField::Amount | FormField::Date)
    }
    fn next(self) -> Self {
        use FormField::*;
        match self { Type => Description, Description => Amount, Amount => Date, Date => Category, Category => Type }
    }
    fn prev(self) -> Self {
        use FormField::*;
        match self { Type => Category, Category => Date, Date => Amount, Amount => Description, Description => Type }
    }
}

#[derive(Clone)]
pub struct TxnForm {
    pub r#type: TransactionType,
    pub description: LineEdit,
    pub amount: LineEdit,
    pub date: LineEdit,
    pub categories: Vec<Category>,
    pub cat_sel: ListState,
    pub focus: FormField,
    pub error: Option<String>,
    pub loading: bool,
}

impl Default for TxnForm {
    fn default() -> Self {
        Self {
            r#type: TransactionType::Expense,
            description: LineEdit::default(),
            amount: LineEdit::default(),
            date: LineEdit::default(),
            categories: Vec::new(),
            cat_sel: ListState::default(),
            focus: FormField::Type,
            error: None,
            loading: false,
        }
    }
}

impl TxnForm {
    /// Categories that match the selected transaction type.
    pub fn filtered_categories(&self) -> Vec<&Category> {
        self.categories.iter().filter(|c| c.r#type == self.r#type).collect()
    }

    pub fn selected_category(&self) -> Option<&Category> {
        let idx = self.cat_sel.selected()?;
        self.filtered_categories().get(idx).copied()
    }

    /// Clears the inputs but keeps the fetched categories.
    fn reset(&mut self) {
        let categories = std::mem::take(&mut self.categories);
        *self = TxnForm { categories, ..TxnForm::default() };
        self.date.set(util::iso(&util::today()));
    }

    fn set_type(&mut self, t: TransactionType) {
        if self.r#type != t {
            self.r#type = t;
            self.cat_sel.select(None);
        }
    }

    fn move_cat(&mut self, delta: i32) {
        let len = self.filtered_categories().len();
        if len == 0 {
            self.cat_sel.select(None);
            return;
        }
        let cur = match self.cat_sel.selected() {
            Some(i) => i as i32 + delta,
            None if delta < 0 => len as i32 - 1,
            None => 0,
        };
        self.cat_sel.select(Some(cur.rem_euclid(len as i32) as usize));
    }

    fn focused_edit(&mut self) -> Option<&mut LineEdit> {
        match self.focus {
            FormField::Description => Some(&mut self.description),
            FormField::Amount => Some(&mut self.amount),
            FormField::Date => Some(&mut self.date),
            FormField::Type | FormField::Category => None,
        }
    }

    /// Builds the request body, or the message to show instead.
    pub fn validate(&self) -> Result<CreateTransaction, String> {
        let category = self.selected_category();
        if self.description.is_blank() || self.amount.is_blank() || self.date.is_blank() || category.is_none() {
            return Err(MSG_REQUIRED.into());
        }
        let amount = util::parse_amount(&self.amount.value).ok_or_else(|| "Invalid amount.".to_string())?;
        if amount <= Decimal::ZERO {
            return Err("Amount must be greater than zero.".into());
        }
        let day = util::parse_date(&self.date.value).ok_or_else(|| "Invalid date, use YYYY-MM-DD.".to_string())?;
        let category_id = category.map(|c| c.id.clone()).unwrap_or_default();

        Ok(CreateTransaction {
            description: self.description.value.trim().to_string(),
            amount,
            date: CreateTransaction::wire_date(day),
            category_id,
            r#type: self.r#type,
        })
    }
}

pub struct App {
    pub api: Client,
    pub identity: IdentityClient,
    pub store: SessionStore,
    pub session: Option<Session>,
    pub auth: AuthState,
    pub tab: Tab,
    pub help_return: Tab,
    pub quit: bool,
    pub login: LoginForm,
    pub dashboard: DashboardPage,
    pub txn: TxnPage,
    pub form: TxnForm,
    pub notice: Option<Notice>,
    effects: VecDeque<Effect>,
}

impl App {
    pub fn new(api: Client, identity: IdentityClient, store: SessionStore) -> Self {
        let period = Period::current();
        Self {
            api,
            identity,
            store,
            session: None,
            auth: AuthState::default(),
            tab: Tab::Login,
            help_return: Tab::Login,
            quit: false,
            login: LoginForm::default(),
            dashboard: DashboardPage::new(period),
            txn: TxnPage::new(period),
            form: TxnForm::default(),
            notice: None,
            effects: VecDeque::new(),
        }
    }

    /// Queues a restore of the stored session, if there is one.
    pub fn restore_stored_session(&mut self) {
        if let Some(session) = self.store.load() {
            self.auth.loading = true;
            self.enqueue(Effect::RestoreSession(session));
        }
    }

    // ============= Effects =============

    pub fn enqueue(&mut self, effect: Effect) {
        if !self.effects.contains(&effect) {
            self.effects.push_back(effect);
        }
    }

    pub fn has_pending(&self) -> bool {
        !self.effects.is_empty()
    }

    pub fn pending(&self) -> impl Iterator<Item = &Effect> {
        self.effects.iter()
    }

    /// Runs the oldest queued effect. Returns false when the queue was empty.
    pub async fn run_next_effect(&mut self) -> bool {
        let Some(effect) = self.effects.pop_front() else { return false };
        self.run_effect(effect).await;
        true
    }

    pub async fn run_effects(&mut self) {
        while self.run_next_effect().await {}
    }

    async fn run_effect(&mut self, effect: Effect) {
        match effect {
            Effect::RestoreSession(session) => self.restore_session(session).await,
            Effect::SignIn { email, password } => self.sign_in(&email, &password).await,
            Effect::SignOut => self.sign_out(None),
            other => {
                if !self.ensure_fresh_token().await {
                    return;
                }
                match other {
                    Effect::LoadSummary => self.load_summary().await,
                    Effect::LoadHistory => self.load_history().await,
                    Effect::LoadTransactions => self.load_transactions().await,
                    Effect::LoadCategories => self.load_categories().await,
                    Effect::DeleteTransaction(id) => self.delete_transaction(&id).await,
                    Effect::CreateTransaction(dto) => self.create_transaction(&dto).await,
                    Effect::RestoreSession(_) | Effect::SignIn { .. } | Effect::SignOut => {}
                }
            }
        }
    }

    // ============= Auth =============

    async fn restore_session(&mut self, session: Session) {
        match self.identity.refresh(&session).await {
            Ok(fresh) => {
                info!(uid = %fresh.user.uid, "session restored");
                self.complete_sign_in(fresh);
            }
            Err(e) => {
                warn!(error = %e, "stored session could not be restored");
                if let Err(e) = self.store.clear() {
                    warn!(error = %e, "cannot remove stored session");
                }
                self.auth = AuthState { user: None, error: Some(e.to_string()), loading: false };
                self.tab = Tab::Login;
            }
        }
    }

    async fn sign_in(&mut self, email: &str, password: &str) {
        match self.identity.sign_in(email, password).await {
            Ok(session) => self.complete_sign_in(session),
            Err(e) => {
                warn!(error = %e, "sign-in failed");
                self.auth = AuthState { user: None, error: Some(e.to_string()), loading: false };
            }
        }
    }

    fn complete_sign_in(&mut self, session: Session) {
        if let Err(e) = self.store.save(&session) {
            warn!(error = %e, "cannot persist session");
        }
        self.api.set_token(Some(session.id_token.clone()));
        self.auth = AuthState { user: Some(session.user.clone()), error: None, loading: false };
        self.session = Some(session);
        self.login = LoginForm::default();
        self.open_dashboard();
    }

    /// Drops the session and every piece of fetched data.
    fn sign_out(&mut self, reason: Option<String>) {
        if let Some(s) = &self.session {
            info!(uid = %s.user.uid, "signing out");
        }
        if let Err(e) = self.store.clear() {
            warn!(error = %e, "cannot remove stored session");
        }
        self.session = None;
        self.api.set_token(None);
        self.effects.clear();
        self.auth = AuthState { user: None, error: reason, loading: false };
        let period = Period::current();
        self.dashboard = DashboardPage::new(period);
        self.txn = TxnPage::new(period);
        self.form = TxnForm::default();
        self.tab = Tab::Login;
    }

    /// Refreshes the id token when it is about to expire. Signs out when that fails.
    async fn ensure_fresh_token(&mut self) -> bool {
        let Some(session) = self.session.clone() else {
            return false;
        };
        if !session.needs_refresh(Utc::now()) {
            return true;
        }
        match self.identity.refresh(&session).await {
            Ok(fresh) => {
                self.api.set_token(Some(fresh.id_token.clone()));
                if let Err(e) = self.store.save(&fresh) {
                    warn!(error = %e, "cannot persist refreshed session");
                }
                self.session = Some(fresh);
                true
            }
            Err(e) => {
                warn!(error = %e, "token refresh failed");
                self.sign_out(Some(e.to_string()));
                false
            }
        }
    }

    /// Rejected credentials end the session; everything else is the caller's to show.
    fn check_auth_failure(&mut self, err: &ApiError) -> bool {
        if err.is_unauthorized() {
            self.sign_out(Some("Session expired, sign in again".into()));
            return true;
        }
        false
    }

    // ============= Data =============

    async fn load_summary(&mut self) {
        let p = self.dashboard.period;
        match self.api.get_transactions_summary(p.month, p.year).await {
            Ok(summary) => {
                self.dashboard.summary = summary;
                self.dashboard.summary_error = None;
            }
            Err(e) => {
                warn!(error = %e, "summary fetch failed");
                if self.check_auth_failure(&e) { return; }
                self.dashboard.summary = TransactionSummary::default();
                self.dashboard.summary_error = Some(e.to_string());
            }
        }
        self.dashboard.loading_summary = false;
    }

    async fn load_history(&mut self) {
        let p = self.dashboard.period;
        match self.api.get_transactions_monthly(p.month, p.year, Some(HISTORY_MONTHS)).await {
            Ok(monthly) => {
                self.dashboard.history = monthly.history;
                self.dashboard.history_error = None;
            }
            Err(e) => {
                warn!(error = %e, "history fetch failed");
                if self.check_auth_failure(&e) { return; }
                self.dashboard.history.clear();
                self.dashboard.history_error = Some(e.to_string());
            }
        }
        self.dashboard.loading_history = false;
    }

    async fn load_transactions(&mut self) {
        let filter = self.txn.filter();
        match self.api.get_transactions(&filter).await {
            Ok(list) => {
                self.txn.list = list;
                self.txn.error = None;
                self.txn.tsel.select(None);
                self.txn.clamp_selection();
            }
            Err(e) => {
                warn!(error = %e, "transactions fetch failed");
                if self.check_auth_failure(&e) { return; }
                self.txn.error = Some(MSG_LOAD_FAILED.into());
            }
        }
        self.txn.loading = false;
    }

    async fn load_categories(&mut self) {
        match self.api.get_categories().await {
            Ok(list) => {
                self.form.categories = list;
                self.form.cat_sel.select(None);
            }
            Err(e) => {
                warn!(error = %e, "categories fetch failed");
                if self.check_auth_failure(&e) { return; }
                self.form.error = Some("Could not load categories.".into());
            }
        }
    }

    async fn delete_transaction(&mut self, id: &str) {
        match self.api.delete_transaction(id).await {
            Ok(()) => {
                self.txn.list.retain(|t| t.id != id);
                self.txn.clamp_selection();
                self.notify(NoticeKind::Success, MSG_DELETED);
            }
            Err(e) => {
                warn!(error = %e, id, "delete failed");
                if self.check_auth_failure(&e) { return; }
                self.notify(NoticeKind::Error, MSG_DELETE_FAILED);
            }
        }
        self.txn.deleting_id = None;
    }

    async fn create_transaction(&mut self, dto: &CreateTransaction) {
        match self.api.create_transaction(dto).await {
            Ok(created) => {
                info!(id = %created.id, "transaction created");
                self.notify(NoticeKind::Success, MSG_ADDED);
                self.form.reset();
                self.open_transactions();
            }
            Err(e) => {
                warn!(error = %e, "create failed");
                self.form.loading = false;
                if self.check_auth_failure(&e) { return; }
                self.notify(NoticeKind::Error, MSG_ADD_FAILED);
            }
        }
    }

    // ============= Notices =============

    pub fn notify(&mut self, kind: NoticeKind, text: impl Into<String>) {
        self.notice = Some(Notice { kind, text: text.into(), shown_at: Instant::now() });
    }

    /// Expires the current notice.
    pub fn tick(&mut self, now: Instant) {
        if let Some(n) = &self.notice {
            if now.saturating_duration_since(n.shown_at) >= NOTICE_TTL {
                self.notice = None;
            }
        }
    }

    // ============= Navigation =============

    pub fn open_dashboard(&mut self) {
        self.tab = Tab::Dashboard;
        self.reload_dashboard();
    }

    pub fn open_transactions(&mut self) {
        self.tab = Tab::Transactions;
        self.reload_transactions();
    }

    pub fn open_new_transaction(&mut self) {
        self.tab = Tab::NewTxn;
        self.form.reset();
        if self.form.categories.is_empty() {
            self.enqueue(Effect::LoadCategories);
        }
    }

    fn reload_dashboard(&mut self) {
        self.dashboard.loading_summary = true;
        self.dashboard.loading_history = true;
        self.enqueue(Effect::LoadSummary);
        self.enqueue(Effect::LoadHistory);
    }

    fn reload_transactions(&mut self) {
        self.txn.loading = true;
        self.txn.error = None;
        self.enqueue(Effect::LoadTransactions);
    }

    fn set_dashboard_period(&mut self, period: Period) {
        if self.dashboard.period != period {
            self.dashboard.period = period;
            self.reload_dashboard();
        }
    }

    fn set_txn_period(&mut self, period: Period) {
        if self.txn.period != period {
            self.txn.period = period;
            self.reload_transactions();
        }
    }

    // ============= Keys =============

    pub fn handle_key(&mut self, k: KeyEvent) {
        if k.kind != KeyEventKind::Press { return; }
        if k.modifiers.contains(KeyModifiers::CONTROL) && k.code == KeyCode::Char('c') {
            self.quit = true;
            return;
        }

        if !self.auth.is_signed_in() {
            if !self.auth.loading {
                self.tab = Tab::Login;
                self.handle_login_key(k);
            }
            return;
        }

        match self.tab {
            Tab::NewTxn if self.form.loading || self.form.focus.takes_text() || !is_global_key(k.code) => {
                return self.handle_form_key(k)
            }
            Tab::Transactions if self.txn.confirm_delete.is_some() => return self.handle_confirm_key(k),
            Tab::Transactions if self.txn.searching => return self.handle_search_key(k),
            _ => {}
        }

        match k.code {
            KeyCode::Char('q') => { self.quit = true; return; }
            KeyCode::Char('1') => { self.open_dashboard(); return; }
            KeyCode::Char('2') => { self.open_transactions(); return; }
            KeyCode::Char('3') => { self.open_new_transaction(); return; }
            KeyCode::Char('L') => {
                self.auth.loading = true;
                self.enqueue(Effect::SignOut);
                return;
            }
            KeyCode::Char('?') if self.tab != Tab::Help => {
                self.help_return = self.tab;
                self.tab = Tab::Help;
                return;
            }
            _ => {}
        }

        match self.tab {
            Tab::Dashboard => {
                let p = self.dashboard.period;
                match k.code {
                    KeyCode::Left => self.set_dashboard_period(p.shift_months(-1)),
                    KeyCode::Right => self.set_dashboard_period(p.shift_months(1)),
                    KeyCode::Char('[') => self.set_dashboard_period(p.shift_years(-1)),
                    KeyCode::Char(']') => self.set_dashboard_period(p.shift_years(1)),
                    KeyCode::Char('r') => self.reload_dashboard(),
                    KeyCode::Char('n') => self.open_new_transaction(),
                    _ => {}
                }
            }
            Tab::Transactions => {
                let p = self.txn.period;
                match k.code {
                    KeyCode::Up | KeyCode::Char('k') => self.txn.move_sel(-1),
                    KeyCode::Down | KeyCode::Char('j') => self.txn.move_sel(1),
                    KeyCode::Left => self.set_txn_period(p.shift_months(-1)),
                    KeyCode::Right => self.set_txn_period(p.shift_months(1)),
                    KeyCode::Char('[') => self.set_txn_period(p.shift_years(-1)),
                    KeyCode::Char(']') => self.set_txn_period(p.shift_years(1)),
                    KeyCode::Char('t') => {
                        self.txn.cycle_type_filter();
                        self.reload_transactions();
                    }
                    KeyCode::Char('/') => self.txn.searching = true,
                    KeyCode::Char('r') => self.reload_transactions(),
                    KeyCode::Char('n') => self.open_new_transaction(),
                    KeyCode::Char('d') | KeyCode::Delete => {
                        if self.txn.deleting_id.is_none() {
                            self.txn.confirm_delete = self.txn.selected().map(|t| t.id.clone());
                        }
                    }
                    _ => {}
                }
            }
            Tab::Help => {
                if matches!(k.code, KeyCode::Esc | KeyCode::Char('b') | KeyCode::Char('?')) {
                    self.tab = self.help_return;
                }
            }
            Tab::Login | Tab::NewTxn => {}
        }
    }

    fn login_field(&mut self) -> &mut LineEdit {
        match self.login.focus {
            LoginField::Email => &mut self.login.email,
            LoginField::Password => &mut self.login.password,
        }
    }

    fn handle_login_key(&mut self, k: KeyEvent) {
        match k.code {
            KeyCode::Tab | KeyCode::BackTab | KeyCode::Up | KeyCode::Down => {
                self.login.focus = match self.login.focus {
                    LoginField::Email => LoginField::Password,
                    LoginField::Password => LoginField::Email,
                };
            }
            KeyCode::Enter => {
                if self.login.email.is_blank() || self.login.password.value.is_empty() {
                    self.auth.error = Some("Enter your email and password".into());
                    return;
                }
                let email = self.login.email.value.trim().to_string();
                let password = std::mem::take(&mut self.login.password.value);
                self.login.password.clear();
                self.auth.loading = true;
                self.auth.error = None;
                self.enqueue(Effect::SignIn { email, password });
            }
            KeyCode::Esc => self.quit = true,
            KeyCode::Char(c) => self.login_field().push(c),
            KeyCode::Backspace => self.login_field().backspace(),
            KeyCode::Delete => self.login_field().delete(),
            KeyCode::Left => self.login_field().left(),
            KeyCode::Right => self.login_field().right(),
            KeyCode::Home => self.login_field().home(),
            KeyCode::End => self.login_field().end(),
            _ => {}
        }
    }

    fn handle_confirm_key(&mut self, k: KeyEvent) {
        match k.code {
            KeyCode::Char('y') | KeyCode::Char('Y') => {
                if let Some(id) = self.txn.confirm_delete.take() {
                    self.txn.deleting_id = Some(id.clone());
                    self.enqueue(Effect::DeleteTransaction(id));
                }
            }
            KeyCode::Char('n') | KeyCode::Char('N') | KeyCode::Esc => self.txn.confirm_delete = None,
            _ => {}
        }
    }

    fn handle_search_key(&mut self, k: KeyEvent) {
        let search = &mut self.txn.search;
        match k.code {
            KeyCode::Enter | KeyCode::Esc => self.txn.searching = false,
            KeyCode::Char(c) => search.push(c),
            KeyCode::Backspace => search.backspace(),
            KeyCode::Delete => search.delete(),
            KeyCode::Left => search.left(),
            KeyCode::Right => search.right(),
            _ => {}
        }
        self.txn.tsel.select(None);
        self.txn.clamp_selection();
    }

    fn handle_form_key(&mut self, k: KeyEvent) {
        if self.form.loading { return; }
        match k.code {
            KeyCode::Esc => {
                self.form.error = None;
                self.open_transactions();
                return;
            }
            KeyCode::Enter => return self.submit_form(),
            KeyCode::Tab => { self.form.focus = self.form.focus.next(); return; }
            KeyCode::BackTab => { self.form.focus = self.form.focus.prev(); return; }
            _ => {}
        }

        match self.form.focus {
            FormField::Type => match k.code {
                KeyCode::Left | KeyCode::Right | KeyCode::Char(' ') => {
                    let t = self.form.r#type.toggled();
                    self.form.set_type(t);
                }
                KeyCode::Char('e') => self.form.set_type(TransactionType::Expense),
                KeyCode::Char('i') => self.form.set_type(TransactionType::Income),
                KeyCode::Up => self.form.focus = self.form.focus.prev(),
                KeyCode::Down => self.form.focus = self.form.focus.next(),
                _ => {}
            },
            FormField::Category => match k.code {
                KeyCode::Up => self.form.move_cat(-1),
                KeyCode::Down => self.form.move_cat(1),
                _ => {}
            },
            _ => {
                let nav = match k.code {
                    KeyCode::Up => Some(self.form.focus.prev()),
                    KeyCode::Down => Some(self.form.focus.next()),
                    _ => None,
                };
                if let Some(f) = nav {
                    self.form.focus = f;
                    return;
                }
                if let Some(edit) = self.form.focused_edit() {
                    match k.code {
                        KeyCode::Char(c) => edit.push(c),
                        KeyCode::Backspace => edit.backspace(),
                        KeyCode::Delete => edit.delete(),
                        KeyCode::Left => edit.left(),
                        KeyCode::Right => edit.right(),
                        KeyCode::Home => edit.home(),
                        KeyCode::End => edit.end(),
                        _ => {}
                    }
                }
            }
        }
    }

    fn submit_form(&mut self) {
        match self.form.validate() {
            Ok(dto) => {
                self.form.error = None;
                self.form.loading = true;
                self.enqueue(Effect::CreateTransaction(dto));
            }
            Err(msg) => self.form.error = Some(msg),
        }
    }
}

fn is_global_key(code: KeyCode) -> bool {
    matches!(code, KeyCode::Char('q' | '?' | 'L' | '1' | '2' | '3'))
}
