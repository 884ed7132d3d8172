use std::{
    io,
    time::{Duration, Instant},
};

use anyhow::{Context, Result};
use busbook_core::{
    fare::{self, format_lkr, FareQuote},
    models::{Booking, NewBooking, Trip, TripQuery, User},
    validation::{self, SignupForm},
    ActivitySignal, AdminSection, ApiClient, ApiEvent, AppConfig, GuardOutcome, SessionManager,
    SessionNotice, SessionState, View,
};
use crossterm::{
    event::{
        DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEvent, KeyEventKind,
        KeyModifiers, MouseEventKind,
    },
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, List, ListItem, ListState, Paragraph, Wrap},
    Frame, Terminal,
};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::{
    admin::{AdminKey, AdminState},
    event::{spawn_input_thread, AppEvent, Outcome, Tasks},
    form::{format_local, Form, FormKey, TextField},
    theme::Theme,
};

const REDIRECT_DELAY: Duration = Duration::from_secs(3);
const RESET_SENT: &str = "If an account with that email exists, a password reset link has been sent.";

/// Inline result shown under a form.
#[derive(Debug, Clone)]
enum Feedback {
    Success(String),
    Error(String),
}

/// Booking screen state for one trip.
struct BookingDraft {
    trip_id: u64,
    trip: Option<Trip>,
    start: usize,
    end: usize,
    seats: u32,
    /// 0 boarding, 1 drop-off, 2 seats, then one per passenger field.
    focus: usize,
    passenger: Form,
    submitting: bool,
    confirmed: Option<Booking>,
    feedback: Option<Feedback>,
}

impl BookingDraft {
    const FIXED_ROWS: usize = 3;

    fn new(trip_id: u64, user: Option<&User>) -> Self {
        let mut passenger = Form::new(vec![
            TextField::new("Full name"),
            TextField::new("Email"),
            TextField::new("Phone"),
        ]);
        if let Some(user) = user {
            passenger.set(0, user.name.clone());
            passenger.set(1, user.email.clone());
        }
        Self {
            trip_id,
            trip: None,
            start: 0,
            end: 0,
            seats: 1,
            focus: 0,
            passenger,
            submitting: false,
            confirmed: None,
            feedback: None,
        }
    }

    fn load(&mut self, trip: Trip, default_capacity: u32) {
        if let Some((first, last)) = fare::default_section(&trip.stops) {
            self.start = trip.stops.iter().position(|s| *s == first).unwrap_or(0);
            self.end = trip.stops.iter().position(|s| *s == last).unwrap_or(0);
        }
        self.trip = Some(trip);
        self.seats = fare::clamp_seats(self.seats, self.capacity(default_capacity));
    }

    fn stops(&self) -> &[String] {
        self.trip.as_ref().map_or(&[], |trip| trip.stops.as_slice())
    }

    fn capacity(&self, default_capacity: u32) -> u32 {
        self.trip
            .as_ref()
            .and_then(Trip::capacity)
            .unwrap_or(default_capacity)
    }

    fn start_stop(&self) -> Option<&str> {
        self.stops().get(self.start).map(String::as_str)
    }

    fn end_stop(&self) -> Option<&str> {
        self.stops().get(self.end).map(String::as_str)
    }

    fn quote(&self) -> Option<FareQuote> {
        let trip = self.trip.as_ref()?;
        Some(fare::quote(
            &trip.stops,
            trip.price,
            self.start_stop().unwrap_or(""),
            self.end_stop().unwrap_or(""),
            self.seats,
        ))
    }

    fn section_is_priced(&self) -> bool {
        self.stops().len() >= 2 && self.start < self.end
    }

    fn rows(&self) -> usize {
        Self::FIXED_ROWS + self.passenger.fields.len()
    }

    fn move_focus(&mut self, delta: isize) {
        let rows = self.rows() as isize;
        self.focus = (self.focus as isize + delta).rem_euclid(rows) as usize;
        if self.focus >= Self::FIXED_ROWS {
            self.passenger.focus = self.focus - Self::FIXED_ROWS;
        }
    }

    fn adjust(&mut self, key: &KeyEvent, default_capacity: u32) {
        let delta: i64 = match key.code {
            KeyCode::Left | KeyCode::Char('-') => -1,
            KeyCode::Right | KeyCode::Char('+') => 1,
            _ => 0,
        };
        let stop_count = self.stops().len();
        match self.focus {
            0 | 1 if stop_count > 0 && delta != 0 => {
                let slot = if self.focus == 0 {
                    &mut self.start
                } else {
                    &mut self.end
                };
                *slot = (*slot as i64 + delta).rem_euclid(stop_count as i64) as usize;
            }
            2 if delta != 0 => {
                let requested = (i64::from(self.seats) + delta).max(0) as u32;
                self.seats = fare::clamp_seats(requested, self.capacity(default_capacity));
            }
            focus if focus >= Self::FIXED_ROWS => {
                if let Some(field) = self.passenger.fields.get_mut(focus - Self::FIXED_ROWS) {
                    field.handle_key(key);
                }
            }
            _ => {}
        }
    }

    fn validate(&self) -> Result<(), String> {
        if self.passenger.any_blank() {
            return Err("Please fill in all passenger details".to_string());
        }
        if !validation::is_plausible_email(self.passenger.value(1)) {
            return Err("Please enter a valid email address".to_string());
        }
        Ok(())
    }

    fn request(&self, user_id: u64) -> NewBooking {
        let has_section = self.stops().len() >= 2;
        NewBooking {
            user_id,
            trip_id: self.trip_id,
            seats: self.seats,
            start_stop: self.start_stop().filter(|_| has_section).map(str::to_string),
            end_stop: self.end_stop().filter(|_| has_section).map(str::to_string),
        }
    }
}

/// Terminal front end for searching and booking bus trips.
pub struct BusBookApp {
    config: AppConfig,
    api: ApiClient,
    session: SessionManager,
    tasks: Tasks,
    event_tx: mpsc::Sender<AppEvent>,
    event_rx: Option<mpsc::Receiver<AppEvent>>,
    theme: Theme,
    view: View,
    snapshot: SessionState,
    pending_view: Option<View>,
    after_login: Option<View>,
    redirect: Option<(Instant, View)>,
    status: String,
    feedback: Option<Feedback>,
    busy: bool,
    should_quit: bool,
    search: Form,
    query: TripQuery,
    trips: Vec<Trip>,
    trip_cursor: usize,
    trips_loading: bool,
    booking: Option<BookingDraft>,
    login: Form,
    signup: Form,
    forgot: Form,
    reset: Form,
    verify: Form,
    admin: AdminState,
}

impl BusBookApp {
    pub fn new(config: AppConfig, api: ApiClient, session: SessionManager) -> Self {
        let (event_tx, event_rx) = mpsc::channel::<AppEvent>(128);
        let tasks = Tasks::new(api.clone(), event_tx.clone());
        let snapshot = session.snapshot();
        Self {
            config,
            api,
            session,
            tasks,
            event_tx,
            event_rx: Some(event_rx),
            theme: Theme::default(),
            view: View::Home,
            snapshot,
            pending_view: None,
            after_login: None,
            redirect: None,
            status: "Checking your session…".to_string(),
            feedback: None,
            busy: false,
            should_quit: false,
            search: Form::new(vec![
                TextField::new("From"),
                TextField::new("To"),
                TextField::new("Date (YYYY-MM-DD)"),
            ]),
            query: TripQuery::default(),
            trips: Vec::new(),
            trip_cursor: 0,
            trips_loading: false,
            booking: None,
            login: Form::new(vec![TextField::new("Email"), TextField::masked("Password")]),
            signup: Form::new(vec![
                TextField::new("Full name"),
                TextField::new("Email"),
                TextField::masked("Password"),
                TextField::masked("Confirm password"),
            ]),
            forgot: Form::new(vec![TextField::new("Email")]),
            reset: Form::new(vec![
                TextField::new("Reset token"),
                TextField::masked("New password"),
                TextField::masked("Confirm password"),
            ]),
            verify: Form::new(vec![TextField::new("Verification token")]),
            admin: AdminState::default(),
        }
    }

    pub async fn run(&mut self) -> Result<()> {
        let mut event_rx = self
            .event_rx
            .take()
            .context("event loop already running")?;
        let mut session_rx = self.session.subscribe();
        let mut notices = self.session.notices();
        let mut api_events = self.api.subscribe();

        let mut stdout = io::stdout();
        enable_raw_mode().context("failed to enter raw mode")?;
        execute!(stdout, EnterAlternateScreen, EnableMouseCapture)
            .context("failed to enter alternate screen")?;
        let backend = CrosstermBackend::new(stdout);
        let mut terminal = Terminal::new(backend).context("failed to create terminal")?;
        terminal.hide_cursor()?;
        terminal.clear()?;

        spawn_input_thread(self.event_tx.clone());

        loop {
            terminal.draw(|frame| self.draw(frame))?;
            if self.should_quit {
                break;
            }

            tokio::select! {
                maybe_event = event_rx.recv() => {
                    if !self.process_app_event(maybe_event) {
                        break;
                    }
                }
                Ok(()) = session_rx.changed() => {
                    let state = session_rx.borrow_and_update().clone();
                    self.on_session_change(state);
                }
                Ok(notice) = notices.recv() => self.on_session_notice(notice),
                Ok(event) = api_events.recv() => self.on_api_event(event),
            }
        }

        restore_terminal(&mut terminal)?;
        Ok(())
    }

    fn process_app_event(&mut self, maybe_event: Option<AppEvent>) -> bool {
        match maybe_event {
            Some(AppEvent::Input(event)) => {
                self.record_activity(&event);
                self.handle_input(event);
                true
            }
            Some(AppEvent::Tick) => {
                self.handle_tick();
                true
            }
            Some(AppEvent::Completed(outcome)) => {
                self.apply_outcome(outcome);
                true
            }
            None => false,
        }
    }

    fn record_activity(&self, event: &Event) {
        let signal = match event {
            Event::Key(_) => ActivitySignal::KeyPress,
            Event::Mouse(mouse) => match mouse.kind {
                MouseEventKind::Moved | MouseEventKind::Drag(_) => ActivitySignal::PointerMove,
                MouseEventKind::Down(_) => ActivitySignal::Click,
                MouseEventKind::Up(_) => return,
                _ => ActivitySignal::Scroll,
            },
            _ => return,
        };
        self.session.record_activity(signal);
    }

    fn handle_tick(&mut self) {
        let due = matches!(self.redirect, Some((at, _)) if Instant::now() >= at);
        if due {
            if let Some((_, view)) = self.redirect.take() {
                self.navigate(view);
            }
        }
    }

    // Navigation

    fn navigate(&mut self, view: View) {
        match busbook_core::evaluate(view.policy(), &self.snapshot) {
            GuardOutcome::Render => self.enter(view),
            GuardOutcome::Loading => {
                debug!(%view, "navigation deferred until session resolves");
                self.pending_view = Some(view);
                self.status = "Checking your session…".to_string();
            }
            GuardOutcome::Redirect(target) => {
                debug!(requested = %view, redirect = %target, "navigation redirected");
                if target == View::Login {
                    self.after_login = Some(view);
                    self.status = "Please log in to continue".to_string();
                } else {
                    self.status = "Admin access required".to_string();
                }
                self.enter(target);
            }
        }
    }

    fn enter(&mut self, view: View) {
        self.redirect = None;
        if self.view != view {
            self.feedback = None;
        }
        match &view {
            View::Trips => self.load_trips(),
            View::Booking { trip_id } => self.open_booking(*trip_id),
            View::Admin(section) => self.admin.open(*section, &self.tasks),
            _ => {}
        }
        self.view = view;
    }

    fn on_session_change(&mut self, state: SessionState) {
        let resolved_now = self.snapshot.loading && !state.loading;
        self.snapshot = state;
        if resolved_now {
            self.status = match &self.snapshot.user {
                Some(user) => format!("Welcome back, {}", user.name),
                None => "Ready".to_string(),
            };
        }

        if let Some(view) = self.pending_view.take() {
            self.navigate(view);
            return;
        }
        let allowed = busbook_core::evaluate(self.view.policy(), &self.snapshot);
        if allowed != GuardOutcome::Render {
            let current = self.view.clone();
            self.navigate(current);
        }
    }

    fn on_session_notice(&mut self, notice: SessionNotice) {
        match notice {
            SessionNotice::Expired => {
                self.snapshot = self.session.snapshot();
                let minutes = self.config.inactivity_timeout_secs / 60;
                self.status = format!("Logged out after {minutes} minutes of inactivity");
                if let Some(target) = self.view.expiry_redirect() {
                    self.after_login = None;
                    self.enter(target);
                }
            }
        }
    }

    fn on_api_event(&mut self, event: ApiEvent) {
        match event {
            ApiEvent::Unauthorized => {
                warn!(view = %self.view, "server rejected the stored credential");
                self.session.logout();
                self.snapshot = self.session.snapshot();
                self.busy = false;
                if self.view != View::Login {
                    self.status = "Your session has expired. Please log in again.".to_string();
                    self.enter(View::Login);
                }
            }
        }
    }

    fn logout(&mut self) {
        if !self.snapshot.is_authenticated {
            return;
        }
        self.session.logout();
        self.snapshot = self.session.snapshot();
        self.after_login = None;
        self.status = "You have been logged out".to_string();
        self.enter(View::Home);
    }

    // Requests

    fn load_trips(&mut self) {
        self.trips_loading = true;
        let query = self.query.clone();
        self.tasks
            .spawn(|api| async move { Outcome::Trips(api.trips(&query).await) });
    }

    fn open_booking(&mut self, trip_id: u64) {
        self.booking = Some(BookingDraft::new(trip_id, self.snapshot.user.as_ref()));
        self.tasks
            .spawn(move |api| async move { Outcome::Trip(trip_id, api.trip(trip_id).await) });
    }

    fn apply_outcome(&mut self, outcome: Outcome) {
        match outcome {
            Outcome::Trips(result) => {
                self.trips_loading = false;
                match result {
                    Ok(trips) => {
                        self.status = format!("Found {} trips", trips.len());
                        self.trips = trips;
                        self.trip_cursor = 0;
                    }
                    Err(err) => {
                        self.trips.clear();
                        self.feedback = Some(Feedback::Error(err.user_message()));
                    }
                }
            }
            Outcome::Trip(trip_id, result) => {
                let capacity = self.config.default_capacity;
                let Some(draft) = self.booking.as_mut().filter(|d| d.trip_id == trip_id) else {
                    return;
                };
                match result {
                    Ok(trip) => draft.load(trip, capacity),
                    Err(err) => draft.feedback = Some(Feedback::Error(err.user_message())),
                }
            }
            Outcome::Booked(result) => {
                let Some(draft) = self.booking.as_mut() else {
                    return;
                };
                draft.submitting = false;
                match result {
                    Ok(booking) => {
                        info!(booking_id = booking.id, trip_id = booking.trip_id, "booking created");
                        draft.feedback = Some(Feedback::Success(
                            "Booking confirmed! Returning to search…".to_string(),
                        ));
                        draft.confirmed = Some(booking);
                        self.redirect = Some((Instant::now() + REDIRECT_DELAY, View::Home));
                    }
                    Err(err) => draft.feedback = Some(Feedback::Error(err.user_message())),
                }
            }
            Outcome::LoggedIn(result) => {
                self.busy = false;
                match result {
                    Ok(auth) => {
                        let is_admin = auth.user.is_admin();
                        let name = auth.user.name.clone();
                        match self.session.establish(&auth.token, auth.user) {
                            Ok(()) => {
                                self.snapshot = self.session.snapshot();
                                self.login.clear();
                                self.status = format!("Welcome, {name}");
                                let fallback = if is_admin {
                                    View::Admin(AdminSection::Dashboard)
                                } else {
                                    View::Home
                                };
                                let target = self.after_login.take().unwrap_or(fallback);
                                self.navigate(target);
                            }
                            Err(err) => {
                                warn!(%err, "failed to persist credential");
                                self.feedback =
                                    Some(Feedback::Error(format!("Could not save your login: {err}")));
                            }
                        }
                    }
                    Err(err) => self.feedback = Some(Feedback::Error(err.user_message())),
                }
            }
            Outcome::Registered(result) => {
                self.busy = false;
                self.feedback = Some(match result {
                    Ok(()) => {
                        self.signup.clear();
                        Feedback::Success(
                            "Registration successful! Please check your email to verify your account."
                                .to_string(),
                        )
                    }
                    Err(err) => Feedback::Error(err.user_message()),
                });
            }
            Outcome::ResetRequested(result) => {
                self.busy = false;
                self.feedback = Some(match result {
                    Ok(message) => Feedback::Success(message.unwrap_or_else(|| RESET_SENT.to_string())),
                    Err(err) => Feedback::Error(err.user_message()),
                });
            }
            Outcome::PasswordReset(result) => {
                self.busy = false;
                match result {
                    Ok(_) => {
                        self.reset.clear();
                        self.feedback = Some(Feedback::Success(
                            "Your password has been reset successfully. You can now log in."
                                .to_string(),
                        ));
                        self.redirect = Some((Instant::now() + REDIRECT_DELAY, View::Login));
                    }
                    Err(err) => self.feedback = Some(Feedback::Error(err.user_message())),
                }
            }
            Outcome::Verified(result) => {
                self.busy = false;
                match result {
                    Ok(response) => {
                        let target = match (response.token, response.user) {
                            (Some(token), Some(user)) => {
                                match self.session.establish(&token, user) {
                                    Ok(()) => {
                                        self.snapshot = self.session.snapshot();
                                        self.feedback = Some(Feedback::Success(
                                            "Email verified successfully! You have been logged in."
                                                .to_string(),
                                        ));
                                        View::Home
                                    }
                                    Err(err) => {
                                        warn!(%err, "failed to persist credential");
                                        self.feedback = Some(Feedback::Success(
                                            "Email verified successfully! Please login to continue."
                                                .to_string(),
                                        ));
                                        View::Login
                                    }
                                }
                            }
                            _ => {
                                self.feedback = Some(Feedback::Success(
                                    "Email verified successfully! Please login to continue."
                                        .to_string(),
                                ));
                                View::Login
                            }
                        };
                        self.verify.clear();
                        self.redirect = Some((Instant::now() + REDIRECT_DELAY, target));
                    }
                    Err(err) => self.feedback = Some(Feedback::Error(err.user_message())),
                }
            }
            Outcome::Admin(outcome) => {
                if let Some(status) = self.admin.apply(outcome, &self.tasks) {
                    self.status = status;
                }
            }
        }
    }

    // Input

    fn handle_input(&mut self, event: Event) {
        let Event::Key(key) = event else {
            return;
        };
        if key.kind != KeyEventKind::Press {
            return;
        }
        if self.handle_global_key(&key) {
            return;
        }
        match self.view.clone() {
            View::Home => self.handle_search_key(&key),
            View::Trips => self.handle_trips_key(&key),
            View::Booking { .. } => self.handle_booking_key(&key),
            View::Login => self.handle_login_key(&key),
            View::Signup => self.handle_signup_key(&key),
            View::ForgotPassword => self.handle_forgot_key(&key),
            View::ResetPassword => self.handle_reset_key(&key),
            View::VerifyEmail => self.handle_verify_key(&key),
            View::Admin(_) => match self.admin.handle_key(&key, &self.tasks) {
                AdminKey::Handled => {}
                AdminKey::Open(section) => self.navigate(View::Admin(section)),
                AdminKey::Leave => self.navigate(View::Home),
            },
        }
    }

    fn handle_global_key(&mut self, key: &KeyEvent) -> bool {
        if key.modifiers == KeyModifiers::CONTROL {
            if let KeyCode::Char('c' | 'q') = key.code {
                self.should_quit = true;
                return true;
            }
        }
        let target = match key.code {
            KeyCode::F(1) => View::Home,
            KeyCode::F(2) => View::Trips,
            KeyCode::F(3) => View::Login,
            KeyCode::F(4) => View::Signup,
            KeyCode::F(5) => View::Admin(AdminSection::Dashboard),
            KeyCode::F(6) => View::ForgotPassword,
            KeyCode::F(7) => View::ResetPassword,
            KeyCode::F(8) => View::VerifyEmail,
            KeyCode::F(10) => {
                self.logout();
                return true;
            }
            _ => return false,
        };
        self.navigate(target);
        true
    }

    fn handle_search_key(&mut self, key: &KeyEvent) {
        if self.search.handle_key(key) == FormKey::Submit {
            self.query = TripQuery::from_form(
                self.search.value(0),
                self.search.value(1),
                self.search.value(2),
            );
            info!(
                origin = self.query.origin.as_deref().unwrap_or(""),
                destination = self.query.destination.as_deref().unwrap_or(""),
                date = self.query.date.as_deref().unwrap_or(""),
                "searching trips"
            );
            self.navigate(View::Trips);
        }
    }

    fn handle_trips_key(&mut self, key: &KeyEvent) {
        match key.code {
            KeyCode::Up | KeyCode::Char('k') => {
                self.trip_cursor = self.trip_cursor.saturating_sub(1);
            }
            KeyCode::Down | KeyCode::Char('j') => {
                self.trip_cursor = (self.trip_cursor + 1).min(self.trips.len().saturating_sub(1));
            }
            KeyCode::Char('r') => self.load_trips(),
            KeyCode::Enter => {
                if let Some(trip) = self.trips.get(self.trip_cursor) {
                    let trip_id = trip.id;
                    self.navigate(View::Booking { trip_id });
                }
            }
            KeyCode::Esc => self.navigate(View::Home),
            _ => {}
        }
    }

    fn handle_booking_key(&mut self, key: &KeyEvent) {
        let capacity = self.config.default_capacity;
        let Some(draft) = self.booking.as_mut() else {
            return;
        };
        if key.code == KeyCode::Esc {
            self.navigate(View::Trips);
            return;
        }
        if draft.confirmed.is_some() {
            if key.code == KeyCode::Enter {
                self.navigate(View::Home);
            }
            return;
        }
        match key.code {
            KeyCode::Tab | KeyCode::Down => draft.move_focus(1),
            KeyCode::BackTab | KeyCode::Up => draft.move_focus(-1),
            KeyCode::Enter => self.submit_booking(),
            _ => draft.adjust(key, capacity),
        }
    }

    fn submit_booking(&mut self) {
        let Some(user_id) = self.snapshot.user.as_ref().map(|user| user.id) else {
            self.navigate(View::Login);
            return;
        };
        let Some(draft) = self.booking.as_mut() else {
            return;
        };
        if draft.submitting || draft.trip.is_none() {
            return;
        }
        if let Err(message) = draft.validate() {
            draft.feedback = Some(Feedback::Error(message));
            return;
        }
        let request = draft.request(user_id);
        draft.submitting = true;
        draft.feedback = None;
        info!(
            trip_id = request.trip_id,
            seats = request.seats,
            start = request.start_stop.as_deref().unwrap_or(""),
            end = request.end_stop.as_deref().unwrap_or(""),
            "submitting booking"
        );
        self.tasks
            .spawn(|api| async move { Outcome::Booked(api.create_booking(&request).await) });
    }

    fn handle_login_key(&mut self, key: &KeyEvent) {
        match self.login.handle_key(key) {
            FormKey::Submit if !self.busy => {
                if self.login.value(0).is_empty() || self.login.raw(1).is_empty() {
                    self.feedback = Some(Feedback::Error("Please fill in all fields".to_string()));
                    return;
                }
                self.busy = true;
                self.feedback = None;
                let email = self.login.value(0).to_string();
                let password = self.login.raw(1).to_string();
                self.tasks.spawn(|api| async move {
                    Outcome::LoggedIn(api.login(&email, &password).await)
                });
            }
            FormKey::Cancel => self.navigate(View::Home),
            _ => {}
        }
    }

    fn handle_signup_key(&mut self, key: &KeyEvent) {
        match self.signup.handle_key(key) {
            FormKey::Submit if !self.busy => {
                let form = SignupForm {
                    name: self.signup.value(0).to_string(),
                    email: self.signup.value(1).to_string(),
                    password: self.signup.raw(2).to_string(),
                    confirm_password: self.signup.raw(3).to_string(),
                };
                if let Err(message) = validation::validate_signup(&form) {
                    self.feedback = Some(Feedback::Error(message));
                    return;
                }
                self.busy = true;
                self.feedback = None;
                self.tasks.spawn(|api| async move {
                    Outcome::Registered(api.register(&form.name, &form.email, &form.password).await)
                });
            }
            FormKey::Cancel => self.navigate(View::Login),
            _ => {}
        }
    }

    fn handle_forgot_key(&mut self, key: &KeyEvent) {
        match self.forgot.handle_key(key) {
            FormKey::Submit if !self.busy => {
                let email = self.forgot.value(0).to_string();
                if email.is_empty() {
                    self.feedback =
                        Some(Feedback::Error("Please enter your email address".to_string()));
                    return;
                }
                self.busy = true;
                self.feedback = None;
                self.tasks.spawn(|api| async move {
                    Outcome::ResetRequested(api.forgot_password(&email).await)
                });
            }
            FormKey::Cancel => self.navigate(View::Login),
            _ => {}
        }
    }

    fn handle_reset_key(&mut self, key: &KeyEvent) {
        match self.reset.handle_key(key) {
            FormKey::Submit if !self.busy => {
                let token = self.reset.value(0).to_string();
                if token.is_empty() {
                    self.feedback =
                        Some(Feedback::Error("Invalid or missing reset token".to_string()));
                    return;
                }
                let (password, confirm) = (self.reset.raw(1), self.reset.raw(2));
                if password.is_empty() || confirm.is_empty() {
                    self.feedback =
                        Some(Feedback::Error("Please fill in both password fields".to_string()));
                    return;
                }
                if let Err(message) = validation::validate_new_password(password, confirm) {
                    self.feedback = Some(Feedback::Error(message));
                    return;
                }
                let password = password.to_string();
                self.busy = true;
                self.feedback = None;
                self.tasks.spawn(|api| async move {
                    Outcome::PasswordReset(api.reset_password(&token, &password).await)
                });
            }
            FormKey::Cancel => self.navigate(View::Login),
            _ => {}
        }
    }

    fn handle_verify_key(&mut self, key: &KeyEvent) {
        match self.verify.handle_key(key) {
            FormKey::Submit if !self.busy => {
                let token = self.verify.value(0).to_string();
                if token.is_empty() {
                    self.feedback =
                        Some(Feedback::Error("Invalid verification link".to_string()));
                    return;
                }
                self.busy = true;
                self.feedback = None;
                self.tasks.spawn(|api| async move {
                    Outcome::Verified(api.verify_email(&token).await)
                });
            }
            FormKey::Cancel => self.navigate(View::Home),
            _ => {}
        }
    }

    // Drawing

    fn draw(&mut self, frame: &mut Frame) {
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(3),
                Constraint::Min(8),
                Constraint::Length(4),
            ])
            .split(frame.size());

        self.render_header(frame, chunks[0]);
        let body = chunks[1];
        match self.view.clone() {
            View::Home => self.draw_search(frame, body),
            View::Trips => self.draw_trips(frame, body),
            View::Booking { .. } => self.draw_booking(frame, body),
            View::Login => self.draw_auth_form(
                frame,
                body,
                &self.login,
                "Login",
                "Enter log in · F4 sign up · F6 forgot password",
            ),
            View::Signup => self.draw_auth_form(
                frame,
                body,
                &self.signup,
                "Sign Up",
                "Enter create account · Esc back to login",
            ),
            View::ForgotPassword => self.draw_auth_form(
                frame,
                body,
                &self.forgot,
                "Forgot Password",
                "Enter send reset link · F7 enter reset token",
            ),
            View::ResetPassword => self.draw_auth_form(
                frame,
                body,
                &self.reset,
                "Reset Password",
                "Paste the token from your email · Enter reset",
            ),
            View::VerifyEmail => self.draw_auth_form(
                frame,
                body,
                &self.verify,
                "Verify Email",
                "Paste the token from your email · Enter verify",
            ),
            View::Admin(_) => self.admin.draw(frame, body, &self.theme),
        }
        self.render_status(frame, chunks[2]);
    }

    fn render_header(&self, frame: &mut Frame, area: Rect) {
        let who = if self.snapshot.loading {
            Span::styled("checking session…", Style::default().fg(self.theme.muted))
        } else {
            match &self.snapshot.user {
                Some(user) if self.snapshot.is_admin() => Span::styled(
                    format!("{} (admin)", user.name),
                    Style::default().fg(self.theme.warning),
                ),
                Some(user) => Span::styled(user.name.clone(), Style::default().fg(self.theme.success)),
                None => Span::styled("guest", Style::default().fg(self.theme.muted)),
            }
        };
        let line = Line::from(vec![
            Span::styled("BusBook", self.theme.heading()),
            Span::raw("  ·  "),
            Span::raw(self.view.to_string()),
            Span::raw("  ·  "),
            who,
        ]);
        frame.render_widget(
            Paragraph::new(line).block(Block::default().borders(Borders::ALL)),
            area,
        );
    }

    fn render_status(&self, frame: &mut Frame, area: Rect) {
        let prompt = match self.view {
            View::Admin(_) => self.admin.prompt(),
            _ => None,
        };
        let primary = match prompt {
            Some(prompt) => Line::from(Span::styled(prompt, Style::default().fg(self.theme.warning))),
            None => Line::from(self.status.clone()),
        };
        let keys = if self.snapshot.is_authenticated {
            "F1 search · F2 trips · F5 admin · F10 log out · Ctrl+Q quit"
        } else {
            "F1 search · F2 trips · F3 log in · F4 sign up · F8 verify email · Ctrl+Q quit"
        };
        let paragraph = Paragraph::new(vec![
            primary,
            Line::from(Span::styled(keys, Style::default().fg(self.theme.muted))),
        ])
        .block(Block::default().borders(Borders::ALL).title("Status"))
        .wrap(Wrap { trim: true });
        frame.render_widget(paragraph, area);
    }

    fn feedback_line(&self, feedback: Option<&Feedback>) -> Line<'static> {
        match feedback {
            Some(Feedback::Success(text)) => {
                Line::from(Span::styled(text.clone(), Style::default().fg(self.theme.success)))
            }
            Some(Feedback::Error(text)) => {
                Line::from(Span::styled(text.clone(), Style::default().fg(self.theme.danger)))
            }
            None => Line::from(""),
        }
    }

    fn draw_search(&self, frame: &mut Frame, area: Rect) {
        let panel = centered_rect(64, 12, area);
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Length(8), Constraint::Min(2)])
            .split(panel);
        self.search
            .render(frame, chunks[0], "Find your bus", &self.theme, true);
        let help = Paragraph::new(vec![
            Line::from("Leave a field empty to match everything."),
            Line::from(Span::styled(
                "Tab next field · Enter search",
                Style::default().fg(self.theme.muted),
            )),
        ])
        .alignment(Alignment::Center);
        frame.render_widget(help, chunks[1]);
    }

    fn draw_trips(&self, frame: &mut Frame, area: Rect) {
        let chunks = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Percentage(55), Constraint::Percentage(45)])
            .split(area);

        let title = if self.trips_loading {
            "Available Trips (loading…)".to_string()
        } else {
            format!("Available Trips ({})", self.trips.len())
        };
        let items: Vec<ListItem> = self
            .trips
            .iter()
            .map(|trip| {
                ListItem::new(Line::from(vec![
                    Span::styled(
                        format!("{} → {}", trip.origin, trip.destination),
                        Style::default().add_modifier(Modifier::BOLD),
                    ),
                    Span::raw(format!("  {}  ", format_local(&trip.departure_time))),
                    Span::styled(format_lkr(trip.price), self.theme.price()),
                ]))
            })
            .collect();
        let mut list_state = ListState::default();
        if !items.is_empty() {
            list_state.select(Some(self.trip_cursor.min(items.len() - 1)));
        }
        let list = List::new(items)
            .block(Block::default().borders(Borders::ALL).title(title))
            .highlight_style(Style::default().bg(self.theme.selection_bg))
            .highlight_symbol("▶ ");
        frame.render_stateful_widget(list, chunks[0], &mut list_state);

        let mut lines = match self.trips.get(self.trip_cursor) {
            Some(trip) => trip_summary(trip, &self.theme),
            None if self.trips_loading => vec![Line::from("Searching…")],
            None => vec![
                Line::from("No trips found."),
                Line::from("Try adjusting your search criteria."),
            ],
        };
        lines.push(Line::from(""));
        lines.push(self.feedback_line(self.feedback.as_ref()));
        lines.push(Line::from(Span::styled(
            "Enter book · r refresh · Esc new search",
            Style::default().fg(self.theme.muted),
        )));
        frame.render_widget(
            Paragraph::new(lines)
                .block(Block::default().borders(Borders::ALL).title("Trip details"))
                .wrap(Wrap { trim: true }),
            chunks[1],
        );
    }

    fn draw_booking(&self, frame: &mut Frame, area: Rect) {
        let Some(draft) = self.booking.as_ref() else {
            return;
        };
        let chunks = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Percentage(60), Constraint::Percentage(40)])
            .split(area);
        let left = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Length(9), Constraint::Min(8)])
            .split(chunks[0]);

        let Some(trip) = draft.trip.as_ref() else {
            let text = match &draft.feedback {
                Some(feedback) => vec![self.feedback_line(Some(feedback))],
                None => vec![Line::from("Loading trip details…")],
            };
            frame.render_widget(
                Paragraph::new(text).block(Block::default().borders(Borders::ALL).title("Booking")),
                area,
            );
            return;
        };

        let selector = |row: usize, label: &str, value: String| {
            let active = draft.focus == row && draft.confirmed.is_none();
            let style = if active {
                self.theme.heading()
            } else {
                Style::default().fg(self.theme.muted)
            };
            Line::from(vec![
                Span::styled(if active { "▶ " } else { "  " }, style),
                Span::styled(format!("{label:<10}"), style),
                Span::raw(format!("◀ {value} ▶")),
            ])
        };
        let stop_or_route = |stop: Option<&str>, fallback: &str| {
            stop.map(str::to_string).unwrap_or_else(|| fallback.to_string())
        };
        let capacity = draft.capacity(self.config.default_capacity);
        let mut section = vec![
            Line::from(Span::styled(
                format!("{} → {}", trip.origin, trip.destination),
                self.theme.heading(),
            )),
            Line::from(""),
            selector(0, "Boarding", stop_or_route(draft.start_stop(), &trip.origin)),
            selector(1, "Drop-off", stop_or_route(draft.end_stop(), &trip.destination)),
            selector(2, "Seats", format!("{} of {capacity}", draft.seats)),
        ];
        if draft.stops().len() >= 2 && !draft.section_is_priced() {
            section.push(Line::from(Span::styled(
                "Drop-off must come after boarding; the full route price applies.",
                Style::default().fg(self.theme.warning),
            )));
        }
        frame.render_widget(
            Paragraph::new(section)
                .block(Block::default().borders(Borders::ALL).title("Journey"))
                .wrap(Wrap { trim: true }),
            left[0],
        );

        let passenger_focused =
            draft.confirmed.is_none() && draft.focus >= BookingDraft::FIXED_ROWS;
        draft
            .passenger
            .render(frame, left[1], "Passenger details", &self.theme, passenger_focused);

        let mut summary = trip_summary(trip, &self.theme);
        summary.push(Line::from(""));
        if let Some(quote) = draft.quote() {
            summary.push(Line::from(vec![
                Span::raw("Price per seat  "),
                Span::styled(format_lkr(quote.price_per_seat), self.theme.price()),
            ]));
            summary.push(Line::from(format!("Seats           {}", draft.seats)));
            summary.push(Line::from(vec![
                Span::styled("Total           ", Style::default().add_modifier(Modifier::BOLD)),
                Span::styled(format_lkr(quote.total), self.theme.price()),
            ]));
        }
        summary.push(Line::from(""));
        if draft.submitting {
            summary.push(Line::from("Submitting booking…"));
        }
        summary.push(self.feedback_line(draft.feedback.as_ref()));
        if let Some(booking) = &draft.confirmed {
            summary.push(Line::from(format!("Booking reference #{}", booking.id)));
        }
        summary.push(Line::from(Span::styled(
            "Tab next · ◀ ▶ change · Enter confirm · Esc back",
            Style::default().fg(self.theme.muted),
        )));
        frame.render_widget(
            Paragraph::new(summary)
                .block(Block::default().borders(Borders::ALL).title("Booking summary"))
                .wrap(Wrap { trim: true }),
            chunks[1],
        );
    }

    fn draw_auth_form(&self, frame: &mut Frame, area: Rect, form: &Form, title: &str, hint: &str) {
        let height = (form.fields.len() as u16) * 2 + 2;
        let panel = centered_rect(64, height + 4, area);
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Length(height), Constraint::Min(2)])
            .split(panel);
        form.render(frame, chunks[0], title, &self.theme, !self.busy);

        let mut lines = vec![self.feedback_line(self.feedback.as_ref())];
        if self.busy {
            lines.push(Line::from("Please wait…"));
        }
        lines.push(Line::from(Span::styled(
            hint.to_string(),
            Style::default().fg(self.theme.muted),
        )));
        frame.render_widget(
            Paragraph::new(lines)
                .alignment(Alignment::Center)
                .wrap(Wrap { trim: true }),
            chunks[1],
        );
    }
}

fn trip_summary(trip: &Trip, theme: &Theme) -> Vec<Line<'static>> {
    let duration = trip.arrival_time - trip.departure_time;
    let mut lines = vec![
        Line::from(Span::styled(
            format!("{} → {}", trip.origin, trip.destination),
            Style::default().add_modifier(Modifier::BOLD),
        )),
        Line::from(format!("Departs   {}", format_local(&trip.departure_time))),
        Line::from(format!("Arrives   {}", format_local(&trip.arrival_time))),
        Line::from(format!(
            "Duration  {}h {:02}m",
            duration.num_hours(),
            duration.num_minutes().rem_euclid(60)
        )),
        Line::from(format!("Bus       {}", trip.bus_label())),
    ];
    if let Some(route) = &trip.route_number {
        lines.push(Line::from(format!("Route     {route}")));
    }
    if !trip.stops.is_empty() {
        lines.push(Line::from(format!("Stops     {}", trip.stops.join(" · "))));
    }
    lines.push(Line::from(vec![
        Span::raw("Full fare "),
        Span::styled(format_lkr(trip.price), theme.price()),
    ]));
    lines
}

fn restore_terminal(terminal: &mut Terminal<CrosstermBackend<io::Stdout>>) -> Result<()> {
    disable_raw_mode().context("failed to disable raw mode")?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen, DisableMouseCapture)
        .context("failed to leave alternate screen")?;
    terminal.show_cursor()?;
    Ok(())
}

pub(crate) fn centered_rect(width: u16, height: u16, area: Rect) -> Rect {
    let width = width.min(area.width);
    let height = height.min(area.height);
    let x = area.x + (area.width.saturating_sub(width)) / 2;
    let y = area.y + (area.height.saturating_sub(height)) / 2;
    Rect::new(x, y, width, height)
}

#[cfg(test)]
mod tests {
    use super::*;
    use busbook_core::models::{Bus, BusType};
    use chrono::{TimeZone, Utc};

    fn trip(stops: &[&str], seats: Option<u32>) -> Trip {
        Trip {
            id: 11,
            origin: "Colombo".to_string(),
            destination: "Kandy".to_string(),
            departure_time: Utc.with_ymd_and_hms(2025, 3, 1, 2, 30, 0).unwrap(),
            arrival_time: Utc.with_ymd_and_hms(2025, 3, 1, 5, 45, 0).unwrap(),
            price: 600.0,
            bus_id: 2,
            route_number: Some("1".to_string()),
            stops: stops.iter().map(|s| s.to_string()).collect(),
            bus: seats.map(|total_seats| Bus {
                id: 2,
                number_plate: "NB-4521".to_string(),
                name: None,
                bus_type: BusType::AC,
                company: None,
                total_seats,
            }),
        }
    }

    fn press(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    #[test]
    fn draft_preselects_full_route() {
        let mut draft = BookingDraft::new(11, None);
        draft.load(trip(&["Colombo", "Kadawatha", "Kegalle", "Kandy"], Some(40)), 50);
        assert_eq!(draft.start_stop(), Some("Colombo"));
        assert_eq!(draft.end_stop(), Some("Kandy"));
        assert_eq!(draft.quote().unwrap().price_per_seat, 600.0);
    }

    #[test]
    fn changing_section_reprices() {
        let mut draft = BookingDraft::new(11, None);
        draft.load(trip(&["Colombo", "Kadawatha", "Kegalle", "Kandy"], Some(40)), 50);
        draft.focus = 1;
        draft.adjust(&press(KeyCode::Left), 50);
        assert_eq!(draft.end_stop(), Some("Kegalle"));
        assert_eq!(draft.quote().unwrap().price_per_seat, 400.0);

        draft.focus = 2;
        draft.adjust(&press(KeyCode::Right), 50);
        let quote = draft.quote().unwrap();
        assert_eq!(draft.seats, 2);
        assert_eq!(quote.total, 800.0);
    }

    #[test]
    fn seats_stay_within_capacity() {
        let mut draft = BookingDraft::new(11, None);
        draft.load(trip(&[], Some(2)), 50);
        draft.focus = 2;
        for _ in 0..5 {
            draft.adjust(&press(KeyCode::Char('+')), 50);
        }
        assert_eq!(draft.seats, 2);
        for _ in 0..5 {
            draft.adjust(&press(KeyCode::Char('-')), 50);
        }
        assert_eq!(draft.seats, 1);

        let mut unknown = BookingDraft::new(11, None);
        unknown.load(trip(&[], None), 50);
        assert_eq!(unknown.capacity(50), 50);
    }

    #[test]
    fn request_omits_section_without_stops() {
        let mut draft = BookingDraft::new(11, None);
        draft.load(trip(&[], None), 50);
        let request = draft.request(7);
        assert_eq!(request.user_id, 7);
        assert!(request.start_stop.is_none());
        assert_eq!(draft.quote().unwrap().price_per_seat, 600.0);
    }

    #[test]
    fn passenger_details_are_required() {
        let user = User {
            id: 7,
            name: "Ishara".to_string(),
            email: "ishara@example.lk".to_string(),
            role: Default::default(),
            is_verified: None,
            created_at: None,
            total_bookings: None,
        };
        let mut draft = BookingDraft::new(11, Some(&user));
        assert_eq!(
            draft.validate().unwrap_err(),
            "Please fill in all passenger details"
        );
        draft.passenger.set(2, "0771234567");
        assert!(draft.validate().is_ok());
    }
}
