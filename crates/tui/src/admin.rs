use busbook_core::{
    fare::format_lkr,
    models::{
        Booking, BookingStatus, Bus, BusInput, BusType, DashboardStats, Role, Route, RouteInput,
        Trip, TripInput, User, UserDetails, UserUpdate,
    },
    AdminSection, ApiError,
};
use crossterm::event::{KeyCode, KeyEvent};
use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, List, ListItem, ListState, Paragraph, Tabs, Wrap},
    Frame,
};
use tracing::{info, warn};

use crate::{
    app::centered_rect,
    event::{Outcome, Tasks},
    form::{format_local, parse_local, Form, FormKey, TextField},
    theme::Theme,
};

pub enum AdminOutcome {
    Stats(Result<DashboardStats, ApiError>),
    Buses(Result<Vec<Bus>, ApiError>),
    Routes(Result<Vec<Route>, ApiError>),
    Trips(Result<Vec<Trip>, ApiError>),
    Bookings(Result<Vec<Booking>, ApiError>),
    Users(Result<Vec<User>, ApiError>),
    UserDetails(Result<UserDetails, ApiError>),
    Changed {
        done: &'static str,
        result: Result<(), ApiError>,
    },
}

/// What the app should do after an admin key press.
pub enum AdminKey {
    Handled,
    Open(AdminSection),
    Leave,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Target {
    Bus(Option<u64>),
    Route(Option<u64>),
    Trip(Option<u64>),
    User(u64),
}

struct Editor {
    target: Target,
    form: Form,
    error: Option<String>,
}

#[derive(Default)]
pub struct AdminState {
    section: AdminSection,
    stats: Option<DashboardStats>,
    buses: Vec<Bus>,
    routes: Vec<Route>,
    trips: Vec<Trip>,
    bookings: Vec<Booking>,
    users: Vec<User>,
    cursor: usize,
    loading: bool,
    editor: Option<Editor>,
    details: Option<UserDetails>,
    pending_delete: Option<u64>,
}

impl AdminState {
    pub fn open(&mut self, section: AdminSection, tasks: &Tasks) {
        if self.section != section {
            self.cursor = 0;
        }
        self.section = section;
        self.editor = None;
        self.details = None;
        self.pending_delete = None;
        self.reload(tasks);
    }

    pub fn reload(&mut self, tasks: &Tasks) {
        self.loading = true;
        match self.section {
            AdminSection::Dashboard => tasks.spawn(|api| async move {
                Outcome::Admin(AdminOutcome::Stats(api.dashboard_stats().await))
            }),
            AdminSection::Buses => tasks.spawn(|api| async move {
                Outcome::Admin(AdminOutcome::Buses(api.buses().await))
            }),
            AdminSection::Routes => tasks.spawn(|api| async move {
                Outcome::Admin(AdminOutcome::Routes(api.routes().await))
            }),
            AdminSection::Trips => tasks.spawn(|api| async move {
                Outcome::Admin(AdminOutcome::Trips(api.trips(&Default::default()).await))
            }),
            AdminSection::Bookings => tasks.spawn(|api| async move {
                Outcome::Admin(AdminOutcome::Bookings(api.bookings().await))
            }),
            AdminSection::Users => tasks.spawn(|api| async move {
                Outcome::Admin(AdminOutcome::Users(api.users().await))
            }),
        }
    }

    /// Fold a finished request into the state. Returns a status line.
    pub fn apply(&mut self, outcome: AdminOutcome, tasks: &Tasks) -> Option<String> {
        self.loading = false;
        let loaded = |what: &str, count: usize| Some(format!("Loaded {count} {what}"));
        let status = match outcome {
            AdminOutcome::Stats(Ok(stats)) => {
                self.stats = Some(stats);
                None
            }
            AdminOutcome::Buses(Ok(buses)) => {
                self.buses = buses;
                loaded("buses", self.buses.len())
            }
            AdminOutcome::Routes(Ok(routes)) => {
                self.routes = routes;
                loaded("routes", self.routes.len())
            }
            AdminOutcome::Trips(Ok(trips)) => {
                self.trips = trips;
                loaded("trips", self.trips.len())
            }
            AdminOutcome::Bookings(Ok(bookings)) => {
                self.bookings = bookings;
                loaded("bookings", self.bookings.len())
            }
            AdminOutcome::Users(Ok(users)) => {
                self.users = users;
                loaded("users", self.users.len())
            }
            AdminOutcome::UserDetails(Ok(details)) => {
                self.details = Some(details);
                None
            }
            AdminOutcome::Changed { done, result: Ok(()) } => {
                info!(section = self.section.title(), done, "admin change applied");
                self.editor = None;
                self.reload(tasks);
                Some(done.to_string())
            }
            AdminOutcome::Changed { result: Err(err), .. } => {
                let message = err.user_message();
                match self.editor.as_mut() {
                    Some(editor) => editor.error = Some(message.clone()),
                    None => warn!(%err, "admin change failed"),
                }
                Some(message)
            }
            AdminOutcome::Stats(Err(err))
            | AdminOutcome::Buses(Err(err))
            | AdminOutcome::Routes(Err(err))
            | AdminOutcome::Trips(Err(err))
            | AdminOutcome::Bookings(Err(err))
            | AdminOutcome::Users(Err(err))
            | AdminOutcome::UserDetails(Err(err)) => Some(err.user_message()),
        };
        self.cursor = self.cursor.min(self.len().saturating_sub(1));
        status
    }

    fn len(&self) -> usize {
        match self.section {
            AdminSection::Dashboard => self
                .stats
                .as_ref()
                .map_or(0, |stats| stats.recent_bookings.len()),
            AdminSection::Buses => self.buses.len(),
            AdminSection::Routes => self.routes.len(),
            AdminSection::Trips => self.trips.len(),
            AdminSection::Bookings => self.bookings.len(),
            AdminSection::Users => self.users.len(),
        }
    }

    fn selected_id(&self) -> Option<u64> {
        let idx = self.cursor;
        match self.section {
            AdminSection::Dashboard => None,
            AdminSection::Buses => self.buses.get(idx).map(|bus| bus.id),
            AdminSection::Routes => self.routes.get(idx).map(|route| route.id),
            AdminSection::Trips => self.trips.get(idx).map(|trip| trip.id),
            AdminSection::Bookings => self.bookings.get(idx).map(|booking| booking.id),
            AdminSection::Users => self.users.get(idx).map(|user| user.id),
        }
    }

    /// Pending confirmation prompt, if any.
    pub fn prompt(&self) -> Option<String> {
        self.pending_delete
            .map(|id| format!("Delete {} #{id}? Press y to confirm", self.noun()))
    }

    fn noun(&self) -> &'static str {
        match self.section {
            AdminSection::Dashboard => "item",
            AdminSection::Buses => "bus",
            AdminSection::Routes => "route",
            AdminSection::Trips => "trip",
            AdminSection::Bookings => "booking",
            AdminSection::Users => "user",
        }
    }

    pub fn handle_key(&mut self, key: &KeyEvent, tasks: &Tasks) -> AdminKey {
        if self.editor.is_some() {
            self.handle_editor_key(key, tasks);
            return AdminKey::Handled;
        }
        if let Some(id) = self.pending_delete.take() {
            if key.code == KeyCode::Char('y') {
                self.delete(id, tasks);
            }
            return AdminKey::Handled;
        }
        if self.details.is_some() {
            if matches!(key.code, KeyCode::Esc | KeyCode::Enter) {
                self.details = None;
            }
            return AdminKey::Handled;
        }

        match key.code {
            KeyCode::Esc => return AdminKey::Leave,
            KeyCode::Left | KeyCode::Char('[') => return AdminKey::Open(self.section.previous()),
            KeyCode::Right | KeyCode::Char(']') => return AdminKey::Open(self.section.next()),
            KeyCode::Up | KeyCode::Char('k') => self.cursor = self.cursor.saturating_sub(1),
            KeyCode::Down | KeyCode::Char('j') => {
                self.cursor = (self.cursor + 1).min(self.len().saturating_sub(1))
            }
            KeyCode::Char('r') => self.reload(tasks),
            KeyCode::Char('n') => self.open_editor(None),
            KeyCode::Char('e') => {
                if let Some(id) = self.selected_id() {
                    self.open_editor(Some(id));
                }
            }
            KeyCode::Enter => match (self.section, self.selected_id()) {
                (AdminSection::Users, Some(id)) => tasks.spawn(|api| async move {
                    Outcome::Admin(AdminOutcome::UserDetails(api.user_details(id).await))
                }),
                (_, Some(id)) => self.open_editor(Some(id)),
                _ => {}
            },
            KeyCode::Char('d') => self.pending_delete = self.selected_id(),
            KeyCode::Char('s') if self.section == AdminSection::Bookings => {
                if let Some(booking) = self.bookings.get(self.cursor) {
                    let (id, status) = (booking.id, booking.status.next());
                    tasks.spawn(|api| async move {
                        let result = api.update_booking_status(id, status).await.map(|_| ());
                        Outcome::Admin(AdminOutcome::Changed {
                            done: status_message(status),
                            result,
                        })
                    });
                }
            }
            _ => {}
        }
        AdminKey::Handled
    }

    fn open_editor(&mut self, id: Option<u64>) {
        let editor = match self.section {
            AdminSection::Buses => Some(self.bus_editor(id)),
            AdminSection::Routes => Some(self.route_editor(id)),
            AdminSection::Trips => Some(self.trip_editor(id)),
            AdminSection::Users => id.and_then(|id| self.user_editor(id)),
            AdminSection::Dashboard | AdminSection::Bookings => None,
        };
        self.editor = editor;
    }

    fn bus_editor(&self, id: Option<u64>) -> Editor {
        let existing = id.and_then(|id| self.buses.iter().find(|bus| bus.id == id));
        let form = Form::new(vec![
            TextField::with_value("Number plate", existing.map_or("", |b| b.number_plate.as_str())),
            TextField::with_value(
                "Type (XL/AC/S/N)",
                format!("{:?}", existing.map_or(BusType::default(), |b| b.bus_type)),
            ),
            TextField::with_value(
                "Company",
                existing.and_then(|b| b.company.as_deref()).unwrap_or(""),
            ),
            TextField::with_value(
                "Total seats",
                existing.map_or(String::new(), |b| b.total_seats.to_string()),
            ),
        ]);
        Editor {
            target: Target::Bus(id),
            form,
            error: None,
        }
    }

    fn route_editor(&self, id: Option<u64>) -> Editor {
        let existing = id.and_then(|id| self.routes.iter().find(|route| route.id == id));
        let form = Form::new(vec![
            TextField::with_value("Route number", existing.map_or("", |r| r.route_number.as_str())),
            TextField::with_value("Origin", existing.map_or("", |r| r.origin.as_str())),
            TextField::with_value("Destination", existing.map_or("", |r| r.destination.as_str())),
            TextField::with_value(
                "Stops (comma separated)",
                existing.map_or(String::new(), |r| r.stops.join(", ")),
            ),
            TextField::with_value(
                "Category",
                existing.and_then(|r| r.category.as_deref()).unwrap_or(""),
            ),
        ]);
        Editor {
            target: Target::Route(id),
            form,
            error: None,
        }
    }

    fn trip_editor(&self, id: Option<u64>) -> Editor {
        let existing = id.and_then(|id| self.trips.iter().find(|trip| trip.id == id));
        let form = Form::new(vec![
            TextField::with_value("Origin", existing.map_or("", |t| t.origin.as_str())),
            TextField::with_value("Destination", existing.map_or("", |t| t.destination.as_str())),
            TextField::with_value(
                "Departure (YYYY-MM-DD HH:MM)",
                existing.map_or(String::new(), |t| format_local(&t.departure_time)),
            ),
            TextField::with_value(
                "Arrival (YYYY-MM-DD HH:MM)",
                existing.map_or(String::new(), |t| format_local(&t.arrival_time)),
            ),
            TextField::with_value(
                "Price (LKR)",
                existing.map_or(String::new(), |t| format!("{:.2}", t.price)),
            ),
            TextField::with_value(
                "Bus ID",
                existing.map_or(String::new(), |t| t.bus_id.to_string()),
            ),
        ]);
        Editor {
            target: Target::Trip(id),
            form,
            error: None,
        }
    }

    fn user_editor(&self, id: u64) -> Option<Editor> {
        let user = self.users.iter().find(|user| user.id == id)?;
        let role = if user.is_admin() { "admin" } else { "customer" };
        Some(Editor {
            target: Target::User(id),
            form: Form::new(vec![
                TextField::with_value("Name", user.name.clone()),
                TextField::with_value("Email", user.email.clone()),
                TextField::with_value("Role (customer/admin)", role),
            ]),
            error: None,
        })
    }

    fn handle_editor_key(&mut self, key: &KeyEvent, tasks: &Tasks) {
        let Some(editor) = self.editor.as_mut() else {
            return;
        };
        match editor.form.handle_key(key) {
            FormKey::Cancel => self.editor = None,
            FormKey::Submit => {
                if let Err(message) = submit(editor.target, &editor.form, tasks) {
                    editor.error = Some(message);
                }
            }
            FormKey::Handled | FormKey::Ignored => {}
        }
    }

    fn delete(&mut self, id: u64, tasks: &Tasks) {
        let section = self.section;
        tasks.spawn(|api| async move {
            let (done, result) = match section {
                AdminSection::Buses => ("Bus deleted", api.delete_bus(id).await),
                AdminSection::Routes => ("Route deleted", api.delete_route(id).await),
                AdminSection::Trips => ("Trip deleted", api.delete_trip(id).await),
                AdminSection::Bookings => ("Booking deleted", api.delete_booking(id).await),
                AdminSection::Users => ("User deleted", api.delete_user(id).await),
                AdminSection::Dashboard => ("Nothing to delete", Ok(())),
            };
            Outcome::Admin(AdminOutcome::Changed { done, result })
        });
    }

    pub fn draw(&mut self, frame: &mut Frame, area: Rect, theme: &Theme) {
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Length(3), Constraint::Min(5)])
            .split(area);

        let titles: Vec<Line> = AdminSection::ALL
            .iter()
            .map(|section| Line::from(section.title()))
            .collect();
        let selected = AdminSection::ALL
            .iter()
            .position(|section| *section == self.section)
            .unwrap_or(0);
        let tabs = Tabs::new(titles)
            .block(Block::default().borders(Borders::ALL).title("Admin"))
            .select(selected)
            .highlight_style(theme.heading());
        frame.render_widget(tabs, chunks[0]);

        if self.section == AdminSection::Dashboard {
            self.draw_dashboard(frame, chunks[1], theme);
        } else {
            self.draw_list(frame, chunks[1], theme);
        }

        if let Some(details) = &self.details {
            draw_user_details(frame, area, details, theme);
        }
        if let Some(editor) = &self.editor {
            draw_editor(frame, area, editor, theme);
        }
    }

    fn draw_dashboard(&self, frame: &mut Frame, area: Rect, theme: &Theme) {
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Length(8), Constraint::Min(3)])
            .split(area);

        let lines = match &self.stats {
            Some(stats) => vec![
                stat_line("Total buses", stats.total_buses.to_string(), theme),
                stat_line("Total trips", stats.total_trips.to_string(), theme),
                stat_line("Total bookings", stats.total_bookings.to_string(), theme),
                stat_line("Total users", stats.total_users.to_string(), theme),
                stat_line("Revenue", format_lkr(stats.revenue), theme),
            ],
            None if self.loading => vec![Line::from("Loading statistics…")],
            None => vec![Line::from("No statistics available")],
        };
        frame.render_widget(
            Paragraph::new(lines).block(Block::default().borders(Borders::ALL).title("Overview")),
            chunks[0],
        );

        let recent: Vec<ListItem> = self
            .stats
            .iter()
            .flat_map(|stats| stats.recent_bookings.iter())
            .map(|booking| ListItem::new(booking_line(booking, theme)))
            .collect();
        frame.render_widget(
            List::new(recent).block(
                Block::default()
                    .borders(Borders::ALL)
                    .title("Recent bookings"),
            ),
            chunks[1],
        );
    }

    fn draw_list(&mut self, frame: &mut Frame, area: Rect, theme: &Theme) {
        let items: Vec<ListItem> = match self.section {
            AdminSection::Buses => self
                .buses
                .iter()
                .map(|bus| {
                    ListItem::new(format!(
                        "#{:<4} {:<12} {:<20} {:<18} {} seats",
                        bus.id,
                        bus.number_plate,
                        bus.bus_type.label(),
                        bus.company.as_deref().unwrap_or("-"),
                        bus.total_seats
                    ))
                })
                .collect(),
            AdminSection::Routes => self
                .routes
                .iter()
                .map(|route| {
                    ListItem::new(format!(
                        "{:<8} {} → {}  ({} stops) {}",
                        route.route_number,
                        route.origin,
                        route.destination,
                        route.stops.len(),
                        route.category.as_deref().unwrap_or("")
                    ))
                })
                .collect(),
            AdminSection::Trips => self
                .trips
                .iter()
                .map(|trip| {
                    ListItem::new(format!(
                        "#{:<4} {} → {}  {}  {}  bus #{}",
                        trip.id,
                        trip.origin,
                        trip.destination,
                        format_local(&trip.departure_time),
                        format_lkr(trip.price),
                        trip.bus_id
                    ))
                })
                .collect(),
            AdminSection::Bookings => self
                .bookings
                .iter()
                .map(|booking| ListItem::new(booking_line(booking, theme)))
                .collect(),
            AdminSection::Users => self
                .users
                .iter()
                .map(|user| {
                    ListItem::new(format!(
                        "#{:<4} {:<20} {:<28} {:<9} {}",
                        user.id,
                        user.name,
                        user.email,
                        if user.is_admin() { "admin" } else { "customer" },
                        match user.is_verified {
                            Some(true) => "verified",
                            Some(false) => "unverified",
                            None => "",
                        }
                    ))
                })
                .collect(),
            AdminSection::Dashboard => Vec::new(),
        };

        let hint = match self.section {
            AdminSection::Bookings => "s status · d delete · r reload",
            AdminSection::Users => "Enter details · e edit · d delete · r reload",
            _ => "n new · e edit · d delete · r reload",
        };
        let title = if self.loading {
            format!("{} (loading…)", self.section.title())
        } else {
            format!("{} · {hint}", self.section.title())
        };

        let mut list_state = ListState::default();
        if !items.is_empty() {
            list_state.select(Some(self.cursor.min(items.len() - 1)));
        }
        let list = List::new(items)
            .block(Block::default().borders(Borders::ALL).title(title))
            .highlight_style(Style::default().bg(theme.selection_bg))
            .highlight_symbol("▶ ");
        frame.render_stateful_widget(list, area, &mut list_state);
    }
}

fn submit(target: Target, form: &Form, tasks: &Tasks) -> Result<(), String> {
    match target {
        Target::Bus(id) => {
            let input = bus_input(form)?;
            tasks.spawn(|api| async move {
                let result = match id {
                    Some(id) => api.update_bus(id, &input).await,
                    None => api.create_bus(&input).await,
                };
                Outcome::Admin(AdminOutcome::Changed {
                    done: "Bus saved",
                    result: result.map(|_| ()),
                })
            });
        }
        Target::Route(id) => {
            let input = route_input(form)?;
            tasks.spawn(|api| async move {
                let result = match id {
                    Some(id) => api.update_route(id, &input).await,
                    None => api.create_route(&input).await,
                };
                Outcome::Admin(AdminOutcome::Changed {
                    done: "Route saved",
                    result: result.map(|_| ()),
                })
            });
        }
        Target::Trip(id) => {
            let input = trip_input(form)?;
            tasks.spawn(|api| async move {
                let result = match id {
                    Some(id) => api.update_trip(id, &input).await,
                    None => api.create_trip(&input).await,
                };
                Outcome::Admin(AdminOutcome::Changed {
                    done: "Trip saved",
                    result: result.map(|_| ()),
                })
            });
        }
        Target::User(id) => {
            let update = user_update(form)?;
            tasks.spawn(|api| async move {
                let result = api.update_user(id, &update).await.map(|_| ());
                Outcome::Admin(AdminOutcome::Changed {
                    done: "User updated",
                    result,
                })
            });
        }
    }
    Ok(())
}

fn required<'a>(form: &'a Form, idx: usize) -> Result<&'a str, String> {
    let value = form.value(idx);
    if value.is_empty() {
        let label = form.fields.get(idx).map_or("Field", |field| field.label);
        return Err(format!("{label} is required"));
    }
    Ok(value)
}

fn bus_input(form: &Form) -> Result<BusInput, String> {
    let number_plate = required(form, 0)?.to_string();
    let kind = form.value(1).to_ascii_uppercase();
    let bus_type = BusType::ALL
        .into_iter()
        .find(|candidate| format!("{candidate:?}") == kind)
        .ok_or_else(|| format!("Unknown bus type '{}'", form.value(1)))?;
    let total_seats = required(form, 3)?
        .parse::<u32>()
        .ok()
        .filter(|seats| *seats > 0)
        .ok_or_else(|| "Total seats must be a positive number".to_string())?;
    Ok(BusInput {
        number_plate,
        bus_type,
        company: form.value(2).to_string(),
        total_seats,
    })
}

fn route_input(form: &Form) -> Result<RouteInput, String> {
    let category = form.value(4);
    Ok(RouteInput {
        route_number: required(form, 0)?.to_string(),
        origin: required(form, 1)?.to_string(),
        destination: required(form, 2)?.to_string(),
        stops: RouteInput::parse_stops(form.value(3)),
        category: (!category.is_empty()).then(|| category.to_string()),
    })
}

fn trip_input(form: &Form) -> Result<TripInput, String> {
    let origin = required(form, 0)?.to_string();
    let destination = required(form, 1)?.to_string();
    let departure_time = parse_local(required(form, 2)?)?;
    let arrival_time = parse_local(required(form, 3)?)?;
    if arrival_time <= departure_time {
        return Err("Arrival must be after departure".to_string());
    }
    let price = required(form, 4)?;
    let amount = price
        .parse::<f64>()
        .ok()
        .filter(|amount| amount.is_finite() && *amount >= 0.0)
        .ok_or_else(|| "Price must be a non-negative number".to_string())?;
    let bus_id = required(form, 5)?
        .parse::<u64>()
        .map_err(|_| "Bus ID must be a number".to_string())?;
    Ok(TripInput {
        origin,
        destination,
        departure_time,
        arrival_time,
        price: format!("{amount:.2}"),
        bus_id,
    })
}

fn user_update(form: &Form) -> Result<UserUpdate, String> {
    let role = match form.value(2).to_ascii_lowercase().as_str() {
        "admin" => Role::Admin,
        "customer" => Role::Customer,
        other => return Err(format!("Unknown role '{other}'")),
    };
    Ok(UserUpdate {
        name: required(form, 0)?.to_string(),
        email: required(form, 1)?.to_string(),
        role,
    })
}

fn status_message(status: BookingStatus) -> &'static str {
    match status {
        BookingStatus::Pending => "Booking marked pending",
        BookingStatus::Confirmed => "Booking confirmed",
        BookingStatus::Cancelled => "Booking cancelled",
    }
}

fn stat_line(label: &str, value: String, theme: &Theme) -> Line<'static> {
    Line::from(vec![
        Span::styled(format!("{label:<16}"), Style::default().fg(theme.muted)),
        Span::styled(value, Style::default().add_modifier(Modifier::BOLD)),
    ])
}

fn booking_line(booking: &Booking, theme: &Theme) -> Line<'static> {
    let status_color = match booking.status {
        BookingStatus::Pending => theme.warning,
        BookingStatus::Confirmed => theme.success,
        BookingStatus::Cancelled => theme.danger,
    };
    let section = match (&booking.start_stop, &booking.end_stop) {
        (Some(start), Some(end)) => format!("{start} → {end}"),
        _ => booking
            .trip
            .as_ref()
            .map(|trip| format!("{} → {}", trip.origin, trip.destination))
            .unwrap_or_default(),
    };
    let amount = booking.listed_amount().map(format_lkr).unwrap_or_default();
    Line::from(vec![
        Span::raw(format!(
            "#{:<4} user #{:<4} trip #{:<4} {:>2} seats  ",
            booking.id, booking.user_id, booking.trip_id, booking.seats
        )),
        Span::styled(
            format!("{:<10}", booking.status.to_string()),
            Style::default().fg(status_color),
        ),
        Span::raw(format!("{section}  ")),
        Span::styled(amount, Style::default().fg(theme.muted)),
    ])
}

fn draw_editor(frame: &mut Frame, area: Rect, editor: &Editor, theme: &Theme) {
    let height = (editor.form.fields.len() as u16) * 2 + 5;
    let popup = centered_rect(72, height, area);
    frame.render_widget(Clear, popup);
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(3), Constraint::Length(3)])
        .split(popup);

    let title = match editor.target {
        Target::Bus(None) => "New bus",
        Target::Bus(Some(_)) => "Edit bus",
        Target::Route(None) => "New route",
        Target::Route(Some(_)) => "Edit route",
        Target::Trip(None) => "New trip",
        Target::Trip(Some(_)) => "Edit trip",
        Target::User(_) => "Edit user",
    };
    editor.form.render(frame, chunks[0], title, theme, true);

    let footer = match &editor.error {
        Some(error) => Line::from(Span::styled(error.clone(), Style::default().fg(theme.danger))),
        None => Line::from("Enter save · Esc cancel · Tab next field"),
    };
    frame.render_widget(
        Paragraph::new(footer)
            .block(Block::default().borders(Borders::ALL))
            .wrap(Wrap { trim: true }),
        chunks[1],
    );
}

fn draw_user_details(frame: &mut Frame, area: Rect, details: &UserDetails, theme: &Theme) {
    let popup = centered_rect(80, 20, area);
    frame.render_widget(Clear, popup);
    let user = &details.user;
    let mut lines = vec![
        Line::from(Span::styled(user.name.clone(), theme.heading())),
        Line::from(user.email.clone()),
        Line::from(format!(
            "Role: {}   Joined: {}",
            if user.is_admin() { "admin" } else { "customer" },
            user.created_at
                .as_ref()
                .map(format_local)
                .unwrap_or_else(|| "-".to_string())
        )),
        Line::from(""),
        Line::from(Span::styled(
            format!("Bookings ({})", details.bookings.len()),
            Style::default().add_modifier(Modifier::BOLD),
        )),
    ];
    lines.extend(details.bookings.iter().map(|b| booking_line(b, theme)));
    frame.render_widget(
        Paragraph::new(lines)
            .block(
                Block::default()
                    .borders(Borders::ALL)
                    .title("User details · Esc close"),
            )
            .wrap(Wrap { trim: true }),
        popup,
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    fn form(values: &[&str]) -> Form {
        Form::new(
            values
                .iter()
                .map(|value| TextField::with_value("Field", *value))
                .collect(),
        )
    }

    #[test]
    fn bus_form_parses_type_and_seats() {
        let input = bus_input(&form(&["WP NA-1234", "ac", "SLTB", "49"])).unwrap();
        assert_eq!(input.bus_type, BusType::AC);
        assert_eq!(input.total_seats, 49);
        assert!(bus_input(&form(&["WP NA-1234", "XXL", "", "49"])).is_err());
        assert!(bus_input(&form(&["WP NA-1234", "N", "", "0"])).is_err());
    }

    #[test]
    fn route_form_splits_stops() {
        let input = route_input(&form(&["1", "Colombo", "Kandy", "Colombo, Kegalle,,Kandy", ""]))
            .unwrap();
        assert_eq!(input.stops, vec!["Colombo", "Kegalle", "Kandy"]);
        assert!(input.category.is_none());
    }

    #[test]
    fn trip_form_requires_ordered_times() {
        let ok = trip_input(&form(&[
            "Colombo",
            "Galle",
            "2025-03-01 08:00",
            "2025-03-01 10:30",
            "750",
            "3",
        ]))
        .unwrap();
        assert_eq!(ok.price, "750.00");
        assert_eq!(ok.bus_id, 3);

        let err = trip_input(&form(&[
            "Colombo",
            "Galle",
            "2025-03-01 10:00",
            "2025-03-01 08:00",
            "750",
            "3",
        ]))
        .unwrap_err();
        assert_eq!(err, "Arrival must be after departure");
    }

    #[test]
    fn user_form_parses_role() {
        let update = user_update(&form(&["Dilani", "dilani@example.lk", "Admin"])).unwrap();
        assert_eq!(update.role, Role::Admin);
        assert!(user_update(&form(&["Dilani", "dilani@example.lk", "owner"])).is_err());
    }
}
