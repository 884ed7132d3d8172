use std::{future::Future, thread, time::Duration};

use busbook_core::{
    models::{AuthResponse, Booking, Trip, VerifyEmailResponse},
    ApiClient, ApiError,
};
use crossterm::event::{self, Event};
use tokio::sync::mpsc;
use tracing::debug;

use crate::admin::AdminOutcome;

pub const TICK_RATE: Duration = Duration::from_millis(250);

pub enum AppEvent {
    Input(Event),
    Tick,
    Completed(Outcome),
}

/// Result of a background request, delivered back to the UI loop.
pub enum Outcome {
    Trips(Result<Vec<Trip>, ApiError>),
    Trip(u64, Result<Trip, ApiError>),
    Booked(Result<Booking, ApiError>),
    LoggedIn(Result<AuthResponse, ApiError>),
    Registered(Result<(), ApiError>),
    ResetRequested(Result<Option<String>, ApiError>),
    PasswordReset(Result<Option<String>, ApiError>),
    Verified(Result<VerifyEmailResponse, ApiError>),
    Admin(AdminOutcome),
}

/// Spawns API calls and routes their results into the event channel.
#[derive(Clone)]
pub struct Tasks {
    api: ApiClient,
    tx: mpsc::Sender<AppEvent>,
}

impl Tasks {
    pub fn new(api: ApiClient, tx: mpsc::Sender<AppEvent>) -> Self {
        Self { api, tx }
    }

    pub fn api(&self) -> ApiClient {
        self.api.clone()
    }

    pub fn spawn<F, Fut>(&self, request: F)
    where
        F: FnOnce(ApiClient) -> Fut,
        Fut: Future<Output = Outcome> + Send + 'static,
    {
        let tx = self.tx.clone();
        let pending = request(self.api());
        tokio::spawn(async move {
            let outcome = pending.await;
            if tx.send(AppEvent::Completed(outcome)).await.is_err() {
                debug!("event loop closed before request finished");
            }
        });
    }
}

pub fn spawn_input_thread(sender: mpsc::Sender<AppEvent>) {
    thread::spawn(move || loop {
        match event::poll(TICK_RATE) {
            Ok(true) => match event::read() {
                Ok(evt) => {
                    if sender.blocking_send(AppEvent::Input(evt)).is_err() {
                        break;
                    }
                }
                Err(_) => break,
            },
            Ok(false) => {
                if sender.blocking_send(AppEvent::Tick).is_err() {
                    break;
                }
            }
            Err(_) => break,
        }
    });
}
