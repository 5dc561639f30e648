use crate::api::SafeHomeApi;
use crate::commands::{self, Command, parse_amount, parse_start_time, resolve_booking_id};
use crate::config::DashboardConfig;
use crate::error::ApiError;
use crate::maps;
use crate::token_refresh::{RouteChanged, TokenRefresher};
use crate::view;
use actix::prelude::*;
use colored::Color;
use common::constants::{
    DEFAULT_COUNTRY, DEFAULT_DURATION_HOURS, MAX_CONSECUTIVE_REFRESH_FAILURES, MAX_PAGE_SIZE,
};
use common::crypto::PayloadCipher;
use common::logger::Logger;
use common::types::booking::{BookingDTO, BookingFilter, CreateBookingRequest, ServiceType};
use common::types::booking_status::BookingStatus;
use common::types::user::{UserDTO, UserRole};
use std::io::{self, Write};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio_stream::wrappers::LinesStream;
use tokio_stream::{Stream, StreamExt};
use uuid::Uuid;

const LOGIN_ATTEMPTS: usize = 3;

/// Reads answers line by line from the terminal (or any line stream).
pub struct Prompter<S> {
    lines: S,
    logger: Logger,
}

impl<S> Prompter<S>
where
    S: Stream<Item = io::Result<String>> + Unpin,
{
    pub fn new(lines: S, logger: Logger) -> Self {
        Self { lines, logger }
    }

    /// Next trimmed line, or `None` once input is closed.
    pub async fn ask(&mut self, label: &str) -> Option<String> {
        print!("{label}");
        let _ = io::stdout().flush();
        match self.lines.next().await? {
            Ok(line) => Some(line.trim().to_string()),
            Err(e) => {
                self.logger.error(format!("Could not read input: {e}"));
                None
            }
        }
    }

    /// Asks until `parse` accepts the answer.
    pub async fn ask_until<T>(
        &mut self,
        label: &str,
        parse: impl Fn(&str) -> Result<T, String>,
    ) -> Option<T> {
        loop {
            let answer = self.ask(label).await?;
            match parse(&answer) {
                Ok(value) => return Some(value),
                Err(e) => self.logger.warn(e),
            }
        }
    }
}

fn non_empty(raw: &str) -> Result<String, String> {
    if raw.is_empty() {
        Err("this field is required".to_string())
    } else {
        Ok(raw.to_string())
    }
}

fn optional(raw: &str) -> Option<String> {
    (!raw.is_empty()).then(|| raw.to_string())
}

/// Walks the customer through a new booking. `None` if input ends midway.
pub async fn booking_form<S>(prompter: &mut Prompter<S>) -> Option<CreateBookingRequest>
where
    S: Stream<Item = io::Result<String>> + Unpin,
{
    let kinds = ServiceType::ALL
        .iter()
        .map(|k| k.as_str())
        .collect::<Vec<_>>()
        .join("/");
    let service_type = prompter
        .ask_until(&format!("Service ({kinds}): "), |raw| raw.parse::<ServiceType>())
        .await?;
    let budget = prompter
        .ask_until("Budget (blank for none): ", |raw| {
            if raw.is_empty() {
                Ok(None)
            } else {
                parse_amount(raw).map(Some)
            }
        })
        .await?;
    let address = prompter.ask_until("Address: ", non_empty).await?;
    let phone = prompter.ask_until("Phone: ", non_empty).await?;
    let city = prompter.ask_until("City: ", non_empty).await?;
    let state = optional(&prompter.ask("State (optional): ").await?);
    let country = optional(&prompter.ask(&format!("Country [{DEFAULT_COUNTRY}]: ")).await?);
    let start_time = prompter
        .ask_until("Start (YYYY-MM-DD HH:MM, UTC): ", parse_start_time)
        .await?;
    let duration_hours = prompter
        .ask_until(
            &format!("Duration in hours [{DEFAULT_DURATION_HOURS}]: "),
            |raw| {
                if raw.is_empty() {
                    return Ok(None);
                }
                raw.parse::<u32>()
                    .ok()
                    .filter(|h| *h >= 1)
                    .map(Some)
                    .ok_or_else(|| format!("'{raw}' is not a number of hours"))
            },
        )
        .await?;
    let notes = optional(&prompter.ask("Notes (optional): ").await?);

    Some(CreateBookingRequest {
        service_type,
        budget,
        address,
        phone,
        city,
        state,
        country,
        start_time,
        duration_hours,
        notes,
    })
}

pub struct Dashboard<S> {
    api: SafeHomeApi,
    role: UserRole,
    refresher: Addr<TokenRefresher>,
    prompter: Prompter<S>,
    maps_api_key: Option<String>,
    last_listed: Vec<BookingDTO>,
    logger: Logger,
}

impl<S> Dashboard<S>
where
    S: Stream<Item = io::Result<String>> + Unpin,
{
    pub fn new(
        api: SafeHomeApi,
        role: UserRole,
        refresher: Addr<TokenRefresher>,
        prompter: Prompter<S>,
        maps_api_key: Option<String>,
    ) -> Self {
        Self {
            api,
            role,
            refresher,
            prompter,
            maps_api_key,
            last_listed: Vec::new(),
            logger: Logger::new(format!("{} Dashboard", role.label()), Color::Green),
        }
    }

    pub async fn run(mut self) {
        if let Err(e) = self.home().await {
            self.logger.warn(format!("Could not load the dashboard: {e}"));
        }
        println!("{}", commands::help(self.role));

        let prompt = format!("{}> ", self.role.label().to_lowercase());
        loop {
            let Some(line) = self.prompter.ask(&prompt).await else {
                self.leave().await;
                break;
            };
            if line.is_empty() {
                continue;
            }
            let command = match commands::parse(self.role, &line) {
                Ok(command) => command,
                Err(e) => {
                    self.logger.warn(e);
                    continue;
                }
            };
            if command == Command::Logout {
                self.leave().await;
                break;
            }
            if let Err(e) = self.execute(command).await {
                if e.is_unauthorized() && !self.api.session().is_logged_in() {
                    self.logger.error("Your session has expired, please log in again");
                    self.refresher.do_send(RouteChanged {
                        path: "/login".to_string(),
                        has_token: false,
                    });
                    break;
                }
                self.logger.error(e.to_string());
            }
        }
    }

    async fn leave(&mut self) {
        self.refresher.do_send(RouteChanged {
            path: "/login".to_string(),
            has_token: false,
        });
        match self.api.auth.logout().await {
            Ok(()) => self.logger.info("Logged out"),
            Err(e) => self.logger.warn(format!("Logout failed on the server: {e}")),
        }
    }

    async fn home(&mut self) -> Result<(), ApiError> {
        let data = match self.role {
            UserRole::Customer => self.api.auth.customer_dashboard().await?,
            UserRole::Provider => self.api.auth.provider_dashboard().await?,
        };
        self.last_listed = data.recent_bookings.clone();
        println!("{}", view::dashboard(&data));
        Ok(())
    }

    fn resolve(&self, raw: &str) -> Option<Uuid> {
        match resolve_booking_id(raw, &self.last_listed) {
            Ok(id) => Some(id),
            Err(e) => {
                self.logger.warn(e);
                None
            }
        }
    }

    fn listing_filter(status: Option<BookingStatus>) -> BookingFilter {
        BookingFilter {
            status,
            service_type: None,
            page: None,
            page_size: Some(MAX_PAGE_SIZE),
        }
    }

    fn show_listing(&mut self, bookings: Vec<BookingDTO>, page: usize) {
        println!("{}", view::booking_page(&bookings, page));
        self.last_listed = bookings;
    }

    async fn execute(&mut self, command: Command) -> Result<(), ApiError> {
        match command {
            Command::Help => println!("{}", commands::help(self.role)),
            Command::Logout => {}
            Command::Profile => println!("{}", view::profile(&self.api.auth.me().await?)),
            Command::Stats => println!("{}", view::stats(&self.api.bookings.stats().await?)),
            Command::Services => println!("{}", view::services(&self.api.services.list().await?)),
            Command::Book => {
                let Some(request) = booking_form(&mut self.prompter).await else {
                    self.logger.warn("Booking aborted");
                    return Ok(());
                };
                let booking = self.api.bookings.create(&request).await?;
                self.logger.info("Booking created");
                println!("{}", view::booking_detail(&booking));
                self.last_listed.push(booking);
            }
            Command::Bookings { status, page } => {
                let list = self.api.bookings.list_all(&Self::listing_filter(status)).await?;
                self.show_listing(list, page);
            }
            Command::Show(raw) => {
                let Some(id) = self.resolve(&raw) else {
                    return Ok(());
                };
                println!("{}", view::booking_detail(&self.api.bookings.get(id).await?));
            }
            Command::Edit { id, update } => {
                let Some(id) = self.resolve(&id) else {
                    return Ok(());
                };
                let booking = self.api.bookings.update(id, &update).await?;
                self.logger.info("Booking updated");
                println!("{}", view::booking_detail(&booking));
            }
            Command::Cancel(raw) => {
                let Some(id) = self.resolve(&raw) else {
                    return Ok(());
                };
                let booking = self.api.bookings.cancel(id).await?;
                self.logger.info(format!(
                    "Booking {} is now {}",
                    view::short_id(&booking),
                    booking.status
                ));
            }
            Command::Pay(raw) => {
                let Some(id) = self.resolve(&raw) else {
                    return Ok(());
                };
                let checkout = self.api.payments.checkout(id).await?;
                self.logger.info("Checkout session created");
                println!("Open {} to pay", checkout.checkout_url);
                println!("Then run: verify {}", checkout.session_id);
            }
            Command::Verify(session_id) => {
                let status = self.api.payments.verify_session(&session_id).await?;
                println!(
                    "Payment {} - {} {}",
                    view::payment_badge(status.payment_status),
                    view::money(status.amount_total as f64 / 100.0),
                    status.currency
                );
            }
            Command::Covid {
                country,
                state,
                city,
            } => {
                let response = self
                    .api
                    .covid
                    .restriction(&country, state.as_deref(), city.as_deref())
                    .await?;
                println!("{}", view::restriction(&response));
            }
            Command::Map(raw) => {
                let Some(id) = self.resolve(&raw) else {
                    return Ok(());
                };
                let booking = self.api.bookings.get(id).await?;
                let address = maps::booking_address(&booking);
                println!("{}", maps::search_url(&address));
                if let Some(key) = &self.maps_api_key {
                    match maps::geocode(self.api.session().http(), key, &address).await {
                        Ok(Some(point)) => println!(
                            "{} ({:.5}, {:.5})",
                            point.formatted_address, point.lat, point.lng
                        ),
                        Ok(None) => self.logger.warn("Address could not be located"),
                        Err(e) => self.logger.warn(format!("Geocoding failed: {e}")),
                    }
                }
            }
            Command::Tasks { page } => {
                let list = self
                    .api
                    .bookings
                    .available_all(&Self::listing_filter(None))
                    .await?;
                self.show_listing(list, page);
            }
            Command::Received { page } => {
                let list = self
                    .api
                    .bookings
                    .received_all(&Self::listing_filter(None))
                    .await?;
                self.show_listing(list, page);
            }
            Command::Accept { id, quote } => {
                let Some(id) = self.resolve(&id) else {
                    return Ok(());
                };
                let booking = self.api.bookings.accept(id, quote).await?;
                self.logger.info(format!(
                    "Accepted booking {} for {}",
                    view::short_id(&booking),
                    view::optional_money(booking.price())
                ));
            }
            Command::Start { id, code } => {
                let Some(id) = self.resolve(&id) else {
                    return Ok(());
                };
                let booking = self.api.bookings.start_job(id, &code).await?;
                self.logger.info(format!("Job {} started", view::short_id(&booking)));
            }
            Command::Complete(raw) => {
                let Some(id) = self.resolve(&raw) else {
                    return Ok(());
                };
                let booking = self.api.bookings.complete_job(id).await?;
                self.logger.info(format!("Job {} completed", view::short_id(&booking)));
            }
        }
        Ok(())
    }
}

async fn login<S>(
    api: &SafeHomeApi,
    role: UserRole,
    args: &[String],
    prompter: &mut Prompter<S>,
    logger: &Logger,
) -> Option<UserDTO>
where
    S: Stream<Item = io::Result<String>> + Unpin,
{
    let mut email = args.first().cloned();
    let mut password = args.get(1).cloned();
    for _ in 0..LOGIN_ATTEMPTS {
        let email_value = match email.take() {
            Some(email) => email,
            None => prompter.ask("Email: ").await?,
        };
        let password_value = match password.take() {
            Some(password) => password,
            None => prompter.ask("Password: ").await?,
        };
        match api.auth.login(&email_value, &password_value, Some(role)).await {
            Ok(user) => return Some(user),
            Err(e) => logger.error(format!("Login failed: {e}")),
        }
    }
    None
}

/// Entry point shared by the `customer` and `provider` binaries.
pub async fn start(role: UserRole) -> io::Result<()> {
    let logger = Logger::new(format!("{} Dashboard", role.label()), Color::Green);
    let config = DashboardConfig::load();

    let secret = config.payload_key.clone();
    let cipher = tokio::task::spawn_blocking(move || PayloadCipher::from_secret(&secret))
        .await
        .map_err(io::Error::other)?;
    let api = SafeHomeApi::new(&config.api_url, cipher).map_err(io::Error::other)?;

    let lines = LinesStream::new(BufReader::new(tokio::io::stdin()).lines());
    let mut prompter = Prompter::new(lines, logger.clone());
    let args: Vec<String> = std::env::args().skip(1).collect();

    logger.info(format!("SafeHome {} dashboard - {}", role.label(), config.api_url));
    let Some(user) = login(&api, role, &args, &mut prompter, &logger).await else {
        logger.error("Could not log in");
        return Ok(());
    };
    logger.info(format!("Logged in as {}", user.full_name()));

    let refresher = TokenRefresher::with_schedule(
        Arc::new(api.auth.clone()),
        config.refresh_interval,
        MAX_CONSECUTIVE_REFRESH_FAILURES,
    )
    .start();
    refresher.do_send(RouteChanged {
        path: role.dashboard_route().to_string(),
        has_token: api.session().has_token(),
    });

    Dashboard::new(api, role, refresher, prompter, config.maps_api_key)
        .run()
        .await;
    System::current().stop();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn prompter(answers: &[&str]) -> Prompter<impl Stream<Item = io::Result<String>> + Unpin> {
        let lines: Vec<io::Result<String>> = answers.iter().map(|a| Ok(a.to_string())).collect();
        Prompter::new(tokio_stream::iter(lines), Logger::new("test", Color::White))
    }

    #[actix_rt::test]
    async fn booking_form_reprompts_until_valid() {
        let mut input = prompter(&[
            "windows",
            "cleaning",
            "-5",
            "150",
            "1 Rundle Mall",
            "",
            "0400 111 222",
            "Adelaide",
            "SA",
            "",
            "tomorrow",
            "2031-02-03 08:00",
            "3",
            "",
        ]);
        let request = booking_form(&mut input).await.unwrap();
        assert_eq!(request.service_type, ServiceType::Cleaning);
        assert_eq!(request.budget, Some(150.0));
        assert_eq!(request.phone, "0400 111 222");
        assert_eq!(request.state.as_deref(), Some("SA"));
        assert_eq!(request.country, None);
        assert_eq!(
            request.start_time,
            Utc.with_ymd_and_hms(2031, 2, 3, 8, 0, 0).unwrap()
        );
        assert_eq!(request.duration_hours, Some(3));
        assert_eq!(request.notes, None);
    }

    #[actix_rt::test]
    async fn booking_form_aborts_when_input_ends() {
        let mut input = prompter(&["plumbing", ""]);
        assert!(booking_form(&mut input).await.is_none());
    }
}
