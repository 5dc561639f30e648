//! Plain-text rendering for the terminal dashboards.

use colored::{Color, Colorize};
use common::constants::DASHBOARD_PAGE_SIZE;
use common::types::api::paginate;
use common::types::booking::{BookingDTO, BookingStats};
use common::types::booking_status::BookingStatus;
use common::types::covid::{RestrictionLevel, RestrictionResponse};
use common::types::dashboard::DashboardData;
use common::types::payment_status::PaymentStatus;
use common::types::service::ServiceDTO;
use common::types::user::UserDTO;
use std::fmt::Write;

pub fn money(amount: f64) -> String {
    format!("${amount:.2}")
}

pub fn optional_money(amount: Option<f64>) -> String {
    amount.map(money).unwrap_or_else(|| "-".to_string())
}

fn status_color(status: BookingStatus) -> Color {
    match status {
        BookingStatus::Pending => Color::Yellow,
        BookingStatus::Confirmed => Color::Blue,
        BookingStatus::InProgress => Color::Magenta,
        BookingStatus::Completed => Color::Green,
        BookingStatus::Cancelled => Color::Red,
    }
}

pub fn status_badge(status: BookingStatus) -> String {
    format!("[{}]", status.label())
        .color(status_color(status))
        .bold()
        .to_string()
}

pub fn payment_badge(status: PaymentStatus) -> String {
    let color = match status {
        PaymentStatus::Paid => Color::Green,
        PaymentStatus::Failed | PaymentStatus::Cancelled => Color::Red,
        PaymentStatus::Refunded => Color::Cyan,
        PaymentStatus::Pending | PaymentStatus::Processing => Color::Yellow,
    };
    status.label().color(color).to_string()
}

pub fn short_id(booking: &BookingDTO) -> String {
    booking.id.simple().to_string()[..8].to_string()
}

pub fn booking_line(booking: &BookingDTO) -> String {
    format!(
        "{}  {:<11} {:<14} {:<16} {}  {}",
        short_id(booking),
        booking.service_type.label(),
        status_badge(booking.status),
        booking.start_time.format("%Y-%m-%d %H:%M"),
        booking.city,
        optional_money(booking.price()),
    )
}

pub fn booking_detail(booking: &BookingDTO) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Booking {}", booking.id);
    let _ = writeln!(out, "  Service:   {}", booking.service_type.label());
    let _ = writeln!(out, "  Status:    {}", status_badge(booking.status));
    let _ = writeln!(out, "  Customer:  {}", booking.customer_name);
    if let Some(provider) = &booking.provider {
        let _ = writeln!(out, "  Provider:  {} <{}>", provider.name, provider.email);
    }
    let _ = writeln!(
        out,
        "  When:      {} ({}h)",
        booking.start_time.format("%Y-%m-%d %H:%M UTC"),
        booking.duration_hours
    );
    if let Some(address) = &booking.address {
        let _ = writeln!(out, "  Address:   {address}");
    }
    let location = [Some(booking.city.as_str()), booking.state.as_deref(), Some(booking.country.as_str())]
        .into_iter()
        .flatten()
        .collect::<Vec<_>>()
        .join(", ");
    let _ = writeln!(out, "  Location:  {location}");
    if let Some(phone) = &booking.phone {
        let _ = writeln!(out, "  Phone:     {phone}");
    }
    let _ = writeln!(out, "  Budget:    {}", optional_money(booking.budget));
    if booking.provider_quote.is_some() {
        let _ = writeln!(out, "  Quote:     {}", optional_money(booking.provider_quote));
    }
    if let Some(code) = &booking.confirmation_code {
        let _ = writeln!(out, "  Code:      {}", code.bold());
    }
    if let Some(status) = booking.payment_status {
        let _ = writeln!(out, "  Payment:   {}", payment_badge(status));
    }
    if let Some(notes) = booking.notes.as_deref().filter(|n| !n.is_empty()) {
        let _ = writeln!(out, "  Notes:     {notes}");
    }
    out
}

/// One client-side page of bookings with a footer naming the page.
pub fn booking_page(bookings: &[BookingDTO], page: usize) -> String {
    if bookings.is_empty() {
        return "No bookings found.\n".to_string();
    }
    let page = paginate(bookings, page, DASHBOARD_PAGE_SIZE);
    let mut out = String::new();
    for booking in page.items {
        let _ = writeln!(out, "{}", booking_line(booking));
    }
    let _ = write!(out, "Page {} of {} ({} total)", page.page, page.total_pages, page.total);
    if page.has_next() {
        let _ = write!(out, " - next: page {}", page.page + 1);
    }
    out.push('\n');
    out
}

pub fn stats(stats: &BookingStats) -> String {
    let mut out = format!("Total bookings: {}\n", stats.total);
    for status in BookingStatus::ALL {
        let _ = writeln!(out, "  {:<14} {}", status_badge(status), stats.count(status));
    }
    out
}

pub fn profile(user: &UserDTO) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{} ({})", user.full_name().bold(), user.role);
    let _ = writeln!(out, "  Email:      {}", user.email);
    let _ = writeln!(out, "  Username:   {}", user.username);
    if let Some(city) = &user.city {
        let _ = writeln!(out, "  City:       {city}");
    }
    let _ = writeln!(out, "  Vaccinated: {}", if user.vaccinated { "yes" } else { "no" });
    let _ = writeln!(out, "  Joined:     {}", user.date_joined.format("%Y-%m-%d"));
    out
}

pub fn dashboard(data: &DashboardData) -> String {
    let mut out = format!("Welcome back, {}!\n", data.user.full_name().bold());
    out.push_str(&stats(&data.stats));
    if let Some(earnings) = data.earnings {
        let _ = writeln!(out, "Earnings: {}", money(earnings).green());
    }
    if !data.recent_bookings.is_empty() {
        out.push_str("Recent:\n");
        for booking in &data.recent_bookings {
            let _ = writeln!(out, "  {}", booking_line(booking));
        }
    }
    out
}

pub fn services(services: &[ServiceDTO]) -> String {
    let mut out = String::new();
    for service in services {
        let duration = service
            .estimated_duration
            .map(|h| format!(" ~{h}h"))
            .unwrap_or_default();
        let _ = writeln!(
            out,
            "{:<24} {:<12} {}{duration}",
            service.title,
            service.category,
            money(service.price)
        );
    }
    out
}

pub fn restriction(response: &RestrictionResponse) -> String {
    let level = match response.restriction_level {
        RestrictionLevel::Low => response.restriction_level.label().green(),
        RestrictionLevel::Medium => response.restriction_level.label().yellow(),
        RestrictionLevel::High => response.restriction_level.label().red(),
        RestrictionLevel::Unknown => response.restriction_level.label().normal(),
    };
    let place = [response.city.as_deref(), response.state.as_deref(), Some(response.country.as_str())]
        .into_iter()
        .flatten()
        .collect::<Vec<_>>()
        .join(", ");
    format!("COVID restriction level for {place}: {level}\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn money_has_two_decimals() {
        assert_eq!(money(150.0), "$150.00");
        assert_eq!(money(19.999), "$20.00");
        assert_eq!(optional_money(None), "-");
    }

    #[test]
    fn badges_carry_the_status_label() {
        assert!(status_badge(BookingStatus::InProgress).contains("[In Progress]"));
        assert!(status_badge(BookingStatus::Cancelled).contains("Cancelled"));
        assert!(payment_badge(PaymentStatus::Refunded).contains("Refunded"));
    }

    #[test]
    fn empty_lists_say_so() {
        assert_eq!(booking_page(&[], 1), "No bookings found.\n");
    }
}
