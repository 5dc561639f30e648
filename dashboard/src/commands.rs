use chrono::{DateTime, NaiveDateTime, Utc};
use common::types::booking::{BookingDTO, UpdateBookingRequest};
use common::types::booking_status::BookingStatus;
use common::types::user::UserRole;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Help,
    Logout,
    Profile,
    Stats,
    Services,
    Book,
    Bookings {
        status: Option<BookingStatus>,
        page: usize,
    },
    Show(String),
    Edit {
        id: String,
        update: UpdateBookingRequest,
    },
    Cancel(String),
    Pay(String),
    Verify(String),
    Covid {
        country: String,
        state: Option<String>,
        city: Option<String>,
    },
    Map(String),
    Tasks {
        page: usize,
    },
    Accept {
        id: String,
        quote: Option<f64>,
    },
    Received {
        page: usize,
    },
    Start {
        id: String,
        code: String,
    },
    Complete(String),
}

const CUSTOMER_HELP: &str = "\
Commands:
  services                          list the service catalog
  book                              create a booking (interactive)
  bookings [status] [page]          list your bookings
  show <id>                         booking details
  edit <id> <field> <value>         change service_type|budget|address|phone|city|state|country|start|duration|notes
  cancel <id>                       cancel a booking
  pay <id>                          open a checkout for a booking
  verify <session>                  check a checkout session
  stats                             booking counts per status
  covid <country> [state] [city]    COVID restriction level
  map <id>                          map link for a booking
  profile                           your profile
  help | logout";

const PROVIDER_HELP: &str = "\
Commands:
  tasks [page]                      bookings waiting for a provider
  accept <id> [quote]               take a booking, optionally with a quote
  received [page]                   bookings you accepted
  show <id>                         booking details
  start <id> <code>                 start a job with the customer's code
  complete <id>                     mark a job completed
  stats                             booking counts per status
  profile                           your profile
  help | logout";

pub fn help(role: UserRole) -> &'static str {
    match role {
        UserRole::Customer => CUSTOMER_HELP,
        UserRole::Provider => PROVIDER_HELP,
    }
}

fn page_arg(raw: Option<&str>) -> Result<usize, String> {
    match raw {
        None => Ok(1),
        Some(raw) => match raw.parse::<usize>() {
            Ok(page) if page > 0 => Ok(page),
            _ => Err(format!("'{raw}' is not a page number")),
        },
    }
}

fn id_arg(raw: Option<&str>, usage: &str) -> Result<String, String> {
    raw.map(str::to_string)
        .ok_or_else(|| format!("usage: {usage}"))
}

/// Accepts RFC 3339 or `YYYY-MM-DD HH:MM` (taken as UTC).
pub fn parse_start_time(raw: &str) -> Result<DateTime<Utc>, String> {
    let raw = raw.trim();
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Ok(parsed.with_timezone(&Utc));
    }
    ["%Y-%m-%d %H:%M", "%Y-%m-%dT%H:%M"]
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(raw, format).ok())
        .map(|naive| naive.and_utc())
        .ok_or_else(|| format!("'{raw}' is not a date; use YYYY-MM-DD HH:MM"))
}

pub fn parse_amount(raw: &str) -> Result<f64, String> {
    match raw.trim().trim_start_matches('$').parse::<f64>() {
        Ok(amount) if amount.is_finite() && amount > 0.0 => Ok(amount),
        _ => Err(format!("'{raw}' is not a positive amount")),
    }
}

pub fn field_update(field: &str, value: &str) -> Result<UpdateBookingRequest, String> {
    let value = value.trim();
    if value.is_empty() {
        return Err(format!("a value for {field} is required"));
    }
    let mut update = UpdateBookingRequest::default();
    match field.to_ascii_lowercase().as_str() {
        "service" | "service_type" => update.service_type = Some(value.parse()?),
        "budget" => update.budget = Some(parse_amount(value)?),
        "address" => update.address = Some(value.to_string()),
        "phone" => update.phone = Some(value.to_string()),
        "city" => update.city = Some(value.to_string()),
        "state" => update.state = Some(value.to_string()),
        "country" => update.country = Some(value.to_string()),
        "start" | "start_time" => update.start_time = Some(parse_start_time(value)?),
        "duration" | "duration_hours" => {
            update.duration_hours = Some(
                value
                    .parse::<u32>()
                    .ok()
                    .filter(|hours| *hours >= 1)
                    .ok_or_else(|| format!("'{value}' is not a number of hours"))?,
            )
        }
        "notes" => update.notes = Some(value.to_string()),
        other => return Err(format!("unknown field '{other}'")),
    }
    Ok(update)
}

/// Resolves a full id or a unique prefix of one of the bookings listed last.
pub fn resolve_booking_id(input: &str, known: &[BookingDTO]) -> Result<Uuid, String> {
    let input = input.trim();
    if let Ok(id) = Uuid::parse_str(input) {
        return Ok(id);
    }
    let prefix = input.to_ascii_lowercase().replace('-', "");
    if prefix.len() < 4 {
        return Err(format!("'{input}' is too short to identify a booking"));
    }
    let mut matches = known
        .iter()
        .filter(|b| b.id.simple().to_string().starts_with(&prefix));
    match (matches.next(), matches.next()) {
        (Some(booking), None) => Ok(booking.id),
        (Some(_), Some(_)) => Err(format!("'{input}' matches several bookings")),
        (None, _) => Err(format!("no listed booking starts with '{input}'; list them first")),
    }
}

fn parse_customer(name: &str, args: &[&str]) -> Result<Command, String> {
    match name {
        "services" => Ok(Command::Services),
        "book" => Ok(Command::Book),
        "bookings" => {
            let (status, page) = match args.first() {
                Some(first) if first.parse::<usize>().is_err() => {
                    (Some(first.parse::<BookingStatus>()?), args.get(1).copied())
                }
                first => (None, first.copied()),
            };
            Ok(Command::Bookings {
                status,
                page: page_arg(page)?,
            })
        }
        "edit" => match args {
            [id, field, value @ ..] if !value.is_empty() => Ok(Command::Edit {
                id: id.to_string(),
                update: field_update(field, &value.join(" "))?,
            }),
            _ => Err("usage: edit <id> <field> <value>".to_string()),
        },
        "cancel" => Ok(Command::Cancel(id_arg(args.first().copied(), "cancel <id>")?)),
        "pay" => Ok(Command::Pay(id_arg(args.first().copied(), "pay <id>")?)),
        "verify" => Ok(Command::Verify(id_arg(args.first().copied(), "verify <session>")?)),
        "covid" => match args {
            [country, rest @ ..] => Ok(Command::Covid {
                country: country.to_string(),
                state: rest.first().map(|s| s.to_string()),
                city: (rest.len() > 1).then(|| rest[1..].join(" ")),
            }),
            [] => Err("usage: covid <country> [state] [city]".to_string()),
        },
        "map" => Ok(Command::Map(id_arg(args.first().copied(), "map <id>")?)),
        other => Err(format!("unknown command '{other}', try 'help'")),
    }
}

fn parse_provider(name: &str, args: &[&str]) -> Result<Command, String> {
    match name {
        "tasks" => Ok(Command::Tasks {
            page: page_arg(args.first().copied())?,
        }),
        "received" => Ok(Command::Received {
            page: page_arg(args.first().copied())?,
        }),
        "accept" => match args {
            [id] => Ok(Command::Accept {
                id: id.to_string(),
                quote: None,
            }),
            [id, quote] => Ok(Command::Accept {
                id: id.to_string(),
                quote: Some(parse_amount(quote)?),
            }),
            _ => Err("usage: accept <id> [quote]".to_string()),
        },
        "start" => match args {
            [id, code] => Ok(Command::Start {
                id: id.to_string(),
                code: code.to_string(),
            }),
            _ => Err("usage: start <id> <code>".to_string()),
        },
        "complete" => Ok(Command::Complete(id_arg(args.first().copied(), "complete <id>")?)),
        other => Err(format!("unknown command '{other}', try 'help'")),
    }
}

pub fn parse(role: UserRole, line: &str) -> Result<Command, String> {
    let mut words = line.split_whitespace();
    let Some(name) = words.next() else {
        return Err("type a command, or 'help'".to_string());
    };
    let name = name.to_ascii_lowercase();
    let args: Vec<&str> = words.collect();

    match name.as_str() {
        "help" | "?" => Ok(Command::Help),
        "logout" | "quit" | "exit" => Ok(Command::Logout),
        "profile" | "me" => Ok(Command::Profile),
        "stats" => Ok(Command::Stats),
        "show" => Ok(Command::Show(id_arg(args.first().copied(), "show <id>")?)),
        other => match role {
            UserRole::Customer => parse_customer(other, &args),
            UserRole::Provider => parse_provider(other, &args),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use common::types::booking::ServiceType;

    fn booking_with_id(id: &str) -> BookingDTO {
        let now = Utc::now();
        BookingDTO {
            id: Uuid::parse_str(id).unwrap(),
            user: 1,
            customer_name: "Ana".into(),
            provider: None,
            service_type: ServiceType::Cleaning,
            budget: Some(100.0),
            provider_quote: None,
            address: None,
            phone: None,
            city: "Perth".into(),
            state: None,
            country: "AU".into(),
            start_time: now + Duration::days(1),
            duration_hours: 1,
            status: BookingStatus::Pending,
            confirmation_code: None,
            notes: None,
            payment_status: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn customer_commands() {
        let role = UserRole::Customer;
        assert_eq!(
            parse(role, "bookings completed 2"),
            Ok(Command::Bookings {
                status: Some(BookingStatus::Completed),
                page: 2
            })
        );
        assert_eq!(
            parse(role, "bookings 3"),
            Ok(Command::Bookings { status: None, page: 3 })
        );
        assert_eq!(
            parse(role, "covid au nsw port macquarie"),
            Ok(Command::Covid {
                country: "au".into(),
                state: Some("nsw".into()),
                city: Some("port macquarie".into()),
            })
        );
        assert!(parse(role, "bookings lost").is_err());
        assert!(parse(role, "accept 1234").is_err());
    }

    #[test]
    fn provider_commands() {
        let role = UserRole::Provider;
        assert_eq!(
            parse(role, "accept abcd1234 $95.50"),
            Ok(Command::Accept {
                id: "abcd1234".into(),
                quote: Some(95.5)
            })
        );
        assert_eq!(
            parse(role, "START abcd1234 0421"),
            Ok(Command::Start {
                id: "abcd1234".into(),
                code: "0421".into()
            })
        );
        assert!(parse(role, "accept abcd1234 -3").is_err());
        assert!(parse(role, "book").is_err());
        assert_eq!(parse(role, "tasks"), Ok(Command::Tasks { page: 1 }));
        assert!(parse(role, "tasks 0").is_err());
    }

    #[test]
    fn edit_builds_a_single_field_update() {
        let Ok(Command::Edit { update, .. }) =
            parse(UserRole::Customer, "edit abcd1234 notes gate code is 42")
        else {
            panic!("edit did not parse");
        };
        assert_eq!(update.notes.as_deref(), Some("gate code is 42"));
        assert_eq!(update.budget, None);

        let update = field_update("start", "2030-05-01 09:30").unwrap();
        assert_eq!(
            update.start_time,
            Some(Utc.with_ymd_and_hms(2030, 5, 1, 9, 30, 0).unwrap())
        );
        assert!(field_update("duration", "0").is_err());
        assert!(field_update("colour", "red").is_err());
        assert!(parse(UserRole::Customer, "edit abcd1234 budget").is_err());
    }

    #[test]
    fn ids_resolve_by_unique_prefix() {
        let known = vec![
            booking_with_id("6f1c2e4a-0000-4000-8000-000000000001"),
            booking_with_id("6f1c9999-0000-4000-8000-000000000002"),
        ];
        assert_eq!(resolve_booking_id("6f1c2e", &known), Ok(known[0].id));
        assert!(resolve_booking_id("6f1c", &known).is_err());
        assert!(resolve_booking_id("6f", &known).is_err());
        assert!(resolve_booking_id("aaaa", &known).is_err());
        assert_eq!(
            resolve_booking_id("6f1c9999-0000-4000-8000-000000000002", &[]),
            Ok(known[1].id)
        );
    }
}
