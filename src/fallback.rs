//! Degraded booking path: when the booking cannot be stored, the client gets
//! a `mailto:` link carrying the request so it can be sent by e-mail instead.

use crate::models::CreateBooking;
use crate::scheduling::interval::format_hhmm;

pub fn mailto_link(address: &str, request: &CreateBooking, service_name: Option<&str>) -> String {
    let service = service_name
        .map(str::to_string)
        .unwrap_or_else(|| format!("service #{}", request.service_id));

    let subject = format!("Booking request - {service}");

    let mut body = format!(
        "Booking request\n\nName: {}\nPhone: {}\n",
        request.client_name.trim(),
        request.client_phone.trim()
    );
    if let Some(email) = request.client_email.as_deref().filter(|e| !e.trim().is_empty()) {
        body.push_str(&format!("E-mail: {}\n", email.trim()));
    }
    body.push_str(&format!(
        "Service: {service}\nDate: {}\nTime: {}\n",
        request.booking_date,
        format_hhmm(request.start_time)
    ));
    if let Some(notes) = request.notes.as_deref().filter(|n| !n.trim().is_empty()) {
        body.push_str(&format!("Notes: {}\n", notes.trim()));
    }
    body.push_str("\nPlease confirm the appointment.");

    format!(
        "mailto:{address}?subject={}&body={}",
        percent_encode(&subject),
        percent_encode(&body)
    )
}

/// RFC 3986 percent-encoding of everything outside the unreserved set.
fn percent_encode(value: &str) -> String {
    let mut out = String::with_capacity(value.len() * 3);
    for byte in value.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => out.push(byte as char),
            _ => out.push_str(&format!("%{byte:02X}")),
        }
    }
    out
}
