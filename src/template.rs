//! Reminder message template rendering.
//!
//! Substitution is plain string replacement of fixed placeholder tokens.
//! The template is never interpreted as code, and unknown placeholders are
//! left verbatim so a typo in a tenant's template degrades to visible text
//! instead of an error.

use chrono::NaiveDate;

/// Field values substituted into a message template.
#[derive(Debug, Clone, Default)]
pub struct TemplateFields {
    pub client_name: String,
    pub resource: String,
    pub date: String,
    pub business_name: String,
    pub business_contact: String,
}

impl TemplateFields {
    /// Placeholder tokens recognized in templates, paired with the field
    /// each one resolves to.
    fn pairs(&self) -> [(&'static str, &str); 5] {
        [
            ("{client_name}", &self.client_name),
            ("{resource}", &self.resource),
            ("{date}", &self.date),
            ("{business_name}", &self.business_name),
            ("{business_contact}", &self.business_contact),
        ]
    }
}

/// Format a reminder date the way it appears in outgoing messages.
pub fn format_reminder_date(date: NaiveDate) -> String {
    date.format("%d/%m/%Y").to_string()
}

/// Replace every occurrence of each known placeholder with its field value.
pub fn render(template: &str, fields: &TemplateFields) -> String {
    let mut out = template.to_string();
    for (token, value) in fields.pairs() {
        out = out.replace(token, value);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fields() -> TemplateFields {
        TemplateFields {
            client_name: "Ana".into(),
            resource: "Fiat Punto".into(),
            date: "08/03/2025".into(),
            business_name: "Oficina Silva".into(),
            business_contact: "21 123 4567".into(),
        }
    }

    #[test]
    fn substitutes_all_occurrences() {
        let out = render("{client_name}, hi {client_name}! Due {date}.", &fields());
        assert_eq!(out, "Ana, hi Ana! Due 08/03/2025.");
    }

    #[test]
    fn unknown_placeholders_are_left_verbatim() {
        let out = render("Hi {client_name}, ref {booking_id}", &fields());
        assert_eq!(out, "Hi Ana, ref {booking_id}");
    }

    #[test]
    fn empty_template_renders_empty() {
        assert_eq!(render("", &fields()), "");
    }

    #[test]
    fn date_formatting() {
        let d = NaiveDate::from_ymd_opt(2025, 3, 8).unwrap();
        assert_eq!(format_reminder_date(d), "08/03/2025");
    }
}
