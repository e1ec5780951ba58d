//! Terminal palette for CLI output.
//!
//! Plain ANSI bright colors, so it renders the same on any terminal.

use colored::{ColoredString, Colorize};

use crate::models::{DomainStatus, WebsiteStatus};
use crate::status::SslWarningLevel;

pub trait PaletteExt {
    fn heading(&self) -> ColoredString;
    fn label(&self) -> ColoredString;
    fn muted(&self) -> ColoredString;
    fn good(&self) -> ColoredString;
    fn caution(&self) -> ColoredString;
    fn bad(&self) -> ColoredString;
}

impl<S: AsRef<str>> PaletteExt for S {
    fn heading(&self) -> ColoredString {
        self.as_ref().bright_blue().bold()
    }

    fn label(&self) -> ColoredString {
        self.as_ref().bright_cyan().bold()
    }

    fn muted(&self) -> ColoredString {
        self.as_ref().bright_black()
    }

    fn good(&self) -> ColoredString {
        self.as_ref().bright_green().bold()
    }

    fn caution(&self) -> ColoredString {
        self.as_ref().bright_yellow().bold()
    }

    fn bad(&self) -> ColoredString {
        self.as_ref().bright_red().bold()
    }
}

/// Color a piece of text by how worrying a website status is.
pub fn paint_website(status: WebsiteStatus, text: &str) -> ColoredString {
    match status {
        WebsiteStatus::Online => text.good(),
        WebsiteStatus::Offline => text.bad(),
        WebsiteStatus::Error => text.caution(),
    }
}

pub fn paint_domain(status: DomainStatus, text: &str) -> ColoredString {
    match status {
        DomainStatus::Active => text.good(),
        DomainStatus::ExpiringSoon => text.caution(),
        DomainStatus::Expired | DomainStatus::Error => text.bad(),
    }
}

pub fn paint_ssl_level(level: SslWarningLevel, text: &str) -> ColoredString {
    match level {
        SslWarningLevel::Critical => text.bad(),
        SslWarningLevel::Warning => text.caution(),
        SslWarningLevel::Info => text.label(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_paint_keeps_text() {
        colored::control::set_override(false);
        assert_eq!(paint_website(WebsiteStatus::Offline, "OFFLINE").to_string(), "OFFLINE");
        assert_eq!(paint_domain(DomainStatus::Expired, "EXPIRED").to_string(), "EXPIRED");
        assert_eq!("x".heading().to_string(), "x");
    }
}
