//! Line commands accepted by the interactive dashboard

use crate::config::RefreshInterval;
use crate::view::DashboardTab;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConsoleCommand {
    Refresh,
    ToggleAuto,
    Interval(RefreshInterval),
    Tab(DashboardTab),
    Help,
    Quit,
}

impl ConsoleCommand {
    pub const HELP: &'static str = "commands: r(efresh) | a(uto) | 10 | 30 | 60 | overview | endpoints | users | history | q(uit)";

    /// Parse one input line. Blank and unrecognised lines yield `None`.
    pub fn parse(line: &str) -> Option<Self> {
        let input = line.trim().to_lowercase();
        match input.as_str() {
            "" => None,
            "r" | "refresh" => Some(ConsoleCommand::Refresh),
            "a" | "auto" => Some(ConsoleCommand::ToggleAuto),
            "h" | "help" | "?" => Some(ConsoleCommand::Help),
            "q" | "quit" | "exit" => Some(ConsoleCommand::Quit),
            other => other
                .parse::<RefreshInterval>()
                .map(ConsoleCommand::Interval)
                .or_else(|_| other.parse::<DashboardTab>().map(ConsoleCommand::Tab))
                .ok(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_commands() {
        assert_eq!(ConsoleCommand::parse("r"), Some(ConsoleCommand::Refresh));
        assert_eq!(ConsoleCommand::parse(" Refresh \n"), Some(ConsoleCommand::Refresh));
        assert_eq!(ConsoleCommand::parse("a"), Some(ConsoleCommand::ToggleAuto));
        assert_eq!(ConsoleCommand::parse("q"), Some(ConsoleCommand::Quit));
        assert_eq!(ConsoleCommand::parse("?"), Some(ConsoleCommand::Help));
    }

    #[test]
    fn test_parse_interval_and_tab() {
        assert_eq!(
            ConsoleCommand::parse("10"),
            Some(ConsoleCommand::Interval(RefreshInterval::TenSeconds))
        );
        assert_eq!(
            ConsoleCommand::parse("1min"),
            Some(ConsoleCommand::Interval(RefreshInterval::SixtySeconds))
        );
        assert_eq!(
            ConsoleCommand::parse("users"),
            Some(ConsoleCommand::Tab(DashboardTab::Users))
        );
    }

    #[test]
    fn test_parse_rejects_unknown_input() {
        assert_eq!(ConsoleCommand::parse(""), None);
        assert_eq!(ConsoleCommand::parse("45"), None);
        assert_eq!(ConsoleCommand::parse("settings"), None);
    }
}
