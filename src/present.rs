//! Caller-facing rendering of failure events
//!
//! Pure formatting; the dispatcher decides whether anything is shown and
//! performs the write.

use crate::config::{InterfaceKind, RunConfiguration};
use crate::event::FailureEvent;

/// Render an event for the caller.
///
/// | interface | debug | shape                                   |
/// |-----------|-------|-----------------------------------------|
/// | cli       | any   | `[label] message in file F #L`          |
/// | network   | true  | `<p>[label] <b>message</b><br/>F #L</p>` |
/// | network   | false | `<b>label:</b> message<br>`             |
///
/// Missing file and line render as empty and zero.
pub fn render(event: &FailureEvent, config: &RunConfiguration) -> String {
    let label = event.label();
    match config.interface_kind {
        InterfaceKind::Cli => format!(
            "[{}] {} in file {} #{}\n",
            label,
            event.message,
            event.file(),
            event.line()
        ),
        InterfaceKind::Network if config.debug_mode => format!(
            "<p>[{}] <b>{}</b><br/>{} #{}</p>",
            escape_html(&label),
            escape_html(&event.message),
            escape_html(event.file()),
            event.line()
        ),
        InterfaceKind::Network => format!(
            "<b>{}:</b> {}<br>",
            escape_html(&label),
            escape_html(&event.message)
        ),
    }
}

fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::Origin;

    fn warning() -> FailureEvent {
        FailureEvent::new(2, "divide by zero risk", Origin::RuntimeSignal)
            .with_location("calc.x", 42)
    }

    #[test]
    fn test_cli_render() {
        let config = RunConfiguration::with_interface(true, InterfaceKind::Cli);
        assert_eq!(
            render(&warning(), &config),
            "[Warning] divide by zero risk in file calc.x #42\n"
        );
    }

    #[test]
    fn test_cli_render_ignores_debug_flag() {
        let debug = RunConfiguration::with_interface(true, InterfaceKind::Cli);
        let production = RunConfiguration::with_interface(false, InterfaceKind::Cli);
        assert_eq!(render(&warning(), &debug), render(&warning(), &production));
    }

    #[test]
    fn test_network_debug_render() {
        let config = RunConfiguration::with_interface(true, InterfaceKind::Network);
        assert_eq!(
            render(&warning(), &config),
            "<p>[Warning] <b>divide by zero risk</b><br/>calc.x #42</p>"
        );
    }

    #[test]
    fn test_network_production_render_hides_location() {
        let config = RunConfiguration::with_interface(false, InterfaceKind::Network);
        let text = render(&warning(), &config);
        assert_eq!(text, "<b>Warning:</b> divide by zero risk<br>");
        assert!(!text.contains("calc.x"));
    }

    #[test]
    fn test_missing_location_renders_empty_and_zero() {
        let config = RunConfiguration::with_interface(false, InterfaceKind::Cli);
        let event = FailureEvent::new(0, "boom", Origin::UncaughtException);
        assert_eq!(render(&event, &config), "[Exception] boom in file  #0\n");
    }

    #[test]
    fn test_unknown_code_renders_raw() {
        let config = RunConfiguration::with_interface(false, InterfaceKind::Cli);
        let event = FailureEvent::new(3, "odd", Origin::RuntimeSignal);
        assert!(render(&event, &config).starts_with("[3] odd"));
    }

    #[test]
    fn test_network_escapes_markup() {
        let config = RunConfiguration::with_interface(false, InterfaceKind::Network);
        let event = FailureEvent::new(2, "<script>&", Origin::RuntimeSignal);
        assert_eq!(render(&event, &config), "<b>Warning:</b> &lt;script&gt;&amp;<br>");
    }
}
