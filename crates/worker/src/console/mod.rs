use console::style;

/// Operator-facing terminal output for startup and checks. Runtime events
/// go through the log facade instead.
pub(crate) struct Console;

impl Console {
    const fn get_width() -> usize {
        40
    }

    fn horizontal_border() -> String {
        "═".repeat(Self::get_width())
    }

    pub(crate) fn section(title: &str) {
        println!();
        let width = Self::get_width();
        let formatted_title = format!("{title:^width$}");
        let border = Self::horizontal_border();

        println!("{}", style(format!("╔{border}╗")).magenta().bold());
        println!("{}", style(formatted_title).magenta().bold());
        println!("{}", style(format!("╚{border}╝")).magenta().bold());
    }

    pub(crate) fn title(text: &str) {
        println!();
        println!("{}", style(text).magenta().bold().underlined());
    }

    pub(crate) fn info(label: &str, value: &str) {
        println!("{}: {}", style(label).dim().magenta(), style(value).white());
    }

    pub(crate) fn success(text: &str) {
        println!("{} {}", style("✓").green().bold(), style(text).green());
    }

    pub(crate) fn warning(text: &str) {
        println!("{} {}", style("⚠").yellow().bold(), style(text).yellow());
    }

    pub(crate) fn user_error(text: &str) {
        eprintln!("{} {}", style("✗").red().bold(), style(text).red());
    }

    pub(crate) fn progress(text: &str) {
        println!("{} {}", style("→").cyan().bold(), style(text).cyan());
    }
}
