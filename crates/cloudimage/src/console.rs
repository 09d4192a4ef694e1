use cloudimage_core::Ui;
use colored::Colorize;

/// Terminal UI: step announcements in bold, details indented, errors in red.
#[derive(Debug, Default, Clone, Copy)]
pub struct ConsoleUi;

impl Ui for ConsoleUi {
    fn say(&self, message: &str) {
        println!("{} {}", "==>".green().bold(), message.bold());
    }

    fn message(&self, message: &str) {
        for line in message.lines() {
            println!("    {}", line);
        }
    }

    fn error(&self, message: &str) {
        eprintln!("{} {}", "==>".red().bold(), message.red());
    }
}
