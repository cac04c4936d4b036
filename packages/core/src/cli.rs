use clap::{Parser, Subcommand};

/// Meal resilience diagnostics CLI
#[derive(Debug, Parser)]
#[command(
    name = "meal-resilience",
    version,
    about = "Inspect persisted error reports and probe endpoints through the retry executor"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Print persisted error reports as JSON lines, oldest first
    Reports {
        /// Only print the newest N reports
        #[arg(long)]
        limit: Option<usize>,
    },

    /// Remove all persisted error reports
    ClearReports,

    /// GET a URL with retry and print the classified outcome
    Probe {
        url: String,

        /// Overrides RESILIENCE_MAX_RETRIES
        #[arg(long)]
        max_retries: Option<u32>,

        /// Overrides RESILIENCE_BASE_DELAY_MS
        #[arg(long)]
        base_delay_ms: Option<u64>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_probe_with_overrides() {
        let cli = Cli::try_parse_from([
            "meal-resilience",
            "probe",
            "http://localhost:8080/menu",
            "--max-retries",
            "1",
            "--base-delay-ms",
            "50",
        ])
        .unwrap();

        match cli.command {
            Command::Probe {
                url,
                max_retries,
                base_delay_ms,
            } => {
                assert_eq!(url, "http://localhost:8080/menu");
                assert_eq!(max_retries, Some(1));
                assert_eq!(base_delay_ms, Some(50));
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn parses_reports_and_clear() {
        let cli = Cli::try_parse_from(["meal-resilience", "reports", "--limit", "5"]).unwrap();
        assert!(matches!(cli.command, Command::Reports { limit: Some(5) }));

        let cli = Cli::try_parse_from(["meal-resilience", "clear-reports"]).unwrap();
        assert!(matches!(cli.command, Command::ClearReports));
    }

    #[test]
    fn subcommand_is_required() {
        assert!(Cli::try_parse_from(["meal-resilience"]).is_err());
    }
}
