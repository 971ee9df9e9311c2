use clap::{Args, Parser, Subcommand};
use insurance_service::{Gender, RequestType};

/// HCX portal command line client
#[derive(Parser, Debug)]
#[command(name = "hcx", version)]
#[command(about = "Submit eligibility checks and claims and follow them to their result")]
pub struct Cli {
    /// Portal server origin
    #[arg(long, env = "HCX_BASE_URL", default_value = "http://localhost:8080", global = true)]
    pub base_url: String,

    /// Notification WebSocket URL
    #[arg(long, env = "HCX_WS_URL", default_value = "ws://localhost:8080/ws", global = true)]
    pub ws_url: String,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// List the bundled test scenarios
    Scenarios,
    /// Run a coverage eligibility check
    Check(RequestArgs),
    /// Submit a claim
    Claim(RequestArgs),
}

impl Command {
    pub fn request_type(&self) -> Option<RequestType> {
        match self {
            Command::Scenarios => None,
            Command::Check(_) => Some(RequestType::Eligibility),
            Command::Claim(_) => Some(RequestType::Claim),
        }
    }
}

#[derive(Args, Debug, Clone)]
pub struct RequestArgs {
    /// Insurance policy identifier
    #[arg(long)]
    pub policy_id: String,

    /// Beneficiary name
    #[arg(long)]
    pub name: String,

    /// Beneficiary gender (male or female)
    #[arg(long)]
    pub gender: Gender,

    /// Scenario index from `hcx scenarios`; the selected scenario is used when omitted
    #[arg(long)]
    pub scenario: Option<u32>,

    /// Seconds to wait for the result after the request is acknowledged
    #[arg(long, default_value_t = 200)]
    pub timeout: u64,

    /// HTTP timeout in seconds for the submission itself
    #[arg(long, default_value_t = 30)]
    pub request_timeout: u64,

    /// Print the full lifecycle snapshot instead of the summary
    #[arg(long)]
    pub raw: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_eligibility_check() {
        let cli = Cli::try_parse_from([
            "hcx",
            "check",
            "--policy-id",
            "PL-1",
            "--name",
            "Asha Menon",
            "--gender",
            "female",
            "--scenario",
            "2",
        ])
        .unwrap();

        assert_eq!(cli.command.request_type(), Some(RequestType::Eligibility));
        let Command::Check(args) = cli.command else {
            panic!("expected check");
        };
        assert_eq!(args.gender, Gender::Female);
        assert_eq!(args.scenario, Some(2));
        assert_eq!(args.timeout, 200);
    }

    #[test]
    fn rejects_unknown_gender() {
        let result = Cli::try_parse_from([
            "hcx", "claim", "--policy-id", "PL-1", "--name", "A", "--gender", "other",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn global_urls_accepted_after_subcommand() {
        let cli = Cli::try_parse_from(["hcx", "scenarios", "--base-url", "http://portal:9000"]).unwrap();
        assert_eq!(cli.base_url, "http://portal:9000");
        assert!(cli.command.request_type().is_none());
    }
}
