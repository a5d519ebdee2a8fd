pub mod device;
pub mod form;
pub mod providers;
pub mod status;
pub mod update;

use ad_consent::{ConsentStatus, DebugGeography};
use clap::{Parser, Subcommand, ValueEnum};

#[derive(Parser)]
#[command(
    name = "ad-consent",
    version,
    about = "Look up, collect and store ad-personalization consent"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Hashed device id to treat as a test device (repeatable)
    #[arg(long = "test-device", global = true)]
    pub test_devices: Vec<String>,

    /// Location to report for test devices
    #[arg(long, value_enum, default_value = "disabled", global = true)]
    pub debug_geo: GeographyArg,
}

#[derive(Subcommand)]
pub enum Command {
    /// Look up ad providers and region for your publisher ids
    Update {
        /// Publisher id (repeatable, at least one)
        #[arg(long = "pub-id", required = true)]
        publisher_ids: Vec<String>,
        /// Lookup endpoint to use instead of the default
        #[arg(long)]
        url: Option<String>,
    },
    /// Show the stored consent record
    Status {
        /// Output format
        #[arg(long, default_value = "terminal", value_parser = ["terminal", "json"])]
        format: String,
    },
    /// Set the consent status directly
    SetStatus {
        #[arg(value_enum)]
        status: StatusArg,
    },
    /// List ad providers from the last lookup
    Providers,
    /// Tag or untag the user as under the age of consent
    TagUnderAge {
        #[arg(action = clap::ArgAction::Set)]
        value: bool,
    },
    /// Show this device's hashed id and test-device status
    Device,
    /// Present the consent form in the terminal and store the answer
    Form {
        /// Your app's privacy policy URL
        #[arg(long)]
        privacy_url: String,
        /// App name shown in the form
        #[arg(long, default_value = "ad-consent")]
        app_name: String,
        /// Offer personalized ads
        #[arg(long)]
        personalized: bool,
        /// Offer non-personalized ads
        #[arg(long)]
        non_personalized: bool,
        /// Offer an ad-free option
        #[arg(long)]
        ad_free: bool,
    },
    /// Forget the stored consent record
    Reset,
}

#[derive(Clone, Copy, ValueEnum)]
pub enum GeographyArg {
    Disabled,
    Eea,
    NotEea,
}

impl From<GeographyArg> for DebugGeography {
    fn from(arg: GeographyArg) -> Self {
        match arg {
            GeographyArg::Disabled => DebugGeography::Disabled,
            GeographyArg::Eea => DebugGeography::Eea,
            GeographyArg::NotEea => DebugGeography::NotEea,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
pub enum StatusArg {
    Unknown,
    NonPersonalized,
    Personalized,
}

impl From<StatusArg> for ConsentStatus {
    fn from(arg: StatusArg) -> Self {
        match arg {
            StatusArg::Unknown => ConsentStatus::Unknown,
            StatusArg::NonPersonalized => ConsentStatus::NonPersonalized,
            StatusArg::Personalized => ConsentStatus::Personalized,
        }
    }
}
