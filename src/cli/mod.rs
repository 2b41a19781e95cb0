use clap::{Parser, Subcommand, ValueEnum};

#[derive(Parser)]
#[command(
    name = "transcrify",
    about = "Transcrify - Turn YouTube, Instagram and TikTok videos into paragraph-structured transcripts",
    version,
    long_about = "Downloads the audio track of a video URL (yt-dlp for YouTube, a rotating pool of Cobalt instances for everything else) and transcribes it with a Whisper-compatible API. Run it as an HTTP service with API keys, rate limiting and signed webhooks, or transcribe a single URL from the command line."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Disable progress indicators
    #[arg(short, long, global = true)]
    pub quiet: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the HTTP API
    Serve {
        /// Address to bind (overrides config and HOST)
        #[arg(long, value_name = "HOST")]
        host: Option<String>,

        /// Port to listen on (overrides config and PORT)
        #[arg(short, long, value_name = "PORT")]
        port: Option<u16>,
    },

    /// Transcribe a single video URL and print the result
    Transcribe {
        /// Video URL (YouTube, Instagram, TikTok, ...)
        #[arg(value_name = "URL")]
        url: String,

        /// Output format
        #[arg(short, long, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// Show the effective configuration
    Config {
        /// Show current configuration
        #[arg(short, long)]
        show: bool,
    },

    /// List supported platforms
    Platforms,
}

#[derive(ValueEnum, Clone, Debug, PartialEq, Eq)]
pub enum OutputFormat {
    /// Title, duration and paragraphs
    Text,
    /// Full response as JSON
    Json,
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputFormat::Text => write!(f, "text"),
            OutputFormat::Json => write!(f, "json"),
        }
    }
}
