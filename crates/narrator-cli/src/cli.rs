//! Command line interface for the narrator

use clap::Parser;
use std::path::PathBuf;

/// Narrate a text document into a single audio file using Google Cloud
/// Text-to-Speech, printing a table of contents of its `== headings ==`.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Text to narrate (stdin is read when neither this nor --text is given)
    pub input: Option<String>,

    /// Read the text to narrate from a file
    #[arg(short, long, env = "TTS_TEXT")]
    pub text: Option<PathBuf>,

    /// Output audio file; its extension picks the audio encoding
    #[arg(short, long, env = "TTS_OUTPUT", default_value = "out.mp3")]
    pub output: PathBuf,

    /// Configuration file (TOML); defaults to <config dir>/narrator/config.toml
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Print the merged configuration as TOML and exit
    #[arg(long)]
    pub print_config: bool,

    /// Print the result as JSON instead of a table of contents
    #[arg(long)]
    pub json: bool,

    /// Log every step instead of printing the table of contents
    #[arg(short, long, env = "TTS_LOG")]
    pub log: bool,

    /// Keep per-chunk markup and audio in <output>.parts
    #[arg(short, long)]
    pub keep: bool,

    /// Maximum synthesis attempts per chunk
    #[arg(short, long)]
    pub retries: Option<u32>,

    /// Maximum synthesis requests in flight
    #[arg(long)]
    pub concurrency: Option<usize>,

    /// Audio codec for the final file (copy concatenates as is)
    #[arg(short, long)]
    pub acodec: Option<String>,

    /// Speech API base URL
    #[arg(long)]
    pub endpoint: Option<String>,

    /// Audio encoding (MP3, LINEAR16, OGG_OPUS, MULAW, ALAW)
    #[arg(long)]
    pub audio_encoding: Option<String>,

    /// Audio sample rate in hertz
    #[arg(long)]
    pub audio_frequency: Option<u32>,

    /// Language code, e.g. en-GB
    #[arg(long)]
    pub language_code: Option<String>,

    /// Voice name, e.g. en-GB-Wavenet-A
    #[arg(long)]
    pub voice_name: Option<String>,

    /// Voice gender (neutral, male, female)
    #[arg(long)]
    pub voice_gender: Option<String>,

    /// Voice pitch in semitones
    #[arg(long, allow_hyphen_values = true)]
    pub voice_pitch: Option<f64>,

    /// Speaking rate multiplier
    #[arg(long)]
    pub voice_rate: Option<f64>,

    /// Volume gain in dB
    #[arg(long, allow_hyphen_values = true)]
    pub voice_volume: Option<f64>,

    /// Pause around quoted text, in milliseconds
    #[arg(long)]
    pub quote_break: Option<f64>,

    /// Emphasis level of quoted text
    #[arg(long)]
    pub quote_emphasis: Option<String>,

    /// Base pause before a heading, in milliseconds
    #[arg(long)]
    pub heading_break: Option<f64>,

    /// Pause reduction per heading level, in milliseconds
    #[arg(long)]
    pub heading_difference: Option<f64>,

    /// Emphasis level of headings
    #[arg(long)]
    pub heading_emphasis: Option<String>,

    /// Pause after an ellipsis, in milliseconds
    #[arg(long)]
    pub ellipsis_break: Option<f64>,

    /// Pause after a dash, in milliseconds
    #[arg(long)]
    pub dash_break: Option<f64>,

    /// Pause at a line break, in milliseconds
    #[arg(long)]
    pub newline_break: Option<f64>,

    /// Preferred character to split chunks after
    #[arg(long)]
    pub block_separator: Option<char>,

    /// Maximum markup length of one chunk, in bytes
    #[arg(long)]
    pub block_length: Option<usize>,
}
