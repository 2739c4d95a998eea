use std::path::PathBuf;

use clap::{ArgAction, Args, Parser, Subcommand};

pub const DEFAULT_CONFIG_ID: &str = "flat-demo";

/// chipdoc - edit, preview and compile chip tracker modules
#[derive(Parser, Debug)]
#[command(name = "chipdoc")]
#[command(about = "Edit, preview and compile chip tracker modules")]
#[command(version)]
pub struct Cli {
    /// Log more detail: -v info, -vv debug, -vvv trace
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Log file (default: <config dir>/chipdoc/chipdoc.log)
    #[arg(long, global = true)]
    pub log_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Create a module from a configuration
    New {
        file: PathBuf,

        /// Configuration id, built in or under <config dir>/chipdoc/configs
        #[arg(long, default_value = DEFAULT_CONFIG_ID)]
        config: String,

        /// Rows per pattern block (default: defaults.block_length)
        #[arg(long, value_parser = parse_count)]
        rows: Option<usize>,
    },

    /// Show the header and node outline
    Info { file: PathBuf },

    /// Apply `;`-separated edit commands and save
    Edit {
        file: PathBuf,

        /// e.g. "set GLOBAL/0 BPM 0 140; insert GLOBAL/0/PATTERNS/0/NOTES/0 NOTE 2 c4"
        commands: String,

        /// Append the applied edits to the module's journal
        #[arg(long)]
        journal: bool,
    },

    /// Compile a module to a binary image or an assembly listing
    Compile {
        file: PathBuf,

        #[command(flatten)]
        output: OutputArgs,
    },

    /// Compile a preview derived from one order entry
    Preview {
        file: PathBuf,

        /// Group holding the order list, e.g. PATTERNS
        group: String,

        /// Order list entry
        #[arg(value_parser = parse_count)]
        position: usize,

        /// Keep only this row of each referenced pattern
        #[arg(long, value_parser = parse_count)]
        row: Option<usize>,

        #[command(flatten)]
        output: OutputArgs,
    },

    /// Re-apply an edit journal to a base module
    Replay {
        journal: PathBuf,
        base: PathBuf,
        out: PathBuf,
    },
}

#[derive(Args, Debug)]
pub struct OutputArgs {
    /// Output file; binary output needs one
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Write an assembly listing instead of a binary image
    #[arg(long)]
    pub asm: bool,

    /// Load address: $c000, 0xc000 or decimal (default: defaults.origin)
    #[arg(long, value_parser = parse_origin)]
    pub origin: Option<u32>,
}

/// `$c000`, `0xc000` or decimal.
pub fn parse_number(text: &str) -> Result<i64, String> {
    let parsed = match text.strip_prefix("0x") {
        Some(hex) => i64::from_str_radix(hex, 16).ok(),
        None => chipdoc_types::Value::parse_bare(text).as_int(),
    };
    parsed.ok_or_else(|| format!("'{}' is not a number", text))
}

fn parse_count(text: &str) -> Result<usize, String> {
    usize::try_from(parse_number(text)?).map_err(|_| format!("'{}' must not be negative", text))
}

fn parse_origin(text: &str) -> Result<u32, String> {
    u32::try_from(parse_number(text)?).map_err(|_| format!("origin {} out of range", text))
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    fn parse(line: &str) -> Result<Cli, clap::Error> {
        Cli::try_parse_from(std::iter::once("chipdoc").chain(line.split_whitespace()))
    }

    #[test]
    fn verify_cli() {
        Cli::command().debug_assert();
    }

    #[test]
    fn compile_options() {
        let cli = parse("compile song.chip --asm -o out.s --origin $c000").unwrap();
        let Command::Compile { file, output } = cli.command else {
            panic!("expected compile");
        };
        assert_eq!(file, PathBuf::from("song.chip"));
        assert!(output.asm);
        assert_eq!(output.output, Some(PathBuf::from("out.s")));
        assert_eq!(output.origin, Some(0xc000));
    }

    #[test]
    fn verbosity_counts_anywhere() {
        assert_eq!(parse("info a.chip").unwrap().verbose, 0);
        assert_eq!(parse("-v info a.chip").unwrap().verbose, 1);
        assert_eq!(parse("info a.chip -vv").unwrap().verbose, 2);
        let cli = parse("--log-file x.log info a.chip").unwrap();
        assert_eq!(cli.log_file, Some(PathBuf::from("x.log")));
    }

    #[test]
    fn new_defaults_to_the_demo_config() {
        let Command::New { config, rows, .. } = parse("new a.chip").unwrap().command else {
            panic!("expected new");
        };
        assert_eq!(config, DEFAULT_CONFIG_ID);
        assert_eq!(rows, None);
    }

    #[test]
    fn numbers() {
        assert_eq!(parse_number("$ff"), Ok(255));
        assert_eq!(parse_number("0x10"), Ok(16));
        assert_eq!(parse_number("12"), Ok(12));
        assert!(parse_number("c4").is_err());
        assert!(parse_count("-3").is_err());
        assert!(parse_origin("$100000000").is_err());
    }

    #[test]
    fn usage_errors() {
        assert!(parse("frobnicate").is_err());
        assert!(parse("new a.chip --config").is_err());
        assert!(parse("new a.chip --rows many").is_err());
        assert!(parse("preview a.chip PATTERNS").is_err());
        assert!(parse("replay j.jsonl base.chip").is_err());
    }
}
