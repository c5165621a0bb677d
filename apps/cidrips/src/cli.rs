//! Command-line surface.

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use cidrips_aggregate::{AggregationConfig, Policy, SearchStrategy};
use cidrips_core::Family;
use clap::{ArgAction, ArgGroup, Parser, ValueEnum};

#[derive(Parser, Debug)]
#[command(name = "cidrips")]
#[command(about = "Compress a list of IP addresses and networks into CIDR blocks")]
#[command(version)]
#[command(group(ArgGroup::new("existing").args(["overwrite", "append", "cancel"])))]
pub struct Cli {
    /// Input file, `-` for stdin
    #[arg(short, long, value_name = "FILE")]
    pub input: String,

    /// Output file, `-` for stdout
    #[arg(short, long, value_name = "FILE", default_value = "-")]
    pub output: String,

    /// Address family of the input (4 or 6)
    #[arg(short, long, default_value = "4", value_parser = parse_family)]
    pub family: Family,

    /// Compression mode
    #[arg(short, long, value_enum)]
    pub mode: Option<Mode>,

    /// Compression level (level mode)
    #[arg(short, long)]
    pub level: Option<u32>,

    /// Maximum number of output blocks (count mode)
    #[arg(short, long, value_parser = clap::value_parser!(u64).range(1..))]
    pub count: Option<u64>,

    /// Level search used by count mode
    #[arg(long, value_enum)]
    pub search: Option<Search>,

    /// Text written before each block; `\n`, `\r` and `\t` are unescaped
    #[arg(short, long, default_value = "", value_parser = unescape)]
    pub prefix: String,

    /// Text written after each block; `\n`, `\r` and `\t` are unescaped
    #[arg(short = 'P', long, default_value = "\\n", value_parser = unescape)]
    pub postfix: String,

    /// Overwrite a non-empty output file
    #[arg(short = 'O', long)]
    pub overwrite: bool,

    /// Append to a non-empty output file
    #[arg(short = 'A', long)]
    pub append: bool,

    /// Give up if the output file is not empty
    #[arg(short = 'C', long)]
    pub cancel: bool,

    /// Do not print statistics
    #[arg(long)]
    pub no_stats: bool,

    /// Print statistics as JSON
    #[arg(long)]
    pub json: bool,

    /// Aggregation config file (JSON); flags take precedence
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Raise log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = ArgAction::Count)]
    pub verbose: u8,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum Mode {
    Level,
    Count,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum Search {
    Linear,
    Binary,
}

/// What to do with an output file that already has content.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OnExisting {
    Overwrite,
    Append,
    Cancel,
    Ask,
}

impl Cli {
    pub fn reads_stdin(&self) -> bool {
        self.input == "-"
    }

    pub fn writes_stdout(&self) -> bool {
        self.output == "-"
    }

    pub fn on_existing(&self) -> OnExisting {
        if self.overwrite {
            OnExisting::Overwrite
        } else if self.append {
            OnExisting::Append
        } else if self.cancel {
            OnExisting::Cancel
        } else {
            OnExisting::Ask
        }
    }

    /// Load the `--config` file, or the defaults when none is given.
    pub fn base_config(&self) -> Result<AggregationConfig> {
        match &self.config {
            Some(path) => {
                let text = std::fs::read_to_string(path)
                    .with_context(|| format!("Failed to read config {}", path.display()))?;
                AggregationConfig::from_json(&text)
                    .with_context(|| format!("Invalid config {}", path.display()))
            }
            None => Ok(AggregationConfig::default()),
        }
    }

    /// Apply the mode flags on top of `base`.
    ///
    /// The mode comes from `-m`, falling back to the policy in `base`. Giving
    /// the option of the other mode is an error.
    pub fn aggregation_config(&self, base: AggregationConfig) -> Result<AggregationConfig> {
        let mode = self.mode.unwrap_or(match base.policy {
            Policy::Level { .. } => Mode::Level,
            Policy::Count { .. } => Mode::Count,
        });

        let policy = match mode {
            Mode::Level => {
                if self.count.is_some() {
                    bail!("--count is only valid in count mode");
                }
                let inherited = match base.policy {
                    Policy::Level { level } => level,
                    Policy::Count { .. } => 0,
                };
                Policy::Level {
                    level: self.level.unwrap_or(inherited),
                }
            }
            Mode::Count => {
                if self.level.is_some() {
                    bail!("--level is only valid in level mode");
                }
                let target = match (self.count, base.policy) {
                    (Some(count), _) => usize::try_from(count)
                        .with_context(|| format!("--count {} is too large", count))?,
                    (None, Policy::Count { target }) => target,
                    (None, Policy::Level { .. }) => bail!("count mode requires --count"),
                };
                Policy::Count { target }
            }
        };

        let search = match self.search {
            Some(Search::Linear) => SearchStrategy::Linear,
            Some(Search::Binary) => SearchStrategy::Binary,
            None => base.search,
        };

        let config = AggregationConfig {
            policy,
            search,
            node_limit: base.node_limit,
        };
        config.validate()?;
        Ok(config)
    }
}

fn parse_family(s: &str) -> Result<Family, String> {
    let version: u8 = s
        .parse()
        .map_err(|_| format!("expected 4 or 6, got `{}`", s))?;
    Family::try_from(version).map_err(|v| format!("expected 4 or 6, got `{}`", v))
}

/// Replace `\n`, `\r` and `\t`; any other backslash sequence stays as typed.
pub fn unescape(s: &str) -> Result<String, String> {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('r') => out.push('\r'),
            Some('t') => out.push('\t'),
            Some(other) => {
                out.push('\\');
                out.push(other);
            }
            None => out.push('\\'),
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        let mut argv = vec!["cidrips"];
        argv.extend_from_slice(args);
        Cli::try_parse_from(argv).unwrap()
    }

    #[test]
    fn test_unescape() {
        assert_eq!(unescape("a\\nb").unwrap(), "a\nb");
        assert_eq!(unescape("\\r\\n\\t").unwrap(), "\r\n\t");
        assert_eq!(unescape("\\x\\\\").unwrap(), "\\x\\\\");
        assert_eq!(unescape("end\\").unwrap(), "end\\");
        assert_eq!(unescape("").unwrap(), "");
    }

    #[test]
    fn test_defaults() {
        let cli = parse(&["-i", "in.txt"]);
        assert_eq!(cli.output, "-");
        assert_eq!(cli.family, Family::V4);
        assert_eq!(cli.prefix, "");
        assert_eq!(cli.postfix, "\n");
        assert_eq!(cli.on_existing(), OnExisting::Ask);
        assert!(!cli.reads_stdin());
        assert!(cli.writes_stdout());

        let config = cli.aggregation_config(AggregationConfig::default()).unwrap();
        assert_eq!(config, AggregationConfig::default());
    }

    #[test]
    fn test_family_flag() {
        assert_eq!(parse(&["-i", "-", "-f", "6"]).family, Family::V6);
        assert!(Cli::try_parse_from(["cidrips", "-i", "-", "-f", "5"]).is_err());
    }

    #[test]
    fn test_existing_output_flags_conflict() {
        assert_eq!(parse(&["-i", "-", "-A"]).on_existing(), OnExisting::Append);
        assert!(Cli::try_parse_from(["cidrips", "-i", "-", "-O", "-C"]).is_err());
    }

    #[test]
    fn test_count_mode() {
        let cli = parse(&["-i", "-", "-m", "count", "-c", "10", "--search", "linear"]);
        let config = cli.aggregation_config(AggregationConfig::default()).unwrap();
        assert_eq!(config.policy, Policy::Count { target: 10 });
        assert_eq!(config.search, SearchStrategy::Linear);

        assert!(Cli::try_parse_from(["cidrips", "-i", "-", "-m", "count", "-c", "0"]).is_err());
    }

    #[test]
    fn test_mode_option_mismatch() {
        let cli = parse(&["-i", "-", "-c", "10"]);
        assert!(cli.aggregation_config(AggregationConfig::default()).is_err());

        let cli = parse(&["-i", "-", "-m", "count", "-l", "2"]);
        assert!(cli.aggregation_config(AggregationConfig::default()).is_err());

        let cli = parse(&["-i", "-", "-m", "count"]);
        assert!(cli.aggregation_config(AggregationConfig::default()).is_err());
    }

    #[test]
    fn test_flags_override_config() {
        let base = AggregationConfig {
            policy: Policy::Count { target: 5 },
            search: SearchStrategy::Linear,
            node_limit: Some(100),
        };

        let config = parse(&["-i", "-"]).aggregation_config(base.clone()).unwrap();
        assert_eq!(config, base);

        let config = parse(&["-i", "-", "-c", "2"])
            .aggregation_config(base.clone())
            .unwrap();
        assert_eq!(config.policy, Policy::Count { target: 2 });
        assert_eq!(config.node_limit, Some(100));

        let config = parse(&["-i", "-", "-m", "level", "-l", "3"])
            .aggregation_config(base)
            .unwrap();
        assert_eq!(config.policy, Policy::Level { level: 3 });
    }
}
