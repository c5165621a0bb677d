//! Output target selection and zone rendering.

use std::fs::{self, File, OpenOptions};
use std::io::{self, BufRead, BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use cidrips_aggregate::ZoneList;
use cidrips_core::Counter;

use crate::cli::OnExisting;

/// Where the zones go.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Target {
    Stdout,
    File { path: PathBuf, append: bool },
    Cancelled,
}

impl Target {
    pub fn open(&self) -> Result<Option<Box<dyn Write>>> {
        match self {
            Target::Stdout => Ok(Some(Box::new(BufWriter::new(io::stdout().lock())))),
            Target::File { path, append } => {
                let file = if *append {
                    OpenOptions::new().create(true).append(true).open(path)
                } else {
                    File::create(path)
                }
                .with_context(|| format!("Failed to open output {}", path.display()))?;
                Ok(Some(Box::new(BufWriter::new(file))))
            }
            Target::Cancelled => Ok(None),
        }
    }
}

/// Decide the output target.
///
/// A non-empty output file is handled per `on_existing`. Without a flag the
/// user is asked through `input`/`prompt`, except when the addresses came from
/// stdin: the terminal is not available then, and the run is cancelled.
pub fn resolve_target<R: BufRead, W: Write>(
    output: &str,
    on_existing: OnExisting,
    reads_stdin: bool,
    input: &mut R,
    prompt: &mut W,
) -> Result<Target> {
    if output == "-" {
        return Ok(Target::Stdout);
    }
    let path = PathBuf::from(output);
    let file = |append| Target::File {
        path: path.clone(),
        append,
    };

    if !has_content(&path)? {
        return Ok(file(false));
    }

    let decision = match on_existing {
        OnExisting::Ask if reads_stdin => OnExisting::Cancel,
        OnExisting::Ask => ask(&path, input, prompt)?,
        decided => decided,
    };
    Ok(match decision {
        OnExisting::Overwrite => file(false),
        OnExisting::Append => file(true),
        _ => Target::Cancelled,
    })
}

fn has_content(path: &Path) -> Result<bool> {
    match fs::metadata(path) {
        Ok(meta) => Ok(meta.len() > 0),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e).with_context(|| format!("Failed to inspect {}", path.display())),
    }
}

/// Ask until the answer is one of yes, no or append. End of input means no.
pub fn ask<R: BufRead, W: Write>(path: &Path, input: &mut R, prompt: &mut W) -> Result<OnExisting> {
    let mut line = String::new();
    loop {
        write!(
            prompt,
            "File {} is not empty. Rewrite? [y[es]/n[o]/a[ppend]] ",
            path.display()
        )?;
        prompt.flush()?;

        line.clear();
        if input.read_line(&mut line)? == 0 {
            return Ok(OnExisting::Cancel);
        }
        match line.trim().to_ascii_lowercase().as_str() {
            "y" | "yes" => return Ok(OnExisting::Overwrite),
            "n" | "no" => return Ok(OnExisting::Cancel),
            "a" | "append" => return Ok(OnExisting::Append),
            _ => continue,
        }
    }
}

/// Write every zone wrapped in `prefix` and `postfix`.
pub fn write_zones<W: Counter, O: Write + ?Sized>(
    zones: &ZoneList<W>,
    prefix: &str,
    postfix: &str,
    out: &mut O,
) -> io::Result<()> {
    for zone in zones {
        write!(out, "{}{}{}", prefix, zone, postfix)?;
    }
    out.flush()
}
