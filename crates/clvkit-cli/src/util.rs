use std::{
    fs::File,
    io::{self, BufWriter, StdoutLock, Write as _},
    path::{Path, PathBuf},
};

use anyhow::Context;
use chrono::{Days, NaiveDate};
use clvkit_models::transaction::TransactionTable;

#[derive(Debug)]
pub enum Output {
    Stdout {
        writer: StdoutLock<'static>,
    },
    File {
        writer: BufWriter<File>,
        path: PathBuf,
    },
}

impl Output {
    pub fn save_json<T>(value: &T, output_path: Option<PathBuf>) -> anyhow::Result<()>
    where
        T: serde::Serialize,
    {
        let mut output = Output::from_output_path(output_path)?;
        output.write_json(value)?;
        tracing::info!(output = %output.display_path(), "wrote results");
        Ok(())
    }

    pub fn from_output_path(output_path: Option<PathBuf>) -> anyhow::Result<Self> {
        match output_path {
            Some(path) => Output::open(path),
            None => Ok(Output::stdout()),
        }
    }

    pub fn stdout() -> Self {
        Output::Stdout {
            writer: io::stdout().lock(),
        }
    }

    pub fn open(path: PathBuf) -> anyhow::Result<Self> {
        let file = File::create(&path)
            .with_context(|| format!("Failed to create output file: {}", path.display()))?;
        Ok(Output::File {
            writer: BufWriter::new(file),
            path,
        })
    }

    pub fn display_path(&self) -> String {
        match self {
            Output::Stdout { .. } => "stdout".to_string(),
            Output::File { path, .. } => path.display().to_string(),
        }
    }

    pub fn write_json<T>(&mut self, value: T) -> anyhow::Result<()>
    where
        T: serde::Serialize,
    {
        serde_json::to_writer_pretty(&mut *self, &value)
            .with_context(|| format!("Failed to write JSON to {}", self.display_path()))?;
        writeln!(&mut *self).with_context(|| {
            format!(
                "Failed to write newline after JSON to {}",
                self.display_path()
            )
        })?;
        self.flush()
            .with_context(|| format!("Failed to flush output to {}", self.display_path()))?;
        Ok(())
    }
}

impl io::Write for Output {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            Output::Stdout { writer } => writer.write(buf),
            Output::File { writer, .. } => writer.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            Output::Stdout { writer } => writer.flush(),
            Output::File { writer, .. } => writer.flush(),
        }
    }
}

pub fn read_json_file<T, P>(file_kind: &str, path: P) -> anyhow::Result<T>
where
    T: serde::de::DeserializeOwned,
    P: AsRef<Path>,
{
    let path = path.as_ref();
    let file = File::open(path)
        .with_context(|| format!("Failed to open {} file: {}", file_kind, path.display()))?;

    let reader = io::BufReader::new(file);
    let value = serde_json::from_reader(reader).with_context(|| {
        format!(
            "Failed to parse {} JSON file: {}",
            file_kind,
            path.display()
        )
    })?;

    Ok(value)
}

/// Read a transaction table from a JSON file
///
/// # Arguments
///
/// * `path` - Path to a JSON file holding a tagged [`TransactionTable`]
///
/// # Errors
///
/// Returns error if file cannot be opened or parsed
pub fn read_transactions_file<P>(path: P) -> anyhow::Result<TransactionTable>
where
    P: AsRef<Path>,
{
    let table: TransactionTable = read_json_file("transactions", path)?;
    tracing::info!(rows = table.len(), "loaded transactions");
    Ok(table)
}

/// Days between the latest purchase and the default analysis date
const DEFAULT_CUTOFF_OFFSET_DAYS: u64 = 2;

/// Resolve the analysis date for a run
///
/// An explicit date wins. Otherwise the analysis date is placed shortly after
/// the latest purchase in the table.
///
/// # Errors
///
/// Returns error if no date is given and the table is empty
pub fn resolve_cutoff(
    explicit: Option<NaiveDate>,
    table: &TransactionTable,
) -> anyhow::Result<NaiveDate> {
    if let Some(cutoff) = explicit {
        return Ok(cutoff);
    }
    let latest = table
        .latest_purchase()
        .context("Cannot infer the analysis date from an empty transaction table")?;
    let cutoff = latest + Days::new(DEFAULT_CUTOFF_OFFSET_DAYS);
    tracing::info!(%latest, %cutoff, "no analysis date given; using latest purchase + 2 days");
    Ok(cutoff)
}
