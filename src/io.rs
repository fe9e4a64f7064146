//! File access around the core: locating and reading the inputs, and
//! writing the sharded report.

use crate::output::{OutputRow, HEADER_COLUMNS, OUTPUT_DELIMITER};
use crate::pipeline::InputLine;
use anyhow::{bail, Context, Result};
use csv::{QuoteStyle, Terminator, WriterBuilder};
use flate2::read::GzDecoder;
use glob::glob;
use indicatif::{ProgressBar, ProgressStyle};
use log::{debug, info, warn};
use rayon::prelude::*;
use std::fs::{self, File};
use std::io::{BufRead, BufReader, Read};
use std::path::{Path, PathBuf};

/// Resolves a literal path or a glob pattern to a sorted list of files.
pub fn find_input_files(pattern: &str) -> Result<Vec<PathBuf>> {
    let literal = Path::new(pattern);
    if literal.is_file() {
        return Ok(vec![literal.to_path_buf()]);
    }

    let mut paths: Vec<PathBuf> = glob(pattern)
        .with_context(|| format!("Invalid input pattern: {}", pattern))?
        .filter_map(|entry| match entry {
            Ok(path) => Some(path),
            Err(e) => {
                warn!("Skipping unreadable glob match: {}", e);
                None
            }
        })
        .filter(|path| path.is_file())
        .collect();
    paths.sort();

    if paths.is_empty() {
        bail!("No input files found matching: {}", pattern);
    }
    Ok(paths)
}

fn progress_bar(len: u64, label: &str, visible: bool) -> Result<ProgressBar> {
    if !visible {
        return Ok(ProgressBar::hidden());
    }
    let pb = ProgressBar::new(len);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} {msg} [{elapsed_precise}] [{bar:40.cyan/blue}] {bytes}/{total_bytes} ({eta})")?
            .progress_chars("#>-"),
    );
    pb.set_message(label.to_string());
    Ok(pb)
}

fn open_reader(path: &Path, progress: &ProgressBar) -> Result<Box<dyn BufRead>> {
    let file = File::open(path).with_context(|| format!("Failed to open input file: {}", path.display()))?;
    let tracked = progress.wrap_read(file);
    let is_gz = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("gz"));

    let reader: Box<dyn Read> = if is_gz {
        Box::new(GzDecoder::new(tracked))
    } else {
        Box::new(tracked)
    };
    Ok(Box::new(BufReader::new(reader)))
}

/// Reads one file, dropping its header line. Line numbers are 1-based and
/// count the header, so the first record is line 2.
pub fn read_lines(path: &Path, progress: bool) -> Result<Vec<InputLine>> {
    let size = fs::metadata(path)
        .with_context(|| format!("Failed to stat input file: {}", path.display()))?
        .len();
    let label = path
        .file_name()
        .map(|name| name.to_string_lossy().to_string())
        .unwrap_or_else(|| path.display().to_string());
    let pb = progress_bar(size, &label, progress)?;

    let reader = open_reader(path, &pb)?;
    let mut lines = Vec::new();
    for (idx, line) in reader.lines().enumerate().skip(1) {
        let mut text = line.with_context(|| format!("Failed to read line {} of {}", idx + 1, path.display()))?;
        if text.ends_with('\r') {
            text.pop();
        }
        lines.push(InputLine::new(idx + 1, text));
    }
    pb.finish_and_clear();

    debug!("Read {} records from {}", lines.len(), path.display());
    Ok(lines)
}

/// Reads every file matched by `pattern`, skipping each file's header.
pub fn read_dataset(pattern: &str, progress: bool) -> Result<Vec<InputLine>> {
    let files = find_input_files(pattern)?;
    info!("Found {} file(s) for {}", files.len(), pattern);

    let mut lines = Vec::new();
    for path in &files {
        lines.extend(read_lines(path, progress)?);
    }
    Ok(lines)
}

/// `{prefix}-{index:05}-of-{count:05}{suffix}`
pub fn shard_path(prefix: &Path, index: usize, count: usize, suffix: &str) -> PathBuf {
    let mut name = prefix.as_os_str().to_os_string();
    name.push(format!("-{:05}-of-{:05}{}", index, count, suffix));
    PathBuf::from(name)
}

/// Rows assigned to each shard: contiguous runs, sizes differing by at most one.
fn shard_ranges(total: usize, shards: usize) -> Vec<std::ops::Range<usize>> {
    let base = total / shards;
    let extra = total % shards;
    let mut start = 0;
    (0..shards)
        .map(|i| {
            let len = base + usize::from(i < extra);
            let range = start..start + len;
            start += len;
            range
        })
        .collect()
}

fn write_shard(path: &Path, rows: &[OutputRow], with_header: bool) -> Result<()> {
    let mut writer = WriterBuilder::new()
        .delimiter(OUTPUT_DELIMITER as u8)
        .quote_style(QuoteStyle::Never)
        .terminator(Terminator::Any(b'\n'))
        .from_path(path)
        .with_context(|| format!("Failed to create output file: {}", path.display()))?;

    if with_header {
        writer
            .write_record(HEADER_COLUMNS)
            .with_context(|| format!("Failed to write header to: {}", path.display()))?;
    }
    for row in rows {
        writer
            .write_record(row.to_record())
            .with_context(|| format!("Failed to write row to: {}", path.display()))?;
    }
    writer
        .flush()
        .with_context(|| format!("Failed to flush output file: {}", path.display()))?;
    Ok(())
}

/// Writes `rows` across `shards` files. Only the first shard carries the
/// header, so the shards concatenated in order form one CSV document.
pub fn write_shards(rows: &[OutputRow], prefix: &Path, suffix: &str, shards: usize) -> Result<Vec<PathBuf>> {
    if shards == 0 {
        bail!("At least one output shard is required");
    }
    if let Some(parent) = prefix.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create output directory: {}", parent.display()))?;
    }

    let ranges = shard_ranges(rows.len(), shards);
    let paths: Vec<PathBuf> = (0..shards)
        .map(|i| shard_path(prefix, i, shards, suffix))
        .collect();

    paths
        .par_iter()
        .zip(ranges.into_par_iter())
        .enumerate()
        .try_for_each(|(i, (path, range))| write_shard(path, &rows[range], i == 0))?;

    info!("Wrote {} rows to {} file(s)", rows.len(), paths.len());
    Ok(paths)
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use std::io::Write;

    fn row(state: &str, month: &str) -> OutputRow {
        OutputRow {
            state: state.to_string(),
            year: "2015".to_string(),
            month: month.to_string(),
            rainfall: "1.0".to_string(),
            cases: "2.0".to_string(),
        }
    }

    #[test]
    fn test_shard_path_format() {
        let path = shard_path(Path::new("out/resultado"), 0, 1, ".csv");
        assert_eq!(path, PathBuf::from("out/resultado-00000-of-00001.csv"));
    }

    #[test]
    fn test_shard_ranges_cover_all_rows() {
        let ranges = shard_ranges(7, 3);
        assert_eq!(ranges, vec![0..3, 3..5, 5..7]);
        assert_eq!(shard_ranges(1, 3), vec![0..1, 1..1, 1..1]);
    }

    #[test]
    fn test_read_lines_skips_header_and_strips_cr() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("chuvas.csv");
        fs::write(&path, "data,mm,uf\r\n2016-01-24,4.2,TO\r\n\r\n2016-01-25,0.0,TO\n").unwrap();

        let lines = read_lines(&path, false).unwrap();
        assert_eq!(
            lines,
            vec![
                InputLine::new(2, "2016-01-24,4.2,TO"),
                InputLine::new(3, ""),
                InputLine::new(4, "2016-01-25,0.0,TO"),
            ]
        );
    }

    #[test]
    fn test_read_lines_gzip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("chuvas.csv.gz");
        let mut encoder = GzEncoder::new(File::create(&path).unwrap(), Compression::default());
        encoder.write_all(b"data,mm,uf\n2016-01-24,4.2,TO\n").unwrap();
        encoder.finish().unwrap();

        let lines = read_lines(&path, false).unwrap();
        assert_eq!(lines, vec![InputLine::new(2, "2016-01-24,4.2,TO")]);
    }

    #[test]
    fn test_read_dataset_glob_skips_header_per_file() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a.csv"), "h\nA1\n").unwrap();
        fs::write(dir.path().join("b.csv"), "h\nB1\nB2\n").unwrap();

        let pattern = dir.path().join("*.csv");
        let lines = read_dataset(&pattern.to_string_lossy(), false).unwrap();
        let texts: Vec<&str> = lines.iter().map(|l| l.text.as_str()).collect();
        assert_eq!(texts, vec!["A1", "B1", "B2"]);
    }

    #[test]
    fn test_missing_input_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let pattern = dir.path().join("nothing-*.txt");
        assert!(read_dataset(&pattern.to_string_lossy(), false).is_err());
    }

    #[test]
    fn test_write_shards_header_only_in_first() {
        let dir = tempfile::tempdir().unwrap();
        let prefix = dir.path().join("resultado");
        let rows = vec![row("CE", "01"), row("CE", "02"), row("RJ", "01")];

        let paths = write_shards(&rows, &prefix, ".csv", 2).unwrap();
        assert_eq!(paths.len(), 2);

        let first = fs::read_to_string(&paths[0]).unwrap();
        let second = fs::read_to_string(&paths[1]).unwrap();
        assert_eq!(first, "UF;ANO;MES;CHUVA;DENGUE\nCE;2015;01;1.0;2.0\nCE;2015;02;1.0;2.0\n");
        assert_eq!(second, "RJ;2015;01;1.0;2.0\n");
    }

    #[test]
    fn test_write_shards_empty_result_still_has_header() {
        let dir = tempfile::tempdir().unwrap();
        let prefix = dir.path().join("nested").join("resultado");

        let paths = write_shards(&[], &prefix, ".csv", 1).unwrap();
        assert_eq!(fs::read_to_string(&paths[0]).unwrap(), "UF;ANO;MES;CHUVA;DENGUE\n");
    }
}
