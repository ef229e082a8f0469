//! Input discovery and output path derivation.

use log::warn;
use std::io;
use std::path::{Path, PathBuf};

/// Extension of the HDF5 files this crate writes.
pub const OUTPUT_EXTENSION: &str = "h5";

/// Derives the `.h5` output path for `input`.
///
/// The base name is `output_name` when given, otherwise the input's file name
/// without its extension; a trailing `.h5` is dropped either way. The directory is
/// `output_dir` when given, otherwise the input's own (absolute) directory.
pub fn resolve_output_path(
    input: &Path,
    output_dir: Option<&Path>,
    output_name: Option<&str>,
) -> io::Result<PathBuf> {
    let base = match output_name.filter(|name| !name.is_empty()) {
        Some(name) => name.to_string(),
        None => input
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_default(),
    };
    let base = base.strip_suffix(".h5").unwrap_or(&base);

    let dir = match output_dir {
        Some(dir) => dir.to_path_buf(),
        None => std::path::absolute(input)?
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default(),
    };

    Ok(dir.join(format!("{}.{}", base, OUTPUT_EXTENSION)))
}

/// Lists the files to convert.
///
/// A directory yields its regular, non-hidden files ending in `.{extension}`,
/// sorted lexicographically; anything else is returned as the sole input.
pub fn collect_inputs(input: &Path, extension: &str) -> io::Result<Vec<PathBuf>> {
    if !input.is_dir() {
        return Ok(vec![input.to_path_buf()]);
    }

    let mut files = Vec::new();
    for entry in std::fs::read_dir(input)? {
        let entry = entry?;
        let path = entry.path();
        let name = entry.file_name();
        let name = name.to_string_lossy();
        if name.starts_with('.') || !path.is_file() {
            continue;
        }
        if path.extension().is_some_and(|ext| ext == extension) {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

/// One input file and the output it converts to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversionJob {
    pub input: PathBuf,
    pub output: PathBuf,
}

/// Pairs every input with its output path.
///
/// `output_name` only applies when there is exactly one input; with several
/// inputs it is ignored (with a warning) and each output is named after its
/// own input.
pub fn plan_jobs(
    inputs: &[PathBuf],
    output_dir: Option<&Path>,
    output_name: Option<&str>,
) -> io::Result<Vec<ConversionJob>> {
    let single = inputs.len() == 1;
    if output_name.is_some() && !single {
        warn!("--output_name is only applied for a single input file; ignoring it");
    }
    let output_name = if single { output_name } else { None };

    inputs
        .iter()
        .map(|input| {
            Ok(ConversionJob {
                input: input.clone(),
                output: resolve_output_path(input, output_dir, output_name)?,
            })
        })
        .collect()
}
