//! Directory scanning for candidate binaries.
//!
//! Each root is read one level deep, entries sorted by file name. Filters run
//! cheapest first: name patterns, then size, then magic bytes, and only then
//! the full-content SHA-256.

use std::collections::HashMap;
use std::fs;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};

use regex::Regex;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, warn};

use crate::config::DiscoveryConfig;
use crate::model::{BinaryKind, CollectedFile};
use crate::services::tools::{Tool, ToolRunner};

/// Bytes read from the head of a file for signature checks.
const HEADER_LEN: usize = 64;

pub const UNKNOWN_ARCH: &str = "unknown";

/// Resolved discovery parameters.
#[derive(Debug, Clone)]
pub struct DiscoveryOptions {
    pub roots: Vec<PathBuf>,
    pub max_count: usize,
    pub min_size_bytes: u64,
    pub max_size_bytes: u64,
    pub skip_patterns: SkipPatterns,
}

impl DiscoveryOptions {
    pub fn from_config(config: &DiscoveryConfig) -> Result<Self, regex::Error> {
        Ok(Self {
            roots: config.roots.iter().map(PathBuf::from).collect(),
            max_count: config.max_count,
            min_size_bytes: config.min_size_bytes,
            max_size_bytes: config.max_size_bytes,
            skip_patterns: SkipPatterns::new(&config.skip_patterns)?,
        })
    }
}

/// File name patterns with `*` and `?` wildcards, matched against the whole name.
#[derive(Debug, Clone, Default)]
pub struct SkipPatterns {
    patterns: Vec<Regex>,
}

impl SkipPatterns {
    pub fn new<S: AsRef<str>>(patterns: &[S]) -> Result<Self, regex::Error> {
        let patterns = patterns
            .iter()
            .map(|p| Regex::new(&glob_to_regex(p.as_ref())))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { patterns })
    }

    pub fn matches(&self, name: &str) -> bool {
        self.patterns.iter().any(|re| re.is_match(name))
    }
}

fn glob_to_regex(glob: &str) -> String {
    let mut out = String::from("^");
    for ch in glob.chars() {
        match ch {
            '*' => out.push_str(".*"),
            '?' => out.push('.'),
            other => out.push_str(&regex::escape(other.encode_utf8(&mut [0u8; 4]))),
        }
    }
    out.push('$');
    out
}

/// Why an entry was not collected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    Pattern,
    NotAFile,
    TooSmall,
    TooLarge,
    NotBinary,
    Unreadable,
}

/// Accumulator threaded through a scan and handed back to the caller.
#[derive(Debug, Clone, Default)]
pub struct DiscoveryOutcome {
    pub files: Vec<CollectedFile>,
    pub skipped: HashMap<SkipReason, usize>,
    /// Roots that could not be listed at all.
    pub unreadable_roots: Vec<PathBuf>,
}

impl DiscoveryOutcome {
    fn skip(&mut self, reason: SkipReason) {
        *self.skipped.entry(reason).or_insert(0) += 1;
    }

    pub fn skipped_count(&self, reason: SkipReason) -> usize {
        self.skipped.get(&reason).copied().unwrap_or(0)
    }

    pub fn total_skipped(&self) -> usize {
        self.skipped.values().sum()
    }
}

/// Scan `options.roots` and return accepted binaries, at most `max_count` total.
///
/// `runner` supplies the format description used for the architecture tag.
/// Unreadable roots and entries are logged and skipped.
pub fn discover(options: &DiscoveryOptions, runner: &dyn ToolRunner) -> DiscoveryOutcome {
    discover_with_progress(options, runner, &mut |_: usize, _: &CollectedFile| {})
}

/// Like `discover`, calling `on_accept` with the running count for each accepted file.
pub fn discover_with_progress(
    options: &DiscoveryOptions,
    runner: &dyn ToolRunner,
    on_accept: &mut dyn FnMut(usize, &CollectedFile),
) -> DiscoveryOutcome {
    let mut outcome = DiscoveryOutcome::default();
    for root in &options.roots {
        if outcome.files.len() >= options.max_count {
            break;
        }
        scan_root(root, options, runner, &mut outcome, on_accept);
    }
    outcome
}

fn scan_root(
    root: &Path,
    options: &DiscoveryOptions,
    runner: &dyn ToolRunner,
    outcome: &mut DiscoveryOutcome,
    on_accept: &mut dyn FnMut(usize, &CollectedFile),
) {
    let root = fs::canonicalize(root).unwrap_or_else(|_| root.to_path_buf());
    let mut entries: Vec<fs::DirEntry> = match fs::read_dir(&root) {
        Ok(iter) => collect_entries(&root, iter, outcome),
        Err(err) => {
            warn!(root = %root.display(), error = %err, "cannot list directory, skipping");
            outcome.unreadable_roots.push(root);
            return;
        }
    };
    entries.sort_by_key(|e| e.file_name());

    for entry in entries {
        if outcome.files.len() >= options.max_count {
            return;
        }
        let name = entry.file_name().to_string_lossy().to_string();
        if options.skip_patterns.matches(&name) {
            debug!(%name, "skip pattern matched");
            outcome.skip(SkipReason::Pattern);
            continue;
        }
        match inspect_entry(&entry.path(), &name, options, runner) {
            Ok(file) => {
                on_accept(outcome.files.len() + 1, &file);
                outcome.files.push(file);
            }
            Err(reason) => outcome.skip(reason),
        }
    }
}

/// Drain a directory listing; entries that fail to read count as unreadable.
fn collect_entries(
    root: &Path,
    iter: impl Iterator<Item = std::io::Result<fs::DirEntry>>,
    outcome: &mut DiscoveryOutcome,
) -> Vec<fs::DirEntry> {
    let mut entries = Vec::new();
    for entry in iter {
        match entry {
            Ok(entry) => entries.push(entry),
            Err(err) => {
                warn!(root = %root.display(), error = %err, "unreadable directory entry, skipping");
                outcome.skip(SkipReason::Unreadable);
            }
        }
    }
    entries
}

fn inspect_entry(
    path: &Path,
    name: &str,
    options: &DiscoveryOptions,
    runner: &dyn ToolRunner,
) -> Result<CollectedFile, SkipReason> {
    let metadata = fs::metadata(path).map_err(|err| {
        warn!(path = %path.display(), error = %err, "cannot stat entry, skipping");
        SkipReason::Unreadable
    })?;
    if !metadata.is_file() {
        return Err(SkipReason::NotAFile);
    }
    let size = metadata.len();
    if size < options.min_size_bytes {
        return Err(SkipReason::TooSmall);
    }
    if size > options.max_size_bytes {
        return Err(SkipReason::TooLarge);
    }

    let header = read_header(path).map_err(|err| {
        warn!(path = %path.display(), error = %err, "cannot read entry, skipping");
        SkipReason::Unreadable
    })?;
    let Some(format) = detect_format(&header) else {
        return Err(SkipReason::NotBinary);
    };

    let content_hash = sha256_file(path).map_err(|err| {
        warn!(path = %path.display(), error = %err, "cannot hash entry, skipping");
        SkipReason::Unreadable
    })?;

    Ok(CollectedFile {
        path: path.display().to_string(),
        content_hash,
        size_bytes: size,
        kind: classify_kind(name, format, &header),
        architecture: probe_architecture(path, runner),
    })
}

fn read_header(path: &Path) -> std::io::Result<Vec<u8>> {
    let mut header = Vec::with_capacity(HEADER_LEN);
    fs::File::open(path)?.take(HEADER_LEN as u64).read_to_end(&mut header)?;
    Ok(header)
}

/// Executable container formats recognized by their leading bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryFormat {
    Elf,
    /// Thin Mach-O; `big_endian` refers to the header byte order.
    MachO { big_endian: bool },
    MachOFat,
    Pe,
}

pub fn detect_format(header: &[u8]) -> Option<BinaryFormat> {
    match header {
        [0x7f, b'E', b'L', b'F', ..] => Some(BinaryFormat::Elf),
        [0xfe, 0xed, 0xfa, 0xce | 0xcf, ..] => Some(BinaryFormat::MachO { big_endian: true }),
        [0xce | 0xcf, 0xfa, 0xed, 0xfe, ..] => Some(BinaryFormat::MachO { big_endian: false }),
        [0xca, 0xfe, 0xba, 0xbe, ..] => Some(BinaryFormat::MachOFat),
        [b'M', b'Z', ..] => Some(BinaryFormat::Pe),
        _ => None,
    }
}

fn has_library_name(name: &str) -> bool {
    let lower = name.to_ascii_lowercase();
    lower.ends_with(".so")
        || lower.contains(".so.")
        || lower.ends_with(".dylib")
        || lower.ends_with(".dll")
}

/// Executable vs. shared library, by name first and then by header fields.
///
/// ELF `ET_DYN` alone is not enough: position-independent executables use it
/// too, so it only counts together with a library-like name.
pub fn classify_kind(name: &str, format: BinaryFormat, header: &[u8]) -> BinaryKind {
    if has_library_name(name) {
        return BinaryKind::SharedLibrary;
    }
    const MH_DYLIB: u32 = 6;
    if let BinaryFormat::MachO { big_endian } = format {
        if let Some(raw) = header.get(12..16).and_then(|b| <[u8; 4]>::try_from(b).ok()) {
            let filetype =
                if big_endian { u32::from_be_bytes(raw) } else { u32::from_le_bytes(raw) };
            if filetype == MH_DYLIB {
                return BinaryKind::SharedLibrary;
            }
        }
    }
    BinaryKind::Executable
}

fn probe_architecture(path: &Path, runner: &dyn ToolRunner) -> String {
    match runner.run(Tool::Format, path) {
        Ok(description) => {
            if let Some(arch) = infer_architecture(&description) {
                return arch.to_string();
            }
        }
        Err(err) => debug!(path = %path.display(), error = %err, "format probe failed"),
    }
    sniff_architecture(path).unwrap_or_else(|| UNKNOWN_ARCH.to_string())
}

/// Map a format-identifier description to an architecture tag by substring.
pub fn infer_architecture(description: &str) -> Option<&'static str> {
    const TABLE: &[(&str, &str)] = &[
        ("x86-64", "x86_64"),
        ("x86_64", "x86_64"),
        ("aarch64", "arm64"),
        ("arm64", "arm64"),
        ("80386", "x86"),
        ("i386", "x86"),
        ("Intel 386", "x86"),
        ("RISC-V", "riscv"),
        ("PowerPC", "powerpc"),
        ("MIPS", "mips"),
        ("ARM", "arm"),
        ("universal binary", "universal"),
    ];
    TABLE.iter().find(|(needle, _)| description.contains(needle)).map(|(_, arch)| *arch)
}

#[cfg(feature = "header-sniff")]
fn sniff_architecture(path: &Path) -> Option<String> {
    use goblin::{elf, mach, pe, Object};

    let bytes = fs::read(path).ok()?;
    let arch = match Object::parse(&bytes).ok()? {
        Object::Elf(elf) => match elf.header.e_machine {
            elf::header::EM_X86_64 => "x86_64",
            elf::header::EM_386 => "x86",
            elf::header::EM_AARCH64 => "arm64",
            elf::header::EM_ARM => "arm",
            elf::header::EM_RISCV => "riscv",
            _ => return None,
        },
        Object::PE(pe) => match pe.header.coff_header.machine {
            pe::header::COFF_MACHINE_X86 => "x86",
            pe::header::COFF_MACHINE_X86_64 => "x86_64",
            pe::header::COFF_MACHINE_ARM64 => "arm64",
            _ => return None,
        },
        Object::Mach(mach::Mach::Binary(bin)) => match bin.header.cputype {
            mach::cputype::CPU_TYPE_X86 => "x86",
            mach::cputype::CPU_TYPE_X86_64 => "x86_64",
            mach::cputype::CPU_TYPE_ARM => "arm",
            mach::cputype::CPU_TYPE_ARM64 => "arm64",
            _ => return None,
        },
        Object::Mach(mach::Mach::Fat(_)) => "universal",
        _ => return None,
    };
    Some(arch.to_string())
}

#[cfg(not(feature = "header-sniff"))]
fn sniff_architecture(_path: &Path) -> Option<String> {
    None
}

/// Compute the SHA-256 hash of a file and return it as a lowercase hex string.
pub fn sha256_file(path: &Path) -> std::io::Result<String> {
    let file = fs::File::open(path)?;
    let mut reader = BufReader::new(file);
    let mut hasher = Sha256::new();
    let mut buf = [0u8; 8192];

    loop {
        let n = reader.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }

    Ok(format!("{:x}", hasher.finalize()))
}

pub fn sha256_bytes(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

/// A content hash found at more than one path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DuplicateHash {
    pub content_hash: String,
    pub paths: Vec<String>,
}

/// Hashes that occur more than once, in order of first appearance.
///
/// Duplicates are reported, never merged: callers decide what to do with them.
pub fn find_duplicate_hashes(files: &[CollectedFile]) -> Vec<DuplicateHash> {
    let mut order: Vec<&str> = Vec::new();
    let mut paths: HashMap<&str, Vec<String>> = HashMap::new();
    for file in files {
        let slot = paths.entry(file.content_hash.as_str()).or_insert_with(|| {
            order.push(file.content_hash.as_str());
            Vec::new()
        });
        slot.push(file.path.clone());
    }
    order
        .into_iter()
        .filter_map(|hash| {
            let seen = paths.remove(hash)?;
            (seen.len() > 1).then(|| DuplicateHash { content_hash: hash.to_string(), paths: seen })
        })
        .collect()
}
