//! Shared fixtures for integration tests.
#![allow(dead_code)]

use std::cell::Cell;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use intent_core::model::{BinaryKind, CollectedFile, FeatureRecord};
use intent_core::services::tools::{Tool, ToolError, ToolRunner};

/// Canned tool output keyed by tool; tools without an entry fail to spawn.
#[derive(Default)]
pub struct FakeTools {
    outputs: HashMap<Tool, String>,
    /// Binaries (by file name) for which every tool fails.
    pub broken: Vec<String>,
    /// Number of tool invocations so far.
    pub calls: Cell<usize>,
}

impl FakeTools {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, tool: Tool, output: &str) -> Self {
        self.outputs.insert(tool, output.to_string());
        self
    }

    /// Symbol, strings, and disassembly output for a small file reader.
    pub fn reader() -> Self {
        Self::new()
            .with(Tool::Symbols, "                 U fopen@GLIBC_2.2.5\n                 U fgets@GLIBC_2.2.5\n                 U fclose@GLIBC_2.2.5\n")
            .with(Tool::Strings, "abc\nCould not open file\nRead: %s\ntest.txt\n")
            .with(
                Tool::Disassembly,
                "0000000000001139 <main>:\n    1139:\t55\tpush   %rbp\n    113a:\tc3\tret\n",
            )
            .with(Tool::Format, "ELF 64-bit LSB pie executable, x86-64, dynamically linked")
    }
}

impl ToolRunner for FakeTools {
    fn run(&self, tool: Tool, binary: &Path) -> Result<String, ToolError> {
        self.calls.set(self.calls.get() + 1);
        let name = binary.file_name().and_then(|n| n.to_str()).unwrap_or_default();
        let missing = || ToolError::Spawn {
            tool: tool.as_str(),
            program: format!("fake-{}", tool.as_str()),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "no canned output"),
        };
        if self.broken.iter().any(|b| b == name) {
            return Err(missing());
        }
        self.outputs.get(&tool).cloned().ok_or_else(missing)
    }
}

/// Write a file that starts with the ELF magic and is exactly `size` bytes long.
///
/// `fill` varies the content so different files hash differently.
pub fn write_elf_like(dir: &Path, name: &str, size: usize, fill: u8) -> PathBuf {
    let mut bytes = vec![fill; size.max(4)];
    bytes[..4].copy_from_slice(b"\x7fELF");
    bytes.truncate(size.max(4));
    let path = dir.join(name);
    std::fs::write(&path, bytes).expect("write fixture");
    path
}

pub fn collected(hash: &str) -> CollectedFile {
    CollectedFile {
        path: format!("/fixtures/{hash}"),
        content_hash: hash.to_string(),
        size_bytes: 4096,
        kind: BinaryKind::Executable,
        architecture: "x86_64".into(),
    }
}

pub fn feature(hash: &str) -> FeatureRecord {
    FeatureRecord {
        content_hash: hash.to_string(),
        path: format!("/fixtures/{hash}"),
        imported_symbols: vec!["fopen".into(), "fread".into()],
        extracted_strings: vec!["usage: reader FILE".into()],
        function_count: 3,
        instruction_count: 120,
        extraction_succeeded: true,
        error: None,
    }
}
