// tests/common/mod.rs

//! Shared test utilities: synthetic jars, class files and configurations.

#![allow(dead_code)]

use jarforge::config::AssemblyConfig;
use jarforge::dependencies::ModuleSpec;
use std::collections::BTreeMap;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use zip::write::SimpleFileOptions;

/// Write a jar with the given entries, in order
pub fn write_jar(path: &Path, entries: &[(&str, &[u8])]) -> PathBuf {
    let file = std::fs::File::create(path).unwrap();
    let mut zip = zip::ZipWriter::new(file);
    for (name, data) in entries {
        if name.ends_with('/') {
            zip.add_directory(*name, SimpleFileOptions::default()).unwrap();
        } else {
            zip.start_file(*name, SimpleFileOptions::default()).unwrap();
            zip.write_all(data).unwrap();
        }
    }
    zip.finish().unwrap();
    path.to_path_buf()
}

/// Read every file of a jar into a path -> bytes map, plus the entry order
pub fn read_jar(path: &Path) -> (BTreeMap<String, Vec<u8>>, Vec<String>) {
    let mut archive = zip::ZipArchive::new(std::fs::File::open(path).unwrap()).unwrap();
    let mut files = BTreeMap::new();
    let mut order = Vec::new();
    for i in 0..archive.len() {
        let mut file = archive.by_index(i).unwrap();
        let name = file.name().to_string();
        order.push(name.clone());
        if !file.is_dir() {
            let mut bytes = Vec::new();
            file.read_to_end(&mut bytes).unwrap();
            files.insert(name, bytes);
        }
    }
    (files, order)
}

pub fn module(coordinate: &str, origin: PathBuf) -> ModuleSpec {
    ModuleSpec {
        coordinate: coordinate.parse().unwrap(),
        origin,
        release: None,
    }
}

/// Configuration with the given modules and defaults everywhere else
pub fn config_with(modules: Vec<ModuleSpec>) -> AssemblyConfig {
    let mut config = AssemblyConfig::default();
    config.modules = modules;
    config
}

const MAGIC: u32 = 0xCAFEBABE;

/// Minimal class file builder
///
/// Produces a class with a constant pool, one private field per call to
/// [`ClassFile::field`], and no methods.
pub struct ClassFile {
    pool: Vec<Vec<u8>>,
    fields: Vec<(u16, u16)>,
    this_class: u16,
    super_class: u16,
    major: u16,
}

impl ClassFile {
    pub fn new(name: &str) -> Self {
        let mut class = Self {
            pool: Vec::new(),
            fields: Vec::new(),
            this_class: 0,
            super_class: 0,
            major: 52,
        };
        class.this_class = class.class_ref(name);
        class.super_class = class.class_ref("java/lang/Object");
        class
    }

    /// Target a platform release (8 -> major 52)
    pub fn release(mut self, release: u16) -> Self {
        self.major = release + 44;
        self
    }

    fn push(&mut self, entry: Vec<u8>) -> u16 {
        self.pool.push(entry);
        self.pool.len() as u16
    }

    fn utf8(&mut self, text: &str) -> u16 {
        let mut entry = vec![1u8];
        entry.extend_from_slice(&(text.len() as u16).to_be_bytes());
        entry.extend_from_slice(text.as_bytes());
        self.push(entry)
    }

    fn class_ref(&mut self, name: &str) -> u16 {
        let utf8 = self.utf8(name);
        let mut entry = vec![7u8];
        entry.extend_from_slice(&utf8.to_be_bytes());
        self.push(entry)
    }

    /// Add a CONSTANT_Class reference
    pub fn reference(mut self, name: &str) -> Self {
        self.class_ref(name);
        self
    }

    /// Add a private field with the given descriptor
    pub fn field(mut self, name: &str, descriptor: &str) -> Self {
        let n = self.utf8(name);
        let d = self.utf8(descriptor);
        self.fields.push((n, d));
        self
    }

    /// Add a CONSTANT_String literal
    pub fn literal(mut self, text: &str) -> Self {
        let utf8 = self.utf8(text);
        let mut entry = vec![8u8];
        entry.extend_from_slice(&utf8.to_be_bytes());
        self.push(entry);
        self
    }

    pub fn build(&self) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(&MAGIC.to_be_bytes());
        out.extend_from_slice(&0u16.to_be_bytes());
        out.extend_from_slice(&self.major.to_be_bytes());
        out.extend_from_slice(&(self.pool.len() as u16 + 1).to_be_bytes());
        for entry in &self.pool {
            out.extend_from_slice(entry);
        }
        out.extend_from_slice(&0x0021u16.to_be_bytes());
        out.extend_from_slice(&self.this_class.to_be_bytes());
        out.extend_from_slice(&self.super_class.to_be_bytes());
        out.extend_from_slice(&0u16.to_be_bytes()); // interfaces
        out.extend_from_slice(&(self.fields.len() as u16).to_be_bytes());
        for (name, descriptor) in &self.fields {
            out.extend_from_slice(&0x0002u16.to_be_bytes());
            out.extend_from_slice(&name.to_be_bytes());
            out.extend_from_slice(&descriptor.to_be_bytes());
            out.extend_from_slice(&0u16.to_be_bytes());
        }
        out.extend_from_slice(&0u16.to_be_bytes()); // methods
        out.extend_from_slice(&0u16.to_be_bytes()); // attributes
        out
    }
}
