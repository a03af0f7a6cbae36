// src/relocate/classfile.rs

//! Class-file constant pool rewriting
//!
//! Only constants that the class-file format marks as type references are
//! rewritten:
//!
//! - `CONSTANT_Class` names
//! - `CONSTANT_NameAndType` and `CONSTANT_MethodType` descriptors
//! - field, method and record component descriptors
//! - `Signature` attributes on classes, fields, methods and record components
//! - `LocalVariableTable` descriptors and `LocalVariableTypeTable` signatures
//! - annotation type, enum type and class-literal descriptors, type
//!   annotations included
//!
//! String literals are never rewritten. When a literal shares its UTF8
//! constant with a rewritten type reference, the literal is pointed at a
//! fresh copy of the original text appended to the pool.
//!
//! Everything after the constant pool is copied byte for byte, apart from
//! annotation string values that need the same repointing.

use super::rules::Relocator;
use crate::mutf8;
use std::borrow::Cow;
use std::collections::BTreeMap;
use std::ops::Range;
use thiserror::Error;

const MAGIC: u32 = 0xCAFE_BABE;

/// First class-file major version (Java 1.1 = 45) minus one
const RELEASE_OFFSET: u16 = 44;

/// Reasons a class file cannot be relocated
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ClassFileError {
    #[error("not a class file (bad magic)")]
    BadMagic,

    #[error("truncated at byte {0}")]
    Truncated(usize),

    #[error("unknown constant pool tag {tag} at index {index}")]
    BadConstantTag { tag: u8, index: u16 },

    #[error("constant pool index {0} is out of range or has the wrong type")]
    BadIndex(u16),

    #[error("constant {0} is not valid modified UTF-8")]
    InvalidUtf8(u16),

    #[error("attribute '{name}' overruns its declared length")]
    AttributeOverrun { name: String },

    #[error("{0} exceeds the class-file limit of 65535")]
    TooLarge(&'static str),
}

type ClassResult<T> = std::result::Result<T, ClassFileError>;

/// Java platform release a class-file major version targets (52 -> 8)
pub fn release_for_major(major: u16) -> Option<u32> {
    major.checked_sub(RELEASE_OFFSET).map(u32::from)
}

/// Major version of a class file, if the header is readable
pub fn class_major_version(bytes: &[u8]) -> Option<u16> {
    if bytes.len() < 8 || bytes[..4] != MAGIC.to_be_bytes() {
        return None;
    }
    Some(u16::from_be_bytes([bytes[6], bytes[7]]))
}

/// Platform release a class file targets
pub fn class_release(bytes: &[u8]) -> Option<u32> {
    class_major_version(bytes).and_then(release_for_major)
}

/// Rewrite type references in a class file
///
/// Returns `None` when nothing in the class needed relocating, so callers
/// can keep the original bytes untouched.
pub fn relocate_class(bytes: &[u8], relocator: &Relocator) -> ClassResult<Option<Vec<u8>>> {
    if relocator.is_empty() {
        // Still validate the header so malformed classes are caught consistently
        ConstantPool::parse(bytes)?;
        return Ok(None);
    }

    let pool = ConstantPool::parse(bytes)?;
    let mut refs = References::default();
    pool.collect_references(&mut refs)?;
    scan_tail(bytes, pool.end, &pool, &mut refs)?;

    // Rewrite each referenced UTF8 according to how it is used
    let mut rewritten: BTreeMap<u16, Vec<u8>> = BTreeMap::new();
    for (&index, &role) in &refs.roles {
        let text = pool.utf8(index)?;
        let relocated = match role {
            Role::ClassName => relocator.relocate_class_name(text),
            Role::Descriptor => relocator.relocate_descriptor(text),
        };
        if let Cow::Owned(new_text) = relocated
            && new_text != text
        {
            let encoded = mutf8::encode(&new_text);
            if encoded.len() > u16::MAX as usize {
                return Err(ClassFileError::TooLarge("relocated constant"));
            }
            rewritten.insert(index, encoded);
        }
    }

    if rewritten.is_empty() {
        return Ok(None);
    }

    // Literals that share a rewritten constant get a copy of the original text
    let mut copies: BTreeMap<u16, u16> = BTreeMap::new();
    let mut next_index = pool.count();
    let mut copy_for = |original: u16| -> ClassResult<u16> {
        if let Some(&copy) = copies.get(&original) {
            return Ok(copy);
        }
        let copy = u16::try_from(next_index)
            .ok()
            .filter(|&i| i < u16::MAX)
            .ok_or(ClassFileError::TooLarge("constant pool"))?;
        next_index += 1;
        copies.insert(original, copy);
        Ok(copy)
    };

    let mut string_repoints: BTreeMap<u16, u16> = BTreeMap::new();
    for (index, entry) in pool.iter() {
        if let Constant::String(target) = entry.constant
            && rewritten.contains_key(&target)
        {
            string_repoints.insert(index, copy_for(target)?);
        }
    }

    let mut tail_patches: Vec<(usize, u16)> = Vec::new();
    for &(offset, target) in &refs.literal_offsets {
        if rewritten.contains_key(&target) {
            tail_patches.push((offset, copy_for(target)?));
        }
    }

    let new_count = u16::try_from(next_index).map_err(|_| ClassFileError::TooLarge("constant pool"))?;

    let mut out = Vec::with_capacity(bytes.len() + 64);
    out.extend_from_slice(&bytes[..8]);
    out.extend_from_slice(&new_count.to_be_bytes());

    for (index, entry) in pool.iter() {
        if let Some(encoded) = rewritten.get(&index) {
            out.push(TAG_UTF8);
            out.extend_from_slice(&(encoded.len() as u16).to_be_bytes());
            out.extend_from_slice(encoded);
        } else if let Some(&copy) = string_repoints.get(&index) {
            out.push(TAG_STRING);
            out.extend_from_slice(&copy.to_be_bytes());
        } else {
            out.extend_from_slice(&bytes[entry.range.clone()]);
        }
    }

    // Appended copies, in index order
    let mut appended: Vec<(u16, u16)> = copies.iter().map(|(&orig, &copy)| (copy, orig)).collect();
    appended.sort_unstable();
    for (_, original) in appended {
        let entry = pool.entry(original)?;
        out.extend_from_slice(&bytes[entry.range.clone()]);
    }

    let tail_start = out.len();
    out.extend_from_slice(&bytes[pool.end..]);
    for (offset, copy) in tail_patches {
        let at = tail_start + (offset - pool.end);
        out[at..at + 2].copy_from_slice(&copy.to_be_bytes());
    }

    Ok(Some(out))
}

/// All UTF8 constants of a class file, in pool order
pub fn utf8_constants(bytes: &[u8]) -> ClassResult<Vec<String>> {
    let pool = ConstantPool::parse(bytes)?;
    Ok(pool
        .iter()
        .filter_map(|(_, entry)| match &entry.constant {
            Constant::Utf8(text) => Some(text.clone()),
            _ => None,
        })
        .collect())
}

const TAG_UTF8: u8 = 1;
const TAG_STRING: u8 = 8;

#[derive(Debug, Clone)]
enum Constant {
    Utf8(String),
    Class(u16),
    String(u16),
    NameAndType { descriptor: u16 },
    MethodType(u16),
    Other,
}

#[derive(Debug, Clone)]
struct PoolEntry {
    constant: Constant,
    /// Byte range of the whole entry (tag included) in the original file
    range: Range<usize>,
}

struct ConstantPool {
    /// Slot 0 and the second slot of long/double constants are empty
    entries: Vec<Option<PoolEntry>>,
    /// Offset of the first byte after the pool
    end: usize,
}

impl ConstantPool {
    fn parse(bytes: &[u8]) -> ClassResult<Self> {
        let mut cur = Cursor::new(bytes, 0);
        if cur.u4()? != MAGIC {
            return Err(ClassFileError::BadMagic);
        }
        cur.skip(4)?; // minor, major
        let count = cur.u2()?;

        let mut entries: Vec<Option<PoolEntry>> = vec![None; count.max(1) as usize];
        let mut index: u16 = 1;
        while index < count {
            let start = cur.pos;
            let tag = cur.u1()?;
            let mut wide = false;
            let constant = match tag {
                1 => {
                    let len = cur.u2()? as usize;
                    let raw = cur.bytes(len)?;
                    Constant::Utf8(mutf8::decode(raw).map_err(|_| ClassFileError::InvalidUtf8(index))?)
                }
                3 | 4 => {
                    cur.skip(4)?;
                    Constant::Other
                }
                5 | 6 => {
                    cur.skip(8)?;
                    wide = true;
                    Constant::Other
                }
                7 => Constant::Class(cur.u2()?),
                8 => Constant::String(cur.u2()?),
                9..=11 | 17 | 18 => {
                    cur.skip(4)?;
                    Constant::Other
                }
                12 => {
                    cur.skip(2)?;
                    Constant::NameAndType {
                        descriptor: cur.u2()?,
                    }
                }
                15 => {
                    cur.skip(3)?;
                    Constant::Other
                }
                16 => Constant::MethodType(cur.u2()?),
                19 | 20 => {
                    cur.skip(2)?;
                    Constant::Other
                }
                _ => return Err(ClassFileError::BadConstantTag { tag, index }),
            };

            entries[index as usize] = Some(PoolEntry {
                constant,
                range: start..cur.pos,
            });
            index += if wide { 2 } else { 1 };
        }

        Ok(Self {
            entries,
            end: cur.pos,
        })
    }

    /// Declared constant_pool_count
    fn count(&self) -> usize {
        self.entries.len()
    }

    fn iter(&self) -> impl Iterator<Item = (u16, &PoolEntry)> {
        self.entries
            .iter()
            .enumerate()
            .filter_map(|(i, e)| e.as_ref().map(|e| (i as u16, e)))
    }

    fn entry(&self, index: u16) -> ClassResult<&PoolEntry> {
        self.entries
            .get(index as usize)
            .and_then(|e| e.as_ref())
            .ok_or(ClassFileError::BadIndex(index))
    }

    fn utf8(&self, index: u16) -> ClassResult<&str> {
        match &self.entry(index)?.constant {
            Constant::Utf8(text) => Ok(text),
            _ => Err(ClassFileError::BadIndex(index)),
        }
    }

    fn collect_references(&self, refs: &mut References) -> ClassResult<()> {
        for (_, entry) in self.iter() {
            match entry.constant {
                Constant::Class(name) => refs.add(self, name, Role::ClassName)?,
                Constant::NameAndType { descriptor } | Constant::MethodType(descriptor) => {
                    refs.add(self, descriptor, Role::Descriptor)?
                }
                Constant::String(target) => {
                    self.utf8(target)?;
                }
                _ => {}
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Role {
    ClassName,
    Descriptor,
}

#[derive(Default)]
struct References {
    roles: BTreeMap<u16, Role>,
    /// Absolute offsets of u2 indices in the tail that point at string values
    literal_offsets: Vec<(usize, u16)>,
}

impl References {
    fn add(&mut self, pool: &ConstantPool, index: u16, role: Role) -> ClassResult<()> {
        pool.utf8(index)?;
        // A class name role takes precedence; array class names are descriptors anyway
        self.roles
            .entry(index)
            .and_modify(|r| {
                if role == Role::ClassName {
                    *r = Role::ClassName;
                }
            })
            .or_insert(role);
        Ok(())
    }
}

/// Walk fields, methods and attributes after the constant pool
fn scan_tail(bytes: &[u8], start: usize, pool: &ConstantPool, refs: &mut References) -> ClassResult<()> {
    let mut cur = Cursor::new(bytes, start);
    cur.skip(6)?; // access_flags, this_class, super_class
    let interfaces = cur.u2()? as usize;
    cur.skip(interfaces * 2)?;

    for _ in 0..2 {
        // fields, then methods
        let count = cur.u2()?;
        for _ in 0..count {
            cur.skip(4)?; // access_flags, name_index
            let descriptor = cur.u2()?;
            refs.add(pool, descriptor, Role::Descriptor)?;
            scan_attributes(&mut cur, pool, refs)?;
        }
    }

    scan_attributes(&mut cur, pool, refs)
}

fn scan_attributes(cur: &mut Cursor<'_>, pool: &ConstantPool, refs: &mut References) -> ClassResult<()> {
    let count = cur.u2()?;
    for _ in 0..count {
        let name_index = cur.u2()?;
        let name = pool.utf8(name_index)?;
        let len = cur.u4()? as usize;
        let body_start = cur.pos;
        let body_end = body_start
            .checked_add(len)
            .filter(|&end| end <= cur.limit())
            .ok_or(ClassFileError::Truncated(body_start))?;

        let mut body = cur.bounded(body_end);
        scan_attribute(name, &mut body, pool, refs).map_err(|e| match e {
            ClassFileError::Truncated(_) => ClassFileError::AttributeOverrun {
                name: name.to_string(),
            },
            other => other,
        })?;
        cur.pos = body_end;
    }
    Ok(())
}

fn scan_attribute(
    name: &str,
    cur: &mut Cursor<'_>,
    pool: &ConstantPool,
    refs: &mut References,
) -> ClassResult<()> {
    match name {
        "Signature" => {
            let signature = cur.u2()?;
            refs.add(pool, signature, Role::Descriptor)?;
        }
        "Code" => {
            cur.skip(4)?; // max_stack, max_locals
            let code_len = cur.u4()? as usize;
            cur.skip(code_len)?;
            let handlers = cur.u2()? as usize;
            cur.skip(handlers * 8)?;
            scan_attributes(cur, pool, refs)?;
        }
        "LocalVariableTable" | "LocalVariableTypeTable" => {
            let count = cur.u2()?;
            for _ in 0..count {
                cur.skip(6)?; // start_pc, length, name_index
                let descriptor = cur.u2()?;
                refs.add(pool, descriptor, Role::Descriptor)?;
                cur.skip(2)?; // index
            }
        }
        "RuntimeVisibleAnnotations" | "RuntimeInvisibleAnnotations" => {
            let count = cur.u2()?;
            for _ in 0..count {
                scan_annotation(cur, pool, refs)?;
            }
        }
        "RuntimeVisibleParameterAnnotations" | "RuntimeInvisibleParameterAnnotations" => {
            let params = cur.u1()?;
            for _ in 0..params {
                let count = cur.u2()?;
                for _ in 0..count {
                    scan_annotation(cur, pool, refs)?;
                }
            }
        }
        "RuntimeVisibleTypeAnnotations" | "RuntimeInvisibleTypeAnnotations" => {
            let count = cur.u2()?;
            for _ in 0..count {
                skip_type_annotation_target(cur)?;
                scan_annotation(cur, pool, refs)?;
            }
        }
        "AnnotationDefault" => scan_element_value(cur, pool, refs)?,
        "Record" => {
            let count = cur.u2()?;
            for _ in 0..count {
                cur.skip(2)?; // name_index
                let descriptor = cur.u2()?;
                refs.add(pool, descriptor, Role::Descriptor)?;
                scan_attributes(cur, pool, refs)?;
            }
        }
        _ => {}
    }
    Ok(())
}

/// Skip `target_type`, `target_info` and `type_path` of a type annotation
fn skip_type_annotation_target(cur: &mut Cursor<'_>) -> ClassResult<()> {
    let target_type = cur.u1()?;
    match target_type {
        0x00 | 0x01 | 0x16 => cur.skip(1)?,
        0x10 | 0x11 | 0x12 | 0x17 | 0x42 | 0x43..=0x46 => cur.skip(2)?,
        0x13..=0x15 => {}
        0x40 | 0x41 => {
            let table = cur.u2()? as usize;
            cur.skip(table * 6)?;
        }
        0x47..=0x4B => cur.skip(3)?,
        _ => {
            return Err(ClassFileError::AttributeOverrun {
                name: format!("type annotation target {:#04x}", target_type),
            });
        }
    }
    let path_length = cur.u1()? as usize;
    cur.skip(path_length * 2)
}

fn scan_annotation(cur: &mut Cursor<'_>, pool: &ConstantPool, refs: &mut References) -> ClassResult<()> {
    let type_index = cur.u2()?;
    refs.add(pool, type_index, Role::Descriptor)?;
    let pairs = cur.u2()?;
    for _ in 0..pairs {
        cur.skip(2)?; // element_name_index
        scan_element_value(cur, pool, refs)?;
    }
    Ok(())
}

fn scan_element_value(cur: &mut Cursor<'_>, pool: &ConstantPool, refs: &mut References) -> ClassResult<()> {
    let tag = cur.u1()?;
    match tag {
        b's' => {
            let offset = cur.pos;
            let value = cur.u2()?;
            pool.utf8(value)?;
            refs.literal_offsets.push((offset, value));
        }
        b'B' | b'C' | b'D' | b'F' | b'I' | b'J' | b'S' | b'Z' => cur.skip(2)?,
        b'e' => {
            let type_name = cur.u2()?;
            refs.add(pool, type_name, Role::Descriptor)?;
            cur.skip(2)?; // const_name_index
        }
        b'c' => {
            let class_info = cur.u2()?;
            refs.add(pool, class_info, Role::Descriptor)?;
        }
        b'@' => scan_annotation(cur, pool, refs)?,
        b'[' => {
            let count = cur.u2()?;
            for _ in 0..count {
                scan_element_value(cur, pool, refs)?;
            }
        }
        _ => {
            return Err(ClassFileError::AttributeOverrun {
                name: format!("element value tag {}", tag),
            });
        }
    }
    Ok(())
}

/// Big-endian reader with absolute positions
struct Cursor<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn new(data: &'a [u8], pos: usize) -> Self {
        Self { data, pos }
    }

    fn limit(&self) -> usize {
        self.data.len()
    }

    /// A cursor at the current position that cannot read past `end`
    fn bounded(&self, end: usize) -> Cursor<'a> {
        let data: &'a [u8] = self.data;
        Cursor {
            data: &data[..end],
            pos: self.pos,
        }
    }

    fn bytes(&mut self, n: usize) -> ClassResult<&'a [u8]> {
        let end = self
            .pos
            .checked_add(n)
            .filter(|&end| end <= self.data.len())
            .ok_or(ClassFileError::Truncated(self.pos))?;
        let data: &'a [u8] = self.data;
        let slice = &data[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    fn skip(&mut self, n: usize) -> ClassResult<()> {
        self.bytes(n).map(|_| ())
    }

    fn u1(&mut self) -> ClassResult<u8> {
        Ok(self.bytes(1)?[0])
    }

    fn u2(&mut self) -> ClassResult<u16> {
        let b = self.bytes(2)?;
        Ok(u16::from_be_bytes([b[0], b[1]]))
    }

    fn u4(&mut self) -> ClassResult<u32> {
        let b = self.bytes(4)?;
        Ok(u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
    }
}
