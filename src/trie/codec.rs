//! Versioned binary form of a [`Trie`].
//!
//! Layout, little-endian:
//!
//! ```text
//! [version: i32]
//! node := [data: u8][id: i32][id_count: i32][ids: i32 * id_count][child_count: i32][node * child_count]
//! ```
//!
//! Nodes are written depth first, pre-order. A nested node with data `0` is
//! an end marker. Version 1 is the only decodable layout; any other version
//! loads as an empty trie.

use std::collections::BTreeSet;
use std::fs;
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::Path;

use super::node::{Node, NodeId, NodeKind};
use super::{MatchMode, Trie, TrieError};
use crate::safety;

pub const FORMAT_VERSION: i32 = 1;

struct Header {
    data: u8,
    id: i32,
    id_set: BTreeSet<i32>,
    child_count: usize,
}

/// Serialize `trie` into `writer`.
///
/// Fails with [`TrieError::Unpersistable`] before writing anything if the
/// trie holds wildcard, range or repetition nodes.
pub fn save<W: Write>(trie: &Trie, writer: W) -> Result<(), TrieError> {
    let nodes = trie.nodes();
    let mut stack = vec![NodeId::ROOT];
    let mut order = Vec::with_capacity(nodes.len());
    while let Some(id) = stack.pop() {
        let node = &nodes[id.index()];
        if node.kind.is_primitive() {
            return Err(TrieError::Unpersistable {
                kind: node.kind.name(),
            });
        }
        order.push(id);
        stack.extend(node.children.iter().rev().copied());
    }

    let mut writer = BufWriter::new(writer);
    writer.write_all(&FORMAT_VERSION.to_le_bytes())?;
    for id in order {
        let node = &nodes[id.index()];
        writer.write_all(&[node.kind.data()])?;
        write_i32(&mut writer, node.id)?;
        write_len(&mut writer, node.id_set.len())?;
        for &member in &node.id_set {
            write_i32(&mut writer, member)?;
        }
        write_len(&mut writer, node.children.len())?;
    }
    writer.flush()?;
    Ok(())
}

/// Deserialize a trie from `reader`.
///
/// A version-1 trie is returned in [`MatchMode::Fuzzy`]. Unknown versions
/// yield an empty trie in exact mode.
pub fn load<R: Read>(reader: R) -> Result<Trie, TrieError> {
    let mut reader = BufReader::new(reader);
    let version = read_i32(&mut reader)?;
    if version != FORMAT_VERSION {
        tracing::warn!(version, "unknown trie format version, loading empty tree");
        return Ok(Trie::new());
    }

    let root = read_header(&mut reader)?;
    let mut nodes = vec![Node {
        kind: NodeKind::Root,
        id: root.id,
        id_set: root.id_set,
        children: Vec::new(),
    }];
    let mut pending = vec![(NodeId::ROOT, root.child_count)];

    while let Some(top) = pending.last_mut() {
        if top.1 == 0 {
            pending.pop();
            continue;
        }
        top.1 -= 1;
        let parent = top.0;

        let header = read_header(&mut reader)?;
        let kind = if header.data == super::node::END_BYTE {
            NodeKind::End
        } else {
            NodeKind::Literal(header.data)
        };
        let child = NodeId(u32::try_from(nodes.len()).map_err(|_| TrieError::Truncated)?);
        nodes.push(Node {
            kind,
            id: header.id,
            id_set: header.id_set,
            children: Vec::new(),
        });
        nodes[parent.index()].children.push(child);
        pending.push((child, header.child_count));
    }

    tracing::debug!(nodes = nodes.len(), "loaded persisted trie");
    Ok(Trie::from_parts(nodes, MatchMode::Fuzzy))
}

/// Write `trie` to `path` through a temporary file in the same directory.
pub fn save_to_path(trie: &Trie, path: &Path) -> Result<(), TrieError> {
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::create_dir_all(parent)?;

    let mut temp = safety::temp_file_in(parent)?;
    save(trie, temp.as_file_mut())?;
    temp.as_file().sync_all()?;
    temp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

pub fn load_from_path(path: &Path) -> Result<Trie, TrieError> {
    load(fs::File::open(path)?)
}

fn read_header<R: Read>(reader: &mut R) -> Result<Header, TrieError> {
    let mut data = [0u8; 1];
    read_exact(reader, &mut data)?;
    let id = read_i32(reader)?;
    let id_count = read_len(reader)?;
    let mut id_set = BTreeSet::new();
    for _ in 0..id_count {
        id_set.insert(read_i32(reader)?);
    }
    let child_count = read_len(reader)?;
    Ok(Header {
        data: data[0],
        id,
        id_set,
        child_count,
    })
}

fn read_exact<R: Read>(reader: &mut R, buf: &mut [u8]) -> Result<(), TrieError> {
    reader.read_exact(buf).map_err(|e| match e.kind() {
        io::ErrorKind::UnexpectedEof => TrieError::Truncated,
        _ => TrieError::Io(e),
    })
}

fn read_i32<R: Read>(reader: &mut R) -> Result<i32, TrieError> {
    let mut buf = [0u8; 4];
    read_exact(reader, &mut buf)?;
    Ok(i32::from_le_bytes(buf))
}

fn read_len<R: Read>(reader: &mut R) -> Result<usize, TrieError> {
    usize::try_from(read_i32(reader)?).map_err(|_| TrieError::Truncated)
}

fn write_i32<W: Write>(writer: &mut W, value: i32) -> io::Result<()> {
    writer.write_all(&value.to_le_bytes())
}

fn write_len<W: Write>(writer: &mut W, len: usize) -> Result<(), TrieError> {
    let len = i32::try_from(len).map_err(|_| TrieError::ContractViolation {
        message: format!("{len} entries exceed the persisted format's range"),
    })?;
    write_i32(writer, len)?;
    Ok(())
}
