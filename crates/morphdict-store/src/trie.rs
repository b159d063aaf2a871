// Byte trie string table.
//
// Nodes are stored breadth-first, so the children of a node are contiguous
// and sorted by label. Keys are numbered by their rank in encoded byte
// order, which makes identifiers dense and a depth-first walk yield keys in
// identifier order.

use std::collections::VecDeque;

use bytemuck::{Pod, Zeroable};

use crate::array::{ArrayLayout, PodArray};
use crate::charset::Charset;
use crate::region::SectionReader;
use crate::{Result, StoreError, corrupted};

/// `key_id` of a node that does not terminate a key.
pub(crate) const NO_KEY: u32 = u32::MAX;
const ROOT: u32 = 0;

/// A trie node (16 bytes).
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Pod, Zeroable)]
pub(crate) struct TrieNode {
    /// Index of the first child; children are contiguous.
    pub first_child: u32,
    /// Index of the parent node. The root points at itself.
    pub parent: u32,
    /// Identifier of the key ending at this node, or [`NO_KEY`].
    pub key_id: u32,
    pub child_count: u16,
    /// Byte on the edge from the parent.
    pub label: u8,
    pub _reserved: u8,
}

const _: () = assert!(size_of::<TrieNode>() == 16);

#[derive(Debug, Clone, Copy)]
pub(crate) struct TrieLayout {
    charset: Charset,
    nodes: ArrayLayout<TrieNode>,
    key_nodes: ArrayLayout<u32>,
}

impl TrieLayout {
    /// Read `key_count u32, node_count u32, [TrieNode], [u32; key_count]`.
    pub(crate) fn read(reader: &mut SectionReader<'_>, charset: Charset) -> Result<Self> {
        let key_count = reader.read_u32()? as usize;
        let node_count = reader.read_u32()? as usize;
        if node_count == 0 {
            return Err(StoreError::illegal_state("trie without a root node"));
        }
        let nodes = reader.skip_array::<TrieNode>(node_count)?;
        let key_nodes = reader.skip_array::<u32>(key_count)?;
        Ok(Self {
            charset,
            nodes,
            key_nodes,
        })
    }

    pub(crate) fn len(&self) -> usize {
        self.key_nodes.len()
    }

    pub(crate) fn view<'a>(&self, data: &'a [u8]) -> TrieTable<'a> {
        TrieTable {
            charset: self.charset,
            nodes: self.nodes.view(data),
            key_nodes: self.key_nodes.view(data),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct TrieTable<'a> {
    charset: Charset,
    nodes: PodArray<'a, TrieNode>,
    key_nodes: PodArray<'a, u32>,
}

impl<'a> TrieTable<'a> {
    pub(crate) fn charset(&self) -> Charset {
        self.charset
    }

    pub(crate) fn len(&self) -> usize {
        self.key_nodes.len()
    }

    /// Address of the node array, unique to this table within its region.
    pub(crate) fn address(&self) -> usize {
        self.nodes.as_ptr() as usize
    }

    #[inline]
    fn node(&self, index: u32) -> TrieNode {
        self.nodes
            .get(index as usize)
            .unwrap_or_else(|| corrupted("trie node index out of range"))
    }

    fn child(&self, node: &TrieNode, label: u8) -> Option<u32> {
        let (mut lo, mut hi) = (0u32, u32::from(node.child_count));
        while lo < hi {
            let mid = lo + (hi - lo) / 2;
            let index = node.first_child + mid;
            let child = self.node(index);
            match child.label.cmp(&label) {
                std::cmp::Ordering::Less => lo = mid + 1,
                std::cmp::Ordering::Greater => hi = mid,
                std::cmp::Ordering::Equal => return Some(index),
            }
        }
        None
    }

    fn find_node(&self, key: &[u8]) -> Option<u32> {
        let mut index = ROOT;
        for &byte in key {
            let node = self.node(index);
            index = self.child(&node, byte)?;
        }
        Some(index)
    }

    pub(crate) fn identifier(&self, key: &str) -> Option<u32> {
        let encoded = self.charset.encode(key);
        let key_id = self.node(self.find_node(&encoded)?).key_id;
        (key_id != NO_KEY).then_some(key_id)
    }

    /// Encoded bytes of the key with identifier `id`, rebuilt from the
    /// parent chain.
    fn key_bytes(&self, id: u32) -> Option<Vec<u8>> {
        let mut index = self.key_nodes.get(id as usize)?;
        let mut bytes = Vec::new();
        while index != ROOT {
            if bytes.len() > self.nodes.len() {
                corrupted("cycle in trie parent links");
            }
            let node = self.node(index);
            bytes.push(node.label);
            index = node.parent;
        }
        bytes.reverse();
        Some(bytes)
    }

    pub(crate) fn get(&self, id: u32) -> Option<String> {
        let bytes = self.key_bytes(id)?;
        match self.charset.decode(&bytes) {
            Some(s) => Some(s),
            None => corrupted("trie key is not valid in its charset"),
        }
    }

    /// Depth-first cursor over the keys starting with `prefix`.
    pub(crate) fn cursor(&self, prefix: &str) -> TrieCursor<'a> {
        let path = self.charset.encode(prefix);
        let stack = match self.find_node(&path) {
            Some(node) => vec![Frame {
                node,
                next_child: 0,
                entered: false,
            }],
            None => Vec::new(),
        };
        TrieCursor {
            table: *self,
            stack,
            path,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Frame {
    node: u32,
    next_child: u16,
    entered: bool,
}

/// Explicit-stack depth-first walk; `path` holds the encoded bytes of the
/// node on top of the stack.
#[derive(Debug, Clone)]
pub(crate) struct TrieCursor<'a> {
    table: TrieTable<'a>,
    stack: Vec<Frame>,
    path: Vec<u8>,
}

impl Iterator for TrieCursor<'_> {
    type Item = (String, u32);

    fn next(&mut self) -> Option<(String, u32)> {
        loop {
            let frame = self.stack.last_mut()?;
            let node = self.table.node(frame.node);

            if !frame.entered {
                frame.entered = true;
                if node.key_id != NO_KEY {
                    let Some(key) = self.table.charset.decode(&self.path) else {
                        corrupted("trie key is not valid in its charset");
                    };
                    return Some((key, node.key_id));
                }
            }

            if frame.next_child < node.child_count {
                let index = node.first_child + u32::from(frame.next_child);
                frame.next_child += 1;
                self.path.push(self.table.node(index).label);
                self.stack.push(Frame {
                    node: index,
                    next_child: 0,
                    entered: false,
                });
            } else {
                self.stack.pop();
                if !self.stack.is_empty() {
                    self.path.pop();
                }
            }
        }
    }
}

/// Built trie: nodes, key-to-node map, and each input string's identifier.
pub(crate) struct BuiltTrie {
    pub nodes: Vec<TrieNode>,
    pub key_nodes: Vec<u32>,
    pub identifiers: Vec<(String, u32)>,
}

/// Build a trie over `strings` (which must be distinct) in `charset`.
pub(crate) fn build<'s>(strings: impl IntoIterator<Item = &'s str>, charset: Charset) -> BuiltTrie {
    let mut keys: Vec<(Vec<u8>, &str)> = strings
        .into_iter()
        .map(|s| (charset.encode(s), s))
        .collect();
    keys.sort_unstable_by(|a, b| a.0.cmp(&b.0));
    keys.dedup_by(|a, b| a.0 == b.0);

    let mut nodes = vec![TrieNode {
        first_child: 0,
        parent: ROOT,
        key_id: NO_KEY,
        child_count: 0,
        label: 0,
        _reserved: 0,
    }];
    let mut key_nodes = vec![0u32; keys.len()];

    // (node, depth, key range sharing the node's prefix)
    let mut queue = VecDeque::from([(ROOT, 0usize, 0usize, keys.len())]);
    while let Some((index, depth, lo, hi)) = queue.pop_front() {
        let mut start = lo;
        if start < hi && keys[start].0.len() == depth {
            nodes[index as usize].key_id = start as u32;
            key_nodes[start] = index;
            start += 1;
        }

        let first_child = nodes.len() as u32;
        let mut child_count = 0u16;
        while start < hi {
            let label = keys[start].0[depth];
            let mut end = start + 1;
            while end < hi && keys[end].0[depth] == label {
                end += 1;
            }
            let child = nodes.len() as u32;
            nodes.push(TrieNode {
                first_child: 0,
                parent: index,
                key_id: NO_KEY,
                child_count: 0,
                label,
                _reserved: 0,
            });
            queue.push_back((child, depth + 1, start, end));
            child_count += 1;
            start = end;
        }
        let node = &mut nodes[index as usize];
        node.first_child = first_child;
        node.child_count = child_count;
    }

    let identifiers = keys
        .iter()
        .enumerate()
        .map(|(id, (_, s))| (s.to_string(), id as u32))
        .collect();
    BuiltTrie {
        nodes,
        key_nodes,
        identifiers,
    }
}
