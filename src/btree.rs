//! B+Tree ordered index.
//!
//! An order-`m` tree keeps at most `m` keys in every node. Internal key `i`
//! is the largest key stored under child `i`, so a lookup descends into the
//! first child whose key is not smaller than the target. All values live in
//! the leaves, which are linked from smallest to largest.
//!
//! ```text
//!                     [8   15]
//!                        |
//!            +-----------+-----------+
//!            |                       |
//!       [2   5   8]              [11   15]
//!            |                       |
//!     +------+------+           +----+----+
//!     |      |      |           |         |
//!  [1 2] -> [3 5] -> [6 8] -> [9 11] -> [13 15]
//! ```
//!
//! Keys are never removed.

use crate::arena::{Arena, Handle};
use std::borrow::Borrow;
use std::fmt::{Debug, Display, Formatter};
use tracing::trace;

const DISK_BLOCK: usize = 512;
const DATA_SIZE: usize = 4;
const DEFAULT_ORDER: usize = DISK_BLOCK / DATA_SIZE;
const MIN_ORDER: usize = 3;

type NodeRef<K, V> = Handle<BNode<K, V>>;

enum BNode<K, V> {
    Leaf {
        keys: Vec<K>,
        values: Vec<V>,
        next: Option<NodeRef<K, V>>,
    },
    Internal {
        keys: Vec<K>,
        children: Vec<NodeRef<K, V>>,
    },
}

impl<K, V> BNode<K, V> {
    fn keys(&self) -> &[K] {
        match self {
            BNode::Leaf { keys, .. } | BNode::Internal { keys, .. } => keys,
        }
    }

    fn max_key(&self) -> &K {
        let keys = self.keys();
        &keys[keys.len() - 1]
    }
}

struct Split<K, V> {
    right: NodeRef<K, V>,
    left_max: K,
    right_max: K,
}

/// Index of the first key `>= key`.
fn child_index<K, Q>(keys: &[K], key: &Q) -> Option<usize>
where
    K: Borrow<Q>,
    Q: Ord + ?Sized,
{
    let i = keys.partition_point(|k| k.borrow() < key);
    (i < keys.len()).then_some(i)
}

pub struct BPlusTree<K, V> {
    order: usize,
    nodes: Arena<BNode<K, V>>,
    root: NodeRef<K, V>,
    // leftmost leaf; splits keep the left half in place so it never moves
    head: NodeRef<K, V>,
    len: usize,
}

impl<K, V> BPlusTree<K, V> {
    pub fn new() -> Self {
        Self::with_order(DEFAULT_ORDER)
    }

    pub fn with_order(order: usize) -> Self {
        let mut nodes = Arena::new();
        let root = nodes.insert(BNode::Leaf {
            keys: Vec::new(),
            values: Vec::new(),
            next: None,
        });
        Self {
            order: order.max(MIN_ORDER),
            nodes,
            root,
            head: root,
            len: 0,
        }
    }

    pub fn order(&self) -> usize {
        self.order
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn height(&self) -> usize {
        let mut height = 1;
        let mut node = self.root;
        while let BNode::Internal { children, .. } = &self.nodes[node] {
            node = children[0];
            height += 1;
        }
        height
    }

    pub fn get<Q>(&self, key: &Q) -> Option<&V>
    where
        K: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        let mut node = self.root;
        loop {
            match &self.nodes[node] {
                BNode::Internal { keys, children } => node = children[child_index(keys, key)?],
                BNode::Leaf { keys, values, .. } => {
                    let i = keys.binary_search_by(|k| k.borrow().cmp(key)).ok()?;
                    return values.get(i);
                }
            }
        }
    }

    pub fn iter(&self) -> Leaves<'_, K, V> {
        Leaves {
            tree: self,
            leaf: Some(self.head),
            pos: 0,
        }
    }
}

impl<K: Ord + Clone, V> BPlusTree<K, V> {
    /// Inserts or overwrites `key`, returning the replaced value.
    pub fn set(&mut self, key: K, value: V) -> Option<V> {
        let (old, split) = self.set_in(self.root, key, value);
        if let Some(split) = split {
            let left = self.root;
            self.root = self.nodes.insert(BNode::Internal {
                keys: vec![split.left_max, split.right_max],
                children: vec![left, split.right],
            });
            trace!(height = self.height(), "b+tree root split");
        }
        if old.is_none() {
            self.len += 1;
        }
        old
    }

    fn set_in(
        &mut self,
        node: NodeRef<K, V>,
        key: K,
        value: V,
    ) -> (Option<V>, Option<Split<K, V>>) {
        let old = match &mut self.nodes[node] {
            BNode::Leaf { keys, values, .. } => match keys.binary_search(&key) {
                Ok(i) => Some(std::mem::replace(&mut values[i], value)),
                Err(i) => {
                    keys.insert(i, key);
                    values.insert(i, value);
                    None
                }
            },
            BNode::Internal { keys, children } => {
                // past every max: the last child takes it and its max grows
                let i = child_index(keys, &key).unwrap_or(keys.len() - 1);
                if keys[i] < key {
                    keys[i] = key.clone();
                }
                let child = children[i];
                let (old, split) = self.set_in(child, key, value);
                if let Some(split) = split {
                    if let BNode::Internal { keys, children } = &mut self.nodes[node] {
                        keys[i] = split.left_max;
                        keys.insert(i + 1, split.right_max);
                        children.insert(i + 1, split.right);
                    }
                }
                old
            }
        };
        if old.is_some() || self.nodes[node].keys().len() <= self.order {
            return (old, None);
        }
        (old, Some(self.split(node)))
    }

    fn split(&mut self, node: NodeRef<K, V>) -> Split<K, V> {
        let mid = (self.order + 1) / 2;
        let (right, left_max) = match &mut self.nodes[node] {
            BNode::Leaf { keys, values, next } => {
                let right = BNode::Leaf {
                    keys: keys.split_off(mid),
                    values: values.split_off(mid),
                    next: *next,
                };
                (right, keys[keys.len() - 1].clone())
            }
            BNode::Internal { keys, children } => {
                let right = BNode::Internal {
                    keys: keys.split_off(mid),
                    children: children.split_off(mid),
                };
                (right, keys[keys.len() - 1].clone())
            }
        };
        let right_max = right.max_key().clone();
        let right = self.nodes.insert(right);
        if let BNode::Leaf { next, .. } = &mut self.nodes[node] {
            *next = Some(right);
        }
        Split {
            right,
            left_max,
            right_max,
        }
    }
}

impl<K, V> Default for BPlusTree<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: Debug, V> BPlusTree<K, V> {
    pub fn dbg_print(&self) {
        println!("{}", self)
    }
}

fn write_node<K: Debug>(f: &mut Formatter<'_>, keys: &[K]) -> std::fmt::Result {
    write!(f, "[")?;
    for (i, key) in keys.iter().enumerate() {
        if i > 0 {
            write!(f, " ")?;
        }
        write!(f, "{:?}", key)?;
    }
    write!(f, "]")
}

/// One line per tree level from the root down, then the leaf chain.
impl<K: Debug, V> Display for BPlusTree<K, V> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let mut level = vec![self.root];
        while !level.is_empty() {
            let mut below = Vec::new();
            for (i, &node) in level.iter().enumerate() {
                if i > 0 {
                    write!(f, " ")?;
                }
                let node = &self.nodes[node];
                write_node(f, node.keys())?;
                if let BNode::Internal { children, .. } = node {
                    below.extend_from_slice(children);
                }
            }
            writeln!(f)?;
            level = below;
        }

        write!(f, "leaves:")?;
        let mut leaf = Some(self.head);
        let mut first = true;
        while let Some(node) = leaf {
            write!(f, "{}", if first { " " } else { " -> " })?;
            first = false;
            let node = &self.nodes[node];
            write_node(f, node.keys())?;
            leaf = match node {
                BNode::Leaf { next, .. } => *next,
                BNode::Internal { .. } => None,
            };
        }
        writeln!(f)
    }
}

impl<K: Debug, V: Debug> Debug for BPlusTree<K, V> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}

/// Walks the leaf chain in key order.
pub struct Leaves<'a, K, V> {
    tree: &'a BPlusTree<K, V>,
    leaf: Option<NodeRef<K, V>>,
    pos: usize,
}

impl<'a, K, V> Iterator for Leaves<'a, K, V> {
    type Item = (&'a K, &'a V);

    fn next(&mut self) -> Option<Self::Item> {
        let tree = self.tree;
        loop {
            match &tree.nodes[self.leaf?] {
                BNode::Leaf { keys, values, next } => {
                    if self.pos < keys.len() {
                        self.pos += 1;
                        return Some((&keys[self.pos - 1], &values[self.pos - 1]));
                    }
                    self.leaf = *next;
                    self.pos = 0;
                }
                BNode::Internal { .. } => return None,
            }
        }
    }
}
