//! Red-black tree implementation for the ordered index
//!
//! A self-balancing binary search tree with parent pointers, giving
//! O(log n) worst-case put/get/del and O(n) ordered iteration. Nodes are
//! heap-allocated and linked with raw pointers; all unsafe code is confined
//! to this module.

use super::{compare_keys, Entry, OrderedIndex};
use std::cmp::Ordering;
use std::ptr::NonNull;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Color {
    Red,
    Black,
}

type Link = Option<NonNull<Node>>;

struct Node {
    entry: Entry,
    color: Color,
    parent: Link,
    left: Link,
    right: Link,
}

impl Node {
    fn new(entry: Entry) -> Box<Self> {
        Box::new(Self {
            entry,
            color: Color::Red,
            parent: None,
            left: None,
            right: None,
        })
    }
}

/// Absent children count as black
fn color(link: Link) -> Color {
    link.map_or(Color::Black, |n| unsafe { (*n.as_ptr()).color })
}

/// Red-black tree keyed by the length-then-lexicographic key order
pub struct RbTree {
    root: Link,
    len: usize,
    size: u64,
}

impl RbTree {
    /// Create an empty tree
    pub fn new() -> Self {
        Self {
            root: None,
            len: 0,
            size: 0,
        }
    }

    /// Insert or overwrite a key
    ///
    /// Returns the previous value if the key existed. On overwrite the old
    /// value's size contribution is subtracted before the new one is added.
    pub fn put(&mut self, key: Vec<u8>, value: Vec<u8>) -> Option<Vec<u8>> {
        let mut parent: Link = None;
        let mut went_left = false;
        let mut cur = self.root;

        while let Some(n) = cur {
            let node = unsafe { &mut *n.as_ptr() };
            match compare_keys(&key, &node.entry.key) {
                Ordering::Less => {
                    parent = Some(n);
                    went_left = true;
                    cur = node.left;
                }
                Ordering::Greater => {
                    parent = Some(n);
                    went_left = false;
                    cur = node.right;
                }
                Ordering::Equal => {
                    self.size -= node.entry.value.len() as u64;
                    self.size += value.len() as u64;
                    let old = std::mem::replace(&mut node.entry.value, value);
                    return Some(old);
                }
            }
        }

        self.size += (key.len() + value.len()) as u64;
        self.len += 1;

        let mut node = Node::new(Entry::new(key, value));
        node.parent = parent;
        let n = NonNull::new(Box::into_raw(node)).unwrap();

        match parent {
            None => self.root = Some(n),
            Some(p) => unsafe {
                if went_left {
                    (*p.as_ptr()).left = Some(n);
                } else {
                    (*p.as_ptr()).right = Some(n);
                }
            },
        }

        unsafe { self.fix_insert(n) };
        None
    }

    /// Get a value by key
    pub fn get(&self, key: &[u8]) -> Option<&[u8]> {
        self.find(key)
            .map(|n| unsafe { (*n.as_ptr()).entry.value.as_slice() })
    }

    /// Check whether a key is present
    pub fn has(&self, key: &[u8]) -> bool {
        self.find(key).is_some()
    }

    /// Remove a key
    ///
    /// Returns the previous value if the key existed; removing an absent key
    /// is a no-op.
    pub fn del(&mut self, key: &[u8]) -> Option<Vec<u8>> {
        let z = self.find(key)?;
        let entry = unsafe { self.remove_node(z) };
        self.len -= 1;
        self.size -= entry.size();
        Some(entry.value)
    }

    /// Entry with the smallest key
    pub fn min(&self) -> Option<&Entry> {
        self.root
            .map(|r| unsafe { &(*Self::min_node(r).as_ptr()).entry })
    }

    /// Entry with the largest key
    pub fn max(&self) -> Option<&Entry> {
        self.root
            .map(|r| unsafe { &(*Self::max_node(r).as_ptr()).entry })
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.len
    }

    /// Check if the tree holds no entries
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Cumulative byte length of all stored keys and values
    pub fn size(&self) -> u64 {
        self.size
    }

    /// Walk entries in ascending key order; stops early when `visit` returns false
    pub fn scan_front(&self, visit: &mut dyn FnMut(&Entry) -> bool) {
        unsafe {
            let mut cur = self.root.map(|r| Self::min_node(r));
            while let Some(n) = cur {
                if !visit(&(*n.as_ptr()).entry) {
                    return;
                }
                cur = Self::next_node(n);
            }
        }
    }

    /// Walk entries in descending key order; stops early when `visit` returns false
    pub fn scan_back(&self, visit: &mut dyn FnMut(&Entry) -> bool) {
        unsafe {
            let mut cur = self.root.map(|r| Self::max_node(r));
            while let Some(n) = cur {
                if !visit(&(*n.as_ptr()).entry) {
                    return;
                }
                cur = Self::prev_node(n);
            }
        }
    }

    /// Walk entries whose key lies in `[start, end]` inclusive, ascending
    pub fn scan_range(&self, start: &[u8], end: &[u8], visit: &mut dyn FnMut(&Entry) -> bool) {
        unsafe {
            let mut cur = self.lower_bound(start);
            while let Some(n) = cur {
                let entry = &(*n.as_ptr()).entry;
                if compare_keys(&entry.key, end) == Ordering::Greater {
                    return;
                }
                if !visit(entry) {
                    return;
                }
                cur = Self::next_node(n);
            }
        }
    }

    /// Release every entry, leaving the tree empty
    pub fn clear(&mut self) {
        unsafe fn drop_subtree(link: Link) {
            if let Some(n) = link {
                let node = Box::from_raw(n.as_ptr());
                drop_subtree(node.left);
                drop_subtree(node.right);
            }
        }
        unsafe { drop_subtree(self.root.take()) };
        self.len = 0;
        self.size = 0;
    }

    // -------------------------------------------------------------------
    // search helpers
    // -------------------------------------------------------------------

    fn find(&self, key: &[u8]) -> Link {
        let mut cur = self.root;
        while let Some(n) = cur {
            let node = unsafe { &*n.as_ptr() };
            match compare_keys(key, &node.entry.key) {
                Ordering::Less => cur = node.left,
                Ordering::Greater => cur = node.right,
                Ordering::Equal => return Some(n),
            }
        }
        None
    }

    /// First node whose key is >= `key`
    fn lower_bound(&self, key: &[u8]) -> Link {
        let mut cur = self.root;
        let mut candidate = None;
        while let Some(n) = cur {
            let node = unsafe { &*n.as_ptr() };
            if compare_keys(&node.entry.key, key) == Ordering::Less {
                cur = node.right;
            } else {
                candidate = Some(n);
                cur = node.left;
            }
        }
        candidate
    }

    unsafe fn min_node(mut n: NonNull<Node>) -> NonNull<Node> {
        while let Some(l) = (*n.as_ptr()).left {
            n = l;
        }
        n
    }

    unsafe fn max_node(mut n: NonNull<Node>) -> NonNull<Node> {
        while let Some(r) = (*n.as_ptr()).right {
            n = r;
        }
        n
    }

    /// In-order successor
    unsafe fn next_node(n: NonNull<Node>) -> Link {
        if let Some(r) = (*n.as_ptr()).right {
            return Some(Self::min_node(r));
        }
        let mut cur = n;
        let mut parent = (*n.as_ptr()).parent;
        while let Some(p) = parent {
            if (*p.as_ptr()).left == Some(cur) {
                return Some(p);
            }
            cur = p;
            parent = (*p.as_ptr()).parent;
        }
        None
    }

    /// In-order predecessor
    unsafe fn prev_node(n: NonNull<Node>) -> Link {
        if let Some(l) = (*n.as_ptr()).left {
            return Some(Self::max_node(l));
        }
        let mut cur = n;
        let mut parent = (*n.as_ptr()).parent;
        while let Some(p) = parent {
            if (*p.as_ptr()).right == Some(cur) {
                return Some(p);
            }
            cur = p;
            parent = (*p.as_ptr()).parent;
        }
        None
    }

    // -------------------------------------------------------------------
    // structural maintenance
    // -------------------------------------------------------------------

    unsafe fn rotate_left(&mut self, x: NonNull<Node>) {
        let xp = x.as_ptr();
        let y = (*xp).right.unwrap();
        let yp = y.as_ptr();

        (*xp).right = (*yp).left;
        if let Some(yl) = (*yp).left {
            (*yl.as_ptr()).parent = Some(x);
        }
        (*yp).parent = (*xp).parent;
        match (*xp).parent {
            None => self.root = Some(y),
            Some(p) => {
                if (*p.as_ptr()).left == Some(x) {
                    (*p.as_ptr()).left = Some(y);
                } else {
                    (*p.as_ptr()).right = Some(y);
                }
            }
        }
        (*yp).left = Some(x);
        (*xp).parent = Some(y);
    }

    unsafe fn rotate_right(&mut self, x: NonNull<Node>) {
        let xp = x.as_ptr();
        let y = (*xp).left.unwrap();
        let yp = y.as_ptr();

        (*xp).left = (*yp).right;
        if let Some(yr) = (*yp).right {
            (*yr.as_ptr()).parent = Some(x);
        }
        (*yp).parent = (*xp).parent;
        match (*xp).parent {
            None => self.root = Some(y),
            Some(p) => {
                if (*p.as_ptr()).right == Some(x) {
                    (*p.as_ptr()).right = Some(y);
                } else {
                    (*p.as_ptr()).left = Some(y);
                }
            }
        }
        (*yp).right = Some(x);
        (*xp).parent = Some(y);
    }

    unsafe fn fix_insert(&mut self, mut z: NonNull<Node>) {
        while color((*z.as_ptr()).parent) == Color::Red {
            // a red parent is never the root, so the grandparent exists
            let p = (*z.as_ptr()).parent.unwrap();
            let g = (*p.as_ptr()).parent.unwrap();

            if (*g.as_ptr()).left == Some(p) {
                let uncle = (*g.as_ptr()).right;
                if color(uncle) == Color::Red {
                    (*p.as_ptr()).color = Color::Black;
                    (*uncle.unwrap().as_ptr()).color = Color::Black;
                    (*g.as_ptr()).color = Color::Red;
                    z = g;
                } else {
                    if (*p.as_ptr()).right == Some(z) {
                        z = p;
                        self.rotate_left(z);
                    }
                    let p = (*z.as_ptr()).parent.unwrap();
                    let g = (*p.as_ptr()).parent.unwrap();
                    (*p.as_ptr()).color = Color::Black;
                    (*g.as_ptr()).color = Color::Red;
                    self.rotate_right(g);
                }
            } else {
                let uncle = (*g.as_ptr()).left;
                if color(uncle) == Color::Red {
                    (*p.as_ptr()).color = Color::Black;
                    (*uncle.unwrap().as_ptr()).color = Color::Black;
                    (*g.as_ptr()).color = Color::Red;
                    z = g;
                } else {
                    if (*p.as_ptr()).left == Some(z) {
                        z = p;
                        self.rotate_right(z);
                    }
                    let p = (*z.as_ptr()).parent.unwrap();
                    let g = (*p.as_ptr()).parent.unwrap();
                    (*p.as_ptr()).color = Color::Black;
                    (*g.as_ptr()).color = Color::Red;
                    self.rotate_left(g);
                }
            }
        }
        if let Some(r) = self.root {
            (*r.as_ptr()).color = Color::Black;
        }
    }

    /// Replace the subtree rooted at `u` with the one rooted at `v`
    unsafe fn transplant(&mut self, u: NonNull<Node>, v: Link) {
        match (*u.as_ptr()).parent {
            None => self.root = v,
            Some(p) => {
                if (*p.as_ptr()).left == Some(u) {
                    (*p.as_ptr()).left = v;
                } else {
                    (*p.as_ptr()).right = v;
                }
            }
        }
        if let Some(v) = v {
            (*v.as_ptr()).parent = (*u.as_ptr()).parent;
        }
    }

    /// Unlink `z` from the tree and return its entry
    unsafe fn remove_node(&mut self, z: NonNull<Node>) -> Entry {
        let zp = z.as_ptr();
        let mut removed_color = (*zp).color;
        let x: Link;
        let x_parent: Link;

        if (*zp).left.is_none() {
            x = (*zp).right;
            x_parent = (*zp).parent;
            self.transplant(z, (*zp).right);
        } else if (*zp).right.is_none() {
            x = (*zp).left;
            x_parent = (*zp).parent;
            self.transplant(z, (*zp).left);
        } else {
            // two children: splice in the in-order successor
            let y = Self::min_node((*zp).right.unwrap());
            let yp = y.as_ptr();
            removed_color = (*yp).color;
            x = (*yp).right;

            if (*yp).parent == Some(z) {
                x_parent = Some(y);
            } else {
                x_parent = (*yp).parent;
                self.transplant(y, (*yp).right);
                (*yp).right = (*zp).right;
                (*(*yp).right.unwrap().as_ptr()).parent = Some(y);
            }

            self.transplant(z, Some(y));
            (*yp).left = (*zp).left;
            (*(*yp).left.unwrap().as_ptr()).parent = Some(y);
            (*yp).color = (*zp).color;
        }

        let boxed = Box::from_raw(zp);
        if removed_color == Color::Black {
            self.fix_delete(x, x_parent);
        }
        boxed.entry
    }

    /// Restore the black-height invariant after removing a black node;
    /// `x` carries the extra blackness, `parent` is its parent (`x` may be
    /// an absent child)
    unsafe fn fix_delete(&mut self, mut x: Link, mut parent: Link) {
        while x != self.root && color(x) == Color::Black {
            let p = match parent {
                Some(p) => p,
                None => break,
            };

            if (*p.as_ptr()).left == x {
                // the sibling exists while x is short one black node
                let mut w = (*p.as_ptr()).right.unwrap();
                if (*w.as_ptr()).color == Color::Red {
                    (*w.as_ptr()).color = Color::Black;
                    (*p.as_ptr()).color = Color::Red;
                    self.rotate_left(p);
                    w = (*p.as_ptr()).right.unwrap();
                }
                if color((*w.as_ptr()).left) == Color::Black
                    && color((*w.as_ptr()).right) == Color::Black
                {
                    (*w.as_ptr()).color = Color::Red;
                    x = Some(p);
                    parent = (*p.as_ptr()).parent;
                } else {
                    if color((*w.as_ptr()).right) == Color::Black {
                        if let Some(wl) = (*w.as_ptr()).left {
                            (*wl.as_ptr()).color = Color::Black;
                        }
                        (*w.as_ptr()).color = Color::Red;
                        self.rotate_right(w);
                        w = (*p.as_ptr()).right.unwrap();
                    }
                    (*w.as_ptr()).color = (*p.as_ptr()).color;
                    (*p.as_ptr()).color = Color::Black;
                    if let Some(wr) = (*w.as_ptr()).right {
                        (*wr.as_ptr()).color = Color::Black;
                    }
                    self.rotate_left(p);
                    x = self.root;
                    parent = None;
                }
            } else {
                let mut w = (*p.as_ptr()).left.unwrap();
                if (*w.as_ptr()).color == Color::Red {
                    (*w.as_ptr()).color = Color::Black;
                    (*p.as_ptr()).color = Color::Red;
                    self.rotate_right(p);
                    w = (*p.as_ptr()).left.unwrap();
                }
                if color((*w.as_ptr()).right) == Color::Black
                    && color((*w.as_ptr()).left) == Color::Black
                {
                    (*w.as_ptr()).color = Color::Red;
                    x = Some(p);
                    parent = (*p.as_ptr()).parent;
                } else {
                    if color((*w.as_ptr()).left) == Color::Black {
                        if let Some(wr) = (*w.as_ptr()).right {
                            (*wr.as_ptr()).color = Color::Black;
                        }
                        (*w.as_ptr()).color = Color::Red;
                        self.rotate_left(w);
                        w = (*p.as_ptr()).left.unwrap();
                    }
                    (*w.as_ptr()).color = (*p.as_ptr()).color;
                    (*p.as_ptr()).color = Color::Black;
                    if let Some(wl) = (*w.as_ptr()).left {
                        (*wl.as_ptr()).color = Color::Black;
                    }
                    self.rotate_right(p);
                    x = self.root;
                    parent = None;
                }
            }
        }
        if let Some(x) = x {
            (*x.as_ptr()).color = Color::Black;
        }
    }
}

impl Default for RbTree {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for RbTree {
    fn drop(&mut self) {
        self.clear();
    }
}

impl OrderedIndex for RbTree {
    fn put(&mut self, key: Vec<u8>, value: Vec<u8>) -> Option<Vec<u8>> {
        RbTree::put(self, key, value)
    }

    fn get(&self, key: &[u8]) -> Option<&[u8]> {
        RbTree::get(self, key)
    }

    fn del(&mut self, key: &[u8]) -> Option<Vec<u8>> {
        RbTree::del(self, key)
    }

    fn min(&self) -> Option<&Entry> {
        RbTree::min(self)
    }

    fn max(&self) -> Option<&Entry> {
        RbTree::max(self)
    }

    fn len(&self) -> usize {
        RbTree::len(self)
    }

    fn size(&self) -> u64 {
        RbTree::size(self)
    }

    fn scan_front(&self, visit: &mut dyn FnMut(&Entry) -> bool) {
        RbTree::scan_front(self, visit)
    }

    fn scan_back(&self, visit: &mut dyn FnMut(&Entry) -> bool) {
        RbTree::scan_back(self, visit)
    }

    fn scan_range(&self, start: &[u8], end: &[u8], visit: &mut dyn FnMut(&Entry) -> bool) {
        RbTree::scan_range(self, start, end, visit)
    }

    fn clear(&mut self) {
        RbTree::clear(self)
    }
}

// Nodes are owned by the tree and only reachable through it
unsafe impl Send for RbTree {}
unsafe impl Sync for RbTree {}
