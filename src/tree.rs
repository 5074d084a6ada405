//! Red-black tree over directory entries
//!
//! Each storage's children form a red-black tree rooted at the storage
//! entry's `child` link; a node's `prev`/`next` links are its left and right
//! children. Parent pointers are not part of the on-disk record and live in
//! a transient map rebuilt on load.

use crate::directory::{DirectoryEntry, DirectoryId, EntryColor, NO_ENTRY};
use std::cmp::Ordering;
use std::collections::HashMap;

/// Case-insensitive key order (ASCII lowercase fold).
pub fn compare_keys(left: &str, right: &str) -> Ordering {
    left.bytes()
        .map(|b| b.to_ascii_lowercase())
        .cmp(right.bytes().map(|b| b.to_ascii_lowercase()))
}

/// Find `name` in the child tree of `storage_id`.
pub fn lookup(entries: &[DirectoryEntry], storage_id: DirectoryId, name: &str) -> Option<DirectoryId> {
    let mut current = entries[storage_id as usize].child;
    while current >= 0 {
        let entry = entries.get(current as usize)?;
        match compare_keys(name, &entry.name) {
            Ordering::Equal => return Some(current),
            Ordering::Greater => current = entry.next,
            Ordering::Less => current = entry.prev,
        }
    }
    None
}

/// In-order walk of the child tree of `storage_id`, using an explicit stack.
pub fn in_order(entries: &[DirectoryEntry], storage_id: DirectoryId) -> Vec<DirectoryId> {
    let mut result = Vec::new();
    let mut stack = Vec::new();
    let mut current = entries[storage_id as usize].child;

    while current >= 0 || !stack.is_empty() {
        while current >= 0 {
            stack.push(current);
            current = entries[current as usize].prev;
        }
        let Some(id) = stack.pop() else { break };
        result.push(id);
        current = entries[id as usize].next;
    }

    result
}

/// Mutable view over the directory for tree surgery.
///
/// Borrows the entry array and both transient maps so that insertion can
/// rewire links, recolor nodes and maintain parent bookkeeping in one place.
pub(crate) struct TreeMut<'a> {
    entries: &'a mut Vec<DirectoryEntry>,
    parent: &'a mut HashMap<DirectoryId, DirectoryId>,
    parent_storage: &'a mut HashMap<DirectoryId, DirectoryId>,
}

impl<'a> TreeMut<'a> {
    pub fn new(
        entries: &'a mut Vec<DirectoryEntry>,
        parent: &'a mut HashMap<DirectoryId, DirectoryId>,
        parent_storage: &'a mut HashMap<DirectoryId, DirectoryId>,
    ) -> Self {
        TreeMut {
            entries,
            parent,
            parent_storage,
        }
    }

    fn left(&self, id: DirectoryId) -> DirectoryId {
        self.entries[id as usize].prev
    }

    fn set_left(&mut self, id: DirectoryId, value: DirectoryId) {
        self.entries[id as usize].prev = value;
    }

    fn right(&self, id: DirectoryId) -> DirectoryId {
        self.entries[id as usize].next
    }

    fn set_right(&mut self, id: DirectoryId, value: DirectoryId) {
        self.entries[id as usize].next = value;
    }

    fn color(&self, id: DirectoryId) -> EntryColor {
        self.entries[id as usize].color
    }

    fn set_color(&mut self, id: DirectoryId, color: EntryColor) {
        self.entries[id as usize].color = color;
    }

    fn parent(&self, id: DirectoryId) -> DirectoryId {
        self.parent.get(&id).copied().unwrap_or(NO_ENTRY)
    }

    fn set_parent(&mut self, id: DirectoryId, value: DirectoryId) {
        self.parent.insert(id, value);
    }

    fn storage_of(&self, id: DirectoryId) -> DirectoryId {
        self.parent_storage.get(&id).copied().unwrap_or(NO_ENTRY)
    }

    /// Root of the tree `id` belongs to: the `child` link of its storage.
    fn root(&self, id: DirectoryId) -> DirectoryId {
        self.entries[self.storage_of(id) as usize].child
    }

    fn set_root(&mut self, id: DirectoryId, value: DirectoryId) {
        let storage = self.storage_of(id);
        self.entries[storage as usize].child = value;
    }

    fn keys_ordered_greater(&self, a: DirectoryId, b: DirectoryId) -> bool {
        compare_keys(&self.entries[a as usize].name, &self.entries[b as usize].name)
            == Ordering::Greater
    }

    /// Insert `new_id` into the child tree of `storage_id` and rebalance.
    pub fn insert(&mut self, new_id: DirectoryId, storage_id: DirectoryId) {
        self.parent_storage.insert(new_id, storage_id);
        self.set_left(new_id, NO_ENTRY);
        self.set_right(new_id, NO_ENTRY);

        if self.root(new_id) == NO_ENTRY {
            // Entry 0 is its own storage; linking it as its own child would
            // make a self-loop.
            if new_id != 0 {
                self.set_root(new_id, new_id);
            }
            self.set_color(new_id, EntryColor::Black);
            self.set_parent(new_id, NO_ENTRY);
            return;
        }

        // plain BST insertion, rebalanced below
        let mut x = self.root(new_id);
        let mut y = NO_ENTRY;
        while x >= 0 {
            y = x;
            x = if self.keys_ordered_greater(new_id, x) {
                self.right(x)
            } else {
                self.left(x)
            };
        }

        self.set_parent(new_id, y);
        if self.keys_ordered_greater(new_id, y) {
            self.set_right(y, new_id);
        } else {
            self.set_left(y, new_id);
        }

        self.insert_fixup(new_id);
    }

    fn rotate_left(&mut self, x: DirectoryId) {
        let y = self.right(x);

        // turn y's left subtree into x's right subtree
        let y_left = self.left(y);
        self.set_right(x, y_left);
        if y_left != NO_ENTRY {
            self.set_parent(y_left, x);
        }

        // link x's parent to y
        let x_parent = self.parent(x);
        self.set_parent(y, x_parent);
        if x_parent == NO_ENTRY {
            self.set_root(x, y);
        } else if x == self.left(x_parent) {
            self.set_left(x_parent, y);
        } else {
            self.set_right(x_parent, y);
        }

        // put x on y's left
        self.set_left(y, x);
        self.set_parent(x, y);
    }

    fn rotate_right(&mut self, y: DirectoryId) {
        let x = self.left(y);

        // turn x's right subtree into y's left subtree
        let x_right = self.right(x);
        self.set_left(y, x_right);
        if x_right != NO_ENTRY {
            self.set_parent(x_right, y);
        }

        // link y's parent to x
        let y_parent = self.parent(y);
        self.set_parent(x, y_parent);
        if y_parent == NO_ENTRY {
            self.set_root(y, x);
        } else if y == self.left(y_parent) {
            self.set_left(y_parent, x);
        } else {
            self.set_right(y_parent, x);
        }

        // put y on x's right
        self.set_right(x, y);
        self.set_parent(y, x);
    }

    fn insert_fixup(&mut self, mut x: DirectoryId) {
        self.set_color(x, EntryColor::Red);

        while x != self.root(x) && self.color(self.parent(x)) == EntryColor::Red {
            let parent = self.parent(x);
            let grandparent = self.parent(parent);

            if parent == self.left(grandparent) {
                let uncle = self.right(grandparent);

                if uncle >= 0 && self.color(uncle) == EntryColor::Red {
                    self.set_color(parent, EntryColor::Black);
                    self.set_color(uncle, EntryColor::Black);
                    self.set_color(grandparent, EntryColor::Red);
                    x = grandparent;
                } else {
                    if x == self.right(parent) {
                        x = parent;
                        self.rotate_left(x);
                    }
                    let parent = self.parent(x);
                    let grandparent = self.parent(parent);
                    self.set_color(parent, EntryColor::Black);
                    self.set_color(grandparent, EntryColor::Red);
                    self.rotate_right(grandparent);
                }
            } else {
                // mirror image of the branch above
                let uncle = self.left(grandparent);

                if uncle >= 0 && self.color(uncle) == EntryColor::Red {
                    self.set_color(parent, EntryColor::Black);
                    self.set_color(uncle, EntryColor::Black);
                    self.set_color(grandparent, EntryColor::Red);
                    x = grandparent;
                } else {
                    if x == self.left(parent) {
                        x = parent;
                        self.rotate_right(x);
                    }
                    let parent = self.parent(x);
                    let grandparent = self.parent(parent);
                    self.set_color(parent, EntryColor::Black);
                    self.set_color(grandparent, EntryColor::Red);
                    self.rotate_left(grandparent);
                }
            }
        }

        let root = self.root(x);
        self.set_color(root, EntryColor::Black);
    }
}
