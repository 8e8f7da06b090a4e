//! Flat listing → hierarchical tree.

use std::collections::HashMap;

use fathom_core::{FileNode, NodeKind, TreeEntry};

struct Slot {
    name: String,
    path: String,
    kind: NodeKind,
    children: Vec<usize>,
}

/// Build a forest of [`FileNode`]s from a flat recursive listing.
///
/// Every intermediate path segment gets a directory node, whether or not the
/// listing has an explicit entry for it. Siblings keep the order in which
/// they were first seen. A node that receives children is a directory even if
/// the listing called it a file; submodule pointers become files. Empty path
/// segments (leading, trailing or doubled `/`) are ignored.
///
/// Building from the same listing twice yields equal trees.
///
/// # Examples
///
/// ```
/// use fathom_core::{EntryKind, NodeKind, TreeEntry};
/// use fathom_repo::tree::build_tree;
///
/// let roots = build_tree(&[
///     TreeEntry::new("src/lib/util.js", EntryKind::Blob),
///     TreeEntry::new("README.md", EntryKind::Blob),
/// ]);
/// assert_eq!(roots.len(), 2);
/// assert_eq!(roots[0].kind, NodeKind::Directory);
/// assert_eq!(roots[0].children[0].path, "src/lib");
/// ```
pub fn build_tree(entries: &[TreeEntry]) -> Vec<FileNode> {
    let mut slots: Vec<Slot> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();
    let mut roots: Vec<usize> = Vec::new();

    for entry in entries {
        let segments: Vec<&str> = entry.path.split('/').filter(|s| !s.is_empty()).collect();
        let mut parent: Option<usize> = None;
        let mut path = String::new();

        for (i, segment) in segments.iter().enumerate() {
            if !path.is_empty() {
                path.push('/');
            }
            path.push_str(segment);
            let is_last = i + 1 == segments.len();

            let id = match index.get(&path) {
                Some(&id) => id,
                None => {
                    let id = slots.len();
                    slots.push(Slot {
                        name: (*segment).to_string(),
                        path: path.clone(),
                        kind: if is_last {
                            entry.kind.node_kind()
                        } else {
                            NodeKind::Directory
                        },
                        children: Vec::new(),
                    });
                    index.insert(path.clone(), id);
                    match parent {
                        Some(p) => slots[p].children.push(id),
                        None => roots.push(id),
                    }
                    id
                }
            };

            if !is_last {
                slots[id].kind = NodeKind::Directory;
            }
            parent = Some(id);
        }
    }

    materialize(slots, &roots)
}

/// Assemble nodes bottom-up. A child is always created after its parent, so
/// walking slots in reverse finishes every child before its parent needs it.
fn materialize(slots: Vec<Slot>, roots: &[usize]) -> Vec<FileNode> {
    let mut built: Vec<Option<FileNode>> = Vec::with_capacity(slots.len());
    built.resize_with(slots.len(), || None);

    for (id, slot) in slots.into_iter().enumerate().rev() {
        let children = slot
            .children
            .iter()
            .filter_map(|&child| built[child].take())
            .collect();
        built[id] = Some(FileNode {
            name: slot.name,
            path: slot.path,
            kind: slot.kind,
            children,
        });
    }

    roots.iter().filter_map(|&id| built[id].take()).collect()
}
