//! Depth-first container expansion over an explicit worklist
//!
//! Providers describe how to expand one container; this module turns that
//! into a full traversal without native recursion, so folder depth is bounded
//! by memory rather than by the call stack.

use async_trait::async_trait;

use super::{FileId, IdPathPair, ResolvedFile, Result};

/// One child produced by expanding a container
#[derive(Debug)]
pub enum WalkItem<C> {
    Leaf(ResolvedFile),
    Container(C),
}

/// A remote folder together with the chain of folders above it
#[derive(Debug, Clone, PartialEq)]
pub struct Folder {
    pub id: FileId,
    pub name: String,
    /// Containers above this folder, root first, excluding the folder itself
    pub ancestors: Vec<IdPathPair>,
}

impl Folder {
    pub fn root<I: Into<FileId>, S: Into<String>>(id: I, name: S) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            ancestors: Vec::new(),
        }
    }

    /// Chain handed to every child of this folder
    pub fn child_chain(&self) -> Vec<IdPathPair> {
        let mut chain = self.ancestors.clone();
        chain.push(IdPathPair(self.id.clone(), self.name.clone()));
        chain
    }

    /// A nested folder one level below this one
    pub fn subfolder<I: Into<FileId>, S: Into<String>>(&self, id: I, name: S) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            ancestors: self.child_chain(),
        }
    }
}

/// Provider specific expansion of a single container
///
/// `expand` must return the complete child list (every page already
/// fetched) in provider response order.
#[async_trait]
pub trait ContainerExpander: Send + Sync {
    type Container: Send;

    async fn expand(&self, container: Self::Container) -> Result<Vec<WalkItem<Self::Container>>>;
}

/// Walk a container tree depth-first, preserving sibling order
///
/// Children are pushed in reverse so the stack pops them in response order,
/// which yields the same sequence a recursive walk would.
pub async fn walk<E>(expander: &E, root: E::Container) -> Result<Vec<ResolvedFile>>
where
    E: ContainerExpander + ?Sized,
{
    let mut files = Vec::new();
    let mut stack = vec![WalkItem::Container(root)];

    while let Some(item) = stack.pop() {
        match item {
            WalkItem::Leaf(file) => files.push(file),
            WalkItem::Container(container) => {
                let children = expander.expand(container).await?;
                stack.extend(children.into_iter().rev());
            }
        }
    }

    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::downloader::core::{FileSource, HarvestError};
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// In-memory tree: folder id -> children (name, is_folder)
    struct FakeTree {
        children: HashMap<&'static str, Vec<(&'static str, bool)>>,
        expanded: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl ContainerExpander for FakeTree {
        type Container = Folder;

        async fn expand(&self, folder: Folder) -> Result<Vec<WalkItem<Folder>>> {
            let key = folder.id.to_string();
            self.expanded.lock().unwrap().push(key.clone());
            let entries = self
                .children
                .get(key.as_str())
                .ok_or_else(|| HarvestError::Unresolvable {
                    url: key.clone(),
                    reason: "missing".to_string(),
                })?;

            Ok(entries
                .iter()
                .map(|(name, is_folder)| {
                    if *is_folder {
                        WalkItem::Container(folder.subfolder(*name, *name))
                    } else {
                        WalkItem::Leaf(
                            ResolvedFile::new(*name, *name, FileSource::get("https://example.com"))
                                .with_ancestors(folder.child_chain()),
                        )
                    }
                })
                .collect())
        }
    }

    #[tokio::test]
    async fn test_walk_matches_recursive_order() {
        let tree = FakeTree {
            children: HashMap::from([
                ("root", vec![("a", false), ("sub", true), ("b", false)]),
                ("sub", vec![("c", false), ("deeper", true)]),
                ("deeper", vec![("d", false)]),
            ]),
            expanded: Mutex::new(Vec::new()),
        };

        let files = walk(&tree, Folder::root("root", "Root")).await.unwrap();
        let names: Vec<&str> = files.iter().map(|f| f.filename.as_str()).collect();
        assert_eq!(names, vec!["a", "c", "d", "b"]);

        let depths: Vec<usize> = files.iter().map(|f| f.ancestor_chain.len()).collect();
        assert_eq!(depths, vec![1, 2, 3, 1]);

        let d_chain: Vec<&str> = files[2].ancestor_chain.iter().map(|p| p.name()).collect();
        assert_eq!(d_chain, vec!["Root", "sub", "deeper"]);

        assert_eq!(*tree.expanded.lock().unwrap(), vec!["root", "sub", "deeper"]);
    }

    #[tokio::test]
    async fn test_walk_aborts_on_first_error() {
        let tree = FakeTree {
            children: HashMap::from([("root", vec![("a", false), ("missing", true)])]),
            expanded: Mutex::new(Vec::new()),
        };

        let result = walk(&tree, Folder::root("root", "Root")).await;
        assert!(matches!(result, Err(HarvestError::Unresolvable { .. })));
    }

    #[test]
    fn test_subfolder_extends_chain() {
        let root = Folder::root("r", "Root");
        let sub = root.subfolder("s", "Sub");
        assert_eq!(sub.ancestors, vec![IdPathPair::new("r", "Root")]);
        assert_eq!(
            sub.child_chain(),
            vec![IdPathPair::new("r", "Root"), IdPathPair::new("s", "Sub")]
        );
    }
}
