use std::collections::HashMap;

use vec1::Vec1;

/// Renames keyed by ancestor path, stored leaf first.
///
/// A path `[a, b, c] -> x` renames `c` to `x` when its parent is `b` and its
/// grandparent is `a`. An exact rename is the path `[c]`. When several
/// registered paths match, the longest one wins.
#[derive(Default, Debug)]
pub(crate) struct PathTrie {
    root: HashMap<String, TrieNode>,
}

#[derive(Default, Debug)]
struct TrieNode {
    target: Option<String>,
    ancestors: HashMap<String, TrieNode>,
}

impl PathTrie {
    /// Registers a path given from the outermost ancestor down to the leaf.
    pub fn insert(&mut self, path: Vec1<String>, target: String) {
        let (ancestors, leaf) = path.split_off_last();
        let mut node = self.root.entry(leaf).or_default();
        for ancestor in ancestors.into_iter().rev() {
            node = node.ancestors.entry(ancestor).or_default();
        }

        node.target = Some(target);
    }

    /// Looks up the rename for `leaf`, with `ancestors` yielded nearest first.
    pub fn lookup<'a>(
        &'a self,
        leaf: &str,
        ancestors: impl IntoIterator<Item = &'a str>,
    ) -> Option<&'a str> {
        let mut node = self.root.get(leaf)?;
        let mut best = node.target.as_deref();
        for ancestor in ancestors {
            match node.ancestors.get(ancestor) {
                Some(next) => {
                    node = next;
                    if let Some(target) = node.target.as_deref() {
                        best = Some(target);
                    }
                }
                None => break,
            }
        }

        best
    }

    pub fn is_empty(&self) -> bool {
        self.root.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vec1::vec1;

    fn trie() -> PathTrie {
        let mut trie = PathTrie::default();
        trie.insert(vec1!["http://t/name".to_string()], "http://t/label".into());
        trie.insert(
            vec1!["http://t/Person".to_string(), "http://t/name".to_string()],
            "http://t/personName".into(),
        );
        trie.insert(
            vec1![
                "http://t/Company".to_string(),
                "http://t/Person".to_string(),
                "http://t/name".to_string()
            ],
            "http://t/employeeName".into(),
        );
        trie
    }

    #[test]
    fn exact_rename_is_the_shortest_path() {
        assert_eq!(
            trie().lookup("http://t/name", ["http://t/Book"]),
            Some("http://t/label")
        );
        assert_eq!(trie().lookup("http://t/name", []), Some("http://t/label"));
    }

    #[test]
    fn longest_path_wins() {
        let trie = trie();
        assert_eq!(
            trie.lookup("http://t/name", ["http://t/Person", "http://t/Root"]),
            Some("http://t/personName")
        );
        assert_eq!(
            trie.lookup("http://t/name", ["http://t/Person", "http://t/Company"]),
            Some("http://t/employeeName")
        );
    }

    #[test]
    fn partial_path_without_target_falls_back() {
        let mut trie = PathTrie::default();
        trie.insert(
            vec!["http://t/a".to_string(), "http://t/b".to_string(), "http://t/c".to_string()]
                .try_into()
                .unwrap(),
            "http://t/x".into(),
        );

        // `b > c` is on the way to `a > b > c` but carries no rename itself.
        assert_eq!(trie.lookup("http://t/c", ["http://t/b"]), None);
        assert_eq!(
            trie.lookup("http://t/c", ["http://t/b", "http://t/a"]),
            Some("http://t/x")
        );
    }

    #[test]
    fn unknown_leaf() {
        assert_eq!(trie().lookup("http://t/other", ["http://t/Person"]), None);
    }
}
