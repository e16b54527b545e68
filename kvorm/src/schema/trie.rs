use std::collections::BTreeMap;

#[derive(Debug, Clone, Default)]
struct TrieNode {
    children: BTreeMap<String, usize>,
}

/// Prefix tree of index tuples. Nodes live in one arena, node 0 is the root.
#[derive(Debug, Clone)]
pub struct IndexTrie {
    nodes: Vec<TrieNode>,
}

impl Default for IndexTrie {
    fn default() -> Self {
        Self::new()
    }
}

impl IndexTrie {
    pub fn new() -> Self {
        Self { nodes: vec![TrieNode::default()] }
    }

    pub fn insert<S: AsRef<str>>(&mut self, path: &[S]) {
        let mut current = 0;
        for field in path {
            let field = field.as_ref();
            current = match self.nodes[current].children.get(field) {
                Some(&next) => next,
                None => {
                    let next = self.nodes.len();
                    self.nodes.push(TrieNode::default());
                    self.nodes[current].children.insert(field.to_string(), next);
                    next
                }
            };
        }
    }

    /// Longest prefix of `query` present in the tree, walked in query order.
    pub fn search<S: AsRef<str>>(&self, query: &[S]) -> Vec<String> {
        let mut current = 0;
        let mut matched = Vec::new();
        for field in query {
            let field = field.as_ref();
            match self.nodes[current].children.get(field) {
                Some(&next) => {
                    matched.push(field.to_string());
                    current = next;
                }
                None => break,
            }
        }
        matched
    }

    pub fn is_empty(&self) -> bool {
        self.nodes[0].children.is_empty()
    }
}

/// Every ordering of `keys`, generated by picking each remaining key as the next one.
pub fn permutations<'a>(keys: &[&'a str]) -> Vec<Vec<&'a str>> {
    if keys.len() <= 1 {
        return vec![keys.to_vec()];
    }
    let mut out = Vec::new();
    for (i, head) in keys.iter().enumerate() {
        let mut rest = keys.to_vec();
        rest.remove(i);
        for mut tail in permutations(&rest) {
            tail.insert(0, *head);
            out.push(tail);
        }
    }
    out
}

/// Picks the registered index covering the most query fields regardless of their order.
/// Ties keep the first permutation found.
pub fn resolve_index(trie: &IndexTrie, keys: &[&str]) -> Vec<String> {
    let mut best: Vec<String> = Vec::new();
    for perm in permutations(keys) {
        let found = trie.search(&perm);
        if found.len() > best.len() {
            best = found;
            if best.len() == keys.len() {
                break;
            }
        }
    }
    best
}

#[cfg(all(test, not(feature = "integration")))]
mod trie_tests {
    use super::*;

    fn trie(paths: &[&[&str]]) -> IndexTrie {
        let mut trie = IndexTrie::new();
        for &path in paths {
            trie.insert(path);
        }
        trie
    }

    #[test]
    fn search_stops_at_first_miss() {
        let trie = trie(&[&["a"], &["a", "b"]]);
        assert_eq!(trie.search(&["a", "b"]), vec!["a", "b"]);
        assert_eq!(trie.search(&["a", "c"]), vec!["a"]);
        assert!(trie.search(&["b", "a"]).is_empty());
        assert!(trie.search::<&str>(&[]).is_empty());
    }

    #[test]
    fn insert_is_idempotent() {
        let mut t = trie(&[&["a", "b"]]);
        t.insert(&["a", "b"]);
        assert_eq!(t.nodes.len(), 3);
        assert!(!t.is_empty());
        assert!(IndexTrie::new().is_empty());
    }

    #[test]
    fn permutations_cover_every_ordering() {
        assert_eq!(permutations(&[]), vec![Vec::<&str>::new()]);
        assert_eq!(permutations(&["a"]), vec![vec!["a"]]);
        let perms = permutations(&["a", "b", "c"]);
        assert_eq!(perms.len(), 6);
        assert_eq!(perms[0], vec!["a", "b", "c"]);
        assert_eq!(perms[1], vec!["a", "c", "b"]);
        assert_eq!(perms[5], vec!["c", "b", "a"]);
    }

    #[test]
    fn resolution_ignores_query_order() {
        let trie = trie(&[&["a"], &["a", "b"]]);
        assert_eq!(resolve_index(&trie, &["b", "a"]), vec!["a", "b"]);
        assert_eq!(resolve_index(&trie, &["a", "b"]), vec!["a", "b"]);
        assert_eq!(resolve_index(&trie, &["c", "a"]), vec!["a"]);
        assert!(resolve_index(&trie, &["c"]).is_empty());
    }

    #[test]
    fn ties_keep_first_permutation() {
        let trie = trie(&[&["x"], &["y"]]);
        assert_eq!(resolve_index(&trie, &["x", "y"]), vec!["x"]);
        assert_eq!(resolve_index(&trie, &["y", "x"]), vec!["y"]);
    }
}
