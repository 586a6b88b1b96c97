//! Token tree construction and incremental reconciliation.
//!
//! The flat token array from the parser is folded into a tree whose nodes
//! carry a generated render key. On each reparse the new tree is diffed
//! against the previous one in lockstep; a node whose type, tag, and leaf
//! content match at the same structural position keeps its previous key, so
//! a renderer keyed off the tree can leave unaffected output in place.

use serde::{Deserialize, Serialize};

use crate::token::{Nesting, Token};

/// Monotonic source of render keys. Keys are unique per tree instance and
/// never reused for a different node.
#[derive(Debug, Clone, Default)]
pub struct KeyMint {
    next: u64,
}

impl KeyMint {
    pub fn mint(&mut self) -> u64 {
        let key = self.next;
        self.next += 1;
        key
    }
}

/// A token wrapped with a stable render identity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TreeNode {
    /// Render key, reused across reparses when the node is judged unchanged.
    pub key: u64,
    /// The underlying token. For inline containers the parsed children live
    /// in `children` below, not on the token itself.
    pub token: Token,
    /// Ordered child nodes.
    pub children: Vec<TreeNode>,
}

impl TreeNode {
    fn new(key: u64, token: Token) -> Self {
        Self {
            key,
            token,
            children: Vec::new(),
        }
    }

    /// True when this node carries no structural children.
    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }
}

/// The reconciling token tree. Owns the key mint so identity survives
/// successive [`TokenTree::update`] calls.
#[derive(Debug, Default)]
pub struct TokenTree {
    roots: Vec<TreeNode>,
    mint: KeyMint,
}

impl TokenTree {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current root nodes.
    pub fn roots(&self) -> &[TreeNode] {
        &self.roots
    }

    pub fn is_empty(&self) -> bool {
        self.roots.is_empty()
    }

    /// Drops the tree and forgets all identities.
    pub fn clear(&mut self) {
        self.roots.clear();
        self.mint = KeyMint::default();
    }

    /// Rebuilds the tree from a fresh token array, reusing keys from the
    /// previous tree wherever nodes are positionally equivalent.
    pub fn update(&mut self, tokens: Vec<Token>) -> &[TreeNode] {
        let mut next = build_forest(tokens, &mut self.mint);
        reuse_keys(&self.roots, &mut next);
        self.roots = next;
        &self.roots
    }
}

/// Folds a flat token array into a forest. Open tokens push a frame, close
/// tokens pop it, and inline containers recurse into their children.
pub fn build_forest(tokens: Vec<Token>, mint: &mut KeyMint) -> Vec<TreeNode> {
    let mut stack: Vec<TreeNode> = Vec::new();
    let mut roots: Vec<TreeNode> = Vec::new();

    for mut token in tokens {
        match token.nesting {
            Nesting::Open => {
                stack.push(TreeNode::new(mint.mint(), token));
            }
            Nesting::Close => {
                // A close without an open means a malformed stream; degrade
                // by treating the closer as a self-contained leaf.
                match stack.pop() {
                    Some(node) => attach(&mut stack, &mut roots, node),
                    None => attach(&mut stack, &mut roots, TreeNode::new(mint.mint(), token)),
                }
            }
            Nesting::SelfContained => {
                let inline_children = token.children.take();
                let mut node = TreeNode::new(mint.mint(), token);
                if let Some(children) = inline_children {
                    node.children = build_forest(children, mint);
                }
                attach(&mut stack, &mut roots, node);
            }
        }
    }

    // Unclosed opens (possible on partial streamed input) are kept with
    // whatever children they collected so far.
    while let Some(node) = stack.pop() {
        attach(&mut stack, &mut roots, node);
    }
    roots
}

fn attach(stack: &mut Vec<TreeNode>, roots: &mut Vec<TreeNode>, node: TreeNode) {
    match stack.last_mut() {
        Some(parent) => parent.children.push(node),
        None => roots.push(node),
    }
}

/// Lockstep key reuse. Nodes are compared by structural position; a match
/// transfers the old key and recurses, a mismatch leaves the freshly minted
/// key on the new node and its whole subtree.
fn reuse_keys(previous: &[TreeNode], next: &mut [TreeNode]) {
    for (old, new) in previous.iter().zip(next.iter_mut()) {
        if same_node(&old.token, &new.token) {
            new.key = old.key;
            reuse_keys(&old.children, &mut new.children);
        }
    }
}

/// Two tokens are "the same node" when type and tag agree, and for
/// text-bearing leaves the content agrees as well.
fn same_node(old: &Token, new: &Token) -> bool {
    if old.token_type != new.token_type || old.tag != new.tag {
        return false;
    }
    if old.children.is_none() && new.children.is_none() {
        old.content == new.content
    } else {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser;
    use crate::token::TokenType;

    fn build(input: &str) -> TokenTree {
        let mut tree = TokenTree::new();
        tree.update(parser::parse(input));
        tree
    }

    fn collect_keys(nodes: &[TreeNode], out: &mut Vec<u64>) {
        for node in nodes {
            out.push(node.key);
            collect_keys(&node.children, out);
        }
    }

    #[test]
    fn test_build_paragraph_tree() {
        let tree = build("hello *world*");
        assert_eq!(tree.roots().len(), 1);
        let paragraph = &tree.roots()[0];
        assert_eq!(paragraph.token.token_type, TokenType::ParagraphOpen);
        let inline = &paragraph.children[0];
        assert_eq!(inline.token.token_type, TokenType::Inline);
        // Text leaf plus em subtree.
        assert_eq!(inline.children.len(), 2);
        assert_eq!(inline.children[1].token.token_type, TokenType::EmOpen);
    }

    #[test]
    fn test_keys_are_unique() {
        let tree = build("# a\n\npara\n\n- x\n- y");
        let mut keys = Vec::new();
        collect_keys(tree.roots(), &mut keys);
        let mut deduped = keys.clone();
        deduped.sort_unstable();
        deduped.dedup();
        assert_eq!(keys.len(), deduped.len());
    }

    #[test]
    fn test_unchanged_prefix_keeps_keys() {
        let mut tree = TokenTree::new();
        tree.update(parser::parse("# title\n\nfirst paragraph"));
        let mut before = Vec::new();
        collect_keys(tree.roots(), &mut before);

        tree.update(parser::parse("# title\n\nfirst paragraph\n\nsecond"));
        let mut after = Vec::new();
        collect_keys(tree.roots(), &mut after);

        // The streamed suffix appends; everything already rendered keeps
        // its identity.
        assert_eq!(&after[..before.len()], &before[..]);
        assert!(after.len() > before.len());
    }

    #[test]
    fn test_changed_leaf_mints_new_key() {
        let mut tree = TokenTree::new();
        tree.update(parser::parse("alpha"));
        let old_text_key = tree.roots()[0].children[0].children[0].key;

        tree.update(parser::parse("beta"));
        let new_text_key = tree.roots()[0].children[0].children[0].key;
        assert_ne!(old_text_key, new_text_key);
        // The enclosing paragraph is positionally identical and keeps its key.
        assert_eq!(tree.roots()[0].token.token_type, TokenType::ParagraphOpen);
    }

    #[test]
    fn test_growing_text_leaf_replaced_but_parent_stable() {
        let mut tree = TokenTree::new();
        tree.update(parser::parse("stream"));
        let paragraph_key = tree.roots()[0].key;

        tree.update(parser::parse("streaming now"));
        assert_eq!(tree.roots()[0].key, paragraph_key);
    }

    #[test]
    fn test_unclosed_fence_builds_node() {
        let tree = build("```js\nconsole.log(1)");
        assert_eq!(tree.roots().len(), 1);
        let fence = &tree.roots()[0];
        assert_eq!(fence.token.token_type, TokenType::Fence);
        assert_eq!(fence.token.info, "js");
        assert!(fence.token.content.contains("console.log(1)"));
    }

    #[test]
    fn test_clear_resets_identity() {
        let mut tree = build("para");
        let key = tree.roots()[0].key;
        tree.clear();
        assert!(tree.is_empty());
        tree.update(parser::parse("para"));
        // Keys restart after a reset.
        assert_eq!(tree.roots()[0].key, key);
    }
}
