//! Language-neutral syntax trees consumed by the structural matcher
//!
//! Source files are parsed by a language adapter (see [`csharp`]) and converted
//! into an owned, arena-backed [`SyntaxTree`]. The arena is laid out in
//! pre-order, so every subtree occupies a contiguous range of node ids and a
//! full walk is a linear scan.
//!
//! The adapter annotates each node with a small set of language-neutral
//! [`NodeTraits`] and, for the handful of shapes the composite recognizers
//! need, explicit accessors:
//!
//! - [`CallShape`]: invocations and object constructions
//! - [`DeclarationShape`]: variables, fields, parameters, properties,
//!   method return types, casts and constructions
//! - member names for member accesses and member declarations
//!
//! The matcher never looks at grammar-specific kind strings directly.

pub mod csharp;

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::models::Span;

/// Index of a node inside a [`SyntaxTree`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(pub(crate) usize);

impl NodeId {
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Language-neutral classification of a node
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NodeTraits {
    /// Expression node (identifiers in expression position included)
    pub expression: bool,
    /// Matchable statement (blocks, top-level wrappers and local functions excluded)
    pub statement: bool,
    /// Identifier-like node (simple and generic names)
    pub identifier: bool,
    /// Member access or member declaration
    pub member: bool,
    /// Type syntax
    pub type_syntax: bool,
    /// Parenthesized argument list of a call
    pub argument_list: bool,
    /// A single call argument
    pub argument: bool,
    /// Statement block
    pub block: bool,
    /// Comments, preprocessor lines and other trivia
    pub trivia: bool,
}

/// How a call-like node was written
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallKind {
    Invocation,
    Construction,
}

/// Call or construction: `Foo.Bar(a, b)` / `new Foo(a)`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallShape {
    pub kind: CallKind,
    /// Callee expression for invocations, created type for constructions
    pub target: NodeId,
    /// The argument list node, when the call has one
    pub arguments: Option<NodeId>,
    pub argument_count: usize,
}

/// Syntactic context a declared type appears in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeclarationContext {
    Variable,
    Field,
    Parameter,
    Property,
    Method,
    Cast,
    Construction,
}

/// A node that declares (or converts to) a type
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeclarationShape {
    pub context: DeclarationContext,
    /// The type as written, e.g. `int[]?`
    pub declared_type: NodeId,
    /// The type with array/nullable/pointer wrappers removed, e.g. `int`
    pub element_type: NodeId,
    /// Declared names, in source order (several for `int a, b;`)
    pub names: Vec<NodeId>,
    /// Operand of a cast
    pub subject: Option<NodeId>,
}

/// Per-node payload stored in the arena
#[derive(Debug, Clone)]
pub(crate) struct NodeData {
    pub(crate) kind: &'static str,
    pub(crate) named: bool,
    pub(crate) field: Option<&'static str>,
    pub(crate) span: Span,
    pub(crate) parent: Option<NodeId>,
    pub(crate) children: Vec<NodeId>,
    /// Exclusive upper bound of this node's subtree ids
    pub(crate) subtree_end: usize,
    pub(crate) traits: NodeTraits,
    pub(crate) call: Option<CallShape>,
    pub(crate) declaration: Option<DeclarationShape>,
    pub(crate) member_name: Option<NodeId>,
}

impl NodeData {
    pub(crate) fn new(
        kind: &'static str,
        named: bool,
        field: Option<&'static str>,
        span: Span,
        parent: Option<NodeId>,
    ) -> Self {
        Self {
            kind,
            named,
            field,
            span,
            parent,
            children: Vec::new(),
            subtree_end: 0,
            traits: NodeTraits::default(),
            call: None,
            declaration: None,
            member_name: None,
        }
    }
}

/// An owned syntax tree for one source text
#[derive(Debug, Clone)]
pub struct SyntaxTree {
    language: &'static str,
    source: Arc<str>,
    nodes: Vec<NodeData>,
    has_errors: bool,
    first_error: Option<Span>,
    /// Declared name -> (declaration node, name node), in source order
    declarations: HashMap<String, Vec<(NodeId, NodeId)>>,
}

impl SyntaxTree {
    pub(crate) fn from_parts(
        language: &'static str,
        source: Arc<str>,
        nodes: Vec<NodeData>,
        first_error: Option<Span>,
    ) -> Self {
        Self {
            language,
            source,
            nodes,
            has_errors: first_error.is_some(),
            first_error,
            declarations: HashMap::new(),
        }
    }

    /// Index declared names once declaration shapes are annotated
    pub(crate) fn index_declarations(&mut self) {
        let mut declarations: HashMap<String, Vec<(NodeId, NodeId)>> = HashMap::new();
        for (i, data) in self.nodes.iter().enumerate() {
            let Some(shape) = &data.declaration else {
                continue;
            };
            for name in &shape.names {
                let span = self.nodes[name.0].span;
                let text = self.source.get(span.start..span.end).unwrap_or_default();
                declarations
                    .entry(text.to_string())
                    .or_default()
                    .push((NodeId(i), *name));
            }
        }
        self.declarations = declarations;
    }

    /// Declarations introducing `name`, as (declaration, name node) pairs
    pub fn declarations_of(&self, name: &str) -> impl Iterator<Item = (SyntaxNode<'_>, SyntaxNode<'_>)> + '_ {
        self.declarations
            .get(name)
            .into_iter()
            .flatten()
            .map(move |(declaration, name)| {
                (
                    SyntaxNode { tree: self, id: *declaration },
                    SyntaxNode { tree: self, id: *name },
                )
            })
    }

    /// Name of the language adapter that produced this tree
    pub fn language(&self) -> &'static str {
        self.language
    }

    /// The full source text
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Whether the parser had to recover from syntax errors
    pub fn has_errors(&self) -> bool {
        self.has_errors
    }

    /// Location of the first syntax error, if any
    pub fn first_error(&self) -> Option<Span> {
        self.first_error
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// The root node (always id 0)
    pub fn root(&self) -> SyntaxNode<'_> {
        SyntaxNode { tree: self, id: NodeId(0) }
    }

    /// Look up a node by id
    pub fn get(&self, id: NodeId) -> Option<SyntaxNode<'_>> {
        (id.0 < self.nodes.len()).then_some(SyntaxNode { tree: self, id })
    }

    /// All matchable nodes of the subtree rooted at `id`, pre-order, root included
    ///
    /// Anonymous tokens and trivia are skipped: they are kept in the arena only
    /// for token-boundary arithmetic.
    pub fn descendants(&self, id: NodeId) -> impl Iterator<Item = SyntaxNode<'_>> + '_ {
        let end = self.nodes.get(id.0).map_or(id.0, |n| n.subtree_end);
        (id.0..end)
            .map(move |i| SyntaxNode { tree: self, id: NodeId(i) })
            .filter(|node| node.is_matchable())
    }

    fn data(&self, id: NodeId) -> &NodeData {
        &self.nodes[id.0]
    }
}

/// A cheap, copyable handle to a node in a [`SyntaxTree`]
#[derive(Clone, Copy)]
pub struct SyntaxNode<'t> {
    tree: &'t SyntaxTree,
    id: NodeId,
}

impl fmt::Debug for SyntaxNode<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{} {:?}", self.kind(), self.id, self.span())
    }
}

impl<'t> SyntaxNode<'t> {
    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn tree(&self) -> &'t SyntaxTree {
        self.tree
    }

    /// Grammar kind, e.g. `invocation_expression`
    pub fn kind(&self) -> &'static str {
        self.data().kind
    }

    pub fn is_named(&self) -> bool {
        self.data().named
    }

    /// Field name this node occupies in its parent, if any
    pub fn field_name(&self) -> Option<&'static str> {
        self.data().field
    }

    pub fn span(&self) -> Span {
        self.data().span
    }

    /// Rendered source text of the node
    pub fn text(&self) -> &'t str {
        let span = self.data().span;
        self.tree.source.get(span.start..span.end).unwrap_or_default()
    }

    pub fn traits(&self) -> NodeTraits {
        self.data().traits
    }

    pub fn parent(&self) -> Option<SyntaxNode<'t>> {
        self.data().parent.map(|id| self.with(id))
    }

    /// Ancestors from the parent up to the root
    pub fn ancestors(&self) -> impl Iterator<Item = SyntaxNode<'t>> + 't {
        let tree = self.tree;
        std::iter::successors(self.parent(), move |node| {
            node.data().parent.map(|id| SyntaxNode { tree, id })
        })
    }

    /// All children, anonymous tokens included
    pub fn children(&self) -> impl Iterator<Item = SyntaxNode<'t>> + 't {
        let tree = self.tree;
        self.tree.data(self.id).children.iter().map(move |id| SyntaxNode { tree, id: *id })
    }

    /// Named, non-trivia children
    pub fn named_children(&self) -> impl Iterator<Item = SyntaxNode<'t>> + 't {
        self.children().filter(|child| child.is_matchable())
    }

    pub fn child_by_field(&self, field: &str) -> Option<SyntaxNode<'t>> {
        self.children().find(|child| child.field_name() == Some(field))
    }

    pub fn first_child_of_kind(&self, kind: &str) -> Option<SyntaxNode<'t>> {
        self.children().find(|child| child.kind() == kind)
    }

    /// All nodes of this subtree (tokens and trivia included), pre-order
    pub fn subtree(&self) -> impl Iterator<Item = SyntaxNode<'t>> + 't {
        let tree = self.tree;
        (self.id.0..self.data().subtree_end).map(move |i| SyntaxNode { tree, id: NodeId(i) })
    }

    /// Leaf tokens of this subtree, trivia excluded
    pub fn tokens(&self) -> impl Iterator<Item = SyntaxNode<'t>> + 't {
        self.subtree()
            .filter(|node| node.data().children.is_empty() && !node.traits().trivia)
    }

    /// Token texts joined by single spaces
    ///
    /// Two fragments with equal normalized text differ at most in whitespace
    /// and comments.
    pub fn normalized_text(&self) -> String {
        let tokens: Vec<&str> = self.tokens().map(|t| t.text()).filter(|t| !t.is_empty()).collect();
        tokens.join(" ")
    }

    pub fn call_shape(&self) -> Option<&'t CallShape> {
        self.tree.data(self.id).call.as_ref()
    }

    pub fn declaration_shape(&self) -> Option<&'t DeclarationShape> {
        self.tree.data(self.id).declaration.as_ref()
    }

    /// Name node of a member access or member declaration
    pub fn member_name(&self) -> Option<SyntaxNode<'t>> {
        self.data().member_name.map(|id| self.with(id))
    }

    /// Resolve another id from the same tree
    pub fn with(&self, id: NodeId) -> SyntaxNode<'t> {
        SyntaxNode { tree: self.tree, id }
    }

    /// True if `other` lies inside this node's subtree (or is this node)
    pub fn contains(&self, other: SyntaxNode<'_>) -> bool {
        other.id.0 >= self.id.0 && other.id.0 < self.data().subtree_end
    }

    pub(crate) fn is_matchable(&self) -> bool {
        let data = self.data();
        data.named && !data.traits.trivia
    }

    fn data(&self) -> &'t NodeData {
        self.tree.data(self.id)
    }
}

/// A standalone code fragment parsed out of pattern text
#[derive(Debug, Clone)]
pub struct Fragment {
    pub tree: SyntaxTree,
    /// The statement or expression the fragment reduces to
    pub node: NodeId,
}

impl Fragment {
    pub fn node(&self) -> SyntaxNode<'_> {
        self.tree.root().with(self.node)
    }
}

/// Semantic type of an expression, as far as the provider can tell
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeDescriptor {
    /// Name as written or keyword alias, e.g. `string`, `List<int>`
    pub name: String,
    /// Fully-qualified name when known, e.g. `System.String`
    pub fully_qualified_name: String,
}

impl TypeDescriptor {
    pub fn new(name: impl Into<String>, fully_qualified_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fully_qualified_name: fully_qualified_name.into(),
        }
    }
}

/// Front end for one source language
///
/// Implementations parse source text into [`SyntaxTree`]s with traits and
/// shapes filled in. Type resolution is optional: returning `None` makes type
/// constraints pass permissively.
pub trait AstProvider: Send + Sync {
    /// Human-readable language name
    fn language_name(&self) -> &'static str;

    /// File extensions (without dot) handled by this provider
    fn file_extensions(&self) -> &'static [&'static str];

    /// Parse a complete source file
    ///
    /// Syntax errors do not fail the parse; they are reported through
    /// [`SyntaxTree::has_errors`].
    fn parse(&self, source: &str) -> Result<SyntaxTree>;

    /// Parse pattern text as a standalone statement or expression
    ///
    /// Returns `None` when the text is not a well-formed fragment.
    fn parse_fragment(&self, text: &str) -> Option<Fragment>;

    /// Resolve the semantic type of a node
    fn resolve_type(&self, _node: SyntaxNode<'_>) -> Option<TypeDescriptor> {
        None
    }

    /// Whether this provider handles the given path
    fn handles_path(&self, path: &std::path::Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| self.file_extensions().iter().any(|e| e.eq_ignore_ascii_case(ext)))
            .unwrap_or(false)
    }
}
