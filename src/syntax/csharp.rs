//! C# language adapter using Tree-sitter
//!
//! Converts tree-sitter-c-sharp trees into [`SyntaxTree`]s and annotates:
//! - expressions, statements, identifiers, members and type syntax
//! - invocations and object creations (callee, argument list, argument count)
//! - typed declarations: locals, fields, parameters, properties, method
//!   return types, casts and constructions
//!
//! Type resolution is purely syntactic. Literals, casts, constructions and
//! identifiers declared with an explicit type (or `var` plus a resolvable
//! initializer) resolve; everything else is left unresolved.

use std::sync::Arc;

use anyhow::Result;
use tree_sitter::{Parser, Tree};

use super::{
    AstProvider, CallKind, CallShape, DeclarationContext, DeclarationShape, Fragment, NodeData,
    NodeId, NodeTraits, SyntaxNode, SyntaxTree, TypeDescriptor,
};
use crate::error::SyntaxError;
use crate::models::Span;

pub const LANGUAGE_NAME: &str = "C#";

/// Statement kinds that are containers rather than matchable statements
const NON_MATCHABLE_STATEMENTS: &[&str] = &["global_statement", "local_function_statement"];

/// Kinds that are always type syntax
const TYPE_KINDS: &[&str] = &[
    "predefined_type",
    "array_type",
    "nullable_type",
    "pointer_type",
    "function_pointer_type",
    "tuple_type",
    "ref_type",
    "scoped_type",
    "implicit_type",
];

/// Name kinds; their role depends on position
const NAME_KINDS: &[&str] = &["identifier", "generic_name", "qualified_name", "alias_qualified_name"];

const MEMBER_KINDS: &[&str] = &[
    "member_access_expression",
    "member_binding_expression",
    "method_declaration",
    "property_declaration",
    "field_declaration",
    "event_declaration",
    "event_field_declaration",
    "constructor_declaration",
    "indexer_declaration",
];

/// Parents whose unnamed children are types
const TYPE_LIST_PARENTS: &[&str] = &["type_argument_list", "base_list", "type_parameter_constraint"];

const MAX_RESOLVE_DEPTH: usize = 4;

/// Tree-sitter backed C# provider
///
/// Stateless: a parser is created per call so one provider can be shared
/// across worker threads.
#[derive(Debug, Default, Clone, Copy)]
pub struct CSharpProvider;

impl CSharpProvider {
    pub fn new() -> Self {
        Self
    }

    fn parser() -> Result<Parser> {
        let mut parser = Parser::new();
        parser
            .set_language(&tree_sitter_c_sharp::LANGUAGE.into())
            .map_err(|e| SyntaxError::LanguageInit {
                language: LANGUAGE_NAME,
                message: e.to_string(),
            })?;
        Ok(parser)
    }
}

impl AstProvider for CSharpProvider {
    fn language_name(&self) -> &'static str {
        LANGUAGE_NAME
    }

    fn file_extensions(&self) -> &'static [&'static str] {
        &["cs"]
    }

    fn parse(&self, source: &str) -> Result<SyntaxTree> {
        let mut parser = Self::parser()?;
        let tree = parser
            .parse(source, None)
            .ok_or(SyntaxError::ParseFailed { language: LANGUAGE_NAME })?;
        Ok(convert(&tree, source))
    }

    fn parse_fragment(&self, text: &str) -> Option<Fragment> {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return None;
        }

        let mut candidates = vec![(trimmed.to_string(), false)];
        if !trimmed.ends_with(';') && !trimmed.ends_with('}') {
            candidates.push((format!("{};", trimmed), true));
        }

        for (candidate, appended) in candidates {
            let tree = match self.parse(&candidate) {
                Ok(tree) => tree,
                Err(e) => {
                    log::debug!("Fragment '{}' failed to parse: {}", candidate, e);
                    continue;
                }
            };
            if tree.has_errors() {
                continue;
            }
            if let Some(node) = fragment_root(&tree, appended) {
                return Some(Fragment { tree, node });
            }
        }

        log::debug!("Pattern text '{}' is not a standalone C# fragment", trimmed);
        None
    }

    fn resolve_type(&self, node: SyntaxNode<'_>) -> Option<TypeDescriptor> {
        resolve_node_type(node, 0)
    }
}

/// Reduce a fragment tree to its single statement or expression
fn fragment_root(tree: &SyntaxTree, appended_semicolon: bool) -> Option<NodeId> {
    let top: Vec<SyntaxNode<'_>> = tree.root().named_children().collect();
    let [single] = top.as_slice() else {
        return None;
    };

    let mut node = *single;
    if node.kind() == "global_statement" {
        node = node.named_children().next()?;
    }
    if appended_semicolon && node.kind() == "expression_statement" {
        node = node.named_children().next()?;
    }

    let traits = node.traits();
    (traits.statement || traits.expression || traits.block).then_some(node.id())
}

/// Convert a tree-sitter tree into an annotated arena
fn convert(tree: &Tree, source: &str) -> SyntaxTree {
    let mut nodes: Vec<NodeData> = Vec::new();
    let mut open: Vec<NodeId> = Vec::new();
    let mut first_error: Option<Span> = None;
    let mut cursor = tree.walk();

    'walk: loop {
        let node = cursor.node();
        let id = NodeId(nodes.len());
        let span = Span::new(
            node.start_byte(),
            node.end_byte(),
            node.start_position().row + 1,
            node.start_position().column,
            node.end_position().row + 1,
            node.end_position().column,
        );

        if first_error.is_none() && (node.is_error() || node.is_missing()) {
            first_error = Some(span);
        }

        let parent = open.last().copied();
        let mut data = NodeData::new(node.kind(), node.is_named(), cursor.field_name(), span, parent);
        data.traits.trivia = node.is_extra() || is_trivia_kind(node.kind());
        nodes.push(data);
        if let Some(parent) = parent {
            nodes[parent.0].children.push(id);
        }

        if cursor.goto_first_child() {
            open.push(id);
            continue;
        }

        nodes[id.0].subtree_end = nodes.len();
        loop {
            if cursor.goto_next_sibling() {
                continue 'walk;
            }
            if !cursor.goto_parent() {
                break 'walk;
            }
            if let Some(closed) = open.pop() {
                nodes[closed.0].subtree_end = nodes.len();
            }
        }
    }

    let root = tree.root_node();
    if first_error.is_none() && root.has_error() {
        first_error = nodes.first().map(|n| n.span);
    }

    let mut syntax = SyntaxTree::from_parts(LANGUAGE_NAME, Arc::from(source), nodes, first_error);

    let annotations: Vec<Annotation> = (0..syntax.len())
        .map(|i| annotate(syntax.root().with(NodeId(i))))
        .collect();
    for (data, annotation) in syntax.nodes.iter_mut().zip(annotations) {
        data.traits = NodeTraits {
            trivia: data.traits.trivia,
            ..annotation.traits
        };
        data.call = annotation.call;
        data.declaration = annotation.declaration;
        data.member_name = annotation.member_name;
    }
    syntax.index_declarations();

    syntax
}

fn is_trivia_kind(kind: &str) -> bool {
    kind == "comment" || kind.starts_with("preproc")
}

#[derive(Default)]
struct Annotation {
    traits: NodeTraits,
    call: Option<CallShape>,
    declaration: Option<DeclarationShape>,
    member_name: Option<NodeId>,
}

fn annotate(node: SyntaxNode<'_>) -> Annotation {
    if !node.is_matchable() {
        return Annotation::default();
    }

    let kind = node.kind();
    let is_name = NAME_KINDS.contains(&kind);
    let type_position = in_type_position(node);

    let traits = NodeTraits {
        expression: if is_name {
            !type_position && !is_declared_name(node)
        } else {
            is_expression_kind(kind)
        },
        statement: kind.ends_with("_statement") && !NON_MATCHABLE_STATEMENTS.contains(&kind),
        identifier: kind == "identifier" || kind == "generic_name",
        member: MEMBER_KINDS.contains(&kind),
        type_syntax: TYPE_KINDS.contains(&kind) || (is_name && type_position),
        argument_list: kind == "argument_list",
        argument: kind == "argument",
        block: kind == "block",
        trivia: false,
    };

    Annotation {
        traits,
        call: call_shape(node),
        declaration: declaration_shape(node),
        member_name: member_name(node),
    }
}

fn is_expression_kind(kind: &str) -> bool {
    (kind.ends_with("_expression") || kind.ends_with("_literal") || kind == "this" || kind == "base")
        && kind != "initializer_expression"
}

fn in_type_position(node: SyntaxNode<'_>) -> bool {
    if matches!(node.field_name(), Some("type") | Some("returns")) {
        return true;
    }
    node.parent()
        .is_some_and(|parent| TYPE_LIST_PARENTS.contains(&parent.kind()))
}

/// Identifiers that name a declaration rather than reference a value
fn is_declared_name(node: SyntaxNode<'_>) -> bool {
    if node.field_name() != Some("name") {
        return false;
    }
    node.parent().is_none_or(|parent| {
        !matches!(parent.kind(), "member_access_expression" | "member_binding_expression")
    })
}

fn call_shape(node: SyntaxNode<'_>) -> Option<CallShape> {
    let (kind, target) = match node.kind() {
        "invocation_expression" => (
            CallKind::Invocation,
            node.child_by_field("function")
                .or_else(|| node.named_children().find(|c| c.kind() != "argument_list"))?,
        ),
        "object_creation_expression" => (
            CallKind::Construction,
            node.child_by_field("type").or_else(|| {
                node.named_children()
                    .find(|c| !matches!(c.kind(), "argument_list" | "initializer_expression"))
            })?,
        ),
        _ => return None,
    };

    let arguments = node
        .child_by_field("arguments")
        .or_else(|| node.first_child_of_kind("argument_list"));
    let argument_count = arguments.map_or(0, |args| {
        args.named_children().filter(|c| c.kind() == "argument").count()
    });

    Some(CallShape {
        kind,
        target: target.id(),
        arguments: arguments.map(|a| a.id()),
        argument_count,
    })
}

fn declaration_shape(node: SyntaxNode<'_>) -> Option<DeclarationShape> {
    let shape = |context, declared: SyntaxNode<'_>, names: Vec<NodeId>, subject: Option<NodeId>| {
        DeclarationShape {
            context,
            declared_type: declared.id(),
            element_type: element_type(declared),
            names,
            subject,
        }
    };

    match node.kind() {
        "variable_declaration" => {
            let declared = node.child_by_field("type").or_else(|| {
                node.named_children().find(|c| c.kind() != "variable_declarator")
            })?;
            let names = node
                .named_children()
                .filter(|c| c.kind() == "variable_declarator")
                .filter_map(|d| d.child_by_field("name").or_else(|| d.first_child_of_kind("identifier")))
                .map(|n| n.id())
                .collect();
            let context = match node.parent().map(|p| p.kind()) {
                Some("field_declaration") | Some("event_field_declaration") => DeclarationContext::Field,
                _ => DeclarationContext::Variable,
            };
            Some(shape(context, declared, names, None))
        }
        "parameter" => {
            let declared = node.child_by_field("type")?;
            let name = node.child_by_field("name")?;
            Some(shape(DeclarationContext::Parameter, declared, vec![name.id()], None))
        }
        "property_declaration" => {
            let declared = node.child_by_field("type")?;
            let name = node.child_by_field("name")?;
            Some(shape(DeclarationContext::Property, declared, vec![name.id()], None))
        }
        "method_declaration" | "local_function_statement" => {
            let name = node.child_by_field("name")?;
            let declared = node
                .child_by_field("returns")
                .or_else(|| node.child_by_field("type"))
                .or_else(|| {
                    node.named_children()
                        .take_while(|c| c.id() != name.id())
                        .filter(|c| !matches!(c.kind(), "modifier" | "attribute_list"))
                        .last()
                })?;
            Some(shape(DeclarationContext::Method, declared, vec![name.id()], None))
        }
        "cast_expression" => {
            let mut named = node.named_children();
            let declared = node.child_by_field("type").or_else(|| named.next())?;
            let value = node.child_by_field("value").or_else(|| node.named_children().nth(1));
            Some(shape(DeclarationContext::Cast, declared, Vec::new(), value.map(|v| v.id())))
        }
        "object_creation_expression" => {
            let declared = node.child_by_field("type")?;
            Some(shape(DeclarationContext::Construction, declared, Vec::new(), None))
        }
        _ => None,
    }
}

/// Strip array, nullable and pointer wrappers
fn element_type(declared: SyntaxNode<'_>) -> NodeId {
    let mut current = declared;
    while matches!(current.kind(), "array_type" | "nullable_type" | "pointer_type") {
        match current
            .child_by_field("type")
            .or_else(|| current.named_children().next())
        {
            Some(inner) => current = inner,
            None => break,
        }
    }
    current.id()
}

fn member_name(node: SyntaxNode<'_>) -> Option<NodeId> {
    match node.kind() {
        "member_access_expression" | "member_binding_expression" => node
            .child_by_field("name")
            .or_else(|| node.named_children().last())
            .map(|n| n.id()),
        "method_declaration" | "property_declaration" | "constructor_declaration" | "event_declaration" => {
            node.child_by_field("name").map(|n| n.id())
        }
        "field_declaration" | "event_field_declaration" => node
            .first_child_of_kind("variable_declaration")
            .and_then(|decl| decl.first_child_of_kind("variable_declarator"))
            .and_then(|d| d.child_by_field("name").or_else(|| d.first_child_of_kind("identifier")))
            .map(|n| n.id()),
        _ => None,
    }
}

fn resolve_node_type(node: SyntaxNode<'_>, depth: usize) -> Option<TypeDescriptor> {
    if depth > MAX_RESOLVE_DEPTH {
        return None;
    }

    if node.traits().type_syntax {
        return descriptor_for_type_text(node.text());
    }

    match node.kind() {
        "argument" | "parenthesized_expression" | "equals_value_clause" => {
            resolve_node_type(node.named_children().last()?, depth + 1)
        }
        "integer_literal" => Some(keyword_descriptor(integer_literal_keyword(node.text()))),
        "real_literal" => Some(keyword_descriptor(real_literal_keyword(node.text()))),
        "string_literal"
        | "verbatim_string_literal"
        | "raw_string_literal"
        | "interpolated_string_expression" => Some(keyword_descriptor("string")),
        "character_literal" => Some(keyword_descriptor("char")),
        "boolean_literal" => Some(keyword_descriptor("bool")),
        "object_creation_expression" | "cast_expression" => {
            let shape = node.declaration_shape()?;
            descriptor_for_type_text(node.with(shape.declared_type).text())
        }
        "identifier" if node.traits().expression => resolve_identifier(node, depth),
        _ => None,
    }
}

/// Find the closest declaration of an identifier and resolve its type
fn resolve_identifier(usage: SyntaxNode<'_>, depth: usize) -> Option<TypeDescriptor> {
    let tree = usage.tree();
    let name = usage.text();
    let usage_start = usage.span().start;

    let mut best: Option<((u8, usize), SyntaxNode<'_>, SyntaxNode<'_>)> = None;
    for (candidate, name_node) in tree.declarations_of(name) {
        let Some(shape) = candidate.declaration_shape() else {
            continue;
        };
        let priority = match shape.context {
            DeclarationContext::Variable | DeclarationContext::Parameter => 1,
            DeclarationContext::Field | DeclarationContext::Property => 0,
            _ => continue,
        };
        if shape.context == DeclarationContext::Variable && name_node.span().start > usage_start {
            continue;
        }
        if !declaration_scope(candidate, shape.context).is_some_and(|scope| scope.contains(usage)) {
            continue;
        }

        let key = (priority, name_node.span().start);
        if best.as_ref().is_none_or(|(best_key, _, _)| key > *best_key) {
            best = Some((key, candidate, name_node));
        }
    }

    let (_, declaration, name_node) = best?;
    let shape = declaration.declaration_shape()?;
    let declared = declaration.with(shape.declared_type);

    if declared.kind() == "implicit_type" || declared.text() == "var" {
        let declarator = name_node.parent()?;
        let initializer = declarator
            .named_children()
            .filter(|c| c.id() != name_node.id())
            .last()?;
        return resolve_node_type(initializer, depth + 1);
    }

    descriptor_for_type_text(declared.text())
}

/// Region of the tree in which a declaration is visible
fn declaration_scope<'t>(declaration: SyntaxNode<'t>, context: DeclarationContext) -> Option<SyntaxNode<'t>> {
    let mut ancestors = declaration.ancestors();
    match context {
        DeclarationContext::Variable => ancestors.find(|a| {
            matches!(
                a.kind(),
                "block" | "for_statement" | "using_statement" | "fixed_statement" | "switch_section" | "compilation_unit"
            )
        }),
        DeclarationContext::Parameter => ancestors.find(|a| a.kind() != "parameter_list"),
        _ => ancestors.find(|a| a.kind() == "declaration_list" || a.kind() == "compilation_unit"),
    }
}

fn integer_literal_keyword(text: &str) -> &'static str {
    let lower = text.to_ascii_lowercase();
    if lower.starts_with("0x") || lower.starts_with("0b") {
        // Hex digits can look like suffixes; only explicit u/l letters count
        let suffix: String = lower.chars().rev().take_while(|c| *c == 'u' || *c == 'l').collect();
        return integer_suffix_keyword(&suffix);
    }
    let suffix: String = lower
        .chars()
        .rev()
        .take_while(|c| c.is_ascii_alphabetic())
        .collect();
    integer_suffix_keyword(&suffix)
}

fn integer_suffix_keyword(reversed_suffix: &str) -> &'static str {
    let has_u = reversed_suffix.contains('u');
    let has_l = reversed_suffix.contains('l');
    match (has_u, has_l) {
        (true, true) => "ulong",
        (false, true) => "long",
        (true, false) => "uint",
        (false, false) => "int",
    }
}

fn real_literal_keyword(text: &str) -> &'static str {
    match text.chars().last().map(|c| c.to_ascii_lowercase()) {
        Some('f') => "float",
        Some('m') => "decimal",
        _ => "double",
    }
}

/// Fully-qualified name for a C# keyword type
fn keyword_fqn(keyword: &str) -> Option<&'static str> {
    Some(match keyword {
        "bool" => "System.Boolean",
        "byte" => "System.Byte",
        "sbyte" => "System.SByte",
        "char" => "System.Char",
        "decimal" => "System.Decimal",
        "double" => "System.Double",
        "float" => "System.Single",
        "int" => "System.Int32",
        "uint" => "System.UInt32",
        "long" => "System.Int64",
        "ulong" => "System.UInt64",
        "short" => "System.Int16",
        "ushort" => "System.UInt16",
        "object" => "System.Object",
        "string" => "System.String",
        "void" => "System.Void",
        "nint" => "System.IntPtr",
        "nuint" => "System.UIntPtr",
        _ => return None,
    })
}

fn keyword_descriptor(keyword: &'static str) -> TypeDescriptor {
    TypeDescriptor::new(keyword, keyword_fqn(keyword).unwrap_or(keyword))
}

fn descriptor_for_type_text(text: &str) -> Option<TypeDescriptor> {
    let written: String = text.split_whitespace().collect();
    let written = written.trim_start_matches("global::").trim_end_matches('?');
    if written.is_empty() || written == "var" {
        return None;
    }

    if let Some(fqn) = keyword_fqn(written) {
        return Some(TypeDescriptor::new(written, fqn));
    }

    let without_generics = written.split('<').next().unwrap_or(written);
    Some(TypeDescriptor::new(written, without_generics))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(source: &str) -> SyntaxTree {
        CSharpProvider::new().parse(source).unwrap()
    }

    fn find<'t>(tree: &'t SyntaxTree, kind: &str, text: &str) -> SyntaxNode<'t> {
        tree.descendants(tree.root().id())
            .find(|n| n.kind() == kind && n.text() == text)
            .unwrap_or_else(|| panic!("no {} node with text {:?}", kind, text))
    }

    const PROGRAM: &str = r#"
using System;

class Program
{
    private int count;
    public string Name { get; set; }

    static void Main(string[] args, int limit)
    {
        // greet
        Console.WriteLine("hello", 1);
        var widget = new Widget(42);
        double[] scores = null;
        var total = (long)limit;
        count++;
    }
}
"#;

    #[test]
    fn test_parse_clean_source() {
        let tree = parse(PROGRAM);
        assert!(!tree.has_errors());
        assert_eq!(tree.root().kind(), "compilation_unit");
        assert_eq!(tree.source(), PROGRAM);
    }

    #[test]
    fn test_grammar_abi_is_supported() {
        let language: tree_sitter::Language = tree_sitter_c_sharp::LANGUAGE.into();
        let supported = tree_sitter::MIN_COMPATIBLE_LANGUAGE_VERSION..=tree_sitter::LANGUAGE_VERSION;
        assert!(supported.contains(&language.version()));
    }

    #[test]
    fn test_declaration_index_lists_every_declarator() {
        let tree = parse("class C { int a, b; void M(int a) { var b = 1; } }");

        let a: Vec<DeclarationContext> = tree
            .declarations_of("a")
            .filter_map(|(d, _)| d.declaration_shape().map(|shape| shape.context))
            .collect();
        assert_eq!(a, vec![DeclarationContext::Field, DeclarationContext::Parameter]);
        let b: Vec<usize> = tree.declarations_of("b").map(|(_, n)| n.span().start).collect();
        assert_eq!(b.len(), 2);
        assert!(b[0] < b[1]);
        assert_eq!(tree.declarations_of("missing").count(), 0);
    }

    #[test]
    fn test_resolution_prefers_nearest_declaration() {
        let tree = parse("class C { string a; void M(int a) { Use(a); } }");
        let usage = tree
            .descendants(tree.root().id())
            .filter(|n| n.kind() == "identifier" && n.text() == "a")
            .last()
            .unwrap();
        let resolved = CSharpProvider::new().resolve_type(usage).unwrap();
        assert_eq!(resolved.name, "int");
    }

    #[test]
    fn test_syntax_errors_are_flagged() {
        let tree = parse("class Broken { void M( { }");
        assert!(tree.has_errors());
        assert!(tree.first_error().is_some());
    }

    #[test]
    fn test_invocation_shape() {
        let tree = parse(PROGRAM);
        let call = find(&tree, "invocation_expression", r#"Console.WriteLine("hello", 1)"#);
        let shape = call.call_shape().unwrap();
        assert_eq!(shape.kind, CallKind::Invocation);
        assert_eq!(call.with(shape.target).text(), "Console.WriteLine");
        assert_eq!(shape.argument_count, 2);
        assert!(call.traits().expression);

        let target = call.with(shape.target);
        assert!(target.traits().member);
        assert_eq!(target.member_name().unwrap().text(), "WriteLine");
    }

    #[test]
    fn test_object_creation_shape() {
        let tree = parse(PROGRAM);
        let creation = find(&tree, "object_creation_expression", "new Widget(42)");
        let call = creation.call_shape().unwrap();
        assert_eq!(call.kind, CallKind::Construction);
        assert_eq!(creation.with(call.target).text(), "Widget");
        assert_eq!(call.argument_count, 1);

        let decl = creation.declaration_shape().unwrap();
        assert_eq!(decl.context, DeclarationContext::Construction);
        assert!(decl.names.is_empty());
    }

    #[test]
    fn test_declaration_shapes() {
        let tree = parse(PROGRAM);
        let declarations: Vec<(DeclarationContext, String, Vec<String>)> = tree
            .descendants(tree.root().id())
            .filter_map(|n| {
                let shape = n.declaration_shape()?;
                Some((
                    shape.context,
                    n.with(shape.element_type).text().to_string(),
                    shape.names.iter().map(|id| n.with(*id).text().to_string()).collect(),
                ))
            })
            .collect();

        let has = |context, ty: &str, name: &str| {
            declarations
                .iter()
                .any(|(c, t, names)| *c == context && t == ty && names.iter().any(|n| n == name))
        };

        assert!(has(DeclarationContext::Field, "int", "count"));
        assert!(has(DeclarationContext::Property, "string", "Name"));
        assert!(has(DeclarationContext::Method, "void", "Main"));
        assert!(has(DeclarationContext::Parameter, "string", "args"));
        assert!(has(DeclarationContext::Parameter, "int", "limit"));
        assert!(has(DeclarationContext::Variable, "double", "scores"));
        assert!(declarations
            .iter()
            .any(|(c, t, _)| *c == DeclarationContext::Cast && t == "long"));
    }

    #[test]
    fn test_declared_names_are_not_expressions() {
        let tree = parse(PROGRAM);
        let name = find(&tree, "identifier", "scores");
        assert!(name.traits().identifier);
        assert!(!name.traits().expression);

        let usage = find(&tree, "identifier", "limit");
        // First occurrence is the parameter name
        assert!(!usage.traits().expression);
    }

    #[test]
    fn test_statement_traits() {
        let tree = parse(PROGRAM);
        let statement = find(&tree, "expression_statement", "count++;");
        assert!(statement.traits().statement);

        let block = tree
            .descendants(tree.root().id())
            .find(|n| n.kind() == "block")
            .unwrap();
        assert!(block.traits().block);
        assert!(!block.traits().statement);
    }

    #[test]
    fn test_comments_are_trivia() {
        let tree = parse(PROGRAM);
        assert!(tree
            .descendants(tree.root().id())
            .all(|n| n.kind() != "comment"));
    }

    #[test]
    fn test_normalized_text_ignores_whitespace() {
        let a = parse("class A { void M() { Foo( 1,2 ); } }");
        let b = parse("class A { void M() { Foo(1, 2); } }");
        let call_a = a.descendants(a.root().id()).find(|n| n.kind() == "invocation_expression").unwrap();
        let call_b = b.descendants(b.root().id()).find(|n| n.kind() == "invocation_expression").unwrap();
        assert_ne!(call_a.text(), call_b.text());
        assert_eq!(call_a.normalized_text(), call_b.normalized_text());
    }

    #[test]
    fn test_parse_fragment() {
        let provider = CSharpProvider::new();

        let fragment = provider.parse_fragment("x++").unwrap();
        assert_eq!(fragment.node().kind(), "postfix_unary_expression");
        assert_eq!(fragment.node().text(), "x++");

        let fragment = provider.parse_fragment("Console.WriteLine(\"hi\")").unwrap();
        assert_eq!(fragment.node().kind(), "invocation_expression");

        let fragment = provider.parse_fragment("if (ready) { Go(); }").unwrap();
        assert_eq!(fragment.node().kind(), "if_statement");

        assert!(provider.parse_fragment("WriteLine(\"").is_none());
        assert!(provider.parse_fragment("   ").is_none());
    }

    #[test]
    fn test_resolve_literal_and_declared_types() {
        let source = r#"
class C
{
    private string title;

    void M(int limit)
    {
        string s = "a";
        var n = 5;
        var w = new Widget();
        Print(s);
        Print(n);
        Print(w);
        Print(limit);
        Print(title);
        Print(3.5f);
        Print(Unknown());
    }
}
"#;
        let provider = CSharpProvider::new();
        let tree = provider.parse(source).unwrap();

        let resolve = |arg_text: &str| {
            let arg = find(&tree, "argument", arg_text);
            provider.resolve_type(arg)
        };

        assert_eq!(resolve("s").unwrap().fully_qualified_name, "System.String");
        assert_eq!(resolve("n").unwrap().name, "int");
        assert_eq!(resolve("w").unwrap().name, "Widget");
        assert_eq!(resolve("limit").unwrap().fully_qualified_name, "System.Int32");
        assert_eq!(resolve("title").unwrap().name, "string");
        assert_eq!(resolve("3.5f").unwrap().name, "float");
        assert!(resolve("Unknown()").is_none());
    }

    #[test]
    fn test_integer_literal_suffixes() {
        assert_eq!(integer_literal_keyword("42"), "int");
        assert_eq!(integer_literal_keyword("42L"), "long");
        assert_eq!(integer_literal_keyword("42u"), "uint");
        assert_eq!(integer_literal_keyword("42UL"), "ulong");
        assert_eq!(integer_literal_keyword("0xFF"), "int");
        assert_eq!(real_literal_keyword("1.5m"), "decimal");
        assert_eq!(real_literal_keyword("1.5"), "double");
    }
}
