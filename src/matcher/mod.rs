//! Structural matcher
//!
//! Walks a syntax tree and reports every node that matches a parsed pattern.
//! A pattern is compiled once into a [`CompiledPattern`], which picks the
//! first applicable strategy:
//!
//! 1. call/construction recognizer (`Callee($args$)`)
//! 2. type-declaration recognizer (pattern has a `Type` placeholder)
//! 3. plain code: structural comparison, or substring search when the text
//!    is not a well-formed fragment
//! 4. single placeholder: every compatible node
//! 5. aligned template binding for other mixed patterns
//!
//! Matches are reported in pre-order. Nested matches are all reported.

mod captures;
mod recognizers;
mod template;

use std::cell::OnceCell;

use crate::constraints::ConstraintValidator;
use crate::error::PatternError;
use crate::models::Match;
use crate::pattern::{PatternAst, PatternNode, Placeholder, PlaceholderCategory};
use crate::syntax::{AstProvider, Fragment, NodeId, SyntaxNode, SyntaxTree};

use captures::Captures;
use recognizers::{collapse_whitespace, match_call, match_type_declaration, CallPattern};
use template::{bind_template, TokenIndex};

/// Matching strategy chosen for a pattern
enum Strategy<'p> {
    Call(CallPattern<'p>),
    TypeDeclaration,
    Code {
        fragment: Option<Fragment>,
        /// Token text of the fragment, or collapsed literal for substring search
        normalized: String,
    },
    Placeholder(&'p Placeholder),
    Template,
}

/// A pattern prepared for matching against many trees
///
/// Compiled patterns are immutable and can be shared across threads.
pub struct CompiledPattern<'p> {
    pattern: &'p PatternAst,
    strategy: Strategy<'p>,
}

impl<'p> CompiledPattern<'p> {
    pub fn pattern(&self) -> &'p PatternAst {
        self.pattern
    }

    /// Short name of the chosen strategy, for logging
    pub fn strategy_name(&self) -> &'static str {
        match self.strategy {
            Strategy::Call(_) => "call",
            Strategy::TypeDeclaration => "type-declaration",
            Strategy::Code { fragment: Some(_), .. } => "structural",
            Strategy::Code { fragment: None, .. } => "substring",
            Strategy::Placeholder(_) => "placeholder",
            Strategy::Template => "template",
        }
    }
}

/// Per-tree state shared by all candidates of one search
pub(crate) struct MatchContext<'t> {
    tree: &'t SyntaxTree,
    index: OnceCell<TokenIndex>,
}

impl<'t> MatchContext<'t> {
    fn new(tree: &'t SyntaxTree) -> Self {
        Self {
            tree,
            index: OnceCell::new(),
        }
    }

    pub(crate) fn index(&self) -> &TokenIndex {
        self.index.get_or_init(|| TokenIndex::build(self.tree))
    }
}

/// Matches patterns against syntax trees produced by an [`AstProvider`]
#[derive(Clone, Copy)]
pub struct StructuralMatcher<'a> {
    provider: &'a dyn AstProvider,
    validator: ConstraintValidator<'a>,
}

impl<'a> StructuralMatcher<'a> {
    pub fn new(provider: &'a dyn AstProvider) -> Self {
        Self {
            provider,
            validator: ConstraintValidator::new(Some(provider)),
        }
    }

    /// Choose a matching strategy for `pattern`
    pub fn compile<'p>(&self, pattern: &'p PatternAst) -> Result<CompiledPattern<'p>, PatternError> {
        let nodes = pattern.nodes();
        if nodes.is_empty() {
            return Err(PatternError::EmptyPattern);
        }

        let strategy = if let Some(call) = CallPattern::detect(nodes) {
            Strategy::Call(call)
        } else if pattern
            .placeholders()
            .any(|p| p.category == PlaceholderCategory::Type)
        {
            Strategy::TypeDeclaration
        } else {
            match nodes {
                [PatternNode::Text { text, .. }] => {
                    let fragment = self.provider.parse_fragment(text);
                    let normalized = match &fragment {
                        Some(f) => f.node().normalized_text(),
                        None => collapse_whitespace(text),
                    };
                    Strategy::Code {
                        fragment,
                        normalized,
                    }
                }
                [PatternNode::Placeholder(p)] => Strategy::Placeholder(p),
                _ => Strategy::Template,
            }
        };

        let compiled = CompiledPattern { pattern, strategy };
        log::debug!(
            "Compiled pattern '{}' using {} strategy",
            pattern.original_text(),
            compiled.strategy_name()
        );
        Ok(compiled)
    }

    /// Find all matches of `pattern` in `tree`
    pub fn find_matches(&self, pattern: &PatternAst, tree: &SyntaxTree) -> Result<Vec<Match>, PatternError> {
        self.find_matches_in(pattern, tree, tree.root().id())
    }

    /// Find all matches of `pattern` in the subtree rooted at `root`
    pub fn find_matches_in(
        &self,
        pattern: &PatternAst,
        tree: &SyntaxTree,
        root: NodeId,
    ) -> Result<Vec<Match>, PatternError> {
        let compiled = self.compile(pattern)?;
        Ok(self.find_compiled(&compiled, tree, root))
    }

    /// Find all matches of an already compiled pattern
    pub fn find_compiled(&self, compiled: &CompiledPattern<'_>, tree: &SyntaxTree, root: NodeId) -> Vec<Match> {
        let context = MatchContext::new(tree);

        let matches: Vec<Match> = tree
            .descendants(root)
            .flat_map(|node| {
                self.bindings(compiled, &context, node)
                    .into_iter()
                    .map(move |captures| Match {
                        node: node.id(),
                        span: node.span(),
                        matched_text: node.text().to_string(),
                        placeholders: captures.into_inner(),
                        file_path: None,
                    })
            })
            .collect();

        log::trace!(
            "Pattern '{}' matched {} nodes",
            compiled.pattern.original_text(),
            matches.len()
        );
        matches
    }

    /// Every binding set under which `node` matches
    ///
    /// At most one, except for declarations with several declarators.
    fn bindings(&self, compiled: &CompiledPattern<'_>, context: &MatchContext<'_>, node: SyntaxNode<'_>) -> Vec<Captures> {
        if let Strategy::TypeDeclaration = compiled.strategy {
            return match_type_declaration(self, compiled.pattern.nodes(), node);
        }
        let mut captures = Captures::default();
        if self.match_node(compiled, context, node, &mut captures) {
            vec![captures]
        } else {
            Vec::new()
        }
    }

    fn match_node(
        &self,
        compiled: &CompiledPattern<'_>,
        context: &MatchContext<'_>,
        node: SyntaxNode<'_>,
        captures: &mut Captures,
    ) -> bool {
        match &compiled.strategy {
            Strategy::Call(call) => match_call(self, context, call, node, captures),
            Strategy::TypeDeclaration => !match_type_declaration(self, compiled.pattern.nodes(), node).is_empty(),
            Strategy::Code {
                fragment: Some(fragment),
                normalized,
            } => node.kind() == fragment.node().kind() && node.normalized_text() == *normalized,
            Strategy::Code {
                fragment: None,
                normalized,
            } => collapse_whitespace(node.text()).contains(normalized.as_str()),
            Strategy::Placeholder(placeholder) => self.bind_node(placeholder, node, captures),
            Strategy::Template => {
                bind_template(self, context.index(), compiled.pattern.nodes(), node, captures)
            }
        }
    }

    /// Bind a placeholder to a single node, checking category and constraints
    pub(crate) fn bind_node(&self, placeholder: &Placeholder, node: SyntaxNode<'_>, captures: &mut Captures) -> bool {
        if !category_accepts(placeholder.category, node) {
            return false;
        }
        let value = capture_value(placeholder.category, node);
        self.accept(placeholder, value, Some(node), cardinality(node), captures)
    }

    /// Validate a candidate value and record the binding
    pub(crate) fn accept(
        &self,
        placeholder: &Placeholder,
        value: &str,
        node: Option<SyntaxNode<'_>>,
        count: usize,
        captures: &mut Captures,
    ) -> bool {
        self.validator.validate_all(&placeholder.constraints, Some(value), node)
            && placeholder.constraints.iter().all(|c| c.count_satisfied(count))
            && captures.bind(&placeholder.name, value)
    }
}

fn category_accepts(category: PlaceholderCategory, node: SyntaxNode<'_>) -> bool {
    let traits = node.traits();
    match category {
        PlaceholderCategory::Expression => traits.expression,
        PlaceholderCategory::Statement => traits.statement,
        PlaceholderCategory::Arguments => traits.argument_list || traits.argument,
        PlaceholderCategory::Type => traits.type_syntax,
        PlaceholderCategory::Member => traits.member,
        PlaceholderCategory::Identifier => traits.identifier,
        PlaceholderCategory::Any => true,
    }
}

/// Text a placeholder captures from a node
fn capture_value<'t>(category: PlaceholderCategory, node: SyntaxNode<'t>) -> &'t str {
    if node.traits().argument_list {
        return argument_list_inner_text(node);
    }
    if matches!(category, PlaceholderCategory::Member | PlaceholderCategory::Identifier) {
        if let Some(name) = node.member_name() {
            return name.text();
        }
    }
    node.text()
}

/// Number of items a node stands for, as seen by count constraints
fn cardinality(node: SyntaxNode<'_>) -> usize {
    let traits = node.traits();
    if traits.argument_list {
        node.named_children().filter(|c| c.traits().argument).count()
    } else if traits.block {
        node.named_children().count()
    } else {
        1
    }
}

/// Source between the parentheses of an argument list, trimmed
pub(crate) fn argument_list_inner_text<'t>(list: SyntaxNode<'t>) -> &'t str {
    let source = list.tree().source();
    let span = list.span();
    let mut children = list.children();
    let open = children.next().filter(|c| !c.is_named());
    let close = list.children().last().filter(|c| !c.is_named());
    let (start, end) = match (open, close) {
        (Some(open), Some(close)) if open.id() != close.id() => (open.span().end, close.span().start),
        _ => (span.start, span.end),
    };
    source.get(start..end).map(str::trim).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use std::collections::{BTreeSet, HashMap};

    use super::*;
    use crate::constraints::Constraint;
    use crate::pattern::{parse, parse_with_constraints};
    use crate::syntax::csharp::CSharpProvider;

    fn search(pattern: &str, source: &str) -> Vec<Match> {
        let provider = CSharpProvider::new();
        let tree = provider.parse(source).unwrap();
        let ast = parse(pattern).unwrap();
        StructuralMatcher::new(&provider).find_matches(&ast, &tree).unwrap()
    }

    fn in_method(body: &str) -> String {
        format!("class Program\n{{\n    void Run()\n    {{\n{}\n    }}\n}}\n", body)
    }

    fn texts(matches: &[Match]) -> Vec<&str> {
        matches.iter().map(|m| m.matched_text.as_str()).collect()
    }

    #[test]
    fn test_call_pattern_matches_only_named_callee() {
        let source = in_method(
            r#"        Console.WriteLine("a");
        Console.WriteLine(1 + 2);
        Console.WriteLine(name);
        Console.Write("x");"#,
        );
        let matches = search("Console.WriteLine($arg$)", &source);
        assert_eq!(matches.len(), 3);
        let args: Vec<&str> = matches.iter().map(|m| m.placeholders["arg"].as_str()).collect();
        assert_eq!(args, vec!["\"a\"", "1 + 2", "name"]);
        assert!(matches.iter().all(|m| m.matched_text.starts_with("Console.WriteLine(")));
    }

    #[test]
    fn test_postfix_increment_binds_identifier() {
        let source = in_method("        x++;");
        let matches = search("$var$++", &source);
        assert_eq!(texts(&matches), vec!["x++"]);
        assert_eq!(matches[0].placeholders["var"], "x");
        assert_eq!(matches[0].span.start_line, 5);
    }

    #[test]
    fn test_argument_count_constraint() {
        let source = in_method("        Method(1);\n        Method(1, 2);\n        Method(1, 2, 3);");
        let provider = CSharpProvider::new();
        let tree = provider.parse(&source).unwrap();
        let mut constraints = HashMap::new();
        constraints.insert("args".to_string(), vec![Constraint::count(Some(2), Some(2)).unwrap()]);
        let ast = parse_with_constraints("Method($args$)", &constraints).unwrap();

        let matches = StructuralMatcher::new(&provider).find_matches(&ast, &tree).unwrap();
        assert_eq!(texts(&matches), vec!["Method(1, 2)"]);
        assert_eq!(matches[0].placeholders["args"], "1, 2");
    }

    #[test]
    fn test_repeated_placeholder_must_agree() {
        let source = in_method("        if (x == x) { }\n        if (x == y) { }");
        let matches = search("$a$ == $a$", &source);
        assert_eq!(texts(&matches), vec!["x == x"]);
    }

    #[test]
    fn test_repeated_placeholder_compares_exact_text() {
        let source = in_method("        bool p = (a  +  b) == (a + b);\n        bool q = (a + b) == (a + b);");
        let matches = search("$x$ == $x$", &source);
        assert_eq!(texts(&matches), vec!["(a + b) == (a + b)"]);
    }

    #[test]
    fn test_statement_placeholder_skips_blocks() {
        let matches = search("$stmt$", "class C { void M() { if (a) { x++; } } }");
        assert_eq!(texts(&matches), vec!["if (a) { x++; }", "x++;"]);
        assert!(matches.iter().all(|m| !m.placeholders["stmt"].starts_with('{')));
    }

    #[test]
    fn test_nested_expressions_are_all_reported() {
        let source = in_method("        var a = b + c * d;");
        let matches = search("$expr$", &source);
        let found = texts(&matches);
        assert!(found.contains(&"b + c * d"));
        assert!(found.contains(&"c * d"));
        assert!(found.contains(&"d"));
        // Declared names are not expressions
        assert!(!found.contains(&"a"));
    }

    #[test]
    fn test_placeholder_keys_equal_pattern_names() {
        let source = in_method("        total = first + second;\n        x = y + (z + w);");
        let ast = parse("$a$ + $b$").unwrap();
        let expected: BTreeSet<&str> = ast.placeholder_names();
        let matches = search("$a$ + $b$", &source);
        assert!(matches.len() >= 3);
        for m in &matches {
            let keys: BTreeSet<&str> = m.placeholders.keys().map(String::as_str).collect();
            assert_eq!(keys, expected);
        }
    }

    #[test]
    fn test_plain_code_matches_structurally() {
        let source = in_method("        Console.WriteLine( \"hi\" );\n        Console.WriteLine(\"bye\");");
        let matches = search("Console.WriteLine(\"hi\")", &source);
        assert_eq!(texts(&matches), vec!["Console.WriteLine( \"hi\" )"]);
        assert!(matches[0].placeholders.is_empty());
    }

    #[test]
    fn test_malformed_code_falls_back_to_substring() {
        let source = in_method("        Console.WriteLine(\"hi\");");
        let matches = search("WriteLine(\"", &source);
        assert!(!matches.is_empty());
        assert!(texts(&matches).contains(&"Console.WriteLine(\"hi\")"));
    }

    #[test]
    fn test_type_declaration_pattern() {
        let source = r#"
class Inventory
{
    private int count;

    void Restock(string label)
    {
        double[] prices = null;
        int total = 0;
    }
}
"#;
        let matches = search("$type$ $name$", source);
        let pairs: Vec<(&str, &str)> = matches
            .iter()
            .map(|m| (m.placeholders["type"].as_str(), m.placeholders["name"].as_str()))
            .collect();
        assert!(pairs.contains(&("int", "count")));
        assert!(pairs.contains(&("string", "label")));
        assert!(pairs.contains(&("double", "prices")));
        assert!(pairs.contains(&("void", "Restock")));

        let matches = search("$type$ total", source);
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].placeholders["type"], "int");
    }

    #[test]
    fn test_each_declarator_is_reported() {
        let source = in_method("        int a, b = 2;\n        string c;");
        let matches = search("$type$ $name$", &source);
        let pairs: Vec<(&str, &str)> = matches
            .iter()
            .map(|m| (m.placeholders["type"].as_str(), m.placeholders["name"].as_str()))
            .collect();
        assert!(pairs.contains(&("int", "a")));
        assert!(pairs.contains(&("int", "b")));
        assert!(pairs.contains(&("string", "c")));

        let matches = search("$type$ b", &source);
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].placeholders["type"], "int");
    }

    #[test]
    fn test_callee_with_placeholder() {
        let source = in_method("        repo.Save(item, true);\n        cache.Save(item);\n        repo.Load(id);");
        let matches = search("$obj$.Save($args$)", &source);
        assert_eq!(matches.len(), 2);
        assert_eq!(matches[0].placeholders["obj"], "repo");
        assert_eq!(matches[0].placeholders["args"], "item, true");
        assert_eq!(matches[1].placeholders["obj"], "cache");
    }

    #[test]
    fn test_construction_pattern() {
        let source = in_method("        var a = new Widget(1);\n        var b = Widget(2);\n        var c = new Gadget(3);");
        let matches = search("new Widget($args$)", &source);
        assert_eq!(texts(&matches), vec!["new Widget(1)"]);
        assert_eq!(matches[0].placeholders["args"], "1");
    }

    #[test]
    fn test_regex_constraint_filters_bindings() {
        let source = in_method("        Log(\"Error: disk\");\n        Log(\"Info: ok\");");
        let provider = CSharpProvider::new();
        let tree = provider.parse(&source).unwrap();
        let mut constraints = HashMap::new();
        constraints.insert("args".to_string(), vec![Constraint::regex("^\"Error").unwrap()]);
        let ast = parse_with_constraints("Log($args$)", &constraints).unwrap();
        let matches = StructuralMatcher::new(&provider).find_matches(&ast, &tree).unwrap();
        assert_eq!(texts(&matches), vec!["Log(\"Error: disk\")"]);
    }

    #[test]
    fn test_type_constraint_on_call_argument() {
        let source = in_method(
            "        string s = \"a\";\n        int n = 1;\n        Print(s);\n        Print(n);\n        Print(Compute());",
        );
        let provider = CSharpProvider::new();
        let tree = provider.parse(&source).unwrap();
        let mut constraints = HashMap::new();
        constraints.insert("arg".to_string(), vec![Constraint::type_name("System.String").unwrap()]);
        let ast = parse_with_constraints("Print($arg$)", &constraints).unwrap();
        let matches = StructuralMatcher::new(&provider).find_matches(&ast, &tree).unwrap();
        // Unresolvable arguments pass
        assert_eq!(texts(&matches), vec!["Print(s)", "Print(Compute())"]);
    }

    #[test]
    fn test_adjacent_placeholders_never_match() {
        let source = in_method("        ab;");
        assert!(search("$a$$b$", &source).is_empty());
    }

    #[test]
    fn test_matches_are_in_preorder() {
        let source = in_method("        Foo(Foo(1));");
        let matches = search("Foo($args$)", &source);
        assert_eq!(texts(&matches), vec!["Foo(Foo(1))", "Foo(1)"]);
        assert_eq!(matches[0].placeholders["args"], "Foo(1)");
    }
}
